use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Display, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum FlightState {
    Idle,
    Prepared,
    Armed,
    Launched,
    Deployed,
    Landed,
    Off,
    /// Fallback for any value matching no known state.
    #[serde(other)]
    Unknown,
}

impl From<&str> for FlightState {
    fn from(value: &str) -> Self {
        match value.to_uppercase().as_str() {
            "IDLE" => FlightState::Idle,
            "PREPARED" => FlightState::Prepared,
            "ARMED" => FlightState::Armed,
            "LAUNCHED" => FlightState::Launched,
            "DEPLOYED" => FlightState::Deployed,
            "LANDED" => FlightState::Landed,
            "OFF" => FlightState::Off,
            _ => FlightState::Unknown,
        }
    }
}
