mod estimator;
mod flight_context;
mod flight_state;
mod sequencer;
#[cfg(test)]
mod tests;

pub use estimator::{Estimator, NavSnapshot};
pub use flight_context::FlightContext;
pub use flight_state::FlightState;
pub use sequencer::{FlightSequencer, TickOutcome};
