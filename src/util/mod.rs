mod flight_files;

pub use flight_files::FlightFiles;
