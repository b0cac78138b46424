pub mod alert;
pub mod message;

pub use alert::{Alert, AlertSource, AlertStatus, Coordinates, DriverAssignment, NewAlert};
