pub mod error;
pub mod patient;

pub use error::{HubError, HubResult};
pub use patient::{LivenessState, PatientRecord, Pressure, VitalSample};
