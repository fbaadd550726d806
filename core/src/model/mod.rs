pub mod alert;
pub mod reading;
pub mod report;
pub mod state;

pub use alert::{Anomaly, AnomalyKind, Evidence, Severity, SpoofAlert, SpoofKind};
pub use reading::{Contact, GeoPoint, SensorExtras, SensorKind, SensorReading};
pub use report::{
    CombinedReport, EnvironmentSummary, FieldUncertainty, TargetUncertainty, UncertaintyReport,
};
pub use state::{FieldConfidence, FusedState, Target};
