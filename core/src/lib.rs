//! Sensor-fusion and situational-awareness core for the maritime platform.
//!
//! Typed sensor readings flow through four pipeline stages per cycle:
//! fusion, anomaly detection, spoofing detection, and uncertainty modeling.
//! The orchestrator owns every piece of cross-cycle state and hands back one
//! combined report per batch.

pub mod math;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod telemetry;

pub use pipeline::{SharedPipeline, SituationPipeline};
pub use prelude::{PipelineConfig, SaError, SaResult};
