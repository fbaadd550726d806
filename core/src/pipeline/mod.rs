//! The processing pipeline: four stateless stages orchestrated over the
//! cross-cycle state (history, tracks, degradation counters) that the
//! orchestrator owns.

pub mod anomaly;
pub mod fusion;
pub mod history;
pub mod orchestrator;
pub mod spoofing;
pub mod tracker;
pub mod uncertainty;

pub use anomaly::AnomalyStage;
pub use fusion::{FusionEvidence, FusionOutcome, FusionStage};
pub use history::HistoryBuffer;
pub use orchestrator::{PipelineState, SharedPipeline, SituationPipeline};
pub use spoofing::SpoofingStage;
pub use tracker::{Observation, TargetTracker, Track};
pub use uncertainty::UncertaintyStage;
