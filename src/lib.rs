//! Takeover Windows - event-aligned windowing and multi-rate stream fusion
//! for automated-driving takeover studies.
//!
//! The crate aligns two independently clocked recordings per subject -
//! vehicle telemetry and physiological signals - around obstacle-triggered
//! takeover requests, through a deterministic pipeline: resampling →
//! phase segmentation → event extraction → timestamp harmonization →
//! window fusion → dataset assembly.
//!
//! ## Modules
//!
//! - **events / harmonize**: locate and normalize trigger/takeover/release
//!   timestamps on both clocks
//! - **resample / segment**: place both streams on one fixed grid and cut
//!   the driving phase out of the physiological recording
//! - **window / dataset**: fuse fixed-length pre-event windows and collect
//!   them into slow/fast labeled sets

pub mod biosignal;
pub mod dataset;
pub mod demographics;
pub mod error;
pub mod events;
pub mod harmonize;
pub mod pipeline;
pub mod resample;
pub mod segment;
pub mod types;
pub mod window;

pub use dataset::{ProcessedSubject, TakeoverDataset};
pub use error::PipelineError;
pub use pipeline::{
    build_takeover_dataset, RunSummary, SubjectInput, SubjectStore, TakeoverProcessor,
};
pub use types::{
    Demographics, DrivingRecord, EventRow, EventTable, EventTimes, ObservationWindow,
    ObstacleVocabulary, PhaseMarkers, PhysioRecord, PipelineConfig, ResponseLabel, SubjectId,
};
pub use window::DiscardCounts;

/// Crate version embedded in every run summary
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for run summaries
pub const PRODUCER_NAME: &str = "takeover-windows";
