//! Phase segmentation
//!
//! A physiological recording covers the whole session: baseline rest,
//! training laps, and the automated drive. The marker table delimits the
//! three phases on the device's own clock; only the driving segment feeds
//! the window fuser, the other two are kept for baseline-style analyses.

use crate::types::{PhaseMarkers, PhysioRecord, PhysioSample};
use chrono::Duration;

/// The three phase segments of one physiological recording.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysioPhases {
    pub baseline: PhysioRecord,
    pub training: PhysioRecord,
    pub driving: PhysioRecord,
}

/// Split a resampled physiological record into its experiment phases.
/// Bounds are inclusive on both ends.
pub fn split_phases(record: &PhysioRecord, markers: &PhaseMarkers) -> PhysioPhases {
    PhysioPhases {
        baseline: crop_inclusive(record, markers.baseline_start, markers.baseline_end),
        training: crop_inclusive(record, markers.training_start, markers.training_end),
        driving: crop_inclusive(record, markers.driving_start, markers.driving_end),
    }
}

fn crop_inclusive(record: &PhysioRecord, from: Duration, to: Duration) -> PhysioRecord {
    let mut out = PhysioRecord::new(record.channel_names.clone());
    out.samples = record
        .samples
        .iter()
        .filter(|s| s.time >= from && s.time <= to)
        .cloned()
        .collect::<Vec<PhysioSample>>();
    out
}
