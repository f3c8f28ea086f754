//! Dataset assembly
//!
//! The assembler walks every subject and every obstacle index, fusing
//! windows and collecting them into the two labeled output collections.
//! Subjects are processed in canonical id order, so the output ordering
//! is deterministic for a given input.

use std::collections::BTreeMap;

use crate::types::{
    Demographics, DrivingRecord, EventTable, ObservationWindow, PhysioRecord, PipelineConfig,
    ResponseLabel, SubjectId,
};
use crate::window::{fuse_subject_windows, fused_column_names, DiscardCounts};

/// One subject's resampled, segmented data, ready for fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedSubject {
    /// Resampled driving record on the driving clock.
    pub driving: DrivingRecord,
    /// Resampled driving-phase physiological segment on the device clock.
    pub physio_driving: PhysioRecord,
    pub demographics: Demographics,
}

/// The assembled output: two labeled window collections plus the shared
/// column ordering and the discard tally.
#[derive(Debug, Clone, PartialEq)]
pub struct TakeoverDataset {
    pub slow: Vec<ObservationWindow>,
    pub fast: Vec<ObservationWindow>,
    /// Column names valid for every window in both collections.
    pub columns: Vec<String>,
    pub discards: DiscardCounts,
}

impl TakeoverDataset {
    pub fn window_count(&self) -> usize {
        self.slow.len() + self.fast.len()
    }
}

/// Fuse and collect windows for every subject present in both event
/// tables.
///
/// `discards` carries the extraction-stage tally in, so the returned
/// dataset reports one combined count. Subjects missing from either event
/// table contribute nothing; all windows share one column layout, and the
/// last layout observed stands for all of them.
pub fn assemble(
    subjects: &BTreeMap<SubjectId, ProcessedSubject>,
    driving_events: &EventTable,
    physio_events: &EventTable,
    config: &PipelineConfig,
    mut discards: DiscardCounts,
) -> TakeoverDataset {
    let mut slow = Vec::new();
    let mut fast = Vec::new();
    let mut columns = Vec::new();

    for (subject, data) in subjects {
        let Some(d_row) = driving_events.get(subject) else {
            continue;
        };
        let Some(p_row) = physio_events.get(subject) else {
            continue;
        };

        let produced = fuse_subject_windows(
            &data.driving,
            &data.physio_driving,
            d_row,
            p_row,
            &data.demographics,
            config,
            &mut discards,
        );
        if !produced.is_empty() {
            columns = fused_column_names(&data.driving, &data.physio_driving, config);
        }
        for labeled in produced {
            match labeled.label {
                ResponseLabel::Slow => slow.push(labeled.window),
                ResponseLabel::Fast => fast.push(labeled.window),
            }
        }
    }

    TakeoverDataset {
        slow,
        fast,
        columns,
        discards,
    }
}
