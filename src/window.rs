//! Window alignment and fusion
//!
//! The hard part of the pipeline: for each obstacle event, crop a fixed
//! pre-trigger window out of two streams that share no wall clock, and
//! fuse them into one dense sample.
//!
//! The driving stream is cropped on its own absolute clock. The
//! physiological stream is cropped relative to its driving-phase
//! segment's own start, because the device clock began at an arbitrary
//! epoch. Both crops land on the same grid and cover the same duration,
//! so re-zeroing each to `[0, W)` makes the join purely positional.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::events::SkipReason;
use crate::types::{
    Demographics, DrivingRecord, EventRow, ObservationWindow, PhysioRecord, PipelineConfig,
    ResponseLabel,
};

/// Counts of events and windows dropped on the way to the dataset,
/// exposed through the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscardCounts {
    /// Obstacles with no trigger, takeover, or release in the driving
    /// stream.
    pub missing_event: usize,
    /// Obstacles voided because another trigger preceded the takeover.
    pub out_of_order_event: usize,
    /// Fused windows that did not come out at exactly N rows.
    pub length_mismatch: usize,
}

impl DiscardCounts {
    pub fn total(&self) -> usize {
        self.missing_event + self.out_of_order_event + self.length_mismatch
    }

    /// Fold extraction skips into the tally.
    pub(crate) fn absorb_skips(&mut self, skipped: &[(usize, SkipReason)]) {
        for (_, reason) in skipped {
            if reason.is_out_of_order() {
                self.out_of_order_event += 1;
            } else {
                self.missing_event += 1;
            }
        }
    }
}

/// One fused, labeled pre-event window.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledWindow {
    pub label: ResponseLabel,
    pub window: ObservationWindow,
}

/// Column ordering of every fused window: kept driving channels, then
/// physiological channels, then the demographic block.
pub fn fused_column_names(
    driving: &DrivingRecord,
    physio: &PhysioRecord,
    config: &PipelineConfig,
) -> Vec<String> {
    driving
        .signal_names
        .iter()
        .filter(|n| !config.drop_channels.contains(*n))
        .cloned()
        .chain(physio.channel_names.iter().cloned())
        .chain(Demographics::column_names().iter().map(|s| s.to_string()))
        .collect()
}

/// Fuse all of one subject's obstacle events into labeled windows.
///
/// Only obstacles with a non-null trigger on both clocks produce a
/// window. The structural columns (time, autonomy flag, obstacle marker)
/// and the configured drop channels are not carried into the fused rows.
/// Windows that do not come out at exactly N rows are discarded and
/// counted, never padded.
pub fn fuse_subject_windows(
    driving: &DrivingRecord,
    physio_driving: &PhysioRecord,
    driving_events: &EventRow,
    physio_events: &EventRow,
    demographics: &Demographics,
    config: &PipelineConfig,
    discards: &mut DiscardCounts,
) -> Vec<LabeledWindow> {
    let mut windows = Vec::new();
    let seg_start = match physio_driving.start_time() {
        Some(t) => t,
        // empty segment: cropping naturally yields no windows
        None => return windows,
    };
    let n = config.timesteps_per_window();
    let kept: Vec<usize> = driving
        .signal_names
        .iter()
        .enumerate()
        .filter(|(_, n)| !config.drop_channels.contains(n))
        .map(|(i, _)| i)
        .collect();

    for (index, d_times) in driving_events.iter() {
        let p_times = match physio_events.get(index) {
            Some(p) => p,
            None => continue,
        };
        let (Some(trig_d), Some(trig_p), Some(time_on_task)) =
            (d_times.triggered, p_times.triggered, d_times.time_on_task)
        else {
            continue;
        };

        // each stream is cropped on its own clock
        let d_rows: Vec<_> = driving
            .samples
            .iter()
            .filter(|s| s.time >= trig_d - config.window && s.time < trig_d)
            .collect();

        let p_to = seg_start + trig_p;
        let p_from = p_to - config.window;
        let p_rows: Vec<_> = physio_driving
            .samples
            .iter()
            .filter(|s| s.time >= p_from && s.time < p_to)
            .collect();

        if d_rows.len() != n || p_rows.len() != n {
            discards.length_mismatch += 1;
            warn!(
                "discarding window for {} obstacle {}: {} driving / {} physio rows, expected {}",
                demographics.subject,
                index,
                d_rows.len(),
                p_rows.len(),
                n
            );
            continue;
        }

        // both crops are re-zeroed to [0, W) on the shared grid, so the
        // join is row-for-row by position
        let demo_row = demographics.to_row();
        let rows: Vec<Vec<f64>> = d_rows
            .iter()
            .zip(&p_rows)
            .map(|(d, p)| {
                let mut row = Vec::with_capacity(kept.len() + p.values.len() + demo_row.len());
                row.extend(kept.iter().map(|&i| d.signals[i]));
                row.extend_from_slice(&p.values);
                row.extend_from_slice(&demo_row);
                row
            })
            .collect();

        // strict threshold: a latency of exactly T is fast
        let label = if time_on_task > config.slow_threshold {
            ResponseLabel::Slow
        } else {
            ResponseLabel::Fast
        };
        windows.push(LabeledWindow {
            label,
            window: ObservationWindow { rows },
        });
    }

    windows
}
