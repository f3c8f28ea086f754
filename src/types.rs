//! Core types for the takeover pipeline
//!
//! This module defines the data structures that flow through each stage of
//! the pipeline: raw and resampled streams, event tables, demographics,
//! and the fused observation windows.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// Convert fractional seconds to a signed duration.
///
/// Raw tables carry time offsets as plain seconds; all internal arithmetic
/// uses `chrono::Duration` so that pre-trigger crop boundaries may go
/// negative without wrapping.
pub fn duration_from_secs(secs: f64) -> Duration {
    Duration::nanoseconds((secs * 1e9).round() as i64)
}

/// Duration in whole nanoseconds.
///
/// Every duration in this pipeline is bounded by the length of one
/// recording session, far below the overflow range of `num_nanoseconds`.
pub(crate) fn duration_ns(d: Duration) -> i64 {
    d.num_nanoseconds().unwrap_or(i64::MAX)
}

/// Canonical subject identifier: a group prefix ending in `T` plus a
/// zero-padded participant number.
///
/// Raw identifiers appear unpadded in filenames and tables (`NST1`,
/// `ST12`); the canonical form (`NST01`, `ST12`) is what every table is
/// joined on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectId {
    group: String,
    number: u32,
}

impl SubjectId {
    /// Parse a raw identifier, normalizing the numeric suffix.
    ///
    /// A raw identifier that does not split into a group prefix and a
    /// numeric suffix indicates upstream data corruption and is a fatal
    /// format error, not a skippable gap.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let split = raw
            .rfind('T')
            .ok_or_else(|| PipelineError::MalformedSubjectId(raw.to_string()))?;
        let (group, digits) = raw.split_at(split + 1);
        let number = digits
            .parse::<u32>()
            .map_err(|_| PipelineError::MalformedSubjectId(raw.to_string()))?;
        Ok(Self {
            group: group.to_string(),
            number,
        })
    }

    /// Group prefix, including the trailing `T`.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Plain numeric participant code.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// True for subjects in the non-standard (`NS`-prefixed) condition.
    pub fn is_nonstandard_condition(&self) -> bool {
        self.group.starts_with("NS")
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.group, self.number)
    }
}

/// Ordered obstacle vocabulary shared by the driving stream and the event
/// tables.
///
/// Obstacles are addressed downstream by their 1-based position in this
/// list, so the order here fixes the index space for every event table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleVocabulary {
    names: Vec<String>,
}

impl ObstacleVocabulary {
    pub fn new<S: Into<String>>(names: Vec<S>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 1-based index of an obstacle code.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name).map(|i| i + 1)
    }

    /// Obstacle code at a 1-based index.
    pub fn name(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    /// Iterate `(1-based index, code)` in vocabulary order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| (i + 1, n.as_str()))
    }
}

impl Default for ObstacleVocabulary {
    fn default() -> Self {
        Self::new(vec!["Deer", "Cone", "Frog", "Can", "FA1", "FA2"])
    }
}

/// One sample of driving telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct DrivingSample {
    /// Offset since the start of the driving recording.
    pub time: Duration,
    /// Continuous channel values, parallel to `DrivingRecord::signal_names`.
    pub signals: Vec<f64>,
    /// True while the vehicle drives itself.
    pub autonomous: bool,
    /// Active obstacle code, `None` while nothing is on the road.
    pub obstacle: Option<String>,
}

/// Per-subject driving telemetry series, ordered by time.
#[derive(Debug, Clone, PartialEq)]
pub struct DrivingRecord {
    /// Names of the continuous channels (speed, steering angle, ...).
    pub signal_names: Vec<String>,
    pub samples: Vec<DrivingSample>,
}

impl DrivingRecord {
    pub fn new<S: Into<String>>(signal_names: Vec<S>) -> Self {
        Self {
            signal_names: signal_names.into_iter().map(Into::into).collect(),
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One sample of physiological data.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysioSample {
    /// Offset since the physiological device's own recording start. The
    /// device clock is independent of the driving clock.
    pub time: Duration,
    /// Channel values, parallel to `PhysioRecord::channel_names`.
    pub values: Vec<f64>,
}

/// Per-subject physiological series on the device's own clock.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysioRecord {
    pub channel_names: Vec<String>,
    pub samples: Vec<PhysioSample>,
}

impl PhysioRecord {
    pub fn new<S: Into<String>>(channel_names: Vec<S>) -> Self {
        Self {
            channel_names: channel_names.into_iter().map(Into::into).collect(),
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Earliest sample time, the stream's own relative epoch.
    pub fn start_time(&self) -> Option<Duration> {
        self.samples.iter().map(|s| s.time).min()
    }
}

/// The six ordered offsets delimiting the experiment phases on the
/// physiological device's clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseMarkers {
    pub baseline_start: Duration,
    pub baseline_end: Duration,
    pub training_start: Duration,
    pub training_end: Duration,
    pub driving_start: Duration,
    pub driving_end: Duration,
}

impl PhaseMarkers {
    /// Build markers from the raw 6-entry marker table (second offsets).
    pub fn from_offsets(offsets: &[f64]) -> Result<Self, PipelineError> {
        if offsets.len() != 6 {
            return Err(PipelineError::MarkerCount {
                expected: 6,
                found: offsets.len(),
            });
        }
        Ok(Self {
            baseline_start: duration_from_secs(offsets[0]),
            baseline_end: duration_from_secs(offsets[1]),
            training_start: duration_from_secs(offsets[2]),
            training_end: duration_from_secs(offsets[3]),
            driving_start: duration_from_secs(offsets[4]),
            driving_end: duration_from_secs(offsets[5]),
        })
    }
}

/// Event timestamps for one subject and one obstacle, each nullable.
///
/// Driving-side rows carry all four fields; physiological-side rows never
/// observe a release.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EventTimes {
    /// When the obstacle became active.
    pub triggered: Option<Duration>,
    /// When the subject first took manual control after the trigger.
    pub takeover: Option<Duration>,
    /// When manual control returned to autonomy.
    pub release: Option<Duration>,
    /// Takeover minus trigger, the response latency.
    pub time_on_task: Option<Duration>,
}

/// One subject's event timestamps across the obstacle index space.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    events: Vec<EventTimes>,
}

impl EventRow {
    /// A row with every obstacle unobserved.
    pub fn empty(obstacle_count: usize) -> Self {
        Self {
            events: vec![EventTimes::default(); obstacle_count],
        }
    }

    /// Event times at a 1-based obstacle index.
    pub fn get(&self, index: usize) -> Option<&EventTimes> {
        index.checked_sub(1).and_then(|i| self.events.get(i))
    }

    /// Replace the event times at a 1-based obstacle index. Returns
    /// false when the index lies outside the row.
    pub fn set(&mut self, index: usize, times: EventTimes) -> bool {
        match index.checked_sub(1).and_then(|i| self.events.get_mut(i)) {
            Some(slot) => {
                *slot = times;
                true
            }
            None => false,
        }
    }

    pub fn obstacle_count(&self) -> usize {
        self.events.len()
    }

    /// Iterate `(1-based index, times)` in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &EventTimes)> {
        self.events.iter().enumerate().map(|(i, e)| (i + 1, e))
    }
}

/// Normalized event table: one row per subject, indexed by canonical id.
pub type EventTable = std::collections::BTreeMap<SubjectId, EventRow>;

/// Static per-subject attributes, broadcast to every timestep at fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub subject: SubjectId,
    pub age: f64,
    /// Years holding a license, relative to the study's reference year.
    pub years_licensed: f64,
    pub km_per_year: f64,
    /// Condition flag derived from the subject's group prefix.
    pub nonstandard_condition: bool,
}

impl Demographics {
    /// Column order of the demographic block in every fused window.
    pub fn column_names() -> [&'static str; 5] {
        ["code", "age", "years_licensed", "km_per_year", "condition"]
    }

    /// Numeric row broadcast across a window, parallel to `column_names`.
    pub fn to_row(&self) -> [f64; 5] {
        [
            f64::from(self.subject.number()),
            self.age,
            self.years_licensed,
            self.km_per_year,
            if self.nonstandard_condition { 1.0 } else { 0.0 },
        ]
    }
}

/// Response-speed label assigned to each accepted window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseLabel {
    Slow,
    Fast,
}

/// A fused pre-event sample: exactly N timesteps of driving channels,
/// physiological channels, and the broadcast demographic block.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationWindow {
    pub rows: Vec<Vec<f64>>,
}

impl ObservationWindow {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Pipeline configuration.
///
/// The obstacle vocabulary and all timing parameters are explicit data
/// here rather than constants buried in the components. A single grid
/// interval is shared by both streams; the positional join in the window
/// fuser depends on it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Uniform sampling interval both streams are placed on.
    pub grid_interval: Duration,
    /// Pre-event crop duration W.
    pub window: Duration,
    /// Strict time-on-task threshold T; latencies above it label slow.
    pub slow_threshold: Duration,
    pub vocabulary: ObstacleVocabulary,
    /// Driving channels excluded from fused windows. Absolute position
    /// axes carry no per-timestep signal and are dropped by default.
    pub drop_channels: Vec<String>,
    /// Year the license-year demographic column is counted back from.
    pub reference_year: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid_interval: Duration::milliseconds(10),
            window: Duration::seconds(10),
            slow_threshold: Duration::seconds(3),
            vocabulary: ObstacleVocabulary::default(),
            drop_channels: vec![
                "PositionX".to_string(),
                "PositionY".to_string(),
                "PositionZ".to_string(),
            ],
            reference_year: 2018.0,
        }
    }
}

impl PipelineConfig {
    /// Validate timing parameters before any data is touched.
    ///
    /// The window must be a whole multiple of the grid interval; otherwise
    /// no crop could ever satisfy the fixed-length invariant.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let grid_ns = duration_ns(self.grid_interval);
        let window_ns = duration_ns(self.window);
        if grid_ns <= 0 {
            return Err(PipelineError::InvalidConfig(
                "grid interval must be positive".to_string(),
            ));
        }
        if window_ns <= 0 {
            return Err(PipelineError::InvalidConfig(
                "window duration must be positive".to_string(),
            ));
        }
        if window_ns % grid_ns != 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "window ({}ns) is not a multiple of the grid interval ({}ns)",
                window_ns, grid_ns
            )));
        }
        if duration_ns(self.slow_threshold) < 0 {
            return Err(PipelineError::InvalidConfig(
                "slow threshold must not be negative".to_string(),
            ));
        }
        if self.vocabulary.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "obstacle vocabulary is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of timesteps N in every accepted window.
    pub fn timesteps_per_window(&self) -> usize {
        (duration_ns(self.window) / duration_ns(self.grid_interval)) as usize
    }

    /// Sampling rate implied by the grid interval, in Hz.
    pub fn sampling_rate_hz(&self) -> f64 {
        1e9 / duration_ns(self.grid_interval) as f64
    }
}
