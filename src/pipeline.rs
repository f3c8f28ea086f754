//! Pipeline orchestration
//!
//! This module provides the public API for the takeover pipeline. It
//! drives the full run: resample both streams, segment the physiological
//! recording, extract driving events, harmonize the physiological event
//! table, fuse pre-event windows, and assemble the labeled dataset.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::biosignal::{apply_features, BiosignalExtractor};
use crate::dataset::{assemble, ProcessedSubject, TakeoverDataset};
use crate::error::PipelineError;
use crate::events::extract_events;
use crate::harmonize::{harmonize_events, RawEventTable};
use crate::resample::{resample_driving, resample_physio};
use crate::segment::split_phases;
use crate::types::{
    Demographics, DrivingRecord, EventTable, PhaseMarkers, PhysioRecord, PipelineConfig, SubjectId,
};
use crate::window::DiscardCounts;

/// One subject's raw inputs, as the loaders produce them.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectInput {
    pub driving: DrivingRecord,
    pub physio: PhysioRecord,
    pub markers: PhaseMarkers,
    pub demographics: Demographics,
}

/// Immutable per-run mapping from canonical subject id to that subject's
/// raw inputs.
///
/// Built once per run; components borrow from it and never mutate it, so
/// each subject's data has a single owner for the whole run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubjectStore {
    subjects: BTreeMap<SubjectId, SubjectInput>,
}

impl SubjectStore {
    /// Build the store from raw-keyed inputs.
    ///
    /// Excluded raw identifiers are dropped before normalization, so an
    /// excluded subject never contributes a single window even when its
    /// files exist. A malformed identifier on a retained input is fatal.
    pub fn build(
        inputs: Vec<(String, SubjectInput)>,
        exclude: &HashSet<String>,
    ) -> Result<Self, PipelineError> {
        let mut subjects = BTreeMap::new();
        for (raw_id, input) in inputs {
            if exclude.contains(raw_id.as_str()) {
                continue;
            }
            subjects.insert(SubjectId::parse(&raw_id)?, input);
        }
        Ok(Self { subjects })
    }

    pub fn get(&self, subject: &SubjectId) -> Option<&SubjectInput> {
        self.subjects.get(subject)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SubjectId, &SubjectInput)> {
        self.subjects.iter()
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

/// Per-run metadata and the observable discard tally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub producer: String,
    pub version: String,
    pub computed_at_utc: String,
    pub subjects: usize,
    pub slow_windows: usize,
    pub fast_windows: usize,
    pub discards: DiscardCounts,
}

impl RunSummary {
    fn new(subjects: usize, dataset: &TakeoverDataset) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            producer: crate::PRODUCER_NAME.to_string(),
            version: crate::VERSION.to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            subjects,
            slow_windows: dataset.slow.len(),
            fast_windows: dataset.fast.len(),
            discards: dataset.discards,
        }
    }

    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build a labeled takeover dataset with the default configuration
/// (10 ms grid, 10 s window, 3 s threshold, reference vocabulary).
///
/// # Arguments
/// * `store` - Per-subject raw inputs, built once via [`SubjectStore::build`]
/// * `physio_event_table` - Raw wide event table from the physiological
///   recording software
/// * `exclude` - Raw subject identifiers to drop everywhere
pub fn build_takeover_dataset(
    store: &SubjectStore,
    physio_event_table: &RawEventTable,
    exclude: &HashSet<String>,
) -> Result<(TakeoverDataset, RunSummary), PipelineError> {
    TakeoverProcessor::new().run(store, physio_event_table, exclude)
}

/// Configurable processor for the full pipeline.
///
/// Timing parameters are validated at construction, so a window that can
/// never satisfy the fixed-length invariant is rejected before any data
/// is touched.
pub struct TakeoverProcessor {
    config: PipelineConfig,
    extractor: Option<Box<dyn BiosignalExtractor>>,
}

impl Default for TakeoverProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TakeoverProcessor {
    /// Create a processor with the default configuration.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            extractor: None,
        }
    }

    /// Create a processor with a validated custom configuration.
    pub fn with_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            extractor: None,
        })
    }

    /// Attach a black-box biosignal feature extractor. The extractor runs
    /// on each subject's driving-phase segment, and its derived channels
    /// replace the raw ones before fusion.
    pub fn with_extractor(mut self, extractor: Box<dyn BiosignalExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline over every subject in the store.
    pub fn run(
        &self,
        store: &SubjectStore,
        physio_event_table: &RawEventTable,
        exclude: &HashSet<String>,
    ) -> Result<(TakeoverDataset, RunSummary), PipelineError> {
        // Stage 1: normalize the physiological event table
        let physio_events = harmonize_events(physio_event_table, exclude, &self.config.vocabulary)?;

        let mut discards = DiscardCounts::default();
        let mut driving_events = EventTable::new();
        let mut processed: BTreeMap<SubjectId, ProcessedSubject> = BTreeMap::new();

        for (subject, input) in store.iter() {
            // Stage 2: place both streams on the shared grid
            let driving = resample_driving(&input.driving, self.config.grid_interval);
            let physio = resample_physio(&input.physio, self.config.grid_interval);

            // Stage 3: locate trigger/takeover/release events
            let extracted = extract_events(&driving, &self.config.vocabulary);
            if !extracted.skipped.is_empty() {
                debug!(
                    "{}: {} obstacle slots without a usable event",
                    subject,
                    extracted.skipped.len()
                );
            }
            discards.absorb_skips(&extracted.skipped);

            // Stage 4: cut the driving-phase segment out of the
            // physiological stream
            let phases = split_phases(&physio, &input.markers);
            let mut physio_driving = phases.driving;

            // Stage 5: optional biosignal feature derivation
            if let Some(extractor) = &self.extractor {
                let frame = extractor.extract(&physio_driving, self.config.sampling_rate_hz())?;
                physio_driving = apply_features(&physio_driving, frame)?;
            }

            driving_events.insert(subject.clone(), extracted.row);
            processed.insert(
                subject.clone(),
                ProcessedSubject {
                    driving,
                    physio_driving,
                    demographics: input.demographics.clone(),
                },
            );
        }

        // Stage 6: fuse windows and assemble the labeled collections
        let dataset = assemble(
            &processed,
            &driving_events,
            &physio_events,
            &self.config,
            discards,
        );

        let summary = RunSummary::new(store.len(), &dataset);
        Ok((dataset, summary))
    }
}
