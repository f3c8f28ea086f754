//! Event extraction
//!
//! This module scans one subject's resampled driving record for the
//! trigger / takeover / release sequence of each obstacle in the
//! vocabulary. Extraction is a pure function of the record: every lookup
//! miss is a typed skip, never an error, and a skipped obstacle simply
//! leaves its slot in the event row unobserved.

use serde::{Deserialize, Serialize};

use crate::types::{DrivingRecord, EventRow, EventTimes, ObstacleVocabulary};

/// Why an obstacle produced no event for a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The obstacle never appeared in this recording.
    NoTrigger,
    /// The subject never took manual control after the trigger.
    NoTakeover,
    /// Another obstacle was triggered before the subject responded, so
    /// the observed takeover belongs to that later event.
    OvertakenByNext,
    /// Manual control never returned to autonomy.
    NoRelease,
}

impl SkipReason {
    /// True for the causality violation, as opposed to plain missing data.
    pub fn is_out_of_order(&self) -> bool {
        matches!(self, SkipReason::OvertakenByNext)
    }
}

/// Extraction result: the subject's event row plus the obstacles that
/// were skipped, with their reasons, for the run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEvents {
    pub row: EventRow,
    pub skipped: Vec<(usize, SkipReason)>,
}

/// Extract trigger/takeover/release times for every obstacle in
/// vocabulary order.
pub fn extract_events(record: &DrivingRecord, vocabulary: &ObstacleVocabulary) -> ExtractedEvents {
    let mut row = EventRow::empty(vocabulary.len());
    let mut skipped = Vec::new();

    // first marker occurrence per obstacle, shared with the guard below
    let first_seen: Vec<Option<chrono::Duration>> = vocabulary
        .iter()
        .map(|(_, name)| {
            record
                .samples
                .iter()
                .find(|s| s.obstacle.as_deref() == Some(name))
                .map(|s| s.time)
        })
        .collect();

    for (index, _name) in vocabulary.iter() {
        let trigger = match first_seen[index - 1] {
            Some(t) => t,
            None => {
                skipped.push((index, SkipReason::NoTrigger));
                continue;
            }
        };

        let takeover = match record
            .samples
            .iter()
            .find(|s| s.time > trigger && !s.autonomous)
            .map(|s| s.time)
        {
            Some(t) => t,
            None => {
                skipped.push((index, SkipReason::NoTakeover));
                continue;
            }
        };

        // an obstacle appearing between trigger and takeover claims the
        // takeover for itself
        let overtaken = first_seen.iter().enumerate().any(|(j, seen)| {
            j + 1 != index && matches!(seen, Some(t) if *t > trigger && *t < takeover)
        });
        if overtaken {
            skipped.push((index, SkipReason::OvertakenByNext));
            continue;
        }

        let release = match record
            .samples
            .iter()
            .find(|s| s.time > takeover && s.autonomous)
            .map(|s| s.time)
        {
            Some(t) => t,
            None => {
                skipped.push((index, SkipReason::NoRelease));
                continue;
            }
        };

        row.set(
            index,
            EventTimes {
                triggered: Some(trigger),
                takeover: Some(takeover),
                release: Some(release),
                time_on_task: Some(takeover - trigger),
            },
        );
    }

    ExtractedEvents { row, skipped }
}
