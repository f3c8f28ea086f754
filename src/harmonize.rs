//! Timestamp harmonization
//!
//! The physiological recording software exports event timestamps as one
//! wide row per subject, with column names encoding {field kind,
//! obstacle}. This module reshapes that export into the normalized event
//! schema: canonical field kinds, canonical subject ids, duration values,
//! derived time-on-task, and the same 1-based obstacle index space the
//! driving stream uses.

use std::collections::HashSet;

use crate::error::PipelineError;
use crate::types::{
    duration_from_secs, EventRow, EventTable, EventTimes, ObstacleVocabulary, SubjectId,
};

/// One cell of the raw wide event table: a column name encoding
/// {field kind, obstacle} plus a raw second offset or null.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEventCell {
    pub column: String,
    pub seconds: Option<f64>,
}

/// One subject's raw event row, keyed by the identifier as it appears in
/// the export.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEventRow {
    pub subject_id: String,
    pub cells: Vec<RawEventCell>,
}

/// The raw wide event table as the export produces it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawEventTable {
    pub rows: Vec<RawEventRow>,
}

/// Canonical field kinds the raw column prefixes map to.
enum FieldKind {
    /// `Trig` columns: when the obstacle appeared.
    Triggered,
    /// `Det` columns: dropped, not needed downstream.
    Detected,
    /// `Rep` columns: when the subject responded (takeover).
    Takeover,
}

/// Normalize the raw wide event table into an [`EventTable`].
///
/// Excluded raw identifiers are dropped before normalization. Malformed
/// identifiers and unrecognized columns are fatal: they indicate upstream
/// corruption, not an expected data gap. Null cells stay null, and
/// time-on-task is derived only after the seconds-to-duration conversion.
pub fn harmonize_events(
    table: &RawEventTable,
    exclude: &HashSet<String>,
    vocabulary: &ObstacleVocabulary,
) -> Result<EventTable, PipelineError> {
    let mut out = EventTable::new();

    for raw_row in &table.rows {
        if exclude.contains(raw_row.subject_id.as_str()) {
            continue;
        }
        let subject = SubjectId::parse(&raw_row.subject_id)?;

        let mut triggered = vec![None; vocabulary.len()];
        let mut takeover = vec![None; vocabulary.len()];

        for cell in &raw_row.cells {
            let Some((kind, index)) = parse_column(&cell.column, vocabulary)? else {
                continue;
            };
            let value = cell.seconds.map(duration_from_secs);
            match kind {
                FieldKind::Triggered => triggered[index - 1] = value,
                FieldKind::Takeover => takeover[index - 1] = value,
                FieldKind::Detected => {}
            }
        }

        let mut row = EventRow::empty(vocabulary.len());
        for i in 0..vocabulary.len() {
            let time_on_task = match (takeover[i], triggered[i]) {
                (Some(t), Some(g)) => Some(t - g),
                _ => None,
            };
            row.set(
                i + 1,
                EventTimes {
                    triggered: triggered[i],
                    takeover: takeover[i],
                    release: None,
                    time_on_task,
                },
            );
        }
        out.insert(subject, row);
    }

    Ok(out)
}

/// Parse a raw column name into its field kind and 1-based obstacle index.
/// Returns `None` for the non-event `label_st` column.
fn parse_column(
    column: &str,
    vocabulary: &ObstacleVocabulary,
) -> Result<Option<(FieldKind, usize)>, PipelineError> {
    if column == "label_st" {
        return Ok(None);
    }

    let (kind, rest) = if let Some(rest) = column.strip_prefix("Trig") {
        (FieldKind::Triggered, rest)
    } else if let Some(rest) = column.strip_prefix("Det") {
        (FieldKind::Detected, rest)
    } else if let Some(rest) = column.strip_prefix("Rep") {
        (FieldKind::Takeover, rest)
    } else {
        return Err(PipelineError::UnknownEventColumn(column.to_string()));
    };

    let name = rest
        .strip_prefix("Obs")
        .ok_or_else(|| PipelineError::UnknownEventColumn(column.to_string()))?;
    let index = vocabulary
        .index_of(name)
        .ok_or_else(|| PipelineError::UnknownObstacle(name.to_string()))?;
    Ok(Some((kind, index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn cell(column: &str, seconds: Option<f64>) -> RawEventCell {
        RawEventCell {
            column: column.to_string(),
            seconds,
        }
    }

    fn vocab() -> ObstacleVocabulary {
        ObstacleVocabulary::default()
    }

    #[test]
    fn test_harmonizes_and_derives_time_on_task() {
        let table = RawEventTable {
            rows: vec![RawEventRow {
                subject_id: "ST1".to_string(),
                cells: vec![
                    cell("TrigObsDeer", Some(5.25)),
                    cell("DetObsDeer", Some(5.5)),
                    cell("RepObsDeer", Some(7.75)),
                    cell("label_st", None),
                ],
            }],
        };

        let events = harmonize_events(&table, &HashSet::new(), &vocab()).unwrap();
        let subject = SubjectId::parse("ST01").unwrap();
        let row = events.get(&subject).unwrap();

        let deer = row.get(1).unwrap();
        assert_eq!(deer.triggered, Some(Duration::milliseconds(5250)));
        assert_eq!(deer.takeover, Some(Duration::milliseconds(7750)));
        assert_eq!(deer.time_on_task, Some(Duration::milliseconds(2500)));
        assert_eq!(deer.release, None);

        // untouched obstacles stay null
        assert_eq!(row.get(2).unwrap().triggered, None);
    }

    #[test]
    fn test_obstacle_names_rekey_to_vocabulary_indices() {
        let table = RawEventTable {
            rows: vec![RawEventRow {
                subject_id: "ST1".to_string(),
                cells: vec![
                    cell("TrigObsFA2", Some(100.0)),
                    cell("TrigObsCone", Some(50.0)),
                ],
            }],
        };

        let events = harmonize_events(&table, &HashSet::new(), &vocab()).unwrap();
        let row = &events[&SubjectId::parse("ST1").unwrap()];
        assert_eq!(row.get(2).unwrap().triggered, Some(Duration::seconds(50)));
        assert_eq!(row.get(6).unwrap().triggered, Some(Duration::seconds(100)));
    }

    #[test]
    fn test_null_stays_null() {
        let table = RawEventTable {
            rows: vec![RawEventRow {
                subject_id: "ST1".to_string(),
                cells: vec![cell("TrigObsFrog", Some(10.0)), cell("RepObsFrog", None)],
            }],
        };

        let events = harmonize_events(&table, &HashSet::new(), &vocab()).unwrap();
        let frog = events[&SubjectId::parse("ST1").unwrap()].get(3).unwrap();
        assert_eq!(frog.triggered, Some(Duration::seconds(10)));
        assert_eq!(frog.takeover, None);
        assert_eq!(frog.time_on_task, None);
    }

    #[test]
    fn test_excluded_subjects_are_dropped_before_normalization() {
        let table = RawEventTable {
            rows: vec![
                RawEventRow {
                    subject_id: "ST1".to_string(),
                    cells: vec![cell("TrigObsDeer", Some(1.0))],
                },
                RawEventRow {
                    // malformed, but excluded first so it never parses
                    subject_id: "broken".to_string(),
                    cells: vec![],
                },
            ],
        };
        let exclude: HashSet<String> = ["broken".to_string()].into_iter().collect();

        let events = harmonize_events(&table, &exclude, &vocab()).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events.contains_key(&SubjectId::parse("ST1").unwrap()));
    }

    #[test]
    fn test_malformed_identifier_is_fatal() {
        let table = RawEventTable {
            rows: vec![RawEventRow {
                subject_id: "subject-7".to_string(),
                cells: vec![],
            }],
        };
        let err = harmonize_events(&table, &HashSet::new(), &vocab()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedSubjectId(_)));
    }

    #[test]
    fn test_unknown_obstacle_is_fatal() {
        let table = RawEventTable {
            rows: vec![RawEventRow {
                subject_id: "ST1".to_string(),
                cells: vec![cell("TrigObsMoose", Some(1.0))],
            }],
        };
        let err = harmonize_events(&table, &HashSet::new(), &vocab()).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownObstacle(_)));
    }

    #[test]
    fn test_unknown_column_is_fatal() {
        let table = RawEventTable {
            rows: vec![RawEventRow {
                subject_id: "ST1".to_string(),
                cells: vec![cell("WeirdColumn", Some(1.0))],
            }],
        };
        let err = harmonize_events(&table, &HashSet::new(), &vocab()).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownEventColumn(_)));
    }

    #[test]
    fn test_subject_ids_are_zero_padded() {
        let table = RawEventTable {
            rows: vec![RawEventRow {
                subject_id: "NST3".to_string(),
                cells: vec![],
            }],
        };
        let events = harmonize_events(&table, &HashSet::new(), &vocab()).unwrap();
        let subject = events.keys().next().unwrap();
        assert_eq!(subject.to_string(), "NST03");
    }
}
