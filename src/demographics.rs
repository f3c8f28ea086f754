//! Demographic table processing
//!
//! Static per-subject attributes arrive as one raw row per subject keyed
//! by the unpadded identifier. Processing filters the exclusion list,
//! normalizes identifiers, converts the license year into years of
//! experience, and derives the condition flag from the group prefix.

use std::collections::{BTreeMap, HashSet};

use crate::error::PipelineError;
use crate::types::{Demographics, SubjectId};

/// One row of the raw demographic table.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDemographicRow {
    /// Subject code as it appears in the table, unpadded.
    pub code: String,
    pub age: f64,
    /// Year the license was obtained.
    pub license_year: f64,
    pub km_per_year: f64,
}

/// Normalize the raw demographic table into per-subject attributes.
///
/// Excluded raw codes are dropped before normalization; a malformed code
/// on a retained row is fatal.
pub fn process_demographics(
    rows: &[RawDemographicRow],
    exclude: &HashSet<String>,
    reference_year: f64,
) -> Result<BTreeMap<SubjectId, Demographics>, PipelineError> {
    let mut out = BTreeMap::new();
    for row in rows {
        if exclude.contains(row.code.as_str()) {
            continue;
        }
        let subject = SubjectId::parse(&row.code)?;
        let demographics = Demographics {
            age: row.age,
            years_licensed: reference_year - row.license_year,
            km_per_year: row.km_per_year,
            nonstandard_condition: subject.is_nonstandard_condition(),
            subject: subject.clone(),
        };
        out.insert(subject, demographics);
    }
    Ok(out)
}
