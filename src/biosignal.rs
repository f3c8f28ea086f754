//! Biosignal feature extraction boundary
//!
//! Deriving higher-level features from raw physiological channels (tonic
//! EDA, heart rate, respiration rate, ...) is an external concern. This
//! module only fixes the contract: derived features align row-for-row
//! with the input segment, nulls are permitted at the edges, and the
//! caller zero-fills them before fusion.

use crate::error::PipelineError;
use crate::types::{PhysioRecord, PhysioSample};

/// Row-aligned derived features, with edge nulls permitted.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub names: Vec<String>,
    /// One row per input sample, parallel to `names`.
    pub rows: Vec<Vec<Option<f64>>>,
}

/// Black-box extractor turning raw channels into derived per-timestep
/// features.
pub trait BiosignalExtractor {
    /// Derive features from a physiological segment sampled at
    /// `sampling_rate_hz`. The output must have exactly one row per
    /// input sample.
    fn extract(
        &self,
        segment: &PhysioRecord,
        sampling_rate_hz: f64,
    ) -> Result<FeatureFrame, PipelineError>;
}

/// Replace a segment's raw channels with derived features, zero-filling
/// edge nulls and keeping the segment's own time axis.
pub fn apply_features(
    segment: &PhysioRecord,
    frame: FeatureFrame,
) -> Result<PhysioRecord, PipelineError> {
    if frame.rows.len() != segment.len() {
        return Err(PipelineError::FeatureExtraction(format!(
            "feature rows ({}) do not align with segment rows ({})",
            frame.rows.len(),
            segment.len()
        )));
    }

    let mut out = PhysioRecord::new(frame.names);
    out.samples = segment
        .samples
        .iter()
        .zip(frame.rows)
        .map(|(sample, row)| PhysioSample {
            time: sample.time,
            values: row.into_iter().map(|v| v.unwrap_or(0.0)).collect(),
        })
        .collect();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn segment() -> PhysioRecord {
        let mut rec = PhysioRecord::new(vec!["CH1", "CH2"]);
        for k in 0..3 {
            rec.samples.push(PhysioSample {
                time: Duration::milliseconds(k * 10),
                values: vec![1.0, 2.0],
            });
        }
        rec
    }

    #[test]
    fn test_features_replace_raw_channels() {
        let frame = FeatureFrame {
            names: vec!["EDA_Tonic".to_string(), "ECG_Rate".to_string()],
            rows: vec![
                vec![Some(0.1), Some(60.0)],
                vec![Some(0.2), Some(61.0)],
                vec![Some(0.3), Some(62.0)],
            ],
        };

        let out = apply_features(&segment(), frame).unwrap();
        assert_eq!(out.channel_names, vec!["EDA_Tonic", "ECG_Rate"]);
        assert_eq!(out.samples[1].values, vec![0.2, 61.0]);
        // the segment's own time axis is preserved
        assert_eq!(out.samples[2].time, Duration::milliseconds(20));
    }

    #[test]
    fn test_edge_nulls_are_zero_filled() {
        let frame = FeatureFrame {
            names: vec!["ECG_Rate".to_string()],
            rows: vec![vec![None], vec![Some(61.0)], vec![None]],
        };

        let out = apply_features(&segment(), frame).unwrap();
        let values: Vec<f64> = out.samples.iter().map(|s| s.values[0]).collect();
        assert_eq!(values, vec![0.0, 61.0, 0.0]);
    }

    #[test]
    fn test_misaligned_frame_is_rejected() {
        let frame = FeatureFrame {
            names: vec!["ECG_Rate".to_string()],
            rows: vec![vec![Some(61.0)]],
        };

        let err = apply_features(&segment(), frame).unwrap_err();
        assert!(matches!(err, PipelineError::FeatureExtraction(_)));
    }
}
