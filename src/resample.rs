//! Stream resampling
//!
//! This module places a raw per-subject stream on a uniform fixed-interval
//! grid. Continuous channels are bin-averaged and linearly interpolated
//! across gaps; step signals (autonomy flag, obstacle marker) carry the
//! last known value forward. The grid starts at the first de-duplicated
//! sample, so no grid point is ever filled from before the recording.

use chrono::Duration;

use crate::types::{duration_ns, DrivingRecord, DrivingSample, PhysioRecord, PhysioSample};

/// Resample a driving record onto the given grid interval.
///
/// Continuous channels use bin mean + linear interpolation; the autonomy
/// flag and obstacle marker are forward-filled. An empty record or a
/// non-positive step resamples to an empty record.
pub fn resample_driving(record: &DrivingRecord, step: Duration) -> DrivingRecord {
    let mut out = DrivingRecord::new(record.signal_names.clone());
    if record.is_empty() || duration_ns(step) <= 0 {
        return out;
    }

    let times: Vec<Duration> = record.samples.iter().map(|s| s.time).collect();
    let order = sort_dedup(&times);
    let sample_times: Vec<Duration> = order.iter().map(|&i| times[i]).collect();
    let grid = grid_points(sample_times[0], sample_times[sample_times.len() - 1], step);
    let held = ffill_positions(&sample_times, &grid);

    let channels: Vec<Vec<f64>> = (0..record.signal_names.len())
        .map(|c| {
            let values: Vec<f64> = order.iter().map(|&i| record.samples[i].signals[c]).collect();
            mean_interpolate(&sample_times, &values, &grid, step)
        })
        .collect();

    for (g_idx, &g) in grid.iter().enumerate() {
        let src = &record.samples[order[held[g_idx]]];
        out.samples.push(DrivingSample {
            time: g,
            signals: channels.iter().map(|col| col[g_idx]).collect(),
            autonomous: src.autonomous,
            obstacle: src.obstacle.clone(),
        });
    }
    out
}

/// Resample a physiological record onto the given grid interval.
///
/// All channels are continuous: bin mean + linear interpolation. An empty
/// record or a non-positive step resamples to an empty record.
pub fn resample_physio(record: &PhysioRecord, step: Duration) -> PhysioRecord {
    let mut out = PhysioRecord::new(record.channel_names.clone());
    if record.is_empty() || duration_ns(step) <= 0 {
        return out;
    }

    let times: Vec<Duration> = record.samples.iter().map(|s| s.time).collect();
    let order = sort_dedup(&times);
    let sample_times: Vec<Duration> = order.iter().map(|&i| times[i]).collect();
    let grid = grid_points(sample_times[0], sample_times[sample_times.len() - 1], step);

    let channels: Vec<Vec<f64>> = (0..record.channel_names.len())
        .map(|c| {
            let values: Vec<f64> = order.iter().map(|&i| record.samples[i].values[c]).collect();
            mean_interpolate(&sample_times, &values, &grid, step)
        })
        .collect();

    for (g_idx, &g) in grid.iter().enumerate() {
        out.samples.push(PhysioSample {
            time: g,
            values: channels.iter().map(|col| col[g_idx]).collect(),
        });
    }
    out
}

/// Stable sort by time, keeping the first of each duplicate timestamp.
/// Returns indices into the original sample order.
fn sort_dedup(times: &[Duration]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..times.len()).collect();
    order.sort_by_key(|&i| times[i]);
    order.dedup_by_key(|i| times[*i]);
    order
}

/// Uniform timestamps from `start` to `end` inclusive, `step` apart.
fn grid_points(start: Duration, end: Duration, step: Duration) -> Vec<Duration> {
    let step_ns = duration_ns(step);
    let end_ns = duration_ns(end);
    let mut grid = Vec::new();
    let mut t = duration_ns(start);
    while t <= end_ns {
        grid.push(Duration::nanoseconds(t));
        t += step_ns;
    }
    grid
}

/// For each grid point, the position (in sorted sample order) of the last
/// sample at or before it. The grid starts at the first sample, so every
/// grid point has one.
fn ffill_positions(sample_times: &[Duration], grid: &[Duration]) -> Vec<usize> {
    let mut out = Vec::with_capacity(grid.len());
    let mut cursor = 0usize;
    for &g in grid {
        while cursor + 1 < sample_times.len() && sample_times[cursor + 1] <= g {
            cursor += 1;
        }
        out.push(cursor);
    }
    out
}

/// Bin-average a continuous channel onto the grid, then interpolate
/// linearly across empty bins.
fn mean_interpolate(
    sample_times: &[Duration],
    values: &[f64],
    grid: &[Duration],
    step: Duration,
) -> Vec<f64> {
    let step_ns = duration_ns(step);
    let start_ns = duration_ns(grid[0]);

    let mut sums = vec![0.0; grid.len()];
    let mut counts = vec![0usize; grid.len()];
    for (&t, &v) in sample_times.iter().zip(values) {
        let bin = ((duration_ns(t) - start_ns) / step_ns) as usize;
        if bin < grid.len() {
            sums[bin] += v;
            counts[bin] += 1;
        }
    }

    let cells: Vec<Option<f64>> = sums
        .iter()
        .zip(&counts)
        .map(|(&s, &c)| if c > 0 { Some(s / c as f64) } else { None })
        .collect();
    interpolate_gaps(&cells)
}

/// Fill empty bins by linear interpolation between the nearest known
/// neighbors. Runs touching either edge take the nearest known value; the
/// grid construction keeps the first and last bins populated, so edge runs
/// only appear on synthetic input.
fn interpolate_gaps(cells: &[Option<f64>]) -> Vec<f64> {
    let mut out = vec![0.0; cells.len()];
    let mut prev: Option<(usize, f64)> = None;
    let mut i = 0;
    while i < cells.len() {
        if let Some(v) = cells[i] {
            out[i] = v;
            prev = Some((i, v));
            i += 1;
            continue;
        }
        let mut j = i;
        while j < cells.len() && cells[j].is_none() {
            j += 1;
        }
        let next = if j < cells.len() {
            cells[j].map(|v| (j, v))
        } else {
            None
        };
        for k in i..j {
            out[k] = match (prev, next) {
                (Some((pi, pv)), Some((ni, nv))) => {
                    pv + (nv - pv) * ((k - pi) as f64) / ((ni - pi) as f64)
                }
                (Some((_, pv)), None) => pv,
                (None, Some((_, nv))) => nv,
                (None, None) => 0.0,
            };
        }
        i = j;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn driving_sample(ms: i64, speed: f64, autonomous: bool, obstacle: Option<&str>) -> DrivingSample {
        DrivingSample {
            time: Duration::milliseconds(ms),
            signals: vec![speed],
            autonomous,
            obstacle: obstacle.map(String::from),
        }
    }

    #[test]
    fn test_continuous_gap_is_linearly_interpolated() {
        let mut record = PhysioRecord::new(vec!["EDA"]);
        record.samples = vec![
            PhysioSample {
                time: Duration::milliseconds(0),
                values: vec![1.0],
            },
            PhysioSample {
                time: Duration::milliseconds(30),
                values: vec![4.0],
            },
        ];

        let resampled = resample_physio(&record, Duration::milliseconds(10));
        let values: Vec<f64> = resampled.samples.iter().map(|s| s.values[0]).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_step_columns_are_forward_filled() {
        let mut record = DrivingRecord::new(vec!["VehicleSpeed"]);
        record.samples = vec![
            driving_sample(0, 10.0, true, Some("Cone")),
            driving_sample(30, 40.0, false, None),
        ];

        let resampled = resample_driving(&record, Duration::milliseconds(10));
        assert_eq!(resampled.len(), 4);

        let obstacles: Vec<Option<&str>> = resampled
            .samples
            .iter()
            .map(|s| s.obstacle.as_deref())
            .collect();
        assert_eq!(
            obstacles,
            vec![Some("Cone"), Some("Cone"), Some("Cone"), None]
        );

        let autonomy: Vec<bool> = resampled.samples.iter().map(|s| s.autonomous).collect();
        assert_eq!(autonomy, vec![true, true, true, false]);

        // the continuous channel interpolates across the same gap
        let speeds: Vec<f64> = resampled.samples.iter().map(|s| s.signals[0]).collect();
        assert_eq!(speeds, vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_duplicate_timestamps_keep_first() {
        let mut record = DrivingRecord::new(vec!["VehicleSpeed"]);
        record.samples = vec![
            driving_sample(0, 5.0, true, None),
            driving_sample(0, 99.0, false, Some("Deer")),
            driving_sample(10, 6.0, true, None),
        ];

        let resampled = resample_driving(&record, Duration::milliseconds(10));
        assert_eq!(resampled.samples[0].signals[0], 5.0);
        assert!(resampled.samples[0].autonomous);
        assert_eq!(resampled.samples[0].obstacle, None);
    }

    #[test]
    fn test_samples_in_one_bin_are_averaged() {
        let mut record = PhysioRecord::new(vec!["ECG"]);
        record.samples = vec![
            PhysioSample {
                time: Duration::milliseconds(0),
                values: vec![1.0],
            },
            PhysioSample {
                time: Duration::milliseconds(4),
                values: vec![3.0],
            },
        ];

        let resampled = resample_physio(&record, Duration::milliseconds(10));
        assert_eq!(resampled.len(), 1);
        assert_eq!(resampled.samples[0].values[0], 2.0);
    }

    #[test]
    fn test_grid_starts_at_first_sample() {
        let mut record = PhysioRecord::new(vec!["EDA"]);
        record.samples = vec![
            PhysioSample {
                time: Duration::milliseconds(50),
                values: vec![1.0],
            },
            PhysioSample {
                time: Duration::milliseconds(70),
                values: vec![2.0],
            },
        ];

        let resampled = resample_physio(&record, Duration::milliseconds(10));
        // nothing before the first sample is fabricated
        assert_eq!(resampled.samples[0].time, Duration::milliseconds(50));
        assert_eq!(resampled.len(), 3);
    }

    #[test]
    fn test_unsorted_input_is_ordered() {
        let mut record = PhysioRecord::new(vec!["EDA"]);
        record.samples = vec![
            PhysioSample {
                time: Duration::milliseconds(20),
                values: vec![3.0],
            },
            PhysioSample {
                time: Duration::milliseconds(0),
                values: vec![1.0],
            },
        ];

        let resampled = resample_physio(&record, Duration::milliseconds(10));
        let values: Vec<f64> = resampled.samples.iter().map(|s| s.values[0]).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_nonpositive_step_yields_empty_stream() {
        let mut physio = PhysioRecord::new(vec!["EDA"]);
        physio.samples = vec![PhysioSample {
            time: Duration::zero(),
            values: vec![1.0],
        }];
        assert!(resample_physio(&physio, Duration::zero()).is_empty());
        assert!(resample_physio(&physio, Duration::milliseconds(-10)).is_empty());

        let mut driving = DrivingRecord::new(vec!["VehicleSpeed"]);
        driving.samples = vec![driving_sample(0, 5.0, true, None)];
        assert!(resample_driving(&driving, Duration::zero()).is_empty());
    }

    #[test]
    fn test_empty_stream_yields_empty_stream() {
        let record = DrivingRecord::new(vec!["VehicleSpeed"]);
        let resampled = resample_driving(&record, Duration::milliseconds(10));
        assert!(resampled.is_empty());
        assert_eq!(resampled.signal_names, vec!["VehicleSpeed".to_string()]);

        let physio = PhysioRecord::new(vec!["EDA"]);
        assert!(resample_physio(&physio, Duration::milliseconds(10)).is_empty());
    }
}
