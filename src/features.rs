//! Editing-rhythm feature derivation
//!
//! Pure functions over event timestamps and bucket series. Nothing here
//! touches ledger state; the ledger collects timestamps and calls in.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::config::LedgerConfig;
use crate::types::{TimeBreakdown, TimeDistribution};

/// Successive gaps between timestamps in milliseconds.
///
/// Out-of-order timestamps produce a zero gap rather than a negative one.
pub fn inter_event_gaps_ms(timestamps: &[DateTime<Utc>]) -> Vec<i64> {
    timestamps
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_milliseconds().max(0))
        .collect()
}

/// Split gaps into thinking, editing and idle time.
///
/// A gap above the idle threshold contributes the threshold itself to
/// thinking and the excess to idle. A gap above the thinking threshold is
/// thinking in full. Anything shorter is editing.
pub fn time_breakdown(gaps_ms: &[i64], config: &LedgerConfig) -> TimeBreakdown {
    let idle_threshold = config.idle_threshold_ms;
    let thinking_threshold = config.thinking_threshold_ms;

    let mut thinking_ms = 0;
    let mut idle_ms = 0;
    let mut total_ms = 0;

    for &gap in gaps_ms {
        total_ms += gap;
        if gap > idle_threshold {
            thinking_ms += idle_threshold;
            idle_ms += gap - idle_threshold;
        } else if gap > thinking_threshold {
            thinking_ms += gap;
        }
    }

    TimeBreakdown {
        thinking_ms,
        editing_ms: total_ms - thinking_ms - idle_ms,
        idle_ms,
        total_ms,
    }
}

/// Percentages of thinking and editing time.
///
/// Both are normalized by `total - idle`, so they only sum to 100 when the
/// session had no idle stretches. Zero when there is no non-idle time.
pub fn time_distribution(breakdown: &TimeBreakdown) -> TimeDistribution {
    let active_ms = breakdown.total_ms - breakdown.idle_ms;
    if active_ms <= 0 {
        return TimeDistribution::default();
    }
    let active = active_ms as f64;
    TimeDistribution {
        thinking_time: 100.0 * breakdown.thinking_ms as f64 / active,
        editing_time: 100.0 * breakdown.editing_ms as f64 / active,
    }
}

/// Regularity of inter-event gaps.
///
/// Formula: `sqrt(sample_std_dev) / mean`, the square root of the standard
/// deviation rather than the deviation itself.
pub fn coefficient_of_variation(gaps_ms: &[i64]) -> f64 {
    if gaps_ms.is_empty() {
        return 0.0;
    }

    let n = gaps_ms.len() as f64;
    let mean = gaps_ms.iter().sum::<i64>() as f64 / n;
    if mean <= 0.0 {
        return 0.0;
    }

    let std_dev = if gaps_ms.len() < 2 {
        0.0
    } else {
        let sum_sq: f64 = gaps_ms
            .iter()
            .map(|&g| (g as f64 - mean).powi(2))
            .sum();
        (sum_sq / (n - 1.0)).sqrt()
    };

    std_dev.sqrt() / mean
}

/// Count events per fixed-width bucket anchored at the first timestamp.
///
/// Only non-empty buckets are returned, in time order. A non-positive width
/// (rejected by `LedgerConfig::validate`) puts every event in one bucket.
pub fn events_per_bucket(timestamps: &[DateTime<Utc>], bucket_width_ms: i64) -> Vec<usize> {
    let Some(first) = timestamps.first() else {
        return Vec::new();
    };
    if bucket_width_ms <= 0 {
        return vec![timestamps.len()];
    }

    let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
    for ts in timestamps {
        let offset = (*ts - *first).num_milliseconds().max(0);
        *buckets.entry(offset / bucket_width_ms).or_insert(0) += 1;
    }

    buckets.into_values().collect()
}

/// Variance-to-mean ratio of a counting series (sample variance).
///
/// `None` when the series is empty or its mean is zero.
pub fn fano_factor(series: &[usize]) -> Option<f64> {
    if series.is_empty() {
        return None;
    }

    let n = series.len() as f64;
    let mean = series.iter().sum::<usize>() as f64 / n;
    if mean == 0.0 {
        return None;
    }

    let variance = if series.len() < 2 {
        0.0
    } else {
        series
            .iter()
            .map(|&c| (c as f64 - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0)
    };

    Some(variance / mean)
}

/// Percentage of characters attributed to assisted insertion
pub fn assisted_percentage(assisted: usize, single: usize) -> f64 {
    let total = assisted + single;
    if total == 0 {
        return 0.0;
    }
    100.0 * assisted as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(offsets_ms: &[i64]) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        offsets_ms
            .iter()
            .map(|&ms| base + Duration::milliseconds(ms))
            .collect()
    }

    #[test]
    fn test_gaps() {
        let ts = at(&[0, 1_000, 1_500, 4_500]);
        assert_eq!(inter_event_gaps_ms(&ts), vec![1_000, 500, 3_000]);
        assert!(inter_event_gaps_ms(&ts[..1]).is_empty());
    }

    #[test]
    fn test_out_of_order_gap_is_zero() {
        let ts = at(&[5_000, 1_000]);
        assert_eq!(inter_event_gaps_ms(&ts), vec![0]);
    }

    #[test]
    fn test_time_breakdown_classification() {
        let config = LedgerConfig::default();
        // 1s editing, 20s thinking, 700s = 600s thinking + 100s idle
        let gaps = vec![1_000, 20_000, 700_000];
        let breakdown = time_breakdown(&gaps, &config);

        assert_eq!(
            breakdown,
            TimeBreakdown {
                thinking_ms: 620_000,
                editing_ms: 1_000,
                idle_ms: 100_000,
                total_ms: 721_000,
            }
        );
    }

    #[test]
    fn test_time_distribution_excludes_idle_from_denominator() {
        let config = LedgerConfig::default();
        let breakdown = time_breakdown(&[1_000, 20_000, 700_000], &config);
        let dist = time_distribution(&breakdown);

        let active = 621_000.0;
        assert!((dist.thinking_time - 100.0 * 620_000.0 / active).abs() < 1e-9);
        assert!((dist.editing_time - 100.0 * 1_000.0 / active).abs() < 1e-9);
        assert!((dist.thinking_time + dist.editing_time - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_distribution_boundaries_are_exclusive() {
        let config = LedgerConfig::default();
        // Exactly at the thinking threshold is still editing
        let breakdown = time_breakdown(&[15_000, 15_001], &config);
        assert_eq!(breakdown.thinking_ms, 15_001);
        assert_eq!(breakdown.editing_ms, 15_000);
    }

    #[test]
    fn test_time_distribution_empty() {
        let breakdown = time_breakdown(&[], &LedgerConfig::default());
        assert_eq!(time_distribution(&breakdown), TimeDistribution::default());

        let zero_gaps = time_breakdown(&[0, 0], &LedgerConfig::default());
        assert_eq!(time_distribution(&zero_gaps), TimeDistribution::default());
    }

    #[test]
    fn test_coefficient_of_variation_formula() {
        // gaps 1000, 3000: mean 2000, sample sd = sqrt(2_000_000) ~ 1414.21
        let cv = coefficient_of_variation(&[1_000, 3_000]);
        let expected = (2_000_000f64).sqrt().sqrt() / 2_000.0;
        assert!((cv - expected).abs() < 1e-12);
    }

    #[test]
    fn test_coefficient_of_variation_degenerate() {
        assert_eq!(coefficient_of_variation(&[]), 0.0);
        assert_eq!(coefficient_of_variation(&[0, 0, 0]), 0.0);
        // single gap has no spread
        assert_eq!(coefficient_of_variation(&[2_500]), 0.0);
        // regular arrivals have no spread either
        assert_eq!(coefficient_of_variation(&[500, 500, 500]), 0.0);
    }

    #[test]
    fn test_events_per_bucket_drops_empty_buckets() {
        // buckets: [0,5s) -> 3, [5s,10s) -> 0, [10s,15s) -> 1, [30s,35s) -> 2
        let ts = at(&[0, 1_000, 4_999, 12_000, 30_000, 34_000]);
        assert_eq!(events_per_bucket(&ts, 5_000), vec![3, 1, 2]);
    }

    #[test]
    fn test_events_per_bucket_empty() {
        assert!(events_per_bucket(&[], 5_000).is_empty());
    }

    #[test]
    fn test_fano_factor() {
        assert_eq!(fano_factor(&[5, 5, 5, 5]), Some(0.0));
        assert_eq!(fano_factor(&[]), None);
        assert_eq!(fano_factor(&[0, 0]), None);
        assert_eq!(fano_factor(&[7]), Some(0.0));

        // mean 2, sample variance ((1 + 1 + 1 + 1) / 3)
        let fano = fano_factor(&[1, 3, 1, 3]).unwrap();
        assert!((fano - (4.0 / 3.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_assisted_percentage() {
        assert_eq!(assisted_percentage(0, 0), 0.0);
        assert_eq!(assisted_percentage(25, 75), 25.0);
        assert_eq!(assisted_percentage(10, 0), 100.0);
    }
}
