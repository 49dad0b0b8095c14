//! Feature engineering for the balance predictor
//!
//! Every vector only looks backwards: lag and rolling terms for day `i` are
//! built from days `< i`, so training never sees the target it predicts.

use super::history::mean;
use chrono::{Datelike, NaiveDate};

pub const FEATURE_COUNT: usize = 10;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "day_of_week",
    "day_of_month",
    "month",
    "is_start_month",
    "is_end_month",
    "lag_1",
    "lag_7",
    "lag_30",
    "rolling_7",
    "rolling_30",
];

pub type FeatureVector = [f64; FEATURE_COUNT];

/// Lag and rolling terms, independent of where the values came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagTerms {
    pub lag_1: f64,
    pub lag_7: f64,
    pub lag_30: f64,
    pub rolling_7: f64,
    pub rolling_30: f64,
}

impl LagTerms {
    /// Terms for position `values.len()` given everything before it.
    /// Missing offsets use `fallback`.
    pub fn from_past(values: &[f64], fallback: f64) -> Self {
        let n = values.len();
        let lag = |offset: usize| if n >= offset { values[n - offset] } else { fallback };
        let rolling = |window: usize| {
            if n == 0 {
                fallback
            } else {
                mean(&values[n.saturating_sub(window)..])
            }
        };

        Self {
            lag_1: lag(1),
            lag_7: lag(7),
            lag_30: lag(30),
            rolling_7: rolling(7),
            rolling_30: rolling(30),
        }
    }
}

/// Assemble the full vector for `date`
pub fn feature_vector(date: NaiveDate, lags: LagTerms) -> FeatureVector {
    let dom = date.day();
    [
        date.weekday().num_days_from_monday() as f64,
        dom as f64,
        date.month() as f64,
        if dom <= 5 { 1.0 } else { 0.0 },
        if dom >= 25 { 1.0 } else { 0.0 },
        lags.lag_1,
        lags.lag_7,
        lags.lag_30,
        lags.rolling_7,
        lags.rolling_30,
    ]
}

#[derive(Debug, Clone, Default)]
pub struct FeatureMatrix {
    pub rows: Vec<FeatureVector>,
    pub targets: Vec<f64>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TrainValidationSplit {
    pub train: FeatureMatrix,
    pub validation: FeatureMatrix,
}

/// One row per historical day; the target is that day's net change
pub fn build_feature_matrix(dates: &[NaiveDate], values: &[f64]) -> FeatureMatrix {
    let rows = dates
        .iter()
        .enumerate()
        .map(|(i, date)| feature_vector(*date, LagTerms::from_past(&values[..i], 0.0)))
        .collect();

    FeatureMatrix {
        rows,
        targets: values.to_vec(),
    }
}

/// Temporal split: leading `train_fraction` trains, the tail validates
pub fn temporal_split(matrix: FeatureMatrix, train_fraction: f64) -> TrainValidationSplit {
    let split_idx = ((matrix.len() as f64) * train_fraction).floor() as usize;
    let split_idx = split_idx.min(matrix.len());

    let FeatureMatrix {
        mut rows,
        mut targets,
    } = matrix;
    let validation_rows = rows.split_off(split_idx);
    let validation_targets = targets.split_off(split_idx);

    TrainValidationSplit {
        train: FeatureMatrix { rows, targets },
        validation: FeatureMatrix {
            rows: validation_rows,
            targets: validation_targets,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    #[test]
    fn test_calendar_features() {
        // Saturday 2025-03-01
        let v = feature_vector(dates(1)[0], LagTerms::from_past(&[], 0.0));
        assert_eq!(v[0], 5.0);
        assert_eq!(v[1], 1.0);
        assert_eq!(v[2], 3.0);
        assert_eq!(v[3], 1.0);
        assert_eq!(v[4], 0.0);

        let end = feature_vector(
            NaiveDate::from_ymd_opt(2025, 3, 25).unwrap(),
            LagTerms::from_past(&[], 0.0),
        );
        assert_eq!(end[3], 0.0);
        assert_eq!(end[4], 1.0);
    }

    #[test]
    fn test_lags_default_to_zero_without_history() {
        let values: Vec<f64> = (1..=40).map(|v| v as f64).collect();
        let matrix = build_feature_matrix(&dates(40), &values);

        assert_eq!(&matrix.rows[0][5..], &[0.0; 5]);

        // day 3 has lag_1 only
        let row = matrix.rows[3];
        assert_eq!(row[5], 3.0);
        assert_eq!(row[6], 0.0);
        assert_eq!(row[7], 0.0);
        assert_eq!(row[8], 2.0);

        // day 35 sees every offset
        let row = matrix.rows[35];
        assert_eq!(row[5], 35.0);
        assert_eq!(row[6], 29.0);
        assert_eq!(row[7], 6.0);
        assert_eq!(row[8], 32.0);
        assert_eq!(row[9], 20.5);
        assert_eq!(matrix.targets[35], 36.0);
    }

    #[test]
    fn test_from_past_fallback() {
        let terms = LagTerms::from_past(&[4.0, 6.0], 1.5);
        assert_eq!(terms.lag_1, 6.0);
        assert_eq!(terms.lag_7, 1.5);
        assert_eq!(terms.lag_30, 1.5);
        assert_eq!(terms.rolling_7, 5.0);
        assert_eq!(terms.rolling_30, 5.0);
    }

    #[test]
    fn test_temporal_split_keeps_order() {
        let values: Vec<f64> = (0..10).map(|v| v as f64).collect();
        let split = temporal_split(build_feature_matrix(&dates(10), &values), 0.8);

        assert_eq!(split.train.len(), 8);
        assert_eq!(split.validation.len(), 2);
        assert_eq!(split.train.targets.last(), Some(&7.0));
        assert_eq!(split.validation.targets, vec![8.0, 9.0]);
    }

    #[test]
    fn test_split_floor() {
        let values = vec![1.0; 7];
        let split = temporal_split(build_feature_matrix(&dates(7), &values), 0.8);
        assert_eq!(split.train.len(), 5);
        assert_eq!(split.validation.len(), 2);
    }
}
