//! Balance predictor
//!
//! Trains the tree ensemble on the temporal split of the history, measures it
//! on the held-out tail and rolls it forward day by day. The model is built
//! fresh for every call and never cached.

use super::features::{
    build_feature_matrix, feature_vector, temporal_split, FeatureMatrix, LagTerms, FEATURE_NAMES,
};
use super::forest::{ForestParams, RandomForest};
use super::history::{mean, population_std};
use crate::config::ModelConfig;
use crate::error::CollisionError;
use crate::models::{ForecastDay, HistoricalSeries, Payment};
use crate::Result;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Two-sided 95% normal quantile
const CONFIDENCE_Z: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationMetrics {
    /// Mean absolute percentage error with +1 denominator smoothing
    pub mape: Option<f64>,
    pub rmse: Option<f64>,
    pub residual_std: Option<f64>,
}

impl ValidationMetrics {
    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Self {
        if actual.is_empty() {
            return Self {
                mape: None,
                rmse: None,
                residual_std: None,
            };
        }

        let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(y, p)| y - p).collect();
        let n = residuals.len() as f64;

        let mape = actual
            .iter()
            .zip(&residuals)
            .map(|(y, r)| r.abs() / (y.abs() + 1.0))
            .sum::<f64>()
            / n
            * 100.0;
        let rmse = (residuals.iter().map(|r| r * r).sum::<f64>() / n).sqrt();

        Self {
            mape: Some(mape),
            rmse: Some(rmse),
            residual_std: Some(population_std(&residuals)),
        }
    }
}

pub struct BalancePredictor {
    params: ForestParams,
    train_fraction: f64,
}

impl BalancePredictor {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            params: ForestParams {
                n_estimators: config.n_estimators,
                max_depth: config.max_depth,
                min_samples_split: 2,
                seed: config.seed,
            },
            train_fraction: config.train_fraction,
        }
    }

    pub fn train(&self, series: &HistoricalSeries) -> Result<TrainedPredictor> {
        let dates: Vec<NaiveDate> = series.records.iter().map(|r| r.date).collect();
        let values = series.net_changes();

        let split = temporal_split(build_feature_matrix(&dates, &values), self.train_fraction);
        let FeatureMatrix {
            rows: train_rows,
            targets: train_targets,
        } = split.train;

        let forest = RandomForest::fit(&train_rows, &train_targets, self.params)?;

        let predicted = forest.predict_many(&split.validation.rows);
        let metrics = ValidationMetrics::evaluate(&split.validation.targets, &predicted);
        let residual_std = metrics.residual_std.unwrap_or(series.std_dev);

        info!(
            training_samples = train_rows.len(),
            validation_samples = split.validation.len(),
            mape = ?metrics.mape,
            rmse = ?metrics.rmse,
            "Model trained"
        );

        Ok(TrainedPredictor {
            forest,
            metrics,
            residual_std,
            training_samples: train_rows.len(),
            validation_samples: split.validation.len(),
        })
    }
}

pub struct TrainedPredictor {
    forest: RandomForest,
    pub metrics: ValidationMetrics,
    /// Validation residual spread, or the history's spread without validation
    pub residual_std: f64,
    pub training_samples: usize,
    pub validation_samples: usize,
}

impl TrainedPredictor {
    /// Autoregressive roll-forward of `horizon` days after the last history date.
    ///
    /// Lag and rolling terms come from earlier predictions, falling back to
    /// the historical mean until enough predictions exist.
    pub fn forecast(
        &self,
        series: &HistoricalSeries,
        starting_balance: f64,
        horizon: usize,
    ) -> Result<Vec<ForecastDay>> {
        let last_date = series.end_date().ok_or_else(|| {
            CollisionError::ModelTraining("cannot forecast from an empty history".to_string())
        })?;

        let fallback = mean(&series.net_changes());
        let band = CONFIDENCE_Z * self.residual_std;

        let mut predicted_changes: Vec<f64> = Vec::with_capacity(horizon);
        let mut balance = starting_balance;
        let mut days = Vec::with_capacity(horizon);

        for offset in 1..=horizon {
            let date = last_date + Duration::days(offset as i64);
            let x = feature_vector(date, LagTerms::from_past(&predicted_changes, fallback));

            let change = self.forest.predict(&x);
            predicted_changes.push(change);
            balance += change;

            days.push(ForecastDay {
                date,
                predicted_balance: round2(balance),
                daily_change: round2(change),
                confidence_upper: round2(balance + band),
                confidence_lower: round2(balance - band),
            });
        }

        debug!(
            horizon,
            start = %days.first().map(|d| d.date).unwrap_or(last_date),
            ending_balance = balance,
            "Forecast rolled forward"
        );

        Ok(days)
    }

    pub fn feature_importance(&self) -> BTreeMap<String, f64> {
        FEATURE_NAMES
            .iter()
            .zip(self.forest.feature_importances())
            .map(|(name, weight)| (name.to_string(), weight))
            .collect()
    }
}

/// Opening balance plus every signed payment on or before `last_date`
pub fn seed_balance(opening_balance: f64, payments: &[Payment], last_date: NaiveDate) -> f64 {
    opening_balance
        + payments
            .iter()
            .filter(|p| p.date <= last_date)
            .map(Payment::signed_amount)
            .sum::<f64>()
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::history::build_series;
    use crate::config::HistoryConfig;
    use crate::models::PaymentDirection;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
    }

    fn series_from(values: &[f64]) -> HistoricalSeries {
        let payments: Vec<Payment> = values
            .iter()
            .enumerate()
            .map(|(i, v)| Payment::new(start() + Duration::days(i as i64), *v, PaymentDirection::Unspecified))
            .collect();
        let config = HistoryConfig {
            min_days: 1,
            ..HistoryConfig::default()
        };
        build_series(&payments, &config).unwrap()
    }

    fn small_model() -> ModelConfig {
        ModelConfig {
            n_estimators: 25,
            ..ModelConfig::default()
        }
    }

    fn wavy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 1000.0 * ((i % 7) as f64 - 3.0) + 50.0 * (i % 30) as f64)
            .collect()
    }

    #[test]
    fn test_validation_metrics() {
        let metrics = ValidationMetrics::evaluate(&[9.0, -4.0], &[10.0, -1.0]);
        // |−1|/10 + |−3|/5 = 0.1 + 0.6 -> mean 0.35
        assert!((metrics.mape.unwrap() - 35.0).abs() < 1e-9);
        assert!((metrics.rmse.unwrap() - 5.0_f64.sqrt()).abs() < 1e-9);
        assert!((metrics.residual_std.unwrap() - 1.0).abs() < 1e-9);

        let empty = ValidationMetrics::evaluate(&[], &[]);
        assert_eq!(empty.mape, None);
    }

    #[test]
    fn test_forecast_covers_91_consecutive_days() {
        let series = series_from(&wavy(120));
        let model = BalancePredictor::new(&small_model()).train(&series).unwrap();
        let days = model.forecast(&series, 10_000.0, 91).unwrap();

        assert_eq!(days.len(), 91);
        let last = series.end_date().unwrap();
        for (i, day) in days.iter().enumerate() {
            assert_eq!(day.date, last + Duration::days(i as i64 + 1));
            assert!(day.confidence_upper >= day.predicted_balance);
            assert!(day.confidence_lower <= day.predicted_balance);
        }
    }

    #[test]
    fn test_forecast_is_deterministic() {
        let series = series_from(&wavy(100));
        let config = small_model();

        let a = BalancePredictor::new(&config).train(&series).unwrap();
        let b = BalancePredictor::new(&config).train(&series).unwrap();

        let fa = a.forecast(&series, 0.0, 91).unwrap();
        let fb = b.forecast(&series, 0.0, 91).unwrap();
        assert!(fa.iter().zip(&fb).all(|(x, y)| {
            x.predicted_balance.to_bits() == y.predicted_balance.to_bits()
                && x.confidence_upper.to_bits() == y.confidence_upper.to_bits()
        }));
        assert_eq!(a.feature_importance(), b.feature_importance());
    }

    #[test]
    fn test_constant_history_projects_flat_band() {
        let series = series_from(&vec![250.0; 100]);
        let model = BalancePredictor::new(&small_model()).train(&series).unwrap();
        let days = model.forecast(&series, 1000.0, 91).unwrap();

        assert_eq!(model.residual_std, 0.0);
        assert_eq!(days[0].predicted_balance, 1250.0);
        assert_eq!(days[90].predicted_balance, 1000.0 + 250.0 * 91.0);
        assert_eq!(days[90].confidence_upper, days[90].predicted_balance);
    }

    #[test]
    fn test_residual_fallback_without_validation() {
        let series = series_from(&[100.0, 300.0]);
        let config = ModelConfig {
            train_fraction: 1.0,
            ..small_model()
        };
        let model = BalancePredictor::new(&config).train(&series).unwrap();
        assert_eq!(model.validation_samples, 0);
        assert_eq!(model.residual_std, series.std_dev);
        assert_eq!(model.metrics.rmse, None);
    }

    #[test]
    fn test_single_day_history_cannot_train() {
        let series = series_from(&[100.0]);
        let result = BalancePredictor::new(&small_model()).train(&series);
        assert!(matches!(result, Err(CollisionError::ModelTraining(_))));
    }

    #[test]
    fn test_seed_balance_stops_at_last_date() {
        let payments = vec![
            Payment::new(start(), 100.0, PaymentDirection::Inflow),
            Payment::new(start() + Duration::days(1), 40.0, PaymentDirection::Outflow),
            Payment::new(start() + Duration::days(5), 999.0, PaymentDirection::Inflow),
        ];
        assert_eq!(seed_balance(10.0, &payments, start() + Duration::days(1)), 70.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(-2.344), -2.34);
    }
}
