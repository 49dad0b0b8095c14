//! 91-day base forecast
//!
//! HISTORY → SEASONALITY → FEATURES → TRAIN → ROLL FORWARD → DRIVERS
//!
//! A new model is trained on every call. With the same history and seed the
//! output is identical, which is what the fingerprint in `ModelInfo` attests.

pub mod drivers;
pub mod features;
pub mod forest;
pub mod history;
pub mod predictor;
pub mod seasonality;

pub use drivers::DriverIdentifier;
pub use history::HistoricalDataLoader;
pub use predictor::{BalancePredictor, TrainedPredictor};
pub use seasonality::analyze_seasonality;

use crate::audit::compute_series_fingerprint;
use crate::backend::FinancialBackend;
use crate::config::AgentConfig;
use crate::models::{DateWindow, Forecast, ForecastDay, ForecastSummary, ModelInfo};
use crate::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

pub const FORECAST_HORIZON_DAYS: usize = 91;

const MODEL_TYPE: &str = "random_forest_regressor";

#[derive(Debug, Clone, Default)]
pub struct ForecastRequest {
    /// History window; defaults to the configured look-back
    pub window: Option<DateWindow>,
    /// Known opening balance; fetched from the organization summary if absent
    pub opening_balance: Option<f64>,
}

pub struct ForecastGenerator<'a> {
    backend: &'a dyn FinancialBackend,
    config: &'a AgentConfig,
}

impl<'a> ForecastGenerator<'a> {
    pub fn new(backend: &'a dyn FinancialBackend, config: &'a AgentConfig) -> Self {
        Self { backend, config }
    }

    pub async fn generate(
        &self,
        org_id: &str,
        request: ForecastRequest,
        as_of: DateTime<Utc>,
    ) -> Result<Forecast> {
        let today = as_of.date_naive();

        let series = HistoricalDataLoader::new(self.backend, &self.config.history)
            .load(org_id, request.window, today)
            .await?;
        let seasonality = analyze_seasonality(&series);

        let model = BalancePredictor::new(&self.config.model).train(&series)?;

        let opening_balance = match request.opening_balance {
            Some(balance) => balance,
            None => self.fetch_opening_balance(org_id).await,
        };
        let payments = self
            .backend
            .payments(org_id, DateWindow::default())
            .await
            .unwrap_or_else(|e| {
                warn!(org_id, error = %e, "Seed payment fetch failed, seeding from opening balance");
                Vec::new()
            });

        // end_date exists: the loader never returns an empty series
        let starting_balance = match series.end_date() {
            Some(last) => predictor::seed_balance(opening_balance, &payments, last),
            None => opening_balance,
        };

        let days = model.forecast(&series, starting_balance, FORECAST_HORIZON_DAYS)?;
        let drivers = DriverIdentifier::new(self.backend).identify(org_id, today).await;

        let model_info = ModelInfo {
            model_type: MODEL_TYPE.to_string(),
            n_estimators: self.config.model.n_estimators,
            max_depth: self.config.model.max_depth,
            seed: self.config.model.seed,
            training_samples: model.training_samples,
            validation_samples: model.validation_samples,
            mape: model.metrics.mape,
            rmse: model.metrics.rmse,
            residual_std: model.residual_std,
            feature_importance: model.feature_importance(),
            trained_at: as_of,
            input_fingerprint: compute_series_fingerprint(&series)?,
        };
        let summary = summarize(&days, model_info.mape);

        info!(
            org_id,
            days = days.len(),
            starting_balance,
            ending_balance = ?summary.ending_balance,
            "Forecast generated"
        );

        Ok(Forecast {
            days,
            seasonality,
            model_info,
            drivers,
            summary,
            partial_history: series.partial_history,
            history_days: series.count,
        })
    }

    async fn fetch_opening_balance(&self, org_id: &str) -> f64 {
        match self.backend.organization_summary(org_id).await {
            Ok(summary) => summary.opening_balance,
            Err(e) => {
                warn!(org_id, error = %e, "Summary fetch failed, opening balance 0");
                0.0
            }
        }
    }
}

pub fn summarize(days: &[ForecastDay], mape: Option<f64>) -> ForecastSummary {
    let balances = days.iter().map(|d| d.predicted_balance);

    ForecastSummary {
        forecast_days: days.len(),
        forecast_start: days.first().map(|d| d.date),
        forecast_end: days.last().map(|d| d.date),
        starting_balance: days.first().map(|d| d.predicted_balance),
        ending_balance: days.last().map(|d| d.predicted_balance),
        min_balance: balances.clone().reduce(f64::min),
        max_balance: balances.reduce(f64::max),
        model_accuracy_mape: mape.map(predictor::round2),
    }
}
