//! Historical data loading
//!
//! Turns raw payment records into one net-change entry per calendar day.

use crate::backend::FinancialBackend;
use crate::config::HistoryConfig;
use crate::error::CollisionError;
use crate::models::{DailyRecord, DateWindow, HistoricalSeries, Payment};
use crate::Result;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use tracing::{info, warn};

pub struct HistoricalDataLoader<'a> {
    backend: &'a dyn FinancialBackend,
    config: &'a HistoryConfig,
}

impl<'a> HistoricalDataLoader<'a> {
    pub fn new(backend: &'a dyn FinancialBackend, config: &'a HistoryConfig) -> Self {
        Self { backend, config }
    }

    /// Fetch payments for `org_id` and aggregate them per day.
    ///
    /// With no explicit window the last `window_days` before `today` are used.
    pub async fn load(
        &self,
        org_id: &str,
        window: Option<DateWindow>,
        today: NaiveDate,
    ) -> Result<HistoricalSeries> {
        if org_id.trim().is_empty() {
            return Err(CollisionError::MissingOrgId);
        }

        let window = window.unwrap_or_else(|| {
            DateWindow::since(today - Duration::days(self.config.window_days))
        });

        let payments = self.backend.payments(org_id, window).await?;
        if payments.is_empty() {
            warn!(org_id, "No payments returned");
            return Err(CollisionError::NoPaymentHistory(org_id.to_string()));
        }

        let series = build_series(&payments, self.config)?;

        info!(
            org_id,
            days = series.count,
            partial = series.partial_history,
            "Loaded payment history"
        );

        Ok(series)
    }
}

/// Sum payments per date, then apply the minimum-history policy
pub fn build_series(payments: &[Payment], config: &HistoryConfig) -> Result<HistoricalSeries> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for payment in payments {
        *by_date.entry(payment.date).or_insert(0.0) += payment.signed_amount();
    }

    let count = by_date.len();
    let mut partial_history = false;

    if count < config.min_days {
        warn!(
            days = count,
            required = config.min_days,
            "Insufficient payment history"
        );
        if !config.allow_partial || count == 0 {
            return Err(CollisionError::InsufficientHistory {
                days: count,
                required: config.min_days,
            });
        }
        partial_history = true;
    }

    let records: Vec<DailyRecord> = by_date
        .into_iter()
        .map(|(date, net_change)| DailyRecord { date, net_change })
        .collect();

    let values: Vec<f64> = records.iter().map(|r| r.net_change).collect();

    Ok(HistoricalSeries {
        mean: mean(&values),
        std_dev: population_std(&values),
        count,
        records,
        partial_history,
    })
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
