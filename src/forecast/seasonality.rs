//! Seasonality profile of the daily net-change series

use super::history::{mean, population_std};
use crate::models::{HistoricalSeries, Seasonality, SeasonalityStrength};
use chrono::Datelike;
use std::collections::BTreeMap;

/// Weekday / day-of-month averages, linear trend and volatility of a series
pub fn analyze_seasonality(series: &HistoricalSeries) -> Seasonality {
    let mut by_weekday: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    let mut by_month_day: BTreeMap<u32, Vec<f64>> = BTreeMap::new();

    for record in &series.records {
        by_weekday
            .entry(record.date.weekday().num_days_from_monday())
            .or_default()
            .push(record.net_change);
        by_month_day
            .entry(record.date.day())
            .or_default()
            .push(record.net_change);
    }

    let day_of_week_avg = (0..7)
        .map(|dow| (dow, by_weekday.get(&dow).map_or(0.0, |v| mean(v))))
        .collect();

    let day_of_month_avg = (1..=31)
        .map(|dom| (dom, by_month_day.get(&dom).map(|v| mean(v))))
        .collect();

    let values = series.net_changes();
    let volatility = population_std(&values);
    let mean_net_daily = mean(&values);

    let seasonality_strength = if volatility > mean_net_daily.abs() * 0.5 {
        SeasonalityStrength::Strong
    } else {
        SeasonalityStrength::Moderate
    };

    Seasonality {
        day_of_week_avg,
        day_of_month_avg,
        trend_slope: trend_slope(&values),
        volatility,
        mean_net_daily,
        seasonality_strength,
    }
}

/// Least-squares slope of `values` against their index; 0 below two points
pub fn trend_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);

    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
