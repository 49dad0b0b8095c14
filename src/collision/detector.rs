//! Mandatory-expense buckets and collision detection

use crate::models::{
    Bill, BillLineItem, Collision, ForecastDay, MandatoryExpenseBucket, MandatoryExpenses,
};
use chrono::NaiveDate;
use tracing::debug;

/// Category fragments that mark a bill as a mandatory obligation
pub const MANDATORY_KEYWORDS: [&str; 8] = [
    "payroll",
    "salary",
    "rent",
    "loan",
    "emi",
    "gst",
    "tax",
    "statutory",
];

pub fn is_mandatory_category(category: &str) -> bool {
    let category = category.to_lowercase();
    MANDATORY_KEYWORDS.iter().any(|k| category.contains(k))
}

/// Group mandatory bills by due date. Bills without a due date are skipped.
pub fn build_mandatory_expenses(bills: &[Bill]) -> MandatoryExpenses {
    let mut expenses = MandatoryExpenses::default();

    for bill in bills {
        let Some(due_date) = bill.due_date else {
            debug!(bill_id = ?bill.bill_id, "Skipping bill without due date");
            continue;
        };
        if !is_mandatory_category(&bill.category) {
            continue;
        }

        let category = bill.category.to_lowercase();
        let bucket = expenses.buckets.entry(due_date).or_default();
        bucket.total_amount += bill.amount;
        if !bucket.categories.contains(&category) {
            bucket.categories.push(category.clone());
        }
        bucket.line_items.push(BillLineItem {
            bill_id: bill.bill_id.clone(),
            category,
            amount: bill.amount,
            due_date,
        });
    }

    expenses.total_amount = expenses.buckets.values().map(|b| b.total_amount).sum();
    expenses
}

/// Flag every forecast day whose balance net of that day's mandatory
/// obligations falls below `minimum_balance`. Output is in date order.
pub fn detect_collisions(
    days: &[ForecastDay],
    mandatory: &MandatoryExpenses,
    minimum_balance: f64,
    available_credit: f64,
    today: NaiveDate,
) -> Vec<Collision> {
    let empty = MandatoryExpenseBucket::default();

    days.iter()
        .filter_map(|day| {
            let bucket = mandatory.buckets.get(&day.date).unwrap_or(&empty);
            let balance_after_mandatory = day.predicted_balance - bucket.total_amount;
            if balance_after_mandatory >= minimum_balance {
                return None;
            }

            let deficit_amount = minimum_balance - balance_after_mandatory;
            Some(Collision {
                collision_date: day.date,
                predicted_balance: day.predicted_balance,
                mandatory_expenses: bucket.total_amount,
                balance_after_mandatory,
                deficit_amount,
                credit_can_cover: deficit_amount <= available_credit,
                days_from_now: (day.date - today).num_days(),
                expense_categories: bucket.categories.clone(),
                bills: bucket.line_items.clone(),
                severity: None,
                mitigation: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
    }

    fn bill(category: &str, amount: f64, due_in: Option<i64>) -> Bill {
        Bill {
            bill_id: Some(format!("b-{}", category)),
            category: category.to_string(),
            amount,
            due_date: due_in.map(|d| today() + Duration::days(d)),
            status: "open".to_string(),
        }
    }

    fn flat_forecast(balance: f64, days: i64) -> Vec<ForecastDay> {
        (0..days)
            .map(|d| ForecastDay {
                date: today() + Duration::days(d),
                predicted_balance: balance,
                daily_change: 0.0,
                confidence_upper: balance,
                confidence_lower: balance,
            })
            .collect()
    }

    #[test]
    fn test_keyword_matching() {
        assert!(is_mandatory_category("Payroll"));
        assert!(is_mandatory_category("office rent"));
        assert!(is_mandatory_category("gst_payment"));
        assert!(is_mandatory_category("loan_emi"));
        assert!(!is_mandatory_category("marketing"));
        assert!(!is_mandatory_category(""));
    }

    #[test]
    fn test_buckets_by_due_date() {
        let bills = vec![
            bill("payroll", 100.0, Some(3)),
            bill("rent", 50.0, Some(3)),
            bill("payroll", 10.0, Some(3)),
            bill("marketing", 999.0, Some(3)),
            bill("tax", 25.0, None),
            bill("loan", 40.0, Some(10)),
        ];
        let expenses = build_mandatory_expenses(&bills);

        assert_eq!(expenses.buckets.len(), 2);
        assert_eq!(expenses.total_amount, 200.0);

        let bucket = &expenses.buckets[&(today() + Duration::days(3))];
        assert_eq!(bucket.total_amount, 160.0);
        assert_eq!(bucket.line_items.len(), 3);
        assert_eq!(bucket.categories, vec!["payroll".to_string(), "rent".to_string()]);
    }

    #[test]
    fn test_collision_on_mandatory_date() {
        let expenses = build_mandatory_expenses(&[bill("salary", 50.0, Some(5))]);
        let collisions = detect_collisions(&flat_forecast(100.0, 10), &expenses, 60.0, 0.0, today());

        assert_eq!(collisions.len(), 1);
        let c = &collisions[0];
        assert_eq!(c.collision_date, today() + Duration::days(5));
        assert_eq!(c.balance_after_mandatory, 50.0);
        assert_eq!(c.deficit_amount, 10.0);
        assert_eq!(c.days_from_now, 5);
        assert!(!c.credit_can_cover);
        assert_eq!(c.expense_categories, vec!["salary".to_string()]);
        assert!(c.severity.is_none());
    }

    #[test]
    fn test_floor_equality_is_not_a_collision() {
        let collisions =
            detect_collisions(&flat_forecast(1000.0, 5), &MandatoryExpenses::default(), 1000.0, 0.0, today());
        assert!(collisions.is_empty());
    }

    #[test]
    fn test_deficits_non_negative_and_credit_cover() {
        let days: Vec<ForecastDay> = (0..30)
            .map(|d| ForecastDay {
                date: today() + Duration::days(d),
                predicted_balance: 500.0 - 40.0 * d as f64,
                daily_change: -40.0,
                confidence_upper: 0.0,
                confidence_lower: 0.0,
            })
            .collect();
        let collisions = detect_collisions(&days, &MandatoryExpenses::default(), 0.0, 300.0, today());

        assert!(!collisions.is_empty());
        assert!(collisions.iter().all(|c| c.deficit_amount > 0.0));
        assert!(collisions.windows(2).all(|w| w[0].collision_date < w[1].collision_date));
        assert!(collisions[0].credit_can_cover);
        assert!(!collisions.last().unwrap().credit_can_cover);
    }
}
