//! Report assembly for a finished run

use crate::models::{
    Collision, CollisionAnalysis, EmergencyActionPlan, ImmediateAction, LeverKind,
    MandatoryExpenseSummary, MandatoryExpenses, PriorityAction, Recommendation, SeverityLevel,
};
use chrono::Duration;

/// Counts plus the collision list in severity order.
///
/// `collisions` must already be sorted by score; `first_collision` is the
/// earliest-dated one.
pub fn build_analysis(collisions: Vec<Collision>) -> CollisionAnalysis {
    let count_level = |level: SeverityLevel| {
        collisions
            .iter()
            .filter(|c| c.severity_level() == Some(level))
            .count()
    };

    CollisionAnalysis {
        total_collisions_detected: collisions.len(),
        critical_collisions: count_level(SeverityLevel::Critical),
        high_collisions: count_level(SeverityLevel::High),
        first_collision: collisions.iter().min_by_key(|c| c.collision_date).cloned(),
        collisions_91d: collisions,
    }
}

pub fn summarize_mandatory(expenses: &MandatoryExpenses) -> MandatoryExpenseSummary {
    MandatoryExpenseSummary {
        total_amount: expenses.total_amount,
        expense_dates: expenses.buckets.keys().copied().collect(),
    }
}

/// Three fixed actions for the most severe collision, only when it is
/// critical or high
pub fn emergency_action_plan(
    most_severe: Option<&Collision>,
    available_credit: f64,
) -> Option<EmergencyActionPlan> {
    let collision = most_severe?;
    if !collision.severity_level()?.is_urgent() {
        return None;
    }

    let date = collision.collision_date;
    let expected_recovery: f64 = collision
        .levers()
        .iter()
        .filter_map(|l| match &l.kind {
            LeverKind::AccelerateCollections { target_customers } => {
                Some(target_customers.iter().map(|t| t.amount).sum::<f64>())
            }
            _ => None,
        })
        .sum();
    let expected_deferral: f64 = collision
        .levers()
        .iter()
        .filter(|l| matches!(l.kind, LeverKind::DeferPayables { .. }))
        .map(|l| l.potential_amount)
        .sum();

    Some(EmergencyActionPlan {
        action_date: date - Duration::days(2),
        priority_actions: vec![
            PriorityAction {
                action_id: 1,
                action: "URGENT: Contact top 5 customers for immediate payment".to_string(),
                owner: "Sales Manager".to_string(),
                deadline: date - Duration::days(1),
                expected_recovery: Some(expected_recovery),
                amount: None,
                expected_deferral: None,
            },
            PriorityAction {
                action_id: 2,
                action: "Draw available credit line if needed".to_string(),
                owner: "Finance Manager".to_string(),
                deadline: date,
                expected_recovery: None,
                amount: Some(available_credit),
                expected_deferral: None,
            },
            PriorityAction {
                action_id: 3,
                action: "Contact non-critical vendors for payment deferral".to_string(),
                owner: "Procurement Manager".to_string(),
                deadline: date - Duration::days(1),
                expected_recovery: None,
                amount: None,
                expected_deferral: Some(expected_deferral),
            },
        ],
    })
}

pub fn recommendation(collision_count: usize) -> Recommendation {
    if collision_count > 0 {
        Recommendation {
            immediate_action: ImmediateAction::Urgent,
            message: format!("{} collision(s) detected in next 91 days", collision_count),
        }
    } else {
        Recommendation {
            immediate_action: ImmediateAction::Monitor,
            message: "No collisions detected in 91-day forecast".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::severity::SeverityScorer;
    use crate::collision::mitigation::MitigationGenerator;
    use crate::models::{BillLineItem, Invoice};
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
    }

    fn collision(day: u32, days_from_now: i64, deficit: f64, bills: Vec<BillLineItem>) -> Collision {
        Collision {
            collision_date: date(day),
            predicted_balance: 0.0,
            mandatory_expenses: bills.iter().map(|b| b.amount).sum(),
            balance_after_mandatory: -deficit,
            deficit_amount: deficit,
            credit_can_cover: false,
            days_from_now,
            expense_categories: bills.iter().map(|b| b.category.clone()).collect(),
            bills,
            severity: None,
            mitigation: None,
        }
    }

    fn scored(mut collisions: Vec<Collision>, invoices: &[Invoice], credit: f64) -> Vec<Collision> {
        SeverityScorer::new(1_000_000_000.0).score_all(&mut collisions);
        MitigationGenerator::new(invoices, &[], credit, 0.7).apply_all(&mut collisions);
        collisions
    }

    #[test]
    fn test_analysis_counts_and_first_collision() {
        let collisions = scored(
            vec![
                collision(20, 19, 10.0, vec![]),
                collision(2, 1, 2e9, vec![]),
                collision(30, 29, 9e8, vec![]),
            ],
            &[],
            0.0,
        );
        let analysis = build_analysis(collisions);

        assert_eq!(analysis.total_collisions_detected, 3);
        assert_eq!(analysis.critical_collisions, 1);
        assert_eq!(analysis.first_collision.as_ref().map(|c| c.collision_date), Some(date(2)));
        assert_eq!(analysis.collisions_91d[0].collision_date, date(2));
    }

    #[test]
    fn test_emergency_plan_for_urgent_collision() {
        let invoices = vec![Invoice {
            customer_id: Some("c9".to_string()),
            customer_name: None,
            amount_due: 700.0,
            due_date: Some(date(1)),
            invoice_date: None,
            status: "open".to_string(),
        }];
        let bills = vec![BillLineItem {
            bill_id: None,
            category: "rent".to_string(),
            amount: 400.0,
            due_date: date(10),
        }];
        let collisions = scored(vec![collision(10, 0, 2e9, bills)], &invoices, 1_234.0);

        let plan = emergency_action_plan(collisions.first(), 1_234.0).unwrap();
        assert_eq!(plan.action_date, date(8));
        assert_eq!(plan.priority_actions.len(), 3);
        assert_eq!(plan.priority_actions[0].deadline, date(9));
        assert_eq!(plan.priority_actions[0].expected_recovery, Some(700.0));
        assert_eq!(plan.priority_actions[1].deadline, date(10));
        assert_eq!(plan.priority_actions[1].amount, Some(1_234.0));
        assert_eq!(plan.priority_actions[2].expected_deferral, Some(400.0));
    }

    #[test]
    fn test_no_emergency_plan_when_not_urgent() {
        let collisions = scored(vec![collision(25, 60, 10.0, vec![])], &[], 0.0);
        assert!(emergency_action_plan(collisions.first(), 0.0).is_none());
        assert!(emergency_action_plan(None, 0.0).is_none());
    }

    #[test]
    fn test_recommendation() {
        assert_eq!(recommendation(0).immediate_action, ImmediateAction::Monitor);
        let urgent = recommendation(2);
        assert_eq!(urgent.immediate_action, ImmediateAction::Urgent);
        assert!(urgent.message.starts_with("2 collision(s)"));
    }

    #[test]
    fn test_emergency_plan_serializes_only_set_amounts() {
        let collisions = scored(vec![collision(10, 0, 2e9, vec![])], &[], 0.0);
        let plan = emergency_action_plan(collisions.first(), 0.0).unwrap();
        let json = serde_json::to_value(&plan).unwrap();

        let first = &json["priority_actions"][0];
        assert!(first.get("expected_recovery").is_some());
        assert!(first.get("amount").is_none());
    }
}
