//! Mitigation levers
//!
//! Each collision gets up to four independent levers, always listed in
//! fixed priority order. The plan is mitigable when the probability-weighted
//! sum of lever potentials reaches the configured share of the deficit.

use crate::models::{
    BillLineItem, Collision, CollectionTarget, Customer, Invoice, LeverKind, MitigationLever,
    MitigationPlan,
};
use std::collections::HashMap;

/// Categories that cannot be pushed out without legal or payroll risk
pub const NON_DEFERRABLE_KEYWORDS: [&str; 5] = ["payroll", "salary", "statutory", "tax", "gst"];

const MAX_COLLECTION_TARGETS: usize = 5;
const DEFAULT_RELIABILITY: f64 = 0.5;
const COLLECTION_DISCOUNT: f64 = 0.9;

const ACCELERATE_PROBABILITY: f64 = 0.75;
const DEFER_PROBABILITY: f64 = 0.6;
const CREDIT_PROBABILITY: f64 = 0.95;
const RESTRUCTURE_PROBABILITY: f64 = 0.5;

/// Flat one-day interest rate on a credit draw
const CREDIT_DAILY_RATE: f64 = 0.0008;
/// Share of the day's mandatory total a loan restructuring can free up
const RESTRUCTURE_SHARE: f64 = 0.3;
const RESTRUCTURE_COST_RATE: f64 = 0.05;

pub fn is_deferrable(category: &str) -> bool {
    let category = category.to_lowercase();
    !NON_DEFERRABLE_KEYWORDS.iter().any(|k| category.contains(k))
}

pub fn meets_coverage(total_potential: f64, deficit: f64, threshold: f64) -> bool {
    total_potential >= deficit * threshold
}

/// Run-wide inputs shared by every collision's plan
pub struct MitigationGenerator<'a> {
    invoices: &'a [Invoice],
    customers: HashMap<&'a str, &'a Customer>,
    available_credit: f64,
    coverage_threshold: f64,
}

impl<'a> MitigationGenerator<'a> {
    pub fn new(
        invoices: &'a [Invoice],
        customers: &'a [Customer],
        available_credit: f64,
        coverage_threshold: f64,
    ) -> Self {
        Self {
            invoices,
            customers: customers
                .iter()
                .map(|c| (c.customer_id.as_str(), c))
                .collect(),
            available_credit,
            coverage_threshold,
        }
    }

    pub fn apply_all(&self, collisions: &mut [Collision]) {
        for collision in collisions.iter_mut() {
            collision.mitigation = Some(self.plan(collision));
        }
    }

    pub fn plan(&self, collision: &Collision) -> MitigationPlan {
        let mitigation_levers: Vec<MitigationLever> = [
            self.accelerate_collections(collision),
            self.defer_payables(collision),
            self.draw_credit_line(collision),
            self.restructure_loan(collision),
        ]
        .into_iter()
        .flatten()
        .collect();

        let total_mitigation_potential: f64 =
            mitigation_levers.iter().map(MitigationLever::expected_value).sum();

        MitigationPlan {
            can_be_mitigated: meets_coverage(
                total_mitigation_potential,
                collision.deficit_amount,
                self.coverage_threshold,
            ),
            mitigation_levers,
            total_mitigation_potential,
        }
    }

    fn reliability(&self, customer_id: Option<&str>) -> f64 {
        customer_id
            .and_then(|id| self.customers.get(id))
            .and_then(|c| c.payment_reliability_score)
            .unwrap_or(DEFAULT_RELIABILITY)
    }

    fn accelerate_collections(&self, collision: &Collision) -> Option<MitigationLever> {
        let mut targets: Vec<CollectionTarget> = self
            .invoices
            .iter()
            .filter(|i| i.is_open())
            .filter(|i| i.due_date.is_some_and(|due| due < collision.collision_date))
            .map(|invoice| {
                let reliability = self.reliability(invoice.customer_id.as_deref());
                let customer_name = invoice.customer_name.clone().or_else(|| {
                    invoice
                        .customer_id
                        .as_deref()
                        .and_then(|id| self.customers.get(id))
                        .and_then(|c| c.name.clone())
                });
                CollectionTarget {
                    customer_id: invoice.customer_id.clone(),
                    customer_name,
                    amount: invoice.amount_due,
                    due_date: invoice.due_date,
                    reliability_score: reliability,
                    collection_probability: reliability * COLLECTION_DISCOUNT,
                }
            })
            .collect();

        let potential: f64 = targets.iter().map(|t| t.amount).sum();
        if potential <= 0.0 {
            return None;
        }

        let candidates = targets.len();
        targets.sort_by(|a, b| {
            (b.amount * b.collection_probability).total_cmp(&(a.amount * a.collection_probability))
        });
        targets.truncate(MAX_COLLECTION_TARGETS);

        Some(lever(
            LeverKind::AccelerateCollections {
                target_customers: targets,
            },
            potential,
            ACCELERATE_PROBABILITY,
            1,
            format!("Accelerate collections from {} overdue customers", candidates),
            &[
                "Contact top customers for immediate payment",
                "Offer 2% early payment discount if paid within 48 hours",
                "Escalate to senior management for key customers",
            ],
        ))
    }

    fn defer_payables(&self, collision: &Collision) -> Option<MitigationLever> {
        let deferrable: Vec<BillLineItem> = collision
            .bills
            .iter()
            .filter(|b| is_deferrable(&b.category))
            .cloned()
            .collect();

        let potential: f64 = deferrable.iter().map(|b| b.amount).sum();
        if potential <= 0.0 {
            return None;
        }

        let description = format!("Defer {} non-critical vendor payments", deferrable.len());
        Some(lever(
            LeverKind::DeferPayables {
                target_bills: deferrable,
            },
            potential,
            DEFER_PROBABILITY,
            1,
            description,
            &[
                "Contact vendors for 30-day payment extension",
                "Emphasize long-term partnership and previous good payment history",
                "Offer to prioritize payment in next cycle",
            ],
        ))
    }

    fn draw_credit_line(&self, collision: &Collision) -> Option<MitigationLever> {
        let credit = self.available_credit;
        if credit <= collision.deficit_amount * 0.5 {
            return None;
        }

        Some(lever(
            LeverKind::DrawCreditLine {
                credit_amount: credit,
                interest_cost_1day: credit * CREDIT_DAILY_RATE,
            },
            credit,
            CREDIT_PROBABILITY,
            0,
            format!("Draw {:.0} from available credit line", credit),
            &[
                "Initiate credit line draw with bank",
                "Prepare required documentation",
                "Confirm funds transfer",
            ],
        ))
    }

    fn restructure_loan(&self, collision: &Collision) -> Option<MitigationLever> {
        let mentions_loan = collision
            .expense_categories
            .iter()
            .any(|c| c.to_lowercase().contains("loan"));
        if !mentions_loan {
            return None;
        }

        let potential = collision.mandatory_expenses * RESTRUCTURE_SHARE;
        if potential <= 0.0 {
            return None;
        }

        Some(lever(
            LeverKind::RestructureLoan {
                monthly_savings: potential,
                additional_cost: potential * RESTRUCTURE_COST_RATE,
            },
            potential,
            RESTRUCTURE_PROBABILITY,
            3,
            "Negotiate loan restructuring with lender".to_string(),
            &[
                "Schedule call with loan officer",
                "Present financial situation and recovery plan",
                "Negotiate 2-3 month EMI moratorium",
                "Document agreement",
            ],
        ))
    }
}

fn lever(
    kind: LeverKind,
    potential_amount: f64,
    success_probability: f64,
    implementation_time_days: u32,
    description: String,
    actions: &[&str],
) -> MitigationLever {
    MitigationLever {
        priority: kind.priority(),
        kind,
        potential_amount,
        success_probability,
        implementation_time_days,
        description,
        actions: actions.iter().map(|a| a.to_string()).collect(),
    }
}
