//! Forecast drivers
//!
//! Biggest open receivables by customer and open payables by category.
//! Either side degrades to empty when its fetch fails.

use crate::backend::FinancialBackend;
use crate::models::{
    Bill, Customer, DateWindow, Drivers, InflowDriver, Invoice, OutflowDriver,
};
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

const TOP_N: usize = 5;
const DEFAULT_COLLECTION_DAYS: i64 = 30;

/// Top receivable and payable contributors.
///
/// Informational only: nothing here feeds the model, and every fetch
/// degrades to an empty list on failure.
pub struct DriverIdentifier<'a> {
    backend: &'a dyn FinancialBackend,
}

impl<'a> DriverIdentifier<'a> {
    pub fn new(backend: &'a dyn FinancialBackend) -> Self {
        Self { backend }
    }

    pub async fn identify(&self, org_id: &str, today: NaiveDate) -> Drivers {
        let customers = self.backend.customers(org_id).await.unwrap_or_else(|e| {
            warn!(org_id, error = %e, "Customer fetch failed, drivers without reliability");
            Vec::new()
        });
        let invoices = self.backend.invoices(org_id, None).await.unwrap_or_else(|e| {
            warn!(org_id, error = %e, "Invoice fetch failed, no inflow drivers");
            Vec::new()
        });
        let bills = self
            .backend
            .bills(org_id, DateWindow::default())
            .await
            .unwrap_or_else(|e| {
                warn!(org_id, error = %e, "Bill fetch failed, no outflow drivers");
                Vec::new()
            });

        Drivers {
            top_inflows: top_inflows(&invoices, &customers, today),
            top_outflows: top_outflows(&bills),
        }
    }
}

#[derive(Default)]
struct ReceivableTotals {
    name: Option<String>,
    outstanding: f64,
    open_invoices: usize,
    terms_days: Vec<i64>,
}

/// Customers ranked by outstanding open receivables
pub fn top_inflows(invoices: &[Invoice], customers: &[Customer], today: NaiveDate) -> Vec<InflowDriver> {
    let reliability: HashMap<&str, &Customer> = customers
        .iter()
        .map(|c| (c.customer_id.as_str(), c))
        .collect();

    let mut per_customer: BTreeMap<&str, ReceivableTotals> = BTreeMap::new();
    for invoice in invoices.iter().filter(|i| i.is_open()) {
        let Some(customer_id) = invoice.customer_id.as_deref() else {
            continue;
        };
        let totals = per_customer.entry(customer_id).or_default();
        totals.outstanding += invoice.amount_due;
        totals.open_invoices += 1;
        if totals.name.is_none() {
            totals.name = invoice.customer_name.clone();
        }
        if let (Some(due), Some(issued)) = (invoice.due_date, invoice.invoice_date) {
            totals.terms_days.push((due - issued).num_days());
        }
    }

    let mut drivers: Vec<InflowDriver> = per_customer
        .into_iter()
        .filter(|(_, t)| t.outstanding > 0.0)
        .map(|(customer_id, totals)| {
            let customer = reliability.get(customer_id);
            let avg_days = if totals.terms_days.is_empty() {
                DEFAULT_COLLECTION_DAYS
            } else {
                totals.terms_days.iter().sum::<i64>() / totals.terms_days.len() as i64
            };

            InflowDriver {
                source: totals
                    .name
                    .or_else(|| customer.and_then(|c| c.name.clone())),
                customer_id: customer_id.to_string(),
                amount: totals.outstanding,
                open_invoices: totals.open_invoices,
                expected_collection_date: today + Duration::days(avg_days),
                collection_probability: customer
                    .and_then(|c| c.payment_reliability_score)
                    .unwrap_or(0.0),
            }
        })
        .collect();

    drivers.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    drivers.truncate(TOP_N);
    drivers
}

/// Open bills grouped by category, largest first
pub fn top_outflows(bills: &[Bill]) -> Vec<OutflowDriver> {
    let mut per_category: BTreeMap<String, OutflowDriver> = BTreeMap::new();

    for bill in bills.iter().filter(|b| b.status == "open") {
        let category = if bill.category.is_empty() {
            "other".to_string()
        } else {
            bill.category.clone()
        };
        let entry = per_category
            .entry(category.clone())
            .or_insert_with(|| OutflowDriver {
                category,
                amount: 0.0,
                bill_count: 0,
                earliest_due: None,
            });
        entry.amount += bill.amount;
        entry.bill_count += 1;
        entry.earliest_due = match (entry.earliest_due, bill.due_date) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    let mut drivers: Vec<OutflowDriver> = per_category.into_values().collect();
    drivers.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    drivers.truncate(TOP_N);
    drivers
}
