//! In-memory financial backend
//!
//! Holds typed records per organization and applies the same window filters
//! as the HTTP service. Endpoints can be made to fail, either always or after
//! a number of successful calls, to exercise the degrade/abort paths.

use super::{Endpoint, FinancialBackend};
use crate::error::CollisionError;
use crate::models::{Bill, Customer, DateWindow, Invoice, OrganizationSummary, Payment};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct OrgRecords {
    summary: Option<OrganizationSummary>,
    payments: Vec<Payment>,
    bills: Vec<Bill>,
    invoices: Vec<Invoice>,
    customers: Vec<Customer>,
}

#[derive(Debug, Clone, Copy)]
struct FailureRule {
    /// Calls that still succeed before the endpoint starts failing
    remaining_successes: usize,
    calls: usize,
}

pub struct InMemoryBackend {
    orgs: Arc<RwLock<HashMap<String, OrgRecords>>>,
    failures: Arc<RwLock<HashMap<Endpoint, FailureRule>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            orgs: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn set_summary(&self, org_id: &str, summary: OrganizationSummary) {
        let mut orgs = self.orgs.write().await;
        orgs.entry(org_id.to_string()).or_default().summary = Some(summary);
    }

    pub async fn set_payments(&self, org_id: &str, payments: Vec<Payment>) {
        let mut orgs = self.orgs.write().await;
        orgs.entry(org_id.to_string()).or_default().payments = payments;
    }

    pub async fn set_bills(&self, org_id: &str, bills: Vec<Bill>) {
        let mut orgs = self.orgs.write().await;
        orgs.entry(org_id.to_string()).or_default().bills = bills;
    }

    pub async fn set_invoices(&self, org_id: &str, invoices: Vec<Invoice>) {
        let mut orgs = self.orgs.write().await;
        orgs.entry(org_id.to_string()).or_default().invoices = invoices;
    }

    pub async fn set_customers(&self, org_id: &str, customers: Vec<Customer>) {
        let mut orgs = self.orgs.write().await;
        orgs.entry(org_id.to_string()).or_default().customers = customers;
    }

    /// Every call to `endpoint` fails
    pub async fn fail_endpoint(&self, endpoint: Endpoint) {
        self.fail_endpoint_after(endpoint, 0).await;
    }

    /// The first `successes` calls to `endpoint` succeed, later ones fail
    pub async fn fail_endpoint_after(&self, endpoint: Endpoint, successes: usize) {
        let mut failures = self.failures.write().await;
        failures.insert(
            endpoint,
            FailureRule {
                remaining_successes: successes,
                calls: 0,
            },
        );
    }

    async fn check(&self, endpoint: Endpoint) -> Result<()> {
        let mut failures = self.failures.write().await;
        if let Some(rule) = failures.get_mut(&endpoint) {
            rule.calls += 1;
            if rule.calls > rule.remaining_successes {
                return Err(CollisionError::backend(
                    endpoint.to_string(),
                    "simulated backend failure",
                ));
            }
        }
        Ok(())
    }

    async fn records(&self, org_id: &str) -> OrgRecords {
        let orgs = self.orgs.read().await;
        orgs.get(org_id).cloned().unwrap_or_default()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FinancialBackend for InMemoryBackend {
    async fn payments(&self, org_id: &str, window: DateWindow) -> Result<Vec<Payment>> {
        self.check(Endpoint::Payments).await?;
        Ok(self
            .records(org_id)
            .await
            .payments
            .into_iter()
            .filter(|p| window.contains(p.date))
            .collect())
    }

    async fn organization_summary(&self, org_id: &str) -> Result<OrganizationSummary> {
        self.check(Endpoint::OrganizationSummary).await?;
        self.records(org_id).await.summary.ok_or_else(|| {
            CollisionError::backend(
                Endpoint::OrganizationSummary.to_string(),
                format!("organization {} not found", org_id),
            )
        })
    }

    async fn bills(&self, org_id: &str, window: DateWindow) -> Result<Vec<Bill>> {
        self.check(Endpoint::Bills).await?;
        Ok(self
            .records(org_id)
            .await
            .bills
            .into_iter()
            .filter(|b| b.due_date.map_or(true, |due| window.contains(due)))
            .collect())
    }

    async fn invoices(&self, org_id: &str, from: Option<NaiveDate>) -> Result<Vec<Invoice>> {
        self.check(Endpoint::Invoices).await?;
        let window = DateWindow { from, to: None };
        Ok(self
            .records(org_id)
            .await
            .invoices
            .into_iter()
            .filter(|i| match (i.invoice_date.or(i.due_date), window.from) {
                (Some(date), Some(_)) => window.contains(date),
                _ => true,
            })
            .collect())
    }

    async fn customers(&self, org_id: &str) -> Result<Vec<Customer>> {
        self.check(Endpoint::Customers).await?;
        Ok(self.records(org_id).await.customers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentDirection;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_payment_window_filter() {
        let backend = InMemoryBackend::new();
        backend
            .set_payments(
                "1",
                (1..=10)
                    .map(|d| Payment::new(date(d), 1.0, PaymentDirection::Inflow))
                    .collect(),
            )
            .await;

        let payments = backend
            .payments("1", DateWindow::between(date(3), date(5)))
            .await
            .unwrap();
        assert_eq!(payments.len(), 3);

        let unknown = backend.payments("2", DateWindow::default()).await.unwrap();
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    async fn test_fail_after_successes() {
        let backend = InMemoryBackend::new();
        backend.set_summary("1", OrganizationSummary::default()).await;
        backend
            .fail_endpoint_after(Endpoint::OrganizationSummary, 1)
            .await;

        tokio_test::assert_ok!(backend.organization_summary("1").await);
        tokio_test::assert_err!(backend.organization_summary("1").await);
    }

    #[tokio::test]
    async fn test_missing_summary_is_error() {
        let backend = InMemoryBackend::new();
        assert!(backend.organization_summary("404").await.is_err());
    }
}
