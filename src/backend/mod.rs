//! Financial data backend
//!
//! The agent only ever talks to organization data through this trait.
//! HTTP-backed in production, in-memory for tests and demos.

use crate::models::{Bill, Customer, DateWindow, Invoice, OrganizationSummary, Payment};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;

pub mod http;
pub mod memory;
pub mod normalize;

pub use http::HttpBackend;
pub use memory::InMemoryBackend;

/// Read-only access to an organization's financial records
#[async_trait]
pub trait FinancialBackend: Send + Sync {
    async fn payments(&self, org_id: &str, window: DateWindow) -> Result<Vec<Payment>>;

    async fn organization_summary(&self, org_id: &str) -> Result<OrganizationSummary>;

    async fn bills(&self, org_id: &str, window: DateWindow) -> Result<Vec<Bill>>;

    async fn invoices(&self, org_id: &str, from: Option<NaiveDate>) -> Result<Vec<Invoice>>;

    async fn customers(&self, org_id: &str) -> Result<Vec<Customer>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Payments,
    OrganizationSummary,
    Bills,
    Invoices,
    Customers,
}

impl Endpoint {
    /// Path segments under the base URL. `org_id` stays a single segment;
    /// the URL builder percent-encodes it.
    pub fn path_segments<'a>(&self, org_id: &'a str) -> [&'a str; 3] {
        match self {
            Endpoint::Payments => ["payments", "org", org_id],
            Endpoint::OrganizationSummary => ["organizations", org_id, "summary"],
            Endpoint::Bills => ["bills", "org", org_id],
            Endpoint::Invoices => ["invoices", "org", org_id],
            Endpoint::Customers => ["customers", "org", org_id],
        }
    }

    /// Key under which list endpoints wrap their records
    pub fn collection_key(&self) -> Option<&'static str> {
        match self {
            Endpoint::Payments => Some("payments"),
            Endpoint::OrganizationSummary => None,
            Endpoint::Bills => Some("bills"),
            Endpoint::Invoices => Some("invoices"),
            Endpoint::Customers => Some("customers"),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Endpoint::Payments => "payments",
            Endpoint::OrganizationSummary => "organization_summary",
            Endpoint::Bills => "bills",
            Endpoint::Invoices => "invoices",
            Endpoint::Customers => "customers",
        };
        write!(f, "{}", s)
    }
}
