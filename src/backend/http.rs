//! HTTP implementation of the financial backend
//!
//! Uses a long-lived reqwest::Client for connection pooling. Every response
//! is funnelled through `normalize` before it leaves this module.

use super::normalize::{
    extract_records, normalize_all, normalize_bill, normalize_customer, normalize_invoice,
    normalize_organization_summary, normalize_payment,
};
use super::{Endpoint, FinancialBackend};
use crate::config::BackendConfig;
use crate::error::CollisionError;
use crate::models::{Bill, Customer, DateWindow, Invoice, OrganizationSummary, Payment};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            CollisionError::Config(format!("invalid backend URL {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CollisionError::Config(format!(
                "backend URL {} cannot carry a path",
                config.base_url
            )));
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn url(&self, endpoint: Endpoint, org_id: &str) -> Result<Url> {
        // the URL builder silently drops dot segments
        if matches!(org_id, "." | "..") {
            return Err(CollisionError::backend(
                endpoint.to_string(),
                format!("invalid org_id {:?}", org_id),
            ));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CollisionError::Config("backend URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(endpoint.path_segments(org_id));
        Ok(url)
    }

    async fn get_json(
        &self,
        endpoint: Endpoint,
        org_id: &str,
        query: &[(&str, String)],
    ) -> Result<Value> {
        let url = self.url(endpoint, org_id)?;
        debug!(%endpoint, %url, "Fetching from financial backend");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                CollisionError::backend(endpoint.to_string(), format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollisionError::backend(
                endpoint.to_string(),
                format!("backend returned {}: {}", status, body),
            ));
        }

        response.json::<Value>().await.map_err(|e| {
            CollisionError::backend(endpoint.to_string(), format!("invalid JSON response: {}", e))
        })
    }

    async fn get_records<T>(
        &self,
        endpoint: Endpoint,
        org_id: &str,
        query: &[(&str, String)],
        normalize: fn(&Value) -> Option<T>,
    ) -> Result<Vec<T>> {
        let body = self.get_json(endpoint, org_id, query).await?;
        let raw = extract_records(&body, endpoint.collection_key().unwrap_or("data"));
        let (records, dropped) = normalize_all(raw, normalize);

        if dropped > 0 {
            warn!(%endpoint, org_id, dropped, "Dropped unparsable records");
        }

        Ok(records)
    }
}

fn window_query(window: DateWindow) -> Vec<(&'static str, String)> {
    let mut query = Vec::with_capacity(2);
    if let Some(from) = window.from {
        query.push(("from", from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = window.to {
        query.push(("to", to.format("%Y-%m-%d").to_string()));
    }
    query
}

#[async_trait]
impl FinancialBackend for HttpBackend {
    async fn payments(&self, org_id: &str, window: DateWindow) -> Result<Vec<Payment>> {
        self.get_records(Endpoint::Payments, org_id, &window_query(window), normalize_payment)
            .await
    }

    async fn organization_summary(&self, org_id: &str) -> Result<OrganizationSummary> {
        let body = self
            .get_json(Endpoint::OrganizationSummary, org_id, &[])
            .await?;

        if !body.is_object() {
            return Err(CollisionError::backend(
                Endpoint::OrganizationSummary.to_string(),
                "expected a JSON object",
            ));
        }

        Ok(normalize_organization_summary(&body))
    }

    async fn bills(&self, org_id: &str, window: DateWindow) -> Result<Vec<Bill>> {
        self.get_records(Endpoint::Bills, org_id, &window_query(window), normalize_bill)
            .await
    }

    async fn invoices(&self, org_id: &str, from: Option<NaiveDate>) -> Result<Vec<Invoice>> {
        let window = DateWindow { from, to: None };
        self.get_records(Endpoint::Invoices, org_id, &window_query(window), normalize_invoice)
            .await
    }

    async fn customers(&self, org_id: &str) -> Result<Vec<Customer>> {
        self.get_records(Endpoint::Customers, org_id, &[], normalize_customer)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building_trims_slash() {
        let backend = HttpBackend::new(&BackendConfig {
            base_url: "http://backend.local/".to_string(),
            timeout_secs: 5,
        })
        .unwrap();

        assert_eq!(backend.base_url(), "http://backend.local/");
        assert_eq!(
            backend.url(Endpoint::OrganizationSummary, "17").unwrap().as_str(),
            "http://backend.local/organizations/17/summary"
        );
        assert_eq!(
            backend.url(Endpoint::Payments, "17").unwrap().as_str(),
            "http://backend.local/payments/org/17"
        );
    }

    #[test]
    fn test_org_id_stays_one_path_segment() {
        let backend = HttpBackend::new(&BackendConfig {
            base_url: "http://backend.local/api/".to_string(),
            timeout_secs: 5,
        })
        .unwrap();

        assert_eq!(
            backend.url(Endpoint::Customers, "7").unwrap().as_str(),
            "http://backend.local/api/customers/org/7"
        );
        assert_eq!(
            backend.url(Endpoint::Payments, "a/b?c%").unwrap().as_str(),
            "http://backend.local/api/payments/org/a%2Fb%3Fc%25"
        );
        assert_eq!(
            backend
                .url(Endpoint::OrganizationSummary, "../admin")
                .unwrap()
                .as_str(),
            "http://backend.local/api/organizations/..%2Fadmin/summary"
        );
        assert!(matches!(
            backend.url(Endpoint::Bills, ".."),
            Err(CollisionError::Backend { .. })
        ));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpBackend::new(&BackendConfig {
            base_url: "not a url".to_string(),
            timeout_secs: 5,
        });
        assert!(matches!(result, Err(CollisionError::Config(_))));
    }

    #[test]
    fn test_window_query() {
        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();

        let query = window_query(DateWindow::between(from, to));
        assert_eq!(
            query,
            vec![("from", "2025-01-01".to_string()), ("to", "2025-04-02".to_string())]
        );
        assert!(window_query(DateWindow::default()).is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_backend_error() {
        let backend = HttpBackend::new(&BackendConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        let result = backend.customers("1").await;
        assert!(matches!(result, Err(CollisionError::Backend { .. })));
    }
}
