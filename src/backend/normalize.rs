//! Record normalization for backend payloads
//!
//! The upstream service is inconsistent about field names (`amount` vs
//! `payment_amount`, `customer_id` vs `customerId`, ...). Each entity has
//! exactly one normalizer here with an ordered alias list, so nothing else in
//! the crate has to guess at key names.

use crate::models::{
    Bill, Customer, Invoice, OrganizationSummary, Payment, PaymentDirection,
};
use chrono::{DateTime, NaiveDate};
use serde_json::Value;

const PAYMENT_DATE_KEYS: &[&str] = &["payment_date", "date", "paymentDate"];
const PAYMENT_AMOUNT_KEYS: &[&str] = &["payment_amount", "amount", "paymentAmount"];
const PAYMENT_TYPE_KEYS: &[&str] = &["payment_type", "type"];

const BILL_ID_KEYS: &[&str] = &["bill_id", "id"];
const BILL_CATEGORY_KEYS: &[&str] = &["expense_category", "category"];
const DUE_DATE_KEYS: &[&str] = &["due_date", "dueDate"];
const STATUS_KEYS: &[&str] = &["payment_status", "status"];

const INVOICE_CUSTOMER_KEYS: &[&str] = &["customer_id", "customerId", "customer"];
const INVOICE_CUSTOMER_NAME_KEYS: &[&str] = &["customer_name", "customerName"];
const INVOICE_REMAINING_KEYS: &[&str] = &["remaining_amount", "outstanding", "amount_due"];
const INVOICE_DATE_KEYS: &[&str] = &["invoice_date", "date", "invoiceDate"];

const CUSTOMER_ID_KEYS: &[&str] = &["customer_id", "customerId", "id"];
const CUSTOMER_NAME_KEYS: &[&str] = &["customer_name", "name", "customerName"];
const CUSTOMER_RELIABILITY_KEYS: &[&str] = &["payment_reliability_score", "reliability"];

/// First non-null, non-empty value among `keys`
fn first_present<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|key| record.get(*key)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS[.fff]Z` or RFC 3339 into a date
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    let date_part = date_part.trim_end_matches('Z');

    if let Some(prefix) = date_part.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }

    DateTime::parse_from_rfc3339(&trimmed.replace('Z', "+00:00"))
        .ok()
        .map(|dt| dt.date_naive())
}

/// Parse a numeric amount, tolerating separators, currency symbols and
/// accounting-style negatives like `(1,000)`
pub fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, ',' | '₹' | '$' | ' '))
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            let cleaned = match cleaned.strip_prefix('(').and_then(|c| c.strip_suffix(')')) {
                Some(inner) => format!("-{}", inner),
                None => cleaned,
            };
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

fn value_as_date(value: &Value) -> Option<NaiveDate> {
    value.as_str().and_then(parse_date)
}

/// Ids arrive as numbers or strings; carry them as strings
fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_lower(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default()
}

/// Records without a parsable date or amount are dropped
pub fn normalize_payment(record: &Value) -> Option<Payment> {
    let date = first_present(record, PAYMENT_DATE_KEYS).and_then(value_as_date)?;
    let amount = first_present(record, PAYMENT_AMOUNT_KEYS).and_then(parse_amount)?;
    let direction = first_present(record, PAYMENT_TYPE_KEYS)
        .and_then(Value::as_str)
        .map(PaymentDirection::from_tag)
        .unwrap_or(PaymentDirection::Unspecified);

    Some(Payment::new(date, amount, direction))
}

/// Bills need a parsable amount; an unparsable due date is kept as `None`
pub fn normalize_bill(record: &Value) -> Option<Bill> {
    let amount = first_present(record, &["amount"]).and_then(parse_amount)?;

    Some(Bill {
        bill_id: first_present(record, BILL_ID_KEYS).and_then(value_as_id),
        category: value_as_lower(first_present(record, BILL_CATEGORY_KEYS)),
        amount,
        due_date: first_present(record, DUE_DATE_KEYS).and_then(value_as_date),
        status: value_as_lower(first_present(record, STATUS_KEYS)),
    })
}

pub fn normalize_invoice(record: &Value) -> Option<Invoice> {
    let amount_due = first_present(record, INVOICE_REMAINING_KEYS).and_then(parse_amount)?;

    Some(Invoice {
        customer_id: first_present(record, INVOICE_CUSTOMER_KEYS).and_then(value_as_id),
        customer_name: first_present(record, INVOICE_CUSTOMER_NAME_KEYS)
            .and_then(Value::as_str)
            .map(str::to_string),
        amount_due,
        due_date: first_present(record, DUE_DATE_KEYS).and_then(value_as_date),
        invoice_date: first_present(record, INVOICE_DATE_KEYS).and_then(value_as_date),
        status: value_as_lower(first_present(record, STATUS_KEYS)),
    })
}

pub fn normalize_customer(record: &Value) -> Option<Customer> {
    let customer_id = first_present(record, CUSTOMER_ID_KEYS).and_then(value_as_id)?;

    Some(Customer {
        customer_id,
        name: first_present(record, CUSTOMER_NAME_KEYS)
            .and_then(Value::as_str)
            .map(str::to_string),
        payment_reliability_score: first_present(record, CUSTOMER_RELIABILITY_KEYS)
            .and_then(parse_amount),
    })
}

/// Missing fields fall back to zero; the minimum balance stays unset so the
/// caller can apply its own policy default
pub fn normalize_organization_summary(record: &Value) -> OrganizationSummary {
    let amount = |keys: &[&str]| first_present(record, keys).and_then(parse_amount);

    OrganizationSummary {
        opening_balance: amount(&["opening_balance", "current_balance"]).unwrap_or(0.0),
        minimum_balance_required: amount(&["minimum_balance_required"]),
        credit_line_limit: amount(&["credit_line_limit"]).unwrap_or(0.0),
        credit_line_utilized: amount(&["credit_line_utilized"]).unwrap_or(0.0),
    }
}

/// Accept a bare array or one wrapped under the entity key or `data`
pub fn extract_records<'a>(body: &'a Value, collection_key: &str) -> &'a [Value] {
    if let Some(items) = body.as_array() {
        return items;
    }
    [collection_key, "data"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_array))
        .find(|items| !items.is_empty())
        .or_else(|| body.get(collection_key).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Normalize every record, returning the kept records and the drop count
pub fn normalize_all<T>(records: &[Value], normalize: fn(&Value) -> Option<T>) -> (Vec<T>, usize) {
    let kept: Vec<T> = records.iter().filter_map(normalize).collect();
    let dropped = records.len() - kept.len();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2025-12-20"), Some(date(2025, 12, 20)));
        assert_eq!(parse_date("2025-12-20T06:06:04.420Z"), Some(date(2025, 12, 20)));
        assert_eq!(parse_date("2025-12-20T06:06:04+05:30"), Some(date(2025, 12, 20)));
        assert_eq!(parse_date("20/12/2025"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_amount_variants() {
        assert_eq!(parse_amount(&json!(1250.5)), Some(1250.5));
        assert_eq!(parse_amount(&json!("1,250.50")), Some(1250.5));
        assert_eq!(parse_amount(&json!("₹ 2,000")), Some(2000.0));
        assert_eq!(parse_amount(&json!("$15")), Some(15.0));
        assert_eq!(parse_amount(&json!("(1,000)")), Some(-1000.0));
        assert_eq!(parse_amount(&json!("n/a")), None);
        assert_eq!(parse_amount(&json!(null)), None);
    }

    #[test]
    fn test_payment_alias_fallbacks() {
        let payment = normalize_payment(&json!({
            "paymentDate": "2025-01-03",
            "payment_amount": "500",
            "type": "Outflow"
        }))
        .unwrap();
        assert_eq!(payment.date, date(2025, 1, 3));
        assert_eq!(payment.signed_amount(), -500.0);

        let untagged = normalize_payment(&json!({"date": "2025-01-03", "amount": 10})).unwrap();
        assert_eq!(untagged.direction, PaymentDirection::Unspecified);
        assert_eq!(untagged.signed_amount(), 10.0);
    }

    #[test]
    fn test_unparsable_payment_dropped() {
        let records = vec![
            json!({"date": "not-a-date", "amount": 10}),
            json!({"date": "2025-01-01", "amount": "ten"}),
            json!({"date": "2025-01-01", "amount": 10, "payment_type": "inflow"}),
        ];
        let (kept, dropped) = normalize_all(&records, normalize_payment);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_bill_keeps_missing_due_date() {
        let bill = normalize_bill(&json!({
            "bill_id": 7,
            "expense_category": "Payroll",
            "amount": "1,000",
            "due_date": "someday",
            "status": "OPEN"
        }))
        .unwrap();
        assert_eq!(bill.bill_id.as_deref(), Some("7"));
        assert_eq!(bill.category, "payroll");
        assert_eq!(bill.due_date, None);
        assert_eq!(bill.status, "open");
    }

    #[test]
    fn test_invoice_remaining_alias_order() {
        let invoice = normalize_invoice(&json!({
            "customerId": 12,
            "outstanding": 300,
            "amount_due": 900,
            "dueDate": "2025-02-01",
            "payment_status": "Partial"
        }))
        .unwrap();
        assert_eq!(invoice.customer_id.as_deref(), Some("12"));
        assert_eq!(invoice.amount_due, 300.0);
        assert!(invoice.is_open());
    }

    #[test]
    fn test_summary_defaults() {
        let summary = normalize_organization_summary(&json!({
            "current_balance": "1,000",
            "credit_line_limit": 5000
        }));
        assert_eq!(summary.opening_balance, 1000.0);
        assert_eq!(summary.minimum_balance_required, None);
        assert_eq!(summary.credit_line_limit, 5000.0);
        assert_eq!(summary.credit_line_utilized, 0.0);
    }

    #[test]
    fn test_extract_records_shapes() {
        let wrapped = json!({"payments": [{"a": 1}]});
        assert_eq!(extract_records(&wrapped, "payments").len(), 1);

        let data = json!({"customers": [], "data": [{"a": 1}, {"b": 2}]});
        assert_eq!(extract_records(&data, "customers").len(), 2);

        let bare = json!([{"a": 1}]);
        assert_eq!(extract_records(&bare, "invoices").len(), 1);

        assert!(extract_records(&json!({"other": 1}), "bills").is_empty());
    }
}
