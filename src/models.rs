//! Core data models for the liquidity collision agent

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

//
// ================= Backend Records =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentDirection {
    Inflow,
    Outflow,
    /// Missing or unrecognized type tag; counted as an inflow
    Unspecified,
}

impl PaymentDirection {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "inflow" => PaymentDirection::Inflow,
            "outflow" => PaymentDirection::Outflow,
            _ => PaymentDirection::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub date: NaiveDate,
    pub amount: f64,
    pub direction: PaymentDirection,
}

impl Payment {
    pub fn new(date: NaiveDate, amount: f64, direction: PaymentDirection) -> Self {
        Self {
            date,
            amount,
            direction,
        }
    }

    /// Amount with the cash-flow sign applied
    pub fn signed_amount(&self) -> f64 {
        match self.direction {
            PaymentDirection::Outflow => -self.amount,
            PaymentDirection::Inflow | PaymentDirection::Unspecified => self.amount,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrganizationSummary {
    pub opening_balance: f64,
    pub minimum_balance_required: Option<f64>,
    pub credit_line_limit: f64,
    pub credit_line_utilized: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bill {
    pub bill_id: Option<String>,
    /// Lowercased expense category
    pub category: String,
    pub amount: f64,
    pub due_date: Option<NaiveDate>,
    /// Lowercased payment status
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    /// Remaining amount still owed on the invoice
    pub amount_due: f64,
    pub due_date: Option<NaiveDate>,
    pub invoice_date: Option<NaiveDate>,
    /// Lowercased payment status
    pub status: String,
}

impl Invoice {
    pub fn is_open(&self) -> bool {
        matches!(self.status.as_str(), "open" | "partial" | "unpaid")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub customer_id: String,
    pub name: Option<String>,
    pub payment_reliability_score: Option<f64>,
}

/// Optional inclusive date bounds for a backend query
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn since(from: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn until(to: NaiveDate) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

//
// ================= History =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub net_change: f64,
}

/// Per-day net cash change, ascending and unique by date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalSeries {
    pub records: Vec<DailyRecord>,
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
    pub partial_history: bool,
}

impl HistoricalSeries {
    pub fn net_changes(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.net_change).collect()
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityStrength {
    Strong,
    Moderate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seasonality {
    /// 0 = Monday .. 6 = Sunday; 0.0 for weekdays never observed
    pub day_of_week_avg: BTreeMap<u32, f64>,
    /// 1..=31; `None` for days never observed
    pub day_of_month_avg: BTreeMap<u32, Option<f64>>,
    pub trend_slope: f64,
    pub volatility: f64,
    pub mean_net_daily: f64,
    pub seasonality_strength: SeasonalityStrength,
}

//
// ================= Forecast =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub predicted_balance: f64,
    pub daily_change: f64,
    pub confidence_upper: f64,
    pub confidence_lower: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub model_type: String,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub seed: u64,
    pub training_samples: usize,
    pub validation_samples: usize,
    pub mape: Option<f64>,
    pub rmse: Option<f64>,
    pub residual_std: f64,
    pub feature_importance: BTreeMap<String, f64>,
    pub trained_at: DateTime<Utc>,
    pub input_fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InflowDriver {
    pub source: Option<String>,
    pub customer_id: String,
    pub amount: f64,
    pub open_invoices: usize,
    pub expected_collection_date: NaiveDate,
    pub collection_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutflowDriver {
    pub category: String,
    pub amount: f64,
    pub bill_count: usize,
    pub earliest_due: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Drivers {
    pub top_inflows: Vec<InflowDriver>,
    pub top_outflows: Vec<OutflowDriver>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastSummary {
    pub forecast_days: usize,
    pub forecast_start: Option<NaiveDate>,
    pub forecast_end: Option<NaiveDate>,
    pub starting_balance: Option<f64>,
    pub ending_balance: Option<f64>,
    pub min_balance: Option<f64>,
    pub max_balance: Option<f64>,
    pub model_accuracy_mape: Option<f64>,
}

/// The base forecast: one entry per day for the whole horizon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Forecast {
    pub days: Vec<ForecastDay>,
    pub seasonality: Seasonality,
    pub model_info: ModelInfo,
    pub drivers: Drivers,
    pub summary: ForecastSummary,
    pub partial_history: bool,
    pub history_days: usize,
}

//
// ================= Positions =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalancePosition {
    pub opening_balance: f64,
    pub current_balance: f64,
    pub minimum_balance: f64,
    pub balance_gap: f64,
    pub recent_inflows: f64,
    pub recent_outflows: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreditPosition {
    pub credit_line_limit: f64,
    pub credit_line_utilized: f64,
    pub available_credit: f64,
    pub credit_utilization_pct: f64,
}

//
// ================= Mandatory Expenses =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillLineItem {
    pub bill_id: Option<String>,
    pub category: String,
    pub amount: f64,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MandatoryExpenseBucket {
    pub total_amount: f64,
    pub line_items: Vec<BillLineItem>,
    /// Distinct categories in first-seen order
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MandatoryExpenses {
    pub buckets: BTreeMap<NaiveDate, MandatoryExpenseBucket>,
    pub total_amount: f64,
}

//
// ================= Collisions =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            SeverityLevel::Critical
        } else if score >= 60.0 {
            SeverityLevel::High
        } else if score >= 40.0 {
            SeverityLevel::Medium
        } else {
            SeverityLevel::Low
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, SeverityLevel::Critical | SeverityLevel::High)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeverityAssessment {
    pub severity_score: f64,
    pub severity: SeverityLevel,
    pub proximity_score: f64,
    pub magnitude_score: f64,
    pub credit_score: f64,
    pub days_to_resolve: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionTarget {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub amount: f64,
    pub due_date: Option<NaiveDate>,
    pub reliability_score: f64,
    pub collection_probability: f64,
}

/// Lever-specific payload, tagged by lever name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "lever", rename_all = "snake_case")]
pub enum LeverKind {
    AccelerateCollections {
        target_customers: Vec<CollectionTarget>,
    },
    DeferPayables {
        target_bills: Vec<BillLineItem>,
    },
    DrawCreditLine {
        credit_amount: f64,
        interest_cost_1day: f64,
    },
    RestructureLoan {
        monthly_savings: f64,
        additional_cost: f64,
    },
}

impl LeverKind {
    pub fn name(&self) -> &'static str {
        match self {
            LeverKind::AccelerateCollections { .. } => "accelerate_collections",
            LeverKind::DeferPayables { .. } => "defer_payables",
            LeverKind::DrawCreditLine { .. } => "draw_credit_line",
            LeverKind::RestructureLoan { .. } => "restructure_loan",
        }
    }

    /// Fixed presentation priority; lower is preferred
    pub fn priority(&self) -> u8 {
        match self {
            LeverKind::AccelerateCollections { .. } => 1,
            LeverKind::DeferPayables { .. } => 2,
            LeverKind::DrawCreditLine { .. } => 3,
            LeverKind::RestructureLoan { .. } => 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MitigationLever {
    #[serde(flatten)]
    pub kind: LeverKind,
    pub priority: u8,
    pub potential_amount: f64,
    pub success_probability: f64,
    pub implementation_time_days: u32,
    pub description: String,
    pub actions: Vec<String>,
}

impl MitigationLever {
    pub fn expected_value(&self) -> f64 {
        self.potential_amount * self.success_probability
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MitigationPlan {
    pub mitigation_levers: Vec<MitigationLever>,
    pub total_mitigation_potential: f64,
    pub can_be_mitigated: bool,
}

/// A forecast date on which balance net of mandatory obligations falls
/// below the minimum required balance.
///
/// Detection fills the base fields; severity scoring and mitigation each add
/// their own section without touching earlier ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collision {
    pub collision_date: NaiveDate,
    pub predicted_balance: f64,
    pub mandatory_expenses: f64,
    pub balance_after_mandatory: f64,
    pub deficit_amount: f64,
    pub credit_can_cover: bool,
    pub days_from_now: i64,
    pub expense_categories: Vec<String>,
    pub bills: Vec<BillLineItem>,
    #[serde(flatten)]
    pub severity: Option<SeverityAssessment>,
    #[serde(flatten)]
    pub mitigation: Option<MitigationPlan>,
}

impl Collision {
    pub fn severity_score(&self) -> f64 {
        self.severity.as_ref().map_or(0.0, |s| s.severity_score)
    }

    pub fn severity_level(&self) -> Option<SeverityLevel> {
        self.severity.as_ref().map(|s| s.severity)
    }

    pub fn levers(&self) -> &[MitigationLever] {
        self.mitigation
            .as_ref()
            .map_or(&[], |m| m.mitigation_levers.as_slice())
    }
}

//
// ================= Pipeline =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Initialized,
    BalanceFetched,
    ForecastRetrieved,
    MandatoryExpensesRetrieved,
    CreditLimitsRetrieved,
    CollisionsDetected,
    SeverityAnalyzed,
    MitigationGenerated,
    Complete,
}

//
// ================= Report =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentPosition {
    pub current_balance: f64,
    pub minimum_balance: f64,
    pub balance_gap: f64,
    pub available_credit: f64,
    pub credit_utilization_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollisionAnalysis {
    pub total_collisions_detected: usize,
    pub critical_collisions: usize,
    pub high_collisions: usize,
    /// Earliest-dated collision
    pub first_collision: Option<Collision>,
    /// Sorted by severity score, highest first
    pub collisions_91d: Vec<Collision>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MandatoryExpenseSummary {
    pub total_amount: f64,
    pub expense_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorityAction {
    pub action_id: u32,
    pub action: String,
    pub owner: String,
    pub deadline: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_recovery: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_deferral: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmergencyActionPlan {
    pub action_date: NaiveDate,
    pub priority_actions: Vec<PriorityAction>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImmediateAction {
    Urgent,
    Monitor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub immediate_action: ImmediateAction,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuccessReport {
    pub run_id: Uuid,
    pub agent_id: String,
    pub org_id: String,
    pub timestamp: DateTime<Utc>,
    pub stages_completed: Vec<PipelineStage>,
    pub current_position: CurrentPosition,
    pub collision_analysis: CollisionAnalysis,
    pub mandatory_expenses_91d: MandatoryExpenseSummary,
    pub forecast_summary: ForecastSummary,
    pub partial_history: bool,
    /// SHA-256 of the history the forecast model was trained on
    pub input_fingerprint: String,
    pub model_seed: u64,
    pub emergency_action_plan: Option<EmergencyActionPlan>,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReport {
    pub run_id: Uuid,
    pub agent_id: String,
    pub org_id: String,
    pub timestamp: DateTime<Utc>,
    /// Stage that was running when the run aborted
    pub failed_stage: PipelineStage,
    pub message: String,
}

/// What `detect_collisions` hands back: always well-formed, never a panic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CollisionReport {
    Success(Box<SuccessReport>),
    Error(ErrorReport),
}

impl CollisionReport {
    pub fn is_success(&self) -> bool {
        matches!(self, CollisionReport::Success(_))
    }

    pub fn as_success(&self) -> Option<&SuccessReport> {
        match self {
            CollisionReport::Success(report) => Some(report),
            CollisionReport::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorReport> {
        match self {
            CollisionReport::Success(_) => None,
            CollisionReport::Error(report) => Some(report),
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SeverityLevel::Low => "low",
            SeverityLevel::Medium => "medium",
            SeverityLevel::High => "high",
            SeverityLevel::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStage::Initialized => "initialized",
            PipelineStage::BalanceFetched => "balance_fetched",
            PipelineStage::ForecastRetrieved => "forecast_retrieved",
            PipelineStage::MandatoryExpensesRetrieved => "mandatory_expenses_retrieved",
            PipelineStage::CreditLimitsRetrieved => "credit_limits_retrieved",
            PipelineStage::CollisionsDetected => "collisions_detected",
            PipelineStage::SeverityAnalyzed => "severity_analyzed",
            PipelineStage::MitigationGenerated => "mitigation_generated",
            PipelineStage::Complete => "complete",
        };
        write!(f, "{}", s)
    }
}
