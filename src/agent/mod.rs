//! Collision agent - runs the detection pipeline end to end
//!
//! BALANCE → FORECAST → MANDATORY EXPENSES → CREDIT → DETECT → SEVERITY → MITIGATE → COMPLETE
//!
//! Stages run strictly in order. Balance and forecast failures abort the run;
//! mandatory-expense, credit and mitigation-data failures degrade to empty or
//! zero inputs. Whatever happens, the caller gets a well-formed report.

use crate::backend::FinancialBackend;
use crate::collision::{
    build_mandatory_expenses, detect_collisions, report, MitigationGenerator, SeverityScorer,
};
use crate::config::AgentConfig;
use crate::error::CollisionError;
use crate::forecast::{ForecastGenerator, ForecastRequest, FORECAST_HORIZON_DAYS};
use crate::models::{
    BalancePosition, CollisionReport, CreditPosition, CurrentPosition, DateWindow, ErrorReport,
    MandatoryExpenses, PaymentDirection, PipelineStage, SuccessReport,
};
use crate::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const AGENT_ID: &str = "liquidity_collision_agent";

/// Look-back for invoices considered collectable during mitigation
const INVOICE_LOOKBACK_DAYS: i64 = 90;

/// The stage in flight plus the ordered stages a run has finished
struct StageTrace<'a> {
    org_id: &'a str,
    running: PipelineStage,
    completed: Vec<PipelineStage>,
}

impl<'a> StageTrace<'a> {
    fn new(org_id: &'a str) -> Self {
        Self {
            org_id,
            running: PipelineStage::Initialized,
            completed: vec![PipelineStage::Initialized],
        }
    }

    fn begin(&mut self, stage: PipelineStage) {
        debug!(org_id = self.org_id, stage = %stage, "Stage started");
        self.running = stage;
    }

    fn complete(&mut self) {
        info!(org_id = self.org_id, stage = %self.running, "Stage complete");
        self.completed.push(self.running);
    }
}

pub struct CollisionAgent {
    backend: Arc<dyn FinancialBackend>,
    config: AgentConfig,
}

impl CollisionAgent {
    pub fn new(backend: Arc<dyn FinancialBackend>, config: AgentConfig) -> Self {
        Self { backend, config }
    }

    /// Run one detection pass for `org_id` as of now
    pub async fn detect_collisions(&self, org_id: &str) -> CollisionReport {
        self.detect_collisions_as_of(org_id, Utc::now()).await
    }

    /// Run one detection pass with a pinned reference time.
    ///
    /// `as_of` is the only clock the pipeline reads, so a run that spans
    /// midnight still computes every day offset from the same date.
    pub async fn detect_collisions_as_of(
        &self,
        org_id: &str,
        as_of: DateTime<Utc>,
    ) -> CollisionReport {
        let run_id = Uuid::new_v4();
        let start_time = Instant::now();
        let mut trace = StageTrace::new(org_id);

        info!(%run_id, org_id, as_of = %as_of, "Collision detection started");

        match self.run_pipeline(org_id, as_of, run_id, &mut trace).await {
            Ok(report) => {
                info!(
                    %run_id,
                    org_id,
                    collisions = report.collision_analysis.total_collisions_detected,
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    "Collision detection complete"
                );
                CollisionReport::Success(Box::new(report))
            }
            Err(e) => {
                let failed_stage = trace.running;
                error!(%run_id, org_id, failed_stage = %failed_stage, error = %e, "Collision detection failed");
                CollisionReport::Error(ErrorReport {
                    run_id,
                    agent_id: AGENT_ID.to_string(),
                    org_id: org_id.to_string(),
                    timestamp: as_of,
                    failed_stage,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn run_pipeline(
        &self,
        org_id: &str,
        as_of: DateTime<Utc>,
        run_id: Uuid,
        trace: &mut StageTrace<'_>,
    ) -> Result<SuccessReport> {
        if org_id.trim().is_empty() {
            return Err(CollisionError::MissingOrgId);
        }
        let today = as_of.date_naive();

        // === BALANCE ===
        trace.begin(PipelineStage::BalanceFetched);
        let balance = self.fetch_balance(org_id, today).await?;
        trace.complete();

        // === FORECAST ===
        trace.begin(PipelineStage::ForecastRetrieved);
        let forecast = ForecastGenerator::new(self.backend.as_ref(), &self.config)
            .generate(
                org_id,
                ForecastRequest {
                    window: None,
                    opening_balance: Some(balance.opening_balance),
                },
                as_of,
            )
            .await?;
        trace.complete();

        // === MANDATORY EXPENSES ===
        trace.begin(PipelineStage::MandatoryExpensesRetrieved);
        let mandatory = self.fetch_mandatory_expenses(org_id, today).await;
        trace.complete();

        // === CREDIT ===
        trace.begin(PipelineStage::CreditLimitsRetrieved);
        let credit = self.fetch_credit(org_id).await;
        trace.complete();

        // === DETECT ===
        trace.begin(PipelineStage::CollisionsDetected);
        let mut collisions = detect_collisions(
            &forecast.days,
            &mandatory,
            balance.minimum_balance,
            credit.available_credit,
            today,
        );
        trace.complete();

        // === SEVERITY ===
        trace.begin(PipelineStage::SeverityAnalyzed);
        SeverityScorer::new(self.config.policy.magnitude_normalizer).score_all(&mut collisions);
        trace.complete();

        // === MITIGATE ===
        trace.begin(PipelineStage::MitigationGenerated);
        let invoices = self
            .backend
            .invoices(org_id, Some(today - Duration::days(INVOICE_LOOKBACK_DAYS)))
            .await
            .unwrap_or_else(|e| {
                warn!(org_id, error = %e, "Invoice fetch failed, no collection levers");
                Vec::new()
            });
        let customers = self.backend.customers(org_id).await.unwrap_or_else(|e| {
            warn!(org_id, error = %e, "Customer fetch failed, default reliability");
            Vec::new()
        });
        MitigationGenerator::new(
            &invoices,
            &customers,
            credit.available_credit,
            self.config.policy.mitigation_coverage_threshold,
        )
        .apply_all(&mut collisions);
        trace.complete();

        // === REPORT ===
        trace.begin(PipelineStage::Complete);
        let emergency_action_plan =
            report::emergency_action_plan(collisions.first(), credit.available_credit);
        let recommendation = report::recommendation(collisions.len());
        let collision_analysis = report::build_analysis(collisions);
        trace.complete();

        Ok(SuccessReport {
            run_id,
            agent_id: AGENT_ID.to_string(),
            org_id: org_id.to_string(),
            timestamp: as_of,
            stages_completed: trace.completed.clone(),
            current_position: CurrentPosition {
                current_balance: balance.current_balance,
                minimum_balance: balance.minimum_balance,
                balance_gap: balance.balance_gap,
                available_credit: credit.available_credit,
                credit_utilization_pct: credit.credit_utilization_pct,
            },
            collision_analysis,
            mandatory_expenses_91d: report::summarize_mandatory(&mandatory),
            forecast_summary: forecast.summary,
            partial_history: forecast.partial_history,
            input_fingerprint: forecast.model_info.input_fingerprint,
            model_seed: forecast.model_info.seed,
            emergency_action_plan,
            recommendation,
        })
    }

    /// Opening balance plus every payment up to today. Fatal on failure.
    async fn fetch_balance(&self, org_id: &str, today: NaiveDate) -> Result<BalancePosition> {
        let summary = self.backend.organization_summary(org_id).await?;
        let payments = self.backend.payments(org_id, DateWindow::until(today)).await?;

        let (recent_inflows, recent_outflows) =
            payments
                .iter()
                .fold((0.0, 0.0), |(inflows, outflows), p| match p.direction {
                    PaymentDirection::Outflow => (inflows, outflows + p.amount),
                    PaymentDirection::Inflow | PaymentDirection::Unspecified => {
                        (inflows + p.amount, outflows)
                    }
                });

        let current_balance = summary.opening_balance + recent_inflows - recent_outflows;
        let minimum_balance = summary
            .minimum_balance_required
            .unwrap_or(self.config.policy.default_minimum_balance);

        info!(
            org_id,
            opening = summary.opening_balance,
            inflows = recent_inflows,
            outflows = recent_outflows,
            current = current_balance,
            "Current balance computed"
        );

        Ok(BalancePosition {
            opening_balance: summary.opening_balance,
            current_balance,
            minimum_balance,
            balance_gap: current_balance - minimum_balance,
            recent_inflows,
            recent_outflows,
        })
    }

    /// Mandatory bills due within the forecast horizon; empty on failure
    async fn fetch_mandatory_expenses(&self, org_id: &str, today: NaiveDate) -> MandatoryExpenses {
        let window =
            DateWindow::between(today, today + Duration::days(FORECAST_HORIZON_DAYS as i64));

        match self.backend.bills(org_id, window).await {
            Ok(bills) => {
                let expenses = build_mandatory_expenses(&bills);
                debug!(
                    org_id,
                    bills = bills.len(),
                    due_dates = expenses.buckets.len(),
                    total = expenses.total_amount,
                    "Mandatory expenses bucketed"
                );
                expenses
            }
            Err(e) => {
                warn!(org_id, error = %e, "Bill fetch failed, assuming no mandatory expenses");
                MandatoryExpenses::default()
            }
        }
    }

    /// Credit line headroom; zero on failure
    async fn fetch_credit(&self, org_id: &str) -> CreditPosition {
        match self.backend.organization_summary(org_id).await {
            Ok(summary) => {
                let limit = summary.credit_line_limit;
                let utilized = summary.credit_line_utilized;
                CreditPosition {
                    credit_line_limit: limit,
                    credit_line_utilized: utilized,
                    available_credit: limit - utilized,
                    credit_utilization_pct: if limit > 0.0 {
                        utilized / limit * 100.0
                    } else {
                        0.0
                    },
                }
            }
            Err(e) => {
                warn!(org_id, error = %e, "Credit fetch failed, assuming no available credit");
                CreditPosition {
                    credit_line_limit: 0.0,
                    credit_line_utilized: 0.0,
                    available_credit: 0.0,
                    credit_utilization_pct: 0.0,
                }
            }
        }
    }
}
