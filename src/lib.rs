//! Liquidity Collision Agent
//!
//! Finds the days in the next 91 where an organization's projected balance,
//! net of mandatory obligations, drops below its required minimum, and
//! proposes ranked ways out:
//! - Rebuilds per-day net cash change from payment history
//! - Trains a seeded tree ensemble and rolls the balance forward 91 days
//! - Intersects the forecast with payroll, rent, loan and tax due dates
//! - Scores every collision by proximity, size and credit cover
//! - Quantifies collection, deferral, credit and restructuring levers
//!
//! PIPELINE:
//! BALANCE → FORECAST → MANDATORY EXPENSES → CREDIT → DETECT → SEVERITY → MITIGATE → REPORT

pub mod agent;
pub mod audit;
pub mod backend;
pub mod collision;
pub mod config;
pub mod error;
pub mod forecast;
pub mod models;

pub use error::Result;

// Re-export common types
pub use agent::CollisionAgent;
pub use backend::{FinancialBackend, HttpBackend, InMemoryBackend};
pub use config::AgentConfig;
pub use error::CollisionError;
pub use models::*;
