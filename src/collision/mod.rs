//! Collision engine
//!
//! DETECT → SCORE → MITIGATE → REPORT
//!
//! Each pass adds its own section to a `Collision` and leaves earlier
//! sections untouched.

pub mod detector;
pub mod mitigation;
pub mod report;
pub mod severity;

pub use detector::{build_mandatory_expenses, detect_collisions, is_mandatory_category};
pub use mitigation::{meets_coverage, MitigationGenerator};
pub use severity::SeverityScorer;
