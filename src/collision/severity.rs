//! Collision severity scoring
//!
//! Weighted blend of proximity, deficit size and credit cover, clamped to
//! 0..=100 and mapped onto four labels.

use crate::forecast::predictor::round2;
use crate::models::{Collision, SeverityAssessment, SeverityLevel};

const PROXIMITY_WEIGHT: f64 = 0.4;
const MAGNITUDE_WEIGHT: f64 = 0.35;
const CREDIT_WEIGHT: f64 = 0.25;

/// Credit sub-score when the credit line cannot absorb the deficit
const UNCOVERED_CREDIT_SCORE: f64 = 50.0;

/// Days kept in reserve before a collision
const ACTION_BUFFER_DAYS: i64 = 2;

pub struct SeverityScorer {
    /// Deficit at which the magnitude score saturates
    magnitude_normalizer: f64,
}

impl SeverityScorer {
    pub fn new(magnitude_normalizer: f64) -> Self {
        Self {
            magnitude_normalizer,
        }
    }

    pub fn assess(&self, collision: &Collision) -> SeverityAssessment {
        let proximity_score = (100.0 - 2.0 * collision.days_from_now as f64).max(0.0);
        let magnitude_score =
            (collision.deficit_amount / self.magnitude_normalizer * 100.0).min(100.0);
        let credit_score = if collision.credit_can_cover {
            0.0
        } else {
            UNCOVERED_CREDIT_SCORE
        };

        let raw = PROXIMITY_WEIGHT * proximity_score
            + MAGNITUDE_WEIGHT * magnitude_score
            + CREDIT_WEIGHT * credit_score;
        let raw = raw.clamp(0.0, 100.0);

        SeverityAssessment {
            severity_score: round2(raw),
            severity: SeverityLevel::from_score(raw),
            proximity_score,
            magnitude_score,
            credit_score,
            days_to_resolve: (collision.days_from_now - ACTION_BUFFER_DAYS).max(1),
        }
    }

    /// Attach an assessment to every collision, then order them by score,
    /// highest first
    pub fn score_all(&self, collisions: &mut [Collision]) {
        for collision in collisions.iter_mut() {
            collision.severity = Some(self.assess(collision));
        }
        collisions.sort_by(|a, b| b.severity_score().total_cmp(&a.severity_score()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn collision(days_from_now: i64, deficit_amount: f64, credit_can_cover: bool) -> Collision {
        Collision {
            collision_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            predicted_balance: 0.0,
            mandatory_expenses: 0.0,
            balance_after_mandatory: -deficit_amount,
            deficit_amount,
            credit_can_cover,
            days_from_now,
            expense_categories: vec![],
            bills: vec![],
            severity: None,
            mitigation: None,
        }
    }

    fn scorer() -> SeverityScorer {
        SeverityScorer::new(1_000_000_000.0)
    }

    #[test]
    fn test_saturated_collision_is_critical() {
        let s = scorer().assess(&collision(0, 2e9, false));
        assert_eq!(s.proximity_score, 100.0);
        assert_eq!(s.magnitude_score, 100.0);
        assert_eq!(s.credit_score, 50.0);
        assert_eq!(s.severity_score, 87.5);
        assert_eq!(s.severity, SeverityLevel::Critical);
        assert_eq!(s.days_to_resolve, 1);
    }

    #[test]
    fn test_distant_covered_collision_is_low() {
        let s = scorer().assess(&collision(60, 1_000.0, true));
        assert_eq!(s.proximity_score, 0.0);
        assert!(s.magnitude_score < 0.001);
        assert_eq!(s.severity, SeverityLevel::Low);
        assert_eq!(s.days_to_resolve, 58);
    }

    #[test]
    fn test_label_thresholds() {
        // 0.4 × 100 + 0.25 × 50 = 52.5
        assert_eq!(scorer().assess(&collision(0, 0.0, false)).severity, SeverityLevel::Medium);
        // 0.4 × 100 + 0.35 × 60 = 61
        assert_eq!(scorer().assess(&collision(0, 6e8, true)).severity, SeverityLevel::High);
    }

    #[test]
    fn test_negative_days_from_now() {
        let s = scorer().assess(&collision(-3, 10.0, true));
        assert_eq!(s.proximity_score, 106.0);
        assert_eq!(s.days_to_resolve, 1);
    }

    #[test]
    fn test_configurable_normalizer() {
        let s = SeverityScorer::new(1_000.0).assess(&collision(50, 500.0, true));
        assert_eq!(s.magnitude_score, 50.0);
        assert_eq!(s.severity_score, 17.5);
    }

    #[test]
    fn test_sorted_by_score_descending() {
        let mut collisions = vec![
            collision(40, 10.0, true),
            collision(0, 2e9, false),
            collision(10, 5e8, false),
            collision(45, 10.0, false),
        ];
        scorer().score_all(&mut collisions);

        assert!(collisions.iter().all(|c| c.severity.is_some()));
        assert!(collisions
            .windows(2)
            .all(|w| w[0].severity_score() >= w[1].severity_score()));
        assert_eq!(collisions[0].days_from_now, 0);
    }
}
