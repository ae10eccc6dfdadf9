//! Windowed risk evaluation
//!
//! Each kinematic frame is checked against two rule sets (severe and
//! moderate). Each tier keeps its own [`SustainedRiskWindow`] so a joint-axis
//! only counts as a sustained risk after it has been flagged for `duration`
//! consecutive frames.

mod aggregation;
mod window;

pub use aggregation::RiskAggregation;
pub use window::SustainedRiskWindow;

use serde::{Deserialize, Serialize};

use crate::expr::{ExprError, RuleExpression};
use crate::types::{JointAxis, KinematicFrame, RiskLevel, RiskVector, JOINT_AXIS_COUNT};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum RiskError {
    #[error("{tier} rule for {axis} failed: {source}")]
    Expression {
        tier: RiskLevel,
        axis: JointAxis,
        #[source]
        source: ExprError,
    },

    #[error("{axis} has non-finite value {value}")]
    NonFiniteValue { axis: JointAxis, value: f64 },
}

// ============================================================================
// Rule sets
// ============================================================================

/// One rule expression per joint-axis.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: [RuleExpression; JOINT_AXIS_COUNT],
}

impl RuleSet {
    pub fn new(rules: [RuleExpression; JOINT_AXIS_COUNT]) -> Self {
        Self { rules }
    }

    pub fn from_fn(mut rule: impl FnMut(JointAxis) -> RuleExpression) -> Self {
        Self::new(std::array::from_fn(|i| rule(JointAxis::ALL[i])))
    }

    /// The same rule on every axis.
    pub fn uniform(template: &str) -> Self {
        Self::from_fn(|_| RuleExpression::new(template))
    }

    /// Builder-style override of a single axis.
    pub fn with(mut self, axis: JointAxis, rule: impl Into<RuleExpression>) -> Self {
        self.rules[axis.index()] = rule.into();
        self
    }

    pub fn get(&self, axis: JointAxis) -> &RuleExpression {
        &self.rules[axis.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointAxis, &RuleExpression)> {
        JointAxis::ALL.into_iter().zip(self.rules.iter())
    }

    /// Syntax-check every rule, returning the failures.
    pub fn check(&self) -> Vec<(JointAxis, ExprError)> {
        self.iter()
            .filter_map(|(axis, rule)| rule.check().err().map(|e| (axis, e)))
            .collect()
    }
}

/// A rule set plus the number of consecutive frames that makes a flag
/// sustained.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskTier {
    pub rules: RuleSet,
    pub duration: usize,
}

impl RiskTier {
    pub fn new(rules: RuleSet, duration: usize) -> Self {
        Self { rules, duration }
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Per-frame result of [`RiskEvaluator::assess`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub timestamp: f64,
    /// This frame's severe evaluation.
    pub severe: RiskVector,
    /// This frame's moderate evaluation.
    pub moderate: RiskVector,
    pub sustained_severe: RiskVector,
    pub sustained_moderate: RiskVector,
}

impl RiskAssessment {
    /// Sustained level of one axis.
    pub fn level(&self, axis: JointAxis) -> RiskLevel {
        RiskLevel::classify(&self.sustained_severe, &self.sustained_moderate, axis)
    }

    /// Highest sustained level across all axes.
    pub fn max_level(&self) -> RiskLevel {
        JointAxis::ALL
            .into_iter()
            .map(|a| self.level(a))
            .max()
            .unwrap_or_default()
    }
}

/// Evaluate `rules` against every axis of `frame`. Numeric results count as
/// flagged when non-zero.
pub fn evaluate_rules(
    frame: &KinematicFrame,
    rules: &RuleSet,
    tier: RiskLevel,
) -> Result<RiskVector, RiskError> {
    let mut vector = RiskVector::clear(frame.timestamp);
    for (axis, rule) in rules.iter() {
        let value = frame.get(axis);
        if !value.is_finite() {
            return Err(RiskError::NonFiniteValue { axis, value });
        }
        let flagged = rule
            .evaluate(value)
            .map_err(|source| RiskError::Expression { tier, axis, source })?
            .truthy();
        vector = vector.with(axis, flagged);
    }
    Ok(vector)
}

/// Severe and moderate tiers with their sustained-risk windows.
#[derive(Debug, Clone)]
pub struct RiskEvaluator {
    severe: RiskTier,
    moderate: RiskTier,
    severe_window: SustainedRiskWindow,
    moderate_window: SustainedRiskWindow,
}

impl RiskEvaluator {
    pub fn new(severe: RiskTier, moderate: RiskTier) -> Self {
        Self {
            severe_window: SustainedRiskWindow::new(severe.duration),
            moderate_window: SustainedRiskWindow::new(moderate.duration),
            severe,
            moderate,
        }
    }

    pub fn eval_severe(&self, frame: &KinematicFrame) -> Result<RiskVector, RiskError> {
        evaluate_rules(frame, &self.severe.rules, RiskLevel::Severe)
    }

    pub fn eval_moderate(&self, frame: &KinematicFrame) -> Result<RiskVector, RiskError> {
        evaluate_rules(frame, &self.moderate.rules, RiskLevel::Moderate)
    }

    /// Evaluate both tiers and advance both windows.
    ///
    /// Neither window advances if either tier fails.
    pub fn assess(&mut self, frame: &KinematicFrame) -> Result<RiskAssessment, RiskError> {
        let severe = self.eval_severe(frame)?;
        let moderate = self.eval_moderate(frame)?;
        Ok(RiskAssessment {
            timestamp: frame.timestamp,
            severe,
            moderate,
            sustained_severe: self.severe_window.push(severe),
            sustained_moderate: self.moderate_window.push(moderate),
        })
    }

    pub fn sustained_severe(&self) -> RiskVector {
        self.severe_window.sustained()
    }

    pub fn sustained_moderate(&self) -> RiskVector {
        self.moderate_window.sustained()
    }

    pub fn severe_duration(&self) -> usize {
        self.severe_window.duration()
    }

    pub fn moderate_duration(&self) -> usize {
        self.moderate_window.duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator(severe_duration: usize) -> RiskEvaluator {
        let severe = RuleSet::uniform("False").with(JointAxis::RightAbduction, "@value > 60");
        let moderate = RuleSet::uniform("False").with(JointAxis::RightAbduction, "30 < @value <= 60");
        RiskEvaluator::new(
            RiskTier::new(severe, severe_duration),
            RiskTier::new(moderate, 2),
        )
    }

    fn frame(ts: f64, abduction: f64) -> KinematicFrame {
        KinematicFrame::zeroed(ts).with(JointAxis::RightAbduction, abduction)
    }

    #[test]
    fn test_eval_tiers() {
        let eval = evaluator(4);
        let f = frame(0.0, 75.0);
        assert!(eval.eval_severe(&f).unwrap().get(JointAxis::RightAbduction));
        assert!(!eval.eval_moderate(&f).unwrap().get(JointAxis::RightAbduction));

        let f = frame(0.0, 45.0);
        assert!(!eval.eval_severe(&f).unwrap().get(JointAxis::RightAbduction));
        assert!(eval.eval_moderate(&f).unwrap().get(JointAxis::RightAbduction));
    }

    #[test]
    fn test_numeric_results_coerced() {
        let rules = RuleSet::uniform("0").with(JointAxis::LeftFlexion, "@value - 1");
        let v = evaluate_rules(&frame(0.0, 0.0), &rules, RiskLevel::Moderate).unwrap();
        // left_flexion is 0.0 in the frame, so 0 - 1 = -1 is truthy
        assert_eq!(v.flagged_axes(), vec![JointAxis::LeftFlexion]);
    }

    #[test]
    fn test_severe_duration_four() {
        let mut eval = evaluator(4);
        let readings = [70.0, 80.0, 90.0, 10.0, 70.0, 70.0, 70.0, 70.0];
        let sustained: Vec<bool> = readings
            .iter()
            .enumerate()
            .map(|(i, v)| {
                eval.assess(&frame(i as f64 * 0.5, *v))
                    .unwrap()
                    .sustained_severe
                    .get(JointAxis::RightAbduction)
            })
            .collect();
        assert_eq!(
            sustained,
            vec![false, false, false, false, false, false, false, true]
        );
    }

    #[test]
    fn test_assessment_levels() {
        let mut eval = evaluator(1);
        let a = eval.assess(&frame(0.0, 45.0)).unwrap();
        // moderate duration is 2: not sustained yet
        assert_eq!(a.level(JointAxis::RightAbduction), RiskLevel::None);
        let a = eval.assess(&frame(0.5, 50.0)).unwrap();
        assert_eq!(a.level(JointAxis::RightAbduction), RiskLevel::Moderate);
        let a = eval.assess(&frame(1.0, 65.0)).unwrap();
        assert_eq!(a.level(JointAxis::RightAbduction), RiskLevel::Severe);
        assert_eq!(a.max_level(), RiskLevel::Severe);
    }

    #[test]
    fn test_errors_name_tier_and_axis() {
        let severe = RuleSet::uniform("False").with(JointAxis::LeftRotation, "1 / @value");
        let mut eval = RiskEvaluator::new(
            RiskTier::new(severe, 1),
            RiskTier::new(RuleSet::uniform("False"), 1),
        );
        match eval.assess(&KinematicFrame::zeroed(2.0)) {
            Err(RiskError::Expression { tier, axis, source }) => {
                assert_eq!(tier, RiskLevel::Severe);
                assert_eq!(axis, JointAxis::LeftRotation);
                assert_eq!(source, ExprError::DivisionByZero);
            }
            other => panic!("unexpected {other:?}"),
        }

        let bad = KinematicFrame::zeroed(0.0).with(JointAxis::RightFlexion, f64::NAN);
        assert!(matches!(
            eval.assess(&bad),
            Err(RiskError::NonFiniteValue { axis: JointAxis::RightFlexion, .. })
        ));
    }

    #[test]
    fn test_rule_set_check() {
        let rules = RuleSet::uniform("@value > 1").with(JointAxis::LeftElevation, "@value >");
        let failures = rules.check();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, JointAxis::LeftElevation);
    }
}
