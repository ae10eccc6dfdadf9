//! Rule Expression Tests
//!
//! The sandboxed interpreter seen from the outside: rule templates, the
//! default rule sets, and how their results drive the sustained-risk windows.

use kinesync::config::RunConfig;
use kinesync::expr::{evaluate, ExprError, RuleExpression, Value};
use kinesync::risk::{RiskEvaluator, RiskTier, RuleSet};
use kinesync::types::{JointAxis, KinematicFrame, RiskLevel};

// ============================================================================
// Interpreter
// ============================================================================

#[test]
fn placeholder_comparisons() {
    let rule = RuleExpression::new("@value > 10");
    assert_eq!(rule.evaluate(15.0).unwrap(), Value::Bool(true));
    assert_eq!(rule.evaluate(5.0).unwrap(), Value::Bool(false));
    assert_eq!(rule.evaluate(10.0).unwrap(), Value::Bool(false));

    let band = RuleExpression::new("1 < @value < 10");
    assert_eq!(band.evaluate(5.0).unwrap(), Value::Bool(true));
    assert_eq!(band.evaluate(10.0).unwrap(), Value::Bool(false));
    assert_eq!(band.evaluate(-3.0).unwrap(), Value::Bool(false));
}

#[test]
fn negative_values_substitute_safely() {
    let rule = RuleExpression::new("-@value > 20");
    assert_eq!(rule.render(-30.0).unwrap(), "-(-30.0) > 20");
    assert_eq!(rule.evaluate(-30.0).unwrap(), Value::Bool(true));

    let power = RuleExpression::new("@value ** 2 > 100");
    assert_eq!(power.evaluate(-11.0).unwrap(), Value::Bool(true));
}

#[test]
fn math_functions_are_allowed() {
    assert_eq!(evaluate("sin(0)").unwrap(), Value::Number(0.0));
    let rule = RuleExpression::new("fabs(@value) > 60 or sqrt(fabs(@value)) > 9");
    assert!(rule.evaluate(-61.0).unwrap().truthy());
    assert!(!rule.evaluate(50.0).unwrap().truthy());
}

#[test]
fn unknown_names_are_syntax_errors() {
    for text in [
        "undefined_fn(1)",
        "__import__('os')",
        "os.system('ls')",
        "x + 1",
        "lambda: 1",
        "[1, 2]",
        "1; 2",
    ] {
        let err = evaluate(text).unwrap_err();
        assert!(err.is_syntax(), "{text} -> {err}");
    }
}

#[test]
fn leftover_placeholder_is_not_an_identifier() {
    // '@' only has meaning before substitution
    assert!(evaluate("@value > 1").unwrap_err().is_syntax());
}

#[test]
fn non_finite_values_are_rejected_before_evaluation() {
    let rule = RuleExpression::new("@value > 0");
    assert!(matches!(
        rule.evaluate(f64::NAN),
        Err(ExprError::NonFiniteInput { .. })
    ));
    assert!(matches!(
        rule.evaluate(f64::INFINITY),
        Err(ExprError::NonFiniteInput { .. })
    ));
}

#[test]
fn arithmetic_errors_surface_per_call() {
    let rule = RuleExpression::new("1 / @value > 0");
    assert!(rule.check().is_ok());
    assert_eq!(rule.evaluate(0.0).unwrap_err(), ExprError::DivisionByZero);
    assert_eq!(rule.evaluate(2.0).unwrap(), Value::Bool(true));
}

#[test]
fn runaway_chains_fail_as_syntax_errors() {
    let rule = RuleExpression::new(format!("@value > 1{}", "+1".repeat(200_000)));
    assert!(rule.check().unwrap_err().is_syntax());
    assert!(rule.evaluate(2.0).unwrap_err().is_syntax());

    let err = evaluate(&format!("1{}", "+1".repeat(200_000))).unwrap_err();
    assert!(err.is_syntax(), "{err}");

    // a realistic rule length still evaluates
    let sum = format!("1{}", "+1".repeat(40));
    assert_eq!(evaluate(&sum).unwrap(), Value::Number(41.0));
}

// ============================================================================
// Default Rules
// ============================================================================

#[test]
fn default_rules_parse() {
    let config = RunConfig::default();
    for set in [config.risk.severe.rules.rule_set(), config.risk.moderate.rules.rule_set()] {
        assert!(set.check().is_empty());
    }
}

#[test]
fn default_tiers_do_not_overlap() {
    let evaluator = RunConfig::default().risk_evaluator();
    for angle in [-120.0, -70.0, -45.0, -20.0, 0.0, 10.0, 20.0, 40.0, 50.0, 70.0, 95.0, 150.0] {
        let mut frame = KinematicFrame::zeroed(0.0);
        for axis in JointAxis::ALL {
            frame = frame.with(axis, angle);
        }
        let severe = evaluator.eval_severe(&frame).unwrap();
        let moderate = evaluator.eval_moderate(&frame).unwrap();
        for axis in JointAxis::ALL {
            assert!(
                !(severe.get(axis) && moderate.get(axis)),
                "{axis} flagged twice at {angle}"
            );
        }
    }
}

// ============================================================================
// Sustained Windows
// ============================================================================

fn abduction_frame(ts: f64, degrees: f64) -> KinematicFrame {
    KinematicFrame::zeroed(ts).with(JointAxis::RightAbduction, degrees)
}

#[test]
fn severe_duration_four_on_right_abduction() {
    let mut evaluator = RiskEvaluator::new(
        RiskTier::new(RuleSet::uniform("@value > 90"), 4),
        RiskTier::new(RuleSet::uniform("45 < @value <= 90"), 8),
    );

    let angles = [100.0, 100.0, 100.0, 100.0, 100.0, 50.0, 100.0];
    let sustained: Vec<bool> = angles
        .iter()
        .enumerate()
        .map(|(i, &a)| {
            evaluator
                .assess(&abduction_frame(i as f64 * 0.5, a))
                .unwrap()
                .sustained_severe
                .get(JointAxis::RightAbduction)
        })
        .collect();

    assert_eq!(sustained, vec![false, false, false, true, true, false, false]);
}

#[test]
fn sustained_level_prefers_severe() {
    let mut evaluator = RiskEvaluator::new(
        RiskTier::new(RuleSet::uniform("@value > 90"), 1),
        RiskTier::new(RuleSet::uniform("@value > 45"), 1),
    );
    let assessment = evaluator.assess(&abduction_frame(0.0, 95.0)).unwrap();
    assert_eq!(assessment.level(JointAxis::RightAbduction), RiskLevel::Severe);
    assert_eq!(assessment.level(JointAxis::LeftAbduction), RiskLevel::None);
    assert_eq!(assessment.max_level(), RiskLevel::Severe);
}

#[test]
fn rule_errors_name_the_axis() {
    let mut evaluator = RiskEvaluator::new(
        RiskTier::new(
            RuleSet::uniform("@value > 90").with(JointAxis::LeftRotation, "100 / @value > 1"),
            1,
        ),
        RiskTier::new(RuleSet::uniform("False"), 1),
    );
    let err = evaluator.assess(&KinematicFrame::zeroed(1.5)).unwrap_err();
    assert!(err.to_string().contains("left_rotation"), "{err}");
}
