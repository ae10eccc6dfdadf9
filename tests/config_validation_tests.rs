//! Config Validation Tests
//!
//! Typo detection, range checks and cross-section checks of the run
//! configuration, exercised through the public loading API.

use kinesync::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use kinesync::config::{ConfigError, RunConfig};
use kinesync::types::JointAxis;

fn validation_errors(toml_str: &str) -> Vec<String> {
    match RunConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => errors,
        Err(other) => panic!("expected validation errors, got {other}"),
        Ok(_) => panic!("expected validation errors, config was accepted"),
    }
}

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_run_section_warns_with_suggestion() {
    let toml_str = r#"
[run]
time_stpe = 0.5
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert_eq!(warnings[0].field, "run.time_stpe");
    assert_eq!(warnings[0].suggestion.as_deref(), Some("run.time_step"));
}

#[test]
fn typo_in_sensor_entry_warns() {
    let toml_str = r#"
[[sensors.list]]
name = "torso"
frmae = "torso_imu"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("sensors.list.frame"));
}

#[test]
fn typo_in_rule_axis_warns() {
    let toml_str = r#"
[risk.severe.rules]
right_abdution = "@value > 90"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("risk.severe.rules.right_abduction")
    );
}

#[test]
fn unrelated_key_has_no_suggestion() {
    let warnings = validate_unknown_keys("[dashboard]\nport = 8080\n");
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.suggestion.is_none()));
}

#[test]
fn shipped_config_has_no_unknown_keys() {
    let shipped = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/kinesync.toml"))
        .expect("kinesync.toml ships with the repo");
    assert!(validate_unknown_keys(&shipped).is_empty());
    let config = RunConfig::from_toml_str(&shipped).unwrap();
    assert_eq!(config, RunConfig::default());
}

#[test]
fn serialized_defaults_only_use_known_keys() {
    let text = RunConfig::default().to_toml().unwrap();
    assert!(validate_unknown_keys(&text).is_empty(), "{text}");
}

#[test]
fn every_axis_has_coordinate_and_rule_keys() {
    let known = known_config_keys();
    for axis in JointAxis::ALL {
        assert!(known.contains(&format!("kinematics.coordinates.{axis}")));
        assert!(known.contains(&format!("risk.severe.rules.{axis}")));
        assert!(known.contains(&format!("risk.moderate.rules.{axis}")));
    }
}

#[test]
fn suggestion_respects_distance_limit() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("sensors.frequncy_hz", &known).as_deref(),
        Some("sensors.frequency_hz")
    );
    assert!(suggest_correction("completely.unrelated.key", &known).is_none());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn defaults_pass_range_checks() {
    let (errors, warnings) = validate_ranges(&RunConfig::default());
    assert!(errors.is_empty(), "{errors:?}");
    assert!(warnings.is_empty(), "{warnings:?}");
}

#[test]
fn non_positive_timing_is_rejected() {
    let errors = validation_errors(
        r#"
[run]
time_step = 0.0
channel_capacity = 0
[sensors]
frequency_hz = -2.0
"#,
    );
    assert!(errors.iter().any(|e| e.contains("run.time_step")));
    assert!(errors.iter().any(|e| e.contains("run.channel_capacity")));
    assert!(errors.iter().any(|e| e.contains("sensors.frequency_hz")));
}

#[test]
fn mismatched_time_step_is_only_a_warning() {
    let mut config = RunConfig::default();
    config.run.time_step = 0.25;
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.field == "run.time_step"));
    assert!(config.validate().is_ok());
}

#[test]
fn rejection_angle_out_of_range() {
    let mut config = RunConfig::default();
    config.sensors.ahrs.magnetic_rejection = 200.0;
    let (errors, _) = validate_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("magnetic_rejection")));
}

// ============================================================================
// Cross-section Validation
// ============================================================================

/// A full rule table for `tier` with every axis set to `"False"` except the
/// given overrides.
fn rules_table(tier: &str, overrides: &[(JointAxis, &str)]) -> String {
    let mut text = format!("[risk.{tier}.rules]\n");
    for axis in JointAxis::ALL {
        let rule = overrides
            .iter()
            .find(|(a, _)| *a == axis)
            .map_or("False", |&(_, r)| r);
        text.push_str(&format!("{axis} = {rule:?}\n"));
    }
    text
}

#[test]
fn bad_rule_is_a_fatal_config_error() {
    let errors = validation_errors(&rules_table(
        "severe",
        &[
            (JointAxis::RightAbduction, "@value >"),
            (JointAxis::LeftFlexion, "__import__('os')"),
        ],
    ));
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors[0].contains("risk.severe.rules.right_abduction"));
    assert!(errors[1].contains("risk.severe.rules.left_flexion"));
}

#[test]
fn tier_must_define_every_axis() {
    let result = RunConfig::from_toml_str(
        r#"
[risk.severe.rules]
right_abduction = "@value > 90"
"#,
    );
    assert!(matches!(result, Err(ConfigError::Parse(..))));
}

#[test]
fn rule_without_placeholder_is_accepted() {
    let config = RunConfig::from_toml_str(&rules_table(
        "moderate",
        &[(JointAxis::RightAbduction, "45 < @value <= 90")],
    ))
    .unwrap();
    let (_, warnings) = validate_ranges(&config);
    assert!(warnings
        .iter()
        .any(|w| w.field == "risk.moderate.rules.right_rotation"));
    assert!(!warnings
        .iter()
        .any(|w| w.field == "risk.moderate.rules.right_abduction"));
}

#[test]
fn zero_duration_is_rejected() {
    let text = format!("[risk.moderate]\nduration = 0\n\n{}", rules_table("moderate", &[]));
    let errors = validation_errors(&text);
    assert_eq!(errors, vec!["risk.moderate.duration must be >= 1".to_string()]);
}

#[test]
fn duplicate_sensor_names_are_rejected() {
    let errors = validation_errors(
        r#"
[[sensors.list]]
name = "torso"
frame = "torso_imu"

[[sensors.list]]
name = "torso"
frame = "humerus_r_imu"

[kinematics]
coordinates = {}
joints = []
"#,
    );
    assert!(errors.iter().any(|e| e.contains("duplicate sensor name 'torso'")));
}

#[test]
fn joints_must_reference_enabled_frames() {
    let errors = validation_errors(
        r#"
[[sensors.list]]
name = "torso"
frame = "torso_imu"

[kinematics.coordinates]
right_abduction = "shoulder_abduction_r"
"#,
    );
    assert!(errors
        .iter()
        .any(|e| e.contains("humerus_r_imu") && e.contains("no enabled sensor")));
}

#[test]
fn mapped_coordinate_must_be_solved() {
    let errors = validation_errors(
        r#"
[kinematics.coordinates]
right_abduction = "shoulder_elevation_r"
"#,
    );
    assert_eq!(
        errors,
        vec![
            "kinematics.coordinates.right_abduction = 'shoulder_elevation_r' is not defined in kinematics.joints"
                .to_string()
        ]
    );
}

#[test]
fn rotation_expressions_must_be_finite() {
    let errors = validation_errors(
        r#"
[kinematics.sensor_to_model_rotation]
x = "-pi/2"
y = "1/0"
z = "log(-1)"
"#,
    );
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors[0].contains("sensor_to_model_rotation.y"));
    assert!(errors[1].contains("sensor_to_model_rotation.z"));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = RunConfig::load_from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::Io(..))));
}

#[test]
fn file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.toml");
    let mut config = RunConfig::default();
    config.run.expected_frames = Some(250);
    config.risk.severe.duration = Some(6);
    std::fs::write(&path, config.to_toml().unwrap()).unwrap();

    let loaded = RunConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.risk_evaluator().severe_duration(), 6);
}
