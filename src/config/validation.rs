//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::RunConfig;
use crate::types::JointAxis;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for RunConfig.
///
/// Entries of an array of tables share the array's path, so
/// `[[sensors.list]] name = ..` is `sensors.list.name`. Joint-axis keys under
/// `coordinates` and `rules` are generated from [`JointAxis::ALL`].
pub fn known_config_keys() -> HashSet<String> {
    let fixed: &[&str] = &[
        // [run]
        "run",
        "run.output_dir",
        "run.time_step",
        "run.expected_frames",
        "run.cycle_timeout_secs",
        "run.channel_capacity",
        "run.progress_interval",
        // [sensors]
        "sensors",
        "sensors.data_dir",
        "sensors.frequency_hz",
        "sensors.realtime",
        "sensors.list",
        "sensors.list.name",
        "sensors.list.frame",
        "sensors.list.enabled",
        "sensors.ahrs",
        "sensors.ahrs.gain",
        "sensors.ahrs.acceleration_rejection",
        "sensors.ahrs.magnetic_rejection",
        "sensors.ahrs.rejection_timeout",
        // [kinematics]
        "kinematics",
        "kinematics.coordinates",
        "kinematics.sensor_to_model_rotation",
        "kinematics.sensor_to_model_rotation.x",
        "kinematics.sensor_to_model_rotation.y",
        "kinematics.sensor_to_model_rotation.z",
        "kinematics.joints",
        "kinematics.joints.coordinate",
        "kinematics.joints.parent",
        "kinematics.joints.child",
        "kinematics.joints.axis",
        "kinematics.joints.invert",
        // [risk]
        "risk",
        "risk.severe",
        "risk.severe.duration",
        "risk.severe.rules",
        "risk.moderate",
        "risk.moderate.duration",
        "risk.moderate.rules",
    ];

    let mut keys: HashSet<String> = fixed.iter().map(|k| k.to_string()).collect();
    for axis in JointAxis::ALL {
        keys.insert(format!("kinematics.coordinates.{axis}"));
        keys.insert(format!("risk.severe.rules.{axis}"));
        keys.insert(format!("risk.moderate.rules.{axis}"));
    }
    keys
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`. Tables inside arrays are walked under the array's
/// own path.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            match v {
                toml::Value::Table(_) => keys.extend(walk_toml_keys(v, &path)),
                toml::Value::Array(items) => {
                    for item in items.iter().filter(|i| i.is_table()) {
                        keys.extend(walk_toml_keys(item, &path));
                    }
                }
                _ => {}
            }
        }
    }
    keys.sort();
    keys.dedup();
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<String>) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.clone())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Never fails: TOML syntax errors are left for the serde pass to report.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate numeric ranges on a parsed RunConfig.
///
/// Returns (errors, warnings): errors are values the pipeline cannot run
/// with; warnings are suspicious but not fatal.
pub fn validate_ranges(config: &RunConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let run = &config.run;
    let sensors = &config.sensors;

    positive("run.time_step", run.time_step, &mut errors);
    positive("run.cycle_timeout_secs", run.cycle_timeout_secs, &mut errors);
    positive("sensors.frequency_hz", sensors.frequency_hz, &mut errors);

    if run.channel_capacity == 0 {
        errors.push("run.channel_capacity must be >= 1".to_string());
    }

    if run.expected_frames == Some(0) {
        warnings.push(ValidationWarning {
            field: "run.expected_frames".to_string(),
            message: "run.expected_frames = 0: the run will stop before the first frame".to_string(),
            suggestion: None,
        });
    }

    // Fusion steps at 1/frequency rounded to 2 decimals
    if sensors.frequency_hz.is_finite() && sensors.frequency_hz > 0.0 {
        if sensors.sample_period() <= 0.0 {
            errors.push(format!(
                "sensors.frequency_hz = {} rounds to a zero sample period",
                sensors.frequency_hz
            ));
        } else if run.time_step.is_finite()
            && (run.time_step - 1.0 / sensors.frequency_hz).abs() > 1e-9
        {
            warnings.push(ValidationWarning {
                field: "run.time_step".to_string(),
                message: format!(
                    "run.time_step = {} does not match 1 / sensors.frequency_hz ({:.4}); frame timestamps will drift from sample time",
                    run.time_step,
                    1.0 / sensors.frequency_hz
                ),
                suggestion: None,
            });
        }
    }

    // AHRS
    let ahrs = &sensors.ahrs;
    if !ahrs.gain.is_finite() || ahrs.gain < 0.0 {
        errors.push(format!("sensors.ahrs.gain = {} must be a finite value >= 0", ahrs.gain));
    }
    for (name, angle) in [
        ("acceleration_rejection", ahrs.acceleration_rejection),
        ("magnetic_rejection", ahrs.magnetic_rejection),
    ] {
        if !angle.is_finite() || !(0.0..=180.0).contains(&angle) {
            errors.push(format!(
                "sensors.ahrs.{name} = {angle} must be between 0 and 180 degrees"
            ));
        } else if angle > 90.0 {
            warnings.push(ValidationWarning {
                field: format!("sensors.ahrs.{name}"),
                message: format!("sensors.ahrs.{name} = {angle} degrees effectively disables rejection"),
                suggestion: None,
            });
        }
    }

    // Rules that ignore the measurement
    for (tier, cfg) in [("severe", &config.risk.severe), ("moderate", &config.risk.moderate)] {
        for (axis, rule) in cfg.rules.rule_set().iter() {
            if !rule.is_blank() && !rule.has_placeholder() {
                warnings.push(ValidationWarning {
                    field: format!("risk.{tier}.rules.{axis}"),
                    message: format!(
                        "risk.{tier}.rules.{axis} = \"{rule}\" does not use {}",
                        crate::expr::PLACEHOLDER
                    ),
                    suggestion: None,
                });
            }
        }
    }

    (errors, warnings)
}

fn positive(field: &str, value: f64, errors: &mut Vec<String>) {
    // NaN comparisons silently pass, so check finiteness first
    if !value.is_finite() || value <= 0.0 {
        errors.push(format!("{field} = {value} must be a finite value > 0"));
    }
}

// ============================================================================
// Tests
// ============================================================================
