//! Run Configuration
//!
//! Everything a pipeline run needs: sensors, fusion tuning, kinematics
//! mapping and the two risk tiers. Loaded from a TOML file, falling back to
//! built-in defaults that reproduce the stock upper-body setup.
//!
//! ## Loading Priority
//!
//! 1. Explicit path (`--config`)
//! 2. `$KINESYNC_CONFIG` environment variable (path to TOML file)
//! 3. `./kinesync.toml` in the current working directory
//! 4. Built-in defaults

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::expr::{self, RuleExpression};
use crate::fusion::AhrsSettings;
use crate::kinematics::{CoordinateMap, EulerAxis, JointDefinition, SegmentAngleSolver};
use crate::risk::{RiskEvaluator, RiskTier, RuleSet};
use crate::types::{JointAxis, Quaternion, JOINT_AXIS_COUNT};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete configuration of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Timing, bounds and output location
    #[serde(default)]
    pub run: RunSection,

    /// Sensor inventory and fusion tuning
    #[serde(default)]
    pub sensors: SensorsConfig,

    /// Solver joints and joint-axis mapping
    #[serde(default)]
    pub kinematics: KinematicsConfig,

    /// Severe and moderate rule tiers
    #[serde(default)]
    pub risk: RiskConfig,
}

impl RunConfig {
    /// Load configuration using the standard search order:
    /// 1. `$KINESYNC_CONFIG` environment variable
    /// 2. `./kinesync.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// A file that fails to load is skipped with a warning.
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), sensors = config.enabled_sensors().count(), "Loaded run config from {}", defaults::CONFIG_ENV);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", defaults::CONFIG_ENV);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV);
            }
        }

        // 2. Check ./kinesync.toml
        let local = PathBuf::from(defaults::CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(sensors = config.enabled_sensors().count(), "Loaded run config from ./{}", defaults::CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", defaults::CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys are reported as warnings before deserialising; the result
    /// is validated before it is returned.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&contents)
            .map_err(|e| e.with_path(path))?;
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check the whole configuration, collecting every problem.
    ///
    /// Suspicious but usable values are logged as warnings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        // Sensors
        let enabled: Vec<&SensorConfig> = self.enabled_sensors().collect();
        if enabled.is_empty() {
            errors.push("sensors.list: at least one sensor must be enabled".to_string());
        }
        let mut names = HashSet::new();
        for sensor in &self.sensors.list {
            if sensor.name.trim().is_empty() {
                errors.push("sensors.list: sensor name must not be empty".to_string());
            } else if sensor.name.contains(['/', '\\']) || sensor.name == ".." {
                errors.push(format!(
                    "sensors.list: sensor name '{}' must not contain path separators",
                    sensor.name
                ));
            }
            if !names.insert(sensor.name.as_str()) {
                errors.push(format!("sensors.list: duplicate sensor name '{}'", sensor.name));
            }
        }
        let mut frames = HashSet::new();
        for sensor in &enabled {
            if !frames.insert(sensor.frame.as_str()) {
                errors.push(format!(
                    "sensors.list: frame '{}' is used by more than one enabled sensor",
                    sensor.frame
                ));
            }
        }

        // Risk tiers
        for (tier, cfg) in [("severe", &self.risk.severe), ("moderate", &self.risk.moderate)] {
            if cfg.duration == Some(0) {
                errors.push(format!("risk.{tier}.duration must be >= 1"));
            }
            for (axis, rule) in cfg.rules.rule_set().iter() {
                if rule.is_blank() {
                    errors.push(format!("risk.{tier}.rules.{axis} is empty"));
                } else if let Err(e) = rule.check() {
                    errors.push(format!("risk.{tier}.rules.{axis} = \"{rule}\": {e}"));
                }
            }
        }

        // Kinematics
        for (axis, text) in self.kinematics.sensor_to_model_rotation.components() {
            if let Err(e) = RotationConfig::angle(text) {
                errors.push(format!(
                    "kinematics.sensor_to_model_rotation.{axis} = \"{text}\": {e}"
                ));
            }
        }
        let mut solved = HashSet::new();
        for joint in &self.kinematics.joints {
            if !solved.insert(joint.coordinate.as_str()) {
                errors.push(format!(
                    "kinematics.joints: coordinate '{}' is defined more than once",
                    joint.coordinate
                ));
            }
            for frame in [&joint.parent, &joint.child] {
                if !frames.contains(frame.as_str()) {
                    errors.push(format!(
                        "kinematics.joints: '{}' references frame '{}' which no enabled sensor provides",
                        joint.coordinate, frame
                    ));
                }
            }
        }
        for (axis, coordinate) in self.kinematics.coordinates.map().mapped() {
            if !solved.contains(coordinate) {
                errors.push(format!(
                    "kinematics.coordinates.{axis} = '{coordinate}' is not defined in kinematics.joints"
                ));
            }
        }

        // Ranges
        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    // ------------------------------------------------------------------------
    // Derived runtime objects
    // ------------------------------------------------------------------------

    pub fn enabled_sensors(&self) -> impl Iterator<Item = &SensorConfig> {
        self.sensors.list.iter().filter(|s| s.enabled)
    }

    pub fn risk_evaluator(&self) -> RiskEvaluator {
        RiskEvaluator::new(
            self.risk.severe.tier(defaults::SEVERE_DURATION),
            self.risk.moderate.tier(defaults::MODERATE_DURATION),
        )
    }

    /// Sensor-to-model rotation from the configured angle expressions.
    pub fn sensor_to_model_rotation(&self) -> Result<Quaternion, ConfigError> {
        let r = &self.kinematics.sensor_to_model_rotation;
        let angle = |axis: &str, text: &str| {
            RotationConfig::angle(text).map_err(|e| {
                ConfigError::Validation(vec![format!(
                    "kinematics.sensor_to_model_rotation.{axis} = \"{text}\": {e}"
                )])
            })
        };
        Ok(Quaternion::from_space_xyz(
            angle("x", &r.x)?,
            angle("y", &r.y)?,
            angle("z", &r.z)?,
        ))
    }

    pub fn coordinate_map(&self) -> CoordinateMap {
        self.kinematics.coordinates.map()
    }

    pub fn segment_solver(&self) -> SegmentAngleSolver {
        SegmentAngleSolver::new(self.kinematics.joints.clone())
    }

    /// Output directory with `{timestamp}` expanded from `started`.
    pub fn output_dir(&self, started: DateTime<Local>) -> PathBuf {
        let stamp = started.format(defaults::OUTPUT_TIMESTAMP_FORMAT).to_string();
        PathBuf::from(self.run.output_dir.replace("{timestamp}", &stamp))
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        match self {
            ConfigError::Parse(_, e) => ConfigError::Parse(path.to_path_buf(), e),
            other => other,
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Run
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSection {
    /// Output directory; `{timestamp}` expands to the local start time
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Seconds between aligned frames
    #[serde(default = "default_time_step")]
    pub time_step: f64,

    /// Stop after this many frames. Unset: use the longest sensor recording,
    /// or run until every producer is exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_frames: Option<usize>,

    /// Longest wait for one cycle's samples
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: f64,

    /// Per-producer channel capacity (samples)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Frames between progress log lines (0 = off)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

fn default_output_dir() -> String { defaults::OUTPUT_DIR.to_string() }
fn default_time_step() -> f64 { defaults::TIME_STEP_SECS }
fn default_cycle_timeout_secs() -> f64 { defaults::CYCLE_TIMEOUT_SECS }
fn default_channel_capacity() -> usize { defaults::CHANNEL_CAPACITY }
fn default_progress_interval() -> usize { defaults::PROGRESS_INTERVAL }

impl Default for RunSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            time_step: default_time_step(),
            expected_frames: None,
            cycle_timeout_secs: default_cycle_timeout_secs(),
            channel_capacity: default_channel_capacity(),
            progress_interval: default_progress_interval(),
        }
    }
}

// ============================================================================
// Sensors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorsConfig {
    /// Directory holding `<name>.csv` per sensor
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Raw sample rate (Hz)
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f64,

    /// Replay files at `frequency_hz` instead of as fast as possible
    #[serde(default)]
    pub realtime: bool,

    #[serde(default = "default_sensor_list")]
    pub list: Vec<SensorConfig>,

    #[serde(default)]
    pub ahrs: AhrsSettings,
}

fn default_data_dir() -> PathBuf { PathBuf::from(defaults::SENSOR_DATA_DIR) }
fn default_frequency_hz() -> f64 { defaults::SENSOR_FREQUENCY_HZ }

fn default_sensor_list() -> Vec<SensorConfig> {
    [
        ("torso", defaults::TORSO_FRAME),
        ("clavicle_r", defaults::CLAVICLE_R_FRAME),
        ("humerus_r", defaults::HUMERUS_R_FRAME),
        ("clavicle_l", defaults::CLAVICLE_L_FRAME),
        ("humerus_l", defaults::HUMERUS_L_FRAME),
    ]
    .into_iter()
    .map(|(name, frame)| SensorConfig::new(name, frame))
    .collect()
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            frequency_hz: default_frequency_hz(),
            realtime: false,
            list: default_sensor_list(),
            ahrs: AhrsSettings::default(),
        }
    }
}

impl SensorsConfig {
    /// Fusion time step: `1 / frequency_hz` rounded to 2 decimals.
    pub fn sample_period(&self) -> f64 {
        (100.0 / self.frequency_hz).round() / 100.0
    }
}

/// One physical sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Sensor id; also the raw data file stem and output sub-directory
    pub name: String,
    /// Model frame the sensor is mounted on
    pub frame: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool { true }

impl SensorConfig {
    pub fn new(name: impl Into<String>, frame: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame: frame.into(),
            enabled: true,
        }
    }
}

// ============================================================================
// Kinematics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicsConfig {
    #[serde(default)]
    pub coordinates: CoordinatesConfig,

    #[serde(default)]
    pub sensor_to_model_rotation: RotationConfig,

    #[serde(default = "default_joints")]
    pub joints: Vec<JointDefinition>,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            coordinates: CoordinatesConfig::default(),
            sensor_to_model_rotation: RotationConfig::default(),
            joints: default_joints(),
        }
    }
}

/// Shoulder complex on both sides, measured against the torso. Left-side
/// abduction, rotation and elevation are mirrored.
fn default_joints() -> Vec<JointDefinition> {
    use defaults::{CLAVICLE_L_FRAME, CLAVICLE_R_FRAME, HUMERUS_L_FRAME, HUMERUS_R_FRAME, TORSO_FRAME};
    let [abd_r, flex_r, rot_r, elev_r, abd_l, flex_l, rot_l, elev_l] = defaults::COORDINATES;
    vec![
        JointDefinition::new(abd_r, TORSO_FRAME, HUMERUS_R_FRAME, EulerAxis::X),
        JointDefinition::new(flex_r, TORSO_FRAME, HUMERUS_R_FRAME, EulerAxis::Z),
        JointDefinition::new(rot_r, TORSO_FRAME, HUMERUS_R_FRAME, EulerAxis::Y),
        JointDefinition::new(elev_r, TORSO_FRAME, CLAVICLE_R_FRAME, EulerAxis::X),
        JointDefinition::new(abd_l, TORSO_FRAME, HUMERUS_L_FRAME, EulerAxis::X).inverted(),
        JointDefinition::new(flex_l, TORSO_FRAME, HUMERUS_L_FRAME, EulerAxis::Z),
        JointDefinition::new(rot_l, TORSO_FRAME, HUMERUS_L_FRAME, EulerAxis::Y).inverted(),
        JointDefinition::new(elev_l, TORSO_FRAME, CLAVICLE_L_FRAME, EulerAxis::X).inverted(),
    ]
}

/// Model coordinate feeding each joint-axis.
///
/// When the section is present, axes left out are not mapped and read 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_abduction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_flexion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_rotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_elevation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_abduction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_flexion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_rotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_elevation: Option<String>,
}

impl Default for CoordinatesConfig {
    fn default() -> Self {
        let [ra, rf, rr, re, la, lf, lr, le] = defaults::COORDINATES.map(|c| Some(c.to_string()));
        Self {
            right_abduction: ra,
            right_flexion: rf,
            right_rotation: rr,
            right_elevation: re,
            left_abduction: la,
            left_flexion: lf,
            left_rotation: lr,
            left_elevation: le,
        }
    }
}

impl CoordinatesConfig {
    fn slots(&self) -> [&Option<String>; JOINT_AXIS_COUNT] {
        [
            &self.right_abduction,
            &self.right_flexion,
            &self.right_rotation,
            &self.right_elevation,
            &self.left_abduction,
            &self.left_flexion,
            &self.left_rotation,
            &self.left_elevation,
        ]
    }

    pub fn map(&self) -> CoordinateMap {
        JointAxis::ALL
            .into_iter()
            .zip(self.slots())
            .filter_map(|(axis, c)| c.as_deref().map(|c| (axis, c)))
            .fold(CoordinateMap::new(), |map, (axis, c)| map.with(axis, c))
    }
}

/// Space-fixed X, Y, Z angles (radians) rotating sensor readings into the
/// model frame. Each angle is an expression, e.g. `"-pi/2"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "default_angle")]
    pub x: String,
    #[serde(default = "default_angle")]
    pub y: String,
    #[serde(default = "default_angle")]
    pub z: String,
}

fn default_angle() -> String { "0".to_string() }

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            x: default_angle(),
            y: default_angle(),
            z: default_angle(),
        }
    }
}

impl RotationConfig {
    fn components(&self) -> [(&'static str, &str); 3] {
        [("x", &self.x), ("y", &self.y), ("z", &self.z)]
    }

    /// Evaluate one angle expression to a finite number.
    pub fn angle(text: &str) -> Result<f64, String> {
        let value = expr::evaluate(text).map_err(|e| e.to_string())?.as_number();
        if value.is_finite() {
            Ok(value)
        } else {
            Err(format!("angle evaluates to {value}"))
        }
    }
}

// ============================================================================
// Risk
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_severe")]
    pub severe: RiskTierConfig,
    #[serde(default = "default_moderate")]
    pub moderate: RiskTierConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            severe: default_severe(),
            moderate: default_moderate(),
        }
    }
}

fn default_severe() -> RiskTierConfig {
    RiskTierConfig {
        duration: Some(defaults::SEVERE_DURATION),
        rules: RulesConfig::from_parts(
            "@value > 90",
            "@value > 90",
            "fabs(@value) > 60",
            "@value > 30",
        ),
    }
}

fn default_moderate() -> RiskTierConfig {
    RiskTierConfig {
        duration: Some(defaults::MODERATE_DURATION),
        rules: RulesConfig::from_parts(
            "45 < @value <= 90",
            "45 < @value <= 90",
            "30 < fabs(@value) <= 60",
            "15 < @value <= 30",
        ),
    }
}

/// One tier: how long a flag must persist, and the rule per joint-axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTierConfig {
    /// Unset: 4 for severe, 8 for moderate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<usize>,
    pub rules: RulesConfig,
}

impl RiskTierConfig {
    fn tier(&self, default_duration: usize) -> RiskTier {
        RiskTier::new(self.rules.rule_set(), self.duration.unwrap_or(default_duration))
    }
}

/// Rule text per joint-axis. Every axis needs a rule; use `"False"` to never
/// flag one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    pub right_abduction: RuleExpression,
    pub right_flexion: RuleExpression,
    pub right_rotation: RuleExpression,
    pub right_elevation: RuleExpression,
    pub left_abduction: RuleExpression,
    pub left_flexion: RuleExpression,
    pub left_rotation: RuleExpression,
    pub left_elevation: RuleExpression,
}

impl RulesConfig {
    /// Same rule on both sides for abduction, flexion, rotation, elevation.
    fn from_parts(abduction: &str, flexion: &str, rotation: &str, elevation: &str) -> Self {
        Self {
            right_abduction: abduction.into(),
            right_flexion: flexion.into(),
            right_rotation: rotation.into(),
            right_elevation: elevation.into(),
            left_abduction: abduction.into(),
            left_flexion: flexion.into(),
            left_rotation: rotation.into(),
            left_elevation: elevation.into(),
        }
    }

    pub fn rule_set(&self) -> RuleSet {
        RuleSet::new([
            self.right_abduction.clone(),
            self.right_flexion.clone(),
            self.right_rotation.clone(),
            self.right_elevation.clone(),
            self.left_abduction.clone(),
            self.left_flexion.clone(),
            self.left_rotation.clone(),
            self.left_elevation.clone(),
        ])
    }
}

// ============================================================================
// Tests
// ============================================================================
