//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Run
// ============================================================================

/// Output directory template. `{timestamp}` expands to local start time.
pub const OUTPUT_DIR: &str = "./data/runs/{timestamp}";

/// strftime pattern substituted for `{timestamp}` in the output directory.
pub const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Seconds between aligned frames.
pub const TIME_STEP_SECS: f64 = 0.5;

/// Decimal places kept on frame timestamps.
pub const TIMESTAMP_DECIMALS: i32 = 2;

/// Longest wait for one cycle's samples before the run is declared stalled.
pub const CYCLE_TIMEOUT_SECS: f64 = 10.0;

/// Capacity of each producer → coordinator channel (samples).
pub const CHANNEL_CAPACITY: usize = 64;

/// Frames between progress log lines.
pub const PROGRESS_INTERVAL: usize = 50;

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "kinesync.toml";

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "KINESYNC_CONFIG";

// ============================================================================
// Sensors
// ============================================================================

/// Directory holding one `<sensor>.csv` per sensor.
pub const SENSOR_DATA_DIR: &str = "./data/sensors";

/// Raw sample rate (Hz).
pub const SENSOR_FREQUENCY_HZ: f64 = 2.0;

// ============================================================================
// AHRS
// ============================================================================

pub const AHRS_GAIN: f64 = 0.5;

/// Degrees.
pub const AHRS_ACCELERATION_REJECTION: f64 = 10.0;

/// Degrees.
pub const AHRS_MAGNETIC_REJECTION: f64 = 20.0;

/// Samples.
pub const AHRS_REJECTION_TIMEOUT: u32 = 500;

// ============================================================================
// Risk
// ============================================================================

/// Consecutive severe evaluations before a flag is sustained.
pub const SEVERE_DURATION: usize = 4;

/// Consecutive moderate evaluations before a flag is sustained.
pub const MODERATE_DURATION: usize = 8;

// ============================================================================
// Kinematics
// ============================================================================

/// Default model coordinate per joint-axis, in `JointAxis::ALL` order.
pub const COORDINATES: [&str; 8] = [
    "shoulder_abduction_r",
    "shoulder_flexion_r",
    "shoulder_rotation_r",
    "clav_elev_r",
    "shoulder_abduction_l",
    "shoulder_flexion_l",
    "shoulder_rotation_l",
    "clav_elev_l",
];

pub const TORSO_FRAME: &str = "torso_imu";
pub const CLAVICLE_R_FRAME: &str = "clavicle_r_imu";
pub const HUMERUS_R_FRAME: &str = "humerus_r_imu";
pub const CLAVICLE_L_FRAME: &str = "clavicle_l_imu";
pub const HUMERUS_L_FRAME: &str = "humerus_l_imu";
