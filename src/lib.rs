//! KineSync: Concurrent IMU synchronisation and joint-risk evaluation
//!
//! Fuses raw inertial samples from several body-worn sensors into
//! orientations, aligns them into fixed-step kinematic frames, and flags
//! joint-axes whose angles stay in a risky range for too long.
//!
//! ## Architecture
//!
//! - **Pipeline**: one producer task per sensor feeding a single coordinator
//! - **Fusion**: gyroscope offset correction plus an AHRS filter per sensor
//! - **Kinematics**: segment-relative joint angles mapped onto joint-axes
//! - **Risk**: per-axis rule expressions with sustained-duration windows
//! - **Expr**: the sandboxed interpreter the rules are written in
//!
//! # Usage
//!
//! ```bash
//! # Generate synthetic sensor files, then run the pipeline on them
//! cargo run --release --bin synth-imu -- --samples 100
//! cargo run --release -- --frames 100
//! ```
//!
//! # Environment Variables
//!
//! - `KINESYNC_CONFIG`: Path to the TOML run configuration
//! - `RUST_LOG`: Logging level (default: info)

pub mod config;
pub mod expr;
pub mod fusion;
pub mod kinematics;
pub mod pipeline;
pub mod risk;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, RunConfig};

// Re-export commonly used types
pub use types::{
    ImuSample, JointAxis, KinematicFrame, OrientationSample, OrientationSnapshot, Quaternion,
    RiskLevel, RiskVector,
};

// Re-export pipeline
pub use pipeline::{PipelineCoordinator, PipelineError, RunSummary};

// Re-export risk evaluation
pub use risk::{RiskAssessment, RiskEvaluator, SustainedRiskWindow};

// Re-export storage
pub use storage::{CsvDirectorySink, InMemorySink, RecordSink, StorageError, StreamBuffer};
