//! Run Configuration Module
//!
//! Per-run configuration loaded from TOML files: sensor inventory, fusion
//! tuning, kinematics mapping and risk rules.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `KINESYNC_CONFIG` environment variable (path to TOML file)
//! 3. `kinesync.toml` in the current working directory
//! 4. Built-in defaults
//!
//! The loaded [`RunConfig`] is passed explicitly to the pipeline; there is no
//! process-wide config.

mod run_config;
pub mod defaults;
pub mod validation;

pub use run_config::*;
pub use validation::ValidationWarning;
