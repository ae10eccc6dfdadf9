//! Pipeline errors

use std::time::Duration;

use super::source::SourceError;
use crate::config::ConfigError;
use crate::fusion::FusionError;
use crate::kinematics::KinematicsError;
use crate::risk::RiskError;
use crate::storage::StorageError;

/// Why a producer stopped early.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("fusion failed at t={timestamp}: {source}")]
    Fusion {
        timestamp: f64,
        #[source]
        source: FusionError,
    },

    #[error("producer task failed: {0}")]
    Task(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no enabled sensors")]
    NoSensors,

    #[error("cannot open source for sensor '{sensor}': {source}")]
    Source {
        sensor: String,
        #[source]
        source: SourceError,
    },

    #[error("producer '{sensor}' closed its channel after {frames} aligned frames: {reason}")]
    ProducerClosed {
        sensor: String,
        frames: usize,
        reason: String,
    },

    #[error("cycle {cycle} (t={timestamp}) stalled: no sample from {sensors:?} within {timeout:?}")]
    Stalled {
        cycle: usize,
        timestamp: f64,
        sensors: Vec<String>,
        timeout: Duration,
    },

    #[error("kinematics failed at t={timestamp}: {source}")]
    Kinematics {
        timestamp: f64,
        #[source]
        source: KinematicsError,
    },

    #[error("risk evaluation failed at t={timestamp}: {source}")]
    Risk {
        timestamp: f64,
        #[source]
        source: RiskError,
    },

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("run cancelled after {frames} frames")]
    Cancelled { frames: usize },

    #[error("coordinator has already run")]
    AlreadyRan,
}

impl PipelineError {
    /// Name of the sensor the error is about, if any.
    pub fn sensor(&self) -> Option<&str> {
        match self {
            PipelineError::Source { sensor, .. } | PipelineError::ProducerClosed { sensor, .. } => {
                Some(sensor)
            }
            _ => None,
        }
    }
}
