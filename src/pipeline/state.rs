//! Pipeline state machines and run summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Producer
// ============================================================================

/// Lifecycle of one sensor producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerState {
    /// Waiting for every producer to reach the start barrier
    WaitingAtBarrier,
    /// Fusing and sending samples
    Streaming,
    /// Source exhausted, run cancelled, or coordinator finished
    Terminated,
    /// Source or fusion error
    Failed,
}

impl std::fmt::Display for ProducerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProducerState::WaitingAtBarrier => write!(f, "WaitingAtBarrier"),
            ProducerState::Streaming => write!(f, "Streaming"),
            ProducerState::Terminated => write!(f, "Terminated"),
            ProducerState::Failed => write!(f, "Failed"),
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Lifecycle of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    /// Opening sources and spawning producers
    Init,
    /// Aligning one frame per cycle
    Stepping,
    /// Joining producers and persisting streams
    Draining,
    /// Finished normally
    Done,
    /// Finished with an error
    Aborted,
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorState::Init => write!(f, "Init"),
            CoordinatorState::Stepping => write!(f, "Stepping"),
            CoordinatorState::Draining => write!(f, "Draining"),
            CoordinatorState::Done => write!(f, "Done"),
            CoordinatorState::Aborted => write!(f, "Aborted"),
        }
    }
}

/// When a run ends normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunBound {
    /// After exactly this many frames
    Frames(usize),
    /// When every producer closes its channel in the same cycle
    UntilExhausted,
}

impl std::fmt::Display for RunBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunBound::Frames(n) => write!(f, "{n} frames"),
            RunBound::UntilExhausted => write!(f, "until exhausted"),
        }
    }
}

// ============================================================================
// Run Summary
// ============================================================================

/// Per-producer outcome as recorded in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerSummary {
    pub sensor: String,
    pub frame: String,
    pub state: ProducerState,
    /// Samples delivered to the coordinator
    pub samples: usize,
    pub error: Option<String>,
}

/// End-of-run report, also persisted as `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub state: CoordinatorState,
    pub bound: RunBound,
    /// Aligned frames collected
    pub frames: usize,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
    pub producers: Vec<ProducerSummary>,
    /// Frames with a sustained severe flag, per joint-axis
    pub sustained_severe: BTreeMap<String, usize>,
    /// Frames with a sustained moderate flag, per joint-axis
    pub sustained_moderate: BTreeMap<String, usize>,
    pub error: Option<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.state == CoordinatorState::Done
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severe: usize = self.sustained_severe.values().sum();
        let moderate: usize = self.sustained_moderate.values().sum();
        write!(
            f,
            "Run {}: {} frames from {} sensors in {} ms ({} severe, {} moderate sustained axis-frames)",
            self.state,
            self.frames,
            self.producers.len(),
            self.duration_ms,
            severe,
            moderate
        )
    }
}
