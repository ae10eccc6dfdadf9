//! Risk vectors and risk levels

use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, Not};

use super::{JointAxis, JOINT_AXIS_COUNT};

/// Rule tier a risk vector was produced by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RiskLevel {
    #[default]
    None = 0,
    Moderate = 1,
    Severe = 2,
}

impl RiskLevel {
    /// Per-axis level from one severe and one moderate vector.
    pub fn classify(severe: &RiskVector, moderate: &RiskVector, axis: JointAxis) -> RiskLevel {
        if severe.get(axis) {
            RiskLevel::Severe
        } else if moderate.get(axis) {
            RiskLevel::Moderate
        } else {
            RiskLevel::None
        }
    }

    /// Storage stem for this tier's output stream.
    pub fn stream_name(self) -> &'static str {
        match self {
            RiskLevel::Severe => "severe_risk",
            RiskLevel::Moderate => "moderate_risk",
            RiskLevel::None => "no_risk",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::None => write!(f, "NONE"),
            RiskLevel::Moderate => write!(f, "MODERATE"),
            RiskLevel::Severe => write!(f, "SEVERE"),
        }
    }
}

/// One boolean flag per joint-axis, stamped with the frame time.
///
/// `&`, `|` and `!` work per axis and keep the left operand's timestamp.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct RiskVector {
    pub timestamp: f64,
    flags: [bool; JOINT_AXIS_COUNT],
}

impl RiskVector {
    pub fn new(timestamp: f64, flags: [bool; JOINT_AXIS_COUNT]) -> Self {
        Self { timestamp, flags }
    }

    /// All axes unflagged.
    pub fn clear(timestamp: f64) -> Self {
        Self::new(timestamp, [false; JOINT_AXIS_COUNT])
    }

    pub fn get(&self, axis: JointAxis) -> bool {
        self.flags[axis.index()]
    }

    pub fn with(mut self, axis: JointAxis, flagged: bool) -> Self {
        self.flags[axis.index()] = flagged;
        self
    }

    pub fn flags(&self) -> &[bool; JOINT_AXIS_COUNT] {
        &self.flags
    }

    pub fn any(&self) -> bool {
        self.flags.iter().any(|&f| f)
    }

    /// Axes currently flagged.
    pub fn flagged_axes(&self) -> Vec<JointAxis> {
        JointAxis::ALL
            .into_iter()
            .filter(|a| self.get(*a))
            .collect()
    }

    fn zip_with(self, other: RiskVector, op: impl Fn(bool, bool) -> bool) -> RiskVector {
        let mut flags = self.flags;
        for (f, o) in flags.iter_mut().zip(other.flags) {
            *f = op(*f, o);
        }
        RiskVector::new(self.timestamp, flags)
    }
}

impl BitAnd for RiskVector {
    type Output = RiskVector;

    fn bitand(self, rhs: RiskVector) -> RiskVector {
        self.zip_with(rhs, |a, b| a && b)
    }
}

impl BitOr for RiskVector {
    type Output = RiskVector;

    fn bitor(self, rhs: RiskVector) -> RiskVector {
        self.zip_with(rhs, |a, b| a || b)
    }
}

impl Not for RiskVector {
    type Output = RiskVector;

    fn not(self) -> RiskVector {
        let mut flags = self.flags;
        for f in &mut flags {
            *f = !*f;
        }
        RiskVector::new(self.timestamp, flags)
    }
}
