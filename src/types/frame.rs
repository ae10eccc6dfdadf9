//! Kinematic frames: one joint-angle measurement per tracked joint-axis

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The fixed set of tracked joint-axes (shoulder complex, both sides).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum JointAxis {
    RightAbduction,
    RightFlexion,
    RightRotation,
    RightElevation,
    LeftAbduction,
    LeftFlexion,
    LeftRotation,
    LeftElevation,
}

/// Number of tracked joint-axes.
pub const JOINT_AXIS_COUNT: usize = 8;

impl JointAxis {
    /// All axes in column order.
    pub const ALL: [JointAxis; JOINT_AXIS_COUNT] = [
        JointAxis::RightAbduction,
        JointAxis::RightFlexion,
        JointAxis::RightRotation,
        JointAxis::RightElevation,
        JointAxis::LeftAbduction,
        JointAxis::LeftFlexion,
        JointAxis::LeftRotation,
        JointAxis::LeftElevation,
    ];

    /// Position of this axis in value/flag arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            JointAxis::RightAbduction => "right_abduction",
            JointAxis::RightFlexion => "right_flexion",
            JointAxis::RightRotation => "right_rotation",
            JointAxis::RightElevation => "right_elevation",
            JointAxis::LeftAbduction => "left_abduction",
            JointAxis::LeftFlexion => "left_flexion",
            JointAxis::LeftRotation => "left_rotation",
            JointAxis::LeftElevation => "left_elevation",
        }
    }

    pub fn from_name(name: &str) -> Option<JointAxis> {
        JointAxis::ALL.into_iter().find(|a| a.name() == name)
    }
}

impl std::fmt::Display for JointAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// CSV header shared by frames and risk vectors.
pub const AXIS_HEADER: [&str; JOINT_AXIS_COUNT + 1] = [
    "time",
    "right_abduction",
    "right_flexion",
    "right_rotation",
    "right_elevation",
    "left_abduction",
    "left_flexion",
    "left_rotation",
    "left_elevation",
];

/// Joint angles (degrees) for one coordinator cycle.
///
/// Equality and ordering look only at `timestamp`: two frames taken at the
/// same instant are the same frame regardless of their values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KinematicFrame {
    pub timestamp: f64,
    values: [f64; JOINT_AXIS_COUNT],
}

impl KinematicFrame {
    pub fn new(timestamp: f64, values: [f64; JOINT_AXIS_COUNT]) -> Self {
        Self { timestamp, values }
    }

    /// Frame with every axis at 0.0.
    pub fn zeroed(timestamp: f64) -> Self {
        Self::new(timestamp, [0.0; JOINT_AXIS_COUNT])
    }

    pub fn get(&self, axis: JointAxis) -> f64 {
        self.values[axis.index()]
    }

    pub fn with(mut self, axis: JointAxis, value: f64) -> Self {
        self.values[axis.index()] = value;
        self
    }

    pub fn values(&self) -> &[f64; JOINT_AXIS_COUNT] {
        &self.values
    }
}

impl PartialEq for KinematicFrame {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
    }
}

impl PartialOrd for KinematicFrame {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.timestamp.partial_cmp(&other.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_indices_follow_column_order() {
        for (i, axis) in JointAxis::ALL.iter().enumerate() {
            assert_eq!(axis.index(), i);
            assert_eq!(AXIS_HEADER[i + 1], axis.name());
        }
    }

    #[test]
    fn test_axis_name_roundtrip() {
        assert_eq!(JointAxis::from_name("left_rotation"), Some(JointAxis::LeftRotation));
        assert_eq!(JointAxis::from_name("left_rotaton"), None);
    }

    #[test]
    fn test_frame_equality_ignores_values() {
        let a = KinematicFrame::zeroed(1.0).with(JointAxis::RightFlexion, 45.0);
        let b = KinematicFrame::zeroed(1.0).with(JointAxis::RightFlexion, -10.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_frame_ordering_by_timestamp() {
        let early = KinematicFrame::zeroed(0.5).with(JointAxis::LeftElevation, 90.0);
        let late = KinematicFrame::zeroed(1.0);
        assert!(early < late);
        assert!(late > early);
        assert_ne!(early, late);
    }

    #[test]
    fn test_with_sets_single_axis() {
        let f = KinematicFrame::zeroed(0.0).with(JointAxis::LeftAbduction, 12.5);
        assert_eq!(f.get(JointAxis::LeftAbduction), 12.5);
        assert_eq!(f.get(JointAxis::RightAbduction), 0.0);
    }
}
