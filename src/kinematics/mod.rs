//! Kinematics: orientation snapshots to joint angles
//!
//! A [`KinematicsSolver`] turns one [`OrientationSnapshot`] (already rotated
//! into the model frame) into named model coordinates in degrees. A
//! [`CoordinateMap`] then picks the coordinates that feed each tracked
//! joint-axis of a [`KinematicFrame`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{JointAxis, KinematicFrame, OrientationSnapshot, JOINT_AXIS_COUNT};

// ============================================================================
// Solver interface
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KinematicsError {
    #[error("snapshot has no orientation for frame '{frame}' (needed by {coordinate})")]
    MissingFrame { frame: String, coordinate: String },

    #[error("solver produced no value for coordinate '{coordinate}' (mapped to {axis})")]
    UnknownCoordinate { axis: JointAxis, coordinate: String },

    #[error("coordinate '{coordinate}' is not finite")]
    NonFinite { coordinate: String },
}

/// Model coordinate values (degrees) keyed by coordinate name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinateValues(BTreeMap<String, f64>);

impl CoordinateValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, coordinate: impl Into<String>, degrees: f64) {
        self.0.insert(coordinate.into(), degrees);
    }

    pub fn get(&self, coordinate: &str) -> Option<f64> {
        self.0.get(coordinate).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for CoordinateValues {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Solves joint coordinates from body-segment orientations.
///
/// Called once per coordinator cycle, in timestamp order. Implementations may
/// keep state between calls.
pub trait KinematicsSolver: Send {
    fn solve(
        &mut self,
        timestamp: f64,
        snapshot: &OrientationSnapshot,
    ) -> Result<CoordinateValues, KinematicsError>;

    /// Model frames the solver reads from each snapshot.
    fn required_frames(&self) -> Vec<String>;

    /// Solver name for logging
    fn name(&self) -> &'static str;
}

// ============================================================================
// Segment-angle solver
// ============================================================================

/// Euler component of a relative rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EulerAxis {
    X,
    Y,
    Z,
}

impl EulerAxis {
    fn index(self) -> usize {
        match self {
            EulerAxis::X => 0,
            EulerAxis::Y => 1,
            EulerAxis::Z => 2,
        }
    }
}

/// One model coordinate measured between two segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDefinition {
    pub coordinate: String,
    pub parent: String,
    pub child: String,
    pub axis: EulerAxis,
    #[serde(default)]
    pub invert: bool,
}

impl JointDefinition {
    pub fn new(
        coordinate: impl Into<String>,
        parent: impl Into<String>,
        child: impl Into<String>,
        axis: EulerAxis,
    ) -> Self {
        Self {
            coordinate: coordinate.into(),
            parent: parent.into(),
            child: child.into(),
            axis,
            invert: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = !self.invert;
        self
    }
}

/// Coordinates from the body-fixed XYZ Euler decomposition of
/// `conj(parent) * child`.
///
/// Angles are unwrapped against the previous solution so a coordinate moving
/// through ±180° stays continuous.
#[derive(Debug, Clone)]
pub struct SegmentAngleSolver {
    joints: Vec<JointDefinition>,
    previous: BTreeMap<String, f64>,
}

impl SegmentAngleSolver {
    pub fn new(joints: Vec<JointDefinition>) -> Self {
        Self {
            joints,
            previous: BTreeMap::new(),
        }
    }

    pub fn joints(&self) -> &[JointDefinition] {
        &self.joints
    }
}

fn unwrap_degrees(angle: f64, previous: Option<f64>) -> f64 {
    let Some(prev) = previous else {
        return angle;
    };
    let mut angle = angle;
    while angle - prev > 180.0 {
        angle -= 360.0;
    }
    while angle - prev < -180.0 {
        angle += 360.0;
    }
    angle
}

impl KinematicsSolver for SegmentAngleSolver {
    fn solve(
        &mut self,
        _timestamp: f64,
        snapshot: &OrientationSnapshot,
    ) -> Result<CoordinateValues, KinematicsError> {
        let mut values = CoordinateValues::new();
        for joint in &self.joints {
            let lookup = |frame: &str| {
                snapshot
                    .get(frame)
                    .copied()
                    .ok_or_else(|| KinematicsError::MissingFrame {
                        frame: frame.to_string(),
                        coordinate: joint.coordinate.clone(),
                    })
            };
            let parent = lookup(&joint.parent)?;
            let child = lookup(&joint.child)?;

            let relative = parent.conjugate() * child;
            let mut degrees = relative.to_euler_xyz()[joint.axis.index()].to_degrees();
            if joint.invert {
                degrees = -degrees;
            }
            if !degrees.is_finite() {
                return Err(KinematicsError::NonFinite {
                    coordinate: joint.coordinate.clone(),
                });
            }

            let degrees = unwrap_degrees(degrees, self.previous.get(&joint.coordinate).copied());
            self.previous.insert(joint.coordinate.clone(), degrees);
            values.insert(joint.coordinate.clone(), degrees);
        }
        Ok(values)
    }

    fn required_frames(&self) -> Vec<String> {
        let mut frames: Vec<String> = self
            .joints
            .iter()
            .flat_map(|j| [j.parent.clone(), j.child.clone()])
            .collect();
        frames.sort();
        frames.dedup();
        frames
    }

    fn name(&self) -> &'static str {
        "segment-angle"
    }
}

// ============================================================================
// Coordinate map
// ============================================================================

/// Which model coordinate feeds each joint-axis. Unmapped axes read 0.0.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoordinateMap {
    coordinates: [Option<String>; JOINT_AXIS_COUNT],
}

impl CoordinateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, axis: JointAxis, coordinate: impl Into<String>) -> Self {
        self.coordinates[axis.index()] = Some(coordinate.into());
        self
    }

    pub fn get(&self, axis: JointAxis) -> Option<&str> {
        self.coordinates[axis.index()].as_deref()
    }

    pub fn mapped(&self) -> impl Iterator<Item = (JointAxis, &str)> {
        JointAxis::ALL
            .into_iter()
            .filter_map(|axis| self.get(axis).map(|c| (axis, c)))
    }

    /// Build a frame from solver output.
    pub fn frame_from(
        &self,
        timestamp: f64,
        values: &CoordinateValues,
    ) -> Result<KinematicFrame, KinematicsError> {
        let mut frame = KinematicFrame::zeroed(timestamp);
        for (axis, coordinate) in self.mapped() {
            let value = values
                .get(coordinate)
                .ok_or_else(|| KinematicsError::UnknownCoordinate {
                    axis,
                    coordinate: coordinate.to_string(),
                })?;
            frame = frame.with(axis, value);
        }
        Ok(frame)
    }
}
