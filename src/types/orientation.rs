//! Orientation types: raw IMU samples, quaternions, and multi-sensor snapshots

use glam::{DQuat, DVec3, DVec4, EulerRot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Mul;

/// Tri-axial vector `[x, y, z]` as carried by raw samples.
pub type Vec3 = [f64; 3];

/// Decimal places kept on quaternion components leaving a producer.
pub const QUATERNION_DECIMALS: i32 = 5;

// ============================================================================
// IMU Channels
// ============================================================================

/// The three tri-axial channels carried by every raw IMU sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ImuChannel {
    Gyroscope,
    Accelerometer,
    Magnetometer,
}

impl ImuChannel {
    /// All channels, in raw CSV column order.
    pub const ALL: [ImuChannel; 3] = [
        ImuChannel::Gyroscope,
        ImuChannel::Accelerometer,
        ImuChannel::Magnetometer,
    ];

    /// Single-letter label used in logs and column names.
    pub fn label(self) -> &'static str {
        match self {
            ImuChannel::Gyroscope => "G",
            ImuChannel::Accelerometer => "A",
            ImuChannel::Magnetometer => "M",
        }
    }
}

impl std::fmt::Display for ImuChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImuChannel::Gyroscope => write!(f, "gyroscope"),
            ImuChannel::Accelerometer => write!(f, "accelerometer"),
            ImuChannel::Magnetometer => write!(f, "magnetometer"),
        }
    }
}

/// One raw reading from a physical sensor.
///
/// Units follow the fusion filter's expectations: gyroscope in deg/s,
/// accelerometer in g, magnetometer in any consistent unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ImuSample {
    pub timestamp: f64,
    pub gyroscope: Vec3,
    pub accelerometer: Vec3,
    pub magnetometer: Vec3,
}

impl ImuSample {
    pub fn channel(&self, channel: ImuChannel) -> Vec3 {
        match channel {
            ImuChannel::Gyroscope => self.gyroscope,
            ImuChannel::Accelerometer => self.accelerometer,
            ImuChannel::Magnetometer => self.magnetometer,
        }
    }
}

// ============================================================================
// Quaternion
// ============================================================================

/// Unit quaternion `w + xi + yj + zk` (Hamilton convention).
///
/// The `w, x, y, z` fields are the persisted layout; the algebra runs on
/// [`DQuat`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<DQuat> for Quaternion {
    fn from(q: DQuat) -> Self {
        Self::new(q.w, q.x, q.y, q.z)
    }
}

impl From<Quaternion> for DQuat {
    fn from(q: Quaternion) -> Self {
        DQuat::from_xyzw(q.x, q.y, q.z, q.w)
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    /// Hamilton product `self * rhs`.
    fn mul(self, rhs: Quaternion) -> Quaternion {
        (DQuat::from(self) * DQuat::from(rhs)).into()
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `angle` radians about a unit `axis`.
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        DQuat::from_axis_angle(DVec3::from_array(axis), angle).into()
    }

    /// Space-fixed X, then Y, then Z rotation (radians).
    pub fn from_space_xyz(x: f64, y: f64, z: f64) -> Self {
        (DQuat::from_rotation_z(z) * DQuat::from_rotation_y(y) * DQuat::from_rotation_x(x)).into()
    }

    pub fn conjugate(&self) -> Quaternion {
        DQuat::from(*self).conjugate().into()
    }

    pub fn norm(&self) -> f64 {
        DQuat::from(*self).length()
    }

    /// Unit-length copy, or `None` when the norm is zero or not finite.
    pub fn normalized(&self) -> Option<Quaternion> {
        DVec4::from(DQuat::from(*self))
            .try_normalize()
            .map(|v| DQuat::from_vec4(v).into())
    }

    pub fn is_finite(&self) -> bool {
        DQuat::from(*self).is_finite()
    }

    /// Rotate a vector by this (unit) quaternion.
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        DQuat::from(*self).mul_vec3(DVec3::from_array(v)).to_array()
    }

    /// Body-fixed X-Y-Z Euler angles in radians, `R = Rx(a) * Ry(b) * Rz(c)`.
    pub fn to_euler_xyz(&self) -> Vec3 {
        let q = self.normalized().unwrap_or(Quaternion::IDENTITY);
        let (a, b, c) = DQuat::from(q).to_euler(EulerRot::XYZ);
        [a, b, c]
    }

    /// Round every component to `decimals` places.
    pub fn rounded(&self, decimals: i32) -> Quaternion {
        let f = 10f64.powi(decimals);
        Quaternion::new(
            (self.w * f).round() / f,
            (self.x * f).round() / f,
            (self.y * f).round() / f,
            (self.z * f).round() / f,
        )
    }
}

// ============================================================================
// Orientation Sample
// ============================================================================

/// Fused orientation of one sensor at one instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OrientationSample {
    pub timestamp: f64,
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl OrientationSample {
    pub fn new(timestamp: f64, q: Quaternion) -> Self {
        Self {
            timestamp,
            w: q.w,
            x: q.x,
            y: q.y,
            z: q.z,
        }
    }

    pub fn quaternion(&self) -> Quaternion {
        Quaternion::new(self.w, self.x, self.y, self.z)
    }
}

// ============================================================================
// Orientation Snapshot
// ============================================================================

/// All sensors' orientations for one coordinator cycle, keyed by model frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrientationSnapshot {
    pub timestamp: f64,
    orientations: BTreeMap<String, Quaternion>,
}

impl OrientationSnapshot {
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            orientations: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, frame: impl Into<String>, q: Quaternion) {
        self.orientations.insert(frame.into(), q);
    }

    pub fn get(&self, frame: &str) -> Option<&Quaternion> {
        self.orientations.get(frame)
    }

    pub fn len(&self) -> usize {
        self.orientations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orientations.is_empty()
    }

    pub fn frames(&self) -> impl Iterator<Item = &str> {
        self.orientations.keys().map(String::as_str)
    }

    /// Re-express every orientation in another reference frame (`rotation * q`).
    pub fn rotated(mut self, rotation: &Quaternion) -> Self {
        for q in self.orientations.values_mut() {
            *q = *rotation * *q;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identity_product() {
        let q = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.3);
        let p = Quaternion::IDENTITY * q;
        assert!(approx(p.w, q.w) && approx(p.z, q.z));
    }

    #[test]
    fn test_rotate_x_axis_about_z() {
        let q = Quaternion::from_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2);
        let v = q.rotate([1.0, 0.0, 0.0]);
        assert!(approx(v[0], 0.0));
        assert!(approx(v[1], 1.0));
        assert!(approx(v[2], 0.0));
    }

    #[test]
    fn test_euler_roundtrip_single_axis() {
        let q = Quaternion::from_axis_angle([1.0, 0.0, 0.0], 0.4);
        let e = q.to_euler_xyz();
        assert!(approx(e[0], 0.4));
        assert!(approx(e[1], 0.0));
        assert!(approx(e[2], 0.0));

        let q = Quaternion::from_axis_angle([0.0, 1.0, 0.0], -0.7);
        assert!(approx(q.to_euler_xyz()[1], -0.7));
    }

    #[test]
    fn test_space_xyz_matches_single_axis() {
        let q = Quaternion::from_space_xyz(0.0, 0.0, 0.25);
        let z = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.25);
        assert!(approx(q.w, z.w) && approx(q.z, z.z));
    }

    #[test]
    fn test_normalized_rejects_degenerate() {
        assert_eq!(Quaternion::new(0.0, 0.0, 0.0, 0.0).normalized(), None);
        assert_eq!(Quaternion::new(f64::INFINITY, 0.0, 0.0, 0.0).normalized(), None);
        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0).normalized();
        assert_eq!(q, Some(Quaternion::IDENTITY));
    }

    #[test]
    fn test_euler_xyz_is_body_fixed() {
        // Rx(a) * Ry(b) * Rz(c) decomposes back into (a, b, c)
        let q = Quaternion::from_axis_angle([1.0, 0.0, 0.0], 0.3)
            * Quaternion::from_axis_angle([0.0, 1.0, 0.0], -0.2)
            * Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.5);
        let e = q.to_euler_xyz();
        assert!(approx(e[0], 0.3) && approx(e[1], -0.2) && approx(e[2], 0.5), "{e:?}");
    }

    #[test]
    fn test_rounded_five_decimals() {
        let q = Quaternion::new(0.123456789, -0.987654321, 0.0, 1.0).rounded(QUATERNION_DECIMALS);
        assert!(approx(q.w, 0.12346));
        assert!(approx(q.x, -0.98765));
    }

    #[test]
    fn test_snapshot_rotation_applies_to_all_frames() {
        let mut snap = OrientationSnapshot::new(1.5);
        snap.insert("torso", Quaternion::IDENTITY);
        snap.insert("humerus_r", Quaternion::IDENTITY);
        let r = Quaternion::from_axis_angle([1.0, 0.0, 0.0], FRAC_PI_2);
        let snap = snap.rotated(&r);
        assert_eq!(snap.len(), 2);
        for frame in ["torso", "humerus_r"] {
            let q = snap.get(frame).copied().unwrap_or_default();
            assert!(approx(q.w, r.w) && approx(q.x, r.x));
        }
    }

    #[test]
    fn test_imu_channel_labels() {
        let labels: Vec<_> = ImuChannel::ALL.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["G", "A", "M"]);
    }
}
