//! Complementary AHRS filter
//!
//! Integrates the gyroscope and corrects drift with the accelerometer
//! (gravity) and magnetometer (heading). Feedback from either reference is
//! rejected while it disagrees with the current estimate by more than the
//! configured angle, so linear acceleration and magnetic disturbances do not
//! pull the orientation. A reference that stays rejected for
//! `rejection_timeout` samples is forced back in to recover from a bad
//! estimate.
//!
//! The earth frame is North-West-Up.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use super::offset::GyroOffset;
use super::{FusionError, OrientationFilter};
use crate::config::defaults;
use crate::types::{ImuChannel, Quaternion, Vec3};

/// Gain used at start-up, ramped down to `gain` over [`INITIALISATION_SECS`].
pub const INITIAL_GAIN: f64 = 10.0;

/// Length of the start-up ramp (seconds).
pub const INITIALISATION_SECS: f64 = 3.0;

/// Tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AhrsSettings {
    /// Weight of accelerometer/magnetometer feedback. 0 disables it.
    pub gain: f64,
    /// Max accepted gravity disagreement (degrees). 0 disables rejection.
    pub acceleration_rejection: f64,
    /// Max accepted heading disagreement (degrees). 0 disables rejection.
    pub magnetic_rejection: f64,
    /// Samples of continuous rejection before a reference is forced back in.
    pub rejection_timeout: u32,
}

impl Default for AhrsSettings {
    fn default() -> Self {
        Self {
            gain: defaults::AHRS_GAIN,
            acceleration_rejection: defaults::AHRS_ACCELERATION_REJECTION,
            magnetic_rejection: defaults::AHRS_MAGNETIC_REJECTION,
            rejection_timeout: defaults::AHRS_REJECTION_TIMEOUT,
        }
    }
}

/// Rejection bookkeeping for one reference vector.
#[derive(Debug, Clone, Default)]
struct Rejection {
    /// `(0.5 * sin(angle))²`, compared against the squared feedback norm
    threshold: f64,
    trigger: i64,
    timeout: i64,
    ignored: bool,
}

impl Rejection {
    fn new(angle_deg: f64) -> Self {
        Self {
            threshold: if angle_deg > 0.0 {
                (0.5 * angle_deg.to_radians().sin()).powi(2)
            } else {
                f64::MAX
            },
            ..Default::default()
        }
    }

    /// Decide whether this sample's feedback is used.
    fn accept(&mut self, feedback: DVec3, initialising: bool, period: i64) -> bool {
        let magnitude = feedback.length_squared();
        self.ignored = true;
        if initialising || magnitude <= self.threshold {
            self.ignored = false;
            self.trigger -= 9;
        } else {
            self.trigger += 1;
        }

        if self.trigger > self.timeout {
            self.timeout = 0;
            self.ignored = false;
        } else {
            self.timeout = period;
        }
        self.trigger = self.trigger.clamp(0, period);
        !self.ignored
    }
}

#[derive(Debug, Clone)]
pub struct AhrsFilter {
    settings: AhrsSettings,
    sample_rate: f64,
    quaternion: DQuat,
    offset: GyroOffset,
    initialising: bool,
    ramped_gain: f64,
    ramped_gain_step: f64,
    acceleration: Rejection,
    magnetic: Rejection,
}

impl AhrsFilter {
    /// `sample_rate` (Hz) drives the gyroscope offset estimator.
    pub fn new(settings: AhrsSettings, sample_rate: f64) -> Self {
        let mut filter = Self {
            settings,
            sample_rate,
            quaternion: DQuat::IDENTITY,
            offset: GyroOffset::new(sample_rate),
            initialising: true,
            ramped_gain: INITIAL_GAIN,
            ramped_gain_step: (INITIAL_GAIN - settings.gain) / INITIALISATION_SECS,
            acceleration: Rejection::new(settings.acceleration_rejection),
            magnetic: Rejection::new(settings.magnetic_rejection),
        };
        if settings.gain == 0.0 || settings.rejection_timeout == 0 {
            filter.acceleration.threshold = f64::MAX;
            filter.magnetic.threshold = f64::MAX;
        }
        filter
    }

    pub fn settings(&self) -> &AhrsSettings {
        &self.settings
    }

    pub fn is_initialising(&self) -> bool {
        self.initialising
    }

    /// Whether the last update ignored the accelerometer.
    pub fn acceleration_rejected(&self) -> bool {
        self.acceleration.ignored
    }

    /// Whether the last update ignored the magnetometer.
    pub fn magnetic_rejected(&self) -> bool {
        self.magnetic.ignored
    }

    pub fn gyroscope_offset(&self) -> DVec3 {
        self.offset.offset()
    }

    /// Gravity direction in the sensor frame, halved.
    fn half_gravity(&self) -> DVec3 {
        let q = self.quaternion;
        DVec3::new(
            q.x * q.z - q.w * q.y,
            q.y * q.z + q.w * q.x,
            q.w * q.w - 0.5 + q.z * q.z,
        )
    }

    /// West direction in the sensor frame, halved.
    fn half_magnetic(&self) -> DVec3 {
        let q = self.quaternion;
        DVec3::new(
            q.x * q.y + q.w * q.z,
            q.w * q.w - 0.5 + q.y * q.y,
            q.y * q.z - q.w * q.x,
        )
    }
}

fn check_finite(channel: ImuChannel, v: &Vec3) -> Result<(), FusionError> {
    if v.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(FusionError::NonFiniteInput { channel })
    }
}

impl OrientationFilter for AhrsFilter {
    fn update(
        &mut self,
        gyroscope: Vec3,
        accelerometer: Vec3,
        magnetometer: Vec3,
        dt: f64,
    ) -> Result<Quaternion, FusionError> {
        check_finite(ImuChannel::Gyroscope, &gyroscope)?;
        check_finite(ImuChannel::Accelerometer, &accelerometer)?;
        check_finite(ImuChannel::Magnetometer, &magnetometer)?;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(FusionError::InvalidTimeStep(dt));
        }

        let gyroscope = self.offset.update(DVec3::from_array(gyroscope));

        if self.initialising {
            self.ramped_gain -= self.ramped_gain_step * dt;
            if self.ramped_gain < self.settings.gain || self.settings.gain == 0.0 {
                self.ramped_gain = self.settings.gain;
                self.initialising = false;
                self.acceleration.timeout = 0;
                self.magnetic.timeout = 0;
            }
        }

        let period = i64::from(self.settings.rejection_timeout);
        let half_gravity = self.half_gravity();

        let mut half_accel_feedback = DVec3::ZERO;
        self.acceleration.ignored = true;
        if let Some(a) = DVec3::from_array(accelerometer).try_normalize() {
            let feedback = a.cross(half_gravity);
            if self.acceleration.accept(feedback, self.initialising, period) {
                half_accel_feedback = feedback;
            }
        }

        let mut half_mag_feedback = DVec3::ZERO;
        self.magnetic.ignored = true;
        if let Some(m) = half_gravity.cross(DVec3::from_array(magnetometer)).try_normalize() {
            let feedback = m.cross(self.half_magnetic());
            if self.magnetic.accept(feedback, self.initialising, period) {
                half_mag_feedback = feedback;
            }
        }

        let half_gyro = gyroscope * (0.5 * std::f64::consts::PI / 180.0);
        let adjusted = half_gyro + (half_accel_feedback + half_mag_feedback) * self.ramped_gain;

        // q += q * (0, adjusted) * dt
        let step = adjusted * dt;
        let q = self.quaternion;
        let next = Quaternion::from(q + q * DQuat::from_xyzw(step.x, step.y, step.z, 0.0))
            .normalized()
            .ok_or(FusionError::Diverged)?;

        self.quaternion = next.into();
        Ok(next)
    }

    fn quaternion(&self) -> Quaternion {
        self.quaternion.into()
    }

    fn reset(&mut self) {
        *self = AhrsFilter::new(self.settings, self.sample_rate);
    }
}
