//! Gyroscope offset (bias) correction
//!
//! Tracks the gyroscope bias while the sensor is stationary and subtracts it
//! from every reading. Stationary means every axis has stayed under
//! [`GYRO_OFFSET_THRESHOLD`] deg/s for [`GYRO_OFFSET_TIMEOUT_SECS`] seconds;
//! from then on the bias follows the readings through a first-order low-pass
//! filter.

use glam::DVec3;

/// Low-pass cutoff of the bias estimate (Hz)
pub const GYRO_OFFSET_CUTOFF_HZ: f64 = 0.02;

/// Seconds of stillness before the bias estimate starts moving
pub const GYRO_OFFSET_TIMEOUT_SECS: f64 = 5.0;

/// Per-axis rate (deg/s) above which the sensor counts as moving
pub const GYRO_OFFSET_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct GyroOffset {
    filter_coefficient: f64,
    timeout: u32,
    timer: u32,
    offset: DVec3,
}

impl GyroOffset {
    /// `sample_rate` in Hz.
    pub fn new(sample_rate: f64) -> Self {
        let sample_rate = if sample_rate.is_finite() && sample_rate > 0.0 {
            sample_rate
        } else {
            1.0
        };
        Self {
            filter_coefficient: 2.0 * std::f64::consts::PI * GYRO_OFFSET_CUTOFF_HZ / sample_rate,
            timeout: (GYRO_OFFSET_TIMEOUT_SECS * sample_rate).round() as u32,
            timer: 0,
            offset: DVec3::ZERO,
        }
    }

    /// Current bias estimate (deg/s).
    pub fn offset(&self) -> DVec3 {
        self.offset
    }

    /// Return `gyroscope` with the bias removed and update the estimate.
    pub fn update(&mut self, gyroscope: DVec3) -> DVec3 {
        let corrected = gyroscope - self.offset;

        if corrected.abs().max_element() > GYRO_OFFSET_THRESHOLD {
            self.timer = 0;
            return corrected;
        }

        if self.timer < self.timeout {
            self.timer += 1;
            return corrected;
        }

        self.offset += corrected * self.filter_coefficient;
        corrected
    }
}
