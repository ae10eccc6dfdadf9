//! Inertial sensor fusion
//!
//! Each producer owns one [`OrientationFilter`] and feeds it every raw sample
//! in order. The default [`AhrsFilter`] removes gyroscope bias with a
//! [`GyroOffset`] stage before fusing.

mod ahrs;
mod offset;

pub use ahrs::{AhrsFilter, AhrsSettings, INITIALISATION_SECS, INITIAL_GAIN};
pub use offset::{GyroOffset, GYRO_OFFSET_CUTOFF_HZ, GYRO_OFFSET_THRESHOLD, GYRO_OFFSET_TIMEOUT_SECS};

use std::sync::Arc;

use crate::types::{ImuChannel, Quaternion, Vec3};

/// Stateful per-sensor orientation estimator.
pub trait OrientationFilter: Send {
    /// Advance by one sample.
    ///
    /// Gyroscope in deg/s, accelerometer in g, magnetometer in any consistent
    /// unit, `dt` in seconds.
    fn update(
        &mut self,
        gyroscope: Vec3,
        accelerometer: Vec3,
        magnetometer: Vec3,
        dt: f64,
    ) -> Result<Quaternion, FusionError>;

    /// Latest estimate without advancing.
    fn quaternion(&self) -> Quaternion;

    /// Forget all state.
    fn reset(&mut self);
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FusionError {
    #[error("non-finite {channel} reading")]
    NonFiniteInput { channel: ImuChannel },
    #[error("invalid time step {0}")]
    InvalidTimeStep(f64),
    #[error("orientation estimate diverged")]
    Diverged,
}

/// Builds a fresh filter for each producer.
pub type FilterFactory = Arc<dyn Fn() -> Box<dyn OrientationFilter> + Send + Sync>;

/// Factory producing [`AhrsFilter`]s with shared settings.
pub fn ahrs_factory(settings: AhrsSettings, sample_rate: f64) -> FilterFactory {
    Arc::new(move || Box::new(AhrsFilter::new(settings, sample_rate)) as Box<dyn OrientationFilter>)
}
