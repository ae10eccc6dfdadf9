//! Shared data structures for the sensor synchronisation pipeline
//!
//! - Producers: ImuSample (raw input), OrientationSample (fused output)
//! - Coordinator: OrientationSnapshot (one cycle, all sensors)
//! - Kinematics: KinematicFrame (joint angles per cycle)
//! - Risk: RiskVector, RiskLevel

mod frame;
mod orientation;
mod risk;

pub use frame::*;
pub use orientation::*;
pub use risk::*;
