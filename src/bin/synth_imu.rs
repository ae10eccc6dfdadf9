//! Synthetic IMU Recording Generator
//!
//! Writes one raw IMU CSV per configured sensor so the pipeline can be run
//! without hardware. Arm segments swing about their X axis in a raised-cosine
//! pattern (repeatedly raising the arm to `--amplitude` degrees and lowering
//! it); the torso stays still. Every channel gets Gaussian noise.
//!
//! # Usage
//! ```bash
//! ./synth-imu --samples 200 --amplitude 110 --seed 7
//! ./kinesync --frames 200
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use kinesync::config::{RunConfig, SensorConfig};
use kinesync::pipeline::CsvSampleSource;
use kinesync::types::{Quaternion, Vec3};

// ============================================================================
// Motion Constants
// ============================================================================

/// Gravity in the earth frame (g)
const GRAVITY: Vec3 = [0.0, 0.0, 1.0];
/// Earth magnetic field, arbitrary units with downward inclination
const MAGNETIC_FIELD: Vec3 = [0.45, 0.0, -0.89];
/// Clavicle swing relative to the humerus swing
const CLAVICLE_SCALE: f64 = 0.25;
/// Accelerometer noise (g)
const ACCEL_NOISE: f64 = 0.01;
/// Magnetometer noise
const MAG_NOISE: f64 = 0.005;

const HEADER: &str = "time,gx,gy,gz,ax,ay,az,mx,my,mz";

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "synth-imu")]
#[command(about = "Synthetic IMU recordings for KineSync testing")]
#[command(version)]
struct Args {
    /// Run configuration naming the sensors (defaults: KINESYNC_CONFIG, ./kinesync.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output directory (defaults to sensors.data_dir)
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Samples per sensor
    #[arg(short = 'n', long, default_value = "100")]
    samples: usize,

    /// Peak humerus elevation in degrees
    #[arg(short, long, default_value = "100")]
    amplitude: f64,

    /// Seconds per raise-and-lower cycle
    #[arg(short, long, default_value = "8")]
    period: f64,

    /// Gyroscope noise standard deviation (deg/s)
    #[arg(long, default_value = "0.5")]
    gyro_noise: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

// ============================================================================
// Motion Model
// ============================================================================

/// How one sensor moves.
#[derive(Debug, Clone, Copy)]
struct Motion {
    /// Peak angle in degrees (signed)
    amplitude: f64,
    period: f64,
}

impl Motion {
    fn for_sensor(sensor: &SensorConfig, amplitude: f64, period: f64) -> Self {
        let frame = sensor.frame.to_ascii_lowercase();
        let side = if frame.contains("_l") { -1.0 } else { 1.0 };
        let amplitude = if frame.contains("humerus") {
            side * amplitude
        } else if frame.contains("clavicle") {
            side * amplitude * CLAVICLE_SCALE
        } else {
            0.0
        };
        Self { amplitude, period }
    }

    /// Angle about X at time `t` (degrees)
    fn angle(&self, t: f64) -> f64 {
        let w = std::f64::consts::TAU / self.period;
        0.5 * self.amplitude * (1.0 - (w * t).cos())
    }

    /// Angular rate about X at time `t` (deg/s)
    fn rate(&self, t: f64) -> f64 {
        let w = std::f64::consts::TAU / self.period;
        0.5 * self.amplitude * w * (w * t).sin()
    }
}

struct Generator {
    rng: StdRng,
    gyro_noise: Normal<f64>,
    accel_noise: Normal<f64>,
    mag_noise: Normal<f64>,
}

impl Generator {
    fn new(seed: Option<u64>, gyro_noise: f64) -> Result<Self> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            gyro_noise: Normal::new(0.0, gyro_noise).context("Invalid gyro noise")?,
            accel_noise: Normal::new(0.0, ACCEL_NOISE).context("Invalid accel noise")?,
            mag_noise: Normal::new(0.0, MAG_NOISE).context("Invalid mag noise")?,
        })
    }

    fn noisy(&mut self, v: Vec3, noise: Normal<f64>) -> Vec3 {
        [
            v[0] + noise.sample(&mut self.rng),
            v[1] + noise.sample(&mut self.rng),
            v[2] + noise.sample(&mut self.rng),
        ]
    }

    /// One CSV row: time, gyroscope, accelerometer, magnetometer.
    fn row(&mut self, motion: &Motion, t: f64) -> String {
        let q = Quaternion::from_axis_angle([1.0, 0.0, 0.0], motion.angle(t).to_radians());
        let to_sensor = q.conjugate();

        let gyro = self.noisy([motion.rate(t), 0.0, 0.0], self.gyro_noise);
        let accel = self.noisy(to_sensor.rotate(GRAVITY), self.accel_noise);
        let mag = self.noisy(to_sensor.rotate(MAGNETIC_FIELD), self.mag_noise);

        format!(
            "{:.2},{:.4},{:.4},{:.4},{:.5},{:.5},{:.5},{:.5},{:.5},{:.5}",
            t, gyro[0], gyro[1], gyro[2], accel[0], accel[1], accel[2], mag[0], mag[1], mag[2]
        )
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    if args.period <= 0.0 || !args.period.is_finite() {
        anyhow::bail!("--period must be positive");
    }

    let config = match &args.config {
        Some(path) => RunConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RunConfig::load(),
    };
    let data_dir = args.data_dir.clone().unwrap_or_else(|| config.sensors.data_dir.clone());
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let dt = config.sensors.sample_period();
    let mut generator = Generator::new(args.seed, args.gyro_noise)?;

    tracing::info!(
        "🧪 Generating {} samples per sensor at {} Hz into {}",
        args.samples,
        config.sensors.frequency_hz,
        data_dir.display()
    );

    for sensor in config.enabled_sensors() {
        let motion = Motion::for_sensor(sensor, args.amplitude, args.period);
        let path = CsvSampleSource::path_for(&data_dir, &sensor.name);
        let file =
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "{HEADER}")?;
        for i in 0..args.samples {
            let t = (i as f64 * dt * 100.0).round() / 100.0;
            writeln!(writer, "{}", generator.row(&motion, t))?;
        }
        writer.flush()?;

        tracing::info!(
            "   {} ({}) peak {:.1}° -> {}",
            sensor.name,
            sensor.frame,
            motion.amplitude,
            path.display()
        );
    }

    Ok(())
}
