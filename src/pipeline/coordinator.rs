//! Pipeline Coordinator - fixed-step alignment of all sensor streams
//!
//! ```text
//! INIT:      open one source per enabled sensor, spawn one producer each
//! STEPPING:  per cycle, wait for one sample from every producer, then
//!            snapshot -> rotate -> solve -> map -> assess -> buffer
//! DRAINING:  stop producers, persist every stream, write the summary
//! DONE / ABORTED
//! ```
//!
//! Cycles are never skipped or interleaved: a cycle completes only when every
//! channel has delivered exactly one sample. A channel that closes before the
//! run bound is reached aborts the run after the aligned data is persisted.

use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Barrier};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::{PipelineError, ProducerError};
use super::producer::{ProducerReport, SensorProducer};
use super::source::SourceProvider;
use super::state::{CoordinatorState, ProducerState, ProducerSummary, RunBound, RunSummary};
use crate::config::{defaults, ConfigError, RunConfig, SensorConfig};
use crate::fusion::{ahrs_factory, FilterFactory};
use crate::kinematics::{CoordinateMap, KinematicsSolver};
use crate::risk::{RiskAssessment, RiskEvaluator};
use crate::storage::{RecordSink, StreamBuffer};
use crate::types::{
    JointAxis, KinematicFrame, OrientationSample, OrientationSnapshot, Quaternion, RiskLevel,
    RiskVector, JOINT_AXIS_COUNT,
};

/// Timing and bounds of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// Seconds between frames
    pub time_step: f64,
    /// Fusion time step handed to producers
    pub sample_period: f64,
    pub cycle_timeout: Duration,
    pub channel_capacity: usize,
    /// Frames between progress lines (0 = off)
    pub progress_interval: usize,
    /// Overrides the longest source length
    pub expected_frames: Option<usize>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            time_step: defaults::TIME_STEP_SECS,
            sample_period: defaults::TIME_STEP_SECS,
            cycle_timeout: Duration::from_secs_f64(defaults::CYCLE_TIMEOUT_SECS),
            channel_capacity: defaults::CHANNEL_CAPACITY,
            progress_interval: defaults::PROGRESS_INTERVAL,
            expected_frames: None,
        }
    }
}

/// Frame timestamp of a cycle, rounded to 2 decimals.
pub fn cycle_timestamp(cycle: usize, time_step: f64) -> f64 {
    let scale = 10f64.powi(defaults::TIMESTAMP_DECIMALS);
    (cycle as f64 * time_step * scale).round() / scale
}

/// One producer as seen from the coordinator.
struct Lane {
    sensor: String,
    frame: String,
    rx: mpsc::Receiver<OrientationSample>,
    handle: JoinHandle<ProducerReport>,
}

/// How stepping ended when it did not end normally.
enum Abort {
    /// A channel closed early; the producer's report supplies the reason
    Closed { lane: usize },
    Fatal(PipelineError),
}

/// Single consumer of all producer channels.
pub struct PipelineCoordinator {
    sensors: Vec<SensorConfig>,
    settings: CoordinatorSettings,
    provider: Arc<dyn SourceProvider>,
    filters: FilterFactory,
    solver: Box<dyn KinematicsSolver>,
    coordinates: CoordinateMap,
    rotation: Quaternion,
    evaluator: RiskEvaluator,
    sink: Arc<dyn RecordSink>,
    cancel: CancellationToken,
    state: CoordinatorState,

    /// One quaternion stream per sensor, in `sensors` order
    quaternions: Vec<StreamBuffer<OrientationSample>>,
    frames: StreamBuffer<KinematicFrame>,
    severe: StreamBuffer<RiskVector>,
    moderate: StreamBuffer<RiskVector>,
    sustained_severe: RiskVector,
    sustained_moderate: RiskVector,
    sustained_severe_frames: [usize; JOINT_AXIS_COUNT],
    sustained_moderate_frames: [usize; JOINT_AXIS_COUNT],
}

impl PipelineCoordinator {
    /// Build a coordinator from configuration with the default AHRS filter
    /// and segment-angle solver.
    pub fn from_config(
        config: &RunConfig,
        provider: Arc<dyn SourceProvider>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self, PipelineError> {
        let settings = CoordinatorSettings {
            time_step: config.run.time_step,
            sample_period: config.sensors.sample_period(),
            cycle_timeout: Duration::try_from_secs_f64(config.run.cycle_timeout_secs).map_err(
                |e| {
                    ConfigError::Validation(vec![format!(
                        "run.cycle_timeout_secs = {}: {e}",
                        config.run.cycle_timeout_secs
                    )])
                },
            )?,
            channel_capacity: config.run.channel_capacity.max(1),
            progress_interval: config.run.progress_interval,
            expected_frames: config.run.expected_frames,
        };

        let coordinator = Self::new(
            config.enabled_sensors().cloned().collect(),
            settings,
            provider,
            sink,
            Box::new(config.segment_solver()),
            config.risk_evaluator(),
        )
        .with_filters(ahrs_factory(config.sensors.ahrs, config.sensors.frequency_hz))
        .with_coordinates(config.coordinate_map())
        .with_rotation(config.sensor_to_model_rotation()?);
        Ok(coordinator)
    }

    /// Build a coordinator from parts. Defaults: AHRS filter at
    /// `1 / sample_period` Hz, no coordinates mapped, identity rotation.
    pub fn new(
        sensors: Vec<SensorConfig>,
        settings: CoordinatorSettings,
        provider: Arc<dyn SourceProvider>,
        sink: Arc<dyn RecordSink>,
        solver: Box<dyn KinematicsSolver>,
        evaluator: RiskEvaluator,
    ) -> Self {
        let sample_rate = if settings.sample_period > 0.0 {
            1.0 / settings.sample_period
        } else {
            defaults::SENSOR_FREQUENCY_HZ
        };
        let quaternions = sensors.iter().map(|_| StreamBuffer::new()).collect();
        Self {
            sensors,
            settings,
            provider,
            filters: ahrs_factory(Default::default(), sample_rate),
            solver,
            coordinates: CoordinateMap::new(),
            rotation: Quaternion::IDENTITY,
            evaluator,
            sink,
            cancel: CancellationToken::new(),
            state: CoordinatorState::Init,
            quaternions,
            frames: StreamBuffer::new(),
            severe: StreamBuffer::new(),
            moderate: StreamBuffer::new(),
            sustained_severe: RiskVector::default(),
            sustained_moderate: RiskVector::default(),
            sustained_severe_frames: [0; JOINT_AXIS_COUNT],
            sustained_moderate_frames: [0; JOINT_AXIS_COUNT],
        }
    }

    pub fn with_filters(mut self, filters: FilterFactory) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_coordinates(mut self, coordinates: CoordinateMap) -> Self {
        self.coordinates = coordinates;
        self
    }

    pub fn with_rotation(mut self, rotation: Quaternion) -> Self {
        self.rotation = rotation;
        self
    }

    /// Cancelling this token abandons the run (aligned data is still
    /// persisted).
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn frames_collected(&self) -> usize {
        self.frames.len()
    }

    // ------------------------------------------------------------------------
    // Run
    // ------------------------------------------------------------------------

    /// Run the pipeline to completion. Can only be called once.
    pub async fn run(&mut self) -> Result<RunSummary, PipelineError> {
        if self.state != CoordinatorState::Init {
            return Err(PipelineError::AlreadyRan);
        }
        let started_at = Utc::now();
        let clock = std::time::Instant::now();

        // INIT
        let (mut lanes, bound, producer_cancel) = match self.init().await {
            Ok(init) => init,
            Err(e) => {
                self.state = CoordinatorState::Aborted;
                error!(error = %e, "Pipeline failed to start");
                return Err(e);
            }
        };
        info!(
            sensors = lanes.len(),
            bound = %bound,
            time_step = self.settings.time_step,
            "Pipeline stepping"
        );

        // STEPPING
        self.state = CoordinatorState::Stepping;
        let outcome = self.step(&mut lanes, bound).await;

        // DRAINING
        self.state = CoordinatorState::Draining;
        producer_cancel.cancel();
        let (frames_of, handles): (Vec<(String, String)>, Vec<_>) = lanes
            .into_iter()
            .map(|lane| ((lane.sensor, lane.frame), lane.handle))
            .unzip();
        let reports = join_producers(handles, &frames_of).await;

        let outcome = outcome.map_err(|abort| match abort {
            Abort::Closed { lane } => PipelineError::ProducerClosed {
                sensor: frames_of[lane].0.clone(),
                frames: self.frames.len(),
                reason: reports[lane].reason(),
            },
            Abort::Fatal(e) => e,
        });

        let mut summary = self.summary(started_at, bound, &frames_of, &reports);
        let persisted = self.persist();

        let result = match (outcome, persisted) {
            (Ok(()), Ok(())) => {
                self.state = CoordinatorState::Done;
                Ok(())
            }
            (Ok(()), Err(e)) => {
                self.state = CoordinatorState::Aborted;
                Err(PipelineError::Storage(e))
            }
            (Err(e), persisted) => {
                if let Err(storage) = persisted {
                    error!(error = %storage, "Failed to persist aligned data after abort");
                }
                self.state = CoordinatorState::Aborted;
                Err(e)
            }
        };

        summary.state = self.state;
        summary.error = result.as_ref().err().map(ToString::to_string);
        summary.duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        if let Err(e) = self.sink.store_summary(&summary) {
            warn!(error = %e, backend = self.sink.backend_name(), "Failed to store run summary");
        }

        match result {
            Ok(()) => {
                info!(frames = summary.frames, backend = self.sink.backend_name(), "Pipeline done");
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, frames = summary.frames, "Pipeline aborted");
                Err(e)
            }
        }
    }

    /// Frame count the run must reach.
    ///
    /// Without an explicit count the longest source sets the bound, so a
    /// shorter source closes early and aborts the run under its own name.
    fn resolve_bound(&self, hints: &[Option<usize>]) -> RunBound {
        if let Some(n) = self.settings.expected_frames {
            return RunBound::Frames(n);
        }
        let Some(longest) = hints.iter().flatten().copied().max() else {
            return RunBound::UntilExhausted;
        };
        for (sensor, hint) in self.sensors.iter().zip(hints) {
            if let Some(len) = hint.filter(|&len| len < longest) {
                warn!(sensor = %sensor.name, samples = len, expected = longest, "Source shorter than the longest sensor recording");
            }
        }
        RunBound::Frames(longest)
    }

    /// Open every source, then spawn the producers.
    async fn init(&mut self) -> Result<(Vec<Lane>, RunBound, CancellationToken), PipelineError> {
        if self.sensors.is_empty() {
            return Err(PipelineError::NoSensors);
        }

        let mut sources = Vec::with_capacity(self.sensors.len());
        for sensor in &self.sensors {
            let source = self
                .provider
                .open(sensor)
                .await
                .map_err(|source| PipelineError::Source {
                    sensor: sensor.name.clone(),
                    source,
                })?;
            debug!(sensor = %sensor.name, source = %source.source_name(), len = ?source.len_hint(), "Opened sample source");
            sources.push(source);
        }

        let hints: Vec<Option<usize>> = sources.iter().map(|s| s.len_hint()).collect();
        let bound = self.resolve_bound(&hints);

        let producer_cancel = self.cancel.child_token();
        let barrier = Arc::new(Barrier::new(self.sensors.len()));
        let lanes = self
            .sensors
            .iter()
            .zip(sources)
            .map(|(sensor, source)| {
                let (tx, rx) = mpsc::channel(self.settings.channel_capacity);
                let producer = SensorProducer::new(
                    sensor.name.clone(),
                    source,
                    (self.filters)(),
                    Arc::clone(&barrier),
                    tx,
                    producer_cancel.clone(),
                    self.settings.sample_period,
                );
                Lane {
                    sensor: sensor.name.clone(),
                    frame: sensor.frame.clone(),
                    rx,
                    handle: tokio::spawn(producer.run()),
                }
            })
            .collect();

        info!(sensors = %self.sensors.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", "), "Producers spawned");
        Ok((lanes, bound, producer_cancel))
    }

    /// Align cycles until the bound is reached or something fails.
    async fn step(&mut self, lanes: &mut [Lane], bound: RunBound) -> Result<(), Abort> {
        let cancel = self.cancel.clone();
        let mut cycle = 0usize;

        loop {
            if let RunBound::Frames(n) = bound {
                if self.frames.len() >= n {
                    return Ok(());
                }
            }

            let timestamp = cycle_timestamp(cycle, self.settings.time_step);
            let deadline = tokio::time::Instant::now() + self.settings.cycle_timeout;
            let receives = lanes
                .iter_mut()
                .map(|lane| tokio::time::timeout_at(deadline, lane.rx.recv()));

            let results = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(frames = self.frames.len(), "Shutdown signal received");
                    return Err(Abort::Fatal(PipelineError::Cancelled { frames: self.frames.len() }));
                }
                results = join_all(receives) => results,
            };

            let mut samples = Vec::with_capacity(results.len());
            let mut closed = Vec::new();
            let mut stalled = Vec::new();
            for (i, result) in results.into_iter().enumerate() {
                match result {
                    Ok(Some(sample)) => samples.push(sample),
                    Ok(None) => closed.push(i),
                    Err(_) => stalled.push(i),
                }
            }

            if let Some(&first) = closed.first() {
                if bound == RunBound::UntilExhausted && closed.len() == lanes.len() {
                    info!(frames = self.frames.len(), "All producers exhausted");
                    return Ok(());
                }
                return Err(Abort::Closed { lane: first });
            }
            if !stalled.is_empty() {
                return Err(Abort::Fatal(PipelineError::Stalled {
                    cycle,
                    timestamp,
                    sensors: stalled.iter().map(|&i| lanes[i].sensor.clone()).collect(),
                    timeout: self.settings.cycle_timeout,
                }));
            }

            self.process_cycle(cycle, timestamp, lanes, samples)
                .map_err(Abort::Fatal)?;
            cycle += 1;
        }
    }

    /// Turn one sample per sensor into a frame and its risk assessment.
    fn process_cycle(
        &mut self,
        cycle: usize,
        timestamp: f64,
        lanes: &[Lane],
        samples: Vec<OrientationSample>,
    ) -> Result<(), PipelineError> {
        let mut snapshot = OrientationSnapshot::new(timestamp);
        for (lane, sample) in lanes.iter().zip(&samples) {
            snapshot.insert(lane.frame.clone(), sample.quaternion());
        }
        let snapshot = snapshot.rotated(&self.rotation);

        let values = self
            .solver
            .solve(timestamp, &snapshot)
            .map_err(|source| PipelineError::Kinematics { timestamp, source })?;
        let frame = self
            .coordinates
            .frame_from(timestamp, &values)
            .map_err(|source| PipelineError::Kinematics { timestamp, source })?;
        let assessment = self
            .evaluator
            .assess(&frame)
            .map_err(|source| PipelineError::Risk { timestamp, source })?;

        self.track_sustained(&assessment);

        for (buffer, sample) in self.quaternions.iter_mut().zip(samples) {
            buffer.push(sample);
        }
        self.frames.push(frame);
        self.severe.push(assessment.severe);
        self.moderate.push(assessment.moderate);

        debug!(cycle, timestamp, level = %assessment.max_level(), "Cycle aligned");
        let collected = self.frames.len();
        if self.settings.progress_interval > 0 && collected % self.settings.progress_interval == 0 {
            info!(frames = collected, timestamp, "Frames collected");
        }
        Ok(())
    }

    /// Count sustained flags and log every change.
    fn track_sustained(&mut self, assessment: &RiskAssessment) {
        let tiers = [
            (
                RiskLevel::Severe,
                assessment.sustained_severe,
                &mut self.sustained_severe,
                &mut self.sustained_severe_frames,
            ),
            (
                RiskLevel::Moderate,
                assessment.sustained_moderate,
                &mut self.sustained_moderate,
                &mut self.sustained_moderate_frames,
            ),
        ];
        for (level, current, previous, counts) in tiers {
            for axis in JointAxis::ALL {
                let (was, is) = (previous.get(axis), current.get(axis));
                if is {
                    counts[axis.index()] += 1;
                }
                if is && !was {
                    warn!(axis = %axis, level = %level, timestamp = assessment.timestamp, "Sustained risk raised");
                } else if was && !is {
                    info!(axis = %axis, level = %level, timestamp = assessment.timestamp, "Sustained risk cleared");
                }
            }
            *previous = current;
        }
    }

    /// Hand every buffered stream to the sink.
    fn persist(&mut self) -> Result<(), crate::storage::StorageError> {
        for (sensor, buffer) in self.sensors.iter().zip(self.quaternions.iter_mut()) {
            self.sink.store_quaternions(&sensor.name, &buffer.flush_all())?;
        }
        self.sink.store_frames(&self.frames.iter().copied().collect::<Vec<_>>())?;
        self.sink.store_risk(RiskLevel::Severe, &self.severe.flush_all())?;
        self.sink.store_risk(RiskLevel::Moderate, &self.moderate.flush_all())?;
        info!(
            frames = self.frames.len(),
            sensors = self.sensors.len(),
            backend = self.sink.backend_name(),
            "Streams persisted"
        );
        Ok(())
    }

    fn summary(
        &self,
        started_at: chrono::DateTime<Utc>,
        bound: RunBound,
        lanes: &[(String, String)],
        reports: &[ProducerReport],
    ) -> RunSummary {
        let per_axis = |counts: &[usize; JOINT_AXIS_COUNT]| -> BTreeMap<String, usize> {
            JointAxis::ALL
                .into_iter()
                .map(|axis| (axis.name().to_string(), counts[axis.index()]))
                .collect()
        };
        RunSummary {
            started_at,
            duration_ms: 0,
            state: self.state,
            bound,
            frames: self.frames.len(),
            first_timestamp: self.frames.iter().next().map(|f| f.timestamp),
            last_timestamp: self.frames.latest().map(|f| f.timestamp),
            producers: lanes
                .iter()
                .zip(reports)
                .map(|((sensor, frame), report)| ProducerSummary {
                    sensor: sensor.clone(),
                    frame: frame.clone(),
                    state: report.state,
                    samples: report.samples,
                    error: report.error.as_ref().map(ToString::to_string),
                })
                .collect(),
            sustained_severe: per_axis(&self.sustained_severe_frames),
            sustained_moderate: per_axis(&self.sustained_moderate_frames),
            error: None,
        }
    }
}

/// Wait for every producer to finish. A panicked producer is reported as
/// failed.
async fn join_producers(
    handles: Vec<JoinHandle<ProducerReport>>,
    lanes: &[(String, String)],
) -> Vec<ProducerReport> {
    join_all(handles)
        .await
        .into_iter()
        .zip(lanes)
        .map(|(joined, (sensor, _))| match joined {
            Ok(report) => {
                debug!(sensor = %report.sensor, state = %report.state, samples = report.samples, "Producer joined");
                report
            }
            Err(e) => {
                error!(sensor = %sensor, error = %e, "Producer task failed");
                ProducerReport {
                    sensor: sensor.clone(),
                    state: ProducerState::Failed,
                    samples: 0,
                    error: Some(ProducerError::Task(e.to_string())),
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::{CoordinateValues, KinematicsError};
    use crate::pipeline::source::VecSourceProvider;
    use crate::risk::{RiskTier, RuleSet};
    use crate::storage::InMemorySink;
    use crate::types::ImuSample;

    /// Reports the sample timestamp of the first frame as a coordinate.
    struct ClockSolver;

    impl KinematicsSolver for ClockSolver {
        fn solve(
            &mut self,
            timestamp: f64,
            snapshot: &OrientationSnapshot,
        ) -> Result<CoordinateValues, KinematicsError> {
            if timestamp >= 2.0 && snapshot.get("fail").is_some() {
                return Err(KinematicsError::NonFinite {
                    coordinate: "clock".into(),
                });
            }
            let mut values = CoordinateValues::new();
            values.insert("clock", timestamp * 10.0);
            Ok(values)
        }

        fn required_frames(&self) -> Vec<String> {
            Vec::new()
        }

        fn name(&self) -> &'static str {
            "clock"
        }
    }

    fn samples(n: usize) -> Vec<ImuSample> {
        (0..n)
            .map(|i| ImuSample {
                timestamp: i as f64 * 0.5,
                gyroscope: [0.0; 3],
                accelerometer: [0.0, 0.0, 1.0],
                magnetometer: [1.0, 0.0, 0.0],
            })
            .collect()
    }

    fn coordinator(
        sensors: &[(&str, &str, usize)],
        sink: Arc<InMemorySink>,
    ) -> PipelineCoordinator {
        let provider = sensors
            .iter()
            .fold(VecSourceProvider::new(), |p, (name, _, n)| p.with(*name, samples(*n)));
        let evaluator = RiskEvaluator::new(
            RiskTier::new(RuleSet::uniform("False").with(JointAxis::RightAbduction, "@value >= 10"), 2),
            RiskTier::new(RuleSet::uniform("False"), 3),
        );
        PipelineCoordinator::new(
            sensors.iter().map(|(n, f, _)| SensorConfig::new(*n, *f)).collect(),
            CoordinatorSettings::default(),
            Arc::new(provider),
            sink,
            Box::new(ClockSolver),
            evaluator,
        )
        .with_coordinates(CoordinateMap::new().with(JointAxis::RightAbduction, "clock"))
    }

    #[test]
    fn test_cycle_timestamp_rounding() {
        assert_eq!(cycle_timestamp(0, 0.5), 0.0);
        assert_eq!(cycle_timestamp(99, 0.5), 49.5);
        assert_eq!(cycle_timestamp(3, 0.1), 0.3);
    }

    #[test]
    fn test_bound_follows_longest_source() {
        let sink = Arc::new(InMemorySink::new());
        let c = coordinator(&[("a", "fa", 0), ("b", "fb", 0), ("c", "fc", 0)], sink);
        assert_eq!(c.resolve_bound(&[Some(3), None, Some(7)]), RunBound::Frames(7));
        assert_eq!(c.resolve_bound(&[Some(7), Some(3), Some(3)]), RunBound::Frames(7));
        assert_eq!(c.resolve_bound(&[None, None, None]), RunBound::UntilExhausted);

        let mut c = c;
        c.settings.expected_frames = Some(2);
        assert_eq!(c.resolve_bound(&[Some(3), Some(9), None]), RunBound::Frames(2));
    }

    #[tokio::test]
    async fn test_run_aligns_and_persists() {
        let sink = Arc::new(InMemorySink::new());
        let mut c = coordinator(&[("a", "fa", 6), ("b", "fb", 6)], sink.clone());
        let summary = c.run().await.unwrap();

        assert_eq!(c.state(), CoordinatorState::Done);
        assert_eq!(summary.frames, 6);
        assert_eq!(summary.bound, RunBound::Frames(6));
        assert_eq!(summary.last_timestamp, Some(2.5));

        let frames = sink.frames();
        let stamps: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(stamps, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
        assert_eq!(sink.quaternions("a").len(), 6);
        assert_eq!(sink.quaternions("b").len(), 6);

        // clock >= 10 from t = 1.0; sustained after two such frames
        let severe = sink.risk(RiskLevel::Severe);
        assert_eq!(severe.len(), 6);
        assert!(!severe[1].get(JointAxis::RightAbduction));
        assert!(severe[2].get(JointAxis::RightAbduction));
        assert_eq!(summary.sustained_severe["right_abduction"], 3);
        assert_eq!(sink.summary().unwrap().state, CoordinatorState::Done);
    }

    #[tokio::test]
    async fn test_expected_frames_overrides_source_length() {
        let sink = Arc::new(InMemorySink::new());
        let mut c = coordinator(&[("a", "fa", 10), ("b", "fb", 10)], sink.clone());
        c.settings.expected_frames = Some(4);
        let summary = c.run().await.unwrap();
        assert_eq!(summary.frames, 4);
        assert!(summary
            .producers
            .iter()
            .all(|p| p.state == ProducerState::Terminated));
    }

    #[tokio::test]
    async fn test_solver_error_names_timestamp() {
        let sink = Arc::new(InMemorySink::new());
        let mut c = coordinator(&[("a", "fa", 8), ("b", "fail", 8)], sink.clone());
        let err = c.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Kinematics { timestamp, .. } if timestamp == 2.0));
        assert_eq!(c.state(), CoordinatorState::Aborted);
        assert_eq!(sink.frames().len(), 4);
        assert!(sink.summary().unwrap().error.is_some());
    }

    #[tokio::test]
    async fn test_second_run_rejected() {
        let sink = Arc::new(InMemorySink::new());
        let mut c = coordinator(&[("a", "fa", 2)], sink);
        c.run().await.unwrap();
        assert!(matches!(c.run().await, Err(PipelineError::AlreadyRan)));
    }

    #[tokio::test]
    async fn test_missing_source_fails_before_start() {
        let sink = Arc::new(InMemorySink::new());
        let provider = VecSourceProvider::new().with("a", samples(3));
        let mut c = PipelineCoordinator::new(
            vec![SensorConfig::new("a", "fa"), SensorConfig::new("ghost", "fg")],
            CoordinatorSettings::default(),
            Arc::new(provider),
            sink.clone(),
            Box::new(ClockSolver),
            RiskEvaluator::new(
                RiskTier::new(RuleSet::uniform("False"), 1),
                RiskTier::new(RuleSet::uniform("False"), 1),
            ),
        );
        let err = c.run().await.unwrap_err();
        assert_eq!(err.sensor(), Some("ghost"));
        assert!(matches!(err, PipelineError::Source { .. }));
        assert!(sink.summary().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_run_persists_collected_frames() {
        let sink = Arc::new(InMemorySink::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut c = coordinator(&[("a", "fa", 5)], sink.clone()).with_cancel_token(cancel);
        let err = c.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { frames: 0 }));
        assert_eq!(sink.summary().unwrap().state, CoordinatorState::Aborted);
    }
}
