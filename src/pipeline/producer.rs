//! Sensor producer task
//!
//! One producer runs per enabled sensor. It waits at the shared start
//! barrier, then fuses every raw sample into an orientation and forwards it
//! to the coordinator over its own bounded channel. A full channel blocks
//! the producer, which keeps it at most `capacity` samples ahead.

use std::sync::Arc;
use tokio::sync::{mpsc, Barrier};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::ProducerError;
use super::source::{SampleEvent, SampleSource};
use super::state::ProducerState;
use crate::fusion::OrientationFilter;
use crate::storage::StreamBuffer;
use crate::types::{OrientationSample, QUATERNION_DECIMALS};

/// Outcome of a finished producer.
#[derive(Debug)]
pub struct ProducerReport {
    pub sensor: String,
    pub state: ProducerState,
    /// Samples delivered to the coordinator
    pub samples: usize,
    pub error: Option<ProducerError>,
}

impl ProducerReport {
    /// Why the producer stopped, for error messages.
    pub fn reason(&self) -> String {
        match (&self.error, self.state) {
            (Some(e), _) => e.to_string(),
            (None, ProducerState::Terminated) => {
                format!("source exhausted after {} samples", self.samples)
            }
            (None, state) => format!("stopped in state {state} after {} samples", self.samples),
        }
    }
}

pub struct SensorProducer {
    sensor: String,
    source: Box<dyn SampleSource>,
    filter: Box<dyn OrientationFilter>,
    barrier: Arc<Barrier>,
    tx: mpsc::Sender<OrientationSample>,
    cancel: CancellationToken,
    /// Fusion time step (seconds)
    dt: f64,
    buffer: StreamBuffer<OrientationSample>,
    state: ProducerState,
    samples: usize,
}

impl SensorProducer {
    pub fn new(
        sensor: impl Into<String>,
        source: Box<dyn SampleSource>,
        filter: Box<dyn OrientationFilter>,
        barrier: Arc<Barrier>,
        tx: mpsc::Sender<OrientationSample>,
        cancel: CancellationToken,
        dt: f64,
    ) -> Self {
        Self {
            sensor: sensor.into(),
            source,
            filter,
            barrier,
            tx,
            cancel,
            dt,
            buffer: StreamBuffer::new(),
            state: ProducerState::WaitingAtBarrier,
            samples: 0,
        }
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    /// Run until the source is exhausted, an error occurs, the coordinator
    /// drops its receiver, or the run is cancelled.
    ///
    /// The channel closes when this returns.
    pub async fn run(mut self) -> ProducerReport {
        debug!(sensor = %self.sensor, source = %self.source.source_name(), "Producer waiting at barrier");
        tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!(sensor = %self.sensor, "Cancelled before start");
                return self.finish(ProducerState::Terminated, None);
            }
            _ = self.barrier.wait() => {}
        }

        self.state = ProducerState::Streaming;
        info!(sensor = %self.sensor, "Producer streaming");

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(sensor = %self.sensor, samples = self.samples, "Producer cancelled");
                    return self.finish(ProducerState::Terminated, None);
                }
                event = self.source.next_sample() => event,
            };

            let sample = match event {
                Ok(SampleEvent::Sample(sample)) => sample,
                Ok(SampleEvent::Eof) => {
                    info!(sensor = %self.sensor, samples = self.samples, "Source exhausted");
                    return self.finish(ProducerState::Terminated, None);
                }
                Err(e) => {
                    warn!(sensor = %self.sensor, error = %e, "Source failed");
                    return self.finish(ProducerState::Failed, Some(e.into()));
                }
            };

            let q = match self.filter.update(
                sample.gyroscope,
                sample.accelerometer,
                sample.magnetometer,
                self.dt,
            ) {
                Ok(q) => q,
                Err(source) => {
                    warn!(sensor = %self.sensor, timestamp = sample.timestamp, error = %source, "Fusion failed");
                    let error = ProducerError::Fusion {
                        timestamp: sample.timestamp,
                        source,
                    };
                    return self.finish(ProducerState::Failed, Some(error));
                }
            };

            self.buffer
                .push(OrientationSample::new(sample.timestamp, q.rounded(QUATERNION_DECIMALS)));

            for out in self.buffer.flush(1) {
                let sent = tokio::select! {
                    _ = self.cancel.cancelled() => {
                        return self.finish(ProducerState::Terminated, None);
                    }
                    sent = self.tx.send(out) => sent,
                };
                if sent.is_err() {
                    debug!(sensor = %self.sensor, samples = self.samples, "Coordinator closed the channel");
                    return self.finish(ProducerState::Terminated, None);
                }
                self.samples += 1;
            }
        }
    }

    fn finish(self, state: ProducerState, error: Option<ProducerError>) -> ProducerReport {
        ProducerReport {
            sensor: self.sensor,
            state,
            samples: self.samples,
            error,
        }
    }
}
