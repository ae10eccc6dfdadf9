//! Sensor Synchronisation Pipeline
//!
//! ## Architecture
//!
//! ```text
//! SampleSource ─► SensorProducer ─► mpsc ─┐
//! SampleSource ─► SensorProducer ─► mpsc ─┼─► PipelineCoordinator ─► RecordSink
//! SampleSource ─► SensorProducer ─► mpsc ─┘     (one frame per cycle)
//! ```
//!
//! Producers start together at a shared barrier and fuse samples
//! independently. The coordinator is the only consumer: each cycle it takes
//! exactly one orientation from every channel, so frame `k` is built from
//! sample `k` of every sensor.

mod coordinator;
mod error;
mod producer;
mod state;
pub mod source;

pub use coordinator::{cycle_timestamp, CoordinatorSettings, PipelineCoordinator};
pub use error::{PipelineError, ProducerError};
pub use producer::{ProducerReport, SensorProducer};
pub use source::{
    CsvSampleSource, CsvSourceProvider, SampleEvent, SampleSource, SourceError, SourceProvider,
    VecSampleSource, VecSourceProvider,
};
pub use state::*;
