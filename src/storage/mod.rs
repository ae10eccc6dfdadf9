//! Streaming buffers and run persistence
//!
//! Records accumulate in [`StreamBuffer`]s while the run is live and are
//! handed to a [`RecordSink`] when it ends.

mod buffer;
mod record;
mod sink;

pub use buffer::StreamBuffer;
pub use record::{write_rows, CsvRecord};
pub use sink::{
    CsvDirectorySink, InMemorySink, RecordSink, StorageError, FRAMES_FILE, QUATERNION_FILE,
    SUMMARY_FILE,
};
