//! Raw sample source abstraction for sensor producers.
//!
//! Each producer reads its sensor's raw IMU samples through [`SampleSource`]:
//! CSV files (replay) or in-memory vectors (tests, synthetic runs). Sources
//! are opened by a [`SourceProvider`] before any producer starts, so a
//! missing file fails the run up front.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::SensorConfig;
use crate::types::ImuSample;

/// Events produced by a sample source.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleEvent {
    /// A raw reading.
    Sample(ImuSample),
    /// No more data.
    Eof,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot read {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} has no header row")]
    MissingHeader { path: PathBuf },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("no sample data for sensor '{0}'")]
    UnknownSensor(String),
}

/// Trait abstracting where a sensor's raw samples come from.
///
/// The producer calls [`next_sample`](SampleSource::next_sample) in a
/// `select!` with cancellation, so implementations may await freely.
#[async_trait]
pub trait SampleSource: Send + 'static {
    /// Read the next sample.
    ///
    /// Returns `SampleEvent::Eof` when no more data is available and `Err`
    /// on malformed data.
    async fn next_sample(&mut self) -> Result<SampleEvent, SourceError>;

    /// Total number of samples, when known up front.
    fn len_hint(&self) -> Option<usize>;

    /// Human-readable name for logging (e.g. "CSV", "memory").
    fn source_name(&self) -> &str;
}

/// Opens one source per enabled sensor.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn open(&self, sensor: &SensorConfig) -> Result<Box<dyn SampleSource>, SourceError>;
}

/// Sleep between samples, skipping the delay before the first one.
#[derive(Debug, Clone, Copy, Default)]
struct Pacing {
    delay: Option<Duration>,
    yielded_first: bool,
}

impl Pacing {
    async fn wait(&mut self) {
        if let (true, Some(delay)) = (self.yielded_first, self.delay) {
            tokio::time::sleep(delay).await;
        }
        self.yielded_first = true;
    }
}

// ============================================================================
// CSV Source (file replay)
// ============================================================================

/// Number of columns in a raw sample row.
pub const RAW_COLUMNS: usize = 10;

/// Replays one sensor's raw CSV file.
///
/// Expected format, one header row then one sample per row:
/// `time,gx,gy,gz,ax,ay,az,mx,my,mz`. Columns are read by position; extra
/// columns are ignored. Rows are parsed as they are consumed, so a malformed
/// row surfaces as an error from [`next_sample`](SampleSource::next_sample)
/// only when the producer reaches it.
pub struct CsvSampleSource {
    path: PathBuf,
    rows: std::vec::IntoIter<(usize, String)>,
    len: usize,
    pacing: Pacing,
}

impl CsvSampleSource {
    /// Read `path` into memory. `delay` paces replay (None = as fast as the
    /// consumer allows).
    pub fn open(path: impl Into<PathBuf>, delay: Option<Duration>) -> Result<Self, SourceError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|source| SourceError::Open {
            path: path.clone(),
            source,
        })?;

        let mut lines = contents.lines().enumerate();
        match lines.next() {
            Some((_, header)) if !header.trim().is_empty() => {}
            _ => return Err(SourceError::MissingHeader { path }),
        }

        // Skip empty lines
        let rows: Vec<(usize, String)> = lines
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| (i + 1, line.to_string()))
            .collect();

        tracing::debug!(path = %path.display(), rows = rows.len(), "Loaded raw sample file");
        Ok(Self {
            len: rows.len(),
            path,
            rows: rows.into_iter(),
            pacing: Pacing {
                delay,
                yielded_first: false,
            },
        })
    }

    /// `<data_dir>/<sensor>.csv`
    pub fn path_for(data_dir: &Path, sensor: &str) -> PathBuf {
        data_dir.join(format!("{sensor}.csv"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse one raw row.
pub fn parse_sample_row(line: &str) -> Result<ImuSample, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < RAW_COLUMNS {
        return Err(format!(
            "Expected at least {RAW_COLUMNS} fields, got {}",
            fields.len()
        ));
    }

    let mut values = [0.0; RAW_COLUMNS];
    for (i, (slot, field)) in values.iter_mut().zip(&fields).enumerate() {
        *slot = field
            .parse::<f64>()
            .map_err(|_| format!("column {} is not a number: '{field}'", i + 1))?;
    }

    Ok(ImuSample {
        timestamp: values[0],
        gyroscope: [values[1], values[2], values[3]],
        accelerometer: [values[4], values[5], values[6]],
        magnetometer: [values[7], values[8], values[9]],
    })
}

#[async_trait]
impl SampleSource for CsvSampleSource {
    async fn next_sample(&mut self) -> Result<SampleEvent, SourceError> {
        let Some((line, row)) = self.rows.next() else {
            return Ok(SampleEvent::Eof);
        };
        self.pacing.wait().await;
        parse_sample_row(&row)
            .map(SampleEvent::Sample)
            .map_err(|message| SourceError::Parse {
                path: self.path.clone(),
                line,
                message,
            })
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.len)
    }

    fn source_name(&self) -> &str {
        "CSV"
    }
}

/// Opens `<data_dir>/<sensor>.csv` for each sensor.
#[derive(Debug, Clone)]
pub struct CsvSourceProvider {
    data_dir: PathBuf,
    delay: Option<Duration>,
}

impl CsvSourceProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            delay: None,
        }
    }

    /// Pace replay at `frequency_hz`.
    pub fn realtime(mut self, frequency_hz: f64) -> Self {
        self.delay = (frequency_hz > 0.0).then(|| Duration::from_secs_f64(1.0 / frequency_hz));
        self
    }
}

#[async_trait]
impl SourceProvider for CsvSourceProvider {
    async fn open(&self, sensor: &SensorConfig) -> Result<Box<dyn SampleSource>, SourceError> {
        let path = CsvSampleSource::path_for(&self.data_dir, &sensor.name);
        let delay = self.delay;
        // File reads block; keep them off the runtime threads
        let source = tokio::task::spawn_blocking(move || CsvSampleSource::open(path, delay))
            .await
            .map_err(|e| SourceError::Open {
                path: CsvSampleSource::path_for(&self.data_dir, &sensor.name),
                source: std::io::Error::other(e),
            })??;
        Ok(Box::new(source))
    }
}

// ============================================================================
// In-memory Source
// ============================================================================

/// Serves pre-built samples. Used by tests and synthetic runs.
pub struct VecSampleSource {
    name: String,
    samples: std::vec::IntoIter<ImuSample>,
    len: usize,
}

impl VecSampleSource {
    pub fn new(name: impl Into<String>, samples: Vec<ImuSample>) -> Self {
        Self {
            name: name.into(),
            len: samples.len(),
            samples: samples.into_iter(),
        }
    }
}

#[async_trait]
impl SampleSource for VecSampleSource {
    async fn next_sample(&mut self) -> Result<SampleEvent, SourceError> {
        Ok(self
            .samples
            .next()
            .map_or(SampleEvent::Eof, SampleEvent::Sample))
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.len)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

/// Hands out in-memory sample vectors by sensor name.
#[derive(Debug, Clone, Default)]
pub struct VecSourceProvider {
    samples: std::collections::HashMap<String, Vec<ImuSample>>,
}

impl VecSourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sensor: impl Into<String>, samples: Vec<ImuSample>) -> Self {
        self.samples.insert(sensor.into(), samples);
        self
    }
}

#[async_trait]
impl SourceProvider for VecSourceProvider {
    async fn open(&self, sensor: &SensorConfig) -> Result<Box<dyn SampleSource>, SourceError> {
        let samples = self
            .samples
            .get(&sensor.name)
            .cloned()
            .ok_or_else(|| SourceError::UnknownSensor(sensor.name.clone()))?;
        Ok(Box::new(VecSampleSource::new("memory", samples)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "time,gx,gy,gz,ax,ay,az,mx,my,mz";

    fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "{HEADER}").unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_row() {
        let s = parse_sample_row("0.5, 1, 2, 3, 0, 0, 1, 20, 0, -40").unwrap();
        assert_eq!(s.timestamp, 0.5);
        assert_eq!(s.gyroscope, [1.0, 2.0, 3.0]);
        assert_eq!(s.accelerometer, [0.0, 0.0, 1.0]);
        assert_eq!(s.magnetometer, [20.0, 0.0, -40.0]);

        assert!(parse_sample_row("0.5,1,2").is_err());
        assert!(parse_sample_row("0.5,1,2,x,0,0,1,20,0,-40").is_err());
    }

    #[tokio::test]
    async fn test_csv_source_reads_rows_then_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "s.csv",
            "0.0,0,0,0,0,0,1,1,0,0\n\n0.5,0,0,0,0,0,1,1,0,0\n",
        );
        let mut source = CsvSampleSource::open(&path, None).unwrap();
        assert_eq!(source.len_hint(), Some(2));

        let mut stamps = Vec::new();
        while let SampleEvent::Sample(s) = source.next_sample().await.unwrap() {
            stamps.push(s.timestamp);
        }
        assert_eq!(stamps, vec![0.0, 0.5]);
        assert_eq!(source.next_sample().await.unwrap(), SampleEvent::Eof);
    }

    #[tokio::test]
    async fn test_csv_source_reports_bad_row_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "s.csv", "0.0,0,0,0,0,0,1,1,0,0\n0.5,oops\n");
        let mut source = CsvSampleSource::open(&path, None).unwrap();
        assert!(matches!(source.next_sample().await, Ok(SampleEvent::Sample(_))));
        match source.next_sample().await {
            Err(SourceError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_and_header() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CsvSampleSource::open(dir.path().join("nope.csv"), None),
            Err(SourceError::Open { .. })
        ));
        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(
            CsvSampleSource::open(&empty, None),
            Err(SourceError::MissingHeader { .. })
        ));
    }

    #[tokio::test]
    async fn test_provider_paths() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "torso.csv", "0.0,0,0,0,0,0,1,1,0,0\n");
        let provider = CsvSourceProvider::new(dir.path());
        let source = provider.open(&SensorConfig::new("torso", "torso_imu")).await.unwrap();
        assert_eq!(source.len_hint(), Some(1));
        assert!(provider
            .open(&SensorConfig::new("humerus_r", "humerus_r_imu"))
            .await
            .is_err());
    }
}
