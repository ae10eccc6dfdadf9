//! Row-oriented text encoding for persisted records

use std::io::{self, Write};

use crate::types::{KinematicFrame, OrientationSample, RiskVector, AXIS_HEADER};

/// A fixed-shape record that can be written as one CSV row.
pub trait CsvRecord {
    /// Column names, written once when a file is created.
    fn header() -> &'static [&'static str];

    /// Field values in header order.
    fn to_row(&self) -> Vec<String>;
}

impl CsvRecord for OrientationSample {
    fn header() -> &'static [&'static str] {
        &["time", "w", "x", "y", "z"]
    }

    fn to_row(&self) -> Vec<String> {
        [self.timestamp, self.w, self.x, self.y, self.z]
            .iter()
            .map(f64::to_string)
            .collect()
    }
}

impl CsvRecord for KinematicFrame {
    fn header() -> &'static [&'static str] {
        &AXIS_HEADER
    }

    fn to_row(&self) -> Vec<String> {
        std::iter::once(self.timestamp)
            .chain(self.values().iter().copied())
            .map(|v| v.to_string())
            .collect()
    }
}

// Flags are written as 1/0 so every column stays numeric.
impl CsvRecord for RiskVector {
    fn header() -> &'static [&'static str] {
        &AXIS_HEADER
    }

    fn to_row(&self) -> Vec<String> {
        std::iter::once(self.timestamp.to_string())
            .chain(self.flags().iter().map(|&f| u8::from(f).to_string()))
            .collect()
    }
}

/// Write `records` as CSV lines, optionally preceded by the header row.
pub fn write_rows<'a, T, W, I>(mut writer: W, records: I, header: bool) -> io::Result<()>
where
    T: CsvRecord + 'a,
    W: Write,
    I: IntoIterator<Item = &'a T>,
{
    if header {
        writeln!(writer, "{}", T::header().join(","))?;
    }
    for record in records {
        writeln!(writer, "{}", record.to_row().join(","))?;
    }
    writer.flush()
}
