//! Append-only streaming buffer with bulk removal from the front.

use std::collections::VecDeque;
use std::io::{self, Write};

use super::record::CsvRecord;

/// Ordered sequence of records, appended at the back and drained from the
/// front with [`flush`](StreamBuffer::flush).
///
/// Elements removed by `flush` are never re-delivered and relative order is
/// always preserved. Producers use `flush(1)` to hand exactly one freshest
/// element downstream without letting the buffer grow.
///
/// # Example
///
/// ```
/// use kinesync::StreamBuffer;
///
/// let mut buffer: StreamBuffer<u32> = (1..=5).collect();
/// assert_eq!(buffer.flush(2), vec![1, 2]);
/// assert_eq!(buffer.len(), 3);
/// assert_eq!(buffer.flush(10), vec![3, 4, 5]);
/// assert!(buffer.flush(1).is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StreamBuffer<T> {
    items: VecDeque<T>,
}

impl<T> Default for StreamBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StreamBuffer<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Most recently appended element.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Remove and return the first `n` elements (fewer if the buffer is
    /// shorter). Flushing an empty buffer returns an empty vector.
    pub fn flush(&mut self, n: usize) -> Vec<T> {
        let n = n.min(self.items.len());
        self.items.drain(..n).collect()
    }

    /// Remove and return everything.
    pub fn flush_all(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }
}

impl<T: CsvRecord> StreamBuffer<T> {
    /// Serialize the buffered records as CSV rows, optionally preceded by
    /// the record header.
    pub fn write_csv<W: Write>(&self, writer: W, header: bool) -> io::Result<()> {
        super::record::write_rows(writer, self.items.iter(), header)
    }
}

impl<T> FromIterator<T> for StreamBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> Extend<T> for StreamBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl<T> IntoIterator for StreamBuffer<T> {
    type Item = T;
    type IntoIter = std::collections::vec_deque::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
