//! Sustained-risk sliding window

use std::collections::VecDeque;

use super::aggregation::RiskAggregation;
use crate::types::RiskVector;

/// Debounce filter over one tier's risk history.
///
/// Once at least `duration` vectors have been pushed, the sustained vector is
/// the AND of the most recent `duration` of them, stamped with the oldest
/// one's timestamp. Before that it stays all-false.
#[derive(Debug, Clone)]
pub struct SustainedRiskWindow {
    duration: usize,
    recent: VecDeque<RiskVector>,
    seen: usize,
    sustained: RiskVector,
}

impl SustainedRiskWindow {
    /// `duration` is clamped to at least 1.
    pub fn new(duration: usize) -> Self {
        let duration = duration.max(1);
        Self {
            duration,
            recent: VecDeque::with_capacity(duration),
            seen: 0,
            sustained: RiskVector::default(),
        }
    }

    pub fn duration(&self) -> usize {
        self.duration
    }

    /// Total vectors pushed so far.
    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn is_primed(&self) -> bool {
        self.seen >= self.duration
    }

    pub fn sustained(&self) -> RiskVector {
        self.sustained
    }

    /// The vectors currently inside the window, oldest first.
    pub fn recent(&self) -> Vec<RiskVector> {
        self.recent.iter().copied().collect()
    }

    /// Record one evaluation and return the updated sustained vector.
    pub fn push(&mut self, vector: RiskVector) -> RiskVector {
        self.recent.push_back(vector);
        if self.recent.len() > self.duration {
            self.recent.pop_front();
        }
        self.seen += 1;

        if self.is_primed() {
            let window = self.recent.make_contiguous();
            if let Some(reduced) = RiskAggregation::new(window).logical_and() {
                self.sustained = reduced;
            }
        }
        self.sustained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JointAxis;

    fn abduction(ts: f64, flagged: bool) -> RiskVector {
        RiskVector::clear(ts).with(JointAxis::RightAbduction, flagged)
    }

    #[test]
    fn test_all_false_before_duration() {
        let mut window = SustainedRiskWindow::new(4);
        for i in 0..3 {
            let s = window.push(abduction(i as f64 * 0.5, true));
            assert!(!s.any(), "cycle {i} should not be sustained yet");
        }
        assert!(!window.is_primed());
    }

    #[test]
    fn test_and_of_all_at_duration() {
        let mut window = SustainedRiskWindow::new(4);
        for i in 0..4 {
            window.push(abduction(i as f64 * 0.5, true));
        }
        let s = window.sustained();
        assert!(s.get(JointAxis::RightAbduction));
        assert_eq!(s.timestamp, 0.0);
    }

    #[test]
    fn test_only_last_duration_count_after() {
        let mut window = SustainedRiskWindow::new(4);
        window.push(abduction(0.0, false));
        for i in 1..4 {
            window.push(abduction(i as f64 * 0.5, true));
        }
        // window = [F, T, T, T]
        assert!(!window.sustained().get(JointAxis::RightAbduction));

        // window = [T, T, T, T]: the leading false has slid out
        let s = window.push(abduction(2.0, true));
        assert!(s.get(JointAxis::RightAbduction));
        assert_eq!(s.timestamp, 0.5);

        // a single false breaks it again
        let s = window.push(abduction(2.5, false));
        assert!(!s.get(JointAxis::RightAbduction));
        assert_eq!(window.recent().len(), 4);
    }

    #[test]
    fn test_duration_one_tracks_latest() {
        let mut window = SustainedRiskWindow::new(0);
        assert_eq!(window.duration(), 1);
        assert!(window.push(abduction(0.0, true)).get(JointAxis::RightAbduction));
        assert!(!window.push(abduction(0.5, false)).get(JointAxis::RightAbduction));
    }
}
