//! Reductions over a sequence of risk vectors

use crate::types::{RiskVector, JOINT_AXIS_COUNT};

/// Aggregation view over a slice of risk vectors.
///
/// Every reduction stamps its result with the first vector's timestamp and
/// returns `None` for an empty slice.
#[derive(Debug, Clone, Copy)]
pub struct RiskAggregation<'a> {
    data: &'a [RiskVector],
}

impl<'a> RiskAggregation<'a> {
    pub fn new(data: &'a [RiskVector]) -> Self {
        Self { data }
    }

    /// Axis flagged only if flagged in every vector.
    pub fn logical_and(&self) -> Option<RiskVector> {
        self.data.iter().copied().reduce(|acc, v| acc & v)
    }

    /// Axis flagged if flagged in any vector.
    pub fn logical_or(&self) -> Option<RiskVector> {
        self.data.iter().copied().reduce(|acc, v| acc | v)
    }

    /// Per-axis majority vote. On a tie the first vector's value wins.
    pub fn most_common(&self) -> Option<RiskVector> {
        let first = self.data.first()?;
        let mut flags = [false; JOINT_AXIS_COUNT];
        for (i, flag) in flags.iter_mut().enumerate() {
            let set = self.data.iter().filter(|v| v.flags()[i]).count();
            let unset = self.data.len() - set;
            *flag = match set.cmp(&unset) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => first.flags()[i],
            };
        }
        Some(RiskVector::new(first.timestamp, flags))
    }
}
