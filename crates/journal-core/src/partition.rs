//! Partition mapper: pure `sequence_nr <-> partition_nr` math.
//!
//! No state, no I/O. `target_partition_size` is the only configurable
//! input.

use crate::model::{PartitionNr, SequenceNr};

/// Maps sequence numbers to partitions for one `target_partition_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionMapper {
    target_partition_size: i64,
}

impl PartitionMapper {
    /// Builds a mapper for the given partition width. Widths are fixed for
    /// the lifetime of a dataset; changing it on an existing dataset is
    /// unsupported.
    pub fn new(target_partition_size: i64) -> Self {
        assert!(target_partition_size > 0, "target_partition_size must be positive");
        Self { target_partition_size }
    }

    /// `partition_nr(s) = (s - 1) / target_partition_size`.
    pub fn partition_of(&self, seq: SequenceNr) -> PartitionNr {
        (seq - 1) / self.target_partition_size
    }

    /// `min_sequence_nr(p) = p * target_partition_size + 1`.
    pub fn min_seq_of(&self, partition: PartitionNr) -> SequenceNr {
        partition * self.target_partition_size + 1
    }

    /// `target_partition_size` this mapper was built with.
    pub fn target_partition_size(&self) -> i64 {
        self.target_partition_size
    }

    /// True if the partitions spanned by `first_seq ..= last_seq` differ by
    /// at most 1. `first_seq` must be `<= last_seq`.
    pub fn spans_at_most_two_partitions(&self, first_seq: SequenceNr, last_seq: SequenceNr) -> bool {
        let lo = self.partition_of(first_seq);
        let hi = self.partition_of(last_seq);
        hi - lo <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn adjacent_sequence_numbers_can_land_in_different_partitions() {
        let m = PartitionMapper::new(5);
        assert_eq!(m.partition_of(5), 0);
        assert_eq!(m.partition_of(6), 1);
    }

    #[test]
    fn span_rule_accepts_two_partitions_rejects_three() {
        let m = PartitionMapper::new(5);
        // [4..6] spans partitions 0 and 1 - accepted.
        assert!(m.spans_at_most_two_partitions(4, 6));
        // [3..9] spans partitions 0, 1 and 2 - rejected.
        assert!(!m.spans_at_most_two_partitions(3, 9));
    }

    proptest! {
        // For all s >= 1, min_seq_of(partition_of(s)) <= s < min_seq_of(partition_of(s) + 1)
        #[test]
        fn partition_mapping_stays_within_its_bounds(
            size in 1i64..500,
            seq in 1i64..100_000,
        ) {
            let m = PartitionMapper::new(size);
            let p = m.partition_of(seq);
            prop_assert!(m.min_seq_of(p) <= seq);
            prop_assert!(seq < m.min_seq_of(p + 1));
        }

        #[test]
        fn partition_of_is_monotonic(
            size in 1i64..500,
            a in 1i64..100_000,
            b in 1i64..100_000,
        ) {
            let m = PartitionMapper::new(size);
            if a <= b {
                prop_assert!(m.partition_of(a) <= m.partition_of(b));
            }
        }
    }
}
