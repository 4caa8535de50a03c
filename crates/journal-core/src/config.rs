//! Journal configuration.
//!
//! Parsing configuration files/environment is an external collaborator
//!; this struct is what the hosting framework hands the
//! controller after it has done that parsing.

/// Configuration accepted by the journal controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JournalConfig {
    /// Partition width in events. Changing it on an existing dataset is
    /// unsupported.
    pub target_partition_size: i64,
    /// Batch chunking threshold for `write_atomic_batches`.
    pub max_message_batch_size: usize,
    /// Queue bound per PID for deletes.
    pub max_concurrent_deletes: usize,
    /// If false, `delete_to` fails with *unsupported*.
    pub support_deletes: bool,
    /// Selects the delete mode: per-row compatibility batches vs. a single
    /// partition-range delete.
    pub cassandra_2x_compat: bool,
    /// Gates the tag-write dispatch and the pre-snapshot tag writes
    /// path.
    pub events_by_tag_enabled: bool,
    /// Execution profile name used for writes.
    pub write_profile: String,
    /// Execution profile name used for reads.
    pub read_profile: String,
    /// Whether a fatal controller error triggers coordinated shutdown
    ///.
    pub coordinated_shutdown_on_error: bool,
}

/// `JournalConfig` failed validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `target_partition_size` must be positive: it is used as a divisor
    /// when mapping sequence numbers to partitions.
    #[error("target_partition_size must be positive, got {0}")]
    NonPositivePartitionSize(i64),
    /// `max_message_batch_size` must be positive; a batch always contains
    /// at least one event.
    #[error("max_message_batch_size must be positive, got {0}")]
    NonPositiveBatchSize(usize),
    /// `max_concurrent_deletes` of zero would make every delete fail with
    /// backpressure immediately.
    #[error("max_concurrent_deletes must be positive, got {0}")]
    NonPositiveDeleteConcurrency(usize),
}

impl JournalConfig {
    /// Validates `self`, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_partition_size <= 0 {
            return Err(ConfigError::NonPositivePartitionSize(self.target_partition_size));
        }
        if self.max_message_batch_size == 0 {
            return Err(ConfigError::NonPositiveBatchSize(self.max_message_batch_size));
        }
        if self.max_concurrent_deletes == 0 {
            return Err(ConfigError::NonPositiveDeleteConcurrency(self.max_concurrent_deletes));
        }
        Ok(())
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            target_partition_size: 500,
            max_message_batch_size: 100,
            max_concurrent_deletes: 10,
            support_deletes: true,
            cassandra_2x_compat: false,
            events_by_tag_enabled: true,
            write_profile: "journal-write-profile".to_string(),
            read_profile: "journal-read-profile".to_string(),
            coordinated_shutdown_on_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(JournalConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_partition_size() {
        let mut cfg = JournalConfig::default();
        cfg.target_partition_size = 0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NonPositivePartitionSize(0))
        );
    }

    #[test]
    fn rejects_zero_delete_concurrency() {
        let mut cfg = JournalConfig::default();
        cfg.max_concurrent_deletes = 0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NonPositiveDeleteConcurrency(0))
        );
    }
}
