//! Foreign key engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for foreign key checks, usually derived from session variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyConfig {
    /// Whether check engines are built at all (the `foreign_key_checks` switch)
    pub foreign_key_checks: bool,

    /// How long to wait for row locks on confirmed parent rows
    pub lock_wait_timeout: Duration,

    /// Snapshot scan batch size while resolving prefix keys (default: 2)
    /// Only the first live entry of a prefix matters, so small batches avoid
    /// reading rows that are never looked at.
    pub prefix_scan_batch_size: usize,
}

impl Default for ForeignKeyConfig {
    fn default() -> Self {
        Self {
            foreign_key_checks: true,
            lock_wait_timeout: Duration::from_secs(50),
            prefix_scan_batch_size: 2,
        }
    }
}

impl ForeignKeyConfig {
    /// Create config optimized for testing
    pub fn for_testing() -> Self {
        Self {
            lock_wait_timeout: Duration::from_millis(20), // Fail fast on conflicts
            ..Default::default()
        }
    }

    /// Enable or disable foreign key checks
    pub fn with_foreign_key_checks(mut self, enabled: bool) -> Self {
        self.foreign_key_checks = enabled;
        self
    }

    /// Set lock wait timeout
    pub fn with_lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait_timeout = timeout;
        self
    }

    /// Set the scan batch size used for prefix key resolution
    pub fn with_prefix_scan_batch_size(mut self, size: usize) -> Self {
        self.prefix_scan_batch_size = size.max(1);
        self
    }
}
