//! Configuration for the transaction service
//!
//! Centralized configuration with sensible defaults.

use serde::{Deserialize, Serialize};

/// Hard upper bound on the number of transaction queues
pub const MAX_TRANSACTION_QUEUES: usize = 128;

/// Main configuration for the transaction service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Queue / Worker Pool Configuration
    // -------------------------------------------------------------------------
    /// Number of shared transaction queues (ignored in queue-per-device mode,
    /// where the count is derived from the namespace layout)
    pub n_transaction_queues: usize,

    /// Worker threads servicing each queue
    pub n_transaction_threads_per_queue: usize,

    /// Route transactions to per-device read/write queues instead of
    /// round-robin over shared queues
    pub use_queue_per_device: bool,

    // -------------------------------------------------------------------------
    // Transaction Configuration
    // -------------------------------------------------------------------------
    /// Deadline applied to single-record transactions that carry no TTL (nanoseconds)
    pub transaction_max_ns: u64,

    /// Process transactions for in-memory namespaces on the submitting thread
    pub allow_inline_transactions: bool,

    /// Record how long transactions wait on the queues
    pub svc_benchmarks_enabled: bool,

    // -------------------------------------------------------------------------
    // Namespace Configuration
    // -------------------------------------------------------------------------
    /// Namespaces served by this node
    pub namespaces: Vec<NamespaceConfig>,
}

/// Static description of a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Namespace name as it appears on the wire
    pub name: String,

    /// Number of storage devices backing the namespace (0 = memory only)
    pub n_devices: usize,

    /// Whether record data is held in memory
    pub data_in_memory: bool,
}

impl NamespaceConfig {
    /// A memory-only namespace
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            n_devices: 0,
            data_in_memory: true,
        }
    }

    /// A namespace whose data lives on `n_devices` devices
    pub fn on_devices(name: impl Into<String>, n_devices: usize) -> Self {
        Self {
            name: name.into(),
            n_devices,
            data_in_memory: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            n_transaction_queues: 4,
            n_transaction_threads_per_queue: 4,
            use_queue_per_device: false,
            transaction_max_ns: 1_000_000_000, // 1 second
            allow_inline_transactions: true,
            svc_benchmarks_enabled: false,
            namespaces: Vec::new(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of shared transaction queues
    pub fn n_transaction_queues(mut self, count: usize) -> Self {
        self.config.n_transaction_queues = count;
        self
    }

    /// Set the number of worker threads per queue
    pub fn n_transaction_threads_per_queue(mut self, count: usize) -> Self {
        self.config.n_transaction_threads_per_queue = count;
        self
    }

    /// Enable or disable queue-per-device routing
    pub fn use_queue_per_device(mut self, enabled: bool) -> Self {
        self.config.use_queue_per_device = enabled;
        self
    }

    /// Set the default single-record deadline (in nanoseconds)
    pub fn transaction_max_ns(mut self, ns: u64) -> Self {
        self.config.transaction_max_ns = ns;
        self
    }

    /// Allow or forbid inline execution for in-memory namespaces
    pub fn allow_inline_transactions(mut self, allowed: bool) -> Self {
        self.config.allow_inline_transactions = allowed;
        self
    }

    /// Enable or disable queue-wait benchmarks
    pub fn svc_benchmarks_enabled(mut self, enabled: bool) -> Self {
        self.config.svc_benchmarks_enabled = enabled;
        self
    }

    /// Add a namespace
    pub fn namespace(mut self, ns: NamespaceConfig) -> Self {
        self.config.namespaces.push(ns);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
