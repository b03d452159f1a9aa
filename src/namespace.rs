//! Namespaces
//!
//! A namespace is a logical keyspace with its own storage layout. The registry
//! resolves wire names to shared handles and plans the device-queue layout:
//!
//! ```text
//! ns "a" (2 devices)  ns "b" (memory)  ns "c" (1 device)
//! ┌────┬────┬────┬────┬────┬────┬────┬────┐
//! │ r0 │ r1 │ w0 │ w1 │ r  │ w  │ r0 │ w0 │
//! └────┴────┴────┴────┴────┴────┴────┴────┘
//!  offset 0             offset 4  offset 6
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::NamespaceConfig;
use crate::error::{Result, TsvcError};

/// Size of the namespace name buffer, including the terminator
pub const NAMESPACE_NAME_SIZE: usize = 32;

/// A resolved namespace
#[derive(Debug)]
pub struct Namespace {
    /// Position in the configuration
    pub id: usize,

    pub name: String,

    /// Storage devices backing the namespace (0 = memory only)
    pub n_devices: usize,

    /// First device queue owned by this namespace
    pub dev_q_offset: usize,

    /// Record data is held in memory
    pub data_in_memory: bool,

    /// Queries received
    pub query_reqs: AtomicU64,

    /// Queries the query engine refused
    pub query_fail: AtomicU64,
}

impl Namespace {
    /// Number of device queues this namespace occupies
    pub fn n_queues(&self) -> usize {
        if self.n_devices > 0 {
            self.n_devices * 2
        } else {
            2
        }
    }

    pub fn query_reqs(&self) -> u64 {
        self.query_reqs.load(Ordering::Relaxed)
    }

    pub fn query_fail(&self) -> u64 {
        self.query_fail.load(Ordering::Relaxed)
    }
}

/// Lookup table of all configured namespaces
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    namespaces: Vec<Arc<Namespace>>,
    by_name: HashMap<Vec<u8>, usize>,
    device_queue_count: usize,
}

impl NamespaceRegistry {
    /// Build the registry, assigning each namespace its device-queue offset
    pub fn new(configs: &[NamespaceConfig]) -> Result<Self> {
        let mut namespaces = Vec::with_capacity(configs.len());
        let mut by_name = HashMap::with_capacity(configs.len());
        let mut n_queues = 0;

        for (id, cfg) in configs.iter().enumerate() {
            if cfg.name.is_empty() || cfg.name.len() >= NAMESPACE_NAME_SIZE {
                return Err(TsvcError::Config(format!(
                    "namespace name '{}' must be 1..{} bytes",
                    cfg.name,
                    NAMESPACE_NAME_SIZE - 1
                )));
            }
            if by_name.insert(cfg.name.as_bytes().to_vec(), id).is_some() {
                return Err(TsvcError::Config(format!(
                    "duplicate namespace '{}'",
                    cfg.name
                )));
            }

            let ns = Namespace {
                id,
                name: cfg.name.clone(),
                n_devices: cfg.n_devices,
                dev_q_offset: n_queues,
                data_in_memory: cfg.data_in_memory,
                query_reqs: AtomicU64::new(0),
                query_fail: AtomicU64::new(0),
            };
            n_queues += ns.n_queues();
            namespaces.push(Arc::new(ns));
        }

        Ok(Self {
            namespaces,
            by_name,
            device_queue_count: n_queues,
        })
    }

    /// Resolve a namespace from its raw wire name
    pub fn get_by_name(&self, name: &[u8]) -> Option<Arc<Namespace>> {
        self.by_name
            .get(name)
            .map(|&id| Arc::clone(&self.namespaces[id]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Namespace>> {
        self.namespaces.iter()
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Total queues needed for queue-per-device routing
    pub fn device_queue_count(&self) -> usize {
        self.device_queue_count
    }

    /// Namespaces whose data is held in memory
    pub fn n_in_memory(&self) -> usize {
        self.namespaces.iter().filter(|ns| ns.data_in_memory).count()
    }

    /// Namespaces whose data lives only on devices
    pub fn n_not_in_memory(&self) -> usize {
        self.len() - self.n_in_memory()
    }
}

/// Render a raw wire namespace name for diagnostics.
///
/// At most `NAMESPACE_NAME_SIZE - 1` bytes are shown; longer values are cut,
/// and an embedded NUL ends the name.
pub fn display_name(raw: &[u8]) -> String {
    let len = raw.len().min(NAMESPACE_NAME_SIZE - 1);
    let bounded = &raw[..len];
    let end = bounded.iter().position(|&b| b == 0).unwrap_or(len);
    String::from_utf8_lossy(&bounded[..end]).into_owned()
}
