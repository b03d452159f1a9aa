//! # tsvc
//!
//! Transaction admission and routing for a distributed key-value store node:
//! - Validation, authentication and namespace resolution
//! - Deadlines and digest resolution
//! - Partition reservation with proxy / return-to-sender recovery
//! - Shared or per-device transaction queues with worker threads
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Client I/O / Fabric                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Transaction
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Queue Dispatcher                            │
//! │        (inline | round-robin | device affinity)             │
//! └──────────┬──────────────────────────────┬───────────────────┘
//!            │ inline                       │ queued
//!            │                    ┌─────────▼─────────┐
//!            │                    │ Queue + Workers   │
//!            │                    └─────────┬─────────┘
//! ┌──────────▼──────────────────────────────▼───────────────────┐
//! │                 Transaction Processor                        │
//! └──────────┬──────────────────────────────┬───────────────────┘
//!            │ reserved                     │ not ours
//!            ▼                              ▼
//!   ┌─────────────────┐            ┌─────────────────┐
//!   │   Execution     │            │    Recovery     │
//!   │ (read/write/..) │            │ (proxy/return)  │
//!   └─────────────────┘            └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

#[macro_use]
mod fault;

pub mod error;
pub mod config;
pub mod clock;

pub mod digest;
pub mod namespace;
pub mod protocol;
pub mod transaction;
pub mod subsystems;
pub mod stats;
pub mod tsvc;
pub mod standalone;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{TsvcError, Result};
pub use config::{Config, NamespaceConfig};
pub use digest::Digest;
pub use transaction::{Origin, Transaction};
pub use tsvc::{Dispatch, TransactionService};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the transaction service
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
