//! Message peek
//!
//! Cheap inspection of a request's fields, used to route it before the
//! transaction processor runs.

use crate::digest::Digest;
use crate::namespace::NamespaceRegistry;
use super::{FieldType, Message};

/// Routing-relevant facts about a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peek {
    pub info1: u8,
    pub keyd: Digest,

    /// Devices backing the target namespace (0 if memory only or unknown)
    pub ns_n_devices: usize,

    /// First device queue of the target namespace (0 if unknown)
    pub ns_queue_offset: usize,
}

impl Peek {
    /// Peek at `message`. `preset` is used when the message carries neither a
    /// digest nor a key (batch sub-transactions have their digest already).
    pub fn new(message: &Message, namespaces: &NamespaceRegistry, preset: Option<Digest>) -> Self {
        let (ns_n_devices, ns_queue_offset) = message
            .field(FieldType::Namespace)
            .and_then(|nf| namespaces.get_by_name(&nf.data))
            .map(|ns| (ns.n_devices, ns.dev_q_offset))
            .unwrap_or((0, 0));

        Self {
            info1: message.info1,
            keyd: peek_digest(message, preset),
            ns_n_devices,
            ns_queue_offset,
        }
    }

    pub fn is_read(&self) -> bool {
        self.info1 & super::INFO1_READ != 0
    }
}

fn peek_digest(message: &Message, preset: Option<Digest>) -> Digest {
    if let Some(df) = message.field(FieldType::Digest) {
        return Digest::from_slice(&df.data).unwrap_or_default();
    }

    if let Some(kf) = message.field(FieldType::Key) {
        let set = message
            .field(FieldType::Set)
            .map(|sf| sf.data.as_ref())
            .unwrap_or(&[]);
        return Digest::compute(set, &kf.data);
    }

    preset.unwrap_or_default()
}

/// Whether the message targets a namespace whose data is in memory
pub fn peek_data_in_memory(message: &Message, namespaces: &NamespaceRegistry) -> bool {
    message
        .field(FieldType::Namespace)
        .and_then(|nf| namespaces.get_by_name(&nf.data))
        .map(|ns| ns.data_in_memory)
        .unwrap_or(false)
}
