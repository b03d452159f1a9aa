//! Request messages
//!
//! A decoded request: header scalars, the field list, and the operations as
//! opaque bytes. Only fields are interpreted by the transaction service.

use bytes::Bytes;

// =============================================================================
// Info Bits
// =============================================================================

/// info1: read the record
pub const INFO1_READ: u8 = 1 << 0;
/// info1: read all bins
pub const INFO1_GET_ALL: u8 = 1 << 1;
/// info1: batch-index request
pub const INFO1_BATCH: u8 = 1 << 3;
/// info1: operation originated from replication
pub const INFO1_XDR: u8 = 1 << 4;
/// info1: read metadata only
pub const INFO1_GET_NOBINDATA: u8 = 1 << 5;

/// info2: modify the record
pub const INFO2_WRITE: u8 = 1 << 0;
/// info2: delete the record
pub const INFO2_DELETE: u8 = 1 << 1;
/// info2: check generation before applying
pub const INFO2_GENERATION: u8 = 1 << 2;
/// info2: fail if the record exists
pub const INFO2_CREATE_ONLY: u8 = 1 << 5;

/// info3: last message of a multi-part reply
pub const INFO3_LAST: u8 = 1 << 0;

// =============================================================================
// Proto / Field Types
// =============================================================================

/// Outer protocol frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtoType {
    Info = 1,
    Security = 2,
    Message = 3,
    MessageCompressed = 4,
    InternalXdr = 5,
}

impl ProtoType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Info),
            2 => Some(Self::Security),
            3 => Some(Self::Message),
            4 => Some(Self::MessageCompressed),
            5 => Some(Self::InternalXdr),
            _ => None,
        }
    }
}

/// Message field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Namespace,
    Set,
    Key,
    Digest,
    DigestArray,
    TransactionId,
    ScanOptions,
    IndexName,
    IndexRange,
    IndexType,
    UdfFilename,
    UdfFunction,
    UdfArglist,
    UdfOp,
    QueryBinList,
    Batch,
    Other(u8),
}

impl FieldType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Namespace,
            1 => Self::Set,
            2 => Self::Key,
            4 => Self::Digest,
            6 => Self::DigestArray,
            7 => Self::TransactionId,
            8 => Self::ScanOptions,
            21 => Self::IndexName,
            22 => Self::IndexRange,
            26 => Self::IndexType,
            30 => Self::UdfFilename,
            31 => Self::UdfFunction,
            32 => Self::UdfArglist,
            33 => Self::UdfOp,
            40 => Self::QueryBinList,
            41 => Self::Batch,
            other => Self::Other(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Namespace => 0,
            Self::Set => 1,
            Self::Key => 2,
            Self::Digest => 4,
            Self::DigestArray => 6,
            Self::TransactionId => 7,
            Self::ScanOptions => 8,
            Self::IndexName => 21,
            Self::IndexRange => 22,
            Self::IndexType => 26,
            Self::UdfFilename => 30,
            Self::UdfFunction => 31,
            Self::UdfArglist => 32,
            Self::UdfOp => 33,
            Self::QueryBinList => 40,
            Self::Batch => 41,
            Self::Other(other) => other,
        }
    }
}

/// A single message field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub field_type: FieldType,
    pub data: Bytes,
}

impl Field {
    pub fn new(field_type: FieldType, data: impl Into<Bytes>) -> Self {
        Self {
            field_type,
            data: data.into(),
        }
    }

    /// Size of the field value in bytes
    pub fn value_size(&self) -> usize {
        self.data.len()
    }
}

// =============================================================================
// Message
// =============================================================================

/// A decoded request message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub proto_type: ProtoType,
    pub info1: u8,
    pub info2: u8,
    pub info3: u8,
    pub result_code: u8,
    pub generation: u32,
    pub record_ttl: u32,

    /// Client deadline in milliseconds; 0 means "use the default"
    pub transaction_ttl: u32,

    pub fields: Vec<Field>,
    pub n_ops: u16,

    /// Encoded operations, not interpreted here
    pub ops: Bytes,
}

impl Message {
    /// Create a new message builder
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// First field of the given type
    pub fn field(&self, field_type: FieldType) -> Option<&Field> {
        self.fields.iter().find(|f| f.field_type == field_type)
    }

    pub fn has_field(&self, field_type: FieldType) -> bool {
        self.field(field_type).is_some()
    }

    pub fn is_read(&self) -> bool {
        self.info1 & INFO1_READ != 0
    }

    pub fn is_write(&self) -> bool {
        self.info2 & INFO2_WRITE != 0
    }

    pub fn is_delete(&self) -> bool {
        self.info2 & INFO2_DELETE != 0
    }

    pub fn is_udf(&self) -> bool {
        self.has_field(FieldType::UdfFilename)
    }

    pub fn has_digest(&self) -> bool {
        self.has_field(FieldType::Digest)
    }

    pub fn has_key(&self) -> bool {
        self.has_field(FieldType::Key)
    }

    pub fn has_set(&self) -> bool {
        self.has_field(FieldType::Set)
    }

    /// Old-style batch request carrying a digest array
    pub fn is_batch_direct(&self) -> bool {
        self.has_field(FieldType::DigestArray)
    }

    /// Secondary-index query
    pub fn is_query(&self) -> bool {
        self.has_field(FieldType::IndexRange) || self.has_field(FieldType::IndexName)
    }
}

/// Builder for Message
pub struct MessageBuilder {
    message: Message,
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self {
            message: Message {
                proto_type: ProtoType::Message,
                info1: 0,
                info2: 0,
                info3: 0,
                result_code: 0,
                generation: 0,
                record_ttl: 0,
                transaction_ttl: 0,
                fields: Vec::new(),
                n_ops: 0,
                ops: Bytes::new(),
            },
        }
    }
}

impl MessageBuilder {
    pub fn proto_type(mut self, proto_type: ProtoType) -> Self {
        self.message.proto_type = proto_type;
        self
    }

    /// Set the read bit
    pub fn read(mut self) -> Self {
        self.message.info1 |= INFO1_READ;
        self
    }

    /// Set the write bit
    pub fn write(mut self) -> Self {
        self.message.info2 |= INFO2_WRITE;
        self
    }

    /// Set the write and delete bits
    pub fn delete(mut self) -> Self {
        self.message.info2 |= INFO2_WRITE | INFO2_DELETE;
        self
    }

    pub fn info1(mut self, bits: u8) -> Self {
        self.message.info1 = bits;
        self
    }

    pub fn info2(mut self, bits: u8) -> Self {
        self.message.info2 = bits;
        self
    }

    pub fn info3(mut self, bits: u8) -> Self {
        self.message.info3 = bits;
        self
    }

    /// Set the client deadline (milliseconds)
    pub fn transaction_ttl(mut self, ttl_ms: u32) -> Self {
        self.message.transaction_ttl = ttl_ms;
        self
    }

    pub fn generation(mut self, generation: u32) -> Self {
        self.message.generation = generation;
        self
    }

    pub fn record_ttl(mut self, ttl: u32) -> Self {
        self.message.record_ttl = ttl;
        self
    }

    pub fn field(mut self, field_type: FieldType, data: impl Into<Bytes>) -> Self {
        self.message.fields.push(Field::new(field_type, data));
        self
    }

    pub fn namespace(self, name: &str) -> Self {
        self.field(FieldType::Namespace, Bytes::copy_from_slice(name.as_bytes()))
    }

    pub fn set(self, name: &str) -> Self {
        self.field(FieldType::Set, Bytes::copy_from_slice(name.as_bytes()))
    }

    pub fn key(self, key: &[u8]) -> Self {
        self.field(FieldType::Key, Bytes::copy_from_slice(key))
    }

    pub fn digest(self, digest: &[u8]) -> Self {
        self.field(FieldType::Digest, Bytes::copy_from_slice(digest))
    }

    pub fn ops(mut self, n_ops: u16, ops: impl Into<Bytes>) -> Self {
        self.message.n_ops = n_ops;
        self.message.ops = ops.into();
        self
    }

    pub fn build(self) -> Message {
        self.message
    }
}
