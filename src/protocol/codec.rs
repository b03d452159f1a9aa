//! Protocol codec
//!
//! Encoding and decoding functions for the request wire format.
//!
//! ## Wire Format
//!
//! ### Proto Header
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Ver (1)  │ Type (1) │   Body Size (6, big-endian) │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Message Header (body)
//! ```text
//! ┌────────┬───────┬───────┬───────┬────────┬────────┐
//! │ Hsz(1) │ I1(1) │ I2(1) │ I3(1) │ Unu(1) │ Res(1) │
//! ├────────┴───────┴───┬───┴───────┴──┬─────┴────────┤
//! │ Generation (4)     │ Record TTL(4)│ Txn TTL (4)  │
//! ├────────────────────┼──────────────┴──────────────┤
//! │ N Fields (2)       │ N Ops (2)                   │
//! └────────────────────┴─────────────────────────────┘
//! ```
//!
//! ### Field
//! - size (4 bytes, counts the type byte) + type (1) + data
//!
//! Operations follow the fields and are kept as opaque bytes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, TsvcError};
use super::{Field, FieldType, Message, ProtoType};

/// Protocol version written and accepted
pub const PROTO_VERSION: u8 = 2;

/// Proto header size: version + type + 48-bit size
pub const PROTO_HEADER_SIZE: usize = 8;

/// Message header size
pub const MSG_HEADER_SIZE: usize = 22;

/// Field header size: 4 bytes size + 1 byte type
pub const FIELD_HEADER_SIZE: usize = 5;

/// Maximum body size (128 MB)
pub const MAX_BODY_SIZE: u64 = 128 * 1024 * 1024;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a message including its proto header
///
/// Fails if the field count or body size can't be represented on the wire.
pub fn encode_message(message: &Message) -> Result<Vec<u8>> {
    let n_fields = u16::try_from(message.fields.len()).map_err(|_| {
        TsvcError::Protocol(format!(
            "Too many fields: {} (max {})",
            message.fields.len(),
            u16::MAX
        ))
    })?;

    let fields_len: usize = message
        .fields
        .iter()
        .map(|f| FIELD_HEADER_SIZE + f.data.len())
        .sum();
    let body_len = MSG_HEADER_SIZE + fields_len + message.ops.len();

    // Also bounds each field's size below u32::MAX.
    if body_len as u64 > MAX_BODY_SIZE {
        return Err(TsvcError::Protocol(format!(
            "Body too large: {} bytes (max {})",
            body_len, MAX_BODY_SIZE
        )));
    }

    let mut buf = BytesMut::with_capacity(PROTO_HEADER_SIZE + body_len);

    // Proto header: size is 48 bits, big-endian
    buf.put_u8(PROTO_VERSION);
    buf.put_u8(message.proto_type as u8);
    buf.put_slice(&(body_len as u64).to_be_bytes()[2..]);

    // Message header
    buf.put_u8(MSG_HEADER_SIZE as u8);
    buf.put_u8(message.info1);
    buf.put_u8(message.info2);
    buf.put_u8(message.info3);
    buf.put_u8(0);
    buf.put_u8(message.result_code);
    buf.put_u32(message.generation);
    buf.put_u32(message.record_ttl);
    buf.put_u32(message.transaction_ttl);
    buf.put_u16(n_fields);
    buf.put_u16(message.n_ops);

    for field in &message.fields {
        buf.put_u32(field.data.len() as u32 + 1);
        buf.put_u8(field.field_type.as_u8());
        buf.put_slice(&field.data);
    }

    buf.put_slice(&message.ops);

    Ok(buf.to_vec())
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a message (proto header included)
///
/// Field values are zero-copy slices of `bytes`.
pub fn decode_message(bytes: impl Into<Bytes>) -> Result<Message> {
    let bytes: Bytes = bytes.into();

    if bytes.len() < PROTO_HEADER_SIZE {
        return Err(TsvcError::Protocol(format!(
            "Incomplete proto header: expected {} bytes, got {}",
            PROTO_HEADER_SIZE,
            bytes.len()
        )));
    }

    let version = bytes[0];
    if version != PROTO_VERSION {
        return Err(TsvcError::Protocol(format!(
            "Unsupported proto version: {}",
            version
        )));
    }

    let proto_type = ProtoType::from_u8(bytes[1]).ok_or_else(|| {
        TsvcError::Protocol(format!("Unknown proto type: 0x{:02x}", bytes[1]))
    })?;

    let mut size_bytes = [0u8; 8];
    size_bytes[2..].copy_from_slice(&bytes[2..PROTO_HEADER_SIZE]);
    let body_len = u64::from_be_bytes(size_bytes);

    if body_len > MAX_BODY_SIZE {
        return Err(TsvcError::Protocol(format!(
            "Body too large: {} bytes (max {})",
            body_len, MAX_BODY_SIZE
        )));
    }

    let total_len = PROTO_HEADER_SIZE + body_len as usize;
    if bytes.len() < total_len {
        return Err(TsvcError::Protocol(format!(
            "Incomplete body: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    decode_body(proto_type, bytes.slice(PROTO_HEADER_SIZE..total_len))
}

/// Decode the message header, fields and operations
fn decode_body(proto_type: ProtoType, body: Bytes) -> Result<Message> {
    if body.len() < MSG_HEADER_SIZE {
        return Err(TsvcError::Protocol(format!(
            "Incomplete message header: expected {} bytes, got {}",
            MSG_HEADER_SIZE,
            body.len()
        )));
    }

    let header_sz = body[0] as usize;
    if header_sz != MSG_HEADER_SIZE {
        return Err(TsvcError::Protocol(format!(
            "Unexpected message header size: {}",
            header_sz
        )));
    }

    let be_u32 = |at: usize| u32::from_be_bytes([body[at], body[at + 1], body[at + 2], body[at + 3]]);
    let be_u16 = |at: usize| u16::from_be_bytes([body[at], body[at + 1]]);

    let info1 = body[1];
    let info2 = body[2];
    let info3 = body[3];
    let result_code = body[5];
    let generation = be_u32(6);
    let record_ttl = be_u32(10);
    let transaction_ttl = be_u32(14);
    let n_fields = be_u16(18) as usize;
    let n_ops = be_u16(20);

    let mut fields = Vec::with_capacity(n_fields);
    let mut offset = MSG_HEADER_SIZE;

    for i in 0..n_fields {
        if body.len() < offset + FIELD_HEADER_SIZE {
            return Err(TsvcError::Protocol(format!(
                "Field {}: incomplete header at offset {}",
                i, offset
            )));
        }

        let field_sz = be_u32(offset) as usize;
        if field_sz == 0 {
            return Err(TsvcError::Protocol(format!("Field {}: zero size", i)));
        }

        let field_type = FieldType::from_u8(body[offset + 4]);
        let data_start = offset + FIELD_HEADER_SIZE;
        let data_end = offset + 4 + field_sz;

        if body.len() < data_end {
            return Err(TsvcError::Protocol(format!(
                "Field {}: incomplete value (expected {}, got {})",
                i,
                field_sz - 1,
                body.len() - data_start
            )));
        }

        fields.push(Field {
            field_type,
            data: body.slice(data_start..data_end),
        });
        offset = data_end;
    }

    Ok(Message {
        proto_type,
        info1,
        info2,
        info3,
        result_code,
        generation,
        record_ttl,
        transaction_ttl,
        fields,
        n_ops,
        ops: body.slice(offset..),
    })
}
