//! Protocol Module
//!
//! Request messages as seen by the transaction service.
//!
//! ## Message Layout
//! ```text
//! ┌──────────────┬────────────────┬──────────────┬──────────────┐
//! │ Proto Hdr(8) │ Msg Header(22) │ Fields ...   │ Ops ...      │
//! └──────────────┴────────────────┴──────────────┴──────────────┘
//! ```
//!
//! Only fields and header bits are interpreted here; operations are carried
//! through untouched for the execution engines.

mod codec;
mod message;
mod peek;
mod result_code;

pub use codec::{
    decode_message, encode_message, FIELD_HEADER_SIZE, MAX_BODY_SIZE, MSG_HEADER_SIZE,
    PROTO_HEADER_SIZE, PROTO_VERSION,
};
pub use message::{
    Field, FieldType, Message, MessageBuilder, ProtoType, INFO1_BATCH, INFO1_GET_ALL,
    INFO1_GET_NOBINDATA, INFO1_READ, INFO1_XDR, INFO2_CREATE_ONLY, INFO2_DELETE,
    INFO2_GENERATION, INFO2_WRITE, INFO3_LAST,
};
pub use peek::{peek_data_in_memory, Peek};
pub use result_code::ResultCode;
