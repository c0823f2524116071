//! Wire protocol shared by the lintbridge service and its clients.
//!
//! Every exchange travels as a single framed [`Message`]:
//!
//! ```text
//! category: u8 | correlation id: i32 BE | payload length: i32 BE | payload
//! ```
//!
//! The payload is UTF-8 JSON (possibly empty). [`codec`] reads and writes
//! frames, [`Category`] names the one-byte codes and [`payload`] holds the
//! typed camelCase bodies, including the [`Finding`] data model.

mod category;
pub mod codec;
mod message;
pub mod payload;

pub use category::Category;
pub use codec::{DecodeError, EncodeError, MAX_PAYLOAD_LEN, decode, encode};
pub use message::Message;
pub use payload::{
    AnalyzeErrorCode, AnalyzeRequest, AnalyzeResult, ErrorPayload, Finding, InitializeRequest,
    RuleInfo, RuleRetrieveResult, TextRange,
};
