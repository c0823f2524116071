//! Frame encoding and decoding over blocking byte streams.
//!
//! A frame is a nine-byte header followed by the payload:
//!
//! ```text
//! category: u8 | correlation id: i32 BE | payload length: i32 BE | payload
//! ```
//!
//! [`decode`] blocks until a whole frame is available. A clean end of stream
//! before the first header byte is reported as [`DecodeError::Closed`]; every
//! other short read is [`DecodeError::Truncated`].

use std::io::{self, ErrorKind, Read, Write};

use thiserror::Error;

use crate::category::Category;
use crate::message::Message;

/// Largest payload accepted in either direction (64 MiB).
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

const HEADER_TAIL_LEN: usize = 8;

/// Errors raised while reading a frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stream ended cleanly before a new frame began.
    #[error("connection closed by peer")]
    Closed,
    /// The stream ended part way through a frame.
    #[error("stream ended mid-frame while reading the {section}")]
    Truncated {
        /// Frame section being read when the stream ended.
        section: &'static str,
    },
    /// The length field was negative.
    #[error("frame declares a negative payload length ({length})")]
    NegativeLength {
        /// Declared length.
        length: i32,
    },
    /// The length field exceeded [`MAX_PAYLOAD_LEN`].
    #[error("frame payload of {length} bytes exceeds the {MAX_PAYLOAD_LEN} byte limit")]
    Oversized {
        /// Declared length.
        length: usize,
    },
    /// The underlying reader failed.
    #[error("failed to read frame: {0}")]
    Io(#[source] io::Error),
}

/// Errors raised while writing a frame.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The payload exceeded [`MAX_PAYLOAD_LEN`].
    #[error("payload of {length} bytes exceeds the {MAX_PAYLOAD_LEN} byte limit")]
    Oversized {
        /// Payload length.
        length: usize,
    },
    /// The underlying writer failed.
    #[error("failed to write frame: {0}")]
    Io(#[from] io::Error),
}

/// Writes one frame and flushes the writer.
///
/// # Errors
///
/// Returns [`EncodeError::Oversized`] when the payload is too large to frame
/// and [`EncodeError::Io`] when the writer fails.
pub fn encode<W: Write + ?Sized>(writer: &mut W, message: &Message) -> Result<(), EncodeError> {
    let header = encode_header(message)?;
    writer.write_all(&header)?;
    writer.write_all(message.payload())?;
    writer.flush()?;
    Ok(())
}

/// Reads exactly one frame.
///
/// # Errors
///
/// Returns [`DecodeError::Closed`] on a clean end of stream and the other
/// [`DecodeError`] variants for malformed or truncated frames.
pub fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Message, DecodeError> {
    let Some(code) = read_category(reader)? else {
        return Err(DecodeError::Closed);
    };

    let mut tail = [0_u8; HEADER_TAIL_LEN];
    read_section(reader, &mut tail, "header")?;
    let (correlation_id, length) = split_header_tail(tail);
    let length = checked_length(length)?;

    let mut payload = vec![0_u8; length];
    read_section(reader, &mut payload, "payload")?;
    Ok(Message::new(Category::from_code(code), correlation_id, payload))
}

#[expect(
    clippy::big_endian_bytes,
    reason = "the frame header uses network byte order"
)]
fn encode_header(message: &Message) -> Result<[u8; 1 + HEADER_TAIL_LEN], EncodeError> {
    let length = message.payload().len();
    if length > MAX_PAYLOAD_LEN {
        return Err(EncodeError::Oversized { length });
    }
    let declared = i32::try_from(length).map_err(|_| EncodeError::Oversized { length })?;

    let [i0, i1, i2, i3] = message.correlation_id().to_be_bytes();
    let [l0, l1, l2, l3] = declared.to_be_bytes();
    Ok([message.category().code(), i0, i1, i2, i3, l0, l1, l2, l3])
}

#[expect(
    clippy::big_endian_bytes,
    reason = "the frame header uses network byte order"
)]
const fn split_header_tail(tail: [u8; HEADER_TAIL_LEN]) -> (i32, i32) {
    let [i0, i1, i2, i3, l0, l1, l2, l3] = tail;
    (
        i32::from_be_bytes([i0, i1, i2, i3]),
        i32::from_be_bytes([l0, l1, l2, l3]),
    )
}

fn checked_length(length: i32) -> Result<usize, DecodeError> {
    let declared = usize::try_from(length).map_err(|_| DecodeError::NegativeLength { length })?;
    if declared > MAX_PAYLOAD_LEN {
        return Err(DecodeError::Oversized { length: declared });
    }
    Ok(declared)
}

/// Reads the category byte, returning `None` on a clean end of stream.
fn read_category<R: Read + ?Sized>(reader: &mut R) -> Result<Option<u8>, DecodeError> {
    let mut byte = [0_u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => {
                let [code] = byte;
                return Ok(Some(code));
            }
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) => return Err(DecodeError::Io(error)),
        }
    }
}

fn read_section<R: Read + ?Sized>(
    reader: &mut R,
    buffer: &mut [u8],
    section: &'static str,
) -> Result<(), DecodeError> {
    reader.read_exact(buffer).map_err(|error| {
        if error.kind() == ErrorKind::UnexpectedEof {
            DecodeError::Truncated { section }
        } else {
            DecodeError::Io(error)
        }
    })
}
