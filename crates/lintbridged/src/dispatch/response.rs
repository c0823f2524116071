//! Response framing helpers for the dispatch loop.

use std::io::Write;

use serde::Serialize;

use lintbridge_protocol::{Category, ErrorPayload, Message, encode};

use super::errors::DispatchError;

/// Writer that frames responses onto a session stream.
pub(crate) struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    pub(crate) const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one framed message and flushes.
    pub(crate) fn write_message(&mut self, message: &Message) -> Result<(), DispatchError> {
        encode(&mut self.writer, message)?;
        Ok(())
    }

    /// Writes `body` as the JSON payload of a `category` response.
    pub(crate) fn write_json<T: Serialize>(
        &mut self,
        category: Category,
        correlation_id: i32,
        body: &T,
    ) -> Result<(), DispatchError> {
        let message = Message::json(category, correlation_id, body)?;
        self.write_message(&message)
    }

    /// Writes an error payload under `category`.
    pub(crate) fn write_error(
        &mut self,
        category: Category,
        correlation_id: i32,
        payload: &ErrorPayload,
    ) -> Result<(), DispatchError> {
        self.write_json(category, correlation_id, payload)
    }

    /// Writes the response for a protocol-level failure.
    pub(crate) fn write_dispatch_error(
        &mut self,
        correlation_id: i32,
        error: &DispatchError,
    ) -> Result<(), DispatchError> {
        self.write_error(error.response_category(), correlation_id, &error.payload())
    }
}
