//! Framed message value.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::category::Category;

/// One frame on the wire: category, correlation id and JSON payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    category: Category,
    correlation_id: i32,
    payload: Vec<u8>,
}

impl Message {
    /// Builds a message from raw payload bytes.
    #[must_use]
    pub const fn new(category: Category, correlation_id: i32, payload: Vec<u8>) -> Self {
        Self {
            category,
            correlation_id,
            payload,
        }
    }

    /// Builds a message with an empty payload.
    #[must_use]
    pub const fn empty(category: Category, correlation_id: i32) -> Self {
        Self::new(category, correlation_id, Vec::new())
    }

    /// Builds a message whose payload is `body` serialised as JSON.
    ///
    /// # Errors
    ///
    /// Returns the serialiser error when `body` cannot be represented as JSON.
    pub fn json<T: Serialize>(
        category: Category,
        correlation_id: i32,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_vec(body)?;
        Ok(Self::new(category, correlation_id, payload))
    }

    /// Message category.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Correlation id pairing a response with its request.
    #[must_use]
    pub const fn correlation_id(&self) -> i32 {
        self.correlation_id
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the message, returning its payload bytes.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Deserialises the JSON payload.
    ///
    /// # Errors
    ///
    /// Returns the parser error when the payload is not valid JSON for `T`.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// Payload decoded as UTF-8 with invalid sequences replaced.
    #[must_use]
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
