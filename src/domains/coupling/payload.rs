use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Largest message read from the controller in one exchange.
pub const MAX_PAYLOAD_BYTES: usize = 150;

/// Reserved payload that ends the run from the controller side.
pub const TERMINATION_KEYWORD: &str = "exit";

/// Acknowledgement written back after every received message: a newline, NUL padded.
pub const ACKNOWLEDGEMENT: [u8; MAX_PAYLOAD_BYTES] = {
    let mut ack = [0u8; MAX_PAYLOAD_BYTES];
    ack[0] = b'\n';
    ack
};

/// Bytes received from the controller in one exchange.
///
/// Only the effective prefix is stored: everything up to the first NUL, capped
/// at [`MAX_PAYLOAD_BYTES`]. Padding never reaches the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPayload {
    bytes: Vec<u8>,
}

impl RawPayload {
    pub fn from_received(received: &[u8]) -> Self {
        let capped = &received[..received.len().min(MAX_PAYLOAD_BYTES)];
        let effective = capped.iter().position(|b| *b == 0).unwrap_or(capped.len());
        Self { bytes: capped[..effective].to_vec() }
    }

    pub fn from_text(text: &str) -> Self {
        Self::from_received(text.as_bytes())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Invalid UTF-8 is replaced, which the decoder then rejects as non-numeric.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// `exit`, ignoring ASCII case and surrounding whitespace.
    pub fn is_termination(&self) -> bool {
        self.text().trim().eq_ignore_ascii_case(TERMINATION_KEYWORD)
    }
}
