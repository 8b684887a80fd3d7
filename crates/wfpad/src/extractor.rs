//! Restartable decoding of a byte stream into frames.

use crate::Error;
use crate::message::{Message, decode};

/// Turns the bytes read from a connection, in whatever chunks they arrive,
/// into frames. Only the bytes of an incomplete trailing frame are kept
/// between calls.
#[derive(Debug, Default, Clone)]
pub struct Extractor {
    pending: Vec<u8>,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed `data` and return every frame it completes, in order. On error
    /// the buffered bytes are discarded: the stream cannot be resynchronized
    /// and the connection has to be closed.
    pub fn extract(&mut self, data: &[u8]) -> Result<Vec<Message>, Error> {
        self.pending.extend_from_slice(data);
        let decoded = decode(&self.pending).map(|(messages, rest)| (messages, rest.len()));
        let (messages, remaining) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                self.pending.clear();
                return Err(e);
            }
        };
        let consumed = self.pending.len() - remaining;
        self.pending.drain(..consumed);
        Ok(messages)
    }

    /// Number of buffered bytes of an incomplete frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
