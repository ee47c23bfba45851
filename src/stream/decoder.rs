//! Incremental UTF-8 decoding for chunked response bodies.
//!
//! Network chunks do not respect character boundaries: a three-byte CJK
//! character or a four-byte emoji can arrive split across two reads. The
//! decoder holds back any trailing incomplete sequence and prepends it to the
//! next chunk, so no character is ever dropped or corrupted.

/// Streaming UTF-8 decoder.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    /// Bytes of an incomplete trailing sequence from the previous chunk.
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    /// Create a new decoder with an empty carry buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk.
    ///
    /// Returns all text that could be completed with the bytes seen so far.
    /// Invalid sequences in the middle of the stream are replaced with
    /// U+FFFD rather than failing the stream.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    if valid_up_to > 0 {
                        out.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                        self.pending.drain(..valid_up_to);
                    }
                    match err.error_len() {
                        Some(bad_len) => {
                            tracing::debug!(bad_len, "Replacing invalid UTF-8 sequence");
                            out.push(char::REPLACEMENT_CHARACTER);
                            let drain_len = bad_len.min(self.pending.len());
                            self.pending.drain(..drain_len);
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => break,
                    }
                }
            }
        }

        out
    }

    /// Flush at end of stream.
    ///
    /// Leftover bytes that never formed a complete character are decoded
    /// lossily.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        tracing::debug!(
            leftover = self.pending.len(),
            "Stream ended inside a multi-byte sequence"
        );
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }

    /// Number of bytes currently held back.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
