//! Stateful UTF-8 decoding for chunked response bodies.
//!
//! Chunk boundaries fall anywhere, including inside a multi-byte character.
//! The decoder carries the incomplete trailing bytes of one chunk into the
//! next and is flushed exactly once at end of stream.

/// Incremental UTF-8 decoder with a partial-sequence carry buffer.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the next chunk, returning all complete characters seen so
    /// far. Invalid sequences become U+FFFD; an incomplete trailing sequence
    /// is carried into the next call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).expect("validated prefix"));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            // Incomplete sequence at the end: keep for next chunk
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }

    /// Flushes any carried bytes at end of stream.
    ///
    /// A non-empty carry at this point is a truncated sequence and decodes
    /// lossily.
    pub fn flush(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}
