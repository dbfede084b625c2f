//! Incremental UTF-8 decoding for streamed response bodies

/// Streaming UTF-8 decoder.
///
/// Response bodies arrive in arbitrary byte chunks, so a multibyte character
/// can land split across two reads. The decoder buffers an incomplete
/// trailing sequence (at most three bytes) and completes it on the next call
/// instead of emitting replacement characters for a split. Genuinely invalid
/// bytes decode to U+FFFD and decoding resumes right after them.
///
/// One decoder per response stream; the carry never crosses sessions.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, carrying any incomplete trailing sequence over to the
    /// next call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let owned;
        let mut input: &[u8] = if self.carry.is_empty() {
            bytes
        } else {
            self.carry.extend_from_slice(bytes);
            owned = std::mem::take(&mut self.carry);
            &owned
        };

        let mut out = String::with_capacity(input.len());
        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let valid_len = err.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&input[..valid_len]) {
                        out.push_str(valid);
                    }
                    match err.error_len() {
                        // Incomplete trailing sequence: the next chunk
                        // finishes it.
                        None => {
                            self.carry.extend_from_slice(&input[valid_len..]);
                            break;
                        }
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &input[valid_len + bad..];
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush decoder state at end of input.
    ///
    /// Nothing can complete a pending sequence once the stream is done, so a
    /// buffered tail is invalid by then and decodes to a single replacement
    /// character.
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            String::new()
        } else {
            self.carry.clear();
            String::from(char::REPLACEMENT_CHARACTER)
        }
    }
}
