/// Appended once a stream is cut off at its cap.
pub const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Incrementally decoded text capped at a fixed number of characters.
///
/// Bytes are decoded as UTF-8 as they arrive; a multibyte sequence split
/// across chunks waits in `pending` for the rest of its bytes. Once the cap
/// is exceeded the buffer is sealed and later input is dropped.
#[derive(Debug)]
pub struct OutputBuffer {
    text: String,
    pending: Vec<u8>,
    chars: usize,
    max_chars: usize,
    truncated: bool,
}

impl OutputBuffer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            pending: Vec::new(),
            chars: 0,
            max_chars,
            truncated: false,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if self.truncated {
            return;
        }
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);
        let mut rest = bytes.as_slice();
        while !rest.is_empty() && !self.truncated {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    self.append(valid);
                    rest = &[];
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    self.append(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            self.append("\u{FFFD}");
                            rest = &after[len..];
                        }
                        None => {
                            if !self.truncated {
                                self.pending = after.to_vec();
                            }
                            rest = &[];
                        }
                    }
                }
            }
        }
    }

    /// Flushes an incomplete trailing sequence and returns the text.
    pub fn take_text(&mut self) -> String {
        if !self.truncated && !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.append(&String::from_utf8_lossy(&tail));
        }
        std::mem::take(&mut self.text)
    }

    fn append(&mut self, text: &str) {
        if self.truncated || text.is_empty() {
            return;
        }
        let count = text.chars().count();
        if self.chars + count <= self.max_chars {
            self.text.push_str(text);
            self.chars += count;
            return;
        }
        let keep = self.max_chars - self.chars;
        let end = text
            .char_indices()
            .nth(keep)
            .map(|(index, _)| index)
            .unwrap_or(text.len());
        self.text.push_str(&text[..end]);
        self.text.push_str(TRUNCATION_MARKER);
        self.chars = self.max_chars;
        self.truncated = true;
        self.pending.clear();
    }
}
