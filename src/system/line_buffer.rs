//! Accumulates text chunks into complete lines.

/// Splits an arbitrary sequence of chunks into newline-terminated lines,
/// holding back a trailing partial line until more data (or [`flush`])
/// arrives. Not safe for concurrent writers.
///
/// [`flush`]: LineBuffer::flush
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
    /// Leading bytes of a UTF-8 sequence split across chunks
    partial_utf8: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, without the
    /// trailing `\n`.
    pub fn append(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);

        let Some(last_newline) = self.pending.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        complete
            .strip_suffix('\n')
            .unwrap_or(&complete)
            .split('\n')
            .map(str::to_string)
            .collect()
    }

    /// Append raw process output.
    ///
    /// A multi-byte character cut between two chunks is held back until its
    /// remaining bytes arrive; invalid bytes become U+FFFD.
    pub fn append_bytes(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial_utf8.extend_from_slice(chunk);
        let text = take_complete_utf8(&mut self.partial_utf8);
        self.append(&text)
    }

    /// Return and clear the trailing partial line, if any.
    pub fn flush(&mut self) -> Option<String> {
        if !self.partial_utf8.is_empty() {
            let tail = std::mem::take(&mut self.partial_utf8);
            self.pending.push_str(&String::from_utf8_lossy(&tail));
        }
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Decode the longest prefix of `bytes` that does not end inside a
/// multi-byte sequence, removing it from `bytes`.
fn take_complete_utf8(bytes: &mut Vec<u8>) -> String {
    let mut decoded = String::new();
    let mut consumed = 0;
    while consumed < bytes.len() {
        match std::str::from_utf8(&bytes[consumed..]) {
            Ok(valid) => {
                decoded.push_str(valid);
                consumed = bytes.len();
            }
            Err(e) => {
                let valid_end = consumed + e.valid_up_to();
                decoded.push_str(&String::from_utf8_lossy(&bytes[consumed..valid_end]));
                match e.error_len() {
                    Some(invalid) => {
                        decoded.push(char::REPLACEMENT_CHARACTER);
                        consumed = valid_end + invalid;
                    }
                    None => {
                        consumed = valid_end;
                        break;
                    }
                }
            }
        }
    }
    bytes.drain(..consumed);
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_complete_lines() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.append("a\nb\n"), vec!["a", "b"]);
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn test_partial_line_is_retained() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.append("Compiling Ap"), Vec::<String>::new());
        assert_eq!(buffer.append("p.swift\nLink"), vec!["Compiling App.swift"]);
        assert_eq!(buffer.flush(), Some("Link".to_string()));
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn test_empty_lines_are_preserved() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.append("\n\nx\n"), vec!["", "", "x"]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let bytes = "✓ Test passed\n".as_bytes();
        let mut buffer = LineBuffer::new();
        assert!(buffer.append_bytes(&bytes[..1]).is_empty());
        assert!(buffer.append_bytes(&bytes[1..2]).is_empty());
        assert_eq!(buffer.append_bytes(&bytes[2..]), vec!["✓ Test passed"]);
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.append_bytes(b"a\xffb\n"), vec!["a\u{FFFD}b"]);
    }

    #[test]
    fn test_flush_keeps_truncated_character() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.append_bytes(&"…".as_bytes()[..2]).is_empty());
        assert_eq!(buffer.flush(), Some("\u{FFFD}".to_string()));
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn test_empty_chunk() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.append("").is_empty());
        assert_eq!(buffer.flush(), None);
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_lines(
            text in "[a-z \n]{0,200}",
            cuts in proptest::collection::vec(0usize..200, 0..10),
        ) {
            let mut whole = LineBuffer::new();
            let mut expected = whole.append(&text);
            expected.extend(whole.flush());

            let mut points: Vec<usize> = cuts.into_iter().map(|c| c.min(text.len())).collect();
            points.sort_unstable();
            let mut chunked = LineBuffer::new();
            let mut actual = Vec::new();
            let mut start = 0;
            for point in points {
                actual.extend(chunked.append(&text[start..point]));
                start = point;
            }
            actual.extend(chunked.append(&text[start..]));
            actual.extend(chunked.flush());

            prop_assert_eq!(actual, expected);
        }
    }
}
