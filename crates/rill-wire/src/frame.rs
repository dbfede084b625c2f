//! Newline framing over decoded text

/// Accumulates decoded text and yields complete newline-terminated lines.
///
/// NDJSON endpoints write one record per line, but chunk boundaries fall
/// anywhere, so a record can span several reads. `push` returns each line
/// exactly once, when its terminator arrives. A trailing `\r` is trimmed and
/// blank lines (keep-alives) are dropped.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: String,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decoded text and drain every complete line.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buf.push_str(text);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line = self.buf[..pos].trim_end_matches('\r').to_string();
            self.buf.drain(..=pos);
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush an unterminated remainder at end of input.
    ///
    /// Servers are not required to terminate the final record, so end of
    /// input stands in for the missing terminator.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        let rest = rest.trim_end_matches('\r');
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_line() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push("{\"a\":1}\n"), vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_line_split_across_pushes() {
        let mut framer = LineFramer::new();
        assert!(framer.push("{\"a\"").is_empty());
        assert!(framer.push(":1").is_empty());
        assert_eq!(framer.push("}\n"), vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_multiple_lines_one_push() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push("one\ntwo\nthree\n"), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_crlf_terminators() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push("one\r\ntwo\r\n"), vec!["one", "two"]);
    }

    #[test]
    fn test_blank_lines_dropped() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push("one\n\n\r\ntwo\n"), vec!["one", "two"]);
    }

    #[test]
    fn test_terminator_alone_in_later_push() {
        let mut framer = LineFramer::new();
        assert!(framer.push("pending").is_empty());
        assert_eq!(framer.push("\n"), vec!["pending"]);
    }

    #[test]
    fn test_finish_flushes_remainder() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push("done\nleft over"), vec!["done"]);
        assert_eq!(framer.finish(), Some("left over".to_string()));
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn test_finish_after_clean_terminator() {
        let mut framer = LineFramer::new();
        framer.push("done\n");
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn test_finish_drops_bare_carriage_return() {
        let mut framer = LineFramer::new();
        framer.push("tail\r");
        assert_eq!(framer.finish(), Some("tail".to_string()));
    }
}
