//! Incremental CRLF line splitting over a raw byte stream.

/// A single protocol line with its CRLF stripped.
pub type RawLine = Vec<u8>;

const CRLF: &[u8] = b"\r\n";

/// Splits chunks read off a socket into CRLF delimited lines, keeping
/// whatever follows the last terminator until the next [`LineBuffer::feed`].
#[derive(Debug, Default)]
pub struct LineBuffer {
    residue: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every line it completed, in order.
    ///
    /// ```
    /// # use smtp_sink::smtp::LineBuffer;
    /// let mut buffer = LineBuffer::new();
    /// assert!(buffer.feed(b"HE").is_empty());
    /// assert_eq!(buffer.feed(b"LO\r\nDA"), vec![b"HELO".to_vec()]);
    /// assert_eq!(buffer.residue(), b"DA");
    /// ```
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawLine> {
        // A CR at the end of the old residue may pair with a LF at the
        // start of this chunk.
        let scan_from = self.residue.len().saturating_sub(1);
        self.residue.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut pos = scan_from;
        while let Some(offset) = find_crlf(&self.residue[pos..]) {
            let end = pos + offset;
            lines.push(self.residue[start..end].to_vec());
            start = end + CRLF.len();
            pos = start;
        }
        self.residue.drain(..start);
        lines
    }

    /// Bytes received after the last line terminator.
    pub fn residue(&self) -> &[u8] {
        &self.residue
    }
}

fn find_crlf(haystack: &[u8]) -> Option<usize> {
    haystack.windows(CRLF.len()).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_strings(lines: Vec<RawLine>) -> Vec<String> {
        lines
            .into_iter()
            .map(|l| String::from_utf8(l).unwrap())
            .collect()
    }

    #[test]
    fn several_lines_in_one_chunk() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.feed(b"A\r\nB\r\nC\r\n");
        assert_eq!(as_strings(lines), vec!["A", "B", "C"]);
        assert!(buffer.residue().is_empty());
    }

    #[test]
    fn every_split_point_gives_the_same_lines() {
        let input = b"A\r\nB\r\nC\r\n";
        for first in 0..=input.len() {
            for second in first..=input.len() {
                let mut buffer = LineBuffer::new();
                let mut lines = buffer.feed(&input[..first]);
                lines.extend(buffer.feed(&input[first..second]));
                lines.extend(buffer.feed(&input[second..]));
                assert_eq!(
                    as_strings(lines),
                    vec!["A", "B", "C"],
                    "split at {} and {}",
                    first,
                    second
                );
            }
        }
    }

    #[test]
    fn byte_at_a_time() {
        let mut buffer = LineBuffer::new();
        let mut lines = Vec::new();
        for byte in b"MAIL FROM:<a@b.c>\r\n.\r\n" {
            lines.extend(buffer.feed(&[*byte]));
        }
        assert_eq!(as_strings(lines), vec!["MAIL FROM:<a@b.c>", "."]);
    }

    #[test]
    fn keeps_partial_tail() {
        let mut buffer = LineBuffer::new();
        assert_eq!(as_strings(buffer.feed(b"DATA\r\nSubj")), vec!["DATA"]);
        assert_eq!(buffer.residue(), b"Subj");
        assert_eq!(
            as_strings(buffer.feed(b"ect: hi\r")),
            Vec::<String>::new()
        );
        assert_eq!(as_strings(buffer.feed(b"\n")), vec!["Subject: hi"]);
    }

    #[test]
    fn empty_lines_and_bare_line_feeds() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.feed(b"\r\na\nb\r\n\r\n");
        assert_eq!(as_strings(lines), vec!["", "a\nb", ""]);
    }
}
