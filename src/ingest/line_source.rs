use std::io::BufRead;

use log::*;

use crate::Result;

fn skip_utf8_bom(line: &[u8]) -> &[u8] {
    line.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(line)
}

/// Streams codes out of a newline-delimited code list.
///
/// Every line is trimmed; blank lines are skipped. A UTF-8 byte-order mark
/// on the first line is dropped. Lines that are not valid UTF-8 are skipped
/// and counted; they are never stored, so two distinct byte strings cannot
/// collapse into one code.
pub struct LineSource<R: BufRead> {
    reader: R,
    buffer: Vec<u8>,
    line_no: u64,
    bytes_read: u64,
    skipped_lines: u64,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        LineSource {
            reader,
            buffer: Vec::with_capacity(64),
            line_no: 0,
            bytes_read: 0,
            skipped_lines: 0,
        }
    }

    /// Number of raw lines consumed so far, blank ones included.
    pub fn line_no(&self) -> u64 {
        self.line_no
    }

    /// Number of bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Number of lines dropped because they were not valid UTF-8.
    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }

    /// Reads the next non-empty code, or `None` at end of input.
    pub fn next_code(&mut self) -> Result<Option<String>> {
        loop {
            self.buffer.clear();
            let n = self.reader.read_until(b'\n', &mut self.buffer)?;
            if n == 0 {
                return Ok(None);
            }
            self.bytes_read += n as u64;
            self.line_no += 1;

            let mut raw = self.buffer.as_slice();
            if self.line_no == 1 {
                raw = skip_utf8_bom(raw);
            }
            let Ok(code) = std::str::from_utf8(raw) else {
                self.skipped_lines += 1;
                warn!("Skipping line {}: not valid UTF-8", self.line_no);
                continue;
            };
            let trimmed = code.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_code().transpose()
    }
}
