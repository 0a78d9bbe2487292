use std::io::{self, BufRead};

/// Byte-level line reader for pipe-delimited tables. Each item is the line
/// without its terminator, or `None` when the line is not valid UTF-8, so a
/// single bad line can be counted and skipped instead of failing the read.
pub struct DecodedLines<R> {
    reader: R,
    buf: Vec<u8>,
}

pub fn decoded_lines<R: BufRead>(reader: R) -> DecodedLines<R> {
    DecodedLines {
        reader,
        buf: Vec::new(),
    }
}

impl<R: BufRead> Iterator for DecodedLines<R> {
    type Item = io::Result<Option<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8(std::mem::take(&mut self.buf)).ok()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
