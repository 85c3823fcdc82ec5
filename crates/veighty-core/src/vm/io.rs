//! Side Channels
//!
//! The input and output streams a running program talks to. Both are
//! borrowed trait objects so the host can hand in stdin/stdout and tests can
//! hand in cursors and byte vectors.

use std::io::{self, BufRead, Write};

pub struct Channels<'a> {
    pub input: &'a mut dyn BufRead,
    pub output: &'a mut dyn Write,
}

impl<'a> Channels<'a> {
    pub fn new(input: &'a mut dyn BufRead, output: &'a mut dyn Write) -> Self {
        Channels { input, output }
    }

    /// Exactly eight raw bytes, little-endian.
    pub fn read_u64(&mut self) -> io::Result<u64> {
        let mut bytes = [0u8; 8];
        self.input.read_exact(&mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Up to `limit` bytes, stopping after the first newline. Returns an
    /// empty vector at end of input.
    pub fn read_line(&mut self, limit: usize) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        while line.len() < limit {
            let available = self.input.fill_buf()?;
            if available.is_empty() {
                break;
            }
            let room = limit - line.len();
            let window = &available[..available.len().min(room)];
            match window.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    line.extend_from_slice(&window[..=pos]);
                    self.input.consume(pos + 1);
                    break;
                }
                None => {
                    let taken = window.len();
                    line.extend_from_slice(window);
                    self.input.consume(taken);
                }
            }
        }
        Ok(line)
    }

    /// Write `bytes` plus a newline and flush, so output interleaves with
    /// prompts the way an unbuffered stream would.
    pub fn print_line(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.write_all(bytes)?;
        self.output.write_all(b"\n")?;
        self.output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn line_read_stops_after_newline() {
        let mut input = Cursor::new(b"one\ntwo\n".to_vec());
        let mut output = Vec::new();
        let mut io = Channels::new(&mut input, &mut output);
        assert_eq!(io.read_line(4096).expect("read"), b"one\n");
        assert_eq!(io.read_line(4096).expect("read"), b"two\n");
        assert!(io.read_line(4096).expect("read").is_empty());
    }

    #[test]
    fn line_read_respects_limit() {
        let mut input = Cursor::new(b"abcdef\n".to_vec());
        let mut output = Vec::new();
        let mut io = Channels::new(&mut input, &mut output);
        assert_eq!(io.read_line(4).expect("read"), b"abcd");
        assert_eq!(io.read_line(4).expect("read"), b"ef\n");
    }

    #[test]
    fn short_raw_read_fails() {
        let mut input = Cursor::new(vec![1, 2, 3]);
        let mut output = Vec::new();
        let mut io = Channels::new(&mut input, &mut output);
        assert!(io.read_u64().is_err());
    }
}
