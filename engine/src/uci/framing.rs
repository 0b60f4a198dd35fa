//! Newline framing for the engine's stdout.
//!
//! Reads from a pipe arrive in arbitrary chunks; a single `bestmove` line
//! may be split across several reads, or several lines may share one.

/// Accumulates raw bytes and yields only complete, newline-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completes, without the
    /// terminator. A trailing `\r` is stripped as well.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Number of buffered bytes still waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take whatever unterminated output is left, e.g. once the stream closed.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
