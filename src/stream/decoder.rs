// src/stream/decoder.rs — Incremental server-sent-event frame decoder
//
// Bytes are buffered raw and only decoded once a full frame is available, so a
// multi-byte character split across two network chunks decodes the same as if
// it had arrived whole.

const DATA_PREFIX: &str = "data:";

/// One complete event frame. Holds only the `data:` payloads, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub payloads: Vec<String>,
}

impl Frame {
    /// Build a frame from its raw text, keeping only `data:` lines.
    pub fn parse(raw: &str) -> Self {
        let payloads = raw
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter_map(|line| {
                let rest = line.strip_prefix(DATA_PREFIX)?;
                let payload = rest.strip_prefix(' ').unwrap_or(rest);
                if payload.trim().is_empty() {
                    None
                } else {
                    Some(payload.to_string())
                }
            })
            .collect();
        Self { payloads }
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// Splits a byte stream into frames on blank lines (`\n\n` or `\r\n\r\n`).
/// Single-use per stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Offset into `buffer` below which no frame boundary starts.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every frame the chunk completed.
    /// Frames without any `data:` line are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        let mut i = self.scanned;
        while i < self.buffer.len() {
            if self.buffer[i] != b'\n' {
                i += 1;
                continue;
            }
            let next = self.buffer.get(i + 1).copied();
            let after = self.buffer.get(i + 2).copied();
            let delimiter_len = match (next, after) {
                (Some(b'\n'), _) => 2,
                (Some(b'\r'), Some(b'\n')) => 3,
                // Boundary may still be completed by the next chunk.
                (None, _) | (Some(b'\r'), None) => break,
                _ => {
                    i += 1;
                    continue;
                }
            };

            let raw = String::from_utf8_lossy(&self.buffer[start..i]);
            let frame = Frame::parse(&raw);
            if !frame.is_empty() {
                frames.push(frame);
            }
            start = i + delimiter_len;
            i = start;
        }

        self.buffer.drain(..start);
        self.scanned = i - start;
        frames
    }

    /// End of stream. A trailing partial frame is discarded, never emitted.
    pub fn finish(self) {
        if !self.buffer.is_empty() {
            tracing::debug!(
                "Dropping {} byte(s) of incomplete frame at end of stream",
                self.buffer.len()
            );
        }
    }
}
