//! Chunked line reader
//!
//! Reads a [`ByteSource`] in fixed-size slices and cuts complete lines out
//! of them. Bytes after the last newline of a slice stay in a residue buffer
//! and are joined with the next slice, so lines may span any number of
//! slices. A final line without a terminator is emitted at end of data.

use std::collections::VecDeque;

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::error::EngineError;
use crate::line::RawLine;
use crate::source::ByteSource;

pub struct ChunkedReader<S> {
    source: S,
    name: String,
    size: u64,
    chunk_size: usize,
    read_offset: u64,
    residue: BytesMut,
    residue_start: u64,
    /// Residue bytes already known to hold no newline
    scan_from: usize,
    lines: VecDeque<RawLine>,
    next_number: u64,
    eof: bool,
}

impl<S: ByteSource> ChunkedReader<S> {
    pub fn new(source: S, name: impl Into<String>, size: u64, chunk_size: usize) -> Self {
        Self {
            source,
            name: name.into(),
            size,
            chunk_size: chunk_size.max(1),
            read_offset: 0,
            residue: BytesMut::new(),
            residue_start: 0,
            scan_from: 0,
            lines: VecDeque::new(),
            next_number: 1,
            eof: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes read from the source so far.
    pub fn read_offset(&self) -> u64 {
        self.read_offset
    }

    /// All data read and every line handed out.
    pub fn is_eof(&self) -> bool {
        self.eof && self.lines.is_empty()
    }

    /// Next buffered line, without reading.
    pub fn pop_line(&mut self) -> Option<RawLine> {
        self.lines.pop_front()
    }

    /// Reads one slice and splits it. Returns the number of bytes read;
    /// zero once the source is exhausted.
    pub async fn fill(&mut self) -> Result<usize, EngineError> {
        if self.eof {
            return Ok(0);
        }

        let remaining = self.size.saturating_sub(self.read_offset);
        let want = usize::try_from(remaining)
            .unwrap_or(usize::MAX)
            .min(self.chunk_size);
        if want == 0 {
            self.finish();
            return Ok(0);
        }

        let bytes = self
            .source
            .read_at(self.read_offset, want)
            .await
            .map_err(|source| EngineError::Read {
                file: self.name.clone(),
                source,
            })?;
        if bytes.is_empty() {
            self.finish();
            return Ok(0);
        }

        trace!(file = %self.name, offset = self.read_offset, len = bytes.len(), "slice read");
        self.read_offset += bytes.len() as u64;
        self.residue.extend_from_slice(&bytes);
        self.split_lines();
        Ok(bytes.len())
    }

    /// Next line, reading more slices as needed.
    pub async fn next_line(&mut self) -> Result<Option<RawLine>, EngineError> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(None);
            }
            self.fill().await?;
        }
    }

    fn split_lines(&mut self) {
        let newlines: Vec<usize> = memchr::memchr_iter(b'\n', &self.residue[self.scan_from..])
            .map(|i| i + self.scan_from)
            .collect();
        let mut consumed = 0;
        for newline in newlines {
            self.push_line(consumed, newline);
            consumed = newline + 1;
        }
        if consumed > 0 {
            self.residue.advance(consumed);
            self.residue_start += consumed as u64;
        }
        self.scan_from = self.residue.len();
    }

    fn push_line(&mut self, start: usize, end: usize) {
        let mut end = end;
        if end > start && self.residue[end - 1] == b'\r' {
            end -= 1;
        }
        let text = String::from_utf8_lossy(&self.residue[start..end]).into_owned();
        self.lines.push_back(RawLine {
            text,
            offset: self.residue_start + start as u64..self.residue_start + end as u64,
            number: self.next_number,
        });
        self.next_number += 1;
    }

    fn finish(&mut self) {
        self.eof = true;
        if !self.residue.is_empty() {
            let len = self.residue.len();
            self.push_line(0, len);
            self.residue_start += len as u64;
            self.residue.clear();
        }
        self.scan_from = 0;
    }
}
