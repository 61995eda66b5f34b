//! Positional access to the underlying file
//!
//! The source owns the file handle and its read cursor. Every seek happens
//! through `&mut self`, so callers serialize on whatever lock wraps it.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::index::{scan_line_ends, LineScan};

/// Anything the loader can read rows from
pub trait ByteSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ByteSource for T {}

/// Row byte reader over a seekable source
pub struct RowSource {
    inner: Box<dyn ByteSource>,
}

impl RowSource {
    /// Open a file read-only
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(file))
    }

    /// Wrap an already opened reader
    pub fn from_reader(reader: impl ByteSource + 'static) -> Self {
        Self {
            inner: Box::new(reader),
        }
    }

    /// Scan forward from `start`, collecting the end offset of up to
    /// `max_rows` lines
    pub fn scan(&mut self, start: u64, max_rows: usize) -> io::Result<LineScan> {
        self.inner.seek(SeekFrom::Start(start))?;
        let mut reader = BufReader::new(&mut self.inner);
        scan_line_ends(&mut reader, start, max_rows)
    }

    /// Read the bytes of `[start, end)`
    pub fn read_span(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let len = end.saturating_sub(start) as usize;
        let mut buf = vec![0u8; len];
        if len > 0 {
            self.inner.seek(SeekFrom::Start(start))?;
            self.inner.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    /// Read a single line starting at `start`, terminator included
    ///
    /// Used for the still-open tail, when the row's end offset is unknown.
    pub fn read_line_at(&mut self, start: u64) -> io::Result<Vec<u8>> {
        self.inner.seek(SeekFrom::Start(start))?;
        let mut reader = BufReader::new(&mut self.inner);
        let mut line = Vec::new();
        reader.read_until(b'\n', &mut line)?;
        Ok(line)
    }
}
