//! Bounded binary cursor over a FIT byte source
//!
//! [`StreamReader`] wraps any [`Read`] implementation (an in-memory cursor or a buffered
//! file) and hands out fixed-width integers and byte runs. Every read is checked against the
//! declared source length first, so running out of bytes is reported as
//! [`ReplayError::TruncatedStream`] with the exact offset instead of a generic I/O failure.
//!
//! Every byte that passes through the reader, including skipped ones, is folded into the
//! running FIT checksum so the decoder can verify the trailing CRC without a second pass.

use super::crc::Crc16;
use crate::{ReplayError, Result};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Byte order of a multi-byte field, declared per definition record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

/// Checked reader with position and CRC accounting
pub struct StreamReader<R> {
    inner: R,
    position: u64,
    len: u64,
    crc: Crc16,
    source: PathBuf,
}

impl<R: Read> StreamReader<R> {
    /// Create a reader over `len` bytes of `inner`.
    pub fn new(inner: R, len: u64) -> Self {
        Self { inner, position: 0, len, crc: Crc16::new(), source: PathBuf::from("<memory>") }
    }

    /// Attach the source path used in I/O error context.
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes left before the declared end of the source.
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.position)
    }

    /// Checksum of every byte consumed so far.
    pub fn crc(&self) -> u16 {
        self.crc.value()
    }

    /// Restart the running checksum. Each chained FIT file is checksummed on its own.
    pub fn reset_crc(&mut self) {
        self.crc = Crc16::new();
    }

    fn ensure_available(&self, needed: u64) -> Result<()> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(ReplayError::TruncatedStream { offset: self.position, needed, remaining });
        }
        Ok(())
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let needed = buf.len() as u64;
        self.ensure_available(needed)?;
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            // The source was shorter than its declared length.
            ErrorKind::UnexpectedEof => {
                ReplayError::TruncatedStream { offset: self.position, needed, remaining: 0 }
            }
            _ => ReplayError::file_error(self.source.clone(), e),
        })?;
        self.crc.update_slice(buf);
        self.position += needed;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.fill(&mut byte)?;
        Ok(byte[0])
    }

    /// Read an unsigned integer of `n` bytes (1..=8).
    pub fn read_uint(&mut self, n: usize, endian: Endian) -> Result<u64> {
        debug_assert!((1..=8).contains(&n), "integer width {n} out of range");
        let mut buf = [0u8; 8];
        let bytes = &mut buf[..n];
        self.fill(bytes)?;
        let value = match endian {
            Endian::Little => bytes.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64),
            Endian::Big => bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
        };
        Ok(value)
    }

    /// Read a two's-complement signed integer of `n` bytes (1..=8).
    pub fn read_int(&mut self, n: usize, endian: Endian) -> Result<i64> {
        let raw = self.read_uint(n, endian)?;
        let shift = 64 - (n as u32 * 8);
        Ok(((raw << shift) as i64) >> shift)
    }

    pub fn read_u16(&mut self, endian: Endian) -> Result<u16> {
        Ok(self.read_uint(2, endian)? as u16)
    }

    pub fn read_u32(&mut self, endian: Endian) -> Result<u32> {
        Ok(self.read_uint(4, endian)? as u32)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Consume `n` bytes without interpreting them. Skipped bytes still count towards the CRC.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.ensure_available(n)?;
        let mut scratch = [0u8; 256];
        let mut left = n;
        while left > 0 {
            let chunk = left.min(scratch.len() as u64) as usize;
            self.fill(&mut scratch[..chunk])?;
            left -= chunk as u64;
        }
        Ok(())
    }
}

/// Open a file for buffered reading and report its length.
pub fn open_file(path: &Path) -> Result<(BufReader<File>, u64)> {
    let file = File::open(path).map_err(|e| ReplayError::file_error(path.to_path_buf(), e))?;
    let len = file.metadata().map_err(|e| ReplayError::file_error(path.to_path_buf(), e))?.len();
    Ok((BufReader::new(file), len))
}
