//! Write-stream reader (C10, ambient).
//!
//! Parses the framed write-event wire format of §6 into [`Write`] values,
//! giving the inspector a simple pull-based iterator to drive the
//! single-threaded loop.

use byteorder::{ByteOrder, LittleEndian};
use std::io::Read;

use crate::error::EngineError;

const SECTOR_SIZE: usize = 512;

/// One hypervisor-level block write: starting sector, sector count, and the
/// raw bytes written.
#[derive(Debug, Clone)]
pub struct Write {
    pub sector_num: i64,
    pub nb_sectors: i32,
    pub data: Vec<u8>,
}

/// Wraps a byte stream of back-to-back `{ sector_num:i64, nb_sectors:i32 }`
/// headers each followed by `nb_sectors * 512` bytes of data.
pub struct WriteReader<R: Read> {
    inner: R,
}

impl<R: Read> WriteReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads the next write record. `Ok(None)` means a clean EOF between
    /// records; a short read inside a record (header or data) is fatal and
    /// reported as [`EngineError::StreamTruncated`].
    pub fn next_write(&mut self) -> Result<Option<Write>, EngineError> {
        let mut header = [0u8; 12];
        let mut filled = 0;
        while filled < header.len() {
            let n = self.inner.read(&mut header[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(EngineError::StreamTruncated(
                    "eof inside write header".to_string(),
                ));
            }
            filled += n;
        }

        let sector_num = LittleEndian::read_i64(&header[0..8]);
        let nb_sectors = LittleEndian::read_i32(&header[8..12]);
        if nb_sectors < 0 {
            return Err(EngineError::StreamTruncated(format!(
                "negative nb_sectors {}",
                nb_sectors
            )));
        }

        let data_len = nb_sectors as usize * SECTOR_SIZE;
        let mut data = vec![0u8; data_len];
        self.inner.read_exact(&mut data).map_err(|_| {
            EngineError::StreamTruncated(format!(
                "eof inside write data, expected {} bytes",
                data_len
            ))
        })?;

        Ok(Some(Write {
            sector_num,
            nb_sectors,
            data,
        }))
    }
}
