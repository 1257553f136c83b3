// SPDX-License-Identifier: Mulan PSL v2
/*
 * Copyright (c) 2024 Huawei Technologies Co., Ltd.
 * growmap is licensed under Mulan PSL v2.
 * You can use this software according to the terms and conditions of the Mulan PSL v2.
 * You may obtain a copy of Mulan PSL v2 at:
 *         http://license.coscl.org.cn/MulanPSL2
 *
 * THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
 * EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
 * MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
 * See the Mulan PSL v2 for more details.
 */

use std::{
    convert::TryFrom,
    io::{self, Read, Write},
};

use super::{error::Result, mmap::MappedBuffer};

/// Outcome of a read or a transfer.
///
/// `eof` is set when fewer bytes than requested were available. A short
/// read is not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transfer {
    pub len: usize,
    pub eof: bool,
}

impl Transfer {
    #[inline]
    fn new(len: usize, requested: usize) -> Self {
        Self {
            len,
            eof: len < requested,
        }
    }

    #[inline]
    fn end_of_data() -> Self {
        Self { len: 0, eof: true }
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }
}

impl MappedBuffer {
    /// Returns the mapped bytes in `[offset, offset + len)` clamped to the
    /// capacity, or `None` if `offset` is beyond the capacity.
    fn clamped(&self, offset: u64, len: usize) -> Result<Option<&[u8]>> {
        let data = self.data()?;
        let start = match usize::try_from(offset) {
            Ok(start) if start <= data.len() => start,
            _ => return Ok(None),
        };
        let end = start + len.min(data.len() - start);

        Ok(Some(&data[start..end]))
    }

    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<Transfer> {
        let src = match self.clamped(offset, buf.len())? {
            Some(src) => src,
            None => return Ok(Transfer::end_of_data()),
        };
        buf[..src.len()].copy_from_slice(src);

        Ok(Transfer::new(src.len(), buf.len()))
    }

    /// Copies up to `len` bytes at `offset` into a new vector, trimmed to
    /// the bytes actually available.
    pub fn bytes(&self, offset: u64, len: usize) -> Result<(Vec<u8>, Transfer)> {
        match self.clamped(offset, len)? {
            Some(src) => Ok((src.to_vec(), Transfer::new(src.len(), len))),
            None => Ok((Vec::new(), Transfer::end_of_data())),
        }
    }

    /// Streams the whole mapped region into `sink`.
    pub fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> Result<Transfer> {
        self.write_range_to(0, sink)
    }

    /// Streams the mapped region from `offset` to the end into `sink`.
    /// Reports `eof` when no bytes remain at `offset`.
    pub fn write_range_to<W: Write + ?Sized>(&self, offset: u64, sink: &mut W) -> Result<Transfer> {
        let src = match self.clamped(offset, usize::MAX)? {
            Some(src) => src,
            None => return Ok(Transfer::end_of_data()),
        };
        sink.write_all(src)?;

        Ok(Transfer {
            len: src.len(),
            eof: src.is_empty(),
        })
    }

    pub fn reader_at(&self, offset: u64) -> ReaderAt<'_> {
        ReaderAt {
            buffer: self,
            position: offset,
        }
    }
}

/// Sequential reader over a `MappedBuffer`, starting at a fixed offset.
#[derive(Debug)]
pub struct ReaderAt<'a> {
    buffer: &'a MappedBuffer,
    position: u64,
}

impl ReaderAt<'_> {
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads at the cursor and advances it by the bytes read.
    pub fn read_next(&mut self, buf: &mut [u8]) -> Result<Transfer> {
        let transfer = self.buffer.read_at(buf, self.position)?;
        self.position += transfer.len as u64;

        Ok(transfer)
    }
}

impl Read for ReaderAt<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_next(buf)?.len)
    }
}
