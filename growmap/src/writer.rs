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
    io::{self, Write},
};

use super::{
    error::{Error, Result},
    mmap::MappedBuffer,
};

#[inline]
fn range_of(offset: u64, len: usize) -> Result<(usize, usize)> {
    let start = usize::try_from(offset).map_err(|_| Error::Overflow)?;
    let end = start.checked_add(len).ok_or(Error::Overflow)?;

    Ok((start, end))
}

impl MappedBuffer {
    /// Writes all of `buf` at `offset`, growing the buffer first if needed.
    ///
    /// Either the whole buffer is written or nothing is.
    pub fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        self.check_writable()?;

        let (start, end) = range_of(offset, buf.len())?;
        self.ensure_capacity(end)?;
        self.data_mut()?[start..end].copy_from_slice(buf);

        Ok(buf.len())
    }

    /// Moves `len` bytes from `src` to `dst` with memmove semantics.
    ///
    /// The source range must lie within the current capacity, the
    /// destination may extend beyond it and grows the buffer.
    pub fn copy(&mut self, src: u64, dst: u64, len: usize) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if src == dst {
            return Ok(());
        }

        let (src_start, src_end) = range_of(src, len)?;
        if src_end > self.capacity() {
            return Err(Error::Overflow);
        }
        self.check_writable()?;

        let (dst_start, dst_end) = range_of(dst, len)?;
        self.ensure_capacity(dst_end)?;
        self.data_mut()?.copy_within(src_start..src_end, dst_start);

        Ok(())
    }

    pub fn writer_at(&mut self, offset: u64) -> WriterAt<'_> {
        WriterAt {
            buffer: self,
            position: offset,
        }
    }
}

/// Sequential writer over a `MappedBuffer`, starting at a fixed offset.
/// Writing past the end grows the buffer.
#[derive(Debug)]
pub struct WriterAt<'a> {
    buffer: &'a mut MappedBuffer,
    position: u64,
}

impl WriterAt<'_> {
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<usize> {
        let len = self.buffer.write_at(buf, self.position)?;
        self.position += len as u64;

        Ok(len)
    }

    pub fn write_str(&mut self, s: &str) -> Result<usize> {
        self.write_bytes(s.as_bytes())
    }
}

impl Write for WriterAt<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_bytes(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.buffer.flush()?)
    }
}
