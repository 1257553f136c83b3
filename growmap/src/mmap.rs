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

use std::{convert::TryFrom, fmt, io, os::unix::io::AsRawFd};

use log::{debug, trace, warn};
use memmap2::{Mmap, MmapMut, MmapOptions};
use nix::{libc::off_t, unistd};

use super::{
    error::{Error, Result},
    grow::{default_growth_policy, GrowthPolicy},
    options::{Opener, Protection, Sharing},
};

enum Region {
    ReadOnly(Mmap),
    Shared(MmapMut),
    Private(MmapMut),
}

impl Region {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::ReadOnly(mmap) => &mmap[..],
            Self::Shared(mmap) | Self::Private(mmap) => &mmap[..],
        }
    }

    fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self {
            Self::ReadOnly(_) => None,
            Self::Shared(mmap) | Self::Private(mmap) => Some(&mut mmap[..]),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self {
            Self::Shared(mmap) => mmap.flush(),
            _ => Ok(()),
        }
    }
}

/// A byte buffer backed by a memory mapped file, which grows the file and
/// remaps it when a write goes beyond the current capacity.
///
/// Once closed, explicitly or by a failed remap, every operation fails with
/// [`Error::Closed`]. Methods that may remap take `&mut self`, so no slice
/// or reader into the old region can survive a remap.
pub struct MappedBuffer {
    opener: Box<dyn Opener>,
    policy: Box<dyn GrowthPolicy>,
    region: Option<Region>,
    capacity: usize,
}

impl MappedBuffer {
    pub fn open<O: Opener + 'static>(mut opener: O) -> Result<Self> {
        opener.prepare()?;

        let initial_size = opener.initial_size();
        let mut buffer = Self {
            opener: Box::new(opener),
            policy: Box::new(default_growth_policy),
            region: None,
            capacity: 0,
        };
        buffer.remap(initial_size)?;
        debug!(
            "Mapped {} ({} bytes, {:?}, {:?})",
            buffer.display_name(),
            buffer.capacity,
            buffer.protection(),
            buffer.sharing()
        );

        Ok(buffer)
    }

    fn display_name(&self) -> String {
        match self.opener.path() {
            Some(file_path) => format!("'{}'", file_path.display()),
            None => String::from("<anonymous>"),
        }
    }

    fn map(&self, len: usize) -> Result<Region> {
        let file = self.opener.open()?;
        let offset = self.opener.offset();

        let file_len = offset.checked_add(len as u64).ok_or(Error::Overflow)?;
        let curr_len = file.metadata()?.len();
        if curr_len < file_len {
            trace!(
                "Truncating {} from {} to {} bytes",
                self.display_name(),
                curr_len,
                file_len
            );
            let file_len = off_t::try_from(file_len).map_err(|_| Error::Overflow)?;
            unistd::ftruncate(file.as_raw_fd(), file_len)?;
        }

        let mut options = MmapOptions::new();
        options.offset(offset).len(len);

        /*
         * SAFETY:
         * All file-backed memory map constructors are marked unsafe because of the
         * potential for Undefined Behavior (UB) using the map if the underlying file
         * is subsequently modified, in or out of process.
         * The region is owned by this buffer only and is never handed out beyond a
         * borrow of the buffer itself. The file was extended to cover the whole range
         * above, so no access past its end is possible.
         */
        let region = unsafe {
            match (self.opener.protection(), self.opener.sharing()) {
                (Protection::ReadOnly, Sharing::Shared) => Region::ReadOnly(options.map(&file)?),
                (Protection::ReadOnly, Sharing::Private) => {
                    Region::ReadOnly(options.map_copy_read_only(&file)?)
                }
                (Protection::ReadWrite, Sharing::Shared) => Region::Shared(options.map_mut(&file)?),
                (Protection::ReadWrite, Sharing::Private) => {
                    Region::Private(options.map_copy(&file)?)
                }
            }
        };

        Ok(region)
    }

    /// Releases the current region before mapping a new one. On failure the
    /// buffer stays closed.
    ///
    /// A private region only lives in memory, so its bytes are held until the
    /// new region is mapped and then copied over.
    fn remap(&mut self, len: usize) -> Result<()> {
        let pending = match self.region.take() {
            Some(Region::Private(mmap)) => Some(mmap),
            _ => None,
        };

        let mut region = self.map(len)?;
        if let (Some(old), Some(new)) = (pending, region.as_mut_slice()) {
            let n = old.len().min(new.len());
            new[..n].copy_from_slice(&old[..n]);
        }
        self.region = Some(region);
        self.capacity = len;

        Ok(())
    }

    pub(crate) fn data(&self) -> Result<&[u8]> {
        self.region
            .as_ref()
            .map(Region::as_slice)
            .ok_or(Error::Closed)
    }

    pub(crate) fn data_mut(&mut self) -> Result<&mut [u8]> {
        self.region
            .as_mut()
            .ok_or(Error::Closed)?
            .as_mut_slice()
            .ok_or(Error::ReadOnly)
    }

    pub(crate) fn check_writable(&self) -> Result<()> {
        match self.region {
            None => Err(Error::Closed),
            Some(Region::ReadOnly(_)) => Err(Error::ReadOnly),
            Some(_) => Ok(()),
        }
    }

    /// Current length of the mapped region in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.region.is_none()
    }

    pub fn protection(&self) -> Protection {
        self.opener.protection()
    }

    pub fn sharing(&self) -> Sharing {
        self.opener.sharing()
    }

    pub fn opener(&self) -> &dyn Opener {
        self.opener.as_ref()
    }

    pub fn change_growth_policy<P: GrowthPolicy + 'static>(&mut self, policy: P) {
        self.policy = Box::new(policy);
    }

    /// Grows the buffer so that it holds at least `at_least` bytes.
    ///
    /// If the backing file cannot be extended or remapped, the buffer is
    /// closed and the error is returned.
    pub fn ensure_capacity(&mut self, at_least: usize) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let capacity = self.capacity;
        if at_least <= capacity {
            return Ok(());
        }
        self.check_writable()?;

        let next = self.policy.next(capacity, at_least).max(at_least);
        debug!(
            "Growing {} from {} to {} bytes",
            self.display_name(),
            capacity,
            next
        );
        self.remap(next).map_err(|e| {
            warn!("Failed to grow {}, {}", self.display_name(), e);
            e
        })
    }

    /// Writes dirty pages of a shared writable mapping back to the file.
    pub fn flush(&self) -> Result<()> {
        self.region
            .as_ref()
            .ok_or(Error::Closed)?
            .flush()
            .map_err(Error::from)
    }

    /// Flushes and unmaps the region. Closing twice is fine.
    pub fn close(&mut self) -> Result<()> {
        match self.region.take() {
            Some(region) => {
                debug!("Unmapping {}", self.display_name());
                region.flush().map_err(Error::from)
            }
            None => Ok(()),
        }
    }
}

impl fmt::Debug for MappedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedBuffer")
            .field("path", &self.opener.path())
            .field("offset", &self.opener.offset())
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::{
        fs::{self, File},
        io,
        path::{Path, PathBuf},
    };

    use anyhow::Result;

    use super::*;
    use crate::{
        grow::ONE_MB,
        options::{MapOptions, DEFAULT_INITIAL_LEN},
        testing::{self, HELLO_WORLD},
    };

    #[test]
    fn open_read_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut buffer = testing::open_hello_world(&dir, false)?;

        assert_eq!(buffer.capacity(), HELLO_WORLD.len());
        assert_eq!(buffer.data()?, HELLO_WORLD.as_bytes());
        assert_eq!(buffer.protection(), Protection::ReadOnly);
        assert!(!buffer.is_closed());

        buffer.close()?;
        Ok(())
    }

    #[test]
    fn open_empty_read_write() -> Result<()> {
        let mut buffer = MappedBuffer::open(MapOptions::temporary())?;
        let file_path = buffer
            .opener()
            .path()
            .map(Path::to_path_buf)
            .expect("No temp path");

        assert_eq!(buffer.capacity(), DEFAULT_INITIAL_LEN);
        assert_eq!(buffer.data()?, vec![0; DEFAULT_INITIAL_LEN].as_slice());
        assert_eq!(fs::metadata(&file_path)?.len(), DEFAULT_INITIAL_LEN as u64);

        assert_eq!(buffer.write_at(HELLO_WORLD.as_bytes(), 8)?, HELLO_WORLD.len());
        assert_eq!(buffer.capacity(), DEFAULT_INITIAL_LEN);

        let mut expect = vec![0; DEFAULT_INITIAL_LEN];
        expect[8..8 + HELLO_WORLD.len()].copy_from_slice(HELLO_WORLD.as_bytes());
        assert_eq!(buffer.data()?, expect.as_slice());

        buffer.close()?;
        assert_eq!(fs::read(&file_path)?, expect);

        fs::remove_file(file_path)?;
        Ok(())
    }

    #[test]
    fn write_grows_read_write() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file_path = testing::hello_world_file(&dir)?;
        let mut buffer = MappedBuffer::open(MapOptions::read_write(&file_path))?;

        assert_eq!(buffer.capacity(), HELLO_WORLD.len());
        assert_eq!(fs::metadata(&file_path)?.len(), HELLO_WORLD.len() as u64);

        let n = buffer.write_at(HELLO_WORLD.as_bytes(), HELLO_WORLD.len() as u64)?;
        assert_eq!(n, HELLO_WORLD.len());
        assert_eq!(buffer.capacity(), ONE_MB);

        let mut expect = vec![0; ONE_MB];
        expect[..12].copy_from_slice(HELLO_WORLD.as_bytes());
        expect[12..24].copy_from_slice(HELLO_WORLD.as_bytes());
        assert_eq!(buffer.data()?, expect.as_slice());

        buffer.close()?;
        assert_eq!(fs::read(&file_path)?, expect);

        Ok(())
    }

    #[test]
    fn open_non_exists_file() {
        for options in [
            MapOptions::read_only("/path/to/not-exist").initial_len(1),
            MapOptions::read_write("/path/to/not-exist").initial_len(1),
        ] {
            let err = MappedBuffer::open(options).expect_err("Open should fail");
            assert!(err.is_not_found());
        }
    }

    #[test]
    fn close_twice() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut buffer = testing::open_hello_world(&dir, true)?;

        buffer.close()?;
        assert!(buffer.is_closed());
        buffer.close()?;
        assert!(buffer.is_closed());
        assert_eq!(buffer.capacity(), HELLO_WORLD.len());

        Ok(())
    }

    #[test]
    fn grow_after_close() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut buffer = testing::open_hello_world(&dir, true)?;
        buffer.close()?;

        assert!(buffer.ensure_capacity(1024).unwrap_err().is_closed());
        assert!(buffer.flush().unwrap_err().is_closed());
        assert!(buffer.is_closed());

        Ok(())
    }

    #[test]
    fn ensure_capacity_is_idempotent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut buffer = testing::open_hello_world(&dir, true)?;

        buffer.ensure_capacity(0)?;
        buffer.ensure_capacity(HELLO_WORLD.len())?;
        assert_eq!(buffer.capacity(), HELLO_WORLD.len());

        buffer.ensure_capacity(HELLO_WORLD.len() + 1)?;
        assert_eq!(buffer.capacity(), ONE_MB);
        buffer.ensure_capacity(ONE_MB)?;
        assert_eq!(buffer.capacity(), ONE_MB);

        Ok(())
    }

    #[test]
    fn delete_file_before_grow() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut buffer = testing::open_hello_world(&dir, true)?;

        fs::remove_dir_all(dir.path())?;

        let err = buffer.write_at(&[6], 128).expect_err("Write should fail");
        assert!(err.is_not_found());
        assert!(buffer.is_closed());
        assert!(buffer.write_at(&[6], 0).unwrap_err().is_closed());

        Ok(())
    }

    #[test]
    fn custom_growth_policy() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file_path = testing::hello_world_file(&dir)?;
        let mut buffer = MappedBuffer::open(MapOptions::read_write(&file_path))?;

        buffer.change_growth_policy(|_current: usize, at_least: usize| at_least);
        buffer.write_at(b"!!", 12)?;
        assert_eq!(buffer.capacity(), 14);
        assert_eq!(fs::metadata(&file_path)?.len(), 14);

        buffer.change_growth_policy(|_current: usize, _at_least: usize| 0);
        buffer.write_at(b"?", 14)?;
        assert_eq!(buffer.capacity(), 15);

        Ok(())
    }

    #[test]
    fn read_only_cannot_grow() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut buffer = testing::open_hello_world(&dir, false)?;

        buffer.ensure_capacity(HELLO_WORLD.len())?;
        assert!(matches!(buffer.ensure_capacity(1024), Err(Error::ReadOnly)));
        assert!(!buffer.is_closed());
        assert_eq!(buffer.capacity(), HELLO_WORLD.len());

        Ok(())
    }

    #[test]
    fn private_mapping_is_not_persisted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file_path = testing::hello_world_file(&dir)?;
        let mut buffer = MappedBuffer::open(MapOptions::read_write(&file_path).private(true))?;

        buffer.write_at(b"J", 0)?;
        assert_eq!(&buffer.data()?[..5], b"Jello");
        buffer.flush()?;
        buffer.close()?;

        assert_eq!(fs::read(&file_path)?, HELLO_WORLD.as_bytes());
        Ok(())
    }

    #[test]
    fn private_mapping_keeps_data_after_grow() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file_path = testing::hello_world_file(&dir)?;
        let mut buffer = MappedBuffer::open(MapOptions::read_write(&file_path).private(true))?;

        buffer.write_at(b"J", 0)?;
        buffer.write_at(b"X", 100)?;
        assert_eq!(buffer.capacity(), ONE_MB);
        assert!(!buffer.is_closed());

        let (data, _) = buffer.bytes(0, 5)?;
        assert_eq!(data, b"Jello");
        assert_eq!(&buffer.data()?[6..12], b"world!");
        assert_eq!(buffer.data()?[100], b'X');
        buffer.close()?;

        let content = fs::read(&file_path)?;
        assert_eq!(&content[..12], HELLO_WORLD.as_bytes());
        assert!(content[12..].iter().all(|&b| b == 0));

        Ok(())
    }

    #[test]
    fn flush_persists() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file_path = testing::hello_world_file(&dir)?;
        let mut buffer = MappedBuffer::open(MapOptions::read_write(&file_path))?;

        buffer.write_at(b"J", 0)?;
        buffer.flush()?;
        assert_eq!(fs::read(&file_path)?, b"Jello world!");

        Ok(())
    }

    struct OffsetOpener {
        file_path: PathBuf,
        offset: u64,
        len: usize,
    }

    impl Opener for OffsetOpener {
        fn open(&self) -> io::Result<File> {
            fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(&self.file_path)
        }

        fn offset(&self) -> u64 {
            self.offset
        }

        fn initial_size(&self) -> usize {
            self.len
        }

        fn protection(&self) -> Protection {
            Protection::ReadWrite
        }

        fn sharing(&self) -> Sharing {
            Sharing::Shared
        }
    }

    #[test]
    fn grow_with_offset() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file_path = testing::hello_world_file(&dir)?;
        let mut buffer = MappedBuffer::open(OffsetOpener {
            file_path: file_path.clone(),
            offset: 6,
            len: 6,
        })?;

        assert_eq!(buffer.data()?, b"world!");
        assert!(buffer.opener().path().is_none());

        buffer.write_at(b"?", 6)?;
        assert_eq!(buffer.capacity(), ONE_MB);
        assert_eq!(fs::metadata(&file_path)?.len(), 6 + ONE_MB as u64);

        buffer.close()?;
        let content = fs::read(&file_path)?;
        assert_eq!(&content[..13], b"Hello world!?");

        Ok(())
    }

    #[test]
    fn debug_output() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let buffer = testing::open_hello_world(&dir, false)?;

        let output = format!("{:?}", buffer);
        assert!(output.contains("capacity: 12"));
        assert!(output.contains("closed: false"));

        Ok(())
    }
}
