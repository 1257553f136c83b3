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
    fs::{File, OpenOptions},
    io,
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
};

use log::debug;

use super::grow::ONE_MB;

pub const DEFAULT_INITIAL_LEN: usize = ONE_MB;

const TEMP_FILE_PREFIX: &str = "growmap";
const FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    /// Changes are visible to other mappers and written back to the file.
    Shared,
    /// Copy-on-write, changes never reach the file.
    Private,
}

/// Supplies everything a `MappedBuffer` needs to (re)map its backing file.
///
/// `open()` is called again on every remap, so a handle is never kept
/// across growth.
pub trait Opener: Send {
    /// One-time preparation, invoked before the first `open()`.
    fn prepare(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn open(&self) -> io::Result<File>;

    /// Byte offset into the file where the mapping begins.
    fn offset(&self) -> u64 {
        0
    }

    fn initial_size(&self) -> usize;

    fn protection(&self) -> Protection;

    fn sharing(&self) -> Sharing;

    fn path(&self) -> Option<&Path> {
        None
    }
}

trait RewriteError {
    fn rewrite_err(self, err_msg: String) -> Self;
}

impl<T> RewriteError for io::Result<T> {
    #[inline]
    fn rewrite_err(self, err_msg: String) -> Self {
        self.map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("{}, {}", err_msg, e.to_string().to_lowercase()),
            )
        })
    }
}

/// File based opener.
///
/// Without a path, `prepare()` creates a temp file which is kept after the
/// buffer is closed. Without an initial length, the current file size is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapOptions {
    path: Option<PathBuf>,
    initial_len: Option<usize>,
    protection: Protection,
    sharing: Sharing,
}

impl MapOptions {
    pub fn read_only<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            initial_len: None,
            protection: Protection::ReadOnly,
            sharing: Sharing::Shared,
        }
    }

    pub fn read_write<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            initial_len: None,
            protection: Protection::ReadWrite,
            sharing: Sharing::Shared,
        }
    }

    pub fn temporary() -> Self {
        Self {
            path: None,
            initial_len: None,
            protection: Protection::ReadWrite,
            sharing: Sharing::Shared,
        }
    }

    /// Zero means "use the current file size".
    pub fn initial_len(mut self, len: usize) -> Self {
        self.initial_len = Some(len).filter(|&len| len > 0);
        self
    }

    pub fn private(mut self, private: bool) -> Self {
        self.sharing = if private {
            Sharing::Private
        } else {
            Sharing::Shared
        };
        self
    }

    fn create_temp_file() -> io::Result<PathBuf> {
        let temp_file = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .tempfile()
            .rewrite_err(String::from("Cannot create temp file"))?;

        temp_file.into_temp_path().keep().map_err(|e| e.error)
    }
}

impl Opener for MapOptions {
    fn prepare(&mut self) -> io::Result<()> {
        if self.path.is_none() {
            let file_path = Self::create_temp_file()?;
            debug!("Created temp file {}", file_path.display());

            self.path = Some(file_path);
            if self.protection == Protection::ReadWrite {
                self.initial_len = Some(DEFAULT_INITIAL_LEN);
            }
        }

        if let (None, Some(file_path)) = (self.initial_len, &self.path) {
            let file_len = std::fs::metadata(file_path)
                .rewrite_err(format!("Cannot access {}", file_path.display()))?
                .len();
            let initial_len = usize::try_from(file_len).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("File {} is too large to map", file_path.display()),
                )
            })?;
            self.initial_len = Some(initial_len);
        }

        Ok(())
    }

    fn open(&self) -> io::Result<File> {
        let file_path = self.path.as_deref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Mapping file is not specified")
        })?;

        let result = match self.protection {
            Protection::ReadOnly => File::open(file_path),
            Protection::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .mode(FILE_MODE)
                .open(file_path),
        };
        result.rewrite_err(format!("Cannot open {}", file_path.display()))
    }

    fn initial_size(&self) -> usize {
        self.initial_len.unwrap_or_default()
    }

    fn protection(&self) -> Protection {
        self.protection
    }

    fn sharing(&self) -> Sharing {
        self.sharing
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
