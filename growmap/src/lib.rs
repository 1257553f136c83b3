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

//! Growable, file-backed memory mapped buffer.
//!
//! A [`MappedBuffer`] maps a file into memory and transparently extends the
//! file and remaps it when a write or a copy lands beyond the current
//! capacity. How much it grows is decided by a replaceable [`GrowthPolicy`].
//!
//! ```no_run
//! use std::io::Read;
//!
//! use growmap::{MapOptions, MappedBuffer};
//!
//! # fn main() -> growmap::Result<()> {
//! let mut buffer = MappedBuffer::open(MapOptions::read_write("/tmp/growmap.bin"))?;
//! buffer.write_at(b"Hello world!", 1024 * 1024)?;
//!
//! let mut greeting = [0u8; 5];
//! buffer.reader_at(1024 * 1024).read_exact(&mut greeting)?;
//! assert_eq!(&greeting, b"Hello");
//!
//! buffer.close()
//! # }
//! ```

mod error;
mod grow;
mod mmap;
mod options;
mod reader;
mod writer;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use grow::{align_up, default_growth_policy, GrowthPolicy, ONE_GB, ONE_MB, TWO_GB};
pub use mmap::MappedBuffer;
pub use options::{MapOptions, Opener, Protection, Sharing, DEFAULT_INITIAL_LEN};
pub use reader::{ReaderAt, Transfer};
pub use writer::WriterAt;
