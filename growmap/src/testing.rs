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

use std::{fs, io, path::PathBuf};

use tempfile::TempDir;

use crate::{MapOptions, MappedBuffer};

pub const HELLO_WORLD: &str = "Hello world!";

pub fn hello_world_file(dir: &TempDir) -> io::Result<PathBuf> {
    let file_path = dir.path().join("hello_world");
    fs::write(&file_path, HELLO_WORLD)?;

    Ok(file_path)
}

pub fn open_hello_world(dir: &TempDir, writable: bool) -> anyhow::Result<MappedBuffer> {
    let file_path = hello_world_file(dir)?;
    let options = if writable {
        MapOptions::read_write(file_path)
    } else {
        MapOptions::read_only(file_path)
    };

    Ok(MappedBuffer::open(options)?)
}
