// SPDX-License-Identifier: Mulan PSL v2
/*
 * Copyright (c) 2024 Huawei Technologies Co., Ltd.
 * growmap-cli is licensed under Mulan PSL v2.
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
    io::{self, Write},
    path::Path,
};

use anyhow::{Context, Result};
use log::{debug, info};

use growmap::{MapOptions, MappedBuffer, Transfer};

use super::args::{Arguments, SubCommand};

fn open_buffer(file: &Path, writable: bool, private: bool) -> Result<MappedBuffer> {
    let options = if writable {
        MapOptions::read_write(file)
    } else {
        MapOptions::read_only(file)
    };

    MappedBuffer::open(options.private(private))
        .with_context(|| format!("Failed to map {}", file.display()))
}

fn close_buffer(mut buffer: MappedBuffer, file: &Path) -> Result<()> {
    buffer
        .close()
        .with_context(|| format!("Failed to close {}", file.display()))
}

fn report_growth(old_capacity: usize, buffer: &MappedBuffer) {
    if buffer.capacity() > old_capacity {
        info!(
            "Grew from {} to {} bytes",
            old_capacity,
            buffer.capacity()
        );
    }
}

fn show_info(file: &Path, private: bool) -> Result<()> {
    let buffer = open_buffer(file, false, private)?;

    info!("File:       {}", file.display());
    info!("Capacity:   {} bytes", buffer.capacity());
    info!("Protection: {:?}", buffer.protection());
    info!("Sharing:    {:?}", buffer.sharing());

    close_buffer(buffer, file)
}

fn dump<W: Write>(
    file: &Path,
    offset: u64,
    length: Option<usize>,
    private: bool,
    sink: &mut W,
) -> Result<Transfer> {
    let buffer = open_buffer(file, false, private)?;

    let transfer = match length {
        Some(len) => {
            let (data, transfer) = buffer
                .bytes(offset, len)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            sink.write_all(&data).context("Failed to write output")?;
            transfer
        }
        None => buffer
            .write_range_to(offset, sink)
            .with_context(|| format!("Failed to dump {}", file.display()))?,
    };
    sink.flush().context("Failed to flush output")?;

    if transfer.is_eof() {
        debug!("Reached end of data after {} bytes", transfer.len);
    }
    close_buffer(buffer, file)?;

    Ok(transfer)
}

fn write_text(file: &Path, offset: u64, text: &str, private: bool) -> Result<()> {
    let mut buffer = open_buffer(file, true, private)?;
    let old_capacity = buffer.capacity();

    let len = buffer
        .writer_at(offset)
        .write_str(text)
        .with_context(|| format!("Failed to write {}", file.display()))?;
    info!("Wrote {} bytes at offset {}", len, offset);
    report_growth(old_capacity, &buffer);

    close_buffer(buffer, file)
}

fn copy_range(file: &Path, from: u64, to: u64, length: usize, private: bool) -> Result<()> {
    let mut buffer = open_buffer(file, true, private)?;
    let old_capacity = buffer.capacity();

    buffer
        .copy(from, to, length)
        .with_context(|| format!("Failed to copy {} bytes from {} to {}", length, from, to))?;
    info!("Copied {} bytes from offset {} to {}", length, from, to);
    report_growth(old_capacity, &buffer);

    close_buffer(buffer, file)
}

fn grow(file: &Path, size: usize, private: bool) -> Result<()> {
    let mut buffer = open_buffer(file, true, private)?;
    let old_capacity = buffer.capacity();

    buffer
        .ensure_capacity(size)
        .with_context(|| format!("Failed to grow {} to {} bytes", file.display(), size))?;
    report_growth(old_capacity, &buffer);

    close_buffer(buffer, file)
}

pub fn execute(args: &Arguments) -> Result<()> {
    debug!("Executing on {}", args.subcommand.file().display());

    match &args.subcommand {
        SubCommand::Info { file } => self::show_info(file, args.private),
        SubCommand::Dump {
            file,
            offset,
            length,
        } => {
            let stdout = io::stdout();
            let mut sink = stdout.lock();
            self::dump(file, *offset, *length, args.private, &mut sink).map(|_| ())
        }
        SubCommand::Write { file, offset, text } => {
            self::write_text(file, *offset, text, args.private)
        }
        SubCommand::Copy {
            file,
            from,
            to,
            length,
        } => self::copy_range(file, *from, *to, *length, args.private),
        SubCommand::Grow { file, size } => self::grow(file, *size, args.private),
    }
}
