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

use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{AppSettings, ColorChoice, Parser, Subcommand};

use super::{CLI_ABOUT, CLI_NAME, CLI_VERSION};

#[derive(Parser, Debug)]
#[clap(
    bin_name = CLI_NAME,
    version = CLI_VERSION,
    about = CLI_ABOUT,
    arg_required_else_help(true),
    color(ColorChoice::Never),
    disable_help_subcommand(true),
    global_setting(AppSettings::DeriveDisplayOrder),
    term_width(120),
)]
pub struct Arguments {
    /// Command name
    #[clap(subcommand)]
    pub subcommand: SubCommand,

    /// Map copy-on-write, changes are never saved to the file
    #[clap(short, long)]
    pub private: bool,

    /// Provide more detailed info
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum SubCommand {
    /// Show mapping info
    Info {
        /// Mapped file
        file: PathBuf,
    },
    /// Dump file content to stdout
    Dump {
        /// Mapped file
        file: PathBuf,
        /// Start offset
        #[clap(short, long, default_value = "0")]
        offset: u64,
        /// Number of bytes, defaults to the rest of the file
        #[clap(short, long)]
        length: Option<usize>,
    },
    /// Write text at an offset, growing the file if needed
    Write {
        /// Mapped file
        file: PathBuf,
        /// Start offset
        #[clap(short, long, default_value = "0")]
        offset: u64,
        /// Text to write
        text: String,
    },
    /// Copy a byte range within the file
    Copy {
        /// Mapped file
        file: PathBuf,
        /// Source offset
        #[clap(long)]
        from: u64,
        /// Destination offset
        #[clap(long)]
        to: u64,
        /// Number of bytes
        #[clap(short, long)]
        length: usize,
    },
    /// Grow the file to hold at least the given size
    Grow {
        /// Mapped file
        file: PathBuf,
        /// Minimum size in bytes
        #[clap(short, long)]
        size: usize,
    },
}

impl SubCommand {
    pub fn file(&self) -> &PathBuf {
        match self {
            Self::Info { file }
            | Self::Dump { file, .. }
            | Self::Write { file, .. }
            | Self::Copy { file, .. }
            | Self::Grow { file, .. } => file,
        }
    }
}

impl Arguments {
    pub fn new() -> Result<Self> {
        Self::parse().check()
    }

    fn check(self) -> Result<Self> {
        if let SubCommand::Info { file } | SubCommand::Dump { file, .. } = &self.subcommand {
            ensure!(file.is_file(), "Cannot find {}", file.display());
        }
        Ok(self)
    }
}
