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

use anyhow::{Context, Result};
use flexi_logger::{LevelFilter, LogSpecification, Logger, WriteMode};
use log::debug;

mod args;
mod command;

use self::args::Arguments;

pub const CLI_NAME: &str = "growmap";
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CLI_ABOUT: &str = env!("CARGO_PKG_DESCRIPTION");

fn main() -> Result<()> {
    let args = Arguments::new()?;

    // Dumped content goes to stdout, so log to stderr
    let max_log_level = if args.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    let log_spec = LogSpecification::builder().default(max_log_level).build();
    let _ = Logger::with(log_spec)
        .log_to_stderr()
        .format(|w, _, record| write!(w, "{}", record.args()))
        .write_mode(WriteMode::Direct)
        .start()
        .context("Failed to initialize logger")?;

    debug!("===================================");
    debug!("{}", CLI_ABOUT);
    debug!("Version: {}", CLI_VERSION);
    debug!("===================================");
    debug!("{:#?}", args);

    command::execute(&args)
}
