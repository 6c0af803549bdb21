/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use clap::{ArgMatches, Command};

use ferroftp_client::{FtpConnectionProvider, FtpSession};

pub(super) const COMMAND: &str = "pwd";

pub(super) fn command() -> Command {
    Command::new(COMMAND).about("Print working directory")
}

pub(super) async fn run<CP>(
    session: &mut FtpSession<CP>,
    _args: &ArgMatches,
) -> anyhow::Result<()>
where
    CP: FtpConnectionProvider,
{
    let path = session.pwd().await?;
    println!("{path}");
    Ok(())
}
