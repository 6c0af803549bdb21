/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use clap::{Arg, ArgMatches, Command};
use tokio::io::AsyncWriteExt;

use ferroftp_client::{FtpConnectionProvider, FtpSession};

pub(super) const COMMAND: &str = "list";

const COMMAND_ARG_PATH: &str = "path";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("List path")
        .arg(Arg::new(COMMAND_ARG_PATH).value_name("PATH").num_args(1))
}

pub(super) async fn run<CP>(
    session: &mut FtpSession<CP>,
    args: &ArgMatches,
) -> anyhow::Result<()>
where
    CP: FtpConnectionProvider,
{
    let path = args.get_one::<String>(COMMAND_ARG_PATH).map(|s| s.as_str());

    let mut stdout = tokio::io::stdout();
    session.list(path, &mut stdout).await?;
    stdout.flush().await?;
    Ok(())
}
