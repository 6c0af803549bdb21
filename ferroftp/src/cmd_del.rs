/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use clap::{Arg, ArgMatches, Command};

use ferroftp_client::{FtpConnectionProvider, FtpSession};

pub(super) const COMMAND: &str = "del";

const COMMAND_ARG_PATH: &str = "path";

pub(super) fn command() -> Command {
    Command::new(COMMAND).about("Delete file").arg(
        Arg::new(COMMAND_ARG_PATH)
            .value_name("FILE PATH")
            .num_args(1)
            .required(true),
    )
}

pub(super) async fn run<CP>(
    session: &mut FtpSession<CP>,
    args: &ArgMatches,
) -> anyhow::Result<()>
where
    CP: FtpConnectionProvider,
{
    if let Some(path) = args.get_one::<String>(COMMAND_ARG_PATH) {
        session.delete_file(path).await?;
    }
    Ok(())
}
