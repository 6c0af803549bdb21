/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::Path;

use anyhow::anyhow;
use clap::{Arg, ArgMatches, Command};
use tokio::fs::File;

use ferroftp_client::{FtpConnectionProvider, FtpSession};

pub(super) const COMMAND: &str = "put";

const COMMAND_ARG_LOCAL: &str = "local";
const COMMAND_ARG_REMOTE: &str = "remote";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("Upload file")
        .arg(
            Arg::new(COMMAND_ARG_LOCAL)
                .value_name("LOCAL PATH")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new(COMMAND_ARG_REMOTE)
                .value_name("REMOTE PATH")
                .num_args(1),
        )
        .arg(super::ascii_arg())
}

pub(super) async fn run<CP>(
    session: &mut FtpSession<CP>,
    args: &ArgMatches,
) -> anyhow::Result<()>
where
    CP: FtpConnectionProvider,
{
    let Some(local) = args.get_one::<String>(COMMAND_ARG_LOCAL) else {
        return Err(anyhow!("no local path set"));
    };
    let remote = match args.get_one::<String>(COMMAND_ARG_REMOTE) {
        Some(s) => s.as_str(),
        None => Path::new(local)
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("unable to get remote file name from {local}"))?,
    };

    let mut file = File::open(local)
        .await
        .map_err(|e| anyhow!("failed to open local file {local}: {e}"))?;

    session.set_type(super::transfer_type(args)).await?;
    let stats = session.upload(&mut file, remote).await?;
    log::info!("sent {} bytes to {remote}", stats.bytes_transferred);
    Ok(())
}
