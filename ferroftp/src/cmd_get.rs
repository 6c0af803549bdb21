/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use clap::{Arg, ArgMatches, Command};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use ferroftp_client::{FtpConnectionProvider, FtpSession};

pub(super) const COMMAND: &str = "get";

const COMMAND_ARG_REMOTE: &str = "remote";
const COMMAND_ARG_LOCAL: &str = "local";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("Download file")
        .arg(
            Arg::new(COMMAND_ARG_REMOTE)
                .value_name("REMOTE PATH")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new(COMMAND_ARG_LOCAL)
                .help("Local file path, use '-' for stdout")
                .value_name("LOCAL PATH")
                .num_args(1),
        )
        .arg(super::ascii_arg())
}

/// The last component of the remote path.
fn default_local_path(remote: &str) -> &str {
    remote
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(remote)
}

pub(super) async fn run<CP>(
    session: &mut FtpSession<CP>,
    args: &ArgMatches,
) -> anyhow::Result<()>
where
    CP: FtpConnectionProvider,
{
    let Some(remote) = args.get_one::<String>(COMMAND_ARG_REMOTE) else {
        return Err(anyhow::anyhow!("no remote path set"));
    };
    let local = args
        .get_one::<String>(COMMAND_ARG_LOCAL)
        .map(|s| s.as_str())
        .unwrap_or_else(|| default_local_path(remote));
    if local.is_empty() {
        return Err(anyhow::anyhow!("unable to get local file name from {remote}"));
    }

    session.set_type(super::transfer_type(args)).await?;

    let stats = if local == "-" {
        let mut stdout = tokio::io::stdout();
        let stats = session.download(remote, &mut stdout).await?;
        stdout.flush().await?;
        stats
    } else {
        let mut file = File::create(local)
            .await
            .map_err(|e| anyhow::anyhow!("failed to create local file {local}: {e}"))?;
        let stats = session.download(remote, &mut file).await?;
        file.sync_all().await?;
        stats
    };
    log::info!("received {} bytes from {remote}", stats.bytes_transferred);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_path() {
        assert_eq!(default_local_path("/pub/readme.txt"), "readme.txt");
        assert_eq!(default_local_path("readme.txt"), "readme.txt");
        assert_eq!(default_local_path("/pub/dir/"), "dir");
        assert_eq!(default_local_path("/"), "");
    }
}
