/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use clap_complete::Shell;

use ferroftp_client::{
    FtpClientConfig, FtpDataMode, FtpSession, FtpSessionState, FtpTransferType,
    TcpConnectionProvider,
};

mod config;
mod logger;

mod cmd_del;
mod cmd_get;
mod cmd_list;
mod cmd_mkd;
mod cmd_put;
mod cmd_pwd;
mod cmd_rename;
mod cmd_rmd;

const DEFAULT_FTP_PORT: u16 = 21;

const GLOBAL_ARG_COMPLETION: &str = "completion";
const GLOBAL_ARG_SERVER: &str = "server";
const GLOBAL_ARG_USERNAME: &str = "username";
const GLOBAL_ARG_PASSWORD: &str = "password";
const GLOBAL_ARG_SOURCE_IP: &str = "source-ip";
const GLOBAL_ARG_ACTIVE: &str = "active";
const GLOBAL_ARG_CONFIG: &str = "config";
const GLOBAL_ARG_VERBOSE: &str = "verbose";

const COMMAND_ARG_ASCII: &str = "ascii";

fn ascii_arg() -> Arg {
    Arg::new(COMMAND_ARG_ASCII)
        .help("Use ASCII transfer type instead of binary")
        .action(ArgAction::SetTrue)
        .long("ascii")
}

fn transfer_type(args: &ArgMatches) -> FtpTransferType {
    if args.get_flag(COMMAND_ARG_ASCII) {
        FtpTransferType::Ascii
    } else {
        FtpTransferType::Binary
    }
}

fn build_cli_args() -> Command {
    Command::new("ferroftp")
        .about("A simple FTP client")
        .arg(
            Arg::new(GLOBAL_ARG_COMPLETION)
                .num_args(1)
                .value_name("SHELL")
                .long("completion")
                .value_parser(value_parser!(Shell))
                .exclusive(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_SERVER)
                .help("FTP server address")
                .num_args(1)
                .value_name("SERVER[:PORT]")
                .required_unless_present(GLOBAL_ARG_COMPLETION),
        )
        .arg(
            Arg::new(GLOBAL_ARG_USERNAME)
                .help("FTP username, anonymous if not set")
                .num_args(1)
                .value_name("USERNAME")
                .short('u')
                .long("user")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_PASSWORD)
                .help("FTP password")
                .num_args(1)
                .value_name("PASSWORD")
                .short('p')
                .long("password")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_SOURCE_IP)
                .help("source ip address")
                .num_args(1)
                .value_name("IP ADDRESS")
                .value_parser(value_parser!(IpAddr))
                .long("source")
                .short('s')
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_ACTIVE)
                .help("Use active mode data connection")
                .action(ArgAction::SetTrue)
                .long("active")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_CONFIG)
                .help("YAML config file")
                .num_args(1)
                .value_name("CONFIG FILE")
                .value_parser(value_parser!(PathBuf))
                .long("config")
                .short('c')
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_VERBOSE)
                .help("show verbose message")
                .num_args(0)
                .action(ArgAction::Count)
                .short('v')
                .global(true),
        )
        .subcommand(cmd_list::command())
        .subcommand(cmd_get::command())
        .subcommand(cmd_put::command())
        .subcommand(cmd_del::command())
        .subcommand(cmd_mkd::command())
        .subcommand(cmd_rmd::command())
        .subcommand(cmd_rename::command())
        .subcommand(cmd_pwd::command())
}

/// Split `host`, `host:port`, `[v6]` or `[v6]:port`.
fn parse_server(s: &str) -> anyhow::Result<(String, u16)> {
    if let Some(v) = s.strip_prefix('[') {
        let Some((host, left)) = v.split_once(']') else {
            return Err(anyhow!("no ending ']' found in {s}"));
        };
        let port = match left.strip_prefix(':') {
            Some(p) => u16::from_str(p).map_err(|e| anyhow!("invalid port {p}: {e}"))?,
            None if left.is_empty() => DEFAULT_FTP_PORT,
            None => return Err(anyhow!("invalid server address {s}")),
        };
        return Ok((host.to_string(), port));
    }

    match s.rsplit_once(':') {
        Some((host, _)) if host.contains(':') => Ok((s.to_string(), DEFAULT_FTP_PORT)),
        Some((host, p)) => {
            let port = u16::from_str(p).map_err(|e| anyhow!("invalid port {p}: {e}"))?;
            Ok((host.to_string(), port))
        }
        None => Ok((s.to_string(), DEFAULT_FTP_PORT)),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = build_cli_args().get_matches();

    if let Some(target) = args.get_one::<Shell>(GLOBAL_ARG_COMPLETION) {
        let mut app = build_cli_args();
        let bin_name = app.get_name().to_string();
        clap_complete::generate(*target, &mut app, bin_name, &mut io::stdout());
        return Ok(());
    }

    let verbose_level = args
        .get_one::<u8>(GLOBAL_ARG_VERBOSE)
        .copied()
        .unwrap_or_default();
    let logger = logger::SyncLogger::new(verbose_level);
    logger
        .into_global_logger()
        .map_err(|e| anyhow!("failed to setup logger: {e}"))?;

    let Some(server) = args.get_one::<String>(GLOBAL_ARG_SERVER) else {
        return Err(anyhow!("no server address set"));
    };
    let (host, port) = parse_server(server)?;

    let username = args.get_one::<String>(GLOBAL_ARG_USERNAME);
    let password = args.get_one::<String>(GLOBAL_ARG_PASSWORD);

    let mut config = match args.get_one::<PathBuf>(GLOBAL_ARG_CONFIG) {
        Some(path) => config::load(path)?,
        None => FtpClientConfig::default(),
    };
    if args.get_flag(GLOBAL_ARG_ACTIVE) {
        config.transfer.data_mode = FtpDataMode::Active;
    }

    let mut conn_provider = TcpConnectionProvider::default();
    if let Some(ip) = args.get_one::<IpAddr>(GLOBAL_ARG_SOURCE_IP) {
        conn_provider.set_bind_ip(*ip);
    }

    let Some((subcommand, args)) = args.subcommand() else {
        return Err(anyhow!("no subcommand found"));
    };

    let mut session = FtpSession::new(Arc::new(config), conn_provider);
    let cancel = session.cancel_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    session
        .connect_and_login(
            &host,
            port,
            username.map(|s| s.as_str()),
            password.map(|s| s.as_str()),
        )
        .await
        .context(format!("failed to login to server {server}"))?;

    let ret = match subcommand {
        cmd_list::COMMAND => cmd_list::run(&mut session, args).await,
        cmd_get::COMMAND => cmd_get::run(&mut session, args).await,
        cmd_put::COMMAND => cmd_put::run(&mut session, args).await,
        cmd_del::COMMAND => cmd_del::run(&mut session, args).await,
        cmd_mkd::COMMAND => cmd_mkd::run(&mut session, args).await,
        cmd_rmd::COMMAND => cmd_rmd::run(&mut session, args).await,
        cmd_rename::COMMAND => cmd_rename::run(&mut session, args).await,
        cmd_pwd::COMMAND => cmd_pwd::run(&mut session, args).await,
        cmd => Err(anyhow!("invalid subcommand {cmd}")),
    };

    let quit = match session.state() {
        FtpSessionState::Connected | FtpSessionState::Authenticated => session.quit().await,
        _ => Ok(()),
    };

    ret?;
    quit.context("failed to quit")?;
    Ok(())
}
