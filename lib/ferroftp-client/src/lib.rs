/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod config;
mod connection;
mod control;
mod data;
mod debug;
mod error;
mod io;
mod session;
mod transfer;

pub use config::{FtpClientConfig, FtpControlConfig, FtpTransferConfig};
pub use connection::{
    FtpConnectionProvider, FtpDataListener, FtpServerAddr, TcpConnectionProvider,
};
pub use control::{FtpCommand, FtpPartialReply, FtpReply, FtpReplyClass, FtpReplyParser};
pub use data::{FtpDataConnectionSpec, FtpDataMode, FtpHostPort};
pub use debug::{FTP_DEBUG_LOG_LEVEL, FTP_DEBUG_LOG_TARGET};
pub use error::{
    FtpAuthError, FtpConnectError, FtpDataChannelError, FtpError, FtpProtocolError,
    FtpReplyFormatError, FtpStateError, FtpTransferError,
};
pub use session::{FtpSession, FtpSessionState};
pub use transfer::{
    FtpLocalStream, FtpTransferDirection, FtpTransferRequest, FtpTransferStats, FtpTransferType,
};
