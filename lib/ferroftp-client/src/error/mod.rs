/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use thiserror::Error;

mod auth;
mod connect;
mod data;
mod protocol;
mod state;
mod transfer;

pub use auth::FtpAuthError;
pub use connect::FtpConnectError;
pub use data::FtpDataChannelError;
pub use protocol::{FtpProtocolError, FtpReplyFormatError};
pub use state::FtpStateError;
pub use transfer::FtpTransferError;

#[derive(Debug, Error)]
pub enum FtpError {
    #[error("connect error: {0}")]
    Connect(#[from] FtpConnectError),
    #[error("protocol error: {0}")]
    Protocol(#[from] FtpProtocolError),
    #[error("auth error: {0}")]
    Auth(#[from] FtpAuthError),
    #[error("data channel error: {0}")]
    DataChannel(#[from] FtpDataChannelError),
    #[error("transfer error: {0}")]
    Transfer(#[from] FtpTransferError),
    #[error("state error: {0}")]
    State(#[from] FtpStateError),
    #[error("operation cancelled")]
    Cancelled,
}

impl FtpError {
    /// The reply code carried by this error, if the server sent one.
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            FtpError::Protocol(FtpProtocolError::UnexpectedReplyCode(_, code)) => Some(*code),
            FtpError::Auth(FtpAuthError::Rejected(code)) => Some(*code),
            FtpError::DataChannel(FtpDataChannelError::NegotiationFailed(_, code)) => Some(*code),
            FtpError::Transfer(FtpTransferError::Aborted { code, .. }) => Some(*code),
            _ => None,
        }
    }
}

impl From<FtpReplyFormatError> for FtpError {
    fn from(e: FtpReplyFormatError) -> Self {
        FtpError::Protocol(FtpProtocolError::MalformedReply(e))
    }
}
