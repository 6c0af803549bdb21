/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use thiserror::Error;

use crate::control::FtpCommand;

#[derive(Debug, Error)]
pub enum FtpReplyFormatError {
    #[error("line too long")]
    LineTooLong,
    #[error("invalid line format")]
    InvalidLineFormat,
    #[error("invalid reply code {0}")]
    InvalidReplyCode(u16),
    #[error("continuation code {1} does not match reply code {0}")]
    CodeMismatch(u16, u16),
    #[error("line is not utf8")]
    LineIsNotUtf8,
    #[error("too many lines")]
    TooManyLines,
    #[error("invalid reply {1} payload to command {0}")]
    InvalidPayload(FtpCommand, u16),
}

impl FtpReplyFormatError {
    /// Framing errors leave unknown bytes on the control stream, while a bad
    /// payload inside a complete reply does not.
    pub fn breaks_framing(&self) -> bool {
        !matches!(self, FtpReplyFormatError::InvalidPayload(_, _))
    }
}

#[derive(Debug, Error)]
pub enum FtpProtocolError {
    #[error("malformed reply: {0}")]
    MalformedReply(#[from] FtpReplyFormatError),
    #[error("unexpected reply code ({0} -> {1})")]
    UnexpectedReplyCode(FtpCommand, u16),
    #[error("invalid parameter for command {0}")]
    InvalidParameter(FtpCommand),
    #[error("reply to a previous command is still outstanding, unable to send {0}")]
    ReplyOutstanding(FtpCommand),
}
