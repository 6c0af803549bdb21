/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FtpConnectError {
    #[error("unreachable: {0:?}")]
    Unreachable(io::Error),
    #[error("timed out at stage '{0}'")]
    Timeout(&'static str),
    #[error("connection lost: {0:?}")]
    ConnectionLost(io::Error),
}

impl FtpConnectError {
    pub(crate) fn closed_by_peer() -> Self {
        FtpConnectError::ConnectionLost(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed by peer",
        ))
    }
}
