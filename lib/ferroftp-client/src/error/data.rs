/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::control::FtpCommand;

#[derive(Debug, Error)]
pub enum FtpDataChannelError {
    #[error("negotiation with {0} failed with reply code {1}")]
    NegotiationFailed(FtpCommand, u16),
    #[error("local address {0} can not be used for active mode")]
    UnsupportedAddress(SocketAddr),
    #[error("failed to listen for data connection: {0:?}")]
    ListenFailed(io::Error),
}
