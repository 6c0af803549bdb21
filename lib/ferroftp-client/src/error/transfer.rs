/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use crate::control::FtpCommand;
use crate::transfer::FtpTransferStats;

#[derive(Debug, Error)]
pub enum FtpTransferError {
    #[error("{command} aborted by server with reply code {code} after {} bytes", .stats.bytes_transferred)]
    Aborted {
        command: FtpCommand,
        code: u16,
        stats: FtpTransferStats,
    },
    #[error("local io error after {} bytes: {source:?}", .stats.bytes_transferred)]
    Io {
        source: io::Error,
        stats: FtpTransferStats,
    },
}

impl FtpTransferError {
    pub fn stats(&self) -> &FtpTransferStats {
        match self {
            FtpTransferError::Aborted { stats, .. } => stats,
            FtpTransferError::Io { stats, .. } => stats,
        }
    }
}
