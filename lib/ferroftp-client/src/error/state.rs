/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use thiserror::Error;

use crate::session::FtpSessionState;

#[derive(Debug, Error)]
pub enum FtpStateError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("operation '{1}' is invalid in state {0:?}")]
    InvalidTransition(FtpSessionState, &'static str),
}
