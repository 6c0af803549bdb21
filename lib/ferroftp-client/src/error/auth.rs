/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FtpAuthError {
    #[error("login rejected with reply code {0}")]
    Rejected(u16),
    #[error("extra account is needed")]
    AccountRequired,
}
