/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use crate::data::FtpDataMode;

#[cfg(feature = "yaml")]
mod yaml;

#[derive(Debug, Clone)]
pub struct FtpControlConfig {
    pub max_line_len: usize,
    pub max_multi_lines: usize,
    pub command_timeout: Duration,
}

impl Default for FtpControlConfig {
    fn default() -> Self {
        FtpControlConfig {
            max_line_len: 2048,
            max_multi_lines: 128,
            command_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FtpTransferConfig {
    pub data_mode: FtpDataMode,
    pub data_connect_timeout: Duration,
    pub data_accept_timeout: Duration,
    /// max time to wait for the completion reply after the data stream ends
    pub end_wait_timeout: Duration,
    pub buffer_size: usize,
    /// connect to the control peer ip instead of the address in the 227 reply
    pub pasv_use_control_ip: bool,
}

impl Default for FtpTransferConfig {
    fn default() -> Self {
        FtpTransferConfig {
            data_mode: FtpDataMode::Passive,
            data_connect_timeout: Duration::from_secs(10),
            data_accept_timeout: Duration::from_secs(10),
            end_wait_timeout: Duration::from_secs(30),
            buffer_size: 16 * 1024,
            pasv_use_control_ip: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FtpClientConfig {
    pub control: FtpControlConfig,
    pub transfer: FtpTransferConfig,
    pub connect_timeout: Duration,
    pub greeting_timeout: Duration,
}

impl Default for FtpClientConfig {
    fn default() -> Self {
        FtpClientConfig {
            control: FtpControlConfig::default(),
            transfer: FtpTransferConfig::default(),
            connect_timeout: Duration::from_secs(10),
            greeting_timeout: Duration::from_secs(10),
        }
    }
}
