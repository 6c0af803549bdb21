/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use log::Level;

pub const FTP_DEBUG_LOG_LEVEL: Level = Level::Debug;
pub const FTP_DEBUG_LOG_TARGET: &str = "ferroftp";

macro_rules! log_msg {
    ($s:literal $(, $arg:expr)* $(,)?) => (
        log::log!(
            target: $crate::debug::FTP_DEBUG_LOG_TARGET,
            $crate::debug::FTP_DEBUG_LOG_LEVEL,
            $s
            $(, $arg)*
        )
    )
}
pub(crate) use log_msg;

#[cfg(feature = "log-raw-io")]
pub(crate) fn log_cmd(cmd: &str) {
    // never leak the password
    let cmd = if cmd.starts_with("PASS ") {
        "PASS ****"
    } else {
        cmd
    };
    log::log!(target: FTP_DEBUG_LOG_TARGET, FTP_DEBUG_LOG_LEVEL, "> {cmd}");
}

#[cfg(feature = "log-raw-io")]
pub(crate) fn log_rsp(rsp: &str) {
    log::log!(target: FTP_DEBUG_LOG_TARGET, FTP_DEBUG_LOG_LEVEL, "< {rsp}");
}
