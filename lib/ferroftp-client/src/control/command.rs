/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpCommand(&'static str);

impl FtpCommand {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

macro_rules! ftp_commands {
    (
        $(
            $(#[$docs:meta])*
            ($konst:ident, $phrase:expr);
        )+
    ) => {
        impl FtpCommand {
        $(
            $(#[$docs])*
            pub const $konst: FtpCommand = FtpCommand($phrase);
        )+
        }
    };
}

ftp_commands! {
    /// a fake command for greeting
    (GREETING, "-");
    (USER, "USER");
    (PASS, "PASS");
    (QUIT, "QUIT");
    (NOOP, "NOOP");
    (TYPE_A, "TYPE A");
    (TYPE_I, "TYPE I");
    (PASV, "PASV");
    (PORT, "PORT");
    (PWD, "PWD");
    (CWD, "CWD");
    (CDUP, "CDUP");
    (MKD, "MKD");
    (RMD, "RMD");
    (DELE, "DELE");
    (RNFR, "RNFR");
    (RNTO, "RNTO");
    (LIST, "LIST");
    (RETR, "RETR");
    (STOR, "STOR");
}

/// Encode a command line, `None` if the parameter would break the line.
pub(super) fn encode_line(cmd: FtpCommand, param: Option<&str>) -> Option<Vec<u8>> {
    match param {
        Some(p) => {
            if memchr::memchr2(b'\r', b'\n', p.as_bytes()).is_some() {
                return None;
            }
            let mut buf: Vec<u8> = Vec::with_capacity(cmd.0.len() + 1 + p.len() + 2);
            buf.extend_from_slice(cmd.0.as_bytes());
            buf.push(b' ');
            buf.extend_from_slice(p.as_bytes());
            buf.extend_from_slice(b"\r\n");
            Some(buf)
        }
        None => {
            let mut buf: Vec<u8> = Vec::with_capacity(cmd.0.len() + 2);
            buf.extend_from_slice(cmd.0.as_bytes());
            buf.extend_from_slice(b"\r\n");
            Some(buf)
        }
    }
}
