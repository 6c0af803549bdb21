/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};
use tokio_util::sync::CancellationToken;

use crate::FtpControlConfig;
use crate::data::FtpHostPort;
use crate::error::{
    FtpAuthError, FtpConnectError, FtpDataChannelError, FtpError, FtpProtocolError,
    FtpReplyFormatError,
};
use crate::io::LimitedBufReadExt;
use crate::transfer::FtpTransferType;

mod command;
pub use command::FtpCommand;

mod reply;
pub use reply::{FtpPartialReply, FtpReply, FtpReplyClass, FtpReplyParser};

pub(crate) enum FtpAuthStatus {
    LoggedIn,
    NeedPassword,
}

/// Run `fut` bounded by `timeout`, giving up early if `cancel` fires.
pub(crate) async fn with_deadline<F, R>(
    cancel: &CancellationToken,
    timeout: Duration,
    stage: &'static str,
    fut: F,
) -> Result<R, FtpError>
where
    F: Future<Output = Result<R, FtpError>>,
{
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(FtpError::Cancelled),
        r = tokio::time::timeout(timeout, fut) => match r {
            Ok(r) => r,
            Err(_) => Err(FtpConnectError::Timeout(stage).into()),
        },
    }
}

pub(crate) struct FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite,
{
    config: FtpControlConfig,
    stream: BufStream<T>,
    cancel: CancellationToken,
    /// the command whose final reply has not been read yet
    awaiting: Option<FtpCommand>,
    broken: bool,
}

impl<T> FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// The greeting is outstanding on a fresh control connection.
    pub(crate) fn new(stream: T, config: FtpControlConfig, cancel: CancellationToken) -> Self {
        FtpControlChannel {
            config,
            stream: BufStream::new(stream),
            cancel,
            awaiting: Some(FtpCommand::GREETING),
            broken: false,
        }
    }

    #[inline]
    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn set_cancel_token(&mut self, cancel: CancellationToken) {
        self.cancel = cancel;
    }

    /// Ready to accept a new command.
    #[inline]
    pub(crate) fn is_usable(&self) -> bool {
        !self.broken && self.awaiting.is_none()
    }

    #[cfg(test)]
    pub(crate) fn is_broken(&self) -> bool {
        self.broken
    }

    pub(crate) fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub(crate) async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }

    async fn write_line(&mut self, cmd: FtpCommand, param: Option<&str>) -> Result<(), FtpError> {
        if self.broken {
            return Err(FtpConnectError::ConnectionLost(std::io::Error::other(
                "control channel is broken",
            ))
            .into());
        }
        if self.awaiting.is_some() {
            return Err(FtpProtocolError::ReplyOutstanding(cmd).into());
        }
        let buf = command::encode_line(cmd, param)
            .ok_or(FtpProtocolError::InvalidParameter(cmd))?;

        #[cfg(feature = "log-raw-io")]
        crate::debug::log_cmd(String::from_utf8_lossy(&buf).trim_end());

        self.awaiting = Some(cmd);
        let cancel = self.cancel.clone();
        let stream = &mut self.stream;
        let r = with_deadline(&cancel, self.config.command_timeout, "send command", async {
            stream
                .write_all(&buf)
                .await
                .map_err(FtpConnectError::ConnectionLost)?;
            stream
                .flush()
                .await
                .map_err(FtpConnectError::ConnectionLost)?;
            Ok::<(), FtpError>(())
        })
        .await;
        if r.is_err() {
            self.broken = true;
        }
        r
    }

    async fn read_reply_inner(&mut self) -> Result<FtpReply, FtpError> {
        let mut parser = FtpReplyParser::new(self.config.max_multi_lines);
        let mut buf = Vec::<u8>::with_capacity(self.config.max_line_len);
        loop {
            buf.clear();
            let (found, len) = self
                .stream
                .limited_read_until(b'\n', self.config.max_line_len, &mut buf)
                .await
                .map_err(FtpConnectError::ConnectionLost)?;
            if len == 0 {
                return Err(FtpConnectError::closed_by_peer().into());
            }

            #[cfg(feature = "log-raw-io")]
            crate::debug::log_rsp(String::from_utf8_lossy(&buf).trim_end());

            if !found {
                return if len < self.config.max_line_len {
                    Err(FtpConnectError::closed_by_peer().into())
                } else {
                    Err(FtpReplyFormatError::LineTooLong.into())
                };
            }
            if let FtpPartialReply::Complete(reply) = parser.feed_line(&buf)? {
                return Ok(reply);
            }
        }
    }

    pub(crate) async fn read_reply_timeout(
        &mut self,
        stage: &'static str,
        timeout: Duration,
    ) -> Result<FtpReply, FtpError> {
        let cancel = self.cancel.clone();
        let r = with_deadline(&cancel, timeout, stage, self.read_reply_inner()).await;
        match &r {
            Ok(reply) => {
                if reply.class() != FtpReplyClass::Preliminary {
                    self.awaiting = None;
                }
                if reply.code() == 421 {
                    // the server is closing the control connection
                    self.broken = true;
                }
            }
            Err(FtpError::Protocol(FtpProtocolError::MalformedReply(e))) if !e.breaks_framing() => {
                self.awaiting = None;
            }
            Err(_) => self.broken = true,
        }
        r
    }

    #[inline]
    pub(crate) async fn read_reply(&mut self, stage: &'static str) -> Result<FtpReply, FtpError> {
        self.read_reply_timeout(stage, self.config.command_timeout)
            .await
    }

    /// Send one command and wait for its reply.
    pub(crate) async fn send_command(
        &mut self,
        cmd: FtpCommand,
        param: Option<&str>,
        stage: &'static str,
    ) -> Result<FtpReply, FtpError> {
        self.write_line(cmd, param).await?;
        let reply = self.read_reply(stage).await?;
        if reply.class() == FtpReplyClass::Preliminary {
            // no final reply will follow that we know how to wait for
            self.broken = true;
            return Err(FtpProtocolError::UnexpectedReplyCode(cmd, reply.code()).into());
        }
        Ok(reply)
    }

    pub(crate) async fn wait_greetings(&mut self, timeout: Duration) -> Result<(), FtpError> {
        loop {
            let reply = self.read_reply_timeout("wait greetings", timeout).await?;
            return match reply.code() {
                120 => continue,
                220 => Ok(()),
                n => {
                    self.broken = true;
                    Err(FtpProtocolError::UnexpectedReplyCode(FtpCommand::GREETING, n).into())
                }
            };
        }
    }

    pub(crate) async fn send_username(&mut self, name: &str) -> Result<FtpAuthStatus, FtpError> {
        let cmd = FtpCommand::USER;
        let reply = self.send_command(cmd, Some(name), "send username").await?;
        match reply.code() {
            230 => Ok(FtpAuthStatus::LoggedIn),
            331 => Ok(FtpAuthStatus::NeedPassword),
            332 => Err(FtpAuthError::AccountRequired.into()),
            530 => Err(FtpAuthError::Rejected(530).into()),
            n => Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }
    }

    pub(crate) async fn send_password(&mut self, pass: &str) -> Result<(), FtpError> {
        let cmd = FtpCommand::PASS;
        let reply = self.send_command(cmd, Some(pass), "send password").await?;
        match reply.code() {
            202 | 230 => Ok(()),
            332 => Err(FtpAuthError::AccountRequired.into()),
            530 => Err(FtpAuthError::Rejected(530).into()),
            n => Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }
    }

    pub(crate) async fn send_quit(&mut self) -> Result<(), FtpError> {
        let cmd = FtpCommand::QUIT;
        let reply = self.send_command(cmd, None, "send quit").await?;
        match reply.code() {
            221 => Ok(()),
            n => Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }
    }

    pub(crate) async fn send_noop(&mut self) -> Result<(), FtpError> {
        let cmd = FtpCommand::NOOP;
        let reply = self.send_command(cmd, None, "send noop").await?;
        match reply.code() {
            200 => Ok(()),
            n => Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }
    }

    pub(crate) async fn request_transfer_type(
        &mut self,
        t: FtpTransferType,
    ) -> Result<(), FtpError> {
        let cmd = match t {
            FtpTransferType::Ascii => FtpCommand::TYPE_A,
            FtpTransferType::Binary => FtpCommand::TYPE_I,
        };
        let reply = self
            .send_command(cmd, None, "request transfer type")
            .await?;
        match reply.code() {
            200 => Ok(()),
            n => Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }
    }

    pub(crate) async fn request_pasv_addr(&mut self) -> Result<SocketAddr, FtpError> {
        let cmd = FtpCommand::PASV;
        let reply = self.send_command(cmd, None, "request pasv addr").await?;
        match reply.code() {
            227 => match FtpHostPort::parse_pasv_reply(reply.first_line()) {
                Some(hp) => Ok(hp.socket_addr()),
                None => Err(FtpReplyFormatError::InvalidPayload(cmd, 227).into()),
            },
            n => Err(FtpDataChannelError::NegotiationFailed(cmd, n).into()),
        }
    }

    pub(crate) async fn request_port(&mut self, addr: FtpHostPort) -> Result<(), FtpError> {
        let cmd = FtpCommand::PORT;
        let param = addr.to_string();
        let reply = self.send_command(cmd, Some(&param), "request port").await?;
        match reply.code() {
            200 => Ok(()),
            n => Err(FtpDataChannelError::NegotiationFailed(cmd, n).into()),
        }
    }

    pub(crate) async fn print_working_dir(&mut self) -> Result<String, FtpError> {
        let cmd = FtpCommand::PWD;
        let reply = self.send_command(cmd, None, "print working dir").await?;
        match reply.code() {
            257 => match parse_quoted_path(reply.first_line()) {
                Some(path) => Ok(path),
                None => Err(FtpReplyFormatError::InvalidPayload(cmd, 257).into()),
            },
            n => Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }
    }

    pub(crate) async fn change_working_dir(&mut self, path: &str) -> Result<(), FtpError> {
        let cmd = FtpCommand::CWD;
        let reply = self
            .send_command(cmd, Some(path), "change working dir")
            .await?;
        match reply.code() {
            200 | 250 => Ok(()),
            n => Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }
    }

    pub(crate) async fn change_to_parent_dir(&mut self) -> Result<(), FtpError> {
        let cmd = FtpCommand::CDUP;
        let reply = self
            .send_command(cmd, None, "change to parent dir")
            .await?;
        match reply.code() {
            200 | 250 => Ok(()),
            n => Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }
    }

    /// Returns the created path if the server reported it.
    pub(crate) async fn make_dir(&mut self, path: &str) -> Result<Option<String>, FtpError> {
        let cmd = FtpCommand::MKD;
        let reply = self.send_command(cmd, Some(path), "make dir").await?;
        match reply.code() {
            257 => Ok(parse_quoted_path(reply.first_line())),
            n => Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }
    }

    pub(crate) async fn remove_dir(&mut self, path: &str) -> Result<(), FtpError> {
        let cmd = FtpCommand::RMD;
        let reply = self.send_command(cmd, Some(path), "remove dir").await?;
        match reply.code() {
            250 => Ok(()),
            n => Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }
    }

    pub(crate) async fn delete_file(&mut self, path: &str) -> Result<(), FtpError> {
        let cmd = FtpCommand::DELE;
        let reply = self.send_command(cmd, Some(path), "delete file").await?;
        match reply.code() {
            250 => Ok(()),
            n => Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }
    }

    pub(crate) async fn rename(&mut self, from: &str, to: &str) -> Result<(), FtpError> {
        let cmd = FtpCommand::RNFR;
        let reply = self.send_command(cmd, Some(from), "rename from").await?;
        match reply.code() {
            350 => {}
            n => return Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }

        let cmd = FtpCommand::RNTO;
        let reply = self.send_command(cmd, Some(to), "rename to").await?;
        match reply.code() {
            250 => Ok(()),
            n => Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into()),
        }
    }

    /// Send a data transfer command and wait for the preliminary reply.
    ///
    /// On success the final reply stays outstanding and must be read with
    /// [`Self::wait_transfer_end`].
    pub(crate) async fn start_transfer(
        &mut self,
        cmd: FtpCommand,
        path: Option<&str>,
    ) -> Result<(), FtpError> {
        self.write_line(cmd, path).await?;
        let reply = self.read_reply("start transfer").await?;
        match reply.code() {
            125 | 150 => Ok(()),
            n => {
                if reply.class() == FtpReplyClass::Preliminary {
                    self.broken = true;
                }
                Err(FtpProtocolError::UnexpectedReplyCode(cmd, n).into())
            }
        }
    }

    /// Read the final reply of a data transfer command, returns the code.
    pub(crate) async fn wait_transfer_end(
        &mut self,
        cmd: FtpCommand,
        timeout: Duration,
    ) -> Result<u16, FtpError> {
        let reply = self.read_reply_timeout("wait transfer end", timeout).await?;
        if reply.class() == FtpReplyClass::Preliminary {
            self.broken = true;
            return Err(FtpProtocolError::UnexpectedReplyCode(cmd, reply.code()).into());
        }
        Ok(reply.code())
    }
}

/// Extract the path of a 257 reply, `""` inside the quotes escapes a quote.
fn parse_quoted_path(line: &str) -> Option<String> {
    let start = memchr::memchr(b'"', line.as_bytes())?;
    let mut path = String::new();
    let mut chars = line[start + 1..].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                path.push('"');
            } else {
                return Some(path);
            }
        } else {
            path.push(c);
        }
    }
    None
}
