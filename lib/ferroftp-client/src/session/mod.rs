/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::FtpClientConfig;
use crate::connection::{FtpConnectionProvider, FtpServerAddr};
use crate::control::{FtpAuthStatus, FtpCommand, FtpControlChannel, with_deadline};
use crate::data::{self, FtpDataMode};
use crate::debug::log_msg;
use crate::error::{FtpConnectError, FtpError, FtpStateError};
use crate::transfer::{self, FtpTransferRequest, FtpTransferStats, FtpTransferType};

const ANONYMOUS_USER: &str = "anonymous";
const ANONYMOUS_PASS: &str = "anonymous@";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpSessionState {
    Disconnected,
    Connected,
    Authenticated,
    Closed,
}

/// One FTP client session over a single control connection.
///
/// Operations are serialized by `&mut self`, and any failure that leaves the
/// control channel out of sync closes the session.
pub struct FtpSession<CP: FtpConnectionProvider> {
    config: Arc<FtpClientConfig>,
    provider: CP,
    cancel: CancellationToken,
    state: FtpSessionState,
    control: Option<FtpControlChannel<CP::Stream>>,
    server: Option<FtpServerAddr>,
    data_mode: FtpDataMode,
    transfer_type: FtpTransferType,
    current_directory: Option<String>,
}

impl<CP: FtpConnectionProvider> FtpSession<CP> {
    pub fn new(config: Arc<FtpClientConfig>, provider: CP) -> Self {
        let data_mode = config.transfer.data_mode;
        FtpSession {
            config,
            provider,
            cancel: CancellationToken::new(),
            state: FtpSessionState::Disconnected,
            control: None,
            server: None,
            data_mode,
            transfer_type: FtpTransferType::default(),
            current_directory: None,
        }
    }

    /// Use an external token to abort in-flight operations.
    ///
    /// Takes effect on an already connected session as well.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        if let Some(control) = self.control.as_mut() {
            control.set_cancel_token(cancel.clone());
        }
        self.cancel = cancel;
        self
    }

    #[inline]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[inline]
    pub fn state(&self) -> FtpSessionState {
        self.state
    }

    #[inline]
    pub fn server(&self) -> Option<&FtpServerAddr> {
        self.server.as_ref()
    }

    #[inline]
    pub fn transfer_type(&self) -> FtpTransferType {
        self.transfer_type
    }

    /// The last known working directory, refreshed by PWD.
    #[inline]
    pub fn current_directory(&self) -> Option<&str> {
        self.current_directory.as_deref()
    }

    #[inline]
    pub fn data_mode(&self) -> FtpDataMode {
        self.data_mode
    }

    pub fn set_data_mode(&mut self, mode: FtpDataMode) {
        self.data_mode = mode;
    }

    fn check_state(&self, op: &'static str, need_auth: bool) -> Result<(), FtpError> {
        match self.state {
            FtpSessionState::Authenticated => Ok(()),
            FtpSessionState::Connected if !need_auth => Ok(()),
            FtpSessionState::Connected | FtpSessionState::Disconnected if need_auth => {
                Err(FtpStateError::NotAuthenticated.into())
            }
            s => Err(FtpStateError::InvalidTransition(s, op).into()),
        }
    }

    fn control_mut(
        &mut self,
        op: &'static str,
        need_auth: bool,
    ) -> Result<&mut FtpControlChannel<CP::Stream>, FtpError> {
        self.check_state(op, need_auth)?;
        let state = self.state;
        self.control
            .as_mut()
            .ok_or_else(|| FtpStateError::InvalidTransition(state, op).into())
    }

    fn close(&mut self) {
        // dropping the stream closes the connection
        self.control = None;
        self.state = FtpSessionState::Closed;
        self.current_directory = None;
    }

    /// Close the session if the last operation left the control channel unusable.
    fn settle<R>(&mut self, r: Result<R, FtpError>) -> Result<R, FtpError> {
        if let Some(control) = self.control.as_mut() {
            if matches!(r, Err(FtpError::Cancelled)) {
                control.mark_broken();
            }
            if !control.is_usable() {
                log_msg!("control channel is no longer usable, closing session");
                self.close();
            }
        }
        r
    }

    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), FtpError> {
        if self.state != FtpSessionState::Disconnected {
            return Err(FtpStateError::InvalidTransition(self.state, "connect").into());
        }

        let server = FtpServerAddr::new(host, port);
        let provider = &mut self.provider;
        let stream = with_deadline(
            &self.cancel,
            self.config.connect_timeout,
            "connect control connection",
            async {
                provider
                    .new_control_connection(&server)
                    .await
                    .map_err(|e| FtpError::from(FtpConnectError::Unreachable(e)))
            },
        )
        .await?;

        let mut control =
            FtpControlChannel::new(stream, self.config.control.clone(), self.cancel.clone());
        control.wait_greetings(self.config.greeting_timeout).await?;
        log_msg!("connected to ftp server {server}");

        self.control = Some(control);
        self.server = Some(server);
        self.state = FtpSessionState::Connected;
        self.transfer_type = FtpTransferType::default();
        Ok(())
    }

    /// Log in, anonymously if no user is given.
    pub async fn login(&mut self, user: Option<&str>, pass: Option<&str>) -> Result<(), FtpError> {
        if self.state != FtpSessionState::Connected {
            return Err(FtpStateError::InvalidTransition(self.state, "login").into());
        }
        let control = self.control_mut("login", false)?;

        let user = user.unwrap_or(ANONYMOUS_USER);
        let r = match control.send_username(user).await {
            Ok(FtpAuthStatus::LoggedIn) => Ok(()),
            Ok(FtpAuthStatus::NeedPassword) => {
                control.send_password(pass.unwrap_or(ANONYMOUS_PASS)).await
            }
            Err(e) => Err(e),
        };
        if r.is_ok() {
            log_msg!("logged in as user {user}");
            self.state = FtpSessionState::Authenticated;
        }
        self.settle(r)
    }

    pub async fn connect_and_login(
        &mut self,
        host: &str,
        port: u16,
        user: Option<&str>,
        pass: Option<&str>,
    ) -> Result<(), FtpError> {
        self.connect(host, port).await?;
        self.login(user, pass).await
    }

    pub async fn set_type(&mut self, transfer_type: FtpTransferType) -> Result<(), FtpError> {
        let control = self.control_mut("set type", false)?;
        let r = control.request_transfer_type(transfer_type).await;
        if r.is_ok() {
            self.transfer_type = transfer_type;
        }
        self.settle(r)
    }

    pub async fn download<W>(
        &mut self,
        remote_path: &str,
        sink: &mut W,
    ) -> Result<FtpTransferStats, FtpError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let request = FtpTransferRequest::download(remote_path, sink, self.transfer_type);
        self.transfer(request).await
    }

    pub async fn upload<R>(
        &mut self,
        source: &mut R,
        remote_path: &str,
    ) -> Result<FtpTransferStats, FtpError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let request = FtpTransferRequest::upload(source, remote_path, self.transfer_type);
        self.transfer(request).await
    }

    pub async fn list<W>(
        &mut self,
        path: Option<&str>,
        sink: &mut W,
    ) -> Result<FtpTransferStats, FtpError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.transfer(FtpTransferRequest::list(path, sink)).await
    }

    pub async fn transfer(
        &mut self,
        request: FtpTransferRequest<'_>,
    ) -> Result<FtpTransferStats, FtpError> {
        self.check_state("transfer", true)?;
        // listings are translated locally whatever the current type is
        if request.command() != FtpCommand::LIST && request.transfer_type() != self.transfer_type
        {
            self.set_type(request.transfer_type()).await?;
        }

        let mode = self.data_mode;
        let config = &self.config.transfer;
        let provider = &mut self.provider;
        let Some(control) = self.control.as_mut() else {
            return Err(FtpStateError::InvalidTransition(self.state, "transfer").into());
        };

        log_msg!(
            "start {} {} in {mode} mode",
            request.command(),
            request.remote_path().unwrap_or_default()
        );
        let r = match data::negotiate(mode, control, provider, config).await {
            Ok(data) => transfer::run(request, data, control, config).await,
            Err(e) => Err(e),
        };
        self.settle(r)
    }

    pub async fn pwd(&mut self) -> Result<String, FtpError> {
        let control = self.control_mut("pwd", true)?;
        let r = control.print_working_dir().await;
        if let Ok(path) = &r {
            self.current_directory = Some(path.clone());
        }
        self.settle(r)
    }

    /// Only an error that closed the session is returned.
    async fn refresh_current_directory(&mut self) -> Result<(), FtpError> {
        self.current_directory = None;
        match self.pwd().await {
            Ok(_) => Ok(()),
            Err(e) if self.state == FtpSessionState::Closed => Err(e),
            Err(e) => {
                log_msg!("failed to refresh current directory: {e}");
                Ok(())
            }
        }
    }

    pub async fn change_dir(&mut self, path: &str) -> Result<(), FtpError> {
        let control = self.control_mut("change dir", true)?;
        let r = control.change_working_dir(path).await;
        self.settle(r)?;
        self.refresh_current_directory().await
    }

    pub async fn change_to_parent(&mut self) -> Result<(), FtpError> {
        let control = self.control_mut("change to parent", true)?;
        let r = control.change_to_parent_dir().await;
        self.settle(r)?;
        self.refresh_current_directory().await
    }

    /// Returns the created path if the server reported one.
    pub async fn make_dir(&mut self, path: &str) -> Result<Option<String>, FtpError> {
        let control = self.control_mut("make dir", true)?;
        let r = control.make_dir(path).await;
        self.settle(r)
    }

    pub async fn remove_dir(&mut self, path: &str) -> Result<(), FtpError> {
        let control = self.control_mut("remove dir", true)?;
        let r = control.remove_dir(path).await;
        self.settle(r)
    }

    pub async fn delete_file(&mut self, path: &str) -> Result<(), FtpError> {
        let control = self.control_mut("delete file", true)?;
        let r = control.delete_file(path).await;
        self.settle(r)
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> Result<(), FtpError> {
        let control = self.control_mut("rename", true)?;
        let r = control.rename(from, to).await;
        self.settle(r)
    }

    pub async fn noop(&mut self) -> Result<(), FtpError> {
        let control = self.control_mut("noop", false)?;
        let r = control.send_noop().await;
        self.settle(r)
    }

    /// Send QUIT and close the control connection.
    ///
    /// The session is closed even if the server does not acknowledge.
    pub async fn quit(&mut self) -> Result<(), FtpError> {
        match self.state {
            FtpSessionState::Connected | FtpSessionState::Authenticated => {}
            s => return Err(FtpStateError::InvalidTransition(s, "quit").into()),
        }

        let r = match self.control.as_mut() {
            Some(control) if control.is_usable() => control.send_quit().await,
            _ => Ok(()),
        };
        if let Some(mut control) = self.control.take() {
            let _ = tokio::time::timeout(self.config.control.command_timeout, control.shutdown())
                .await;
        }
        self.close();
        log_msg!("session closed");
        r
    }
}
