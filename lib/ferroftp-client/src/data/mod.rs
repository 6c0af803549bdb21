/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::FtpTransferConfig;
use crate::connection::{FtpConnectionProvider, FtpDataListener};
use crate::control::{FtpControlChannel, with_deadline};
use crate::debug::log_msg;
use crate::error::{FtpConnectError, FtpDataChannelError, FtpError};

mod addr;
pub use addr::FtpHostPort;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FtpDataMode {
    /// the client connects to the address from the PASV reply
    #[default]
    Passive,
    /// the server connects back to the address sent by PORT
    Active,
}

impl FromStr for FtpDataMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passive" | "pasv" => Ok(FtpDataMode::Passive),
            "active" | "port" => Ok(FtpDataMode::Active),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FtpDataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpDataMode::Passive => f.write_str("passive"),
            FtpDataMode::Active => f.write_str("active"),
        }
    }
}

/// The negotiated data connection endpoint.
///
/// For passive mode `addr` is the server address to connect to, for active
/// mode it is the local address the server should connect back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpDataConnectionSpec {
    pub mode: FtpDataMode,
    pub addr: SocketAddr,
}

pub(crate) enum FtpDataChannel<S, L> {
    Connected { spec: FtpDataConnectionSpec, stream: S },
    Listening { spec: FtpDataConnectionSpec, listener: L },
}

impl<S, L> FtpDataChannel<S, L>
where
    L: FtpDataListener<Stream = S>,
{
    pub(crate) fn spec(&self) -> &FtpDataConnectionSpec {
        match self {
            FtpDataChannel::Connected { spec, .. } => spec,
            FtpDataChannel::Listening { spec, .. } => spec,
        }
    }

    /// Get the data stream, waiting for the server to connect in active mode.
    ///
    /// Should be called after the preliminary reply to the transfer command.
    pub(crate) async fn establish(
        self,
        cancel: &CancellationToken,
        accept_timeout: Duration,
    ) -> Result<S, FtpError> {
        match self {
            FtpDataChannel::Connected { stream, .. } => Ok(stream),
            FtpDataChannel::Listening { mut listener, .. } => {
                with_deadline(cancel, accept_timeout, "accept data connection", async {
                    listener
                        .accept()
                        .await
                        .map_err(|e| FtpError::from(FtpConnectError::Unreachable(e)))
                })
                .await
            }
        }
    }
}

/// Set up the data connection for the next transfer command.
pub(crate) async fn negotiate<CP>(
    mode: FtpDataMode,
    control: &mut FtpControlChannel<CP::Stream>,
    provider: &mut CP,
    config: &FtpTransferConfig,
) -> Result<FtpDataChannel<CP::Stream, CP::Listener>, FtpError>
where
    CP: FtpConnectionProvider,
{
    match mode {
        FtpDataMode::Passive => {
            let mut addr = control.request_pasv_addr().await?;
            if config.pasv_use_control_ip
                && let Some(peer) = provider.control_peer_addr()
            {
                addr.set_ip(peer.ip());
            }
            log_msg!("connecting to passive data address {addr}");

            let cancel = control.cancel_token().clone();
            let stream = with_deadline(
                &cancel,
                config.data_connect_timeout,
                "connect data connection",
                async {
                    provider
                        .new_data_connection(addr)
                        .await
                        .map_err(|e| FtpError::from(FtpConnectError::Unreachable(e)))
                },
            )
            .await?;
            Ok(FtpDataChannel::Connected {
                spec: FtpDataConnectionSpec { mode, addr },
                stream,
            })
        }
        FtpDataMode::Active => {
            let listener = provider
                .new_data_listener()
                .await
                .map_err(FtpDataChannelError::ListenFailed)?;
            let addr = listener
                .local_addr()
                .map_err(FtpDataChannelError::ListenFailed)?;
            let host_port = FtpHostPort::from_socket_addr(addr)
                .ok_or(FtpDataChannelError::UnsupportedAddress(addr))?;
            control.request_port(host_port).await?;
            log_msg!("listening for active data connection on {addr}");

            Ok(FtpDataChannel::Listening {
                spec: FtpDataConnectionSpec { mode, addr },
                listener,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    use async_trait::async_trait;
    use tokio_test::io::{Builder, Mock};

    use crate::FtpControlConfig;
    use crate::connection::FtpServerAddr;

    struct StaticListener(SocketAddr);

    #[async_trait]
    impl FtpDataListener for StaticListener {
        type Stream = Mock;

        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok(self.0)
        }

        async fn accept(&mut self) -> io::Result<Mock> {
            Err(io::Error::other("no peer"))
        }
    }

    /// Hands out a listener on `listen_addr`, or fails to listen if unset.
    struct ListenOnlyProvider {
        listen_addr: Option<SocketAddr>,
    }

    #[async_trait]
    impl FtpConnectionProvider for ListenOnlyProvider {
        type Stream = Mock;
        type Listener = StaticListener;

        async fn new_control_connection(&mut self, _server: &FtpServerAddr) -> io::Result<Mock> {
            Err(io::Error::from(io::ErrorKind::Unsupported))
        }

        async fn new_data_connection(&mut self, _addr: SocketAddr) -> io::Result<Mock> {
            Err(io::Error::from(io::ErrorKind::Unsupported))
        }

        async fn new_data_listener(&mut self) -> io::Result<StaticListener> {
            self.listen_addr
                .map(StaticListener)
                .ok_or_else(|| io::Error::from(io::ErrorKind::AddrInUse))
        }

        fn control_peer_addr(&self) -> Option<SocketAddr> {
            None
        }
    }

    fn idle_control() -> FtpControlChannel<Mock> {
        FtpControlChannel::new(
            Builder::new().build(),
            FtpControlConfig::default(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn active_ipv6_unsupported() {
        let mut control = idle_control();
        let mut provider = ListenOnlyProvider {
            listen_addr: Some("[::1]:2121".parse().unwrap()),
        };
        let r = negotiate(
            FtpDataMode::Active,
            &mut control,
            &mut provider,
            &FtpTransferConfig::default(),
        )
        .await;
        match r {
            Err(FtpError::DataChannel(FtpDataChannelError::UnsupportedAddress(addr))) => {
                assert_eq!(addr.port(), 2121);
                assert!(addr.is_ipv6());
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("ipv6 address should be refused"),
        }
    }

    #[tokio::test]
    async fn active_listen_failed() {
        let mut control = idle_control();
        let mut provider = ListenOnlyProvider { listen_addr: None };
        let r = negotiate(
            FtpDataMode::Active,
            &mut control,
            &mut provider,
            &FtpTransferConfig::default(),
        )
        .await;
        match r {
            Err(FtpError::DataChannel(FtpDataChannelError::ListenFailed(e))) => {
                assert_eq!(e.kind(), io::ErrorKind::AddrInUse);
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("listen should fail"),
        }
    }

    #[test]
    fn data_mode() {
        assert_eq!(FtpDataMode::from_str("Passive").unwrap(), FtpDataMode::Passive);
        assert_eq!(FtpDataMode::from_str("PORT").unwrap(), FtpDataMode::Active);
        assert_eq!(FtpDataMode::from_str("active").unwrap(), FtpDataMode::Active);
        assert!(FtpDataMode::from_str("epsv").is_err());
        assert_eq!(FtpDataMode::default(), FtpDataMode::Passive);
        assert_eq!(FtpDataMode::Active.to_string(), "active");
    }
}
