/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::debug::log_msg;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpServerAddr {
    host: String,
    port: u16,
}

impl FtpServerAddr {
    pub fn new(host: &str, port: u16) -> Self {
        FtpServerAddr {
            host: host.to_string(),
            port,
        }
    }

    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for FtpServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[async_trait]
pub trait FtpDataListener: Send {
    type Stream;

    fn local_addr(&self) -> io::Result<SocketAddr>;
    async fn accept(&mut self) -> io::Result<Self::Stream>;
}

/// Opens the sockets used by one session.
#[async_trait]
pub trait FtpConnectionProvider: Send {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;
    type Listener: FtpDataListener<Stream = Self::Stream>;

    async fn new_control_connection(&mut self, server: &FtpServerAddr)
    -> io::Result<Self::Stream>;
    async fn new_data_connection(&mut self, addr: SocketAddr) -> io::Result<Self::Stream>;
    /// Listen on the local address of the control connection, for active mode.
    async fn new_data_listener(&mut self) -> io::Result<Self::Listener>;
    fn control_peer_addr(&self) -> Option<SocketAddr>;
}

#[derive(Default)]
pub struct TcpConnectionProvider {
    bind_ip: Option<IpAddr>,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

impl TcpConnectionProvider {
    pub fn set_bind_ip(&mut self, ip: IpAddr) {
        self.bind_ip = Some(ip);
    }

    fn new_socket_to(&self, peer: SocketAddr) -> io::Result<TcpSocket> {
        let socket = match peer {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        if let Some(ip) = self.bind_ip {
            socket.bind(SocketAddr::new(ip, 0))?;
        }
        Ok(socket)
    }
}

#[async_trait]
impl FtpDataListener for TcpListener {
    type Stream = TcpStream;

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }

    async fn accept(&mut self) -> io::Result<TcpStream> {
        let (stream, peer) = TcpListener::accept(self).await?;
        log_msg!("accepted data connection from {peer}");
        Ok(stream)
    }
}

#[async_trait]
impl FtpConnectionProvider for TcpConnectionProvider {
    type Stream = TcpStream;
    type Listener = TcpListener;

    async fn new_control_connection(&mut self, server: &FtpServerAddr) -> io::Result<TcpStream> {
        let mut err = io::Error::new(io::ErrorKind::AddrNotAvailable, "no addr resolved");
        for addr in tokio::net::lookup_host((server.host(), server.port())).await? {
            let socket = self.new_socket_to(addr)?;
            match socket.connect(addr).await {
                Ok(stream) => {
                    self.local_addr = stream.local_addr().ok();
                    self.peer_addr = Some(addr);
                    return Ok(stream);
                }
                Err(e) => err = e,
            }
        }

        Err(err)
    }

    async fn new_data_connection(&mut self, addr: SocketAddr) -> io::Result<TcpStream> {
        let socket = self.new_socket_to(addr)?;
        socket.connect(addr).await
    }

    async fn new_data_listener(&mut self) -> io::Result<TcpListener> {
        match self.local_addr {
            Some(addr) => TcpListener::bind(SocketAddr::new(addr.ip(), 0)).await,
            None => Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no control connection local addr found",
            )),
        }
    }

    fn control_peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }
}
