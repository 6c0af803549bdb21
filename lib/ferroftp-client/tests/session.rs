/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ferroftp_client::{
    FtpAuthError, FtpClientConfig, FtpCommand, FtpConnectError, FtpDataMode, FtpError,
    FtpHostPort, FtpProtocolError, FtpReplyFormatError, FtpSession, FtpSessionState,
    FtpStateError, FtpTransferError, FtpTransferType, TcpConnectionProvider,
};

struct ServerControl {
    stream: BufStream<TcpStream>,
}

impl ServerControl {
    async fn reply(&mut self, line: &str) {
        self.stream.write_all(line.as_bytes()).await.unwrap();
        self.stream.write_all(b"\r\n").await.unwrap();
        self.stream.flush().await.unwrap();
    }

    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.stream.read_line(&mut line).await.unwrap();
        line.trim_end().to_string()
    }

    async fn expect(&mut self, cmd: &str) {
        assert_eq!(self.read_line().await, cmd);
    }

    async fn expect_closed(&mut self) {
        let mut line = String::new();
        assert_eq!(self.stream.read_line(&mut line).await.unwrap(), 0);
    }

    async fn login(&mut self) {
        self.reply("220 fake ftp server ready").await;
        self.expect("USER anonymous").await;
        self.reply("331 Guest login ok, send your email as password").await;
        self.expect("PASS anonymous@").await;
        self.reply("230 Guest login ok").await;
    }

    async fn pasv(&mut self) -> TcpListener {
        self.expect("PASV").await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        self.reply(&format!(
            "227 Entering Passive Mode (127,0,0,1,{},{}).",
            port >> 8,
            port & 0xFF
        ))
        .await;
        listener
    }

    async fn quit(&mut self) {
        self.expect("QUIT").await;
        self.reply("221 Goodbye").await;
    }
}

async fn spawn_server<F, Fut>(f: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(ServerControl) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        f(ServerControl {
            stream: BufStream::new(stream),
        })
        .await;
    });
    (addr, handle)
}

/// A local sink that can not take any data.
struct FullDisk;

impl AsyncWrite for FullDisk {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::other("disk full")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn new_session(config: FtpClientConfig) -> FtpSession<TcpConnectionProvider> {
    FtpSession::new(Arc::new(config), TcpConnectionProvider::default())
}

async fn logged_in_session(addr: SocketAddr) -> FtpSession<TcpConnectionProvider> {
    let mut session = new_session(FtpClientConfig::default());
    session
        .connect_and_login("127.0.0.1", addr.port(), None, None)
        .await
        .unwrap();
    assert_eq!(session.state(), FtpSessionState::Authenticated);
    session
}

#[tokio::test]
async fn login_and_pwd() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.reply("220-Welcome").await;
        ctl.reply("220 ready").await;
        ctl.expect("USER alice").await;
        ctl.reply("331 Password required").await;
        ctl.expect("PASS secret").await;
        ctl.reply("230 User logged in").await;
        ctl.expect("PWD").await;
        ctl.reply("257 \"/home/alice\" is current directory").await;
        ctl.quit().await;
    })
    .await;

    let mut session = new_session(FtpClientConfig::default());
    assert_eq!(session.state(), FtpSessionState::Disconnected);
    session.connect("127.0.0.1", addr.port()).await.unwrap();
    assert_eq!(session.state(), FtpSessionState::Connected);
    session.login(Some("alice"), Some("secret")).await.unwrap();
    assert_eq!(session.state(), FtpSessionState::Authenticated);
    assert!(session.current_directory().is_none());

    assert_eq!(session.pwd().await.unwrap(), "/home/alice");
    assert_eq!(session.current_directory(), Some("/home/alice"));

    session.quit().await.unwrap();
    assert_eq!(session.state(), FtpSessionState::Closed);
    server.await.unwrap();
}

#[tokio::test]
async fn login_rejected_then_retry() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.reply("220 ready").await;
        ctl.expect("USER bob").await;
        ctl.reply("331 Password required").await;
        ctl.expect("PASS wrong").await;
        ctl.reply("530 Login incorrect").await;
        ctl.expect("USER bob").await;
        ctl.reply("230 User logged in, proceed").await;
        ctl.quit().await;
    })
    .await;

    let mut session = new_session(FtpClientConfig::default());
    session.connect("127.0.0.1", addr.port()).await.unwrap();
    let e = session.login(Some("bob"), Some("wrong")).await.unwrap_err();
    assert!(matches!(e, FtpError::Auth(FtpAuthError::Rejected(530))));
    assert_eq!(e.reply_code(), Some(530));
    assert_eq!(session.state(), FtpSessionState::Connected);

    session.login(Some("bob"), None).await.unwrap();
    assert_eq!(session.state(), FtpSessionState::Authenticated);
    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn greeting_refused() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.reply("421 Too many connections").await;
    })
    .await;

    let mut session = new_session(FtpClientConfig::default());
    let e = session.connect("127.0.0.1", addr.port()).await.unwrap_err();
    assert_eq!(e.reply_code(), Some(421));
    assert_eq!(session.state(), FtpSessionState::Disconnected);
    server.await.unwrap();
}

#[tokio::test]
async fn not_authenticated() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.reply("220 ready").await;
        ctl.quit().await;
    })
    .await;

    let mut session = new_session(FtpClientConfig::default());
    let mut sink = Vec::new();
    let e = session.download("a.txt", &mut sink).await.unwrap_err();
    assert!(matches!(e, FtpError::State(FtpStateError::NotAuthenticated)));

    session.connect("127.0.0.1", addr.port()).await.unwrap();
    let e = session.download("a.txt", &mut sink).await.unwrap_err();
    assert!(matches!(e, FtpError::State(FtpStateError::NotAuthenticated)));
    let e = session.pwd().await.unwrap_err();
    assert!(matches!(e, FtpError::State(FtpStateError::NotAuthenticated)));
    assert_eq!(session.state(), FtpSessionState::Connected);

    session.quit().await.unwrap();
    let e = session.noop().await.unwrap_err();
    assert!(matches!(
        e,
        FtpError::State(FtpStateError::InvalidTransition(
            FtpSessionState::Closed,
            _
        ))
    ));
    let e = session.connect("127.0.0.1", addr.port()).await.unwrap_err();
    assert!(matches!(
        e,
        FtpError::State(FtpStateError::InvalidTransition(
            FtpSessionState::Closed,
            _
        ))
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn set_type_always_sent() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        ctl.expect("TYPE I").await;
        ctl.reply("200 Switching to Binary mode").await;
        ctl.expect("TYPE I").await;
        ctl.reply("200 Switching to Binary mode").await;
        ctl.expect("TYPE A").await;
        ctl.reply("504 Command not implemented for that parameter").await;
        ctl.quit().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    session.set_type(FtpTransferType::Binary).await.unwrap();
    session.set_type(FtpTransferType::Binary).await.unwrap();
    assert_eq!(session.transfer_type(), FtpTransferType::Binary);

    let e = session.set_type(FtpTransferType::Ascii).await.unwrap_err();
    assert_eq!(e.reply_code(), Some(504));
    assert_eq!(session.transfer_type(), FtpTransferType::Binary);

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn download_binary_passive() {
    let content: Vec<u8> = (0..=255u8).cycle().take(100_000).collect();
    let server_content = content.clone();
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        ctl.expect("TYPE I").await;
        ctl.reply("200 Type set to I").await;
        let listener = ctl.pasv().await;
        ctl.expect("RETR /pub/data.bin").await;
        ctl.reply("150 Opening BINARY mode data connection").await;
        let (mut data, _) = listener.accept().await.unwrap();
        data.write_all(&server_content).await.unwrap();
        drop(data);
        ctl.reply("226 Transfer complete").await;
        ctl.quit().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    session.set_type(FtpTransferType::Binary).await.unwrap();
    assert_eq!(session.transfer_type(), FtpTransferType::Binary);

    let mut sink = Vec::new();
    let stats = session.download("/pub/data.bin", &mut sink).await.unwrap();
    assert_eq!(stats.bytes_transferred, content.len() as u64);
    assert_eq!(sink, content);
    assert_eq!(session.state(), FtpSessionState::Authenticated);

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[cfg(not(windows))]
#[tokio::test]
async fn download_ascii() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        let listener = ctl.pasv().await;
        ctl.expect("RETR readme.txt").await;
        ctl.reply("150 Opening ASCII mode data connection").await;
        let (mut data, _) = listener.accept().await.unwrap();
        data.write_all(b"line1\r\nline2\r\n").await.unwrap();
        drop(data);
        ctl.reply("226 Transfer complete").await;
        ctl.quit().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    assert_eq!(session.transfer_type(), FtpTransferType::Ascii);
    let mut sink = Vec::new();
    let stats = session.download("readme.txt", &mut sink).await.unwrap();
    assert_eq!(sink, b"line1\nline2\n");
    assert_eq!(stats.bytes_transferred, 14);

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn upload_ascii() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        let listener = ctl.pasv().await;
        ctl.expect("STOR notes.txt").await;
        ctl.reply("150 Ok to send data").await;
        let (mut data, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        data.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"a\r\nb\r\n");
        ctl.reply("226 Transfer complete").await;
        ctl.quit().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    let mut source: &[u8] = b"a\nb\r\n";
    let stats = session.upload(&mut source, "notes.txt").await.unwrap();
    assert_eq!(stats.bytes_transferred, 6);

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn list_directory() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        let listener = ctl.pasv().await;
        ctl.expect("LIST").await;
        ctl.reply("125 Data connection already open").await;
        let (mut data, _) = listener.accept().await.unwrap();
        data.write_all(b"-rw-r--r-- 1 ftp ftp 10 Jan 01 00:00 a.txt\r\n")
            .await
            .unwrap();
        drop(data);
        ctl.reply("226 Directory send OK").await;
        ctl.quit().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    let mut sink = Vec::new();
    session.list(None, &mut sink).await.unwrap();
    let listing = String::from_utf8(sink).unwrap();
    assert!(listing.starts_with("-rw-r--r--"));
    assert!(listing.trim_end().ends_with("a.txt"));

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn download_active() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        let line = ctl.read_line().await;
        let param = line.strip_prefix("PORT ").unwrap();
        let target = FtpHostPort::from_str(param).unwrap();
        assert_eq!(target.ip().to_string(), "127.0.0.1");
        ctl.reply("200 PORT command successful").await;
        ctl.expect("RETR a.txt").await;
        ctl.reply("150 Opening data connection").await;
        let mut data = TcpStream::connect(target.socket_addr()).await.unwrap();
        data.write_all(b"hello").await.unwrap();
        drop(data);
        ctl.reply("226 Transfer complete").await;
        ctl.quit().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    session.set_data_mode(FtpDataMode::Active);
    let mut sink = Vec::new();
    let stats = session.download("a.txt", &mut sink).await.unwrap();
    assert_eq!(sink, b"hello");
    assert_eq!(stats.bytes_transferred, 5);

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn transfer_refused() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        let _listener = ctl.pasv().await;
        ctl.expect("RETR missing.txt").await;
        ctl.reply("550 No such file").await;
        ctl.expect("NOOP").await;
        ctl.reply("200 NOOP ok").await;
        ctl.quit().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    let mut sink = Vec::new();
    let e = session.download("missing.txt", &mut sink).await.unwrap_err();
    assert!(matches!(
        e,
        FtpError::Protocol(FtpProtocolError::UnexpectedReplyCode(FtpCommand::RETR, 550))
    ));
    assert_eq!(session.state(), FtpSessionState::Authenticated);
    session.noop().await.unwrap();

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn transfer_aborted() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        let listener = ctl.pasv().await;
        ctl.expect("RETR big.iso").await;
        ctl.reply("150 Opening data connection").await;
        let (mut data, _) = listener.accept().await.unwrap();
        data.write_all(b"partial").await.unwrap();
        drop(data);
        ctl.reply("426 Connection closed; transfer aborted").await;
        ctl.quit().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    let mut sink = Vec::new();
    let e = session.download("big.iso", &mut sink).await.unwrap_err();
    assert_eq!(e.reply_code(), Some(426));
    match &e {
        FtpError::Transfer(FtpTransferError::Aborted { command, stats, .. }) => {
            assert_eq!(*command, FtpCommand::RETR);
            assert_eq!(stats.bytes_transferred, 7);
        }
        _ => panic!("unexpected error {e}"),
    }
    assert_eq!(sink, b"partial");
    assert_eq!(session.state(), FtpSessionState::Authenticated);

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn pasv_payload_invalid() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        ctl.expect("PASV").await;
        ctl.reply("227 Entering Passive Mode (127,0,0,1,4)").await;
        ctl.expect("NOOP").await;
        ctl.reply("200 NOOP ok").await;
        ctl.quit().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    let mut sink = Vec::new();
    let e = session.list(None, &mut sink).await.unwrap_err();
    assert!(matches!(
        e,
        FtpError::Protocol(FtpProtocolError::MalformedReply(
            FtpReplyFormatError::InvalidPayload(FtpCommand::PASV, 227)
        ))
    ));
    assert_eq!(session.state(), FtpSessionState::Authenticated);
    session.noop().await.unwrap();

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn file_operations() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        ctl.expect("MKD docs").await;
        ctl.reply("257 \"/docs\" created").await;
        ctl.expect("CWD docs").await;
        ctl.reply("250 Directory successfully changed").await;
        ctl.expect("PWD").await;
        ctl.reply("257 \"/docs\"").await;
        ctl.expect("RNFR a.txt").await;
        ctl.reply("350 Ready for RNTO").await;
        ctl.expect("RNTO b.txt").await;
        ctl.reply("250 Rename successful").await;
        ctl.expect("DELE b.txt").await;
        ctl.reply("250 Delete operation successful").await;
        ctl.expect("DELE nope.txt").await;
        ctl.reply("550 Delete operation failed").await;
        ctl.expect("CDUP").await;
        ctl.reply("250 Directory successfully changed").await;
        ctl.expect("PWD").await;
        ctl.reply("257 \"/\"").await;
        ctl.expect("RMD docs").await;
        ctl.reply("250 Remove directory operation successful").await;
        ctl.quit().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    let created = session.make_dir("docs").await.unwrap();
    assert_eq!(created.as_deref(), Some("/docs"));
    session.change_dir("docs").await.unwrap();
    assert_eq!(session.current_directory(), Some("/docs"));
    session.rename("a.txt", "b.txt").await.unwrap();
    session.delete_file("b.txt").await.unwrap();
    let e = session.delete_file("nope.txt").await.unwrap_err();
    assert_eq!(e.reply_code(), Some(550));
    assert_eq!(session.state(), FtpSessionState::Authenticated);
    session.change_to_parent().await.unwrap();
    assert_eq!(session.current_directory(), Some("/"));
    session.remove_dir("docs").await.unwrap();

    let e = session.delete_file("x\r\nQUIT").await.unwrap_err();
    assert!(matches!(
        e,
        FtpError::Protocol(FtpProtocolError::InvalidParameter(FtpCommand::DELE))
    ));

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn service_closing() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        ctl.expect("NOOP").await;
        ctl.reply("421 Service not available, closing control connection").await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    let e = session.noop().await.unwrap_err();
    assert_eq!(e.reply_code(), Some(421));
    assert_eq!(session.state(), FtpSessionState::Closed);
    let e = session.pwd().await.unwrap_err();
    assert!(matches!(
        e,
        FtpError::State(FtpStateError::InvalidTransition(
            FtpSessionState::Closed,
            _
        ))
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn command_timeout() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        ctl.expect("NOOP").await;
        // no reply, wait for the client to give up
        ctl.expect_closed().await;
    })
    .await;

    let mut config = FtpClientConfig::default();
    config.control.command_timeout = Duration::from_millis(200);
    let mut session = new_session(config);
    session
        .connect_and_login("127.0.0.1", addr.port(), None, None)
        .await
        .unwrap();

    let e = session.noop().await.unwrap_err();
    assert!(matches!(e, FtpError::Connect(FtpConnectError::Timeout(_))));
    assert_eq!(session.state(), FtpSessionState::Closed);
    server.await.unwrap();
}

#[tokio::test]
async fn cancel_transfer() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        let listener = ctl.pasv().await;
        ctl.expect("RETR stalled.bin").await;
        ctl.reply("150 Opening data connection").await;
        let (mut data, _) = listener.accept().await.unwrap();
        data.write_all(b"some").await.unwrap();
        // hold the data connection open until the client drops it
        let mut buf = [0u8; 16];
        assert_eq!(data.read(&mut buf).await.unwrap(), 0);
        ctl.expect_closed().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    let cancel = session.cancel_token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    let mut sink = Vec::new();
    let e = session.download("stalled.bin", &mut sink).await.unwrap_err();
    assert!(matches!(e, FtpError::Cancelled));
    assert_eq!(session.state(), FtpSessionState::Closed);
    server.await.unwrap();
}

#[tokio::test]
async fn local_sink_failed() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        let listener = ctl.pasv().await;
        ctl.expect("RETR report.txt").await;
        ctl.reply("150 Opening data connection").await;
        let (mut data, _) = listener.accept().await.unwrap();
        data.write_all(b"12345678").await.unwrap();
        // wait for the client to give up on the data connection
        let mut buf = [0u8; 16];
        let _ = data.read(&mut buf).await;
        drop(data);
        ctl.reply("426 Connection closed; transfer aborted").await;
        ctl.expect("NOOP").await;
        ctl.reply("200 NOOP ok").await;
        ctl.quit().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    let e = session
        .download("report.txt", &mut FullDisk)
        .await
        .unwrap_err();
    match &e {
        FtpError::Transfer(FtpTransferError::Io { source, stats }) => {
            assert_eq!(source.to_string(), "disk full");
            assert!(stats.bytes_transferred > 0);
            assert!(stats.bytes_transferred <= 8);
        }
        _ => panic!("unexpected error {e}"),
    }
    assert_eq!(session.state(), FtpSessionState::Authenticated);
    session.noop().await.unwrap();

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn active_accept_timeout() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        let line = ctl.read_line().await;
        assert!(line.starts_with("PORT "));
        ctl.reply("200 PORT command successful").await;
        ctl.expect("RETR a.txt").await;
        ctl.reply("150 Opening data connection").await;
        // never connect back
        ctl.reply("425 Can't open data connection").await;
        ctl.expect("NOOP").await;
        ctl.reply("200 NOOP ok").await;
        ctl.quit().await;
    })
    .await;

    let mut config = FtpClientConfig::default();
    config.transfer.data_mode = FtpDataMode::Active;
    config.transfer.data_accept_timeout = Duration::from_millis(200);
    let mut session = new_session(config);
    session
        .connect_and_login("127.0.0.1", addr.port(), None, None)
        .await
        .unwrap();
    assert_eq!(session.data_mode(), FtpDataMode::Active);

    let mut sink = Vec::new();
    let e = session.download("a.txt", &mut sink).await.unwrap_err();
    assert!(matches!(e, FtpError::Connect(FtpConnectError::Timeout(_))));
    assert!(sink.is_empty());
    assert_eq!(session.state(), FtpSessionState::Authenticated);
    session.noop().await.unwrap();

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn passive_connect_refused() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        ctl.expect("PASV").await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        ctl.reply(&format!(
            "227 Entering Passive Mode (127,0,0,1,{},{}).",
            port >> 8,
            port & 0xFF
        ))
        .await;
        ctl.expect("NOOP").await;
        ctl.reply("200 NOOP ok").await;
        ctl.quit().await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    let mut sink = Vec::new();
    let e = session.list(None, &mut sink).await.unwrap_err();
    assert!(matches!(e, FtpError::Connect(FtpConnectError::Unreachable(_))));
    assert_eq!(session.state(), FtpSessionState::Authenticated);
    session.noop().await.unwrap();

    session.quit().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn replace_cancellation_after_connect() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        ctl.expect_closed().await;
    })
    .await;

    let session = logged_in_session(addr).await;
    let cancel = CancellationToken::new();
    let mut session = session.with_cancellation(cancel.clone());
    cancel.cancel();

    let e = session.noop().await.unwrap_err();
    assert!(matches!(e, FtpError::Cancelled));
    assert_eq!(session.state(), FtpSessionState::Closed);
    server.await.unwrap();
}

#[tokio::test]
async fn directory_refresh_failure() {
    let (addr, server) = spawn_server(|mut ctl| async move {
        ctl.login().await;
        ctl.expect("CWD pub").await;
        ctl.reply("250 Directory successfully changed").await;
        ctl.expect("PWD").await;
        ctl.reply("550 Permission denied").await;
        ctl.expect("CWD incoming").await;
        ctl.reply("250 Directory successfully changed").await;
        ctl.expect("PWD").await;
        ctl.reply("421 Timeout, closing control connection").await;
    })
    .await;

    let mut session = logged_in_session(addr).await;
    session.change_dir("pub").await.unwrap();
    assert!(session.current_directory().is_none());
    assert_eq!(session.state(), FtpSessionState::Authenticated);

    let e = session.change_dir("incoming").await.unwrap_err();
    assert_eq!(e.reply_code(), Some(421));
    assert_eq!(session.state(), FtpSessionState::Closed);
    server.await.unwrap();
}
