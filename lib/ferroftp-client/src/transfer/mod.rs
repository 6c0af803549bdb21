/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::FtpTransferConfig;
use crate::connection::FtpDataListener;
use crate::control::{FtpCommand, FtpControlChannel, FtpReplyClass};
use crate::data::FtpDataChannel;
use crate::debug::log_msg;
use crate::error::{FtpError, FtpTransferError};

mod ascii;
use ascii::{AsciiDecoder, AsciiEncoder};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FtpTransferType {
    /// TYPE A, line endings are translated
    #[default]
    Ascii,
    /// TYPE I, bytes are transferred as is
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpTransferDirection {
    Upload,
    Download,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FtpTransferStats {
    /// bytes moved over the data connection
    pub bytes_transferred: u64,
}

pub enum FtpLocalStream<'a> {
    Sink(&'a mut (dyn AsyncWrite + Unpin + Send)),
    Source(&'a mut (dyn AsyncRead + Unpin + Send)),
}

pub struct FtpTransferRequest<'a> {
    command: FtpCommand,
    remote_path: Option<&'a str>,
    transfer_type: FtpTransferType,
    local: FtpLocalStream<'a>,
}

impl<'a> FtpTransferRequest<'a> {
    pub fn download(
        remote_path: &'a str,
        sink: &'a mut (dyn AsyncWrite + Unpin + Send),
        transfer_type: FtpTransferType,
    ) -> Self {
        FtpTransferRequest {
            command: FtpCommand::RETR,
            remote_path: Some(remote_path),
            transfer_type,
            local: FtpLocalStream::Sink(sink),
        }
    }

    pub fn upload(
        source: &'a mut (dyn AsyncRead + Unpin + Send),
        remote_path: &'a str,
        transfer_type: FtpTransferType,
    ) -> Self {
        FtpTransferRequest {
            command: FtpCommand::STOR,
            remote_path: Some(remote_path),
            transfer_type,
            local: FtpLocalStream::Source(source),
        }
    }

    /// Directory listings are always received as ASCII.
    pub fn list(path: Option<&'a str>, sink: &'a mut (dyn AsyncWrite + Unpin + Send)) -> Self {
        FtpTransferRequest {
            command: FtpCommand::LIST,
            remote_path: path,
            transfer_type: FtpTransferType::Ascii,
            local: FtpLocalStream::Sink(sink),
        }
    }

    #[inline]
    pub fn command(&self) -> FtpCommand {
        self.command
    }

    #[inline]
    pub fn remote_path(&self) -> Option<&str> {
        self.remote_path
    }

    #[inline]
    pub fn transfer_type(&self) -> FtpTransferType {
        self.transfer_type
    }

    pub fn direction(&self) -> FtpTransferDirection {
        match self.local {
            FtpLocalStream::Sink(_) => FtpTransferDirection::Download,
            FtpLocalStream::Source(_) => FtpTransferDirection::Upload,
        }
    }
}

async fn receive<R>(
    data: &mut R,
    sink: &mut (dyn AsyncWrite + Unpin + Send),
    transfer_type: FtpTransferType,
    buffer_size: usize,
    stats: &mut FtpTransferStats,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    let mut decoder = match transfer_type {
        FtpTransferType::Ascii => Some(AsciiDecoder::new()),
        FtpTransferType::Binary => None,
    };
    let mut out = Vec::new();

    loop {
        let nr = data.read(&mut buf).await?;
        if nr == 0 {
            break;
        }
        stats.bytes_transferred += nr as u64;
        match decoder.as_mut() {
            Some(decoder) => {
                out.clear();
                decoder.decode(&buf[..nr], &mut out);
                sink.write_all(&out).await?;
            }
            None => sink.write_all(&buf[..nr]).await?,
        }
    }

    if let Some(mut decoder) = decoder {
        out.clear();
        decoder.finish(&mut out);
        sink.write_all(&out).await?;
    }
    sink.flush().await
}

async fn send<W>(
    data: &mut W,
    source: &mut (dyn AsyncRead + Unpin + Send),
    transfer_type: FtpTransferType,
    buffer_size: usize,
    stats: &mut FtpTransferStats,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    let mut encoder = match transfer_type {
        FtpTransferType::Ascii => Some(AsciiEncoder::default()),
        FtpTransferType::Binary => None,
    };
    let mut out = Vec::new();

    loop {
        let nr = source.read(&mut buf).await?;
        if nr == 0 {
            break;
        }
        let chunk = match encoder.as_mut() {
            Some(encoder) => {
                out.clear();
                encoder.encode(&buf[..nr], &mut out);
                out.as_slice()
            }
            None => &buf[..nr],
        };
        data.write_all(chunk).await?;
        stats.bytes_transferred += chunk.len() as u64;
    }

    data.flush().await
}

/// Drive one data transfer command to its final reply.
///
/// The data channel must have been negotiated on `control` just before.
pub(crate) async fn run<S, L>(
    request: FtpTransferRequest<'_>,
    data: FtpDataChannel<S, L>,
    control: &mut FtpControlChannel<S>,
    config: &FtpTransferConfig,
) -> Result<FtpTransferStats, FtpError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    L: FtpDataListener<Stream = S>,
{
    let FtpTransferRequest {
        command: cmd,
        remote_path,
        transfer_type,
        local,
    } = request;
    let spec = *data.spec();
    control.start_transfer(cmd, remote_path).await?;

    let cancel = control.cancel_token().clone();
    let mut data_stream = match data.establish(&cancel, config.data_accept_timeout).await {
        Ok(s) => s,
        Err(FtpError::Cancelled) => {
            control.mark_broken();
            return Err(FtpError::Cancelled);
        }
        Err(e) => {
            // the server will report the failure on the control channel
            let _ = control.wait_transfer_end(cmd, config.end_wait_timeout).await;
            return Err(e);
        }
    };
    log_msg!("{cmd} data connection established in {} mode to {}", spec.mode, spec.addr);

    let mut stats = FtpTransferStats::default();
    let r = tokio::select! {
        biased;

        _ = cancel.cancelled() => None,
        r = async {
            match local {
                FtpLocalStream::Sink(sink) => receive(
                    &mut data_stream,
                    sink,
                    transfer_type,
                    config.buffer_size,
                    &mut stats,
                )
                .await,
                FtpLocalStream::Source(source) => send(
                    &mut data_stream,
                    source,
                    transfer_type,
                    config.buffer_size,
                    &mut stats,
                )
                .await,
            }
        } => Some(r),
    };

    // end of file is marked by closing the data connection
    let _ = data_stream.shutdown().await;
    drop(data_stream);

    match r {
        None => {
            control.mark_broken();
            return Err(FtpError::Cancelled);
        }
        Some(Err(e)) => {
            log_msg!("{cmd} data stream failed after {} bytes: {e}", stats.bytes_transferred);
            let _ = control.wait_transfer_end(cmd, config.end_wait_timeout).await;
            return Err(FtpTransferError::Io { source: e, stats }.into());
        }
        Some(Ok(_)) => {}
    }

    let code = control.wait_transfer_end(cmd, config.end_wait_timeout).await?;
    match FtpReplyClass::from_code(code) {
        Some(FtpReplyClass::Complete) => {
            log_msg!("{cmd} finished with {} bytes transferred", stats.bytes_transferred);
            Ok(stats)
        }
        _ => Err(FtpTransferError::Aborted {
            command: cmd,
            code,
            stats,
        }
        .into()),
    }
}
