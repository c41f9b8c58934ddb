//! Tunnel relayer: bytes travel as `RelayMessage`s through the tunnel
//! server.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use taosocks_core::READ_BUF_SIZE;
use taosocks_proto::{
    CodecError, OpenMessage, RelayMessage, TunnelCodec, TunnelMessage,
};
use taosocks_transport::{TunnelConnector, TunnelStream};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::copy::{CopyOutcome, codec_to_io, write_counted};
use super::{ClientStream, RelayResult, not_connected};
use crate::error::RelayError;

pub(crate) type Tunnel = Framed<TunnelStream, TunnelCodec>;

pub struct RemoteRelayer<S> {
    connector: Arc<TunnelConnector>,
    src: Option<S>,
    tunnel: Option<Tunnel>,
}

impl<S: ClientStream> RemoteRelayer<S> {
    pub(crate) fn new(connector: Arc<TunnelConnector>) -> Self {
        Self {
            connector,
            src: None,
            tunnel: None,
        }
    }

    /// Open a tunnel and ask the server to connect to `addr`.
    ///
    /// After a negative ack the tunnel stays open until the relayer is
    /// closed or dropped.
    pub(crate) async fn begin(&mut self, addr: &str, src: S) -> Result<(), RelayError> {
        self.src = Some(src);

        let stream = self
            .connector
            .connect()
            .await
            .map_err(RelayError::CannotDialRemoteServer)?;
        let tunnel = self
            .tunnel
            .insert(Framed::new(stream, TunnelCodec::default()));

        tunnel.send(OpenMessage::new(addr).into()).await?;
        match tunnel.next().await {
            Some(Ok(TunnelMessage::OpenAck(ack))) if ack.status => Ok(()),
            Some(Ok(TunnelMessage::OpenAck(_))) => Err(RelayError::RemoteCannotConnectHost),
            Some(Ok(other)) => Err(CodecError::UnexpectedMessage {
                expected: "open_ack",
                found: other.kind(),
            }
            .into()),
            Some(Err(e)) => Err(e.into()),
            None => Err(CodecError::Closed("open_ack").into()),
        }
    }

    pub(crate) async fn to_local(&mut self, data: &[u8]) -> io::Result<()> {
        let src = self.src.as_mut().ok_or_else(not_connected)?;
        src.write_all(data).await?;
        src.flush().await
    }

    /// Send `data` as one or more `RelayMessage`s.
    pub(crate) async fn to_remote(&mut self, data: &[u8]) -> io::Result<()> {
        let tunnel = self.tunnel.as_mut().ok_or_else(not_connected)?;
        for chunk in data.chunks(READ_BUF_SIZE) {
            tunnel
                .send(RelayMessage::new(Bytes::copy_from_slice(chunk)).into())
                .await
                .map_err(codec_to_io)?;
        }
        Ok(())
    }

    pub(crate) fn take_client(&mut self) -> Option<S> {
        self.src.take()
    }

    pub(crate) fn close(&mut self) {
        self.src = None;
        self.tunnel = None;
    }

    /// Run the send and receive loops.
    ///
    /// Only a failing loop stops the other one. A clean client EOF closes the
    /// tunnel's write side so the server tears the tunnel down; a clean
    /// tunnel EOF shuts down the client's write side.
    pub(crate) async fn relay(self) -> RelayResult {
        let (Some(src), Some(tunnel)) = (self.src, self.tunnel) else {
            return RelayResult::not_started();
        };

        let cancel = CancellationToken::new();
        let (mut src_r, mut src_w) = tokio::io::split(src);
        let (mut sink, mut stream) = tunnel.split::<TunnelMessage>();

        let send = async {
            let outcome = send_loop(&mut src_r, &mut sink, &cancel).await;
            if outcome.error.is_some() {
                cancel.cancel();
            } else if !cancel.is_cancelled() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    r = sink.close() => {
                        if let Err(e) = r {
                            debug!(error = %e, "tunnel close after client eof failed");
                        }
                    }
                }
            }
            outcome
        };
        let recv = async {
            let outcome = recv_loop(&mut stream, &mut src_w, &cancel).await;
            if outcome.error.is_some() {
                cancel.cancel();
            }
            outcome
        };
        let (tx, rx) = tokio::join!(send, recv);

        RelayResult::from_outcomes(tx, rx)
    }
}

async fn send_loop<R, K>(reader: &mut R, sink: &mut K, cancel: &CancellationToken) -> CopyOutcome
where
    R: AsyncRead + Unpin,
    K: Sink<TunnelMessage, Error = CodecError> + Unpin,
{
    let mut buf = vec![0u8; READ_BUF_SIZE];
    let mut bytes = 0u64;

    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return CopyOutcome::finished(bytes),
            r = reader.read(&mut buf) => match r {
                Ok(0) => return CopyOutcome::finished(bytes),
                Ok(n) => n,
                Err(e) => return CopyOutcome::failed(bytes, e),
            },
        };

        let msg = RelayMessage::new(Bytes::copy_from_slice(&buf[..n]));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return CopyOutcome::finished(bytes),
            r = sink.send(msg.into()) => {
                if let Err(e) = r {
                    return CopyOutcome::failed(bytes, codec_to_io(e));
                }
            }
        }
        bytes += n as u64;
    }
}

async fn recv_loop<T, W>(stream: &mut T, writer: &mut W, cancel: &CancellationToken) -> CopyOutcome
where
    T: Stream<Item = Result<TunnelMessage, CodecError>> + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut bytes = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return CopyOutcome::finished(bytes),
            next = stream.next() => next,
        };

        let data = match next {
            Some(Ok(TunnelMessage::Relay(msg))) => msg.data,
            Some(Ok(other)) => {
                let err = CodecError::UnexpectedMessage {
                    expected: "relay",
                    found: other.kind(),
                };
                return CopyOutcome::failed(bytes, codec_to_io(err));
            }
            Some(Err(e)) => return CopyOutcome::failed(bytes, codec_to_io(e)),
            None => {
                if let Err(e) = writer.shutdown().await {
                    debug!(error = %e, "client shutdown after tunnel eof failed");
                }
                return CopyOutcome::finished(bytes);
            }
        };

        if let Err(e) = write_counted(writer, &data, &mut bytes, cancel).await {
            return CopyOutcome::failed(bytes, e);
        }
        if cancel.is_cancelled() {
            return CopyOutcome::finished(bytes);
        }
    }
}
