//! Stream adapter that replays bytes already pulled off the wire.
//!
//! Both the upgrade handshake and the HTTP proxy front end read in whole
//! chunks, so they may consume bytes past the end of the header block.
//! `PrefixedStream` hands those bytes back out before touching the inner
//! stream again.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A stream that yields `leftover` before reading from `inner`.
///
/// Writes always go straight to `inner`.
///
/// ```ignore
/// use taosocks_core::io::PrefixedStream;
///
/// // `rest` holds the bytes read after "\r\n\r\n" of the 101 response.
/// let tunnel = PrefixedStream::new(rest, tls_stream);
/// ```
#[derive(Debug)]
pub struct PrefixedStream<S> {
    leftover: Bytes,
    inner: S,
}

impl<S> PrefixedStream<S> {
    /// Wrap `inner`, replaying `leftover` first.
    pub fn new(leftover: Bytes, inner: S) -> Self {
        Self { leftover, inner }
    }

    /// Split back into the unread buffer and the wrapped stream.
    pub fn into_parts(self) -> (Bytes, S) {
        (self.leftover, self.inner)
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PrefixedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if !self.leftover.is_empty() {
            let n = self.leftover.len().min(buf.remaining());
            buf.put_slice(&self.leftover[..n]);
            self.leftover.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PrefixedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, data)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
