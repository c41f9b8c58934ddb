//! One-directional copy loop that stops when its relay is cancelled.

use std::io;

use taosocks_core::READ_BUF_SIZE;
use taosocks_proto::CodecError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// What one direction moved before it stopped.
#[derive(Debug, Default)]
pub(crate) struct CopyOutcome {
    pub bytes: u64,
    /// `None` on EOF or cancellation.
    pub error: Option<io::Error>,
}

impl CopyOutcome {
    pub(crate) fn failed(bytes: u64, error: io::Error) -> Self {
        Self {
            bytes,
            error: Some(error),
        }
    }

    pub(crate) fn finished(bytes: u64) -> Self {
        Self { bytes, error: None }
    }
}

/// Copy `reader` into `writer` until EOF, an error, or `cancel` fires.
///
/// Each chunk is flushed before the next read. Bytes count as soon as the
/// writer accepts them, so a cancelled partial write is still reported.
pub(crate) async fn copy_until_cancelled<R, W>(
    reader: &mut R,
    writer: &mut W,
    cancel: &CancellationToken,
) -> CopyOutcome
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
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

        if let Err(e) = write_counted(writer, &buf[..n], &mut bytes, cancel).await {
            return CopyOutcome::failed(bytes, e);
        }
        if cancel.is_cancelled() {
            return CopyOutcome::finished(bytes);
        }
    }
}

/// Write and flush `data`, adding every accepted byte to `bytes`.
///
/// Returns early without error when `cancel` fires; bytes the writer took
/// before that are already counted.
pub(crate) async fn write_counted<W>(
    writer: &mut W,
    mut data: &[u8],
    bytes: &mut u64,
    cancel: &CancellationToken,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    while !data.is_empty() {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            r = writer.write(data) => r?,
        };
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        *bytes += n as u64;
        data = &data[n..];
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(()),
        r = writer.flush() => r,
    }
}

/// Flatten a codec failure into the `io::Error` a relay direction reports.
pub(crate) fn codec_to_io(err: CodecError) -> io::Error {
    match err {
        CodecError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}
