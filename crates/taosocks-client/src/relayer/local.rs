//! Direct relayer: plain TCP to the target.

use std::io;
use std::time::Duration;

use taosocks_config::TcpConfig;
use taosocks_transport::apply_tcp_options;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::copy::copy_until_cancelled;
use super::{ClientStream, RelayResult, not_connected};
use crate::error::RelayError;

pub struct LocalRelayer<S> {
    dial_timeout: Duration,
    tcp_config: TcpConfig,
    src: Option<S>,
    dst: Option<TcpStream>,
}

impl<S: ClientStream> LocalRelayer<S> {
    pub(crate) fn new(dial_timeout: Duration, tcp_config: TcpConfig) -> Self {
        Self {
            dial_timeout,
            tcp_config,
            src: None,
            dst: None,
        }
    }

    pub(crate) async fn begin(&mut self, addr: &str, src: S) -> Result<(), RelayError> {
        self.src = Some(src);

        let dst = match tokio::time::timeout(self.dial_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return Err(RelayError::Dial(e)),
            Err(_) => {
                return Err(RelayError::Dial(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "dial timed out",
                )));
            }
        };
        if let Err(e) = apply_tcp_options(&dst, &self.tcp_config) {
            debug!(error = %e, "failed to apply tcp options");
        }
        self.dst = Some(dst);
        Ok(())
    }

    pub(crate) async fn to_local(&mut self, data: &[u8]) -> io::Result<()> {
        let src = self.src.as_mut().ok_or_else(not_connected)?;
        src.write_all(data).await?;
        src.flush().await
    }

    pub(crate) async fn to_remote(&mut self, data: &[u8]) -> io::Result<()> {
        let dst = self.dst.as_mut().ok_or_else(not_connected)?;
        dst.write_all(data).await
    }

    pub(crate) fn take_client(&mut self) -> Option<S> {
        self.src.take()
    }

    pub(crate) fn close(&mut self) {
        self.src = None;
        self.dst = None;
    }

    /// Copy both ways; whichever direction ends first closes both sockets.
    pub(crate) async fn relay(self) -> RelayResult {
        let (Some(src), Some(dst)) = (self.src, self.dst) else {
            return RelayResult::not_started();
        };

        let cancel = CancellationToken::new();
        let (mut src_r, mut src_w) = tokio::io::split(src);
        let (mut dst_r, mut dst_w) = dst.into_split();

        let upstream = async {
            let outcome = copy_until_cancelled(&mut src_r, &mut dst_w, &cancel).await;
            cancel.cancel();
            outcome
        };
        let downstream = async {
            let outcome = copy_until_cancelled(&mut dst_r, &mut src_w, &cancel).await;
            cancel.cancel();
            outcome
        };
        let (tx, rx) = tokio::join!(upstream, downstream);

        RelayResult::from_outcomes(tx, rx)
    }
}
