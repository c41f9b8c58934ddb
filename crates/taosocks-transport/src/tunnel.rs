//! Tunnel establishment: TCP connect, TLS handshake, HTTP upgrade.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use rustls::pki_types::ServerName;
use taosocks_config::{ClientConfig, TcpConfig};
use taosocks_core::MAX_HTTP_HEADER_BYTES;
use taosocks_core::io::PrefixedStream;
use taosocks_proto::{ParseResult, UpgradeRequest, parse_upgrade_response, write_upgrade_request};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use crate::error::TransportError;
use crate::tls::{apply_tcp_options, build_tls_config, resolve_sni};

/// An upgraded tunnel. Bytes the server sent right after its `101` response
/// are replayed before the TLS stream is read again.
pub type TunnelStream = PrefixedStream<TlsStream<TcpStream>>;

/// Shared, immutable settings for dialing the tunnel server.
#[allow(missing_debug_implementations)]
pub struct TunnelConnector {
    /// Tunnel server address (`host:port`), also sent as `Host`.
    server: String,
    path: String,
    key: String,
    tls_connector: TlsConnector,
    sni: ServerName<'static>,
    tcp_config: TcpConfig,
    /// Covers TCP connect, TLS handshake and the upgrade exchange.
    handshake_timeout: Duration,
}

impl TunnelConnector {
    /// Build a connector from the client configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let tls = build_tls_config(&config.tls, config.insecure)?;
        let sni = resolve_sni(&config.tls, &config.server)?;
        Ok(Self::new(config, Arc::new(tls), sni))
    }

    /// Build a connector with an explicit TLS config.
    pub fn new(
        config: &ClientConfig,
        tls: Arc<rustls::ClientConfig>,
        sni: ServerName<'static>,
    ) -> Self {
        Self {
            server: config.server.clone(),
            path: config.path.clone(),
            key: config.key.clone(),
            tls_connector: TlsConnector::from(tls),
            sni,
            tcp_config: config.tcp.clone(),
            handshake_timeout: Duration::from_secs(config.tls.handshake_timeout_secs),
        }
    }

    /// Dial the server and complete the upgrade handshake.
    ///
    /// Any failure drops the partially established connection.
    pub async fn connect(&self) -> Result<TunnelStream, TransportError> {
        tokio::time::timeout(self.handshake_timeout, self.connect_inner())
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    async fn connect_inner(&self) -> Result<TunnelStream, TransportError> {
        debug!(server = %self.server, "connecting to tunnel server");

        let tcp = TcpStream::connect(&self.server).await?;
        apply_tcp_options(&tcp, &self.tcp_config)?;

        let mut tls = self.tls_connector.connect(self.sni.clone(), tcp).await?;

        let mut req = BytesMut::new();
        write_upgrade_request(
            &mut req,
            &UpgradeRequest {
                path: &self.path,
                host: &self.server,
                key: &self.key,
            },
        );
        tls.write_all(&req).await?;
        tls.flush().await?;

        let mut buf = BytesMut::with_capacity(1024);
        let response = loop {
            match parse_upgrade_response(&buf) {
                ParseResult::Complete(resp) => break resp,
                ParseResult::Incomplete(_) => {
                    if buf.len() >= MAX_HTTP_HEADER_BYTES {
                        return Err(TransportError::MalformedResponse(
                            taosocks_proto::ParseError::HeaderTooLarge,
                        ));
                    }
                    if tls.read_buf(&mut buf).await? == 0 {
                        return Err(TransportError::Closed);
                    }
                }
                ParseResult::Invalid(e) => return Err(TransportError::MalformedResponse(e)),
            }
        };

        if !response.is_accepted() {
            return Err(TransportError::UpgradeRejected {
                status: response.status,
                reason: response.reason,
            });
        }

        let leftover = buf.split_off(response.header_len).freeze();
        debug!(server = %self.server, leftover = leftover.len(), "tunnel upgraded");
        Ok(PrefixedStream::new(leftover, tls))
    }
}
