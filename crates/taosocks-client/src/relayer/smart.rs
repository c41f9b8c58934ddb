//! Rule-driven relayer selection with direct-to-tunnel fallback.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use taosocks_config::{ClientConfig, TcpConfig};
use taosocks_rules::{Classification, HostClassifier};
use taosocks_transport::TunnelConnector;
use tracing::debug;

use super::{ClientStream, RelayResult, Relayer, RelayerKind};
use crate::error::RelayError;

/// Front-end hooks around a relay attempt.
#[async_trait]
pub trait HandshakeReply<S: ClientStream>: Send {
    /// Called once after `begin` succeeded and before relaying starts,
    /// typically to write the protocol's success reply with
    /// [`Relayer::to_local`].
    async fn before_relay(&mut self, relayer: &mut Relayer<S>) -> io::Result<()>;

    /// Called with the client stream when no relay will happen, right before
    /// the stream is closed. Errors are not reported.
    async fn on_failure(&mut self, _client: &mut S, _error: &RelayError) {}
}

#[async_trait]
impl<S: ClientStream> HandshakeReply<S> for () {
    async fn before_relay(&mut self, _relayer: &mut Relayer<S>) -> io::Result<()> {
        Ok(())
    }
}

/// Picks a relayer per host and learns which hosts need the tunnel.
pub struct SmartRelayer {
    classifier: Arc<dyn HostClassifier>,
    connector: Arc<TunnelConnector>,
    dial_timeout: Duration,
    tcp_config: TcpConfig,
}

impl SmartRelayer {
    pub fn new(
        classifier: Arc<dyn HostClassifier>,
        connector: Arc<TunnelConnector>,
        dial_timeout: Duration,
        tcp_config: TcpConfig,
    ) -> Self {
        Self {
            classifier,
            connector,
            dial_timeout,
            tcp_config,
        }
    }

    pub fn from_config(
        classifier: Arc<dyn HostClassifier>,
        connector: Arc<TunnelConnector>,
        config: &ClientConfig,
    ) -> Self {
        Self::new(
            classifier,
            connector,
            Duration::from_secs(config.dial_timeout_secs),
            config.tcp.clone(),
        )
    }

    /// Relay `client` to `host` (`host:port`).
    ///
    /// Returns once the relay has finished. Relay I/O errors are reported in
    /// the [`RelayResult`]; only failures to start the relay are errors.
    pub async fn relay<S, H>(
        &self,
        host: &str,
        client: S,
        reply: &mut H,
    ) -> Result<RelayResult, RelayError>
    where
        S: ClientStream,
        H: HandshakeReply<S>,
    {
        let (hostname, port) = split_host_port(host);
        let class = self.classifier.classify(hostname, port);
        debug!(target = %host, classification = %class, "classified");

        let mut relayer = match class {
            Classification::Direct | Classification::AutoDirect => self.local(),
            Classification::Proxy | Classification::AutoProxy => self.remote(),
            Classification::Reject => {
                let mut client = client;
                let err = RelayError::Rejected;
                reply.on_failure(&mut client, &err).await;
                debug!(target = %host, "rejected by rule");
                return Err(err);
            }
        };

        let mut result = relayer.begin(host, client).await;
        let mut use_remote = false;

        if result.is_err()
            && relayer.kind() == RelayerKind::Local
            && class == Classification::AutoDirect
            && let Some(client) = relayer.take_client()
        {
            if let Err(e) = &result {
                debug!(target = %host, error = %e, "direct failed, trying tunnel");
            }
            let mut fallback = self.remote();
            result = fallback.begin(host, client).await;
            use_remote = result.is_ok();
            relayer = fallback;
        }

        if let Err(cause) = result {
            if class.is_auto() && !matches!(cause, RelayError::CannotDialRemoteServer(_)) {
                self.classifier.delete_auto(hostname);
            }
            debug!(target = %host, kind = cause.kind(), error = %cause, "no relayer");
            if let Some(mut client) = relayer.take_client() {
                reply.on_failure(&mut client, &cause).await;
            }
            relayer.close();
            return Err(RelayError::NoRelayer {
                host: host.to_string(),
                cause: Box::new(cause),
            });
        }

        if use_remote {
            self.classifier
                .record_auto(hostname, port, Classification::AutoProxy);
        }

        if let Err(e) = reply.before_relay(&mut relayer).await {
            relayer.close();
            return Err(RelayError::HandshakeReply(e));
        }

        Ok(relayer.relay(host).await)
    }

    fn local<S: ClientStream>(&self) -> Relayer<S> {
        Relayer::local(self.dial_timeout, self.tcp_config.clone())
    }

    fn remote<S: ClientStream>(&self) -> Relayer<S> {
        Relayer::remote(self.connector.clone())
    }
}

/// Split `host:port` into hostname and port.
///
/// IPv6 literals may be bracketed. A missing or unparsable port yields 0.
pub fn split_host_port(host: &str) -> (&str, u16) {
    if let Some(rest) = host.strip_prefix('[')
        && let Some((name, tail)) = rest.split_once(']')
    {
        let port = tail
            .strip_prefix(':')
            .and_then(|p| p.parse().ok())
            .unwrap_or(0);
        return (name, port);
    }

    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') => (name, port.parse().unwrap_or(0)),
        _ => (host, 0),
    }
}
