//! taosocks client.
//!
//! A local SOCKS4/4a, SOCKS5 and HTTP proxy that reaches each target either
//! directly or through a TLS tunnel server, as the host rules decide. Hosts
//! that fail directly are retried through the tunnel and remembered.

pub mod cli;
pub mod dispatcher;
mod error;
pub mod http;
pub mod relayer;
pub mod socks4;
pub mod socks5;

pub use cli::ClientArgs;
pub use error::{ClientError, RelayError, Socks4Error, Socks5Error};
pub use relayer::{
    ClientStream, HandshakeReply, RelayResult, Relayer, RelayerKind, SmartRelayer,
};
pub use tokio_util::sync::CancellationToken;

use std::path::Path;
use std::sync::Arc;

use taosocks_config::ClientConfig;
use taosocks_rules::HostFilter;
use taosocks_transport::TunnelConnector;
use tokio::net::TcpListener;
use tracing::{Instrument, error, info, info_span, warn};

/// Run the client with the given configuration until `shutdown` fires.
///
/// Learned rules are saved on the way out, whether the listener stopped
/// normally or failed to start.
pub async fn run(config: ClientConfig, shutdown: CancellationToken) -> Result<(), ClientError> {
    let filter = Arc::new(HostFilter::new());
    let rules = filter.load_rules(Path::new(&config.rules_path))?;
    let auto_path = Path::new(&config.auto_rules_path);
    let auto = filter.load_auto(auto_path)?;
    info!(rules, auto_rules = auto, "host rules loaded");

    let connector = Arc::new(TunnelConnector::from_config(&config)?);
    let relayer = Arc::new(SmartRelayer::from_config(
        filter.clone(),
        connector,
        &config,
    ));

    let result = match TcpListener::bind(&config.listen).await {
        Ok(listener) => {
            info!(listen = %config.listen, server = %config.server, "taosocks client started");
            serve(listener, relayer, shutdown).await;
            Ok(())
        }
        Err(e) => {
            error!(listen = %config.listen, error = %e, "failed to bind listener");
            Err(e.into())
        }
    };

    match filter.save_auto(auto_path) {
        Ok(()) => info!(auto_rules = filter.auto_len(), "learned rules saved"),
        Err(e) => warn!(error = %e, "failed to save learned rules"),
    }
    result
}

/// Accept connections on `listener` until `shutdown` fires, one task each.
pub async fn serve(listener: TcpListener, relayer: Arc<SmartRelayer>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let relayer = relayer.clone();
                        tokio::spawn(
                            dispatcher::handle_conn(stream, relayer)
                                .instrument(info_span!("conn", peer = %peer)),
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                info!("shutting down client");
                break;
            }
        }
    }
}
