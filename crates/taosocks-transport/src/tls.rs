//! rustls client configuration for the tunnel connection.

use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, ServerName};
use taosocks_config::{TcpConfig, TlsSettings};
use tokio::net::TcpStream;

use crate::error::TransportError;

/// Build the TLS client config.
///
/// `insecure` disables certificate verification entirely. Otherwise the
/// configured CA is trusted, or the Web PKI roots when none is set.
pub fn build_tls_config(
    tls: &TlsSettings,
    insecure: bool,
) -> Result<rustls::ClientConfig, TransportError> {
    if insecure {
        return Ok(rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth());
    }

    let mut root_store = rustls::RootCertStore::empty();
    if let Some(ca_path) = &tls.ca {
        let ca_data = std::fs::read(ca_path)
            .map_err(|e| TransportError::Config(format!("failed to read CA cert: {e}")))?;

        let certs = rustls_pemfile::certs(&mut std::io::Cursor::new(&ca_data))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TransportError::Config(format!("failed to parse CA cert: {e}")))?;
        if certs.is_empty() {
            return Err(TransportError::Config(format!(
                "no certificates found in {ca_path}"
            )));
        }

        for cert in certs {
            root_store.add(cert)?;
        }
    } else {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    Ok(rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth())
}

/// SNI from config, or the host portion of the server address.
pub fn resolve_sni(
    tls: &TlsSettings,
    server: &str,
) -> Result<ServerName<'static>, TransportError> {
    let host = match &tls.sni {
        Some(sni) => sni.clone(),
        None => extract_host(server),
    };

    ServerName::try_from(host)
        .map_err(|e| TransportError::Config(format!("invalid SNI hostname: {e}")))
}

fn extract_host(server: &str) -> String {
    if let Some(stripped) = server.strip_prefix('[')
        && let Some(end) = stripped.find(']')
    {
        return stripped[..end].to_string();
    }

    if server.chars().filter(|&c| c == ':').count() == 1 {
        return server
            .rsplit_once(':')
            .map(|(h, _)| h.to_string())
            .unwrap_or_else(|| server.to_string());
    }

    server.to_string()
}

/// Apply TCP socket options.
pub fn apply_tcp_options(stream: &TcpStream, config: &TcpConfig) -> std::io::Result<()> {
    stream.set_nodelay(config.no_delay)?;

    if config.keepalive_secs > 0 {
        let sock = socket2::SockRef::from(stream);
        let keepalive =
            socket2::TcpKeepalive::new().with_time(Duration::from_secs(config.keepalive_secs));
        sock.set_tcp_keepalive(&keepalive)?;
    }

    Ok(())
}

/// Accepts any server certificate. Only installed when `insecure` is set.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::CryptoProvider::get_default()
            .map(|provider| {
                provider
                    .signature_verification_algorithms
                    .supported_schemes()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_host_parses_bracketed_ipv6() {
        assert_eq!(extract_host("[::1]:443"), "::1");
        assert_eq!(extract_host("[2001:db8::1]:8443"), "2001:db8::1");
    }

    #[test]
    fn extract_host_parses_hostname_and_port() {
        assert_eq!(extract_host("proxy.example.com:443"), "proxy.example.com");
        assert_eq!(extract_host("proxy.example.com"), "proxy.example.com");
    }

    #[test]
    fn resolve_sni_prefers_configured_name() {
        let tls = TlsSettings {
            sni: Some("cdn.example.com".into()),
            ..TlsSettings::default()
        };
        let sni = resolve_sni(&tls, "10.0.0.1:443").unwrap();
        assert_eq!(sni.to_str(), "cdn.example.com");
    }

    #[test]
    fn resolve_sni_accepts_ip_literal() {
        resolve_sni(&TlsSettings::default(), "[::1]:443").unwrap();
        resolve_sni(&TlsSettings::default(), "127.0.0.1:1081").unwrap();
    }

    #[test]
    fn missing_ca_file_is_config_error() {
        let tls = TlsSettings {
            ca: Some("/nonexistent/ca.pem".into()),
            ..TlsSettings::default()
        };
        assert!(matches!(
            build_tls_config(&tls, false),
            Err(TransportError::Config(_))
        ));
    }
}
