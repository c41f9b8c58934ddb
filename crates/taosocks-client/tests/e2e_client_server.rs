//! End-to-end tests: smart relayer and front ends against loopback targets
//! and an in-process tunnel server.

#![allow(clippy::tests_outside_test_module)]
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use taosocks_client::{
    ClientStream, HandshakeReply, RelayError, Relayer, RelayerKind, SmartRelayer, serve,
};
use taosocks_config::{ClientConfig, TcpConfig};
use taosocks_proto::{OpenAckMessage, RelayMessage, TunnelCodec, TunnelMessage};
use taosocks_rules::{Classification, HostClassifier};
use taosocks_transport::TunnelConnector;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_rustls::TlsAcceptor;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

#[ctor::ctor]
fn init_crypto() {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install aws-lc-rs crypto provider");
}

const TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Classifier and reply doubles
// ============================================================================

#[derive(Default)]
struct Learned {
    recorded: Vec<(String, u16, Classification)>,
    deleted: Vec<String>,
}

/// Classifies every host the same way and records mutations.
struct FixedClassifier {
    class: Classification,
    learned: Mutex<Learned>,
}

impl FixedClassifier {
    fn new(class: Classification) -> Arc<Self> {
        Arc::new(Self {
            class,
            learned: Mutex::new(Learned::default()),
        })
    }

    fn recorded(&self) -> Vec<(String, u16, Classification)> {
        self.learned.lock().unwrap().recorded.clone()
    }

    fn deleted(&self) -> Vec<String> {
        self.learned.lock().unwrap().deleted.clone()
    }
}

impl HostClassifier for FixedClassifier {
    fn classify(&self, _hostname: &str, _port: u16) -> Classification {
        self.class
    }

    fn record_auto(&self, hostname: &str, port: u16, class: Classification) {
        self.learned
            .lock()
            .unwrap()
            .recorded
            .push((hostname.to_string(), port, class));
    }

    fn delete_auto(&self, hostname: &str) {
        self.learned
            .lock()
            .unwrap()
            .deleted
            .push(hostname.to_string());
    }
}

/// Classifies by port, so one relayer can mix routes; unknown ports go
/// through the tunnel.
struct PortClassifier {
    by_port: HashMap<u16, Classification>,
    recorded: Mutex<Vec<(String, u16, Classification)>>,
}

impl HostClassifier for PortClassifier {
    fn classify(&self, _hostname: &str, port: u16) -> Classification {
        self.by_port
            .get(&port)
            .copied()
            .unwrap_or(Classification::Proxy)
    }

    fn record_auto(&self, hostname: &str, port: u16, class: Classification) {
        self.recorded
            .lock()
            .unwrap()
            .push((hostname.to_string(), port, class));
    }

    fn delete_auto(&self, _hostname: &str) {}
}

#[derive(Default)]
struct Recorder {
    before_relay: usize,
    failures: Vec<&'static str>,
    fail_reply: bool,
}

#[async_trait]
impl<S: ClientStream> HandshakeReply<S> for Recorder {
    async fn before_relay(&mut self, _relayer: &mut Relayer<S>) -> io::Result<()> {
        self.before_relay += 1;
        if self.fail_reply {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"));
        }
        Ok(())
    }

    async fn on_failure(&mut self, _client: &mut S, error: &RelayError) {
        self.failures.push(error.root_cause().kind());
    }
}

// ============================================================================
// Targets
// ============================================================================

/// Echoes every connection; counts accepted connections.
async fn start_echo_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let (mut r, mut w) = stream.into_split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });

    (addr, accepted)
}

/// Reads `ping`, answers `pong`, closes.
async fn start_ping_pong_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4];
                if stream.read_exact(&mut buf).await.is_ok() && &buf == b"ping" {
                    let _ = stream.write_all(b"pong").await;
                }
            });
        }
    });

    addr
}

/// Accepts connections and holds them open without reading or writing.
async fn start_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    addr
}

/// An address nothing listens on.
async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

// ============================================================================
// Mock tunnel server
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Verdict {
    /// Acknowledge every open and relay to this address, whatever was asked.
    Accept(SocketAddr),
    /// Answer every open with a negative ack.
    Refuse,
}

#[derive(Debug, PartialEq, Eq)]
enum ServerEvent {
    Upgrade(String),
    Open(String),
    TunnelClosed,
}

struct MockTunnel {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
}

impl MockTunnel {
    async fn next_event(&mut self) -> ServerEvent {
        tokio::time::timeout(TIMEOUT, self.events.recv())
            .await
            .expect("tunnel event timed out")
            .expect("tunnel server gone")
    }
}

fn tls_acceptor() -> TlsAcceptor {
    use rcgen::{CertificateParams, KeyPair, PKCS_ECDSA_P256_SHA256};

    let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
    let mut params = CertificateParams::default();
    params.subject_alt_names = vec![
        rcgen::SanType::DnsName("localhost".try_into().unwrap()),
        rcgen::SanType::IpAddress(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
    ];
    let cert = params.self_signed(&key_pair).unwrap();
    let cert_der: CertificateDer<'static> = cert.der().clone();

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(
            vec![cert_der],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der())),
        )
        .unwrap();
    TlsAcceptor::from(Arc::new(server_config))
}

async fn start_tunnel_server(verdict: Verdict) -> MockTunnel {
    let acceptor = tls_acceptor();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();
    let (events_tx, events) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_tunnel(
                acceptor.clone(),
                tcp,
                verdict,
                events_tx.clone(),
            ));
        }
    });

    MockTunnel {
        addr,
        connections,
        events,
    }
}

async fn serve_tunnel(
    acceptor: TlsAcceptor,
    tcp: TcpStream,
    verdict: Verdict,
    events: mpsc::UnboundedSender<ServerEvent>,
) {
    let Ok(mut tls) = acceptor.accept(tcp).await else {
        return;
    };

    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match tls.read(&mut byte).await {
            Ok(1) => head.push(byte[0]),
            _ => return,
        }
    }
    let _ = events.send(ServerEvent::Upgrade(
        String::from_utf8_lossy(&head).into_owned(),
    ));
    let upgraded = b"HTTP/1.1 101 Switching Protocols\r\nConnection: upgrade\r\nUpgrade: taosocks/20200610\r\n\r\n";
    if tls.write_all(upgraded).await.is_err() || tls.flush().await.is_err() {
        return;
    }

    let mut framed = Framed::new(tls, TunnelCodec::default());
    let Some(Ok(TunnelMessage::Open(open))) = framed.next().await else {
        return;
    };
    let _ = events.send(ServerEvent::Open(open.addr));

    let upstream = match verdict {
        Verdict::Accept(upstream) => TcpStream::connect(upstream).await.ok(),
        Verdict::Refuse => None,
    };
    let Some(target) = upstream else {
        let _ = framed.send(OpenAckMessage { status: false }.into()).await;
        while let Some(Ok(_)) = framed.next().await {}
        let _ = events.send(ServerEvent::TunnelClosed);
        return;
    };
    if framed
        .send(OpenAckMessage { status: true }.into())
        .await
        .is_err()
    {
        return;
    }

    let (mut sink, mut stream) = framed.split::<TunnelMessage>();
    let (mut target_r, mut target_w) = target.into_split();
    // The tunnel ending tears down the target connection as well.
    let tunnel_done = CancellationToken::new();
    let to_target = async {
        while let Some(Ok(TunnelMessage::Relay(msg))) = stream.next().await {
            if target_w.write_all(&msg.data).await.is_err() {
                break;
            }
        }
        let _ = target_w.shutdown().await;
        tunnel_done.cancel();
    };
    let from_target = async {
        let mut buf = vec![0u8; 8192];
        loop {
            let read = tokio::select! {
                _ = tunnel_done.cancelled() => break,
                r = target_r.read(&mut buf) => r,
            };
            match read {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let msg = RelayMessage::new(Bytes::copy_from_slice(&buf[..n]));
                    if sink.send(msg.into()).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sink.close().await;
    };
    tokio::join!(to_target, from_target);
    let _ = events.send(ServerEvent::TunnelClosed);
}

fn connector(server: SocketAddr) -> Arc<TunnelConnector> {
    let config = ClientConfig {
        server: server.to_string(),
        insecure: true,
        key: "secret".into(),
        path: "/tunnel".into(),
        ..ClientConfig::default()
    };
    Arc::new(TunnelConnector::from_config(&config).unwrap())
}

fn smart_relayer(classifier: Arc<FixedClassifier>, tunnel: SocketAddr) -> SmartRelayer {
    SmartRelayer::new(
        classifier,
        connector(tunnel),
        Duration::from_secs(2),
        TcpConfig::default(),
    )
}

/// Write `payload`, read the same number of bytes back, then hang up.
async fn echo_through(client: DuplexStream, payload: Vec<u8>) -> Vec<u8> {
    let (mut rd, mut wr) = tokio::io::split(client);
    let len = payload.len();
    let writer = tokio::spawn(async move {
        wr.write_all(&payload).await.unwrap();
        wr
    });
    let mut echoed = vec![0u8; len];
    rd.read_exact(&mut echoed).await.unwrap();
    let wr = writer.await.unwrap();
    drop(rd.unsplit(wr));
    echoed
}

// ============================================================================
// Smart relayer
// ============================================================================

#[tokio::test]
async fn reject_opens_no_socket() {
    let (echo, echo_accepted) = start_echo_server().await;
    let tunnel = start_tunnel_server(Verdict::Accept(echo)).await;
    let classifier = FixedClassifier::new(Classification::Reject);
    let relayer = smart_relayer(classifier.clone(), tunnel.addr);

    let (_client, relay_end) = tokio::io::duplex(1024);
    let mut reply = Recorder::default();
    let err = relayer
        .relay(&echo.to_string(), relay_end, &mut reply)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Rejected));
    assert_eq!(reply.failures, ["rejected"]);
    assert_eq!(reply.before_relay, 0);
    assert_eq!(echo_accepted.load(Ordering::SeqCst), 0);
    assert_eq!(tunnel.connections.load(Ordering::SeqCst), 0);
    assert!(classifier.recorded().is_empty());
    assert!(classifier.deleted().is_empty());
}

#[tokio::test]
async fn direct_relay_reports_exact_counts() {
    let (echo, echo_accepted) = start_echo_server().await;
    let tunnel = start_tunnel_server(Verdict::Refuse).await;
    let relayer = smart_relayer(FixedClassifier::new(Classification::Direct), tunnel.addr);

    let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    let (client, relay_end) = tokio::io::duplex(64 * 1024);
    let target = echo.to_string();
    let relay = tokio::spawn(async move {
        let mut reply = Recorder::default();
        let result = relayer.relay(&target, relay_end, &mut reply).await;
        (result, reply)
    });

    let echoed = echo_through(client, payload.clone()).await;
    assert_eq!(echoed, payload);

    let (result, reply) = tokio::time::timeout(TIMEOUT, relay).await.unwrap().unwrap();
    let result = result.unwrap();
    assert_eq!(result.tx, 100_000);
    assert_eq!(result.rx, 100_000);
    assert!(result.is_clean(), "{result:?}");
    assert_eq!(reply.before_relay, 1);
    assert_eq!(echo_accepted.load(Ordering::SeqCst), 1);
    assert_eq!(tunnel.connections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn proxy_upgrades_before_open_and_relays() {
    let target = start_ping_pong_server().await;
    let mut tunnel = start_tunnel_server(Verdict::Accept(target)).await;
    let classifier = FixedClassifier::new(Classification::Proxy);
    let relayer = smart_relayer(classifier.clone(), tunnel.addr);

    let (mut client, relay_end) = tokio::io::duplex(1024);
    let host = "blocked.example:443";
    let relay = tokio::spawn(async move {
        let mut reply = Recorder::default();
        relayer.relay(host, relay_end, &mut reply).await
    });

    let ServerEvent::Upgrade(head) = tunnel.next_event().await else {
        panic!("expected upgrade first");
    };
    assert!(head.starts_with("GET /tunnel HTTP/1.1\r\n"), "head: {head}");
    assert!(head.contains(&format!("Host: {}\r\n", tunnel.addr)));
    assert!(head.contains("Connection: upgrade\r\n"));
    assert!(head.contains("Upgrade: taosocks/20200610\r\n"));
    assert!(head.contains("Authorization: taosocks secret\r\n"));
    assert_eq!(tunnel.next_event().await, ServerEvent::Open(host.into()));

    client.write_all(b"ping").await.unwrap();
    let mut got = Vec::new();
    client.read_to_end(&mut got).await.unwrap();
    assert_eq!(got, b"pong");
    drop(client);

    let result = tokio::time::timeout(TIMEOUT, relay)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(result.tx, 4);
    assert_eq!(result.rx, 4);
    assert!(result.is_clean(), "{result:?}");
    assert!(classifier.recorded().is_empty());
}

#[tokio::test]
async fn proxy_relay_ends_after_client_hangs_up() {
    let silent = start_silent_server().await;
    let mut tunnel = start_tunnel_server(Verdict::Accept(silent)).await;
    let relayer = smart_relayer(FixedClassifier::new(Classification::Proxy), tunnel.addr);

    let (mut client, relay_end) = tokio::io::duplex(1024);
    let relay = tokio::spawn(async move {
        relayer
            .relay("quiet.example:443", relay_end, &mut ())
            .await
    });

    assert!(matches!(tunnel.next_event().await, ServerEvent::Upgrade(_)));
    assert!(matches!(tunnel.next_event().await, ServerEvent::Open(_)));
    client.write_all(b"hello").await.unwrap();
    drop(client);

    let result = tokio::time::timeout(TIMEOUT, relay)
        .await
        .expect("relay outlived its client")
        .unwrap()
        .unwrap();
    assert_eq!(result.tx, 5);
    assert_eq!(result.rx, 0);
    assert!(result.is_clean(), "{result:?}");
    assert_eq!(tunnel.next_event().await, ServerEvent::TunnelClosed);
}

#[tokio::test]
async fn auto_direct_falls_back_and_learns_proxy() {
    let blocked = closed_port().await;
    let target = start_ping_pong_server().await;
    let mut tunnel = start_tunnel_server(Verdict::Accept(target)).await;
    let classifier = FixedClassifier::new(Classification::AutoDirect);
    let relayer = smart_relayer(classifier.clone(), tunnel.addr);

    let (mut client, relay_end) = tokio::io::duplex(1024);
    let host = blocked.to_string();
    let relay = tokio::spawn(async move {
        let mut reply = Recorder::default();
        let result = relayer.relay(&host, relay_end, &mut reply).await;
        (result, reply)
    });

    assert!(matches!(tunnel.next_event().await, ServerEvent::Upgrade(_)));
    assert_eq!(
        tunnel.next_event().await,
        ServerEvent::Open(blocked.to_string())
    );

    client.write_all(b"ping").await.unwrap();
    let mut got = Vec::new();
    client.read_to_end(&mut got).await.unwrap();
    assert_eq!(got, b"pong");
    drop(client);

    let (result, reply) = tokio::time::timeout(TIMEOUT, relay).await.unwrap().unwrap();
    let result = result.unwrap();
    assert_eq!(result.tx, 4);
    assert_eq!(result.rx, 4);
    assert_eq!(reply.before_relay, 1);
    assert!(reply.failures.is_empty());
    assert_eq!(
        classifier.recorded(),
        [(
            "127.0.0.1".to_string(),
            blocked.port(),
            Classification::AutoProxy
        )]
    );
    assert!(classifier.deleted().is_empty());
}

#[tokio::test]
async fn auto_direct_forgets_host_the_tunnel_cannot_reach() {
    let blocked = closed_port().await;
    let tunnel = start_tunnel_server(Verdict::Refuse).await;
    let classifier = FixedClassifier::new(Classification::AutoDirect);
    let relayer = smart_relayer(classifier.clone(), tunnel.addr);

    let (_client, relay_end) = tokio::io::duplex(1024);
    let mut reply = Recorder::default();
    let err = relayer
        .relay(&blocked.to_string(), relay_end, &mut reply)
        .await
        .unwrap_err();

    let RelayError::NoRelayer { host, cause } = err else {
        panic!("expected NoRelayer");
    };
    assert_eq!(host, blocked.to_string());
    assert!(matches!(*cause, RelayError::RemoteCannotConnectHost));
    assert_eq!(reply.failures, ["remote_target"]);
    assert_eq!(tunnel.connections.load(Ordering::SeqCst), 1);
    assert_eq!(classifier.deleted(), ["127.0.0.1"]);
    assert!(classifier.recorded().is_empty());
}

#[tokio::test]
async fn auto_proxy_keeps_rule_when_tunnel_server_is_down() {
    let blocked = closed_port().await;
    let dead_tunnel = closed_port().await;
    let classifier = FixedClassifier::new(Classification::AutoProxy);
    let relayer = smart_relayer(classifier.clone(), dead_tunnel);

    let (_client, relay_end) = tokio::io::duplex(1024);
    let mut reply = Recorder::default();
    let err = relayer
        .relay(&blocked.to_string(), relay_end, &mut reply)
        .await
        .unwrap_err();

    assert!(matches!(
        err.root_cause(),
        RelayError::CannotDialRemoteServer(_)
    ));
    assert_eq!(reply.failures, ["remote_dial"]);
    assert!(classifier.deleted().is_empty());
    assert!(classifier.recorded().is_empty());
}

#[tokio::test]
async fn direct_failure_does_not_fall_back() {
    let blocked = closed_port().await;
    let tunnel = start_tunnel_server(Verdict::Refuse).await;
    let classifier = FixedClassifier::new(Classification::Direct);
    let relayer = smart_relayer(classifier.clone(), tunnel.addr);

    let (_client, relay_end) = tokio::io::duplex(1024);
    let mut reply = Recorder::default();
    let err = relayer
        .relay(&blocked.to_string(), relay_end, &mut reply)
        .await
        .unwrap_err();

    assert!(matches!(err.root_cause(), RelayError::Dial(_)));
    assert_eq!(err.kind(), "unreachable");
    assert_eq!(reply.failures, ["direct_dial"]);
    assert_eq!(tunnel.connections.load(Ordering::SeqCst), 0);
    assert!(classifier.deleted().is_empty());
    assert!(classifier.recorded().is_empty());
}

#[tokio::test]
async fn failed_reply_skips_relay() {
    let (echo, echo_accepted) = start_echo_server().await;
    let tunnel = start_tunnel_server(Verdict::Refuse).await;
    let relayer = smart_relayer(FixedClassifier::new(Classification::Direct), tunnel.addr);

    let (mut client, relay_end) = tokio::io::duplex(1024);
    let mut reply = Recorder {
        fail_reply: true,
        ..Recorder::default()
    };
    let err = relayer
        .relay(&echo.to_string(), relay_end, &mut reply)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::HandshakeReply(_)));
    // Let the echo server's accept task run before reading its counter.
    let _ = tokio::time::timeout(TIMEOUT, async {
        while echo_accepted.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert_eq!(echo_accepted.load(Ordering::SeqCst), 1);
    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn negative_ack_leaves_tunnel_open_until_close() {
    let mut tunnel = start_tunnel_server(Verdict::Refuse).await;
    let mut relayer: Relayer<DuplexStream> = Relayer::remote(connector(tunnel.addr));
    assert_eq!(relayer.kind(), RelayerKind::Remote);

    let (_client, relay_end) = tokio::io::duplex(1024);
    let err = relayer
        .begin("unreachable.example:80", relay_end)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::RemoteCannotConnectHost));

    assert!(matches!(tunnel.next_event().await, ServerEvent::Upgrade(_)));
    assert!(matches!(tunnel.next_event().await, ServerEvent::Open(_)));
    assert!(
        tokio::time::timeout(Duration::from_millis(300), tunnel.events.recv())
            .await
            .is_err(),
        "tunnel closed before the relayer was closed"
    );

    assert!(relayer.take_client().is_some());
    relayer.close();
    assert_eq!(tunnel.next_event().await, ServerEvent::TunnelClosed);
}

#[tokio::test]
async fn concurrent_relays_keep_independent_results() {
    let (echo, echo_accepted) = start_echo_server().await;
    let blocked = closed_port().await;
    let tunnel = start_tunnel_server(Verdict::Accept(echo)).await;
    let classifier = Arc::new(PortClassifier {
        by_port: HashMap::from([
            (echo.port(), Classification::Direct),
            (blocked.port(), Classification::AutoDirect),
        ]),
        recorded: Mutex::new(Vec::new()),
    });
    let relayer = Arc::new(SmartRelayer::new(
        classifier.clone(),
        connector(tunnel.addr),
        Duration::from_secs(2),
        TcpConfig::default(),
    ));

    let mut tasks = Vec::new();
    for i in 0..100usize {
        let relayer = relayer.clone();
        // Direct to the echo server, through the tunnel, or a failed direct
        // dial that falls back to the tunnel.
        let target = match i % 3 {
            0 => echo.to_string(),
            1 => format!("proxied-{i}.example:443"),
            _ => blocked.to_string(),
        };
        tasks.push(tokio::spawn(async move {
            let len = 1 + i * 97;
            let payload: Vec<u8> = (0..len).map(|b| (b + i) as u8).collect();
            let (client, relay_end) = tokio::io::duplex(16 * 1024);
            let relay = tokio::spawn(async move {
                relayer.relay(&target, relay_end, &mut ()).await
            });
            let echoed = echo_through(client, payload.clone()).await;
            assert_eq!(echoed, payload, "relay {i} mixed data");
            let result = relay.await.unwrap().unwrap();
            (i, len as u64, result)
        }));
    }

    for task in tasks {
        let (i, len, result) = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
        assert_eq!(result.tx, len, "relay {i}");
        assert_eq!(result.rx, len, "relay {i}");
        assert!(result.is_clean(), "relay {i}: {result:?}");
    }
    assert_eq!(echo_accepted.load(Ordering::SeqCst), 100);
    assert_eq!(tunnel.connections.load(Ordering::SeqCst), 66);
    let recorded = classifier.recorded.lock().unwrap().clone();
    assert_eq!(recorded.len(), 33);
    assert!(
        recorded
            .iter()
            .all(|(_, port, class)| *port == blocked.port() && *class == Classification::AutoProxy)
    );
}

// ============================================================================
// Front ends through the accept loop
// ============================================================================

async fn start_client(class: Classification) -> (SocketAddr, CancellationToken) {
    let dead_tunnel = closed_port().await;
    let relayer = Arc::new(smart_relayer(FixedClassifier::new(class), dead_tunnel));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(serve(listener, relayer, shutdown.clone()));
    (addr, shutdown)
}

fn socks5_connect_request(target: SocketAddr) -> Vec<u8> {
    let SocketAddr::V4(v4) = target else {
        panic!("ipv4 only");
    };
    let mut req = vec![0x05, 0x01, 0x00, 0x01];
    req.extend_from_slice(&v4.ip().octets());
    req.extend_from_slice(&v4.port().to_be_bytes());
    req
}

#[tokio::test]
async fn socks5_connect_through_listener() {
    let (echo, _) = start_echo_server().await;
    let (proxy, shutdown) = start_client(Classification::Direct).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await.unwrap();
    assert_eq!(method, [0x05, 0x00]);

    stream.write_all(&socks5_connect_request(echo)).await.unwrap();
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);

    stream.write_all(b"over socks5").await.unwrap();
    let mut echoed = [0u8; 11];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"over socks5");
    shutdown.cancel();
}

#[tokio::test]
async fn socks5_rejected_host_gets_not_allowed() {
    let (echo, echo_accepted) = start_echo_server().await;
    let (proxy, shutdown) = start_client(Classification::Reject).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await.unwrap();

    stream.write_all(&socks5_connect_request(echo)).await.unwrap();
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[1], 0x02);
    assert_eq!(echo_accepted.load(Ordering::SeqCst), 0);
    shutdown.cancel();
}

#[tokio::test]
async fn socks4a_connect_through_listener() {
    let (echo, _) = start_echo_server().await;
    let (proxy, shutdown) = start_client(Classification::Direct).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let mut req = vec![0x04, 0x01];
    req.extend_from_slice(&echo.port().to_be_bytes());
    req.extend_from_slice(&[0, 0, 0, 1]);
    req.extend_from_slice(b"user\0127.0.0.1\0");
    stream.write_all(&req).await.unwrap();

    let mut reply = [0u8; 8];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[..2], [0x00, 0x5A]);

    stream.write_all(b"four").await.unwrap();
    let mut echoed = [0u8; 4];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"four");
    shutdown.cancel();
}

#[tokio::test]
async fn http_connect_through_listener() {
    let (echo, _) = start_echo_server().await;
    let (proxy, shutdown) = start_client(Classification::Direct).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let request = format!("CONNECT {echo} HTTP/1.1\r\nHost: {echo}\r\n\r\nearly");
    stream.write_all(request.as_bytes()).await.unwrap();

    let expected = b"HTTP/1.1 200 Connection established\r\n\r\n";
    let mut reply = vec![0u8; expected.len()];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, expected);

    // Bytes sent right behind the request head are relayed too.
    let mut echoed = [0u8; 5];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"early");
    shutdown.cancel();
}

#[tokio::test]
async fn http_forward_rewrites_request_head() {
    let origin = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin_addr = origin.local_addr().unwrap();
    let (head_tx, head_rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut stream, _) = origin.accept().await.unwrap();
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            if stream.read(&mut byte).await.unwrap() == 0 {
                return;
            }
            head.push(byte[0]);
        }
        let _ = head_tx.send(String::from_utf8(head).unwrap());
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
            .await
            .unwrap();
    });
    let (proxy, shutdown) = start_client(Classification::Direct).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let request = format!(
        "GET http://{origin_addr}/hello?x=1 HTTP/1.1\r\nHost: {origin_addr}\r\n\
         Proxy-Connection: keep-alive\r\nAccept: */*\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(TIMEOUT, stream.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with(b"\r\n\r\nok"));

    let head = head_rx.await.unwrap();
    assert_eq!(
        head,
        format!(
            "GET /hello?x=1 HTTP/1.1\r\nHost: {origin_addr}\r\nAccept: */*\r\nConnection: close\r\n\r\n"
        )
    );
    shutdown.cancel();
}

#[tokio::test]
async fn http_rejected_host_gets_forbidden() {
    let (proxy, shutdown) = start_client(Classification::Reject).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream
        .write_all(b"CONNECT ads.example:443 HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(TIMEOUT, stream.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert!(response.starts_with(b"HTTP/1.1 403 Forbidden\r\n"));
    shutdown.cancel();
}
