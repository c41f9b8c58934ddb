//! Benchmarks for tunnel message encoding and decoding.

use bytes::{Bytes, BytesMut};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use taosocks_core::READ_BUF_SIZE;
use taosocks_proto::{RelayMessage, TunnelCodec, TunnelMessage, parse_upgrade_response};
use tokio_util::codec::{Decoder, Encoder};

fn encoded(msg: TunnelMessage) -> BytesMut {
    let mut buf = BytesMut::new();
    TunnelCodec::default().encode(msg, &mut buf).unwrap();
    buf
}

fn bench_encode_relay_full(c: &mut Criterion) {
    let payload = Bytes::from(vec![0x42; READ_BUF_SIZE]);
    let mut codec = TunnelCodec::default();
    let mut buf = BytesMut::with_capacity(READ_BUF_SIZE * 2);

    c.bench_function("encode_relay_full_chunk", |b| {
        b.iter(|| {
            buf.clear();
            let msg = TunnelMessage::Relay(RelayMessage::new(payload.clone()));
            codec.encode(black_box(msg), &mut buf).unwrap();
        })
    });
}

fn bench_decode_relay_full(c: &mut Criterion) {
    let wire = encoded(RelayMessage::new(vec![0x42; READ_BUF_SIZE]).into());
    let mut codec = TunnelCodec::default();

    c.bench_function("decode_relay_full_chunk", |b| {
        b.iter(|| {
            let mut buf = wire.clone();
            codec.decode(black_box(&mut buf)).unwrap()
        })
    });
}

fn bench_decode_relay_small(c: &mut Criterion) {
    let wire = encoded(RelayMessage::new(&b"GET / HTTP/1.1\r\n\r\n"[..]).into());
    let mut codec = TunnelCodec::default();

    c.bench_function("decode_relay_small", |b| {
        b.iter(|| {
            let mut buf = wire.clone();
            codec.decode(black_box(&mut buf)).unwrap()
        })
    });
}

fn bench_parse_upgrade_response(c: &mut Criterion) {
    let resp = b"HTTP/1.1 101 Switching Protocols\r\nConnection: upgrade\r\nUpgrade: taosocks/20200610\r\n\r\n";

    c.bench_function("parse_upgrade_response", |b| {
        b.iter(|| parse_upgrade_response(black_box(resp)))
    });
}

criterion_group!(
    benches,
    bench_encode_relay_full,
    bench_decode_relay_full,
    bench_decode_relay_small,
    bench_parse_upgrade_response,
);
criterion_main!(benches);
