//! `tokio_util` codec for [`TunnelMessage`] streams.
//!
//! Records are bincode-encoded with fixed-width integers. There is no outer
//! frame: strings and byte payloads carry their own length prefix, so a
//! record is self-delimiting. Decoding is attempted against the buffered
//! bytes and reports `Ok(None)` until a full record is present.

use std::io;

use bincode::Options;
use bytes::{Buf, BufMut, BytesMut};
use taosocks_core::MAX_MESSAGE_BYTES;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;
use crate::message::TunnelMessage;

/// Encoder/decoder for the post-upgrade message stream.
#[derive(Debug, Clone)]
pub struct TunnelCodec {
    max_message_bytes: u64,
}

impl Default for TunnelCodec {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_BYTES)
    }
}

impl TunnelCodec {
    /// Create a codec that refuses records larger than `max_message_bytes`.
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            max_message_bytes: max_message_bytes as u64,
        }
    }

    fn options(&self) -> impl Options + Copy {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_limit(self.max_message_bytes)
    }
}

impl Encoder<TunnelMessage> for TunnelCodec {
    type Error = CodecError;

    fn encode(&mut self, item: TunnelMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let opts = self.options();
        let size = opts.serialized_size(&item).map_err(CodecError::Encode)?;
        dst.reserve(size as usize);
        opts.serialize_into(dst.writer(), &item)
            .map_err(CodecError::Encode)
    }
}

impl Decoder for TunnelCodec {
    type Item = TunnelMessage;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let mut reader: &[u8] = &src[..];
        match self.options().deserialize_from::<_, TunnelMessage>(&mut reader) {
            Ok(msg) => {
                let consumed = src.len() - reader.len();
                src.advance(consumed);
                Ok(Some(msg))
            }
            Err(e) => match *e {
                bincode::ErrorKind::Io(ref io_err)
                    if io_err.kind() == io::ErrorKind::UnexpectedEof =>
                {
                    Ok(None)
                }
                _ => Err(CodecError::Decode(e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{OpenAckMessage, OpenMessage, RelayMessage};
    use bytes::Bytes;
    use taosocks_core::READ_BUF_SIZE;

    fn encode(msg: TunnelMessage) -> BytesMut {
        let mut buf = BytesMut::new();
        TunnelCodec::default().encode(msg, &mut buf).unwrap();
        buf
    }

    #[test]
    fn relay_payload_is_byte_exact() {
        for payload in [
            Bytes::new(),
            Bytes::from_static(b"\x00\x01\xff"),
            Bytes::from(vec![0xa5; READ_BUF_SIZE]),
        ] {
            let msg = TunnelMessage::Relay(RelayMessage::new(payload.clone()));
            let mut buf = encode(msg);
            let decoded = TunnelCodec::default().decode(&mut buf).unwrap();
            match decoded {
                Some(TunnelMessage::Relay(r)) => assert_eq!(r.data, payload),
                other => panic!("unexpected decode result: {:?}", other),
            }
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn kind_is_preserved() {
        let mut buf = encode(OpenMessage::new("example.com:443").into());
        buf.extend_from_slice(&encode(OpenAckMessage { status: false }.into()));

        let mut codec = TunnelCodec::default();
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(TunnelMessage::Open(OpenMessage::new("example.com:443")))
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(TunnelMessage::OpenAck(OpenAckMessage { status: false }))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn partial_record_waits_for_more() {
        let full = encode(RelayMessage::new(Bytes::from_static(b"hello world")).into());
        let mut codec = TunnelCodec::default();

        let mut buf = BytesMut::new();
        for (i, byte) in full.iter().enumerate() {
            buf.put_u8(*byte);
            let res = codec.decode(&mut buf).unwrap();
            if i + 1 < full.len() {
                assert!(res.is_none(), "decoded early at byte {i}");
                assert_eq!(buf.len(), i + 1);
            } else {
                assert_eq!(
                    res,
                    Some(TunnelMessage::Relay(RelayMessage::new(
                        Bytes::from_static(b"hello world")
                    )))
                );
            }
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut buf = BytesMut::from(&[9u8, 0, 0, 0, 0, 0, 0, 0][..]);
        let err = TunnelCodec::default().decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        // Relay tag followed by a length far beyond the limit.
        let mut buf = BytesMut::new();
        buf.put_u32_le(2);
        buf.put_u64_le(u64::MAX / 2);
        let err = TunnelCodec::new(1024).decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn oversized_payload_is_not_encoded() {
        let mut codec = TunnelCodec::new(64);
        let mut buf = BytesMut::new();
        let err = codec
            .encode(RelayMessage::new(vec![0u8; 128]).into(), &mut buf)
            .unwrap_err();
        assert!(matches!(err, CodecError::Encode(_)));
    }
}
