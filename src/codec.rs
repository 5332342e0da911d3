// src/codec.rs

//! Streaming msgpack codec.
//!
//! Wraps the external msgpack codec (`rmpv`) with direction-specific
//! configuration and adapts it to `tokio_util`'s framing traits. Decoding
//! buffers partial messages across TCP packet boundaries and yields each
//! message as soon as a complete unit is available, preserving arrival
//! order within one connection. Framing is entirely the decoder's job:
//! messages are written back to back with no length prefix.

use std::io::{self, Cursor};

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::{CodecOptions, DecodeOptions, EncodeOptions};
use crate::error::Error;
use crate::protocol::Message;

/// Frames [`Message`]s on a raw byte stream.
///
/// Constructed once per connection from the role's [`CodecOptions`].
#[derive(Debug)]
pub struct MessageCodec {
    // ---
    encode: EncodeOptions,
    decode: DecodeOptions,
}

impl MessageCodec {
    /// Create a codec with the given per-direction options.
    pub fn new(options: CodecOptions) -> Self {
        // ---
        Self {
            encode: options.encode,
            decode: options.decode,
        }
    }
}

/// True when `err` means the buffer holds an incomplete message rather
/// than an invalid one.
fn is_incomplete(err: &rmpv::decode::Error) -> bool {
    // ---
    match err {
        rmpv::decode::Error::InvalidMarkerRead(io) | rmpv::decode::Error::InvalidDataRead(io)
            if io.kind() == io::ErrorKind::UnexpectedEof =>
        {
            true
        }
        _ => false,
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, Error> {
        // ---
        if src.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&src[..]);
        match rmpv::decode::read_value(&mut cursor) {
            Ok(value) => {
                let consumed = cursor.position() as usize;
                src.advance(consumed);
                Message::from_value(value).map(Some)
            }
            Err(err) if is_incomplete(&err) => {
                if src.len() > self.decode.max_message_len {
                    return Err(Error::Protocol(format!(
                        "incoming message exceeds {} bytes",
                        self.decode.max_message_len
                    )));
                }
                Ok(None)
            }
            Err(err) => Err(Error::Decode(err)),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), Error> {
        // ---
        dst.reserve(self.encode.reserve);
        let mut writer = dst.writer();
        rmpv::encode::write_value(&mut writer, &message.into_value())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use rmpv::Value;

    fn request() -> Message {
        Message::Request {
            id: 7,
            method: "sum".to_owned(),
            params: vec![Value::from(1), Value::from(2)],
        }
    }

    fn encoded(message: Message) -> BytesMut {
        // ---
        let mut codec = MessageCodec::new(CodecOptions::default());
        let mut buf = BytesMut::new();
        codec.encode(message, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_decode_whole_message() {
        // ---
        let mut codec = MessageCodec::new(CodecOptions::default());
        let mut buf = encoded(request());

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, request());
        assert!(buf.is_empty());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_buffers_partial_message() {
        // ---
        let bytes = encoded(request());
        let mut codec = MessageCodec::new(CodecOptions::default());

        let mut buf = BytesMut::from(&bytes[..3]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[3..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, request());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_back_to_back_messages_in_order() {
        // ---
        let second = Message::Notification {
            method: "qux".to_owned(),
            params: vec![Value::from("a")],
        };

        let mut buf = encoded(request());
        buf.extend_from_slice(&encoded(second.clone()));

        let mut codec = MessageCodec::new(CodecOptions::default());
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), request());
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), second);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_rejects_oversized_incomplete_message() {
        // ---
        let options = CodecOptions::default().with_decode(DecodeOptions {
            max_message_len: 8,
        });
        let mut codec = MessageCodec::new(options);

        // str32 header claiming a 4 GiB payload, followed by a few bytes:
        // incomplete, and already past the cap.
        let mut buf = BytesMut::from(&[0xdb, 0xff, 0xff, 0xff, 0xff][..]);
        buf.extend_from_slice(&[0u8; 12]);

        assert!(matches!(codec.decode(&mut buf), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_rejects_invalid_marker() {
        // ---
        // 0xc1 is the one marker msgpack never uses.
        let mut codec = MessageCodec::new(CodecOptions::default());
        let mut buf = BytesMut::from(&[0xc1][..]);

        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_encode_decode_response_round_trip() {
        // ---
        let response = Message::response(3, Err(Value::from("boom")));

        let mut codec = MessageCodec::new(CodecOptions::default());
        let mut buf = encoded(response.clone());
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), response);
    }
}
