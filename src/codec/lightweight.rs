//! Default body encoding for the built-in message kinds.
//!
//! Bodies carry no framing of their own: binary, object and system data are
//! written verbatim, strings as UTF-8, session messages as
//! `[action][client id: u32]`, and tuples as network-order `f64` components.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{MarshallingError, MessageCodec};
use crate::{
    byte_order::{read_network_u32, write_network_u32},
    message::{ChannelId, Message, Payload, SessionAction, SystemMessageKind},
    packet::{Packet, SegmentPool},
    wire::MessageType,
};

const SESSION_BODY_LEN: usize = 5;
const TUPLE_COMPONENT_LEN: usize = 8;

/// Codec for [`Payload`] variants with a compact, header-free body layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct LightweightCodec;

impl LightweightCodec {
    fn tuple_body(components: &[f64]) -> BytesMut {
        let mut body = BytesMut::with_capacity(components.len() * TUPLE_COMPONENT_LEN);
        for component in components {
            body.put_f64(*component);
        }
        body
    }

    fn tuple_components<const N: usize>(
        kind: MessageType,
        mut body: Bytes,
    ) -> Result<[f64; N], MarshallingError> {
        if body.len() != N * TUPLE_COMPONENT_LEN {
            return Err(MarshallingError::MalformedBody {
                kind,
                len: body.len(),
            });
        }
        Ok(std::array::from_fn(|_| body.get_f64()))
    }
}

impl MessageCodec for LightweightCodec {
    fn encode(&self, message: &Message, pool: &SegmentPool) -> Result<Vec<Packet>, MarshallingError> {
        let packet = match message.payload() {
            Payload::Binary(bytes) | Payload::Object(bytes) | Payload::System { data: bytes, .. } => {
                Packet::from_slice(pool, bytes)
            }
            Payload::String(text) => Packet::from_slice(pool, text.as_bytes()),
            Payload::Session { client_id, action } => {
                let mut body = [0u8; SESSION_BODY_LEN];
                body[0] = action.code();
                body[1..].copy_from_slice(&write_network_u32(*client_id));
                Packet::from_slice(pool, &body)
            }
            Payload::Tuple1D(x) => Packet::from_slice(pool, &Self::tuple_body(&[*x])),
            Payload::Tuple2D(x, y) => Packet::from_slice(pool, &Self::tuple_body(&[*x, *y])),
            Payload::Tuple3D(x, y, z) => Packet::from_slice(pool, &Self::tuple_body(&[*x, *y, *z])),
        };
        Ok(vec![packet])
    }

    fn decode(
        &self,
        kind: MessageType,
        channel: u8,
        body: Packet,
    ) -> Result<Option<Message>, MarshallingError> {
        let bytes = body.to_bytes()?;
        let channel_id = ChannelId::new(channel);
        let payload = match kind {
            MessageType::Binary => Payload::Binary(bytes),
            MessageType::Object => Payload::Object(bytes),
            MessageType::String => Payload::String(String::from_utf8(bytes.to_vec())?),
            MessageType::System => Payload::System {
                kind: SystemMessageKind::try_from(channel)?,
                data: bytes,
            },
            MessageType::Session => {
                let [action, a, b, c, d] = <[u8; SESSION_BODY_LEN]>::try_from(bytes.as_ref())
                    .map_err(|_| MarshallingError::MalformedBody {
                        kind,
                        len: bytes.len(),
                    })?;
                Payload::Session {
                    client_id: read_network_u32([a, b, c, d]),
                    action: SessionAction::try_from(action)?,
                }
            }
            MessageType::Tuple1D => {
                let [x] = Self::tuple_components::<1>(kind, bytes)?;
                Payload::Tuple1D(x)
            }
            MessageType::Tuple2D => {
                let [x, y] = Self::tuple_components::<2>(kind, bytes)?;
                Payload::Tuple2D(x, y)
            }
            MessageType::Tuple3D => {
                let [x, y, z] = Self::tuple_components::<3>(kind, bytes)?;
                Payload::Tuple3D(x, y, z)
            }
        };
        Ok(Some(Message::new(channel_id, payload)))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::LightweightCodec;
    use crate::{
        codec::{MarshallingError, MessageCodec},
        message::{ChannelId, Message, Payload, SessionAction, SystemMessageKind},
        packet::{Packet, SegmentPool},
        wire::MessageType,
    };

    fn round_trip(message: &Message) -> Message {
        let pool = SegmentPool::default();
        let codec = LightweightCodec;
        let mut bodies = codec.encode(message, &pool).expect("encodes");
        assert_eq!(bodies.len(), 1);
        let body = bodies.remove(0);
        codec
            .decode(message.message_type(), message.channel().get(), body)
            .expect("decodes")
            .expect("complete message")
    }

    #[rstest]
    #[case::binary(Message::binary(ChannelId::new(1), vec![0, 1, 2, 255]))]
    #[case::string(Message::string(ChannelId::new(2), "héllo"))]
    #[case::system(Message::system(SystemMessageKind::PingResponse, vec![9, 9]))]
    #[case::session(Message::session(ChannelId::new(3), 77, SessionAction::Left))]
    #[case::tuple1(Message::new(ChannelId::new(4), Payload::Tuple1D(1.5)))]
    #[case::tuple2(Message::new(ChannelId::new(4), Payload::Tuple2D(-2.0, 0.25)))]
    #[case::tuple3(Message::new(ChannelId::new(4), Payload::Tuple3D(1.0, 2.0, 3.0)))]
    fn bodies_round_trip(#[case] message: Message) {
        assert_eq!(round_trip(&message), message);
    }

    #[test]
    fn session_body_layout() {
        let pool = SegmentPool::default();
        let message = Message::session(ChannelId::new(0), 0x0102_0304, SessionAction::Joined);
        let bodies = LightweightCodec.encode(&message, &pool).expect("encodes");
        assert_eq!(bodies[0].to_bytes().expect("live").as_ref(), [1, 1, 2, 3, 4]);
    }

    #[test]
    fn short_tuple_bodies_are_rejected() {
        let pool = SegmentPool::default();
        let body = Packet::from_slice(&pool, &[0; 12]);
        let err = LightweightCodec
            .decode(MessageType::Tuple2D, 0, body)
            .expect_err("12 bytes cannot hold two components");
        assert!(matches!(err, MarshallingError::MalformedBody { len: 12, .. }));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let pool = SegmentPool::default();
        let body = Packet::from_slice(&pool, &[0xff, 0xfe]);
        assert!(matches!(
            LightweightCodec.decode(MessageType::String, 0, body),
            Err(MarshallingError::InvalidUtf8(_))
        ));
    }
}
