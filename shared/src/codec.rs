//! Newline framing for [`Packet`]s on a byte stream
//!
//! Framing sits on `LinesCodec` with a `MAX_FRAME_LEN` cap. A frame that is
//! too long, not UTF-8 or not a valid packet is yielded as an `Err` item and
//! the stream keeps going; only transport failures end it.

use crate::{decode_frame, encode_frame, encode_state, Packet, ProtocolError, Snapshot, MAX_FRAME_LEN};
use bytes::BytesMut;
use std::io;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// One decoded frame: a packet, or the reason it was dropped
pub type Frame = Result<Packet, ProtocolError>;

#[derive(Debug)]
pub struct FrameCodec {
    lines: LinesCodec,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_FRAME_LEN),
        }
    }

    fn next_frame(
        &mut self,
        buf: &mut BytesMut,
        at_eof: bool,
    ) -> Result<Option<Frame>, io::Error> {
        loop {
            let buffered = buf.len();
            let line = if at_eof {
                self.lines.decode_eof(buf)
            } else {
                self.lines.decode(buf)
            };

            return match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => Ok(Some(decode_frame(&line))),
                Ok(None) => Ok(None),
                // The inner codec skips the rest of the line on its next call
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    Ok(Some(Err(ProtocolError::FrameTooLong { len: buffered })))
                }
                // The offending line has already been consumed
                Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    Ok(Some(Err(ProtocolError::InvalidUtf8)))
                }
                Err(LinesCodecError::Io(e)) => Err(e),
            };
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        self.next_frame(buf, false)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        self.next_frame(buf, true)
    }
}

impl<'a> Encoder<&'a Packet> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, packet: &'a Packet, dst: &mut BytesMut) -> Result<(), io::Error> {
        let frame = encode_frame(packet).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        dst.extend_from_slice(frame.as_bytes());
        Ok(())
    }
}

/// Writes a `state` frame straight from a shared snapshot
impl<'a> Encoder<&'a Snapshot> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, snapshot: &'a Snapshot, dst: &mut BytesMut) -> Result<(), io::Error> {
        let frame =
            encode_state(snapshot).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        dst.extend_from_slice(frame.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Direction;

    fn decode_all(codec: &mut FrameCodec, buf: &mut BytesMut) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_decodes_split_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"{\"kind\":\"input\",\"dir"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"ection\":\"up\"}\n\n{\"kind\":\"input\",\"direction\":\"left\"}\r\n");
        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[0].as_ref().unwrap(),
            &Packet::Input {
                direction: Direction::Up
            }
        );
        assert_eq!(
            frames[1].as_ref().unwrap(),
            &Packet::Input {
                direction: Direction::Left
            }
        );
    }

    #[test]
    fn test_oversized_frame_is_skipped() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&vec![b'x'; MAX_FRAME_LEN + 10][..]);
        buf.extend_from_slice(b"xxxx\n{\"kind\":\"input\",\"direction\":\"down\"}\n");

        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Err(ProtocolError::FrameTooLong { .. })));
        assert_eq!(
            frames[1].as_ref().unwrap(),
            &Packet::Input {
                direction: Direction::Down
            }
        );
    }

    #[test]
    fn test_invalid_utf8_is_dropped() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"\xff\xfe\n{\"kind\":\"input\",\"direction\":\"right\"}\n"[..]);

        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Err(ProtocolError::InvalidUtf8)));
        assert!(frames[1].is_ok());
    }

    #[test]
    fn test_trailing_frame_at_eof() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"{\"kind\":\"rejected\",\"reason\":\"full\"}"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        let frame = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(
            frame.unwrap(),
            Packet::Rejected {
                reason: "full".into()
            }
        );
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_encoders_write_one_line() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let packet = Packet::Input {
            direction: Direction::Up,
        };
        codec.encode(&packet, &mut buf).unwrap();

        let snapshot = Snapshot {
            tick: 1,
            snakes: vec![],
            food: None,
            status: crate::RoundStatus::Running,
        };
        codec.encode(&snapshot, &mut buf).unwrap();

        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref().unwrap(), &packet);
        assert_eq!(frames[1].as_ref().unwrap(), &Packet::State(snapshot));
    }
}
