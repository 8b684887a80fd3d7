//! Control messages: opcodes, their arguments, and splitting an argument list
//! over as many frames as it needs.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

use crate::Error;
use crate::constants::MPU_CTRL;
use crate::histo::{Histogram, Label};
use crate::message::Message;
use crate::session::SessionId;

/// The operation requested by a control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Start = 0,
    Stop = 1,
    Ignore = 2,
    SendPadding = 3,
    AppHint = 4,
    BurstHistogram = 5,
    InjectHistogram = 6,
    TotalPad = 7,
    PayloadPad = 8,
    BatchPad = 9,
    GapHistogram = 10,
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Opcode::Start,
            1 => Opcode::Stop,
            2 => Opcode::Ignore,
            3 => Opcode::SendPadding,
            4 => Opcode::AppHint,
            5 => Opcode::BurstHistogram,
            6 => Opcode::InjectHistogram,
            7 => Opcode::TotalPad,
            8 => Opcode::PayloadPad,
            9 => Opcode::BatchPad,
            10 => Opcode::GapHistogram,
            _ => Err(Error::MalformedFrame(format!("unknown opcode {value}")))?,
        })
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}

/// Split a serialized argument list into CONTROL frames. Every frame carries
/// the opcode and the length of the full list, so the receiver can
/// concatenate the chunks back together. An empty argument list gives a
/// single frame.
pub fn build_control(opcode: Opcode, args: &[u8]) -> Result<Vec<Message>, Error> {
    let args_total = u16::try_from(args.len()).map_err(|_| Error::MessageTooLong(args.len()))?;
    if args.is_empty() {
        return Ok(vec![Message::control(opcode, vec![], 0)]);
    }
    Ok(args
        .chunks(MPU_CTRL)
        .map(|chunk| Message::control(opcode, chunk.to_vec(), args_total))
        .collect())
}

/// A control message with typed arguments. Arguments are exchanged as a
/// compact JSON array.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Start padding.
    Start,
    /// Stop padding.
    Stop,
    /// Ask the peer to reply with one padding frame.
    Ignore,
    /// Ask the peer to send `count` padding frames after `delay_ms`.
    SendPadding { count: u32, delay_ms: u64 },
    /// Tell the server that the client began or finished visiting.
    AppHint { session: SessionId, visiting: bool },
    /// Delay distribution for padding after real data.
    BurstHistogram(Histogram),
    /// Delay distribution for padding after padding.
    GapHistogram(Histogram),
    /// Distribution of padding on a silent wire. Accepted but not acted on.
    InjectHistogram(Histogram),
    /// Pad until the message count is a power of two, one frame every
    /// `delay_ms`.
    TotalPad { session: SessionId, delay_ms: u64 },
    /// Pad until the message count is a multiple of the power of two closest
    /// to the data message count.
    PayloadPad { session: SessionId, delay_ms: u64 },
    /// Pad until the message count is a multiple of `batch`.
    BatchPad {
        session: SessionId,
        batch: u64,
        delay_ms: u64,
    },
}

type HistogramArgs = (Vec<u64>, Vec<Label>, bool, bool);

fn histogram_args(h: &Histogram) -> HistogramArgs {
    (
        h.template().to_vec(),
        h.labels().to_vec(),
        h.remove_tokens(),
        h.interpolate(),
    )
}

fn to_json<T: Serialize>(args: &T) -> Result<Vec<u8>, Error> {
    serde_json::to_vec(args).map_err(|e| Error::ControlArgs(e.to_string()))
}

fn from_json<T: DeserializeOwned>(opcode: Opcode, args: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(args).map_err(|e| Error::ControlArgs(format!("{opcode:?}: {e}")))
}

fn histogram_from_json(opcode: Opcode, args: &[u8]) -> Result<Histogram, Error> {
    let (counts, labels, remove_tokens, interpolate): HistogramArgs = from_json(opcode, args)?;
    Histogram::new(labels, counts, interpolate, remove_tokens)
        .map_err(|e| Error::ControlArgs(format!("{opcode:?}: {e}")))
}

impl ControlMessage {
    pub fn opcode(&self) -> Opcode {
        match self {
            ControlMessage::Start => Opcode::Start,
            ControlMessage::Stop => Opcode::Stop,
            ControlMessage::Ignore => Opcode::Ignore,
            ControlMessage::SendPadding { .. } => Opcode::SendPadding,
            ControlMessage::AppHint { .. } => Opcode::AppHint,
            ControlMessage::BurstHistogram(_) => Opcode::BurstHistogram,
            ControlMessage::GapHistogram(_) => Opcode::GapHistogram,
            ControlMessage::InjectHistogram(_) => Opcode::InjectHistogram,
            ControlMessage::TotalPad { .. } => Opcode::TotalPad,
            ControlMessage::PayloadPad { .. } => Opcode::PayloadPad,
            ControlMessage::BatchPad { .. } => Opcode::BatchPad,
        }
    }

    /// The serialized argument list, empty for messages without arguments.
    pub fn args(&self) -> Result<Vec<u8>, Error> {
        match self {
            ControlMessage::Start | ControlMessage::Stop | ControlMessage::Ignore => Ok(vec![]),
            ControlMessage::SendPadding { count, delay_ms } => to_json(&(count, delay_ms)),
            ControlMessage::AppHint { session, visiting } => to_json(&(session, visiting)),
            ControlMessage::BurstHistogram(h)
            | ControlMessage::GapHistogram(h)
            | ControlMessage::InjectHistogram(h) => to_json(&histogram_args(h)),
            ControlMessage::TotalPad { session, delay_ms }
            | ControlMessage::PayloadPad { session, delay_ms } => to_json(&(session, delay_ms)),
            ControlMessage::BatchPad {
                session,
                batch,
                delay_ms,
            } => to_json(&(session, batch, delay_ms)),
        }
    }

    /// Encode as one or more CONTROL frames.
    pub fn to_messages(&self) -> Result<Vec<Message>, Error> {
        build_control(self.opcode(), &self.args()?)
    }

    /// Parse a reassembled control message.
    pub fn from_parts(opcode: Opcode, args: &[u8]) -> Result<Self, Error> {
        Ok(match opcode {
            Opcode::Start => ControlMessage::Start,
            Opcode::Stop => ControlMessage::Stop,
            Opcode::Ignore => ControlMessage::Ignore,
            Opcode::SendPadding => {
                let (count, delay_ms) = from_json(opcode, args)?;
                ControlMessage::SendPadding { count, delay_ms }
            }
            Opcode::AppHint => {
                let (session, visiting) = from_json(opcode, args)?;
                ControlMessage::AppHint { session, visiting }
            }
            Opcode::BurstHistogram => {
                ControlMessage::BurstHistogram(histogram_from_json(opcode, args)?)
            }
            Opcode::GapHistogram => {
                ControlMessage::GapHistogram(histogram_from_json(opcode, args)?)
            }
            Opcode::InjectHistogram => {
                ControlMessage::InjectHistogram(histogram_from_json(opcode, args)?)
            }
            Opcode::TotalPad => {
                let (session, delay_ms) = from_json(opcode, args)?;
                ControlMessage::TotalPad { session, delay_ms }
            }
            Opcode::PayloadPad => {
                let (session, delay_ms) = from_json(opcode, args)?;
                ControlMessage::PayloadPad { session, delay_ms }
            }
            Opcode::BatchPad => {
                let (session, batch, delay_ms) = from_json(opcode, args)?;
                ControlMessage::BatchPad {
                    session,
                    batch,
                    delay_ms,
                }
            }
        })
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.opcode())
    }
}

/// Reassembles argument lists from consecutive CONTROL frames.
#[derive(Debug, Default, Clone)]
pub struct ControlAssembler {
    pending: Option<(Opcode, u16, Vec<u8>)>,
}

impl ControlAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame. Frames without a control part are ignored. Returns the
    /// opcode and complete argument list once the last chunk arrives. A chunk
    /// for a different opcode while a list is incomplete is a malformed
    /// stream.
    pub fn push(&mut self, msg: &Message) -> Result<Option<(Opcode, Vec<u8>)>, Error> {
        let Some(chunk) = msg.control_chunk() else {
            return Ok(None);
        };

        let (opcode, total, mut args) = match self.pending.take() {
            Some((opcode, total, args)) => {
                if opcode != chunk.opcode || total != chunk.args_total {
                    Err(Error::MalformedFrame(format!(
                        "{:?} chunk interleaved with incomplete {opcode:?}",
                        chunk.opcode
                    )))?;
                }
                (opcode, total, args)
            }
            None => (
                chunk.opcode,
                chunk.args_total,
                Vec::with_capacity(chunk.args_total as usize),
            ),
        };

        args.extend_from_slice(&chunk.args);
        let total_len = total as usize;
        if args.len() > total_len {
            Err(Error::MalformedFrame(format!(
                "{opcode:?} arguments overrun {total_len} bytes"
            )))?;
        }
        if args.len() == total_len {
            return Ok(Some((opcode, args)));
        }
        self.pending = Some((opcode, total, args));
        Ok(None)
    }

    /// True while a partially received argument list is held.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(msgs: &[Message]) -> Vec<(Opcode, Vec<u8>)> {
        let mut a = ControlAssembler::new();
        msgs.iter().filter_map(|m| a.push(m).unwrap()).collect()
    }

    #[test]
    fn opcode_values() {
        for v in 0..=10u8 {
            assert_eq!(u8::from(Opcode::try_from(v).unwrap()), v);
        }
        assert!(Opcode::try_from(11).is_err());
        assert_eq!(u8::from(Opcode::GapHistogram), 10);
    }

    #[test]
    fn no_arguments_single_frame() {
        let msgs = build_control(Opcode::Start, &[]).unwrap();
        assert_eq!(msgs.len(), 1);
        let chunk = msgs[0].control_chunk().unwrap();
        assert!(chunk.args.is_empty());
        assert_eq!(chunk.args_total, 0);
        assert_eq!(reassemble(&msgs), vec![(Opcode::Start, vec![])]);
    }

    #[test]
    fn split_and_reassemble() {
        let args: Vec<u8> = (0..3 * MPU_CTRL + 17).map(|i| (i % 251) as u8).collect();
        let msgs = build_control(Opcode::BurstHistogram, &args).unwrap();
        assert_eq!(msgs.len(), 4);
        for m in &msgs {
            let c = m.control_chunk().unwrap();
            assert_eq!(c.opcode, Opcode::BurstHistogram);
            assert_eq!(c.args_total as usize, args.len());
            assert!(m.wire_len() <= crate::constants::MTU);
        }
        assert_eq!(reassemble(&msgs), vec![(Opcode::BurstHistogram, args)]);
    }

    #[test]
    fn argument_list_too_long() {
        let args = vec![0; u16::MAX as usize + 1];
        assert!(matches!(
            build_control(Opcode::GapHistogram, &args),
            Err(Error::MessageTooLong(_))
        ));
    }

    #[test]
    fn interleaved_chunks_rejected() {
        let first = build_control(Opcode::BatchPad, &vec![1; MPU_CTRL + 1]).unwrap();
        let other = build_control(Opcode::Stop, &[]).unwrap();
        let mut a = ControlAssembler::new();
        assert_eq!(a.push(&first[0]).unwrap(), None);
        assert!(a.is_pending());
        assert!(matches!(a.push(&other[0]), Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn non_control_frames_ignored() {
        let mut a = ControlAssembler::new();
        let m = Message::data(b"x".to_vec(), 0).unwrap();
        assert_eq!(a.push(&m).unwrap(), None);
        assert!(!a.is_pending());
    }

    #[test]
    fn compact_json_arguments() {
        let m = ControlMessage::SendPadding {
            count: 1,
            delay_ms: 2,
        };
        assert_eq!(m.args().unwrap(), b"[1,2]");

        let m = ControlMessage::BatchPad {
            session: SessionId::from_raw(3),
            batch: 100,
            delay_ms: 10,
        };
        assert_eq!(m.args().unwrap(), b"[3,100,10]");
    }

    #[test]
    fn typed_messages_through_frames() {
        let histo = Histogram::new(
            vec![Label::Finite(5), Label::Finite(50), Label::Infinity],
            vec![10, 3, 1],
            true,
            true,
        )
        .unwrap();
        let all = vec![
            ControlMessage::Start,
            ControlMessage::Ignore,
            ControlMessage::SendPadding {
                count: 4,
                delay_ms: 250,
            },
            ControlMessage::AppHint {
                session: SessionId::from_raw(7),
                visiting: true,
            },
            ControlMessage::BurstHistogram(histo.clone()),
            ControlMessage::GapHistogram(histo),
            ControlMessage::PayloadPad {
                session: SessionId::from_raw(7),
                delay_ms: 5,
            },
        ];
        let mut frames = vec![];
        for m in &all {
            frames.extend(m.to_messages().unwrap());
        }
        let parsed: Vec<ControlMessage> = reassemble(&frames)
            .into_iter()
            .map(|(op, args)| ControlMessage::from_parts(op, &args).unwrap())
            .collect();
        assert_eq!(parsed, all);
    }

    #[test]
    fn bad_arguments() {
        assert!(matches!(
            ControlMessage::from_parts(Opcode::SendPadding, b"[1]"),
            Err(Error::ControlArgs(_))
        ));
        assert!(matches!(
            ControlMessage::from_parts(Opcode::AppHint, b"not json"),
            Err(Error::ControlArgs(_))
        ));
        // a histogram without tokens
        assert!(matches!(
            ControlMessage::from_parts(Opcode::GapHistogram, b"[[0],[0.1],false,false]"),
            Err(Error::ControlArgs(_))
        ));
    }
}
