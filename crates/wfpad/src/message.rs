//! Frames of the wfpad protocol and their wire encoding.
//!
//! Every frame starts with a fixed header: the length of payload plus
//! padding (u16), the payload length (u16) and a flag byte. Control frames
//! extend the header with an opcode (u8), the number of argument bytes in the
//! frame (u16) and the length of the complete argument list (u16). The body
//! follows: arguments, payload and finally zero bytes of padding. All integers
//! are big endian.

use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::ops::BitOr;

use crate::Error;
use crate::constants::*;
use crate::control::Opcode;

/// The flag byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flags(u8);

impl Flags {
    pub const DATA: Flags = Flags(FLAG_DATA);
    pub const PADDING: Flags = Flags(FLAG_PADDING);
    pub const CONTROL: Flags = Flags(FLAG_CONTROL);

    /// Parse a flag byte. Only DATA, PADDING, CONTROL, and CONTROL combined
    /// with one of the other two are valid.
    pub fn from_bits(bits: u8) -> Result<Self, Error> {
        const VALID: [u8; 5] = [
            FLAG_DATA,
            FLAG_PADDING,
            FLAG_CONTROL,
            FLAG_CONTROL | FLAG_DATA,
            FLAG_CONTROL | FLAG_PADDING,
        ];
        if !VALID.contains(&bits) {
            Err(Error::MalformedFrame(format!("invalid flags {bits:#04x}")))?;
        }
        Ok(Flags(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

/// The control part of a control frame: one chunk of a serialized argument
/// list. See [`build_control`](crate::control::build_control).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlChunk {
    pub opcode: Opcode,
    /// The argument bytes carried by this frame.
    pub args: Vec<u8>,
    /// The length of the complete argument list.
    pub args_total: u16,
}

/// A single frame. Messages are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    flags: Flags,
    control: Option<ControlChunk>,
    payload: Vec<u8>,
    padding: usize,
}

impl Message {
    /// A DATA frame carrying `payload`, followed by `padding` zero bytes.
    pub fn data(payload: Vec<u8>, padding: usize) -> Result<Self, Error> {
        Self::checked(Message {
            flags: Flags::DATA,
            control: None,
            payload,
            padding,
        })
    }

    /// A PADDING frame with a body of `len` zero bytes.
    pub fn padding(len: usize) -> Result<Self, Error> {
        Self::checked(Message {
            flags: Flags::PADDING,
            control: None,
            payload: vec![],
            padding: len,
        })
    }

    /// A CONTROL frame carrying one chunk of arguments. The chunk must fit in
    /// [`MPU_CTRL`].
    pub(crate) fn control(opcode: Opcode, args: Vec<u8>, args_total: u16) -> Self {
        debug_assert!(args.len() <= MPU_CTRL);
        Message {
            flags: Flags::CONTROL,
            control: Some(ControlChunk {
                opcode,
                args,
                args_total,
            }),
            payload: vec![],
            padding: 0,
        }
    }

    /// Split `data` into DATA frames of exactly `frame_len` bytes on the
    /// wire, padding the last one. `frame_len` is clamped so that every frame
    /// carries at least one byte and fits in the [`MTU`].
    pub fn encapsulate(data: &[u8], frame_len: usize) -> Vec<Message> {
        let body = frame_len.clamp(HDR_LEN + 1, MTU) - HDR_LEN;
        data.chunks(body)
            .map(|chunk| Message {
                flags: Flags::DATA,
                control: None,
                payload: chunk.to_vec(),
                padding: body - chunk.len(),
            })
            .collect()
    }

    fn checked(m: Message) -> Result<Self, Error> {
        if m.wire_len() > MTU {
            Err(Error::MessageTooLong(m.wire_len()))?;
        }
        Ok(m)
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of zero bytes following the payload.
    pub fn padding_len(&self) -> usize {
        self.padding
    }

    pub fn control_chunk(&self) -> Option<&ControlChunk> {
        self.control.as_ref()
    }

    pub fn is_data(&self) -> bool {
        self.flags.contains(Flags::DATA)
    }

    pub fn is_padding(&self) -> bool {
        self.flags.contains(Flags::PADDING)
    }

    pub fn is_control(&self) -> bool {
        self.flags.contains(Flags::CONTROL)
    }

    /// The size of the encoded frame.
    pub fn wire_len(&self) -> usize {
        match &self.control {
            Some(c) => HDR_CTRL_LEN + c.args.len() + self.payload.len() + self.padding,
            None => HDR_LEN + self.payload.len() + self.padding,
        }
    }

    /// Append the encoded frame to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let mut hdr = [0u8; HDR_CTRL_LEN];
        // lengths are bounded by the MTU on construction
        BigEndian::write_u16(&mut hdr[0..2], (self.payload.len() + self.padding) as u16);
        BigEndian::write_u16(&mut hdr[2..4], self.payload.len() as u16);
        hdr[4] = self.flags.bits();
        match &self.control {
            Some(c) => {
                hdr[5] = c.opcode.into();
                BigEndian::write_u16(&mut hdr[6..8], c.args.len() as u16);
                BigEndian::write_u16(&mut hdr[8..10], c.args_total);
                buf.extend_from_slice(&hdr);
                buf.extend_from_slice(&c.args);
            }
            None => buf.extend_from_slice(&hdr[..HDR_LEN]),
        }
        buf.extend_from_slice(&self.payload);
        buf.resize(buf.len() + self.padding, 0);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.wire_len());
        self.encode_into(&mut buf);
        buf
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "flags {:#04x}, payload {}, padding {}",
            self.flags.bits(),
            self.payload.len(),
            self.padding
        )?;
        if let Some(c) = &self.control {
            write!(f, ", {:?} args {}/{}", c.opcode, c.args.len(), c.args_total)?;
        }
        Ok(())
    }
}

/// Decode all complete frames at the start of `bytes`. Returns the frames
/// and the bytes of a trailing incomplete frame, if any.
pub fn decode(mut bytes: &[u8]) -> Result<(Vec<Message>, &[u8]), Error> {
    let mut messages = vec![];
    while let Some((msg, used)) = decode_frame(bytes)? {
        messages.push(msg);
        bytes = &bytes[used..];
    }
    Ok((messages, bytes))
}

/// Decode the frame at the start of `bytes`, returning the frame and its
/// size, or `None` if more bytes are needed.
fn decode_frame(bytes: &[u8]) -> Result<Option<(Message, usize)>, Error> {
    if bytes.len() < HDR_LEN {
        return Ok(None);
    }
    let total_len = BigEndian::read_u16(&bytes[0..2]) as usize;
    let payload_len = BigEndian::read_u16(&bytes[2..4]) as usize;
    let flags = Flags::from_bits(bytes[4])?;
    if payload_len > total_len {
        Err(Error::MalformedFrame(format!(
            "payload length {payload_len} exceeds total length {total_len}"
        )))?;
    }

    let (hdr_len, header) = if flags.contains(Flags::CONTROL) {
        if bytes.len() < HDR_CTRL_LEN {
            return Ok(None);
        }
        let opcode = Opcode::try_from(bytes[5])?;
        let args_len = BigEndian::read_u16(&bytes[6..8]);
        let args_total = BigEndian::read_u16(&bytes[8..10]);
        if args_len > args_total {
            Err(Error::MalformedFrame(format!(
                "argument chunk of {args_len} bytes exceeds argument list of {args_total}"
            )))?;
        }
        (HDR_CTRL_LEN, Some((opcode, args_len as usize, args_total)))
    } else {
        (HDR_LEN, None)
    };

    let args_len = header.map_or(0, |(_, len, _)| len);
    let frame_len = hdr_len + args_len + total_len;
    if frame_len > MTU {
        Err(Error::MalformedFrame(format!(
            "frame of {frame_len} bytes exceeds the MTU"
        )))?;
    }
    if bytes.len() < frame_len {
        return Ok(None);
    }

    let body = &bytes[hdr_len..frame_len];
    let control = header.map(|(opcode, len, args_total)| ControlChunk {
        opcode,
        args: body[..len].to_vec(),
        args_total,
    });
    let payload = body[args_len..args_len + payload_len].to_vec();
    let msg = Message {
        flags,
        control,
        payload,
        padding: total_len - payload_len,
    };
    Ok(Some((msg, frame_len)))
}
