//! Global constants of the framing protocol.

/// The largest frame, header included, that is ever put on the wire.
pub const MTU: usize = 1448;

/// Header size of DATA and PADDING frames: total length (u16), payload
/// length (u16) and flags (u8).
pub const HDR_LEN: usize = 5;

/// Header size of CONTROL frames: [`HDR_LEN`] followed by the opcode (u8),
/// the argument bytes in this frame (u16) and the length of the complete
/// serialized argument list (u16).
pub const HDR_CTRL_LEN: usize = HDR_LEN + 5;

/// Maximum payload unit of a DATA or PADDING frame.
pub const MPU: usize = MTU - HDR_LEN;

/// Maximum payload unit of a CONTROL frame, shared by arguments, payload and
/// padding.
pub const MPU_CTRL: usize = MTU - HDR_CTRL_LEN;

/// The frame carries application data.
pub const FLAG_DATA: u8 = 1 << 0;
/// The frame carries padding that the receiver drops.
pub const FLAG_PADDING: u8 = 1 << 1;
/// The frame carries (a chunk of) a control message.
pub const FLAG_CONTROL: u8 = 1 << 2;

/// Label used on the wire and in configuration for the unbounded final bin
/// of a histogram. Any negative label is read as infinity.
pub const INF_LABEL: f64 = -1.0;

/// Histogram labels are kept with millisecond precision.
pub const LABEL_PRECISION: f64 = 1000.0;

/// The maximum delay, in seconds, that a histogram sample may schedule.
/// Larger finite samples are capped to this value.
pub const MAX_SAMPLED_DELAY: f64 = 60.0 * 60.0 * 24.0;


/// The most padding frames a single SEND_PADDING request or expiry may
/// produce.
pub const MAX_PADDING_REQUEST: u32 = 1024;
