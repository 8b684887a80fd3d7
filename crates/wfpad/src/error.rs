/// Specific error types of wfpad.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A frame on the wire violates the framing protocol. The connection the
    /// frame arrived on must be torn down.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// An argument is outside of the domain of an operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid histogram. The string describes why in detail.
    #[error("invalid histogram: {0}")]
    Histogram(String),

    /// The arguments of a control message could not be (de)serialized.
    #[error("invalid control arguments: {0}")]
    ControlArgs(String),

    /// A message does not fit in a single frame.
    #[error("message of {0} bytes exceeds the frame size")]
    MessageTooLong(usize),
}
