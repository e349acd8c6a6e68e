use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),

    #[error("send failed: {0}")]
    SendFailure(String),

    #[error("request already in progress: {0}")]
    AlreadyInProgress(String),
}

/// Reasons a REPLY is refused by the client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("unexpected message type {0}")]
    UnexpectedMessageType(u8),

    #[error("missing {0} option")]
    MissingOption(&'static str),

    #[error("malformed {0} option")]
    MalformedOption(&'static str),

    #[error("IAID {0:#010x} does not resolve to this session")]
    SessionMismatch(u32),

    #[error("IAID mismatch: expected {expected:#010x}, got {got:#010x}")]
    IaidMismatch { expected: u32, got: u32 },

    #[error("client DUID does not match")]
    ClientDuidMismatch,

    #[error("status code {0}")]
    Status(u16),
}

pub type Result<T> = std::result::Result<T, Error>;
