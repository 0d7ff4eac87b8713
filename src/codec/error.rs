//! Codec error types

/// Structure that decoded but makes no sense
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown opcode {0:#06x}")]
    UnknownOpcode(u16),

    #[error("{field} code {value} is out of range")]
    OutOfDomain { field: &'static str, value: u32 },

    #[error("{field} count {count} exceeds limit {limit}")]
    TooMany {
        field: &'static str,
        count: u32,
        limit: u32,
    },

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("message truncated")]
    Truncated,
}
