use thiserror::Error;

/// Errors produced by the vless protocol layer.
#[derive(Debug, Error)]
pub enum VlessError {
    #[error("truncated header: {field} needs {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("invalid address type: {0}")]
    InvalidAddressType(u8),

    #[error("invalid command: {0}")]
    InvalidCommand(u8),

    #[error("domain name too long: {0} bytes, at most 255")]
    DomainTooLong(usize),

    #[error("authentication failed")]
    AuthFailed,

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("timeout")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VlessError {
    /// Whether this error came from decoding a malformed header.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            VlessError::Truncated { .. }
                | VlessError::InvalidAddressType(_)
                | VlessError::InvalidCommand(_)
        )
    }
}

pub type VlessResult<T> = Result<T, VlessError>;
