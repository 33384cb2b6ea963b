use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The error kinds the core distinguishes. Each carries whatever
/// contextual fields make sense for that failure; the store never panics on
/// user input and always surfaces one of these instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {kind} {id}")]
    NotFound { kind: &'static str, id: u64 },

    #[error("already exists: {kind} {id}")]
    AlreadyExists { kind: &'static str, id: u64 },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("type error: expected {expected}, found {found}")]
    TypeError {
        expected: &'static str,
        found: &'static str,
    },

    #[error("no such index on property {key}")]
    NoSuchIndex { key: String },

    #[error("corrupt format: {message}")]
    CorruptFormat { message: String },

    #[error("corrupt wal at sequence {sequence}: {message}")]
    CorruptWal { sequence: u64, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported: {message}")]
    Unsupported { message: String },
}

impl Error {
    pub fn not_found(kind: &'static str, id: u64) -> Self {
        Error::NotFound { kind, id }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn no_such_index(key: impl Into<String>) -> Self {
        Error::NoSuchIndex { key: key.into() }
    }

    pub fn corrupt_format(message: impl Into<String>) -> Self {
        Error::CorruptFormat {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Error::Io(std::io::Error::other(message.into()))
    }
}
