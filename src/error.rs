use crate::streamer::StreamerState;
use std::num::ParseIntError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TsflowError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("muxing error: {0}")]
    Muxing(String),

    #[error("endpoint error: {0}")]
    Endpoint(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("permission error: {0}")]
    Permission(String),

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: StreamerState,
    },

    #[error("streaming session is closed")]
    SessionClosed,

    #[error("parser error: {0}")]
    Parser(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),

    #[error("settings file error: {0}")]
    SettingsFile(#[from] toml::de::Error),

    #[error("{operation} failed: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: Box<TsflowError>,
    },
}

/// Coarse classification of a [`TsflowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Muxing,
    Io,
    Permission,
    State,
    Data,
}

impl TsflowError {
    /// Wraps this error with the name of the operation that produced it.
    pub fn during(self, operation: &'static str) -> Self {
        TsflowError::Operation {
            operation,
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TsflowError::Io(_) | TsflowError::Endpoint(_) | TsflowError::Timeout(_) => {
                ErrorKind::Io
            }
            TsflowError::Configuration(_)
            | TsflowError::ParseInt(_)
            | TsflowError::SettingsFile(_) => ErrorKind::Configuration,
            TsflowError::Muxing(_) => ErrorKind::Muxing,
            TsflowError::Permission(_) => ErrorKind::Permission,
            TsflowError::InvalidState { .. } | TsflowError::SessionClosed => ErrorKind::State,
            TsflowError::Parser(_) | TsflowError::InvalidData(_) => ErrorKind::Data,
            TsflowError::Operation { source, .. } => source.kind(),
        }
    }

    /// Name of the failing operation, if one was attached.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            TsflowError::Operation { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TsflowError>;
