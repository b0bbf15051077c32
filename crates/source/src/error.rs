use rbdedup_engine::{BindingKind, EngineError};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("Invalid item #{position} in {origin}: {message}")]
    Item {
        origin: String,
        position: usize,
        message: String,
    },

    #[error("{0}")]
    Malformed(String),

    #[error("{kind} object without metadata.{field}")]
    MissingMetadata {
        kind: BindingKind,
        field: &'static str,
    },

    #[error("Failed to connect to cluster: {0}")]
    Connect(String),

    #[error("Failed to list {kind}: {message}")]
    List { kind: BindingKind, message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl SourceError {
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    pub(crate) fn item(origin: &str, position: usize, message: impl Into<String>) -> Self {
        Self::Item {
            origin: origin.to_string(),
            position,
            message: message.into(),
        }
    }
}
