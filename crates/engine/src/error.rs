use crate::binding::{BindingIdentity, BindingKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unsupported binding kind: {kind}")]
    UnsupportedKind { kind: String },

    #[error("Invalid binding identity: {0}")]
    InvalidIdentity(String),

    #[error("Invalid noise configuration: {0}")]
    InvalidNoiseConfig(String),

    #[error("Failed to delete {kind} {identity}: {message}")]
    DeleteFailed {
        kind: BindingKind,
        identity: BindingIdentity,
        message: String,
    },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EngineError {
    /// Create an unsupported kind error
    pub fn unsupported_kind(kind: impl Into<String>) -> Self {
        Self::UnsupportedKind { kind: kind.into() }
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
