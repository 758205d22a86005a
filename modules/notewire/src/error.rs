//! Typed errors for hierarchy registration, subscription and dispatch.

use thiserror::Error;

use crate::note::NoteType;

/// Errors surfaced by the type graph, the registry and the dispatcher.
#[derive(Debug, Error)]
pub enum NoteError {
    /// Registration would create a cycle or re-parent an existing type.
    #[error("cannot register {ty} under {parent}: {reason}")]
    CycleOrDuplicate {
        ty: NoteType,
        parent: NoteType,
        reason: String,
    },

    /// The declared parent has not been registered yet.
    #[error("cannot register {ty}: parent {parent} is not registered")]
    UnknownParent { ty: NoteType, parent: NoteType },

    /// Handler or filter declared an arity outside {1, 2, 3}.
    #[error("invalid handler signature: expected 1, 2 or 3 parameters, got {arity}")]
    InvalidHandlerSignature { arity: usize },

    /// A handler or filter failed during dispatch. Carries the original error.
    #[error(transparent)]
    Handler(#[from] anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl NoteError {
    /// The handler's own error, if this is a dispatch failure.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            NoteError::Handler(err) => Some(err),
            _ => None,
        }
    }

    /// Unwraps a dispatch failure back into the handler's error.
    pub fn into_handler_error(self) -> Result<anyhow::Error, NoteError> {
        match self {
            NoteError::Handler(err) => Ok(err),
            other => Err(other),
        }
    }
}

/// Result type alias for notewire operations.
pub type NoteResult<T> = std::result::Result<T, NoteError>;
