//! # Engine Error Types
//!
//! Failures reported by an [`Engine`](crate::Engine) implementation or by
//! the render-context plumbing around it.

use std::path::PathBuf;

use gnomon_core::{ObjectId, ShapeKind};
use thiserror::Error;

/// Errors that can occur on the render side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine could not be created for this frame context.
    #[error("engine initialization failed: {0}")]
    Init(String),

    /// A parameter blob was malformed or not valid for the kind.
    #[error("bad parameters for {kind:?}: {reason}")]
    BadParam {
        /// Kind being created.
        kind: ShapeKind,
        /// What was wrong.
        reason: String,
    },

    /// The id does not name a live engine object.
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    /// A mesh file could not be imported.
    #[error("failed to import {}: {reason}", path.display())]
    Import {
        /// Path that was requested.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The session has no live engine.
    #[error("engine session is not ready")]
    NotReady,

    /// The engine refused the operation.
    #[error("engine rejected {0}")]
    Rejected(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
