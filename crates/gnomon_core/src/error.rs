//! # Core Error Types
//!
//! Errors raised by the scene model and by configuration loading.

use thiserror::Error;

use crate::shape::{ParamField, ShapeKind};

/// Errors that can occur while editing the scene model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The field does not exist on the parameter record of this kind.
    #[error("field {field:?} does not belong to {kind:?} parameters")]
    FieldMismatch {
        /// Kind of the record that was edited.
        kind: ShapeKind,
        /// Field that was requested.
        field: ParamField,
    },

    /// A non-finite value was written to a parameter field.
    #[error("non-finite value {value} for field {field:?}")]
    NonFinite {
        /// Field that was written.
        field: ParamField,
        /// Rejected value.
        value: f64,
    },

    /// A parameter record of a different kind was assigned.
    #[error("expected {expected:?} parameters, got {found:?}")]
    KindMismatch {
        /// Kind the model was created with.
        expected: ShapeKind,
        /// Kind of the rejected record.
        found: ShapeKind,
    },

    /// Engine-backed nodes are leaves and cannot take children.
    #[error("node {0} is engine-backed and cannot have children")]
    LeafCannotHaveChildren(u64),
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A tolerance is zero, negative, or not finite.
    #[error("invalid tolerance `{name}`: {value}")]
    InvalidTolerance {
        /// Name of the offending field.
        name: &'static str,
        /// Rejected value.
        value: f32,
    },

    /// The viewport or context version is unusable.
    #[error("invalid engine config: {0}")]
    InvalidEngine(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
