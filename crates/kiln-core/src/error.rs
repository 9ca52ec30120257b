//! Error types for Kiln

use thiserror::Error;

/// The main error type for Kiln operations
#[derive(Debug, Error)]
pub enum KilnError {
    /// A file or image could not be read or decoded
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    /// A required document field is missing or malformed
    #[error("Format error: {0}")]
    FormatError(String),

    /// An index between document tables is out of range
    #[error("Reference error: {from} refers to {table}[{index}], but {table} has {len} entries")]
    ReferenceError {
        table: &'static str,
        index: usize,
        len: usize,
        from: String,
    },

    /// The document uses a feature the engine does not implement
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A required argument was absent (e.g. a texcoord accessor for a textured material)
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("GPU error: {0}")]
    GpuError(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Duplicate entity name: {0}")]
    DuplicateEntityName(String),

    #[error("Hierarchy error: {0}")]
    HierarchyError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

impl KilnError {
    /// Build a `ReferenceError` for `table[index]` referenced from `from`
    pub fn reference(table: &'static str, index: usize, len: usize, from: impl Into<String>) -> Self {
        KilnError::ReferenceError {
            table,
            index,
            len,
            from: from.into(),
        }
    }

    /// Build a `ReadError` from any displayable cause
    pub fn read(path: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        KilnError::ReadError {
            path: path.into(),
            message: cause.to_string(),
        }
    }
}

/// Result type alias for Kiln operations
pub type Result<T> = std::result::Result<T, KilnError>;

impl From<toml::de::Error> for KilnError {
    fn from(err: toml::de::Error) -> Self {
        KilnError::TomlParseError(err.to_string())
    }
}
