//! Error types for the wordpack engine.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=archive, 3=validation, 4=internal, etc.)
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Per-item failures (validation, duplicate filenames) are normally
//! collected into a batch report by the merge engine and never surface
//! past it; the variants below also cover whole-container failures that
//! are always fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for wordpack operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string; shells on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Container / archive (exit 2)
    CorruptArchive,
    MissingEntry,

    // Candidate validation (exit 3)
    Validation,
    DuplicateFilename,

    // Invariant violations (exit 4)
    DuplicateGuid,

    // Database (exit 5)
    DatabaseError,

    // I/O and encoding (exit 6)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::CorruptArchive => "CORRUPT_ARCHIVE",
            Self::MissingEntry => "MISSING_ENTRY",
            Self::Validation => "VALIDATION",
            Self::DuplicateFilename => "DUPLICATE_FILENAME",
            Self::DuplicateGuid => "DUPLICATE_GUID",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-6).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::CorruptArchive | Self::MissingEntry => 2,
            Self::Validation | Self::DuplicateFilename => 3,
            Self::DuplicateGuid => 4,
            Self::DatabaseError => 5,
            Self::IoError | Self::JsonError => 6,
        }
    }

    /// Whether a caller should retry with corrected input.
    ///
    /// True for validation failures. False for corrupt containers,
    /// invariant violations, and I/O errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Validation | Self::DuplicateFilename)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur while building or updating a container.
#[derive(Error, Debug)]
pub enum Error {
    /// The existing container cannot be parsed. Fatal for an update:
    /// falling back to "create new" would discard study history.
    #[error("Corrupt container at {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    /// A required entry is absent from an otherwise readable container.
    #[error("Container at {path} is missing entry '{entry}'")]
    MissingEntry { path: PathBuf, entry: String },

    /// A single candidate flashcard's inputs are malformed.
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Two distinct media payloads claim the same filename.
    #[error("Filename '{filename}' already registered under media key {existing_key}")]
    DuplicateFilename { filename: String, existing_key: u32 },

    /// Two notes drew the same guid. Indicates a broken random source;
    /// always fatal for the whole batch, never retried.
    #[error("Duplicate note guid '{guid}'")]
    DuplicateGuid { guid: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::CorruptArchive { .. } => ErrorCode::CorruptArchive,
            Self::MissingEntry { .. } => ErrorCode::MissingEntry,
            Self::Validation { .. } => ErrorCode::Validation,
            Self::DuplicateFilename { .. } => ErrorCode::DuplicateFilename,
            Self::DuplicateGuid { .. } => ErrorCode::DuplicateGuid,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Whether this error is fatal for a whole batch, as opposed to a
    /// per-item failure the merge engine records and skips.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Validation { .. } | Self::DuplicateFilename { .. })
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        })
    }
}
