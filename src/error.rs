use std::path::PathBuf;

use thiserror::Error;

use crate::classfile::error::ClassFileError;
use crate::classfile::verify::VerifyError;
use crate::engine::Applicability;

/// Result type for timeout-enforcer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the timeout enforcer
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed class file {class}: {source}")]
    Malformed {
        class: String,
        #[source]
        source: ClassFileError,
    },

    #[error("Class {class} already uses every timeout field name up to the maximum suffix")]
    NameExhaustion { class: String },

    #[error("Timeout of {millis} ms does not fit a JVM long")]
    InvalidDuration { millis: u64 },

    #[error("Rewritten class {class} failed verification: {source}")]
    Verify {
        class: String,
        #[source]
        source: VerifyError,
    },

    #[error("Class {class} is not eligible for a timeout rule: {}", .applicability.message())]
    NotApplicable {
        class: String,
        applicability: Applicability,
    },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unknown time unit: {0}")]
    UnknownTimeUnit(String),
}

impl Error {
    /// Wrap a class file error with the class or file it came from
    pub fn malformed(class: impl Into<String>, source: ClassFileError) -> Self {
        Self::Malformed { class: class.into(), source }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }
}
