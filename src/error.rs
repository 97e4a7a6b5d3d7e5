//! Error types for image sorting

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for image sorting operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for image sorting
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("Failed to read file times of {path}: {message}")]
    FileTimes { path: PathBuf, message: String },

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error(
        "No free file name for {source_path} at {destination}: {max} names already taken",
        max = crate::copy::MAX_PROBES
    )]
    CollisionExhausted {
        source_path: PathBuf,
        destination: PathBuf,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to copy {source_path} to {destination}: {source}")]
    CopyFile {
        source_path: PathBuf,
        destination: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid directory {path}: {message}")]
    InvalidRoot { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}
