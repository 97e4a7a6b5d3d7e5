//! image-sort - organize a photo and video collection by capture date
//!
//! This library walks a directory tree, dates every supported media file and
//! copies it into `Year <Y>/<Month>/Day <D>/` under an output directory:
//! - EXIF `DateTime` for images
//! - File system times for videos and other media (tagged as uncertain)
//! - Collision-safe copies that never overwrite an existing file
//! - A persistent log of files that could not be copied

pub mod cli;
pub mod config;
pub mod copy;
pub mod error;
pub mod error_log;
pub mod extensions;
pub mod group;
pub mod process;
pub mod time;
pub mod walk;

pub use cli::Cli;
pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use error_log::ErrorLog;
pub use extensions::{ExtensionRegistry, MediaKind};
pub use group::DateBuckets;
pub use process::{CopyOutcome, ProcessingStats, Processor, ProgressEvent, Run};
pub use time::{CaptureTime, MediaRecord, Metadata, extract};
