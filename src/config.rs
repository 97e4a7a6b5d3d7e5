//! Configuration types for image sorting

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for one sorting run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory to scan for media files
    pub input_dir: PathBuf,

    /// Directory the Year/Month/Day tree is created in
    pub output_dir: PathBuf,

    /// Directory holding `image_extensions.toml`, `video_extensions.toml` and
    /// `media_extensions.toml`. When set, these files replace the inline lists.
    pub extensions_dir: Option<PathBuf>,

    /// Extensions read for embedded EXIF tags
    pub image_extensions: Vec<String>,

    /// Extensions dated from file system times only
    pub video_extensions: Vec<String>,

    /// Other recognized media extensions (dated like videos)
    pub media_extensions: Vec<String>,

    /// Keep only the `DateTime` tag when reading EXIF
    pub only_keep_time: bool,

    /// Sort the batch by capture time before copying
    pub sort_by_time: bool,

    /// Error log path (defaults to a timestamped file in the log directory)
    pub error_log: Option<PathBuf>,

    /// Verbose output
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::new(),
            output_dir: PathBuf::from("output"),
            extensions_dir: None,
            image_extensions: vec![
                "jpg".into(), "jpeg".into(), "png".into(), "tif".into(),
                "tiff".into(), "webp".into(), "heic".into(), "heif".into(),
            ],
            video_extensions: vec![
                "mp4".into(), "mov".into(), "avi".into(), "mkv".into(),
                "wmv".into(), "m4v".into(), "3gp".into(), "mts".into(),
            ],
            media_extensions: vec!["gif".into(), "bmp".into()],
            only_keep_time: true,
            sort_by_time: false,
            error_log: None,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            source: e,
        })?;

        write_config_file(path.as_ref(), &content)
    }

    /// Write the commented [`Config::sample_config`] to a file
    pub fn write_sample<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        write_config_file(path.as_ref(), &Self::sample_config())
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# image-sort configuration file (TOML)

# Directory scanned recursively for photos and videos
input_dir = "D:/Camera"

# Files are copied to <output_dir>/Year <Y>/<Month>/Day <D>/
output_dir = "D:/Sorted"

# Optional directory with image_extensions.toml, video_extensions.toml and
# media_extensions.toml, each containing `extensions = [...]`.
# A missing file counts as an empty list.
# extensions_dir = "D:/image-sort/extensions"

# Read EXIF for these
image_extensions = ["jpg", "jpeg", "png", "tif", "tiff", "webp", "heic", "heif"]
# Dated from file system times, copied with the _uncertain_metadata marker
video_extensions = ["mp4", "mov", "avi", "mkv", "wmv", "m4v", "3gp", "mts"]
media_extensions = ["gif", "bmp"]

# Only look at the DateTime tag (faster); false reads every tag
only_keep_time = true

# Copy in capture-time order instead of scan order
sort_by_time = false

# error_log = "D:/Sorted/errors.txt"

verbose = false
"#
        .to_string()
    }
}

fn write_config_file(path: &Path, content: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to write configuration file
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to serialize configuration
    SerializeError {
        source: toml::ser::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::WriteError { path, source } => {
                write!(f, "Failed to write config file '{}': {}", path.display(), source)
            }
            ConfigError::SerializeError { source } => {
                write!(f, "Failed to serialize config: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::WriteError { source, .. } => Some(source),
            ConfigError::SerializeError { source } => Some(source),
        }
    }
}
