//! CLI argument parsing with clap

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// image-sort - copy photos and videos into a Year/Month/Day tree
///
/// Capture dates come from EXIF for images and from file system times for
/// everything else. Files are only ever copied, and an existing file in the
/// destination is never overwritten.
#[derive(Parser, Debug)]
#[command(name = "image-sort")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// When specified, settings from the config file are used as defaults.
    /// CLI arguments will override config file settings.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Directory to scan for media files
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Existing directory the sorted tree is created in
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory with image/video/media extension list files
    #[arg(long, env = "IMAGE_SORT_EXTENSIONS_DIR")]
    pub extensions_dir: Option<PathBuf>,

    /// Read every EXIF tag instead of only DateTime
    #[arg(long)]
    pub all_tags: bool,

    /// Copy files in capture-time order
    #[arg(long)]
    pub sort_by_time: bool,

    /// File that failed copies are appended to
    #[arg(long)]
    pub error_log: Option<PathBuf>,

    /// Print the metadata record of a single file as JSON and exit
    #[arg(long, value_name = "FILE", conflicts_with_all = ["input", "output"])]
    pub show: Option<PathBuf>,

    /// Write a commented sample configuration file and exit
    #[arg(long, value_name = "FILE", conflicts_with = "show")]
    pub init: Option<PathBuf>,

    /// Save the effective settings of this run as a configuration file
    #[arg(long, value_name = "FILE")]
    pub save_config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output log format as JSON
    #[arg(long)]
    pub json_log: bool,
}

impl Cli {
    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref input) = self.input {
            config.input_dir = input.clone();
        }
        if let Some(ref output) = self.output {
            config.output_dir = output.clone();
        }
        if let Some(ref dir) = self.extensions_dir {
            config.extensions_dir = Some(dir.clone());
        }
        if self.all_tags {
            config.only_keep_time = false;
        }
        if self.sort_by_time {
            config.sort_by_time = true;
        }
        if let Some(ref error_log) = self.error_log {
            config.error_log = Some(error_log.clone());
        }
        if self.verbose {
            config.verbose = true;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
