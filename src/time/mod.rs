//! Capture time extraction
//!
//! A [`MediaRecord`] is built once per discovered file. Its capture time is
//! resolved at construction with this priority:
//! 1. The EXIF `DateTime` tag (images)
//! 2. The earlier of the file's creation and modification times
//!
//! Times taken from the file system mark the record as uncertain.

pub mod exif;
pub mod filesystem;

use crate::error::{Error, Result};
use crate::extensions::{ExtensionRegistry, MediaKind, extension_of};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the tag holding the capture time
pub const TIME_TAG: &str = "DateTime";

/// Layout of [`TIME_TAG`] values: "YYYY:MM:DD HH:MM:SS"
pub const TIME_TAG_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Stored in place of a byte-valued tag that is not valid UTF-8
pub const UNDECODABLE: &str = "Error: Could not decode.";

/// A single tag value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Text(String),
    Number(f64),
}

/// Where a record's tags came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetadataOrigin {
    /// Read from the file's embedded metadata
    Embedded,
    /// Synthesized from file system times
    FileSystem,
}

/// Tags of one file, keyed by tag name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub origin: MetadataOrigin,
    pub tags: BTreeMap<String, TagValue>,
}

impl Metadata {
    pub fn embedded(tags: BTreeMap<String, TagValue>) -> Self {
        Self {
            origin: MetadataOrigin::Embedded,
            tags,
        }
    }

    pub fn synthesized(tags: BTreeMap<String, TagValue>) -> Self {
        Self {
            origin: MetadataOrigin::FileSystem,
            tags,
        }
    }
}

/// A resolved capture time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureTime {
    /// Local wall-clock time
    pub timestamp: NaiveDateTime,
    /// Not taken from embedded metadata
    pub uncertain: bool,
}

/// One discovered media file with its resolved capture time
#[derive(Debug, Clone, Serialize)]
pub struct MediaRecord {
    path: PathBuf,
    filename: String,
    extension: String,
    kind: MediaKind,
    metadata: Option<Metadata>,
    capture: Option<CaptureTime>,
}

impl MediaRecord {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Tags read for this file; `None` if the image could not be parsed
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn capture(&self) -> Option<CaptureTime> {
        self.capture
    }

    pub fn capture_time(&self) -> Option<NaiveDateTime> {
        self.capture.map(|c| c.timestamp)
    }

    /// True unless the capture time came from embedded metadata
    pub fn is_uncertain(&self) -> bool {
        self.capture.is_none_or(|c| c.uncertain)
    }

    /// Record for a file whose capture time could not be determined
    #[cfg(test)]
    pub(crate) fn undated(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            filename: path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: extension_of(path).unwrap_or_default(),
            kind: MediaKind::Video,
            metadata: None,
            capture: None,
        }
    }
}

/// Build the record for one file
///
/// Images that cannot be parsed get no metadata and fall back to file
/// system times. Fails when the extension is not registered or the file's
/// times cannot be read.
pub fn extract(
    path: &Path,
    registry: &ExtensionRegistry,
    only_keep_time: bool,
) -> Result<MediaRecord> {
    let extension = extension_of(path).unwrap_or_default();
    let kind = registry
        .kind_of(&extension)
        .ok_or_else(|| Error::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;

    let metadata = match kind {
        MediaKind::Image => match exif::read_tags(path, only_keep_time) {
            Ok(meta) => Some(meta),
            Err(e @ Error::ExifRead { .. }) => {
                warn!(?path, error = %e, "Unreadable image metadata");
                None
            }
            Err(e) => return Err(e),
        },
        MediaKind::Video => Some(filesystem::synthesize_time_tag(path)?),
    };

    let capture = resolve_time(path, metadata.as_ref())?;

    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(MediaRecord {
        path: path.to_path_buf(),
        filename,
        extension,
        kind,
        metadata,
        capture,
    })
}

/// Resolve the capture time from a file's tags, falling back to file times
///
/// Returns `Ok(None)` only when the file exists but the platform reports
/// neither a creation nor a modification time.
pub fn resolve_time(path: &Path, metadata: Option<&Metadata>) -> Result<Option<CaptureTime>> {
    if let Some(meta) = metadata
        && let Some(value) = meta.tags.get(TIME_TAG)
    {
        let uncertain = meta.origin != MetadataOrigin::Embedded;
        let parsed = match value {
            TagValue::Text(text) => parse_time_tag(text),
            TagValue::Number(secs) => from_epoch_seconds(*secs),
        };

        match parsed {
            Some(timestamp) => {
                debug!(?path, %timestamp, uncertain, "Capture time from tag");
                return Ok(Some(CaptureTime {
                    timestamp,
                    uncertain,
                }));
            }
            None => debug!(?path, ?value, "Unparseable time tag"),
        }
    }

    let fallback = filesystem::earliest_time(path)?;
    if fallback.is_some() {
        debug!(?path, "Using file system time as capture time");
    } else {
        warn!(?path, "No file system times available");
    }

    Ok(fallback.map(|time| CaptureTime {
        timestamp: filesystem::to_local(time),
        uncertain: true,
    }))
}

/// Parse a "YYYY:MM:DD HH:MM:SS" tag value
pub fn parse_time_tag(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_matches(|c: char| c == '"' || c == '\0');
    NaiveDateTime::parse_from_str(s, TIME_TAG_FORMAT).ok()
}

/// Local wall-clock time for a Unix timestamp in seconds
fn from_epoch_seconds(secs: f64) -> Option<NaiveDateTime> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos).map(|utc| utc.with_timezone(&Local).naive_local())
}
