//! Registry of recognized media file extensions

use crate::config::Config;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// File names looked up inside `extensions_dir`
pub const IMAGE_LIST_FILE: &str = "image_extensions.toml";
pub const VIDEO_LIST_FILE: &str = "video_extensions.toml";
pub const MEDIA_LIST_FILE: &str = "media_extensions.toml";

/// How a file's capture time is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaKind {
    /// Embedded EXIF tags
    Image,
    /// File system times only. Generic media extensions fall in here too.
    Video,
}

#[derive(Debug, Deserialize)]
struct ExtensionList {
    #[serde(default)]
    extensions: Vec<String>,
}

/// Case-insensitive set of media extensions, built once at startup
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    images: HashSet<String>,
    videos: HashSet<String>,
    media: HashSet<String>,
}

impl ExtensionRegistry {
    /// Build a registry from the three extension lists
    pub fn new<I, V, M>(images: I, videos: V, media: M) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
        M: IntoIterator,
        M::Item: AsRef<str>,
    {
        Self {
            images: normalize(images),
            videos: normalize(videos),
            media: normalize(media),
        }
    }

    /// Build the registry a config asks for: the list files in
    /// `extensions_dir` when set, otherwise the inline lists
    pub fn from_config(config: &Config) -> Result<Self> {
        match &config.extensions_dir {
            Some(dir) => Self::load_from_dir(dir),
            None => Ok(Self::new(
                &config.image_extensions,
                &config.video_extensions,
                &config.media_extensions,
            )),
        }
    }

    /// Load the three list files from a directory. A missing file leaves
    /// that category empty; a malformed one is an error.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let images = load_list(&dir.join(IMAGE_LIST_FILE))?;
        let videos = load_list(&dir.join(VIDEO_LIST_FILE))?;
        let media = load_list(&dir.join(MEDIA_LIST_FILE))?;

        let registry = Self::new(images, videos, media);
        debug!(
            images = registry.images.len(),
            videos = registry.videos.len(),
            media = registry.media.len(),
            "Loaded extension lists"
        );
        Ok(registry)
    }

    /// Check if an extension (any case) is recognized
    pub fn is_supported(&self, ext: &str) -> bool {
        self.kind_of(ext).is_some()
    }

    /// Resolve the media kind for an extension (any case)
    pub fn kind_of(&self, ext: &str) -> Option<MediaKind> {
        let ext = ext.to_lowercase();
        if self.images.contains(&ext) {
            Some(MediaKind::Image)
        } else if self.videos.contains(&ext) || self.media.contains(&ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Number of distinct recognized extensions
    pub fn len(&self) -> usize {
        self.images
            .iter()
            .chain(&self.videos)
            .chain(&self.media)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lower-cased text after the final `.` of a path's file name
///
/// A name that is only an extension, like `.jpg`, still has one.
pub fn extension_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    split_extension(name).1.map(str::to_lowercase)
}

/// Split a file name at its final `.` into stem and extension
///
/// Empty text after the dot is no extension: `a.` is all stem.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

fn normalize<I>(exts: I) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    exts.into_iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn load_list(path: &Path) -> Result<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(?path, error = %e, "Extension list not readable, using an empty list");
            return Ok(Vec::new());
        }
    };

    let list: ExtensionList = toml::from_str(&content)?;
    Ok(list.extensions)
}
