//! Recursive discovery of media files

use crate::error::Result;
use crate::extensions::{ExtensionRegistry, extension_of};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Collect every file under `root` whose extension is in the registry.
///
/// Symlinks are followed; a link that loops back to one of its ancestors or
/// points nowhere is skipped. A file reachable through several paths is
/// returned once, under the first path visited. Any other traversal error,
/// such as an unreadable directory, ends the walk.
pub fn walk(root: &Path, registry: &ExtensionRegistry) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut seen = HashSet::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.loop_ancestor().is_some() => {
                warn!(path = ?e.path(), "Skipping symlink loop");
                continue;
            }
            Err(e)
                if e.depth() > 0
                    && e.io_error().is_some_and(|err| err.kind() == io::ErrorKind::NotFound) =>
            {
                warn!(path = ?e.path(), "Skipping vanished file or dangling symlink");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(ext) = extension_of(path) else {
            continue;
        };
        if !registry.is_supported(&ext) {
            continue;
        }

        let identity = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !seen.insert(identity) {
            debug!(?path, "File already reached through another path");
            continue;
        }

        files.push(path.to_path_buf());
    }

    debug!(root = ?root, count = files.len(), "Walk finished");
    Ok(files)
}
