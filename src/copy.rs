//! Copying that never overwrites
//!
//! Each candidate name is opened with exclusive creation, so checking that a
//! name is free and claiming it is one step. Taken names are retried with a
//! bracketed counter: `name.jpg`, `name[1].jpg`, `name[2].jpg`, …

use crate::error::{Error, Result};
use crate::extensions::split_extension;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Names tried per file: the plain name plus `[1]` to `[9]`
pub const MAX_PROBES: usize = 10;

/// Appended to the file stem of files dated from file system times
pub const UNCERTAIN_MARKER: &str = "_uncertain_metadata";

const BUFFER_SIZE: usize = 256 * 1024;

/// Copy `source` into `destination_dir` under a name nothing else uses
///
/// Returns the path written. The source is only read. On error nothing is
/// left at the destination except directories created on the way.
pub fn safe_copy(source: &Path, destination_dir: &Path, tag_uncertain: bool) -> Result<PathBuf> {
    let base = base_name(source, tag_uncertain)?;

    fs::create_dir_all(destination_dir).map_err(|e| Error::CreateDir {
        path: destination_dir.to_path_buf(),
        source: e,
    })?;

    for attempt in 0..MAX_PROBES {
        let candidate = destination_dir.join(probe_name(&base, attempt));

        let file = match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(?candidate, "Name taken");
                continue;
            }
            Err(e) => {
                return Err(Error::CopyFile {
                    source_path: source.to_path_buf(),
                    destination: candidate,
                    source: e,
                });
            }
        };

        if let Err(e) = write_contents(source, file, &candidate) {
            if let Err(cleanup) = fs::remove_file(&candidate) {
                warn!(?candidate, error = %cleanup, "Failed to remove partial copy");
            }
            return Err(Error::CopyFile {
                source_path: source.to_path_buf(),
                destination: candidate,
                source: e,
            });
        }

        return Ok(candidate);
    }

    Err(Error::CollisionExhausted {
        source_path: source.to_path_buf(),
        destination: destination_dir.join(base),
    })
}

/// File name of `source`, with the uncertain marker before the extension
/// when requested
fn base_name(source: &Path, tag_uncertain: bool) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| Error::UnsupportedFormat {
            path: source.to_path_buf(),
        })?;

    if !tag_uncertain {
        return Ok(PathBuf::from(file_name));
    }
    Ok(PathBuf::from(with_stem_suffix(Path::new(file_name), UNCERTAIN_MARKER)))
}

/// Name for the given attempt: the base name first, then `stem[n].ext`
fn probe_name(base: &Path, attempt: usize) -> PathBuf {
    if attempt == 0 {
        return base.to_path_buf();
    }
    PathBuf::from(with_stem_suffix(base, &format!("[{}]", attempt)))
}

fn with_stem_suffix(name: &Path, suffix: &str) -> OsString {
    if let Some(text) = name.to_str() {
        return match split_extension(text) {
            (stem, Some(ext)) => format!("{}{}.{}", stem, suffix, ext).into(),
            (stem, None) => format!("{}{}", stem, suffix).into(),
        };
    }

    let mut new_name = name.file_stem().map(OsString::from).unwrap_or_default();
    new_name.push(suffix);
    if let Some(ext) = name.extension() {
        new_name.push(".");
        new_name.push(ext);
    }
    new_name
}

/// Copy bytes, permissions and modification time into the freshly created
/// destination file
fn write_contents(source: &Path, dest_file: File, dest: &Path) -> io::Result<()> {
    let src_file = File::open(source)?;
    let src_meta = src_file.metadata()?;

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, src_file);
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest_file);
    io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    drop(writer);

    if let Ok(mtime) = src_meta.modified() {
        filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime))?;
    }
    fs::set_permissions(dest, src_meta.permissions())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join("src").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_copy_into_new_nested_directory() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.jpg", b"photo");
        let dest_dir = dir.path().join("out").join("Year 2023").join("January").join("Day 5");

        let copied = safe_copy(&src, &dest_dir, false).unwrap();
        assert_eq!(copied, dest_dir.join("a.jpg"));
        assert_eq!(fs::read(&copied).unwrap(), b"photo");
        assert_eq!(fs::read(&src).unwrap(), b"photo");
    }

    #[test]
    fn test_second_copy_gets_counter() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.jpg", b"first");
        let dest_dir = dir.path().join("out");

        let first = safe_copy(&src, &dest_dir, false).unwrap();
        fs::write(&src, b"second").unwrap();
        let second = safe_copy(&src, &dest_dir, false).unwrap();

        assert_eq!(first, dest_dir.join("a.jpg"));
        assert_eq!(second, dest_dir.join("a[1].jpg"));
        assert_eq!(fs::read(&first).unwrap(), b"first");
        assert_eq!(fs::read(&second).unwrap(), b"second");
    }

    #[test]
    fn test_uncertain_marker() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "b.mp4", b"video");
        let dest_dir = dir.path().join("out");

        let first = safe_copy(&src, &dest_dir, true).unwrap();
        let second = safe_copy(&src, &dest_dir, true).unwrap();
        assert_eq!(first, dest_dir.join("b_uncertain_metadata.mp4"));
        assert_eq!(second, dest_dir.join("b_uncertain_metadata[1].mp4"));
    }

    #[test]
    fn test_exhausts_after_ten_names() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.jpg", b"new");
        let dest_dir = dir.path().join("out");
        fs::create_dir_all(&dest_dir).unwrap();

        fs::write(dest_dir.join("a.jpg"), b"old").unwrap();
        for i in 1..MAX_PROBES {
            fs::write(dest_dir.join(format!("a[{}].jpg", i)), b"old").unwrap();
        }

        let err = safe_copy(&src, &dest_dir, false).unwrap_err();
        match err {
            Error::CollisionExhausted {
                source_path,
                destination,
            } => {
                assert_eq!(source_path, src);
                assert_eq!(destination, dest_dir.join("a.jpg"));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(fs::read(dest_dir.join("a.jpg")).unwrap(), b"old");
        assert!(!dest_dir.join(format!("a[{}].jpg", MAX_PROBES)).exists());
        assert_eq!(fs::read_dir(&dest_dir).unwrap().count(), MAX_PROBES);
    }

    #[test]
    fn test_last_free_counter_is_used() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.jpg", b"new");
        let dest_dir = dir.path().join("out");
        fs::create_dir_all(&dest_dir).unwrap();

        fs::write(dest_dir.join("a.jpg"), b"old").unwrap();
        for i in 1..MAX_PROBES - 1 {
            fs::write(dest_dir.join(format!("a[{}].jpg", i)), b"old").unwrap();
        }

        let copied = safe_copy(&src, &dest_dir, false).unwrap();
        assert_eq!(copied, dest_dir.join(format!("a[{}].jpg", MAX_PROBES - 1)));
    }

    #[test]
    fn test_file_without_extension() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "noext", b"x");
        let dest_dir = dir.path().join("out");

        safe_copy(&src, &dest_dir, false).unwrap();
        assert_eq!(safe_copy(&src, &dest_dir, false).unwrap(), dest_dir.join("noext[1]"));
        assert_eq!(
            safe_copy(&src, &dest_dir, true).unwrap(),
            dest_dir.join("noext_uncertain_metadata")
        );
    }

    #[test]
    fn test_file_named_only_by_extension() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, ".jpg", b"x");
        let dest_dir = dir.path().join("out");

        assert_eq!(safe_copy(&src, &dest_dir, false).unwrap(), dest_dir.join(".jpg"));
        assert_eq!(safe_copy(&src, &dest_dir, false).unwrap(), dest_dir.join("[1].jpg"));
        assert_eq!(
            safe_copy(&src, &dest_dir, true).unwrap(),
            dest_dir.join("_uncertain_metadata.jpg")
        );
        assert_eq!(
            safe_copy(&src, &dest_dir, true).unwrap(),
            dest_dir.join("_uncertain_metadata[1].jpg")
        );
    }

    #[test]
    fn test_source_without_file_name() {
        let dir = TempDir::new().unwrap();
        let dest_dir = dir.path().join("out");

        let err = safe_copy(Path::new(".."), &dest_dir, false).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
        assert!(!dest_dir.exists());
    }

    #[test]
    fn test_preserves_modification_time() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.jpg", b"photo");
        let mtime = filetime::FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(&src, mtime).unwrap();

        let copied = safe_copy(&src, &dir.path().join("out"), false).unwrap();
        let copied_mtime = filetime::FileTime::from_last_modification_time(&fs::metadata(&copied).unwrap());
        assert_eq!(copied_mtime, mtime);
    }

    #[test]
    fn test_missing_source_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let dest_dir = dir.path().join("out");

        let err = safe_copy(&dir.path().join("gone.jpg"), &dest_dir, false).unwrap_err();
        assert!(matches!(err, Error::CopyFile { .. }));
        assert!(!dest_dir.join("gone.jpg").exists());
    }

    #[test]
    fn test_destination_under_a_file_fails() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.jpg", b"photo");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();

        let err = safe_copy(&src, &blocker.join("sub"), false).unwrap_err();
        assert!(matches!(err, Error::CreateDir { .. }));
    }
}
