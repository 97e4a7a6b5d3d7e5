//! File system timestamps

use super::{Metadata, TIME_TAG, TagValue};
use crate::error::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::trace;

/// The earlier of a file's creation and modification times
///
/// Either time may be missing on some platforms; the other is used alone.
/// `Ok(None)` means neither is available. Failing to stat the file is an
/// [`Error::FileTimes`].
pub fn earliest_time(path: &Path) -> Result<Option<SystemTime>> {
    let metadata = fs::metadata(path).map_err(|e| Error::FileTimes {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let created = metadata.created().ok();
    let modified = metadata.modified().ok();
    trace!(?path, ?created, ?modified, "File system times");

    Ok(match (created, modified) {
        (Some(c), Some(m)) => Some(c.min(m)),
        (c, m) => c.or(m),
    })
}

/// Metadata for files without readable tags: the `DateTime` tag holds the
/// earliest file time in Unix seconds
pub fn synthesize_time_tag(path: &Path) -> Result<Metadata> {
    let mut tags = BTreeMap::new();
    if let Some(time) = earliest_time(path)? {
        tags.insert(TIME_TAG.to_string(), TagValue::Number(epoch_seconds(time)));
    }
    Ok(Metadata::synthesized(tags))
}

/// Local wall-clock time of a system time
pub fn to_local(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

fn epoch_seconds(time: SystemTime) -> f64 {
    let utc = DateTime::<Utc>::from(time);
    utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) / 1e9
}
