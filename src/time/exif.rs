//! EXIF tag reading for images

use super::{Metadata, TIME_TAG, TagValue, UNDECODABLE};
use crate::error::{Error, Result};
use exif::{Field, In, Reader, Tag, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// Read the primary image's EXIF tags
///
/// With `only_keep_time` only the `DateTime` tag is kept. A valid image
/// without EXIF yields empty metadata; a file that cannot be parsed as an
/// image is an [`Error::ExifRead`].
pub fn read_tags(path: &Path, only_keep_time: bool) -> Result<Metadata> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif = match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => {
            trace!(?path, "Image has no EXIF data");
            return Ok(Metadata::embedded(BTreeMap::new()));
        }
        Err(e) => {
            return Err(Error::ExifRead {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    };

    let mut tags = BTreeMap::new();
    if only_keep_time {
        if let Some(field) = exif.get_field(Tag::DateTime, In::PRIMARY) {
            tags.insert(TIME_TAG.to_string(), tag_value(field));
        }
    } else {
        for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
            tags.insert(field.tag.to_string(), tag_value(field));
        }
    }

    trace!(?path, count = tags.len(), "Read EXIF tags");
    Ok(Metadata::embedded(tags))
}

fn tag_value(field: &Field) -> TagValue {
    match &field.value {
        Value::Ascii(parts) => decode(&parts.join(&b' ')),
        Value::Byte(bytes) | Value::Undefined(bytes, _) => decode(bytes),
        Value::Rational(v) if !v.is_empty() => TagValue::Number(v[0].to_f64()),
        Value::SRational(v) if !v.is_empty() => TagValue::Number(v[0].to_f64()),
        Value::Float(v) if !v.is_empty() => TagValue::Number(f64::from(v[0])),
        Value::Double(v) if !v.is_empty() => TagValue::Number(v[0]),
        value => match value.get_uint(0) {
            Some(n) => TagValue::Number(f64::from(n)),
            None => TagValue::Text(field.display_value().to_string()),
        },
    }
}

fn decode(bytes: &[u8]) -> TagValue {
    let trimmed: &[u8] = match bytes.iter().rposition(|&b| b != 0) {
        Some(end) => &bytes[..=end],
        None => &[],
    };
    match std::str::from_utf8(trimmed) {
        Ok(text) => TagValue::Text(text.to_string()),
        Err(_) => TagValue::Text(UNDECODABLE.to_string()),
    }
}
