//! Bucket names and key-to-path translation
//!
//! Remote keys use `/` as the hierarchy separator. Every key maps to exactly
//! one path under the destination root, `<base>/<bucket>`, by turning each
//! `/`-separated segment into a local path component.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Remote hierarchy separator used in object keys
pub const KEY_SEPARATOR: char = '/';

/// Name of the bucket being mirrored
///
/// The name doubles as the destination directory name, so it must be a
/// single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketName(String);

impl BucketName {
    /// Validate and wrap a bucket name
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(Error::InvalidBucket("Bucket name cannot be empty".into()));
        }

        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(Error::InvalidBucket(format!(
                "'{name}' cannot be used as a directory name"
            )));
        }

        Ok(Self(name))
    }

    /// Get the bucket name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BucketName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BucketName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check whether a key is a directory marker (ends with the separator)
pub fn is_directory_marker(key: &str) -> bool {
    key.ends_with(KEY_SEPARATOR)
}

/// Destination root for a bucket: `<base>/<bucket>`
pub fn destination_root(base: &Path, bucket: &BucketName) -> PathBuf {
    base.join(bucket.as_str())
}

/// Translate a remote key into a relative local path
///
/// Empty and `.` segments are dropped. A `..` segment, or one the platform
/// reads as rooted or drive-prefixed, would escape the destination root and
/// is rejected.
pub fn translate_key(key: &str) -> Result<PathBuf> {
    let mut path = PathBuf::new();

    for segment in key.split(KEY_SEPARATOR) {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(Error::InvalidKey(format!(
                    "'{key}' escapes the destination directory"
                )));
            }
            _ if is_plain_component(segment) => path.push(segment),
            _ => {
                return Err(Error::InvalidKey(format!(
                    "'{key}' escapes the destination directory"
                )));
            }
        }
    }

    Ok(path)
}

fn is_plain_component(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Local path for `key` under `root`
pub fn local_path(root: &Path, key: &str) -> Result<PathBuf> {
    Ok(root.join(translate_key(key)?))
}
