use std::fmt;
use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Formats the job API accepts as input media.
const SUPPORTED_FORMATS: &[&str] = &["mp3", "mp4", "wav", "flac", "ogg", "amr", "webm", "m4a"];

const DEFAULT_FORMAT: &str = "mp3";

/// Opaque handle to a blob in an external store, rendered as `scheme://bucket/key`
/// or as a plain `http(s)://` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location(String);

impl Location {
    pub fn object(scheme: &str, bucket: &str, key: &str) -> Self {
        Self(format!("{scheme}://{bucket}/{key}"))
    }

    pub fn from_raw(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_http(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }

    /// Splits a `scheme://bucket/key` location. `None` for HTTP URLs or
    /// anything without both parts.
    pub fn bucket_and_key(&self) -> Option<(&str, &str)> {
        if self.is_http() {
            return None;
        }
        let (_, rest) = self.0.split_once("://")?;
        let (bucket, key) = rest.split_once('/')?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        Some((bucket, key))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-cased media format name, e.g. `mp3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaFormat(String);

impl MediaFormat {
    pub fn new(format: &str) -> Self {
        Self(format.trim().trim_start_matches('.').to_lowercase())
    }

    /// Derives the format from the file extension, `mp3` when there is none.
    pub fn from_filename(filename: &str) -> Self {
        match Path::new(filename).extension().and_then(|e| e.to_str()) {
            Some(ext) if !ext.is_empty() => Self::new(ext),
            _ => Self::new(DEFAULT_FORMAT),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_FORMATS.contains(&self.0.as_str())
    }

    pub fn content_type(&self) -> String {
        format!("audio/{}", self.0)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Audio bytes handed over by the caller, with the format declared for them.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub filename: String,
    pub bytes: Bytes,
    pub format: MediaFormat,
}

impl Artifact {
    pub fn new(bytes: impl Into<Bytes>, filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            bytes: bytes.into(),
            format: MediaFormat::from_filename(filename),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A fresh `audio-<uuid>[.ext]` key. Every call returns a different key.
    pub fn unique_key(&self) -> String {
        let ext = Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty());
        match ext {
            Some(ext) => format!("audio-{}.{ext}", Uuid::new_v4()),
            None => format!("audio-{}", Uuid::new_v4()),
        }
    }
}
