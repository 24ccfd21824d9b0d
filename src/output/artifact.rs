//! Atomic artifact persistence
//!
//! Each precinct document lands at a path mirroring its position in the
//! hierarchy:
//!
//! ```text
//! <root>/R001000/0128/012801/01280001/0100001.json
//! ```
//!
//! Downstream consumers enumerate everything below an ancestor by walking
//! the directory tree; no index is required.

use crate::hierarchy::LeafKey;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// File extension of every artifact
pub const ARTIFACT_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum WriteError {
    /// The backing storage is full; the run cannot continue
    #[error("Storage exhausted writing {path}: {source}")]
    Exhausted { path: PathBuf, source: io::Error },

    #[error("Failed to write {path}: {source}")]
    Failed { path: PathBuf, source: io::Error },

    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl WriteError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::StorageFull {
            Self::Exhausted {
                path: path.to_path_buf(),
                source,
            }
        } else {
            Self::Failed {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Destination for committed leaf documents
///
/// Implementations must make a document durable before returning `Ok`; the
/// walker writes the completion marker right after.
pub trait ArtifactStore: Send + Sync {
    fn write(&self, key: &LeafKey, document: &Value) -> Result<PathBuf, WriteError>;
}

/// Writes leaf documents below a root directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Canonical path of a leaf's artifact
    pub fn path_for(&self, key: &LeafKey) -> PathBuf {
        let mut path = self.root.clone();
        let mut segments = key.segments().peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{}.{}", segment, ARTIFACT_EXTENSION));
            }
        }
        path
    }

    /// Directory holding everything below an ancestor prefix
    fn dir_for(&self, prefix: &LeafKey) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(prefix.segments());
        path
    }

    pub fn exists(&self, key: &LeafKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Persists a document atomically
    ///
    /// The document is written to a temporary file in the destination
    /// directory, synced, then renamed over the final path. Readers see
    /// either the previous artifact or the complete new one.
    pub fn write(&self, key: &LeafKey, document: &Value) -> Result<PathBuf, WriteError> {
        let path = self.path_for(key);
        let parent = path.parent().unwrap_or(&self.root);

        fs::create_dir_all(parent).map_err(|e| WriteError::from_io(parent, e))?;

        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        document.serialize(&mut serializer)?;
        buf.push(b'\n');

        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| WriteError::from_io(parent, e))?;
        tmp.write_all(&buf)
            .map_err(|e| WriteError::from_io(&path, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| WriteError::from_io(&path, e))?;
        tmp.persist(&path)
            .map_err(|e| WriteError::from_io(&path, e.error))?;

        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Enumerates every artifact at or below `prefix`, sorted by key
    ///
    /// Uses the path structure alone. A prefix naming a single leaf yields
    /// that leaf if its artifact exists.
    pub fn list_under(&self, prefix: &LeafKey) -> io::Result<Vec<LeafKey>> {
        let mut keys = Vec::new();

        if self.exists(prefix) {
            keys.push(prefix.clone());
        }

        let dir = self.dir_for(prefix);
        if dir.is_dir() {
            let mut segments: Vec<String> = prefix.segments().map(str::to_string).collect();
            collect_artifacts(&dir, &mut segments, &mut keys)?;
        }

        keys.sort();
        Ok(keys)
    }
}

impl ArtifactStore for ArtifactWriter {
    fn write(&self, key: &LeafKey, document: &Value) -> Result<PathBuf, WriteError> {
        ArtifactWriter::write(self, key, document)
    }
}

fn collect_artifacts(
    dir: &Path,
    segments: &mut Vec<String>,
    keys: &mut Vec<LeafKey>,
) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        if file_type.is_dir() {
            segments.push(name.to_string());
            collect_artifacts(&entry.path(), segments, keys)?;
            segments.pop();
        } else if file_type.is_file() {
            // Temporary files from in-progress writes carry no extension
            let Some(stem) = name.strip_suffix(&format!(".{}", ARTIFACT_EXTENSION)) else {
                continue;
            };
            if stem.is_empty() || stem.starts_with('.') {
                continue;
            }
            segments.push(stem.to_string());
            keys.push(LeafKey::from_segments(segments.as_slice()));
            segments.pop();
        }
    }
    Ok(())
}
