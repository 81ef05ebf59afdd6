//! Package file inventory entries

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Extension of an installable package file
pub const PACKAGE_FILE_EXTENSION: &str = "apk";

/// Where the bytes of an inventory entry can be read from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum FileSource {
    /// Readable by this process
    Direct(PathBuf),
    /// Only readable through the privileged shell
    Privileged(PathBuf),
}

impl FileSource {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Direct(path) | Self::Privileged(path) => path,
        }
    }

    #[must_use]
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Privileged(_))
    }
}

/// A single file of a package directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileEntry {
    name: String,
    size_bytes: u64,
    source: FileSource,
}

impl FileEntry {
    /// Create a new entry
    pub fn new(name: impl Into<String>, size_bytes: u64, source: FileSource) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            source,
        }
    }

    /// Leaf filename
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared size in bytes
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    #[must_use]
    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Full path of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        self.source.path()
    }

    /// Whether this entry is an installable package unit
    #[must_use]
    pub fn is_installable(&self) -> bool {
        Path::new(&self.name)
            .extension()
            .is_some_and(|ext| ext == PACKAGE_FILE_EXTENSION)
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.name, self.size_bytes)
    }
}
