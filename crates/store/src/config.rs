use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Subdirectory holding merged artifacts.
pub const DEFAULT_ARTIFACTS_DIR: &str = "files";

/// Subdirectory holding one partial directory per in-progress upload.
pub const DEFAULT_PARTIALS_DIR: &str = "chunks";

/// Partial metadata file name inside each partial directory.
pub const META_FILE: &str = ".meta.json";

/// Suffix of chunk files that are still being written.
pub const STAGING_SUFFIX: &str = ".part";

/// On-disk layout of a chunk store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    pub root: PathBuf,
    #[serde(default = "default_artifacts")]
    pub artifacts: String,
    #[serde(default = "default_partials")]
    pub partials: String,
}

fn default_artifacts() -> String {
    DEFAULT_ARTIFACTS_DIR.into()
}

fn default_partials() -> String {
    DEFAULT_PARTIALS_DIR.into()
}

impl StoreConfig {
    /// Default layout under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            artifacts: default_artifacts(),
            partials: default_partials(),
        }
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join(&self.artifacts)
    }

    pub fn partials_dir(&self) -> PathBuf {
        self.root.join(&self.partials)
    }

    /// Final location of a merged upload. `name` must already be validated.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.artifacts_dir().join(name)
    }

    /// Directory collecting the chunks of `name`.
    pub fn partial_dir(&self, name: &str) -> PathBuf {
        self.partials_dir().join(name)
    }
}

/// Path of committed chunk `index` inside a partial directory.
pub(crate) fn chunk_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(index.to_string())
}

/// Parses a committed chunk file name. Staging files and metadata yield `None`.
pub(crate) fn parse_chunk_name(file_name: &str) -> Option<u64> {
    if file_name.is_empty() || !file_name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    file_name.parse().ok()
}
