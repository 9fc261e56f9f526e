//! Server-side resume coordination.
//!
//! Each upload name owns one partial directory holding committed chunk
//! files named by their decimal index, plus a small metadata file.
//! Chunks are written under a staging name and renamed into place once
//! complete, so a crash mid-write never leaves a truncated chunk that
//! `check` would count or `merge` would concatenate.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ferryload_protocol::{CheckOutcome, ChunkForm, FileIdentity};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{META_FILE, STAGING_SUFFIX, StoreConfig, chunk_path, parse_chunk_name};
use crate::validation::validate_file_name;
use crate::StoreError;

/// Result of a successful merge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The chunks were concatenated into the final artifact.
    Merged { bytes: u64, chunks: u64 },
    /// No partial directory remains and the artifact already exists.
    AlreadyMerged,
}

#[derive(Debug, Serialize, Deserialize)]
struct PartialMeta {
    name: String,
    hash: String,
}

/// What a partial directory currently holds.
#[derive(Debug, Default)]
struct Scan {
    /// Length of the contiguous run `0..run`.
    run: u64,
    /// Byte total of that run.
    bytes: u64,
    /// Committed chunks past the first gap.
    stray: Vec<PathBuf>,
    /// Unfinished staging files.
    staging: Vec<PathBuf>,
}

/// Answers resume checks, stores chunks, and merges them into artifacts.
///
/// Operations on the same name are serialized against merges: any
/// number of `receive_chunk` calls may run together, while `check` and
/// `merge` take the name exclusively.
pub struct ResumeCoordinator {
    config: StoreConfig,
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl ResumeCoordinator {
    /// Creates a coordinator without touching the filesystem.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates the store directories and returns a coordinator over them.
    pub async fn open(config: StoreConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(config.artifacts_dir()).await?;
        fs::create_dir_all(config.partials_dir()).await?;
        info!(root = %config.root.display(), "chunk store ready");
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Reports what the store holds for `identity`.
    ///
    /// A partial upload whose chunks already add up to the full size is
    /// merged on the spot and reported as complete.
    pub async fn check(&self, identity: &FileIdentity) -> Result<CheckOutcome, StoreError> {
        let name = identity.name.as_str();
        validate_file_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.write().await;
        self.check_locked(identity).await
    }

    async fn check_locked(&self, identity: &FileIdentity) -> Result<CheckOutcome, StoreError> {
        let name = identity.name.as_str();
        let dir = self.config.partial_dir(name);
        if fs::try_exists(self.config.artifact_path(name)).await? {
            debug!(file = name, "artifact present");
            discard_leftover(name, &dir).await?;
            return Ok(CheckOutcome::Complete);
        }

        if !fs::try_exists(&dir).await? {
            return Ok(CheckOutcome::NotFound);
        }

        match read_meta(&dir).await {
            Some(meta) if meta.hash == identity.hash => {}
            Some(meta) => {
                warn!(
                    file = name,
                    stored = %meta.hash,
                    requested = %identity.hash,
                    "hash changed, discarding partial upload"
                );
                fs::remove_dir_all(&dir).await?;
                return Ok(CheckOutcome::NotFound);
            }
            None => write_meta(&dir, name, &identity.hash).await?,
        }

        let scan = scan(&dir).await?;
        for path in scan.stray.iter().chain(&scan.staging) {
            debug!(file = name, path = %path.display(), "removing unusable chunk file");
            remove_if_present(path).await?;
        }

        if scan.bytes == identity.total_size {
            self.merge_locked(name).await?;
            return Ok(CheckOutcome::Complete);
        }
        if scan.bytes > identity.total_size {
            warn!(
                file = name,
                received = scan.bytes,
                expected = identity.total_size,
                "partial upload larger than file, discarding"
            );
            fs::remove_dir_all(&dir).await?;
            return Ok(CheckOutcome::NotFound);
        }

        debug!(
            file = name,
            uploaded_bytes = scan.bytes,
            resume_index = scan.run,
            "partial upload"
        );
        Ok(CheckOutcome::Partial {
            uploaded_bytes: scan.bytes,
            resume_index: scan.run,
        })
    }

    /// Stores one chunk read from `body` and returns its length.
    ///
    /// The payload must be exactly `form.size` bytes. Safe to call
    /// concurrently for different indices of the same name. Once the
    /// artifact exists, chunks for that name are read and discarded.
    pub async fn receive_chunk<R>(
        &self,
        form: &ChunkForm,
        body: &mut R,
    ) -> Result<u64, StoreError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let name = form.filename.as_str();
        validate_file_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.read().await;
        self.receive_locked(form, body).await
    }

    async fn receive_locked<R>(&self, form: &ChunkForm, body: &mut R) -> Result<u64, StoreError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let name = form.filename.as_str();
        if fs::try_exists(self.config.artifact_path(name)).await? {
            // Late or repeated chunk for a finished upload.
            let discarded = tokio::io::copy(body, &mut tokio::io::sink()).await?;
            debug!(
                file = name,
                index = form.index,
                bytes = discarded,
                "artifact present, chunk dropped"
            );
            return Ok(discarded);
        }

        let dir = self.config.partial_dir(name);
        fs::create_dir_all(&dir).await?;
        if !fs::try_exists(dir.join(META_FILE)).await? {
            write_meta(&dir, name, &form.hash).await?;
        }

        let staging = dir.join(format!(
            "{}.{}{STAGING_SUFFIX}",
            form.index,
            Uuid::new_v4().simple()
        ));
        let written = match write_staged(&staging, body).await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&staging).await;
                return Err(e.into());
            }
        };
        if written != form.size {
            let _ = fs::remove_file(&staging).await;
            return Err(StoreError::SizeMismatch {
                name: name.to_string(),
                index: form.index,
                expected: form.size,
                actual: written,
            });
        }

        fs::rename(&staging, chunk_path(&dir, form.index)).await?;
        debug!(file = name, index = form.index, bytes = written, "chunk stored");
        Ok(written)
    }

    /// Concatenates the chunks of `name` in index order into the final
    /// artifact and removes the partial directory.
    pub async fn merge(&self, name: &str) -> Result<MergeOutcome, StoreError> {
        validate_file_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.write().await;
        self.merge_locked(name).await
    }

    async fn merge_locked(&self, name: &str) -> Result<MergeOutcome, StoreError> {
        let dir = self.config.partial_dir(name);
        let artifact = self.config.artifact_path(name);

        if fs::try_exists(&artifact).await? {
            debug!(file = name, "already merged");
            discard_leftover(name, &dir).await?;
            return Ok(MergeOutcome::AlreadyMerged);
        }
        if !fs::try_exists(&dir).await? {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let scan = scan(&dir).await?;
        if !scan.stray.is_empty() {
            return Err(StoreError::Gap {
                name: name.to_string(),
                missing: scan.run,
            });
        }

        let artifacts = self.config.artifacts_dir();
        fs::create_dir_all(&artifacts).await?;
        let temp = artifacts.join(format!(".{name}.{}.merging", Uuid::new_v4().simple()));

        let bytes = match concat_chunks(&dir, scan.run, &temp).await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&temp).await;
                return Err(e.into());
            }
        };
        if let Err(e) = fs::rename(&temp, &artifact).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        fs::remove_dir_all(&dir).await?;

        info!(file = name, bytes, chunks = scan.run, "upload merged");
        Ok(MergeOutcome::Merged {
            bytes,
            chunks: scan.run,
        })
    }

    fn lock_for(&self, name: &str) -> NameLock<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let lock = Arc::clone(locks.entry(name.to_string()).or_default());
        NameLock {
            locks: &self.locks,
            name: name.to_string(),
            lock,
        }
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Reference to a per-name lock. Dropping it removes the map entry once
/// nobody else holds one, including when the owning future is cancelled.
struct NameLock<'a> {
    locks: &'a Mutex<HashMap<String, Arc<RwLock<()>>>>,
    name: String,
    lock: Arc<RwLock<()>>,
}

impl std::ops::Deref for NameLock<'_> {
    type Target = RwLock<()>;

    fn deref(&self) -> &Self::Target {
        &self.lock
    }
}

impl Drop for NameLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one here.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.name);
        }
    }
}

/// Removes a partial directory left behind next to a finished artifact.
async fn discard_leftover(name: &str, dir: &Path) -> Result<(), StoreError> {
    if fs::try_exists(dir).await? {
        warn!(file = name, "artifact already merged, removing leftover chunks");
        fs::remove_dir_all(dir).await?;
    }
    Ok(())
}

async fn scan(dir: &Path) -> Result<Scan, StoreError> {
    let mut committed = BTreeMap::new();
    let mut result = Scan::default();

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some(index) = parse_chunk_name(file_name) {
            let len = entry.metadata().await?.len();
            committed.insert(index, (entry.path(), len));
        } else if file_name.ends_with(STAGING_SUFFIX) {
            result.staging.push(entry.path());
        }
    }

    while let Some((_, len)) = committed.remove(&result.run) {
        result.bytes += len;
        result.run += 1;
    }
    result.stray = committed.into_values().map(|(path, _)| path).collect();
    Ok(result)
}

async fn write_staged<R>(path: &Path, body: &mut R) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut file = fs::File::create(path).await?;
    let written = tokio::io::copy(body, &mut file).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(written)
}

async fn concat_chunks(dir: &Path, count: u64, target: &Path) -> std::io::Result<u64> {
    let mut out = fs::File::create(target).await?;
    let mut total = 0;
    for index in 0..count {
        let mut chunk = fs::File::open(chunk_path(dir, index)).await?;
        total += tokio::io::copy(&mut chunk, &mut out).await?;
    }
    out.flush().await?;
    out.sync_all().await?;
    Ok(total)
}

async fn read_meta(dir: &Path) -> Option<PartialMeta> {
    let raw = fs::read(dir.join(META_FILE)).await.ok()?;
    match serde_json::from_slice(&raw) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "unreadable partial metadata");
            None
        }
    }
}

async fn write_meta(dir: &Path, name: &str, hash: &str) -> Result<(), StoreError> {
    let meta = PartialMeta {
        name: name.to_string(),
        hash: hash.to_string(),
    };
    let temp = dir.join(format!("{META_FILE}.{}", Uuid::new_v4().simple()));
    fs::write(&temp, serde_json::to_vec(&meta)?).await?;
    fs::rename(&temp, dir.join(META_FILE)).await?;
    Ok(())
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
