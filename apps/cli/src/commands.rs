use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use ferryload_http::HttpBackend;
use ferryload_protocol::{CheckOutcome, FileIdentity};
use ferryload_store::{LocalBackend, ResumeCoordinator, StoreConfig};
use ferryload_transfer::{
    HashMode, RequestPool, SessionObserver, TransferConfig, TransferProgress, TransferSession,
    UploadBackend, UploadOutcome, fingerprint,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{CliConfig, RetryConfig};

/// Where uploads go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Http(String),
    Local(PathBuf),
}

impl Target {
    /// Command-line flags win over the config file; a server URL wins
    /// over a store directory.
    pub fn resolve(
        server: Option<String>,
        store: Option<PathBuf>,
        config: &CliConfig,
    ) -> anyhow::Result<Self> {
        match (server, store) {
            (Some(url), _) => Ok(Target::Http(url)),
            (None, Some(root)) => Ok(Target::Local(root)),
            (None, None) => match (&config.server_url, &config.store_root) {
                (Some(url), _) => Ok(Target::Http(url.clone())),
                (None, Some(root)) => Ok(Target::Local(root.clone())),
                (None, None) => anyhow::bail!(
                    "no upload target: pass --server or --store, or set serverUrl or storeRoot in the config file"
                ),
            },
        }
    }

    pub async fn backend(&self) -> anyhow::Result<Arc<dyn UploadBackend>> {
        match self {
            Target::Http(url) => Ok(Arc::new(HttpBackend::new(url)?)),
            Target::Local(root) => {
                let store = ResumeCoordinator::open(StoreConfig::new(root))
                    .await
                    .with_context(|| format!("opening store at {}", root.display()))?;
                Ok(Arc::new(LocalBackend::new(Arc::new(store))))
            }
        }
    }
}

/// Logs progress every ten percent.
#[derive(Default)]
struct ProgressLog {
    last_decile: AtomicU64,
}

impl SessionObserver for ProgressLog {
    fn on_hashed(&self, identity: &FileIdentity) {
        info!(
            file = %identity.name,
            hash = %identity.hash,
            size = identity.total_size,
            "fingerprint computed"
        );
    }

    fn on_progress(&self, progress: &TransferProgress) {
        let decile = (progress.percentage() / 10.0) as u64;
        if decile > self.last_decile.fetch_max(decile, Ordering::Relaxed) {
            info!(
                file = %progress.name,
                percent = decile * 10,
                sent = progress.sent_bytes,
                remaining = progress.remaining_bytes(),
                bytes_per_second = progress.bytes_per_second as u64,
                eta_secs = ?progress.eta_secs,
                "upload progress"
            );
        }
    }
}

/// Uploads `file`, retrying resumable failures with backoff. Cancelling
/// `shutdown` stops the upload and yields [`UploadOutcome::Stopped`].
pub async fn upload(
    file: &Path,
    name: Option<String>,
    backend: Arc<dyn UploadBackend>,
    transfer: TransferConfig,
    retry: &RetryConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<UploadOutcome> {
    let pool = RequestPool::new(transfer.pool_size);
    let mut session = TransferSession::new(file, backend, pool, transfer)?
        .with_observer(Arc::new(ProgressLog::default()));
    if let Some(name) = name {
        session = session.with_name(name);
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        if shutdown.is_cancelled() {
            return Ok(UploadOutcome::Stopped);
        }

        let run = session.upload();
        tokio::pin!(run);
        // Polling the upload first installs its stop token before the
        // shutdown branch can fire.
        let result = tokio::select! {
            biased;
            r = &mut run => r,
            _ = shutdown.cancelled() => {
                session.stop();
                run.await
            }
        };

        match result {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_resumable() && shutdown.is_cancelled() => {
                info!(error = %e, "upload stopped by shutdown");
                return Ok(UploadOutcome::Stopped);
            }
            Err(e) if e.is_resumable() && attempt < retry.max_attempts => {
                let delay = retry.delay_for_attempt(attempt);
                warn!(
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "upload interrupted, retrying"
                );
                tokio::select! {
                    _ = shutdown.cancelled() => return Ok(UploadOutcome::Stopped),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => {
                return Err(e).with_context(|| format!("uploading {}", file.display()));
            }
        }
    }
}

/// Fingerprints `file` and asks the backend what it holds.
pub async fn check(
    file: &Path,
    name: Option<String>,
    backend: &dyn UploadBackend,
    hash_mode: HashMode,
) -> anyhow::Result<(FileIdentity, CheckOutcome)> {
    let size = tokio::fs::metadata(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?
        .len();
    let name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", file.display()))?,
    };
    let hash = fingerprint(file, hash_mode, &CancellationToken::new()).await?;
    let identity = FileIdentity::new(name, hash, size);
    let outcome = backend.check(&identity).await?;
    Ok((identity, outcome))
}

/// Human-readable line for a check result.
pub fn describe(identity: &FileIdentity, outcome: &CheckOutcome) -> String {
    match outcome {
        CheckOutcome::Complete => format!("complete: {} is already uploaded", identity.name),
        CheckOutcome::Partial {
            uploaded_bytes,
            resume_index,
        } => format!(
            "partial: {uploaded_bytes} of {} bytes of {} received, resuming at chunk {resume_index}",
            identity.total_size, identity.name
        ),
        CheckOutcome::NotFound => format!("not found: nothing uploaded for {}", identity.name),
    }
}

/// Asks the backend to merge whatever it holds for `name`.
pub async fn merge(name: &str, backend: &dyn UploadBackend) -> anyhow::Result<()> {
    let identity = FileIdentity::new(name, "", 0);
    backend
        .merge(&identity)
        .await
        .with_context(|| format!("merging {name}"))?;
    Ok(())
}
