//! The transfer session state machine.
//!
//! `INIT -> HASHING -> CHECKING -> (INSTANT_COMPLETE | UPLOADING -> MERGING -> DONE)`,
//! with `STOPPED` reachable from any active state.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use ferryload_protocol::{CheckOutcome, FileIdentity};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::TransferError;
use crate::backend::{ChunkUpload, UploadBackend};
use crate::chunked::ChunkReader;
use crate::config::TransferConfig;
use crate::fingerprint::fingerprint;
use crate::observer::{ProgressFn, SessionObserver};
use crate::pool::RequestPool;
use crate::progress::SpeedCalculator;
use crate::types::{SessionState, TransferProgress, UploadOutcome};
use crate::window::WindowController;

/// Requests that a running upload halt at its next checkpoint.
///
/// Clones share the same target session.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    token: Arc<Mutex<CancellationToken>>,
}

impl StopHandle {
    /// Cancels the current upload attempt. Has no effect on attempts
    /// started afterwards.
    pub fn stop(&self) {
        self.current().cancel();
    }

    fn current(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Installs a fresh token for a new attempt.
    fn rearm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = token.clone();
        token
    }
}

struct SessionInner {
    state: SessionState,
    identity: Option<FileIdentity>,
    total_bytes: u64,
    sent_bytes: u64,
    next_chunk_index: u64,
    window_size: u64,
    speed: SpeedCalculator,
}

/// Uploads one file, resuming from whatever the server already holds.
///
/// Each call to [`upload`](Self::upload) runs the full state machine
/// from the start: the file is re-fingerprinted and the server is asked
/// again where to resume.
pub struct TransferSession {
    source: PathBuf,
    name: String,
    config: TransferConfig,
    backend: Arc<dyn UploadBackend>,
    pool: RequestPool,
    observers: Vec<Arc<dyn SessionObserver>>,
    stop: StopHandle,
    running: AtomicBool,
    inner: Mutex<SessionInner>,
}

impl TransferSession {
    /// Creates a session for `source`, uploading under its file name.
    pub fn new(
        source: impl Into<PathBuf>,
        backend: Arc<dyn UploadBackend>,
        pool: RequestPool,
        config: TransferConfig,
    ) -> Result<Self, TransferError> {
        config.validate()?;
        let source = source.into();
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                TransferError::InvalidConfig(format!("{} has no file name", source.display()))
            })?;
        let window_size = config.window.base_chunk_size;

        Ok(Self {
            source,
            name,
            config,
            backend,
            pool,
            observers: Vec::new(),
            stop: StopHandle::default(),
            running: AtomicBool::new(false),
            inner: Mutex::new(SessionInner {
                state: SessionState::Init,
                identity: None,
                total_bytes: 0,
                sent_bytes: 0,
                next_chunk_index: 0,
                window_size,
                speed: SpeedCalculator::default(),
            }),
        })
    }

    /// Uploads under `name` instead of the source's file name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers an observer. Observers are called in registration order.
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Registers a progress callback.
    pub fn on_progress<F>(self, callback: F) -> Self
    where
        F: Fn(&TransferProgress) + Send + Sync + 'static,
    {
        self.with_observer(Arc::new(ProgressFn(callback)))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle that can stop this session from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Asks the running upload to halt. The in-flight chunk, if any, is
    /// abandoned and its bytes are not counted.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Identity computed by the last hashing phase.
    pub fn identity(&self) -> Option<FileIdentity> {
        self.lock().identity.clone()
    }

    pub fn progress(&self) -> TransferProgress {
        let s = self.lock();
        TransferProgress {
            name: self.name.clone(),
            total_bytes: s.total_bytes,
            sent_bytes: s.sent_bytes,
            next_chunk_index: s.next_chunk_index,
            window_size: s.window_size,
            state: s.state,
            done: s.state.is_done(),
            bytes_per_second: s.speed.bytes_per_second(),
            eta_secs: s
                .speed
                .eta(s.total_bytes.saturating_sub(s.sent_bytes))
                .map(|d| d.as_secs()),
        }
    }

    /// Runs (or resumes) the upload.
    ///
    /// Returns `Ok(UploadOutcome::Stopped)` when [`stop`](Self::stop) is
    /// observed. Network failures leave the session `Stopped` and are
    /// returned as errors; calling `upload()` again resumes. Any other
    /// error leaves it `Failed`. Either way observers get a final progress
    /// snapshot followed by `on_failed`.
    pub async fn upload(&self) -> Result<UploadOutcome, TransferError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(TransferError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);
        let stop = self.stop.rearm();

        let result = self.run(&stop).await;
        match &result {
            Ok(outcome) => {
                for o in &self.observers {
                    o.on_finished(*outcome);
                }
            }
            Err(e) if e.is_resumable() => {
                warn!(file = %self.name, error = %e, "upload interrupted");
                self.set_state(SessionState::Stopped);
            }
            Err(e @ TransferError::Merge(_)) => {
                error!(file = %self.name, error = %e, "merge failed");
                self.set_state(SessionState::Failed);
            }
            Err(e) => {
                warn!(file = %self.name, error = %e, "upload failed");
                self.set_state(SessionState::Failed);
            }
        }
        if let Err(e) = &result {
            self.emit_progress();
            for o in &self.observers {
                o.on_failed(e);
            }
        }
        result
    }

    async fn run(&self, stop: &CancellationToken) -> Result<UploadOutcome, TransferError> {
        self.reset();
        for o in &self.observers {
            o.on_init(&self.source);
        }

        // HASHING
        self.set_state(SessionState::Hashing);
        let total_bytes = tokio::fs::metadata(&self.source)
            .await
            .map_err(TransferError::Hash)?
            .len();
        let hash = tokio::select! {
            biased;
            _ = stop.cancelled() => return Ok(self.halt()),
            r = fingerprint(&self.source, self.config.hash_mode, stop) => match r {
                Err(TransferError::Cancelled) => return Ok(self.halt()),
                r => r?,
            },
        };
        let identity = FileIdentity::new(self.name.clone(), hash, total_bytes);
        debug!(file = %identity.name, hash = %identity.hash, size = total_bytes, "fingerprint ready");
        {
            let mut s = self.lock();
            s.identity = Some(identity.clone());
            s.total_bytes = total_bytes;
        }
        for o in &self.observers {
            o.on_hashed(&identity);
        }

        // CHECKING
        self.set_state(SessionState::Checking);
        let outcome = tokio::select! {
            biased;
            _ = stop.cancelled() => return Ok(self.halt()),
            r = self.backend.check(&identity) => r?,
        };
        if outcome == CheckOutcome::Complete {
            info!(file = %identity.name, "server already holds file");
            self.update(|s| {
                s.sent_bytes = total_bytes;
                s.state = SessionState::InstantComplete;
            });
            self.emit_progress();
            return Ok(UploadOutcome::Instant);
        }
        let (sent_bytes, next_index) = outcome.resume_point();
        if sent_bytes > total_bytes {
            return Err(TransferError::ResumeMismatch {
                uploaded: sent_bytes,
                total: total_bytes,
            });
        }
        if next_index > 0 {
            info!(
                file = %identity.name,
                uploaded_bytes = sent_bytes,
                resume_index = next_index,
                "resuming upload"
            );
        }

        // UPLOADING
        let mut window = WindowController::new(self.config.window);
        self.update(|s| {
            s.sent_bytes = sent_bytes;
            s.next_chunk_index = next_index;
            s.window_size = window.chunk_size();
            s.state = SessionState::Uploading;
        });
        self.emit_progress();

        let mut reader = ChunkReader::open(&self.source).await?;
        if reader.file_size() != total_bytes {
            return Err(TransferError::SourceChanged {
                expected: total_bytes,
                actual: reader.file_size(),
            });
        }

        let mut sent = sent_bytes;
        let mut index = next_index;
        // An empty file still sends one empty chunk so the server has a
        // partial upload to merge.
        while sent < total_bytes || index == 0 {
            if stop.is_cancelled() {
                return Ok(self.halt());
            }

            let len = window.chunk_size().min(total_bytes - sent);
            let chunk = reader.read_chunk(index, sent, len).await?;
            for o in &self.observers {
                o.before_chunk(&identity, index, chunk.range());
            }

            let upload = ChunkUpload {
                name: identity.name.clone(),
                hash: identity.hash.clone(),
                index,
                data: chunk.data,
            };
            let token = stop.child_token();
            let backend = &self.backend;
            let timed = self
                .pool
                .submit(async move {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => Err(TransferError::Cancelled),
                        r = backend.upload_chunk(upload, token.clone()) => r,
                    }
                })
                .await;

            match timed.result {
                Ok(()) => {}
                Err(TransferError::Cancelled) => return Ok(self.halt()),
                Err(e) => return Err(e),
            }

            let next_size = window.record(timed.elapsed);
            sent += len;
            index += 1;
            debug!(
                file = %identity.name,
                index = index - 1,
                len,
                elapsed_ms = timed.elapsed.as_millis() as u64,
                next_size,
                "chunk acknowledged"
            );
            self.update(|s| {
                s.sent_bytes = sent;
                s.next_chunk_index = index;
                s.window_size = next_size;
                s.speed.record(len);
            });
            for o in &self.observers {
                o.after_chunk(&identity, index - 1, timed.elapsed);
            }
            self.emit_progress();
        }

        // MERGING
        self.set_state(SessionState::Merging);
        self.backend.merge(&identity).await.map_err(|e| match e {
            TransferError::Merge(_) => e,
            other => TransferError::Merge(other.to_string()),
        })?;

        self.set_state(SessionState::Done);
        info!(file = %identity.name, size = total_bytes, chunks = index, "upload complete");
        self.emit_progress();
        Ok(UploadOutcome::Completed)
    }

    fn halt(&self) -> UploadOutcome {
        self.set_state(SessionState::Stopped);
        info!(file = %self.name, "upload stopped");
        self.emit_progress();
        UploadOutcome::Stopped
    }

    fn reset(&self) {
        let base = self.config.window.base_chunk_size;
        self.update(|s| {
            s.state = SessionState::Init;
            s.sent_bytes = 0;
            s.next_chunk_index = 0;
            s.window_size = base;
            s.speed.reset();
        });
    }

    fn emit_progress(&self) {
        if self.observers.is_empty() {
            return;
        }
        let progress = self.progress();
        for o in &self.observers {
            o.on_progress(&progress);
        }
    }

    fn set_state(&self, state: SessionState) {
        debug!(file = %self.name, ?state, "session state");
        self.update(|s| s.state = state);
    }

    fn update(&self, f: impl FnOnce(&mut SessionInner)) {
        f(&mut self.lock());
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendFuture;
    use crate::config::WindowConfig;
    use std::collections::BTreeMap;
    use std::io::Write;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// In-memory server that records everything it receives.
    #[derive(Default)]
    struct MemoryBackend {
        check_outcome: Mutex<Option<CheckOutcome>>,
        chunks: Mutex<BTreeMap<u64, Vec<u8>>>,
        merged: Mutex<Option<Vec<u8>>>,
        /// Index whose upload blocks until cancelled.
        block_at: Option<u64>,
        /// Index whose upload fails with a network error.
        fail_at: Option<u64>,
        fail_merge: bool,
        blocked: Notify,
        check_calls: AtomicUsize,
    }

    impl MemoryBackend {
        fn with_outcome(outcome: CheckOutcome) -> Self {
            Self {
                check_outcome: Mutex::new(Some(outcome)),
                ..Default::default()
            }
        }
    }

    impl UploadBackend for MemoryBackend {
        fn check<'a>(&'a self, _identity: &'a FileIdentity) -> BackendFuture<'a, CheckOutcome> {
            Box::pin(async move {
                self.check_calls.fetch_add(1, Ordering::SeqCst);
                Ok(self
                    .check_outcome
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or(CheckOutcome::NotFound))
            })
        }

        fn upload_chunk(
            &self,
            chunk: ChunkUpload,
            cancel: CancellationToken,
        ) -> BackendFuture<'_, ()> {
            Box::pin(async move {
                if self.block_at == Some(chunk.index) {
                    self.blocked.notify_one();
                    cancel.cancelled().await;
                    return Err(TransferError::Cancelled);
                }
                if self.fail_at == Some(chunk.index) {
                    return Err(TransferError::Network("connection reset".into()));
                }
                self.chunks.lock().unwrap().insert(chunk.index, chunk.data);
                Ok(())
            })
        }

        fn merge<'a>(&'a self, _identity: &'a FileIdentity) -> BackendFuture<'a, ()> {
            Box::pin(async move {
                if self.fail_merge {
                    return Err(TransferError::Merge("disk full".into()));
                }
                let data: Vec<u8> = self
                    .chunks
                    .lock()
                    .unwrap()
                    .values()
                    .flatten()
                    .copied()
                    .collect();
                *self.merged.lock().unwrap() = Some(data);
                Ok(())
            })
        }
    }

    fn write_source(dir: &TempDir, len: usize) -> (PathBuf, Vec<u8>) {
        let data: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
        let path = dir.path().join("payload.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&data)
            .unwrap();
        (path, data)
    }

    fn fixed_config(chunk: u64) -> TransferConfig {
        TransferConfig {
            window: WindowConfig::fixed(chunk),
            ..Default::default()
        }
    }

    fn session(path: &Path, backend: Arc<MemoryBackend>, chunk: u64) -> TransferSession {
        TransferSession::new(path, backend, RequestPool::new(6), fixed_config(chunk)).unwrap()
    }

    #[tokio::test]
    async fn uploads_whole_file_and_merges() {
        let dir = TempDir::new().unwrap();
        let (path, data) = write_source(&dir, 10_000);
        let backend = Arc::new(MemoryBackend::default());
        let s = session(&path, Arc::clone(&backend), 1024);

        let outcome = s.upload().await.unwrap();
        assert_eq!(outcome, UploadOutcome::Completed);
        assert_eq!(s.state(), SessionState::Done);
        assert_eq!(backend.chunks.lock().unwrap().len(), 10);
        assert_eq!(backend.merged.lock().unwrap().as_deref(), Some(&data[..]));

        let p = s.progress();
        assert_eq!(p.sent_bytes, 10_000);
        assert_eq!(p.next_chunk_index, 10);
        assert!(p.done);
        assert_eq!(s.identity().unwrap().name, "payload.bin");
    }

    #[tokio::test]
    async fn instant_complete_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_source(&dir, 5000);
        let backend = Arc::new(MemoryBackend::with_outcome(CheckOutcome::Complete));
        let s = session(&path, Arc::clone(&backend), 1024);

        assert_eq!(s.upload().await.unwrap(), UploadOutcome::Instant);
        assert_eq!(s.state(), SessionState::InstantComplete);
        assert!(backend.chunks.lock().unwrap().is_empty());
        assert!(backend.merged.lock().unwrap().is_none());
        let p = s.progress();
        assert!(p.done);
        assert_eq!(p.sent_bytes, 5000);
    }

    #[tokio::test]
    async fn resumes_from_partial() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_source(&dir, 10_240);
        let backend = Arc::new(MemoryBackend::with_outcome(CheckOutcome::Partial {
            uploaded_bytes: 5120,
            resume_index: 5,
        }));
        let s = session(&path, Arc::clone(&backend), 1024);

        assert_eq!(s.upload().await.unwrap(), UploadOutcome::Completed);
        let indices: Vec<u64> = backend.chunks.lock().unwrap().keys().copied().collect();
        assert_eq!(indices, vec![5, 6, 7, 8, 9]);
        assert_eq!(s.progress().sent_bytes, 10_240);
    }

    #[tokio::test]
    async fn partial_larger_than_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_source(&dir, 100);
        let backend = Arc::new(MemoryBackend::with_outcome(CheckOutcome::Partial {
            uploaded_bytes: 5000,
            resume_index: 5,
        }));
        let s = session(&path, backend, 1024);

        let err = s.upload().await.unwrap_err();
        assert!(matches!(err, TransferError::ResumeMismatch { .. }));
        assert_eq!(s.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn stop_keeps_only_acknowledged_bytes() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_source(&dir, 8192);
        let backend = Arc::new(MemoryBackend {
            block_at: Some(2),
            ..Default::default()
        });
        let s = Arc::new(session(&path, Arc::clone(&backend), 1024));

        let task = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.upload().await })
        };
        backend.blocked.notified().await;
        s.stop();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, UploadOutcome::Stopped);
        assert_eq!(s.state(), SessionState::Stopped);
        let p = s.progress();
        assert_eq!(p.sent_bytes, 2048);
        assert_eq!(p.next_chunk_index, 2);
        assert!(!p.done);
        assert!(backend.merged.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn stop_before_upload_does_not_poison_next_attempt() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_source(&dir, 2048);
        let backend = Arc::new(MemoryBackend::default());
        let s = session(&path, Arc::clone(&backend), 1024);

        s.stop();
        assert_eq!(s.upload().await.unwrap(), UploadOutcome::Completed);
    }

    #[tokio::test]
    async fn network_failure_is_resumable() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_source(&dir, 4096);
        let backend = Arc::new(MemoryBackend {
            fail_at: Some(1),
            ..Default::default()
        });
        let s = session(&path, Arc::clone(&backend), 1024);

        let err = s.upload().await.unwrap_err();
        assert!(err.is_resumable());
        assert_eq!(s.state(), SessionState::Stopped);
        assert_eq!(s.progress().sent_bytes, 1024);
        assert_eq!(backend.chunks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_file_sends_one_empty_chunk() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_source(&dir, 0);
        let backend = Arc::new(MemoryBackend::default());
        let s = session(&path, Arc::clone(&backend), 1024);

        assert_eq!(s.upload().await.unwrap(), UploadOutcome::Completed);
        let chunks = backend.chunks.lock().unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[&0].is_empty());
        assert_eq!(backend.merged.lock().unwrap().as_deref(), Some(&[][..]));
    }

    #[tokio::test]
    async fn concurrent_upload_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_source(&dir, 4096);
        let backend = Arc::new(MemoryBackend {
            block_at: Some(0),
            ..Default::default()
        });
        let s = Arc::new(session(&path, Arc::clone(&backend), 1024));

        let task = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.upload().await })
        };
        backend.blocked.notified().await;
        assert!(matches!(
            s.upload().await,
            Err(TransferError::AlreadyRunning)
        ));
        s.stop();
        assert_eq!(task.await.unwrap().unwrap(), UploadOutcome::Stopped);
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl SessionObserver for Recorder {
        fn on_init(&self, _source: &Path) {
            self.events.lock().unwrap().push("init".into());
        }
        fn on_hashed(&self, identity: &FileIdentity) {
            self.events
                .lock()
                .unwrap()
                .push(format!("hashed {}", identity.total_size));
        }
        fn before_chunk(&self, _identity: &FileIdentity, index: u64, range: std::ops::Range<u64>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("before {index} {}..{}", range.start, range.end));
        }
        fn after_chunk(&self, _identity: &FileIdentity, index: u64, _elapsed: Duration) {
            self.events.lock().unwrap().push(format!("after {index}"));
        }
        fn on_finished(&self, outcome: UploadOutcome) {
            self.events
                .lock()
                .unwrap()
                .push(format!("finished {outcome:?}"));
        }
        fn on_failed(&self, error: &TransferError) {
            self.events.lock().unwrap().push(format!("failed {error}"));
        }
    }

    /// Runs an upload that ends in an error and returns the recorded
    /// events plus the state of the last progress snapshot.
    async fn failing_run(backend: MemoryBackend) -> (Vec<String>, Option<SessionState>) {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_source(&dir, 3000);
        let recorder = Arc::new(Recorder::default());
        let last_state = Arc::new(Mutex::new(None));
        let l = Arc::clone(&last_state);

        let s = session(&path, Arc::new(backend), 1024)
            .with_observer(recorder.clone())
            .on_progress(move |progress| *l.lock().unwrap() = Some(progress.state));
        assert!(s.upload().await.is_err());

        let events = recorder.events.lock().unwrap().clone();
        let state = *last_state.lock().unwrap();
        (events, state)
    }

    #[tokio::test]
    async fn network_failure_reaches_observers() {
        let (events, state) = failing_run(MemoryBackend {
            fail_at: Some(1),
            ..Default::default()
        })
        .await;
        assert_eq!(
            events.last().map(String::as_str),
            Some("failed network failure: connection reset")
        );
        assert!(!events.iter().any(|e| e.starts_with("finished")));
        assert_eq!(state, Some(SessionState::Stopped));
    }

    #[tokio::test]
    async fn merge_failure_reaches_observers() {
        let (events, state) = failing_run(MemoryBackend {
            fail_merge: true,
            ..Default::default()
        })
        .await;
        assert_eq!(
            events.last().map(String::as_str),
            Some("failed merge failure: disk full")
        );
        assert_eq!(state, Some(SessionState::Failed));
    }

    #[tokio::test]
    async fn observers_see_lifecycle_in_order() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_source(&dir, 1500);
        let backend = Arc::new(MemoryBackend::default());
        let recorder = Arc::new(Recorder::default());
        let percents = Arc::new(Mutex::new(Vec::new()));
        let p = Arc::clone(&percents);

        let s = session(&path, backend, 1024)
            .with_observer(recorder.clone())
            .on_progress(move |progress| p.lock().unwrap().push(progress.percentage()));
        s.upload().await.unwrap();

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "init",
                "hashed 1500",
                "before 0 0..1024",
                "after 0",
                "before 1 1024..1500",
                "after 1",
                "finished Completed",
            ]
        );
        let percents = percents.lock().unwrap();
        assert_eq!(percents.first(), Some(&0.0));
        assert_eq!(percents.last(), Some(&100.0));
    }

    #[tokio::test]
    async fn custom_name_is_used_for_identity() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_source(&dir, 10);
        let backend = Arc::new(MemoryBackend::default());
        let s = session(&path, backend, 1024).with_name("renamed.bin");
        s.upload().await.unwrap();
        assert_eq!(s.identity().unwrap().name, "renamed.bin");
        assert_eq!(s.progress().name, "renamed.bin");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let backend: Arc<dyn UploadBackend> = Arc::new(MemoryBackend::default());
        let cfg = TransferConfig {
            pool_size: 0,
            ..Default::default()
        };
        let err = TransferSession::new("/tmp/x.bin", backend, RequestPool::new(1), cfg)
            .err()
            .unwrap();
        assert!(matches!(err, TransferError::InvalidConfig(_)));
    }
}
