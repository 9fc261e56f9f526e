//! Lifecycle hooks for transfer sessions.

use std::ops::Range;
use std::path::Path;
use std::time::Duration;

use ferryload_protocol::FileIdentity;

use crate::TransferError;
use crate::types::{TransferProgress, UploadOutcome};

/// Receives lifecycle events from a [`TransferSession`](crate::TransferSession).
///
/// Every method has an empty default, so implementors pick only the
/// events they care about. Observers run inline on the upload task and
/// should return quickly.
pub trait SessionObserver: Send + Sync {
    /// `upload()` was called for `source`.
    fn on_init(&self, _source: &Path) {}

    /// The fingerprint is known.
    fn on_hashed(&self, _identity: &FileIdentity) {}

    /// Chunk `index` covering `range` is about to be sent.
    fn before_chunk(&self, _identity: &FileIdentity, _index: u64, _range: Range<u64>) {}

    /// Chunk `index` was acknowledged after `elapsed` (queueing included).
    fn after_chunk(&self, _identity: &FileIdentity, _index: u64, _elapsed: Duration) {}

    /// Progress changed.
    fn on_progress(&self, _progress: &TransferProgress) {}

    /// `upload()` returned without error.
    fn on_finished(&self, _outcome: UploadOutcome) {}

    /// `upload()` returned `error`. The session is `Stopped` when the
    /// error is resumable and `Failed` otherwise.
    fn on_failed(&self, _error: &TransferError) {}
}

/// Adapts a closure into a progress-only observer.
pub(crate) struct ProgressFn<F>(pub F);

impl<F> SessionObserver for ProgressFn<F>
where
    F: Fn(&TransferProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &TransferProgress) {
        (self.0)(progress)
    }
}
