use std::sync::Arc;

use ferryload_protocol::{CheckOutcome, FileIdentity};
use ferryload_transfer::{BackendFuture, ChunkUpload, TransferError, UploadBackend};
use tokio_util::sync::CancellationToken;

use crate::StoreError;
use crate::coordinator::ResumeCoordinator;

/// Uploads straight into a [`ResumeCoordinator`] in the same process.
#[derive(Clone)]
pub struct LocalBackend {
    store: Arc<ResumeCoordinator>,
}

impl LocalBackend {
    pub fn new(store: Arc<ResumeCoordinator>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ResumeCoordinator {
        &self.store
    }
}

/// Bad names can never succeed on retry; everything else is treated as
/// a transient failure of the store.
fn transfer_error(e: StoreError) -> TransferError {
    match e {
        StoreError::InvalidName(msg) => TransferError::InvalidConfig(msg),
        other => TransferError::Network(other.to_string()),
    }
}

impl UploadBackend for LocalBackend {
    fn check<'a>(&'a self, identity: &'a FileIdentity) -> BackendFuture<'a, CheckOutcome> {
        Box::pin(async move { self.store.check(identity).await.map_err(transfer_error) })
    }

    fn upload_chunk(
        &self,
        chunk: ChunkUpload,
        cancel: CancellationToken,
    ) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            let form = chunk.form();
            let mut body = chunk.data.as_slice();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TransferError::Cancelled),
                r = self.store.receive_chunk(&form, &mut body) => {
                    r.map(|_| ()).map_err(transfer_error)
                }
            }
        })
    }

    fn merge<'a>(&'a self, identity: &'a FileIdentity) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.store
                .merge(&identity.name)
                .await
                .map(|_| ())
                .map_err(|e| TransferError::Merge(e.to_string()))
        })
    }
}
