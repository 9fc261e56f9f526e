//! The seam between a session and the server that stores its chunks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ferryload_protocol::{CheckOutcome, ChunkForm, FileIdentity};
use tokio_util::sync::CancellationToken;

use crate::TransferError;

/// Boxed future returned by [`UploadBackend`] methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransferError>> + Send + 'a>>;

/// One chunk on its way to the server.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub name: String,
    pub hash: String,
    pub index: u64,
    pub data: Vec<u8>,
}

impl ChunkUpload {
    /// Payload length, sent as the `size` field.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Text fields of the chunk form.
    pub fn form(&self) -> ChunkForm {
        ChunkForm {
            hash: self.hash.clone(),
            index: self.index,
            size: self.size(),
            filename: self.name.clone(),
        }
    }
}

/// Server operations a transfer session depends on.
///
/// Network and transport failures should surface as
/// [`TransferError::Network`] so the session treats them as resumable.
pub trait UploadBackend: Send + Sync {
    /// Asks what the server holds for `identity`.
    fn check<'a>(&'a self, identity: &'a FileIdentity) -> BackendFuture<'a, CheckOutcome>;

    /// Sends one chunk. Implementations should abandon the request when
    /// `cancel` fires.
    fn upload_chunk(&self, chunk: ChunkUpload, cancel: CancellationToken)
    -> BackendFuture<'_, ()>;

    /// Asks the server to assemble the uploaded chunks into the final file.
    fn merge<'a>(&'a self, identity: &'a FileIdentity) -> BackendFuture<'a, ()>;
}

impl<T: UploadBackend + ?Sized> UploadBackend for Arc<T> {
    fn check<'a>(&'a self, identity: &'a FileIdentity) -> BackendFuture<'a, CheckOutcome> {
        (**self).check(identity)
    }

    fn upload_chunk(
        &self,
        chunk: ChunkUpload,
        cancel: CancellationToken,
    ) -> BackendFuture<'_, ()> {
        (**self).upload_chunk(chunk, cancel)
    }

    fn merge<'a>(&'a self, identity: &'a FileIdentity) -> BackendFuture<'a, ()> {
        (**self).merge(identity)
    }
}
