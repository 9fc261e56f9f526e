//! `UploadBackend` over HTTP.

use std::time::Duration;

use ferryload_protocol::constants::{
    CHECK_PATH, CHUNK_PATH, FIELD_FILE, MERGE_PATH, MERGE_QUERY_FILENAME,
};
use ferryload_protocol::{CheckOutcome, CheckResponse, FileIdentity, MergeResponse};
use ferryload_transfer::{BackendFuture, ChunkUpload, TransferError, UploadBackend};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::multipart::{Form, Part};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors building an [`HttpBackend`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid server URL: {0}")]
    InvalidUrl(String),
}

/// Upload backend talking to an HTTP server.
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Creates a backend for the server at `base_url`
    /// (e.g. `http://host:3000`).
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Self::with_client(http, base_url)
    }

    /// Uses a preconfigured `reqwest` client.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check_inner(&self, identity: &FileIdentity) -> Result<CheckOutcome, TransferError> {
        let url = check_url(&self.base_url, identity);
        let resp = self.http.get(&url).send().await.map_err(network)?;
        let body = success_body(resp).await?;
        let response: CheckResponse = serde_json::from_slice(&body)
            .map_err(|e| TransferError::Network(format!("malformed check response: {e}")))?;
        let outcome = CheckOutcome::try_from(response)?;
        debug!(file = %identity.name, ?outcome, "check answered");
        Ok(outcome)
    }

    async fn upload_inner(&self, chunk: ChunkUpload) -> Result<(), TransferError> {
        let mut form = Form::new();
        for (field, value) in chunk.form().fields() {
            form = form.text(field, value);
        }
        let file_name = chunk.name.clone();
        form = form.part(FIELD_FILE, Part::bytes(chunk.data).file_name(file_name));

        let url = format!("{}{CHUNK_PATH}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(network)?;
        success_body(resp).await?;
        Ok(())
    }

    async fn merge_inner(&self, identity: &FileIdentity) -> Result<(), TransferError> {
        let url = format!("{}{MERGE_PATH}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .query(&[(MERGE_QUERY_FILENAME, identity.name.as_str())])
            .send()
            .await
            .map_err(network)?;
        let body = success_body(resp).await?;
        match serde_json::from_slice::<MergeResponse>(&body) {
            Ok(r) => debug!(file = %identity.name, message = %r.message, "merge answered"),
            Err(e) => warn!(file = %identity.name, error = %e, "unexpected merge response body"),
        }
        Ok(())
    }
}

impl UploadBackend for HttpBackend {
    fn check<'a>(&'a self, identity: &'a FileIdentity) -> BackendFuture<'a, CheckOutcome> {
        Box::pin(self.check_inner(identity))
    }

    fn upload_chunk(
        &self,
        chunk: ChunkUpload,
        cancel: CancellationToken,
    ) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TransferError::Cancelled),
                r = self.upload_inner(chunk) => r,
            }
        })
    }

    fn merge<'a>(&'a self, identity: &'a FileIdentity) -> BackendFuture<'a, ()> {
        Box::pin(self.merge_inner(identity))
    }
}

/// Builds the check URL with every path segment percent-encoded.
fn check_url(base_url: &str, identity: &FileIdentity) -> String {
    let name = utf8_percent_encode(&identity.name, NON_ALPHANUMERIC);
    let hash = utf8_percent_encode(&identity.hash, NON_ALPHANUMERIC);
    format!("{base_url}{CHECK_PATH}/{name}/{hash}/{}", identity.total_size)
}

fn network(e: reqwest::Error) -> TransferError {
    TransferError::Network(e.to_string())
}

/// Returns the body of a 2xx response; anything else is a network error.
async fn success_body(resp: reqwest::Response) -> Result<Vec<u8>, TransferError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(TransferError::Network(format!(
            "server returned {}: {body}",
            status.as_u16()
        )));
    }
    Ok(resp.bytes().await.map_err(network)?.to_vec())
}
