// vigil-store/src/lib.rs
// ============================================================
// vigil-store – document-store REST client for Vigil
// Writes one typed-field document per processed frame and reads
// the newest one back for the viewer.
// ------------------------------------------------------------
// Public API
//   * CaptureRecord – what one capture looks like on the wire
//   * StoreClient::publish(&record)
//   * StoreClient::fetch_latest()
// ============================================================

//! Vigil – store layer
//!
//! The remote store is treated as a generic key/typed-field document sink
//! over HTTP. Writes are fire-and-forget from the pipeline's point of
//! view: a failed publish is reported to the caller, logged there, and
//! never retried.

use std::time::Duration;

use log::debug;
use thiserror::Error;

mod document;

pub use document::{newest_document, CaptureRecord};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed store response: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub project_id: String,
    /// Collection the capture documents land in.
    pub collection: String,
    /// Query-side API key, appended as the `key` parameter when set.
    pub api_key: Option<String>,
    /// Endpoint root; overridable so tests can point at a local server.
    pub base_url: String,
    pub timeout: Duration,
}

impl StoreConfig {
    pub fn new(project_id: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            collection: collection.into(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Blocking REST client for the document store.
pub struct StoreClient {
    http: reqwest::blocking::Client,
    documents_url: String,
    api_key: Option<String>,
}

impl StoreClient {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let documents_url = format!(
            "{}/v1/projects/{}/databases/(default)/documents/{}",
            config.base_url.trim_end_matches('/'),
            config.project_id,
            config.collection,
        );
        Ok(Self {
            http,
            documents_url,
            api_key: config.api_key,
        })
    }

    /// Write one capture document. Non-2xx responses surface as
    /// [`StoreError::Status`]; the caller decides that a failed publish is
    /// non-fatal.
    pub fn publish(&self, record: &CaptureRecord) -> Result<()> {
        let response = self
            .http
            .post(&self.documents_url)
            .json(&record.to_document())
            .send()?;
        let status = response.status();
        debug!("store write: {status}");
        if !status.is_success() {
            return Err(StoreError::Status(status));
        }
        Ok(())
    }

    /// Read the most recent capture document, newest timestamp first.
    /// Returns `Ok(None)` when the collection is empty.
    pub fn fetch_latest(&self) -> Result<Option<CaptureRecord>> {
        let mut request = self.http.get(&self.documents_url);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status));
        }

        let body: serde_json::Value = response.json()?;
        let documents = match body.get("documents").and_then(|d| d.as_array()) {
            Some(docs) if !docs.is_empty() => docs,
            _ => return Ok(None),
        };

        let newest = newest_document(documents)
            .ok_or_else(|| StoreError::Malformed("no decodable documents".into()))?;
        CaptureRecord::from_document(newest)
            .map(Some)
            .ok_or_else(|| StoreError::Malformed("document without fields".into()))
    }
}
