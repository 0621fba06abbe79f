//! Local IPFS daemon backend, via the daemon's HTTP API.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/api/v0/add` | multipart upload, returns `Hash` |
//! | POST   | `/api/v0/cat?arg={cid}` | fetch content |

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use notary_types::StorageLocation;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{StorageError, StoreResult};
use crate::traits::BlobStore;

const BACKEND: &str = "local-daemon";

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

/// Blob store backed by a locally running IPFS daemon.
#[derive(Debug, Clone)]
pub struct LocalDaemonStore {
    http: reqwest::Client,
    api_url: Url,
}

impl LocalDaemonStore {
    pub fn new(api_url: Url, timeout: Duration) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Config(format!("http client: {e}")))?;
        Ok(Self { http, api_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v0/{}", self.api_url.as_str().trim_end_matches('/'), path)
    }
}

#[async_trait]
impl BlobStore for LocalDaemonStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn put(&self, data: Bytes, filename_hint: Option<&str>) -> StoreResult<StorageLocation> {
        let size = data.len();
        let mut part = Part::bytes(data.to_vec());
        if let Some(name) = filename_hint {
            part = part.file_name(name.to_string());
        }
        let url = self.endpoint("add");
        debug!(%url, size, "adding to local daemon");
        let resp = self
            .http
            .post(&url)
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::unavailable(
                BACKEND,
                format!("add rejected with status {status}: {body}"),
            ));
        }

        let added: AddResponse = resp.json().await.map_err(|e| StorageError::InvalidResponse {
            backend: BACKEND,
            reason: e.to_string(),
        })?;
        let location =
            StorageLocation::new(added.hash).map_err(|e| StorageError::InvalidResponse {
                backend: BACKEND,
                reason: e.to_string(),
            })?;
        info!(%location, size, "added document to local daemon");
        Ok(location)
    }

    async fn get(&self, location: &StorageLocation) -> StoreResult<Bytes> {
        let resp = self
            .http
            .post(self.endpoint("cat"))
            .query(&[("arg", location.as_str())])
            .send()
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(location.clone()));
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::unavailable(
                BACKEND,
                format!("cat failed with status {status}: {body}"),
            ));
        }
        resp.bytes()
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))
    }
}
