//! Pinata-compatible pinning service backend.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `{api}/pinning/pinFileToIPFS` | multipart upload, returns `IpfsHash` |
//! | GET    | `{gateway}/ipfs/{cid}` | fetch pinned content |

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use notary_types::{StorageLocation, DIGEST_ALGORITHM};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::PinningCredentials;
use crate::error::{StorageError, StoreResult};
use crate::traits::BlobStore;

const BACKEND: &str = "pinning";
const DEFAULT_FILENAME: &str = "document";

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Blob store backed by a remote pinning service.
#[derive(Debug, Clone)]
pub struct PinningServiceStore {
    http: reqwest::Client,
    api_url: Url,
    gateway_url: Url,
    credentials: PinningCredentials,
}

impl PinningServiceStore {
    /// Build a client for the service at `api_url`, fetching content back
    /// through `gateway_url`.
    pub fn new(
        api_url: Url,
        gateway_url: Url,
        credentials: PinningCredentials,
        timeout: Duration,
    ) -> StoreResult<Self> {
        if credentials.api_key.is_empty() || credentials.api_secret.is_empty() {
            return Err(StorageError::Config(
                "pinning service key and secret must both be set".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_url,
            gateway_url,
            credentials,
        })
    }

    fn endpoint(base: &Url, path: &str) -> String {
        format!("{}/{}", base.as_str().trim_end_matches('/'), path)
    }
}

#[async_trait]
impl BlobStore for PinningServiceStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn put(&self, data: Bytes, filename_hint: Option<&str>) -> StoreResult<StorageLocation> {
        let filename = filename_hint.unwrap_or(DEFAULT_FILENAME).to_string();
        let size = data.len();
        let metadata = serde_json::json!({
            "name": filename,
            "keyvalues": { "digestAlgorithm": DIGEST_ALGORITHM.tag() },
        });
        let form = Form::new()
            .part("file", Part::bytes(data.to_vec()).file_name(filename.clone()))
            .text("pinataMetadata", metadata.to_string());

        let url = Self::endpoint(&self.api_url, "pinning/pinFileToIPFS");
        debug!(%url, size, "uploading to pinning service");
        let resp = self
            .http
            .post(&url)
            .header("pinata_api_key", &self.credentials.api_key)
            .header("pinata_secret_api_key", &self.credentials.api_secret)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::unavailable(
                BACKEND,
                format!("upload rejected with status {status}: {body}"),
            ));
        }

        let pinned: PinResponse =
            resp.json()
                .await
                .map_err(|e| StorageError::InvalidResponse {
                    backend: BACKEND,
                    reason: e.to_string(),
                })?;
        let location =
            StorageLocation::new(pinned.ipfs_hash).map_err(|e| StorageError::InvalidResponse {
                backend: BACKEND,
                reason: e.to_string(),
            })?;
        info!(%location, size, file = %filename, "pinned document");
        Ok(location)
    }

    async fn get(&self, location: &StorageLocation) -> StoreResult<Bytes> {
        let url = Self::endpoint(&self.gateway_url, &format!("ipfs/{location}"));
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(location.clone()));
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(StorageError::unavailable(
                BACKEND,
                format!("gateway fetch failed with status {status}"),
            ));
        }
        resp.bytes()
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> PinningCredentials {
        PinningCredentials {
            api_key: "key-123".into(),
            api_secret: "secret-456".into(),
        }
    }

    fn store(server: &MockServer) -> PinningServiceStore {
        let url: Url = server.uri().parse().unwrap();
        PinningServiceStore::new(url.clone(), url, credentials(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn put_sends_credentials_and_returns_cid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinFileToIPFS"))
            .and(header("pinata_api_key", "key-123"))
            .and(header("pinata_secret_api_key", "secret-456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "IpfsHash": "QmPinnedDiploma",
                "PinSize": 11,
                "Timestamp": "2024-06-15T00:00:00.000Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let loc = store(&server)
            .put(Bytes::from_static(b"diploma-001"), Some("diploma.pdf"))
            .await
            .unwrap();
        assert_eq!(loc.as_str(), "QmPinnedDiploma");
    }

    #[tokio::test]
    async fn auth_failure_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinFileToIPFS"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api keys"))
            .mount(&server)
            .await;

        let err = store(&server)
            .put(Bytes::from_static(b"x"), None)
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn missing_cid_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinFileToIPFS"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let err = store(&server)
            .put(Bytes::from_static(b"x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let url: Url = "http://127.0.0.1:9".parse().unwrap();
        let store =
            PinningServiceStore::new(url.clone(), url, credentials(), Duration::from_secs(2))
                .unwrap();
        let err = store.put(Bytes::from_static(b"x"), None).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn get_reads_through_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipfs/QmPinnedDiploma"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"diploma-001".to_vec()))
            .mount(&server)
            .await;

        let loc = StorageLocation::new("QmPinnedDiploma").unwrap();
        let data = store(&server).get(&loc).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"diploma-001"));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let loc = StorageLocation::new("QmMissing").unwrap();
        let err = store(&server).get(&loc).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn empty_credentials_are_rejected() {
        let url: Url = "https://api.pinata.cloud".parse().unwrap();
        let err = PinningServiceStore::new(
            url.clone(),
            url,
            PinningCredentials {
                api_key: String::new(),
                api_secret: "s".into(),
            },
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }
}
