use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use notary_codec::{decode_uint, RecordCodec};
use notary_crypto::{AddresserError, ContentAddresser};
use notary_ledger::{ContractCall, ContractQuery, LedgerError, LedgerGateway};
use notary_store::BlobStore;
use notary_types::{ContentHash, DocumentId, Record, Version};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{PipelineStage, RegistryError, RegistryResult};
use crate::outcome::{PendingRegistration, Registration, RegistrationOutcome, Verification};
use crate::request::{DocumentSource, RegistrationRequest, RegistrationTarget};

/// Default wait for a transaction to be mined.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(120);

/// Tunables for [`RegistryService`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryOptions {
    pub confirm_timeout: Duration,
    /// Query `lookupByHash` before submitting so known duplicates fail
    /// without spending gas. The ledger still has the final word.
    pub precheck_duplicates: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            precheck_duplicates: true,
        }
    }
}

/// Records, versions and resolves notarized documents.
///
/// A registration runs hashing, storing, submitting, confirming and
/// resolving strictly in order. Storage failures abort before the ledger is
/// touched. Registrations are independent and may run concurrently; the
/// gateway serializes the submissions of one signer.
pub struct RegistryService {
    addresser: ContentAddresser,
    store: Arc<dyn BlobStore>,
    ledger: Arc<dyn LedgerGateway>,
    options: RegistryOptions,
}

impl RegistryService {
    pub fn new(store: Arc<dyn BlobStore>, ledger: Arc<dyn LedgerGateway>) -> Self {
        Self {
            addresser: ContentAddresser::new(),
            store,
            ledger,
            options: RegistryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RegistryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerGateway> {
        &self.ledger
    }

    /// Notarize a document.
    ///
    /// Returns [`RegistrationOutcome::ChainPending`] when the transaction was
    /// broadcast but not mined within the confirm timeout, or when the
    /// broadcast may have reached the ledger without a usable answer. Never
    /// resubmit a pending registration; reconcile it by hash.
    pub async fn register(&self, request: RegistrationRequest) -> RegistryResult<RegistrationOutcome> {
        let request_id = Uuid::now_v7();
        let span = info_span!("register", %request_id);
        self.run_registration(request_id, request)
            .instrument(span)
            .await
    }

    async fn run_registration(
        &self,
        request_id: Uuid,
        request: RegistrationRequest,
    ) -> RegistryResult<RegistrationOutcome> {
        let RegistrationRequest {
            source,
            metadata,
            target,
            filename,
        } = request;

        let (doc_hash, data) = self.hash_source(source).await?;
        info!(hash = %doc_hash, size = data.len(), "hashed document");

        let backend = self.store.backend_name();
        let storage_location = self
            .store
            .put(data, filename.as_deref())
            .await
            .map_err(|source| RegistryError::StorageFailed { backend, source })?;
        info!(location = %storage_location, backend, "stored document");

        if self.options.precheck_duplicates {
            self.precheck(&doc_hash).await?;
        }
        let call = match target {
            RegistrationTarget::NewDocument => ContractCall::AddDocument {
                doc_hash,
                storage_location: storage_location.clone(),
                metadata,
            },
            RegistrationTarget::NewVersion(id) => ContractCall::AddVersion {
                id,
                doc_hash,
                storage_location: storage_location.clone(),
                metadata,
            },
        };
        let pending = match self.ledger.submit(call).await {
            Ok(pending) => pending,
            Err(LedgerError::BroadcastUnknown { tx_hash, reason }) => {
                warn!(tx = %tx_hash, %reason, "broadcast outcome unknown");
                return Ok(RegistrationOutcome::ChainPending(PendingRegistration {
                    request_id,
                    tx_hash,
                    doc_hash,
                    storage_location,
                    target,
                    submitted_at: Utc::now(),
                }));
            }
            Err(source) => return Err(RegistryError::SubmitFailed { source }),
        };
        let submitted_at = Utc::now();
        info!(tx = %pending.tx_hash, function = %pending.function, "submitted transaction");

        let receipt = match self.ledger.confirm(&pending, self.options.confirm_timeout).await {
            Ok(receipt) => receipt,
            Err(LedgerError::TxFailed { tx_hash, reason }) => {
                warn!(tx = %tx_hash, %reason, "transaction reverted");
                return Err(RegistryError::ChainRejected { tx_hash, reason });
            }
            Err(LedgerError::TxTimeout { tx_hash, waited }) => {
                warn!(tx = %tx_hash, ?waited, "transaction not confirmed in time");
                return Ok(RegistrationOutcome::ChainPending(PendingRegistration {
                    request_id,
                    tx_hash,
                    doc_hash,
                    storage_location,
                    target,
                    submitted_at,
                }));
            }
            Err(e) => return Err(RegistryError::ledger(PipelineStage::Confirming, e)),
        };
        debug!(block = receipt.block_number, gas_used = receipt.gas_used, "transaction mined");

        let record = self.resolve(&doc_hash).await?.ok_or_else(|| {
            RegistryError::ledger(
                PipelineStage::Resolving,
                LedgerError::State(format!("confirmed hash {doc_hash} is not mapped")),
            )
        })?;
        info!(id = %record.id, version = %record.version, owner = %record.owner, "registered document");
        Ok(RegistrationOutcome::Confirmed(Registration {
            request_id,
            record,
            receipt,
        }))
    }

    /// Latest record of the lineage `hash` belongs to.
    ///
    /// `hash` must be exactly 32 bytes; anything else is rejected before the
    /// ledger is queried.
    pub async fn lookup(&self, hash: &[u8]) -> RegistryResult<Option<Record>> {
        let hash = ContentHash::from_slice(hash)
            .map_err(|e| RegistryError::invalid(PipelineStage::Resolving, e.to_string()))?;
        self.lookup_hash(&hash).await
    }

    /// [`lookup`](Self::lookup) for a 64-character hex hash.
    pub async fn lookup_hex(&self, hex: &str) -> RegistryResult<Option<Record>> {
        let hash = ContentHash::from_hex(hex)
            .map_err(|e| RegistryError::invalid(PipelineStage::Resolving, e.to_string()))?;
        self.lookup_hash(&hash).await
    }

    pub async fn lookup_hash(&self, hash: &ContentHash) -> RegistryResult<Option<Record>> {
        match self.lookup_id(hash).await? {
            Some(id) => self.latest(id).await,
            None => Ok(None),
        }
    }

    /// Highest version of `id`, or `None` if the id is unassigned.
    pub async fn latest(&self, id: DocumentId) -> RegistryResult<Option<Record>> {
        if id.is_none() {
            return Ok(None);
        }
        self.fetch_record(ContractQuery::GetLatest(id)).await
    }

    pub async fn version(&self, id: DocumentId, version: Version) -> RegistryResult<Option<Record>> {
        if id.is_none() || version.get() == 0 {
            return Ok(None);
        }
        self.fetch_record(ContractQuery::GetVersion(id, version)).await
    }

    /// Every version of `id`, oldest first. Empty for an unassigned id.
    pub async fn history(&self, id: DocumentId) -> RegistryResult<Vec<Record>> {
        let Some(latest) = self.latest(id).await? else {
            return Ok(Vec::new());
        };
        let mut records = Vec::with_capacity(latest.version.get() as usize);
        for version in latest.version.up_to() {
            if version == latest.version {
                break;
            }
            let record = self.version(id, version).await?.ok_or_else(|| {
                RegistryError::ledger(
                    PipelineStage::Resolving,
                    LedgerError::State(format!("document {id} is missing {version}")),
                )
            })?;
            records.push(record);
        }
        records.push(latest);
        Ok(records)
    }

    /// The exact version whose content hash is `hash`, if it is on the ledger.
    pub async fn resolve(&self, hash: &ContentHash) -> RegistryResult<Option<Record>> {
        let Some(id) = self.lookup_id(hash).await? else {
            return Ok(None);
        };
        let Some(latest) = self.latest(id).await? else {
            return Ok(None);
        };
        if latest.doc_hash == *hash {
            return Ok(Some(latest));
        }
        for version in (1..latest.version.get()).rev().map(Version::new) {
            if let Some(record) = self.version(id, version).await? {
                if record.doc_hash == *hash {
                    return Ok(Some(record));
                }
            }
        }
        Ok(None)
    }

    /// Check whether a pending registration has landed.
    pub async fn reconcile(&self, pending: &PendingRegistration) -> RegistryResult<Option<Record>> {
        let found = self.resolve(&pending.doc_hash).await?;
        match &found {
            Some(record) => info!(
                request_id = %pending.request_id,
                tx = %pending.tx_hash,
                id = %record.id,
                version = %record.version,
                "pending registration landed"
            ),
            None => debug!(tx = %pending.tx_hash, "registration still pending"),
        }
        Ok(found)
    }

    /// Re-hash the stored blob of the latest version of `id`.
    pub async fn verify(&self, id: DocumentId) -> RegistryResult<Option<Verification>> {
        let Some(record) = self.latest(id).await? else {
            return Ok(None);
        };
        let backend = self.store.backend_name();
        let data = self
            .store
            .get(&record.storage_location)
            .await
            .map_err(|source| RegistryError::StorageFailed { backend, source })?;
        let actual = self.addresser.hash_bytes(&data);
        let verification = Verification { record, actual };
        if !verification.is_intact() {
            warn!(
                id = %id,
                expected = %verification.record.doc_hash,
                %actual,
                "stored document does not match its ledger hash"
            );
        }
        Ok(Some(verification))
    }

    async fn hash_source(&self, source: DocumentSource) -> RegistryResult<(ContentHash, Bytes)> {
        match source {
            DocumentSource::Bytes(data) => {
                if data.is_empty() {
                    return Err(RegistryError::invalid(PipelineStage::Hashing, "document is empty"));
                }
                Ok((self.addresser.hash_bytes(&data), data))
            }
            DocumentSource::Path(path) => {
                let (hash, len) = stream_hash(self.addresser, path.clone()).await?;
                if len == 0 {
                    return Err(RegistryError::invalid(
                        PipelineStage::Hashing,
                        format!("{} is empty", path.display()),
                    ));
                }
                let data = tokio::fs::read(&path)
                    .await
                    .map_err(|source| RegistryError::ReadError { source })?;
                if data.len() as u64 != len {
                    return Err(RegistryError::ReadError {
                        source: io::Error::other(format!(
                            "{} changed while it was being read",
                            path.display()
                        )),
                    });
                }
                Ok((hash, Bytes::from(data)))
            }
        }
    }

    async fn precheck(&self, hash: &ContentHash) -> RegistryResult<()> {
        match self.lookup_id(hash).await {
            Ok(Some(existing)) => {
                warn!(%hash, %existing, "document already registered");
                Err(RegistryError::DuplicateHash {
                    hash: *hash,
                    existing,
                })
            }
            Ok(None) => Ok(()),
            Err(e) => {
                warn!(error = %e, "duplicate pre-check failed, deferring to the ledger");
                Ok(())
            }
        }
    }

    async fn lookup_id(&self, hash: &ContentHash) -> RegistryResult<Option<DocumentId>> {
        let raw = self
            .ledger
            .call(ContractQuery::LookupByHash(*hash))
            .await
            .map_err(|e| RegistryError::ledger(PipelineStage::Resolving, e))?;
        Ok(DocumentId::new(decode_uint(&raw)?).assigned())
    }

    async fn fetch_record(&self, query: ContractQuery) -> RegistryResult<Option<Record>> {
        let raw = self
            .ledger
            .call(query)
            .await
            .map_err(|e| RegistryError::ledger(PipelineStage::Resolving, e))?;
        let record = RecordCodec::decode_record(&raw)?;
        if record.is_empty() {
            return Ok(None);
        }
        let consistent = match query {
            ContractQuery::GetLatest(id) => record.id == id,
            ContractQuery::GetVersion(id, version) => record.id == id && record.version == version,
            ContractQuery::LookupByHash(_) => true,
        };
        if !consistent {
            return Err(RegistryError::ledger(
                PipelineStage::Resolving,
                LedgerError::InvalidResponse(format!(
                    "{:?} answered with document {} {}",
                    query, record.id, record.version
                )),
            ));
        }
        Ok(Some(record))
    }
}

/// Hash a file in fixed chunks on the blocking pool, returning the digest
/// and the number of bytes read.
async fn stream_hash(addresser: ContentAddresser, path: PathBuf) -> RegistryResult<(ContentHash, u64)> {
    let joined = tokio::task::spawn_blocking(move || -> io::Result<(ContentHash, u64)> {
        let mut reader = CountingReader {
            inner: File::open(&path)?,
            count: 0,
        };
        let hash = addresser
            .hash_reader(&mut reader)
            .map_err(|AddresserError::Read(e)| e)?;
        Ok((hash, reader.count))
    })
    .await
    .map_err(|e| RegistryError::ReadError {
        source: io::Error::other(e),
    })?;
    joined.map_err(|source| RegistryError::ReadError { source })
}

struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

impl std::fmt::Debug for RegistryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryService")
            .field("store", &self.store.backend_name())
            .field("signer", &self.ledger.signer_address())
            .field("options", &self.options)
            .finish()
    }
}
