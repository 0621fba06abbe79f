//! End-to-end registry behaviour over the in-memory chain and blob store,
//! plus the JSON-RPC gateway against a mock node.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use notary_codec::{encode_uint, RecordCodec};
use notary_crypto::{ContentAddresser, Signer, SigningKey};
use notary_ledger::memory::{REVERT_HASH_TAKEN, REVERT_NOT_OWNER, REVERT_UNKNOWN_ID};
use notary_ledger::{
    ContractCall, ContractQuery, InMemoryChain, InMemoryGateway, LedgerError, LedgerGateway,
    LedgerResult, MiningMode, PendingTx, Receipt, RpcLedgerGateway, TxHash,
};
use notary_registry::{
    PipelineStage, RegistrationOutcome, RegistrationRequest, RegistryError, RegistryOptions,
    RegistryService,
};
use notary_store::{BlobStore, InMemoryBlobStore, StorageError, StoreResult};
use notary_types::{Address, ContentHash, DocumentId, DocumentMetadata, StorageLocation, Version};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---- doubles ------------------------------------------------------------

#[derive(Default)]
struct Counts {
    puts: AtomicUsize,
    submits: AtomicUsize,
    calls: AtomicUsize,
}

impl Counts {
    fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
    fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct CountingStore {
    inner: Arc<InMemoryBlobStore>,
    counts: Arc<Counts>,
}

#[async_trait]
impl BlobStore for CountingStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, data: Bytes, hint: Option<&str>) -> StoreResult<StorageLocation> {
        self.counts.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(data, hint).await
    }

    async fn get(&self, location: &StorageLocation) -> StoreResult<Bytes> {
        self.inner.get(location).await
    }
}

struct FailingStore;

#[async_trait]
impl BlobStore for FailingStore {
    fn backend_name(&self) -> &'static str {
        "pinning"
    }

    async fn put(&self, _data: Bytes, _hint: Option<&str>) -> StoreResult<StorageLocation> {
        Err(StorageError::Unavailable {
            backend: "pinning",
            reason: "HTTP 401: invalid API key".into(),
        })
    }

    async fn get(&self, location: &StorageLocation) -> StoreResult<Bytes> {
        Err(StorageError::NotFound(location.clone()))
    }
}

struct CountingGateway {
    inner: Arc<dyn LedgerGateway>,
    counts: Arc<Counts>,
}

#[async_trait]
impl LedgerGateway for CountingGateway {
    fn signer_address(&self) -> Address {
        self.inner.signer_address()
    }

    async fn submit(&self, call: ContractCall) -> LedgerResult<PendingTx> {
        self.counts.submits.fetch_add(1, Ordering::SeqCst);
        self.inner.submit(call).await
    }

    async fn confirm(&self, pending: &PendingTx, timeout: Duration) -> LedgerResult<Receipt> {
        self.inner.confirm(pending, timeout).await
    }

    async fn call(&self, query: ContractQuery) -> LedgerResult<Vec<u8>> {
        self.counts.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.call(query).await
    }
}

/// Gateway whose answers are fixed up front.
struct ScriptedGateway {
    submit_error: Option<LedgerError>,
    latest: Vec<u8>,
}

#[async_trait]
impl LedgerGateway for ScriptedGateway {
    fn signer_address(&self) -> Address {
        Address::from_bytes([1; 20])
    }

    async fn submit(&self, _call: ContractCall) -> LedgerResult<PendingTx> {
        Err(self
            .submit_error
            .clone()
            .unwrap_or_else(|| LedgerError::State("no submissions scripted".into())))
    }

    async fn confirm(&self, _pending: &PendingTx, _timeout: Duration) -> LedgerResult<Receipt> {
        Err(LedgerError::State("no confirmations scripted".into()))
    }

    async fn call(&self, query: ContractQuery) -> LedgerResult<Vec<u8>> {
        match query {
            ContractQuery::LookupByHash(_) => Ok(encode_uint(1)),
            ContractQuery::GetLatest(_) | ContractQuery::GetVersion(..) => Ok(self.latest.clone()),
        }
    }
}

// ---- harness ------------------------------------------------------------

const CHAIN_ID: u64 = 1337;

struct Harness {
    chain: Arc<InMemoryChain>,
    blobs: Arc<InMemoryBlobStore>,
    counts: Arc<Counts>,
    service: RegistryService,
}

impl Harness {
    fn new(mode: MiningMode, options: RegistryOptions) -> Self {
        let chain = Arc::new(InMemoryChain::new(
            CHAIN_ID,
            Address::from_bytes([0xC0; 20]),
            mode,
        ));
        let blobs = Arc::new(InMemoryBlobStore::new());
        let counts = Arc::new(Counts::default());
        let service = Self::service_for(&chain, &blobs, &counts, owner_key(), options);
        Self {
            chain,
            blobs,
            counts,
            service,
        }
    }

    fn instant() -> Self {
        Self::new(MiningMode::Instant, RegistryOptions::default())
    }

    fn without_precheck() -> Self {
        Self::new(
            MiningMode::Instant,
            RegistryOptions {
                precheck_duplicates: false,
                ..RegistryOptions::default()
            },
        )
    }

    fn service_for(
        chain: &Arc<InMemoryChain>,
        blobs: &Arc<InMemoryBlobStore>,
        counts: &Arc<Counts>,
        key: SigningKey,
        options: RegistryOptions,
    ) -> RegistryService {
        let gateway = CountingGateway {
            inner: Arc::new(InMemoryGateway::new(Arc::clone(chain), Arc::new(key))),
            counts: Arc::clone(counts),
        };
        let store = CountingStore {
            inner: Arc::clone(blobs),
            counts: Arc::clone(counts),
        };
        RegistryService::new(Arc::new(store), Arc::new(gateway)).with_options(options)
    }

    /// A second service on the same chain signing with a different key.
    fn other_signer(&self) -> RegistryService {
        Self::service_for(
            &self.chain,
            &self.blobs,
            &self.counts,
            SigningKey::from_bytes([9; 32]),
            RegistryOptions {
                precheck_duplicates: false,
                ..RegistryOptions::default()
            },
        )
    }
}

/// SHA-256 of `b"diploma-001"`.
const DIPLOMA_SHA256: &str = "fd5162314418df8239551c210dda35e9cbd15127f5ed2d36e9d1a568bddd6e4a";

fn owner_key() -> SigningKey {
    SigningKey::from_bytes([7; 32])
}

fn metadata() -> DocumentMetadata {
    DocumentMetadata::new("University of Testing", 20240615, "Registrar")
}

fn request(bytes: &'static [u8]) -> RegistrationRequest {
    RegistrationRequest::new(bytes, metadata())
}

fn hash_of(bytes: &[u8]) -> ContentHash {
    ContentAddresser::new().hash_bytes(bytes)
}

async fn confirmed(service: &RegistryService, req: RegistrationRequest) -> notary_types::Record {
    match service.register(req).await.unwrap() {
        RegistrationOutcome::Confirmed(reg) => reg.record,
        other => panic!("expected confirmation, got {other:?}"),
    }
}

// ---- registration -------------------------------------------------------

#[tokio::test]
async fn diploma_registers_end_to_end() {
    let h = Harness::instant();
    let outcome = h.service.register(request(b"diploma-001")).await.unwrap();
    let RegistrationOutcome::Confirmed(reg) = outcome else {
        panic!("expected confirmation");
    };

    assert_eq!(h.counts.puts(), 1);
    assert_eq!(h.counts.submits(), 1);
    assert_eq!(reg.record.id, DocumentId::new(1));
    assert_eq!(reg.record.version, Version::FIRST);
    assert_eq!(reg.record.doc_hash.to_hex(), DIPLOMA_SHA256);
    assert_eq!(reg.record.owner, owner_key().address());
    assert_eq!(reg.record.metadata(), metadata());
    assert_eq!(reg.record.created_at, reg.receipt.block_time);
    assert!(reg.receipt.status.is_success());
    assert_eq!(reg.request_id.get_version_num(), 7);

    let stored = h.blobs.get(&reg.record.storage_location).await.unwrap();
    assert_eq!(&stored[..], b"diploma-001");

    let found = h.service.lookup(hash_of(b"diploma-001").as_bytes()).await.unwrap();
    assert_eq!(found, Some(reg.record));
}

#[tokio::test]
async fn registers_from_a_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("diploma.pdf");
    let body: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();
    std::fs::write(&path, &body).unwrap();

    let h = Harness::instant();
    let record = confirmed(&h.service, RegistrationRequest::new(path, metadata())).await;
    assert_eq!(record.doc_hash, hash_of(&body));
    assert_eq!(&h.blobs.get(&record.storage_location).await.unwrap()[..], &body[..]);
}

#[tokio::test]
async fn unreadable_file_is_a_read_error() {
    let h = Harness::instant();
    let req = RegistrationRequest::new(
        std::path::PathBuf::from("/nonexistent/diploma.pdf"),
        metadata(),
    );
    let err = h.service.register(req).await.unwrap_err();
    assert!(matches!(err, RegistryError::ReadError { .. }));
    assert_eq!(err.stage(), PipelineStage::Hashing);
    assert_eq!(h.counts.puts(), 0);
}

#[tokio::test]
async fn empty_document_is_rejected_before_storage() {
    let h = Harness::instant();
    let err = h.service.register(request(b"")).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::InvalidInput {
            stage: PipelineStage::Hashing,
            ..
        }
    ));
    assert_eq!(h.counts.puts(), 0);
    assert_eq!(h.counts.submits(), 0);
}

#[tokio::test]
async fn failed_upload_never_reaches_the_ledger() {
    let chain = Arc::new(InMemoryChain::new(
        CHAIN_ID,
        Address::from_bytes([0xC0; 20]),
        MiningMode::Instant,
    ));
    let counts = Arc::new(Counts::default());
    let gateway = CountingGateway {
        inner: Arc::new(InMemoryGateway::new(Arc::clone(&chain), Arc::new(owner_key()))),
        counts: Arc::clone(&counts),
    };
    let service = RegistryService::new(Arc::new(FailingStore), Arc::new(gateway));

    let err = service.register(request(b"diploma-001")).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::StorageFailed {
            backend: "pinning",
            ..
        }
    ));
    assert!(err.to_string().contains("invalid API key"));
    assert_eq!(counts.submits(), 0);
    assert_eq!(counts.calls(), 0);
    assert_eq!(chain.document_count().unwrap(), 0);
}

#[tokio::test]
async fn broadcast_failure_is_submit_failed() {
    let service = RegistryService::new(
        Arc::new(InMemoryBlobStore::new()),
        Arc::new(ScriptedGateway {
            submit_error: Some(LedgerError::Unavailable("connection refused".into())),
            latest: RecordCodec::empty_record(),
        }),
    )
    .with_options(RegistryOptions {
        precheck_duplicates: false,
        ..RegistryOptions::default()
    });

    let err = service.register(request(b"diploma-001")).await.unwrap_err();
    assert!(matches!(err, RegistryError::SubmitFailed { .. }));
    assert_eq!(err.stage(), PipelineStage::Submitting);
    assert!(err.is_before_chain());
}

#[tokio::test]
async fn unknown_broadcast_outcome_is_pending() {
    let tx_hash = TxHash::from_bytes([0x5A; 32]);
    let service = RegistryService::new(
        Arc::new(InMemoryBlobStore::new()),
        Arc::new(ScriptedGateway {
            submit_error: Some(LedgerError::BroadcastUnknown {
                tx_hash,
                reason: "ledger_sendTransaction: operation timed out".into(),
            }),
            latest: RecordCodec::empty_record(),
        }),
    )
    .with_options(RegistryOptions {
        precheck_duplicates: false,
        ..RegistryOptions::default()
    });

    let outcome = service.register(request(b"diploma-001")).await.unwrap();
    let RegistrationOutcome::ChainPending(pending) = outcome else {
        panic!("expected ChainPending, got {outcome:?}");
    };
    assert_eq!(pending.tx_hash, tx_hash);
    assert_eq!(pending.doc_hash.to_hex(), DIPLOMA_SHA256);
}

/// Answers `ledger_sendTransaction` with the submitted hash, too late for
/// the client.
fn slow_echo(req: &wiremock::Request) -> ResponseTemplate {
    let body: Value = serde_json::from_slice(&req.body).unwrap();
    ResponseTemplate::new(200)
        .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": body["params"][0]["hash"] }))
        .set_delay(Duration::from_millis(800))
}

#[tokio::test]
async fn timed_out_rpc_broadcast_is_pending_not_failed() {
    let node = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "ledger_getTransactionCount" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1, "result": 0
        })))
        .mount(&node)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "ledger_sendTransaction" })))
        .respond_with(slow_echo)
        .expect(1)
        .mount(&node)
        .await;

    let gateway = RpcLedgerGateway::new(
        node.uri().parse().unwrap(),
        CHAIN_ID,
        Address::from_bytes([0xC0; 20]),
        Arc::new(owner_key()),
        Duration::from_millis(300),
    )
    .unwrap();
    let service = RegistryService::new(Arc::new(InMemoryBlobStore::new()), Arc::new(gateway))
        .with_options(RegistryOptions {
            precheck_duplicates: false,
            ..RegistryOptions::default()
        });

    let outcome = service.register(request(b"diploma-001")).await.unwrap();
    let RegistrationOutcome::ChainPending(pending) = outcome else {
        panic!("expected ChainPending, got {outcome:?}");
    };

    let sent: Vec<Value> = node
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|req| serde_json::from_slice(&req.body).unwrap())
        .filter(|body: &Value| body["method"] == "ledger_sendTransaction")
        .collect();
    assert_eq!(sent.len(), 1);
    assert_eq!(json!(pending.tx_hash), sent[0]["params"][0]["hash"]);
}

// ---- duplicates ---------------------------------------------------------

#[tokio::test]
async fn duplicate_add_document_is_rejected_by_the_ledger() {
    let h = Harness::without_precheck();
    let original = confirmed(&h.service, request(b"diploma-001")).await;

    let err = h.service.register(request(b"diploma-001")).await.unwrap_err();
    match &err {
        RegistryError::ChainRejected { reason, .. } => assert_eq!(reason, REVERT_HASH_TAKEN),
        other => panic!("expected ChainRejected, got {other:?}"),
    }
    assert_eq!(err.stage(), PipelineStage::Confirming);
    assert_eq!(h.counts.submits(), 2);

    assert_eq!(h.chain.document_count().unwrap(), 1);
    let still = h.service.lookup(original.doc_hash.as_bytes()).await.unwrap();
    assert_eq!(still, Some(original));
}

#[tokio::test]
async fn precheck_catches_duplicates_before_submitting() {
    let h = Harness::instant();
    let original = confirmed(&h.service, request(b"diploma-001")).await;

    let err = h.service.register(request(b"diploma-001")).await.unwrap_err();
    match err {
        RegistryError::DuplicateHash { hash, existing } => {
            assert_eq!(hash, original.doc_hash);
            assert_eq!(existing, original.id);
        }
        other => panic!("expected DuplicateHash, got {other:?}"),
    }
    assert_eq!(h.counts.submits(), 1);
}

#[tokio::test]
async fn version_hash_cannot_be_reused() {
    let h = Harness::without_precheck();
    let first = confirmed(&h.service, request(b"diploma-001")).await;
    let second = confirmed(&h.service, request(b"diploma-002")).await;

    let err = h
        .service
        .register(request(b"diploma-002").version_of(first.id))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::ChainRejected { ref reason, .. } if reason == REVERT_HASH_TAKEN));
    assert_eq!(h.service.latest(second.id).await.unwrap(), Some(second));
}

// ---- versioning ---------------------------------------------------------

#[tokio::test]
async fn owner_adds_versions_in_sequence() {
    let h = Harness::instant();
    let v1 = confirmed(&h.service, request(b"diploma-001")).await;
    let v2 = confirmed(&h.service, request(b"diploma-001 corrected").version_of(v1.id)).await;
    let v3 = confirmed(&h.service, request(b"diploma-001 final").version_of(v1.id)).await;

    assert_eq!(v2.id, v1.id);
    assert_eq!(v2.version, Version::new(2));
    assert_eq!(v3.version, Version::new(3));
    assert_eq!(v3.owner, owner_key().address());
    assert!(v3.created_at > v1.created_at);

    assert_eq!(h.service.latest(v1.id).await.unwrap(), Some(v3.clone()));
    assert_eq!(h.service.version(v1.id, Version::FIRST).await.unwrap(), Some(v1.clone()));
    assert_eq!(h.service.version(v1.id, Version::new(4)).await.unwrap(), None);

    let history = h.service.history(v1.id).await.unwrap();
    assert_eq!(history, vec![v1.clone(), v2.clone(), v3.clone()]);

    // Any version's hash leads to the lineage head; resolve finds the exact one.
    assert_eq!(h.service.lookup(v1.doc_hash.as_bytes()).await.unwrap(), Some(v3));
    assert_eq!(h.service.resolve(&v2.doc_hash).await.unwrap(), Some(v2));
}

#[tokio::test]
async fn non_owner_cannot_add_a_version() {
    let h = Harness::instant();
    let v1 = confirmed(&h.service, request(b"diploma-001")).await;

    let intruder = h.other_signer();
    let err = intruder
        .register(request(b"forged diploma").version_of(v1.id))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::ChainRejected { ref reason, .. } if reason == REVERT_NOT_OWNER));
    assert_eq!(h.service.latest(v1.id).await.unwrap(), Some(v1));
}

#[tokio::test]
async fn version_of_unknown_document_is_rejected() {
    let h = Harness::instant();
    let err = h
        .service
        .register(request(b"orphan").version_of(DocumentId::new(42)))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::ChainRejected { ref reason, .. } if reason == REVERT_UNKNOWN_ID));
}

#[tokio::test]
async fn each_signer_owns_its_own_lineage() {
    let h = Harness::instant();
    let ours = confirmed(&h.service, request(b"diploma-001")).await;
    let theirs = confirmed(&h.other_signer(), request(b"transcript-001")).await;

    assert_eq!(theirs.id, DocumentId::new(2));
    assert_eq!(theirs.owner, SigningKey::from_bytes([9; 32]).address());
    assert_ne!(theirs.owner, ours.owner);
}

// ---- lookup -------------------------------------------------------------

#[tokio::test]
async fn unregistered_hash_is_not_found() {
    let h = Harness::instant();
    let found = h.service.lookup(hash_of(b"never registered").as_bytes()).await.unwrap();
    assert_eq!(found, None);
    assert_eq!(h.service.lookup_hex(&"ab".repeat(32)).await.unwrap(), None);
    assert_eq!(h.service.latest(DocumentId::new(99)).await.unwrap(), None);
    assert!(h.service.history(DocumentId::new(99)).await.unwrap().is_empty());
}

#[tokio::test]
async fn bad_length_lookup_makes_no_ledger_calls() {
    let h = Harness::instant();
    for bad in [&[0u8; 31][..], &[0u8; 33][..], &[][..]] {
        let err = h.service.lookup(bad).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput { .. }));
    }
    let err = h.service.lookup_hex("not-hex").await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidInput { .. }));
    assert_eq!(h.counts.calls(), 0);
}

#[tokio::test]
async fn garbage_from_the_ledger_is_a_malformed_record() {
    let mut truncated = RecordCodec::empty_record();
    truncated.truncate(100);
    let service = RegistryService::new(
        Arc::new(InMemoryBlobStore::new()),
        Arc::new(ScriptedGateway {
            submit_error: None,
            latest: truncated,
        }),
    );

    let err = service.lookup(&[5u8; 32]).await.unwrap_err();
    assert!(matches!(err, RegistryError::MalformedRecord { .. }));
    assert_eq!(err.stage(), PipelineStage::Resolving);
}

// ---- pending confirmation -----------------------------------------------

#[tokio::test]
async fn timeout_is_pending_and_reconciles_after_mining() {
    let h = Harness::new(
        MiningMode::Manual,
        RegistryOptions {
            confirm_timeout: Duration::from_millis(50),
            precheck_duplicates: true,
        },
    );

    let outcome = h.service.register(request(b"diploma-001")).await.unwrap();
    let RegistrationOutcome::ChainPending(pending) = outcome else {
        panic!("expected ChainPending, got {outcome:?}");
    };
    assert_eq!(pending.doc_hash, hash_of(b"diploma-001"));
    assert_eq!(h.counts.submits(), 1);
    assert_eq!(h.chain.pending_count().unwrap(), 1);

    assert_eq!(h.service.reconcile(&pending).await.unwrap(), None);
    assert_eq!(h.service.lookup(pending.doc_hash.as_bytes()).await.unwrap(), None);

    h.chain.mine_block().unwrap();

    let record = h.service.reconcile(&pending).await.unwrap().expect("landed");
    assert_eq!(record.version, Version::FIRST);
    assert_eq!(record.storage_location, pending.storage_location);
    assert_eq!(
        h.service.lookup(pending.doc_hash.as_bytes()).await.unwrap(),
        Some(record)
    );
    assert_eq!(h.counts.submits(), 1);
}

// ---- verification -------------------------------------------------------

#[tokio::test]
async fn verify_detects_tampered_blobs() {
    let h = Harness::instant();
    let record = confirmed(&h.service, request(b"diploma-001")).await;

    let report = h.service.verify(record.id).await.unwrap().unwrap();
    assert!(report.is_intact());

    h.blobs
        .tamper(&record.storage_location, Bytes::from_static(b"diploma-666"))
        .unwrap();
    let report = h.service.verify(record.id).await.unwrap().unwrap();
    assert!(!report.is_intact());
    assert_eq!(report.actual, hash_of(b"diploma-666"));

    assert!(h.service.verify(DocumentId::new(7)).await.unwrap().is_none());
}

// ---- concurrency --------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_get_distinct_ids() {
    let h = Harness::instant();
    let service = Arc::new(h.service);

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let body = format!("diploma-{i:03}").into_bytes();
            match service
                .register(RegistrationRequest::new(body, metadata()))
                .await
                .unwrap()
            {
                RegistrationOutcome::Confirmed(reg) => reg.record.id.get(),
                other => panic!("expected confirmation, got {other:?}"),
            }
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort_unstable();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    assert_eq!(h.chain.document_count().unwrap(), 8);
}
