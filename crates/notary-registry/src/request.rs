use std::path::PathBuf;

use bytes::Bytes;
use notary_types::{DocumentId, DocumentMetadata};
use serde::{Deserialize, Serialize};

/// Where the document bytes come from.
#[derive(Clone, Debug)]
pub enum DocumentSource {
    Bytes(Bytes),
    /// Streamed from disk while hashing, then read for upload.
    Path(PathBuf),
}

impl DocumentSource {
    /// File name to hand the blob store, if the source has one.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::Bytes(_) => None,
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        }
    }
}

impl From<Bytes> for DocumentSource {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for DocumentSource {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(bytes))
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

/// Whether a registration starts a lineage or extends one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RegistrationTarget {
    #[default]
    NewDocument,
    NewVersion(DocumentId),
}

/// Input to [`RegistryService::register`](crate::RegistryService::register).
#[derive(Clone, Debug)]
pub struct RegistrationRequest {
    pub source: DocumentSource,
    pub metadata: DocumentMetadata,
    pub target: RegistrationTarget,
    pub filename: Option<String>,
}

impl RegistrationRequest {
    pub fn new(source: impl Into<DocumentSource>, metadata: DocumentMetadata) -> Self {
        let source = source.into();
        Self {
            filename: source.file_name(),
            source,
            metadata,
            target: RegistrationTarget::NewDocument,
        }
    }

    /// Register the document as the next version of `id`.
    pub fn version_of(mut self, id: DocumentId) -> Self {
        self.target = RegistrationTarget::NewVersion(id);
        self
    }

    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }
}
