//! Upload validation and retention for proof documents.

use tracing::{info, warn};

use super::domain::ApplicationStatus;
use super::repository::{
    ApplicationFilter, ApplicationRepository, DocumentStorage, RepositoryError, StorageError,
};

const TIFF_CONTENT_TYPE: &str = "image/tiff";

/// A file received from the applicant, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("the uploaded file is empty")]
    Empty,
    #[error("the uploaded file is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("only JPEG, PNG, PDF and TIFF files are accepted")]
    UnsupportedType,
    #[error("unknown document type '{0}'")]
    UnknownDocumentType(String),
    #[error("no application is selected for this document")]
    NoApplicationSelected,
    #[error("the upload is missing its 'file' field")]
    MissingFile,
    #[error("the upload could not be read: {0}")]
    Unreadable(String),
}

/// File formats accepted as proof, identified by their leading magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedFormat {
    Jpeg,
    Png,
    Pdf,
    Tiff,
}

impl SniffedFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.starts_with(b"%PDF-") {
            Some(Self::Pdf)
        } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
            Some(Self::Tiff)
        } else {
            None
        }
    }

    pub fn content_type(self) -> String {
        match self {
            SniffedFormat::Jpeg => mime::IMAGE_JPEG.to_string(),
            SniffedFormat::Png => mime::IMAGE_PNG.to_string(),
            SniffedFormat::Pdf => mime::APPLICATION_PDF.to_string(),
            SniffedFormat::Tiff => TIFF_CONTENT_TYPE.to_string(),
        }
    }
}

/// Accepts uploads by size and sniffed content, ignoring the declared file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileValidator {
    max_bytes: u64,
}

impl FileValidator {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn validate(&self, upload: &DocumentUpload) -> Result<SniffedFormat, DocumentError> {
        let size = upload.bytes.len() as u64;
        if size == 0 {
            return Err(DocumentError::Empty);
        }
        if size > self.max_bytes {
            return Err(DocumentError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        SniffedFormat::sniff(&upload.bytes).ok_or(DocumentError::UnsupportedType)
    }
}

/// Delete the documents of every application staff have finished reviewing. Storage
/// failures are logged; the document is already detached from the application.
pub fn purge_settled_documents(
    applications: &dyn ApplicationRepository,
    storage: &dyn DocumentStorage,
) -> Result<usize, RepositoryError> {
    let settled = applications
        .find(&ApplicationFilter::default())?
        .into_iter()
        .filter(|record| !record.status.retains_documents());

    let mut purged = 0;
    for record in settled {
        for document in applications.purge_documents(record.id)? {
            purged += 1;
            if let Err(error) = storage.remove(&document.storage_key) {
                log_storage_failure(record.status, &error);
            }
        }
    }

    info!(purged, "purged documents of settled applications");
    Ok(purged)
}

fn log_storage_failure(status: ApplicationStatus, error: &StorageError) {
    warn!(status = status.label(), %error, "failed to remove stored document");
}
