use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, Document, DocumentType,
    ForgivenessApplication, ForgivenessId, RentOrOwn,
};
use super::notifications::{NotificationKind, NotificationLedgerEntry, OutboundEmail};

/// Storage abstraction for discount applications and their documents.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    /// Exact-match query over the fields set on the filter.
    fn find(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    /// Removes the application together with its documents.
    fn delete(&self, id: ApplicationId) -> Result<(), RepositoryError>;
    fn attach_document(&self, document: Document) -> Result<Document, RepositoryError>;
    fn documents(&self, id: ApplicationId) -> Result<Vec<Document>, RepositoryError>;
    /// Detach every document of the application, returning what was removed.
    fn purge_documents(&self, id: ApplicationId) -> Result<Vec<Document>, RepositoryError>;
}

/// Storage abstraction for amnesty applications.
pub trait AmnestyRepository: Send + Sync {
    fn insert(
        &self,
        record: ForgivenessApplication,
    ) -> Result<ForgivenessApplication, RepositoryError>;
    fn update(&self, record: ForgivenessApplication) -> Result<(), RepositoryError>;
    fn fetch(&self, id: ForgivenessId) -> Result<Option<ForgivenessApplication>, RepositoryError>;
    fn find(&self, filter: &AmnestyFilter)
        -> Result<Vec<ForgivenessApplication>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Field filter for discount applications. Unset fields match anything; string fields
/// compare case-insensitively after trimming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFilter {
    pub first_name: Option<String>,
    pub middle_initial: Option<String>,
    pub last_name: Option<String>,
    pub zip_code: Option<String>,
    pub phone_number: Option<String>,
    pub email_address: Option<String>,
    pub street_address: Option<String>,
    pub rent_or_own: Option<RentOrOwn>,
    pub household_size: Option<u8>,
    pub has_household_benefits: Option<bool>,
    pub legal_agreement: Option<bool>,
    pub signature: Option<String>,
    pub status: Option<ApplicationStatus>,
}

impl ApplicationFilter {
    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        text_matches(&self.first_name, &record.first_name)
            && text_matches(&self.middle_initial, &record.middle_initial)
            && text_matches(&self.last_name, &record.last_name)
            && text_matches(&self.zip_code, &record.zip_code)
            && text_matches(&self.phone_number, &record.phone_number)
            && text_matches(
                &self.email_address,
                record.email_address.as_deref().unwrap_or_default(),
            )
            && text_matches(&self.street_address, &record.street_address)
            && value_matches(&self.rent_or_own, &record.rent_or_own)
            && value_matches(&self.household_size, &record.household_size)
            && value_matches(&self.has_household_benefits, &record.has_household_benefits)
            && value_matches(&self.legal_agreement, &record.legal_agreement)
            && text_matches(&self.signature, &record.signature)
            && value_matches(&self.status, &record.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmnestyFilter {
    pub first_name: Option<String>,
    pub middle_initial: Option<String>,
    pub last_name: Option<String>,
    pub zip_code: Option<String>,
    pub phone_number: Option<String>,
    pub street_address: Option<String>,
    pub rent_or_own: Option<RentOrOwn>,
    pub legal_agreement: Option<bool>,
    pub signature: Option<String>,
}

impl AmnestyFilter {
    pub fn matches(&self, record: &ForgivenessApplication) -> bool {
        text_matches(&self.first_name, &record.first_name)
            && text_matches(&self.middle_initial, &record.middle_initial)
            && text_matches(&self.last_name, &record.last_name)
            && text_matches(&self.zip_code, &record.zip_code)
            && text_matches(&self.phone_number, &record.phone_number)
            && text_matches(&self.street_address, &record.street_address)
            && value_matches(&self.rent_or_own, &record.rent_or_own)
            && value_matches(&self.legal_agreement, &record.legal_agreement)
            && text_matches(&self.signature, &record.signature)
    }
}

fn text_matches(expected: &Option<String>, actual: &str) -> bool {
    expected
        .as_deref()
        .map(|expected| expected.trim().eq_ignore_ascii_case(actual.trim()))
        .unwrap_or(true)
}

fn value_matches<T: PartialEq>(expected: &Option<T>, actual: &T) -> bool {
    expected.as_ref().map(|value| value == actual).unwrap_or(true)
}

/// Durable record of which emails each address has already received.
pub trait NotificationLedger: Send + Sync {
    /// Case-insensitive lookup by email address.
    fn fetch(&self, email_address: &str) -> Result<Option<NotificationLedgerEntry>, LedgerError>;
    /// Get-or-create the entry for the address and set one flag.
    fn record_sent(
        &self,
        email_address: &str,
        kind: NotificationKind,
    ) -> Result<NotificationLedgerEntry, LedgerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("notification ledger unavailable: {0}")]
    Unavailable(String),
}

/// Outbound mail transport.
pub trait Notifier: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifierError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("recipient rejected: {0}")]
    Rejected(String),
}

/// Blob storage for uploaded proof documents.
pub trait DocumentStorage: Send + Sync {
    fn store(
        &self,
        application_id: ApplicationId,
        doc_type: DocumentType,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError>;
    fn remove(&self, storage_key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("document storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored document '{0}' not found")]
    Missing(String),
}
