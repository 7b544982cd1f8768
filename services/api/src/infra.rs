use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use water_pathways::config::ProgramConfig;
use water_pathways::workflows::intake::{
    AmnestyFilter, AmnestyRepository, ApplicantSession, ApplicationFilter, ApplicationId,
    ApplicationRecord, ApplicationRepository, Document, DocumentStorage, DocumentType,
    ForgivenessApplication, ForgivenessId, IntakeCollaborators, IntakeService, LedgerError,
    NotificationKind, NotificationLedger, NotificationLedgerEntry, Notifier, NotifierError,
    OutboundEmail, PayPeriod, RepositoryError, SessionError, SessionId, SessionStore,
    StorageError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory collaborators wired into one [`IntakeService`], with handles kept for the demo.
#[derive(Clone, Default)]
pub(crate) struct InMemoryIntake {
    pub(crate) sessions: InMemorySessionStore,
    pub(crate) applications: InMemoryApplicationRepository,
    pub(crate) amnesty: InMemoryAmnestyRepository,
    pub(crate) ledger: InMemoryNotificationLedger,
    pub(crate) notifier: LoggingNotifier,
    pub(crate) storage: InMemoryDocumentStorage,
}

impl InMemoryIntake {
    pub(crate) fn service(&self, config: &ProgramConfig) -> IntakeService {
        IntakeService::new(
            IntakeCollaborators {
                sessions: Arc::new(self.sessions.clone()),
                applications: Arc::new(self.applications.clone()),
                amnesty: Arc::new(self.amnesty.clone()),
                ledger: Arc::new(self.ledger.clone()),
                notifier: Arc::new(self.notifier.clone()),
                storage: Arc::new(self.storage.clone()),
            },
            config,
        )
    }
}

/// Wizard sessions untouched for this long are dropped on the next save.
const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub(crate) struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, (ApplicantSession, Instant)>>>,
    idle_timeout: Duration,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(SESSION_IDLE_TIMEOUT)
    }
}

impl InMemorySessionStore {
    pub(crate) fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            idle_timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.sessions.lock().expect("session mutex poisoned").len()
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<ApplicantSession>, SessionError> {
        let guard = self.sessions.lock().expect("session mutex poisoned");
        Ok(guard
            .get(id)
            .filter(|(_, touched)| touched.elapsed() < self.idle_timeout)
            .map(|(session, _)| session.clone()))
    }

    fn save(&self, id: &SessionId, session: &ApplicantSession) -> Result<(), SessionError> {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        let before = guard.len();
        guard.retain(|_, (_, touched)| touched.elapsed() < self.idle_timeout);
        let evicted = before - guard.len();
        if evicted > 0 {
            debug!(evicted, "dropped idle wizard sessions");
        }
        guard.insert(*id, (session.clone(), Instant::now()));
        Ok(())
    }

    fn clear(&self, id: &SessionId) -> Result<(), SessionError> {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        guard.remove(id);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
    documents: Arc<Mutex<Vec<Document>>>,
}

impl InMemoryApplicationRepository {
    pub(crate) fn records(&self) -> Vec<ApplicationRecord> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<_> = guard.values().cloned().collect();
        records.sort_by_key(|record| record.id);
        records
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id, record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            guard.insert(record.id, record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn find(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(self
            .records()
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }

    fn delete(&self, id: ApplicationId) -> Result<(), RepositoryError> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .remove(&id)
            .ok_or(RepositoryError::NotFound)?;
        self.documents
            .lock()
            .expect("document mutex poisoned")
            .retain(|document| document.application_id != id);
        Ok(())
    }

    fn attach_document(&self, document: Document) -> Result<Document, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        if !guard.contains_key(&document.application_id) {
            return Err(RepositoryError::NotFound);
        }
        self.documents
            .lock()
            .expect("document mutex poisoned")
            .push(document.clone());
        Ok(document)
    }

    fn documents(&self, id: ApplicationId) -> Result<Vec<Document>, RepositoryError> {
        let guard = self.documents.lock().expect("document mutex poisoned");
        Ok(guard
            .iter()
            .filter(|document| document.application_id == id)
            .cloned()
            .collect())
    }

    fn purge_documents(&self, id: ApplicationId) -> Result<Vec<Document>, RepositoryError> {
        let mut guard = self.documents.lock().expect("document mutex poisoned");
        let (purged, kept): (Vec<Document>, Vec<Document>) = guard
            .drain(..)
            .partition(|document| document.application_id == id);
        *guard = kept;
        Ok(purged)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAmnestyRepository {
    records: Arc<Mutex<HashMap<ForgivenessId, ForgivenessApplication>>>,
}

impl InMemoryAmnestyRepository {
    pub(crate) fn records(&self) -> Vec<ForgivenessApplication> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<_> = guard.values().cloned().collect();
        records.sort_by_key(|record| record.id);
        records
    }
}

impl AmnestyRepository for InMemoryAmnestyRepository {
    fn insert(
        &self,
        record: ForgivenessApplication,
    ) -> Result<ForgivenessApplication, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id, record.clone());
        Ok(record)
    }

    fn update(&self, record: ForgivenessApplication) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            guard.insert(record.id, record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: ForgivenessId) -> Result<Option<ForgivenessApplication>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn find(
        &self,
        filter: &AmnestyFilter,
    ) -> Result<Vec<ForgivenessApplication>, RepositoryError> {
        Ok(self
            .records()
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }
}

/// Ledger keyed by the trimmed, lowercased address.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNotificationLedger {
    entries: Arc<Mutex<HashMap<String, NotificationLedgerEntry>>>,
}

impl NotificationLedger for InMemoryNotificationLedger {
    fn fetch(&self, email_address: &str) -> Result<Option<NotificationLedgerEntry>, LedgerError> {
        let guard = self.entries.lock().expect("ledger mutex poisoned");
        Ok(guard.get(&ledger_key(email_address)).cloned())
    }

    fn record_sent(
        &self,
        email_address: &str,
        kind: NotificationKind,
    ) -> Result<NotificationLedgerEntry, LedgerError> {
        let mut guard = self.entries.lock().expect("ledger mutex poisoned");
        let entry = guard
            .entry(ledger_key(email_address))
            .or_insert_with(|| NotificationLedgerEntry::new(email_address.trim()));
        entry.mark_sent(kind);
        Ok(entry.clone())
    }
}

fn ledger_key(email_address: &str) -> String {
    email_address.trim().to_lowercase()
}

/// Stands in for the mail relay: logs the subject and keeps the message in an outbox.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier {
    outbox: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl Notifier for LoggingNotifier {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifierError> {
        info!(subject = %email.subject, "email queued for delivery");
        let mut guard = self.outbox.lock().expect("outbox mutex poisoned");
        guard.push(email.clone());
        Ok(())
    }
}

impl LoggingNotifier {
    pub(crate) fn outbox(&self) -> Vec<OutboundEmail> {
        self.outbox.lock().expect("outbox mutex poisoned").clone()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StoredBlob {
    pub(crate) declared_type: String,
    pub(crate) bytes: Vec<u8>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentStorage {
    blobs: Arc<Mutex<HashMap<String, StoredBlob>>>,
}

impl DocumentStorage for InMemoryDocumentStorage {
    fn store(
        &self,
        application_id: ApplicationId,
        doc_type: DocumentType,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let declared_type = mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let mut guard = self.blobs.lock().expect("storage mutex poisoned");
        let key = format!(
            "applications/{application_id}/{}/{}-{}",
            doc_type.label(),
            guard.len() + 1,
            sanitize_file_name(file_name)
        );
        guard.insert(
            key.clone(),
            StoredBlob {
                declared_type,
                bytes: bytes.to_vec(),
            },
        );
        Ok(key)
    }

    fn remove(&self, storage_key: &str) -> Result<(), StorageError> {
        let mut guard = self.blobs.lock().expect("storage mutex poisoned");
        guard
            .remove(storage_key)
            .map(|_| ())
            .ok_or_else(|| StorageError::Missing(storage_key.to_string()))
    }
}

impl InMemoryDocumentStorage {
    pub(crate) fn blob(&self, storage_key: &str) -> Option<StoredBlob> {
        self.blobs
            .lock()
            .expect("storage mutex poisoned")
            .get(storage_key)
            .cloned()
    }
}

fn sanitize_file_name(file_name: &str) -> String {
    let cleaned: String = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

pub(crate) fn parse_amount(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw.trim().trim_start_matches('$').replace(',', "").as_str())
        .map_err(|err| format!("failed to parse '{raw}' as a dollar amount ({err})"))
}

pub(crate) fn parse_pay_period(raw: &str) -> Result<PayPeriod, String> {
    PayPeriod::parse(raw).ok_or_else(|| {
        format!("unknown pay period '{raw}' (weekly, biweekly, semimonthly, monthly, annually)")
    })
}
