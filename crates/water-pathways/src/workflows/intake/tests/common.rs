use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::config::{NotificationConfig, ProgramConfig, UploadConfig};
use crate::workflows::intake::domain::{
    ApplicationId, ApplicationRecord, Document, DocumentType, ForgivenessApplication,
    ForgivenessId,
};
use crate::workflows::intake::forms::FormData;
use crate::workflows::intake::notifications::{
    DispatchMode, NotificationKind, NotificationLedgerEntry, OutboundEmail,
};
use crate::workflows::intake::repository::{
    AmnestyFilter, AmnestyRepository, ApplicationFilter, ApplicationRepository, DocumentStorage,
    LedgerError, NotificationLedger, Notifier, NotifierError, RepositoryError, StorageError,
};
use crate::workflows::intake::service::{IntakeCollaborators, IntakeService, StepOutcome};
use crate::workflows::intake::session::{ApplicantSession, SessionError, SessionId, SessionStore};
use crate::workflows::intake::steps::{Program, Step};

pub(super) const MAIL_FROM: &str = "Get Water Wise Buffalo <hello@getwaterwisebuffalo.org>";

pub(super) fn program_config() -> ProgramConfig {
    ProgramConfig {
        notifications: NotificationConfig {
            from_address: MAIL_FROM.to_string(),
            dispatch: DispatchMode::Inline,
        },
        uploads: UploadConfig { max_bytes: 1024 },
        ..ProgramConfig::default()
    }
}

/// Service wired to in-memory collaborators, with handles kept for assertions.
pub(super) struct Harness {
    pub(super) service: Arc<IntakeService>,
    pub(super) sessions: Arc<MemorySessions>,
    pub(super) applications: Arc<MemoryApplications>,
    pub(super) amnesty: Arc<MemoryAmnesty>,
    pub(super) ledger: Arc<MemoryLedger>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) storage: Arc<MemoryStorage>,
}

impl Harness {
    pub(super) fn new() -> Self {
        let sessions = Arc::new(MemorySessions::default());
        let applications = Arc::new(MemoryApplications::default());
        let amnesty = Arc::new(MemoryAmnesty::default());
        let ledger = Arc::new(MemoryLedger::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let storage = Arc::new(MemoryStorage::default());

        let service = IntakeService::new(
            IntakeCollaborators {
                sessions: sessions.clone(),
                applications: applications.clone(),
                amnesty: amnesty.clone(),
                ledger: ledger.clone(),
                notifier: notifier.clone(),
                storage: storage.clone(),
            },
            &program_config(),
        );

        Self {
            service: Arc::new(service),
            sessions,
            applications,
            amnesty,
            ledger,
            notifier,
            storage,
        }
    }

    pub(super) fn start(&self, program: Program) -> SessionId {
        self.service
            .start(program, None)
            .expect("wizard starts")
    }

    pub(super) fn submit(&self, session_id: &SessionId, step: Step, data: FormData) -> StepOutcome {
        self.service
            .submit(session_id, step, &data)
            .expect("step submits")
    }

    /// Post one step and return where it redirected.
    pub(super) fn advance(&self, session_id: &SessionId, step: Step, data: FormData) -> String {
        match self.submit(session_id, step, data) {
            StepOutcome::Redirect(location) => location,
            StepOutcome::Render(view) => panic!("{step} re-rendered with {:?}", view.errors),
        }
    }

    /// Post a sequence of steps, collecting every redirect.
    pub(super) fn walk(&self, session_id: &SessionId, steps: Vec<(Step, FormData)>) -> Vec<String> {
        steps
            .into_iter()
            .map(|(step, data)| self.advance(session_id, step, data))
            .collect()
    }

    pub(super) fn session(&self, session_id: &SessionId) -> ApplicantSession {
        self.service.session(session_id).expect("session loads")
    }
}

/// Service whose application store is replaced, for failure paths.
pub(super) fn service_with_applications(
    applications: Arc<dyn ApplicationRepository>,
) -> Arc<IntakeService> {
    Arc::new(IntakeService::new(
        IntakeCollaborators {
            sessions: Arc::new(MemorySessions::default()),
            applications,
            amnesty: Arc::new(MemoryAmnesty::default()),
            ledger: Arc::new(MemoryLedger::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            storage: Arc::new(MemoryStorage::default()),
        },
        &program_config(),
    ))
}

pub(super) fn form(pairs: &[(&str, &str)]) -> FormData {
    pairs
        .iter()
        .map(|(field, value)| (field.to_string(), value.to_string()))
        .collect()
}

/// Single-earner household of one with one weekly job paying $500.
pub(super) fn eligibility_answers() -> Vec<(Step, FormData)> {
    vec![
        (Step::CityResident, form(&[("city_resident", "yes")])),
        (Step::HouseholdSize, form(&[("household_size", "1")])),
        (
            Step::HouseholdBenefits,
            form(&[("has_household_benefits", "no")]),
        ),
        (
            Step::HouseholdContributors,
            form(&[("household_contributors", "1")]),
        ),
        (Step::JobStatus, form(&[("has_job", "yes")])),
        (Step::SelfEmployment, form(&[("is_self_employed", "no")])),
        (Step::NumberOfJobs, form(&[("number_of_jobs", "1")])),
        (Step::IncomeMethods, form(&[("income_method", "exact")])),
        (
            Step::Income,
            form(&[("income", "500"), ("pay_period", "weekly")]),
        ),
        (
            Step::OtherIncomeSources,
            form(&[("has_other_income", "no")]),
        ),
        (Step::ReviewEligibility, FormData::new()),
        (Step::Eligibility, FormData::new()),
    ]
}

/// Resident, contact and legal answers that finish the discount wizard.
pub(super) fn application_answers(email: Option<&str>) -> Vec<(Step, FormData)> {
    let mut contact = form(&[("phone_number", "(716) 555-1234")]);
    if let Some(email) = email {
        contact = contact.with("email_address", email);
    }

    vec![
        (
            Step::ResidentInfo,
            form(&[
                ("first_name", "Ana"),
                ("last_name", "Diaz"),
                ("rent_or_own", "rent"),
                ("account_holder", "me"),
            ]),
        ),
        (
            Step::Address,
            form(&[("street_address", "123 Main St"), ("zip_code", "14201")]),
        ),
        (Step::ContactInfo, contact),
        (Step::AccountNumber, form(&[("has_account_number", "no")])),
        (Step::ReviewApplication, FormData::new()),
        (Step::Legal, form(&[("legal_agreement", "on")])),
        (Step::Refer, form(&[("bill", "on")])),
        (Step::Signature, form(&[("signature", "Ana Diaz")])),
    ]
}

pub(super) fn complete_discount(harness: &Harness, email: Option<&str>) -> SessionId {
    let session_id = harness.start(Program::Discount);
    harness.walk(&session_id, eligibility_answers());
    harness.walk(&session_id, application_answers(email));
    session_id
}

pub(super) fn amnesty_answers(email: Option<&str>) -> Vec<(Step, FormData)> {
    let mut resident = form(&[
        ("first_name", "Luis"),
        ("last_name", "Ortiz"),
        ("street_address", "45 Niagara St"),
        ("zip_code", "14202"),
        ("phone_number", "716-555-9876"),
    ]);
    if let Some(email) = email {
        resident = resident.with("email_address", email);
    }

    vec![
        (Step::AmnestyCityResident, form(&[("city_resident", "yes")])),
        (
            Step::AdditionalQuestions,
            form(&[
                ("rent_or_own", "own"),
                ("has_past_due_balance", "yes"),
                ("in_payment_plan", "no"),
            ]),
        ),
        (Step::AmnestyResidentInfo, resident),
        (Step::Referral, form(&[("word_of_mouth", "on")])),
        (
            Step::AmnestyReview,
            form(&[("legal_agreement", "on"), ("signature", "Luis Ortiz")]),
        ),
    ]
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) const PDF_BYTES: &[u8] = b"%PDF-1.7\n%proof of income\n";

#[derive(Default)]
pub(super) struct MemorySessions {
    sessions: Mutex<HashMap<SessionId, ApplicantSession>>,
}

impl MemorySessions {
    pub(super) fn contains(&self, id: &SessionId) -> bool {
        self.sessions
            .lock()
            .expect("session mutex poisoned")
            .contains_key(id)
    }
}

impl SessionStore for MemorySessions {
    fn load(&self, id: &SessionId) -> Result<Option<ApplicantSession>, SessionError> {
        let guard = self.sessions.lock().expect("session mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn save(&self, id: &SessionId, session: &ApplicantSession) -> Result<(), SessionError> {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        guard.insert(*id, session.clone());
        Ok(())
    }

    fn clear(&self, id: &SessionId) -> Result<(), SessionError> {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        guard.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryApplications {
    records: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
    documents: Mutex<Vec<Document>>,
}

impl MemoryApplications {
    pub(super) fn all(&self) -> Vec<ApplicationRecord> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<_> = guard.values().cloned().collect();
        records.sort_by_key(|record| record.id);
        records
    }
}

impl ApplicationRepository for MemoryApplications {
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
        if !guard.contains_key(&record.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(record.id, record);
        Ok(())
    }

    fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn find(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(self
            .all()
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

#[derive(Default)]
pub(super) struct MemoryAmnesty {
    records: Mutex<HashMap<ForgivenessId, ForgivenessApplication>>,
}

impl MemoryAmnesty {
    pub(super) fn all(&self) -> Vec<ForgivenessApplication> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<_> = guard.values().cloned().collect();
        records.sort_by_key(|record| record.id);
        records
    }
}

impl AmnestyRepository for MemoryAmnesty {
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
        if !guard.contains_key(&record.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(record.id, record);
        Ok(())
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
            .all()
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }
}

/// Ledger keyed by the lowercased address.
#[derive(Default)]
pub(super) struct MemoryLedger {
    entries: Mutex<HashMap<String, NotificationLedgerEntry>>,
}

impl MemoryLedger {
    pub(super) fn len(&self) -> usize {
        self.entries.lock().expect("ledger mutex poisoned").len()
    }
}

impl NotificationLedger for MemoryLedger {
    fn fetch(&self, email_address: &str) -> Result<Option<NotificationLedgerEntry>, LedgerError> {
        let guard = self.entries.lock().expect("ledger mutex poisoned");
        Ok(guard.get(&email_address.trim().to_lowercase()).cloned())
    }

    fn record_sent(
        &self,
        email_address: &str,
        kind: NotificationKind,
    ) -> Result<NotificationLedgerEntry, LedgerError> {
        let mut guard = self.entries.lock().expect("ledger mutex poisoned");
        let entry = guard
            .entry(email_address.trim().to_lowercase())
            .or_insert_with(|| NotificationLedgerEntry::new(email_address.trim()));
        entry.mark_sent(kind);
        Ok(entry.clone())
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingNotifier {
    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn subjects_to(&self, address: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|email| email.to.eq_ignore_ascii_case(address))
            .map(|email| email.subject)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifierError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(email.clone());
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send(&self, _email: &OutboundEmail) -> Result<(), NotifierError> {
        Err(NotifierError::Transport("smtp relay offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub(super) fn len(&self) -> usize {
        self.blobs.lock().expect("storage mutex poisoned").len()
    }
}

impl DocumentStorage for MemoryStorage {
    fn store(
        &self,
        application_id: ApplicationId,
        doc_type: DocumentType,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let mut guard = self.blobs.lock().expect("storage mutex poisoned");
        let key = format!(
            "applications/{application_id}/{}/{}-{file_name}",
            doc_type.label(),
            guard.len()
        );
        guard.insert(key.clone(), bytes.to_vec());
        Ok(key)
    }

    fn remove(&self, storage_key: &str) -> Result<(), StorageError> {
        self.blobs
            .lock()
            .expect("storage mutex poisoned")
            .remove(storage_key)
            .map(|_| ())
            .ok_or_else(|| StorageError::Missing(storage_key.to_string()))
    }
}

pub(super) struct UnavailableApplications;

impl ApplicationRepository for UnavailableApplications {
    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: ApplicationRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find(&self, _filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: ApplicationId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn attach_document(&self, _document: Document) -> Result<Document, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn documents(&self, _id: ApplicationId) -> Result<Vec<Document>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn purge_documents(&self, _id: ApplicationId) -> Result<Vec<Document>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}
