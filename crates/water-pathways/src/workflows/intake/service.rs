use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ProgramConfig;

use super::documents::{self, DocumentError, DocumentUpload, FileValidator};
use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, Document, DocumentId, DocumentType,
    ForgivenessApplication, ForgivenessId,
};
use super::eligibility::{DiscountTier, EligibilityDecision, EligibilityEvaluator};
use super::finalize::ApplicationFinalizer;
use super::forms::{FormData, LateDocumentLookupForm, ValidationError, ValidationErrors};
use super::income::{self, Cadence};
use super::lookup::{self, LookupOutcome, LookupQuery};
use super::notifications::{NotificationDispatcher, NotificationTrigger};
use super::repository::{
    AmnestyRepository, ApplicationRepository, DocumentStorage, NotificationLedger, Notifier,
    RepositoryError,
};
use super::session::{ApplicantSession, SessionId, SessionStore};
use super::steps::{self, Commit, GuardViolation, Program, Step, StepContext, StepError};
use super::IntakeError;

pub const LATE_DOCUMENTS_PATH: &str = "/apply/later-documents";
const LATE_DOCUMENT_FIELDS: &[&str] = &[
    "first_name",
    "middle_initial",
    "last_name",
    "zip_code",
    "phone_number",
    "email_address",
    "rent_or_own",
    "street_address",
    "household_size",
];

static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_document_id() -> DocumentId {
    DocumentId(DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

/// External collaborators the intake workflow is wired against.
#[derive(Clone)]
pub struct IntakeCollaborators {
    pub sessions: Arc<dyn SessionStore>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub amnesty: Arc<dyn AmnestyRepository>,
    pub ledger: Arc<dyn NotificationLedger>,
    pub notifier: Arc<dyn Notifier>,
    pub storage: Arc<dyn DocumentStorage>,
}

/// What the wizard shows for one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub program: Program,
    pub step: &'static str,
    pub fields: &'static [&'static str],
    pub context: Value,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Render(StepView),
    /// Absolute path to send the browser to.
    Redirect(String),
}

/// Standalone eligibility check used by the CLI and the JSON API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityRequest {
    pub household_size: u8,
    #[serde(default)]
    pub has_household_benefits: bool,
    #[serde(default)]
    pub income: Option<Decimal>,
    #[serde(default)]
    pub cadence: Option<Cadence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityEstimate {
    pub annual_income: Option<Decimal>,
    pub decision: EligibilityDecision,
    pub summary: String,
}

/// Service composing the session store, step graph, finalizer and notification hooks.
pub struct IntakeService {
    sessions: Arc<dyn SessionStore>,
    applications: Arc<dyn ApplicationRepository>,
    amnesty: Arc<dyn AmnestyRepository>,
    storage: Arc<dyn DocumentStorage>,
    evaluator: EligibilityEvaluator,
    finalizer: ApplicationFinalizer,
    notifications: NotificationTrigger,
    validator: FileValidator,
}

impl IntakeService {
    pub fn new(collaborators: IntakeCollaborators, config: &ProgramConfig) -> Self {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            collaborators.ledger,
            collaborators.notifier,
            config.notifications.from_address.clone(),
        ));
        let notifications = NotificationTrigger::new(dispatcher, config.notifications.dispatch);
        let finalizer = ApplicationFinalizer::new(
            Arc::clone(&collaborators.applications),
            Arc::clone(&collaborators.amnesty),
            notifications.clone(),
        );

        Self {
            sessions: collaborators.sessions,
            applications: collaborators.applications,
            amnesty: collaborators.amnesty,
            storage: collaborators.storage,
            evaluator: EligibilityEvaluator::new(config.eligibility.clone()),
            finalizer,
            notifications,
            validator: FileValidator::new(config.uploads.max_bytes),
        }
    }

    pub fn evaluator(&self) -> &EligibilityEvaluator {
        &self.evaluator
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.validator.max_bytes()
    }

    /// Discard any previous answers and open a fresh session for the wizard.
    pub fn start(
        &self,
        program: Program,
        previous: Option<SessionId>,
    ) -> Result<SessionId, IntakeError> {
        if let Some(previous) = previous {
            self.sessions.clear(&previous)?;
        }
        let session_id = SessionId::generate();
        self.sessions
            .save(&session_id, &ApplicantSession::default())?;
        info!(program = program.label(), "wizard started");
        Ok(session_id)
    }

    pub fn session(&self, session_id: &SessionId) -> Result<ApplicantSession, IntakeError> {
        Ok(self.sessions.load(session_id)?.unwrap_or_default())
    }

    pub fn view(&self, session_id: &SessionId, step: Step) -> Result<StepOutcome, IntakeError> {
        let session = self.session(session_id)?;
        let spec = step.spec();
        if let Err(violation) = steps::guard(&spec, &session) {
            return Ok(restart(step, &violation));
        }
        Ok(StepOutcome::Render(self.render(step, &session, Vec::new())))
    }

    /// Validate a step's post, record it in the session, run any commit and move on.
    pub fn submit(
        &self,
        session_id: &SessionId,
        step: Step,
        data: &FormData,
    ) -> Result<StepOutcome, IntakeError> {
        let mut session = self.session(session_id)?;
        let spec = step.spec();
        if let Err(violation) = steps::guard(&spec, &session) {
            return Ok(restart(step, &violation));
        }

        if let Some(apply) = spec.apply {
            match apply(data, &mut session) {
                Ok(()) => {}
                Err(StepError::Validation(errors)) => {
                    debug!(step = %step, errors = errors.0.len(), "step failed validation");
                    return Ok(StepOutcome::Render(self.render(step, &session, errors.0)));
                }
                Err(StepError::MissingState(missing)) => {
                    return Ok(restart(step, &GuardViolation::from(missing)));
                }
            }
        }

        if let Some(commit) = spec.commit {
            match self.commit(commit, &mut session) {
                Ok(()) => {}
                Err(IntakeError::MissingState(missing)) => {
                    return Ok(restart(step, &GuardViolation::from(missing)));
                }
                Err(other) => return Err(other),
            }
        }

        let ctx = StepContext {
            evaluator: &self.evaluator,
        };
        let next = match spec.next(&session, &ctx) {
            Ok(next) => next,
            Err(missing) => return Ok(restart(step, &GuardViolation::from(missing))),
        };
        self.sessions.save(session_id, &session)?;

        match next {
            Some(next) => {
                info!(step = %step, next = %next, "step submitted");
                Ok(StepOutcome::Redirect(next.path()))
            }
            None => Ok(StepOutcome::Render(self.render(step, &session, Vec::new()))),
        }
    }

    fn commit(&self, commit: Commit, session: &mut ApplicantSession) -> Result<(), IntakeError> {
        match commit {
            Commit::DiscountApplication => {
                let finalized = self.finalizer.finalize(session)?;
                session.application_id = Some(finalized.record.id);
            }
            Commit::AmnestyApplication => {
                let finalized = self.finalizer.finalize_amnesty(session)?;
                session.forgiveness_id = Some(finalized.record.id);
            }
        }
        Ok(())
    }

    fn render(
        &self,
        step: Step,
        session: &ApplicantSession,
        errors: Vec<ValidationError>,
    ) -> StepView {
        let spec = step.spec();
        let ctx = StepContext {
            evaluator: &self.evaluator,
        };
        StepView {
            program: step.program(),
            step: step.slug(),
            fields: spec.fields,
            context: spec.context(session, &ctx),
            errors,
        }
    }

    pub fn application(&self, id: ApplicationId) -> Result<ApplicationRecord, IntakeError> {
        Ok(self
            .applications
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?)
    }

    /// Tier for a stored application; benefits households count as no income.
    pub fn discount_tier(&self, record: &ApplicationRecord) -> DiscountTier {
        let annual_income = match (record.has_household_benefits, record.annual_income) {
            (false, Some(income)) => income,
            _ => Decimal::ZERO,
        };
        self.evaluator
            .discount_tier(annual_income, record.household_size)
    }

    pub fn amnesty_application(
        &self,
        id: ForgivenessId,
    ) -> Result<ForgivenessApplication, IntakeError> {
        Ok(self.amnesty.fetch(id)?.ok_or(RepositoryError::NotFound)?)
    }

    /// Staff review. Entering `enrolled` fires the enrollment email.
    pub fn update_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        notes: Option<String>,
    ) -> Result<ApplicationRecord, IntakeError> {
        let mut record = self.application(id)?;
        let previous = record.status;
        record.status = status;
        if let Some(notes) = notes {
            record.notes = notes;
        }
        self.applications.update(record.clone())?;
        info!(
            application_id = %id,
            from = previous.label(),
            to = status.label(),
            "application status updated"
        );

        if status == ApplicationStatus::Enrolled && previous != ApplicationStatus::Enrolled {
            self.notifications.application_enrolled(&record);
        }
        Ok(record)
    }

    pub fn update_amnesty_status(
        &self,
        id: ForgivenessId,
        status: ApplicationStatus,
        notes: Option<String>,
    ) -> Result<ForgivenessApplication, IntakeError> {
        let mut record = self.amnesty_application(id)?;
        let previous = record.status;
        record.status = status;
        if let Some(notes) = notes {
            record.notes = notes;
        }
        self.amnesty.update(record.clone())?;
        info!(
            forgiveness_id = %id,
            from = previous.label(),
            to = status.label(),
            "amnesty status updated"
        );

        if status == ApplicationStatus::Enrolled && previous != ApplicationStatus::Enrolled {
            self.notifications.amnesty_enrolled(&record);
        }
        Ok(record)
    }

    pub fn late_document_view(&self, errors: Vec<ValidationError>) -> StepView {
        StepView {
            program: Program::Discount,
            step: "later-documents",
            fields: LATE_DOCUMENT_FIELDS,
            context: Value::Null,
            errors,
        }
    }

    /// Match a returning applicant to their application; a single match is remembered in
    /// the session for the upload that follows.
    pub fn find_late_document_application(
        &self,
        session_id: &SessionId,
        data: &FormData,
    ) -> Result<StepOutcome, IntakeError> {
        let form = match LateDocumentLookupForm::parse(data) {
            Ok(form) => form,
            Err(errors) => return Ok(StepOutcome::Render(self.late_document_view(errors.0))),
        };
        let query = LookupQuery::from(form);

        let outcome = lookup::lookup_existing(self.applications.as_ref(), &query)?;
        let path = match outcome {
            LookupOutcome::Matched(application_id) => {
                let mut session = self.session(session_id)?;
                session.late_document_application = Some(application_id);
                self.sessions.save(session_id, &session)?;
                info!(application_id = %application_id, "late document application matched");
                format!("{LATE_DOCUMENTS_PATH}/upload")
            }
            LookupOutcome::NoMatch => format!("{LATE_DOCUMENTS_PATH}/no-match"),
            LookupOutcome::NeedMoreInfo => format!("{LATE_DOCUMENTS_PATH}/more-info"),
        };
        Ok(StepOutcome::Redirect(path))
    }

    /// Validate and store a proof document for the session's application. A late
    /// document ends its session once stored.
    pub fn attach_document(
        &self,
        session_id: &SessionId,
        doc_type: &str,
        upload: DocumentUpload,
    ) -> Result<Document, IntakeError> {
        let doc_type = DocumentType::parse(doc_type)
            .ok_or_else(|| DocumentError::UnknownDocumentType(doc_type.to_string()))?;
        let session = self.session(session_id)?;
        let selected = (session.late_document_application, session.application_id);
        let (application_id, late) = match selected {
            (Some(id), _) => (id, true),
            (None, Some(id)) => (id, false),
            (None, None) => return Err(DocumentError::NoApplicationSelected.into()),
        };
        self.application(application_id)?;

        let format = self.validator.validate(&upload)?;
        let storage_key = self.storage.store(
            application_id,
            doc_type,
            &upload.file_name,
            &upload.bytes,
        )?;
        let document = self.applications.attach_document(Document {
            id: next_document_id(),
            application_id,
            doc_type,
            storage_key,
            content_type: format.content_type(),
            uploaded_at: Utc::now(),
        })?;
        info!(
            application_id = %application_id,
            doc_type = doc_type.label(),
            "document attached"
        );

        if late {
            self.sessions.clear(session_id)?;
        }
        Ok(document)
    }

    pub fn purge_settled_documents(&self) -> Result<usize, IntakeError> {
        Ok(documents::purge_settled_documents(
            self.applications.as_ref(),
            self.storage.as_ref(),
        )?)
    }

    pub fn estimate(
        &self,
        request: &EligibilityRequest,
    ) -> Result<EligibilityEstimate, IntakeError> {
        if request.household_size == 0 {
            return Err(ValidationErrors::from(ValidationError::new(
                "household_size",
                "Select your household size.",
            ))
            .into());
        }

        let annual_income = if request.has_household_benefits {
            None
        } else {
            let amount = request.income.ok_or_else(|| {
                ValidationError::new("income", "Be sure to provide a household income.")
            });
            let cadence = request.cadence.ok_or_else(|| {
                ValidationError::new(
                    "pay_period",
                    "Select how often your household makes this amount.",
                )
            });
            let mut errors = ValidationErrors::default();
            let (Some(amount), Some(cadence)) = (errors.check(amount), errors.check(cadence)) else {
                return Err(errors.into());
            };
            Some(income::annualize(amount, cadence).map_err(ValidationErrors::from)?)
        };

        let decision = self.evaluator.evaluate(
            request.has_household_benefits,
            request.household_size,
            annual_income,
        );
        Ok(EligibilityEstimate {
            annual_income,
            summary: decision.summary(),
            decision,
        })
    }
}

fn restart(step: Step, violation: &GuardViolation) -> StepOutcome {
    warn!(step = %step, reason = %violation, "redirecting to wizard start");
    StepOutcome::Redirect(step.program().start().path())
}
