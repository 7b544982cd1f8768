//! Water bill discount and amnesty intake.
//!
//! A resident walks a session-backed wizard (see [`steps`]) that collects household,
//! income, residency and contact answers. The discount wizard determines eligibility
//! against the configured income ceilings; both wizards finalize into durable records
//! and send at-most-once confirmation emails through the notification ledger.

pub mod documents;
pub mod domain;
pub mod eligibility;
pub mod finalize;
pub mod forms;
pub mod income;
pub mod lookup;
pub mod notifications;
pub mod repository;
pub mod router;
pub mod service;
pub mod session;
pub mod steps;

#[cfg(test)]
mod tests;

pub use documents::{DocumentError, DocumentUpload, FileValidator, SniffedFormat};
pub use domain::{
    AccountHolder, ApplicationId, ApplicationRecord, ApplicationStatus, Document, DocumentId,
    DocumentType, ForgivenessApplication, ForgivenessId, Referral, RentOrOwn,
};
pub use eligibility::{
    DiscountTier, EligibilityConfig, EligibilityDecision, EligibilityEvaluator, IncomeThresholds,
};
pub use finalize::{ApplicationFinalizer, FinalizedAmnesty, FinalizedApplication};
pub use forms::{FormData, ValidationError, ValidationErrors};
pub use income::{annualize, Cadence, IncomeMethod, PayPeriod, BIWEEKLY_PERIODS_PER_YEAR};
pub use lookup::{LookupOutcome, LookupQuery};
pub use notifications::{
    DispatchMode, NotificationDispatcher, NotificationKind, NotificationLedgerEntry,
    NotificationTrigger, OutboundEmail,
};
pub use repository::{
    AmnestyFilter, AmnestyRepository, ApplicationFilter, ApplicationRepository, DocumentStorage,
    LedgerError, NotificationLedger, Notifier, NotifierError, RepositoryError, StorageError,
};
pub use router::{intake_router, SESSION_COOKIE};
pub use service::{
    EligibilityEstimate, EligibilityRequest, IntakeCollaborators, IntakeService, StepOutcome,
    StepView,
};
pub use session::{
    ApplicantSession, MissingStateError, SessionError, SessionId, SessionKey, SessionStore,
};
pub use steps::{Program, Step};

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    MissingState(#[from] MissingStateError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
