//! Per-applicant scratch state carried between wizard steps.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::{AccountHolder, ApplicationId, ForgivenessId, Referral, RentOrOwn};
use super::income::{Cadence, IncomeMethod};

/// Opaque browser-session identifier delivered through the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Marker that unlocks every guarded step of one wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionMarker {
    /// `active_app`: set once the discount wizard records a household size.
    ActiveApplication,
    /// `forgive_step`: set once the amnesty wizard confirms city residency.
    ForgivenessStarted,
}

impl SessionMarker {
    pub const fn key(self) -> &'static str {
        match self {
            SessionMarker::ActiveApplication => "active_app",
            SessionMarker::ForgivenessStarted => "forgive_step",
        }
    }
}

/// Accumulated answers for one applicant. Every field starts empty and is filled by
/// exactly one step; nothing here is durable until the finalizer commits it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicantSession {
    pub active_app: bool,
    pub forgive_step: bool,

    pub city_resident: Option<bool>,
    pub household_size: Option<u8>,
    pub has_household_benefits: Option<bool>,
    pub household_contributors: Option<u8>,
    pub has_job: Option<bool>,
    pub is_self_employed: Option<bool>,
    pub number_of_jobs: Option<u8>,
    pub income_method: Option<IncomeMethod>,
    pub income: Option<Decimal>,
    pub pay_period: Option<Cadence>,
    /// Job income alone, kept so re-posting the non-job step does not double count.
    pub earned_annual_income: Option<Decimal>,
    pub has_other_income: Option<bool>,
    pub non_job_income: Option<Decimal>,
    pub annual_income: Option<Decimal>,

    pub first_name: Option<String>,
    pub middle_initial: Option<String>,
    pub last_name: Option<String>,
    pub rent_or_own: Option<RentOrOwn>,
    pub account_holder: Option<AccountHolder>,
    pub street_address: Option<String>,
    pub apartment_unit: Option<String>,
    pub zip_code: Option<String>,
    pub phone_number: Option<String>,
    pub email_address: Option<String>,
    pub account_first: Option<String>,
    pub account_middle: Option<String>,
    pub account_last: Option<String>,
    pub has_account_number: Option<bool>,
    pub account_number: Option<String>,

    pub in_payment_plan: Option<bool>,
    pub has_past_due_balance: Option<bool>,

    pub legal_agreement: Option<bool>,
    pub signature: Option<String>,
    pub referral: Option<Referral>,

    pub application_id: Option<ApplicationId>,
    pub forgiveness_id: Option<ForgivenessId>,
    pub late_document_application: Option<ApplicationId>,
}

impl ApplicantSession {
    pub fn has_marker(&self, marker: SessionMarker) -> bool {
        match marker {
            SessionMarker::ActiveApplication => self.active_app,
            SessionMarker::ForgivenessStarted => self.forgive_step,
        }
    }

    pub fn set_marker(&mut self, marker: SessionMarker) {
        match marker {
            SessionMarker::ActiveApplication => self.active_app = true,
            SessionMarker::ForgivenessStarted => self.forgive_step = true,
        }
    }

    pub fn contains(&self, key: SessionKey) -> bool {
        key.is_present(self)
    }

    /// First required key that has not been collected yet.
    pub fn missing(&self, keys: &[SessionKey]) -> Option<SessionKey> {
        keys.iter().copied().find(|key| !self.contains(*key))
    }
}

/// Read an answer a later step depends on.
pub(crate) fn required<T: Clone>(
    value: &Option<T>,
    key: SessionKey,
) -> Result<T, MissingStateError> {
    value.clone().ok_or(MissingStateError { key })
}

/// Names of the session answers a step or the finalizer may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKey {
    CityResident,
    HouseholdSize,
    HasHouseholdBenefits,
    HouseholdContributors,
    HasJob,
    IsSelfEmployed,
    NumberOfJobs,
    IncomeMethod,
    AnnualIncome,
    HasOtherIncome,
    FirstName,
    LastName,
    RentOrOwn,
    AccountHolder,
    StreetAddress,
    ZipCode,
    PhoneNumber,
    AccountFirst,
    AccountLast,
    HasAccountNumber,
    InPaymentPlan,
    HasPastDueBalance,
    LegalAgreement,
    Signature,
    ApplicationId,
    ForgivenessId,
    LateDocumentApplication,
}

impl SessionKey {
    pub const fn name(self) -> &'static str {
        match self {
            SessionKey::CityResident => "city_resident",
            SessionKey::HouseholdSize => "household_size",
            SessionKey::HasHouseholdBenefits => "has_household_benefits",
            SessionKey::HouseholdContributors => "household_contributors",
            SessionKey::HasJob => "has_job",
            SessionKey::IsSelfEmployed => "is_self_employed",
            SessionKey::NumberOfJobs => "number_of_jobs",
            SessionKey::IncomeMethod => "income_method",
            SessionKey::AnnualIncome => "annual_income",
            SessionKey::HasOtherIncome => "has_other_income",
            SessionKey::FirstName => "first_name",
            SessionKey::LastName => "last_name",
            SessionKey::RentOrOwn => "rent_or_own",
            SessionKey::AccountHolder => "account_holder",
            SessionKey::StreetAddress => "street_address",
            SessionKey::ZipCode => "zip_code",
            SessionKey::PhoneNumber => "phone_number",
            SessionKey::AccountFirst => "account_first",
            SessionKey::AccountLast => "account_last",
            SessionKey::HasAccountNumber => "has_account_number",
            SessionKey::InPaymentPlan => "in_payment_plan",
            SessionKey::HasPastDueBalance => "has_past_due_balance",
            SessionKey::LegalAgreement => "legal_agreement",
            SessionKey::Signature => "signature",
            SessionKey::ApplicationId => "application_id",
            SessionKey::ForgivenessId => "forgiveness_id",
            SessionKey::LateDocumentApplication => "late_document_application",
        }
    }

    fn is_present(self, session: &ApplicantSession) -> bool {
        match self {
            SessionKey::CityResident => session.city_resident.is_some(),
            SessionKey::HouseholdSize => session.household_size.is_some(),
            SessionKey::HasHouseholdBenefits => session.has_household_benefits.is_some(),
            SessionKey::HouseholdContributors => session.household_contributors.is_some(),
            SessionKey::HasJob => session.has_job.is_some(),
            SessionKey::IsSelfEmployed => session.is_self_employed.is_some(),
            SessionKey::NumberOfJobs => session.number_of_jobs.is_some(),
            SessionKey::IncomeMethod => session.income_method.is_some(),
            SessionKey::AnnualIncome => session.annual_income.is_some(),
            SessionKey::HasOtherIncome => session.has_other_income.is_some(),
            SessionKey::FirstName => session.first_name.is_some(),
            SessionKey::LastName => session.last_name.is_some(),
            SessionKey::RentOrOwn => session.rent_or_own.is_some(),
            SessionKey::AccountHolder => session.account_holder.is_some(),
            SessionKey::StreetAddress => session.street_address.is_some(),
            SessionKey::ZipCode => session.zip_code.is_some(),
            SessionKey::PhoneNumber => session.phone_number.is_some(),
            SessionKey::AccountFirst => session.account_first.is_some(),
            SessionKey::AccountLast => session.account_last.is_some(),
            SessionKey::HasAccountNumber => session.has_account_number.is_some(),
            SessionKey::InPaymentPlan => session.in_payment_plan.is_some(),
            SessionKey::HasPastDueBalance => session.has_past_due_balance.is_some(),
            SessionKey::LegalAgreement => session.legal_agreement == Some(true),
            SessionKey::Signature => session.signature.is_some(),
            SessionKey::ApplicationId => session.application_id.is_some(),
            SessionKey::ForgivenessId => session.forgiveness_id.is_some(),
            SessionKey::LateDocumentApplication => session.late_document_application.is_some(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A step or the finalizer ran before the answers it depends on were collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session is missing required answer '{key}'")]
pub struct MissingStateError {
    pub key: SessionKey,
}

/// Storage abstraction for wizard scratch state, keyed by the cookie's session id.
pub trait SessionStore: Send + Sync {
    fn load(&self, id: &SessionId) -> Result<Option<ApplicantSession>, SessionError>;
    fn save(&self, id: &SessionId, session: &ApplicantSession) -> Result<(), SessionError>;
    fn clear(&self, id: &SessionId) -> Result<(), SessionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}
