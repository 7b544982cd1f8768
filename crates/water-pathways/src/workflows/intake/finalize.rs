//! Converts a completed wizard session into a durable application record.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use super::domain::{
    AccountHolder, ApplicationId, ApplicationRecord, ApplicationStatus, ForgivenessApplication,
    ForgivenessId, Referral, RentOrOwn,
};
use super::notifications::NotificationTrigger;
use super::repository::{
    AmnestyFilter, AmnestyRepository, ApplicationFilter, ApplicationRepository,
};
use super::session::{required, ApplicantSession, MissingStateError, SessionKey};
use super::IntakeError;

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static FORGIVENESS_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    ApplicationId(APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

fn next_forgiveness_id() -> ForgivenessId {
    ForgivenessId(FORGIVENESS_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedApplication {
    pub record: ApplicationRecord,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedAmnesty {
    pub record: ForgivenessApplication,
    pub created: bool,
}

/// Every answer a discount record needs, read up front so a missing key fails before
/// anything is written.
struct DiscountAnswers {
    household_size: u8,
    has_household_benefits: bool,
    annual_income: Option<Decimal>,
    first_name: String,
    middle_initial: String,
    last_name: String,
    rent_or_own: RentOrOwn,
    street_address: String,
    apartment_unit: Option<String>,
    zip_code: String,
    phone_number: String,
    email_address: Option<String>,
    account_holder: AccountHolder,
    account_first: String,
    account_middle: String,
    account_last: String,
    account_number: Option<String>,
    signature: String,
    referral: Option<Referral>,
}

impl DiscountAnswers {
    fn collect(session: &ApplicantSession) -> Result<Self, IntakeError> {
        let has_household_benefits =
            required(&session.has_household_benefits, SessionKey::HasHouseholdBenefits)?;
        let annual_income = if has_household_benefits {
            None
        } else {
            Some(required(&session.annual_income, SessionKey::AnnualIncome)?)
        };

        let first_name = required(&session.first_name, SessionKey::FirstName)?;
        let middle_initial = session.middle_initial.clone().unwrap_or_default();
        let last_name = required(&session.last_name, SessionKey::LastName)?;
        let account_holder = required(&session.account_holder, SessionKey::AccountHolder)?;
        let (account_first, account_middle, account_last) = match account_holder {
            AccountHolder::Me => (
                first_name.clone(),
                middle_initial.clone(),
                last_name.clone(),
            ),
            AccountHolder::Landlord | AccountHolder::Other => (
                required(&session.account_first, SessionKey::AccountFirst)?,
                session.account_middle.clone().unwrap_or_default(),
                required(&session.account_last, SessionKey::AccountLast)?,
            ),
        };
        let has_account_number =
            required(&session.has_account_number, SessionKey::HasAccountNumber)?;

        if session.legal_agreement != Some(true) {
            return Err(MissingStateError {
                key: SessionKey::LegalAgreement,
            }
            .into());
        }

        Ok(Self {
            household_size: required(&session.household_size, SessionKey::HouseholdSize)?,
            has_household_benefits,
            annual_income,
            first_name,
            middle_initial,
            last_name,
            rent_or_own: required(&session.rent_or_own, SessionKey::RentOrOwn)?,
            street_address: required(&session.street_address, SessionKey::StreetAddress)?,
            apartment_unit: non_blank(&session.apartment_unit),
            zip_code: required(&session.zip_code, SessionKey::ZipCode)?,
            phone_number: required(&session.phone_number, SessionKey::PhoneNumber)?,
            email_address: non_blank(&session.email_address),
            account_holder,
            account_first,
            account_middle,
            account_last,
            account_number: if has_account_number {
                non_blank(&session.account_number)
            } else {
                None
            },
            signature: required(&session.signature, SessionKey::Signature)?,
            referral: session.referral.clone().filter(|referral| !referral.is_empty()),
        })
    }

    /// Identity, eligibility and legal answers; a match means the applicant re-posted
    /// the signature step.
    fn duplicate_filter(&self) -> ApplicationFilter {
        ApplicationFilter {
            first_name: Some(self.first_name.clone()),
            middle_initial: Some(self.middle_initial.clone()),
            last_name: Some(self.last_name.clone()),
            zip_code: Some(self.zip_code.clone()),
            phone_number: Some(self.phone_number.clone()),
            street_address: Some(self.street_address.clone()),
            household_size: Some(self.household_size),
            has_household_benefits: Some(self.has_household_benefits),
            legal_agreement: Some(true),
            signature: Some(self.signature.clone()),
            ..ApplicationFilter::default()
        }
    }

    fn apply_to(self, record: &mut ApplicationRecord) {
        record.household_size = self.household_size;
        record.has_household_benefits = self.has_household_benefits;
        if self.has_household_benefits {
            record.annual_income = None;
        } else if let Some(annual_income) = self.annual_income {
            record.annual_income = Some(annual_income);
        }
        record.first_name = self.first_name;
        record.middle_initial = self.middle_initial;
        record.last_name = self.last_name;
        record.rent_or_own = self.rent_or_own;
        record.street_address = self.street_address;
        if let Some(apartment_unit) = self.apartment_unit {
            record.apartment_unit = Some(apartment_unit);
        }
        record.zip_code = self.zip_code;
        record.phone_number = self.phone_number;
        if let Some(email_address) = self.email_address {
            record.email_address = Some(email_address);
        }
        record.account_holder = self.account_holder;
        record.account_first = self.account_first;
        record.account_middle = self.account_middle;
        record.account_last = self.account_last;
        if let Some(account_number) = self.account_number {
            record.account_number = Some(account_number);
        }
        record.legal_agreement = true;
        record.signature = self.signature;
        if let Some(referral) = self.referral {
            record.referral = Some(referral);
        }
    }

    fn into_record(self, id: ApplicationId) -> ApplicationRecord {
        ApplicationRecord {
            id,
            household_size: self.household_size,
            has_household_benefits: self.has_household_benefits,
            annual_income: self.annual_income,
            first_name: self.first_name,
            middle_initial: self.middle_initial,
            last_name: self.last_name,
            rent_or_own: self.rent_or_own,
            street_address: self.street_address,
            apartment_unit: self.apartment_unit,
            zip_code: self.zip_code,
            phone_number: self.phone_number,
            email_address: self.email_address,
            account_holder: self.account_holder,
            account_first: self.account_first,
            account_middle: self.account_middle,
            account_last: self.account_last,
            account_number: self.account_number,
            legal_agreement: true,
            signature: self.signature,
            referral: self.referral,
            status: ApplicationStatus::New,
            notes: String::new(),
            submitted_at: Utc::now(),
        }
    }
}

struct AmnestyAnswers {
    first_name: String,
    middle_initial: String,
    last_name: String,
    rent_or_own: RentOrOwn,
    in_payment_plan: bool,
    has_past_due_balance: bool,
    street_address: String,
    apartment_unit: Option<String>,
    zip_code: String,
    phone_number: String,
    email_address: Option<String>,
    signature: String,
    referral: Option<Referral>,
}

impl AmnestyAnswers {
    fn collect(session: &ApplicantSession) -> Result<Self, IntakeError> {
        if session.legal_agreement != Some(true) {
            return Err(MissingStateError {
                key: SessionKey::LegalAgreement,
            }
            .into());
        }

        Ok(Self {
            first_name: required(&session.first_name, SessionKey::FirstName)?,
            middle_initial: session.middle_initial.clone().unwrap_or_default(),
            last_name: required(&session.last_name, SessionKey::LastName)?,
            rent_or_own: required(&session.rent_or_own, SessionKey::RentOrOwn)?,
            in_payment_plan: required(&session.in_payment_plan, SessionKey::InPaymentPlan)?,
            has_past_due_balance: required(
                &session.has_past_due_balance,
                SessionKey::HasPastDueBalance,
            )?,
            street_address: required(&session.street_address, SessionKey::StreetAddress)?,
            apartment_unit: non_blank(&session.apartment_unit),
            zip_code: required(&session.zip_code, SessionKey::ZipCode)?,
            phone_number: required(&session.phone_number, SessionKey::PhoneNumber)?,
            email_address: non_blank(&session.email_address),
            signature: required(&session.signature, SessionKey::Signature)?,
            referral: session.referral.clone().filter(|referral| !referral.is_empty()),
        })
    }

    fn duplicate_filter(&self) -> AmnestyFilter {
        AmnestyFilter {
            first_name: Some(self.first_name.clone()),
            middle_initial: Some(self.middle_initial.clone()),
            last_name: Some(self.last_name.clone()),
            zip_code: Some(self.zip_code.clone()),
            phone_number: Some(self.phone_number.clone()),
            street_address: Some(self.street_address.clone()),
            rent_or_own: Some(self.rent_or_own),
            legal_agreement: Some(true),
            signature: Some(self.signature.clone()),
        }
    }

    fn apply_to(self, record: &mut ForgivenessApplication) {
        record.first_name = self.first_name;
        record.middle_initial = self.middle_initial;
        record.last_name = self.last_name;
        record.rent_or_own = self.rent_or_own;
        record.in_payment_plan = self.in_payment_plan;
        record.has_past_due_balance = self.has_past_due_balance;
        record.street_address = self.street_address;
        if let Some(apartment_unit) = self.apartment_unit {
            record.apartment_unit = Some(apartment_unit);
        }
        record.zip_code = self.zip_code;
        record.phone_number = self.phone_number;
        if let Some(email_address) = self.email_address {
            record.email_address = Some(email_address);
        }
        record.legal_agreement = true;
        record.signature = self.signature;
        if let Some(referral) = self.referral {
            record.referral = Some(referral);
        }
    }

    fn into_record(self, id: ForgivenessId) -> ForgivenessApplication {
        ForgivenessApplication {
            id,
            first_name: self.first_name,
            middle_initial: self.middle_initial,
            last_name: self.last_name,
            rent_or_own: self.rent_or_own,
            in_payment_plan: self.in_payment_plan,
            has_past_due_balance: self.has_past_due_balance,
            street_address: self.street_address,
            apartment_unit: self.apartment_unit,
            zip_code: self.zip_code,
            phone_number: self.phone_number,
            email_address: self.email_address,
            legal_agreement: true,
            signature: self.signature,
            referral: self.referral,
            status: ApplicationStatus::New,
            notes: String::new(),
            submitted_at: Utc::now(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Writes the record for a completed wizard and fires the "received" notification on
/// first creation.
pub struct ApplicationFinalizer {
    applications: Arc<dyn ApplicationRepository>,
    amnesty: Arc<dyn AmnestyRepository>,
    notifications: NotificationTrigger,
}

impl ApplicationFinalizer {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        amnesty: Arc<dyn AmnestyRepository>,
        notifications: NotificationTrigger,
    ) -> Self {
        Self {
            applications,
            amnesty,
            notifications,
        }
    }

    pub fn finalize(
        &self,
        session: &ApplicantSession,
    ) -> Result<FinalizedApplication, IntakeError> {
        let answers = DiscountAnswers::collect(session)?;
        let existing = self
            .applications
            .find(&answers.duplicate_filter())?
            .into_iter()
            .next();

        match existing {
            Some(mut record) => {
                answers.apply_to(&mut record);
                self.applications.update(record.clone())?;
                info!(application_id = %record.id, "application updated from resubmission");
                Ok(FinalizedApplication {
                    record,
                    created: false,
                })
            }
            None => {
                let record = self
                    .applications
                    .insert(answers.into_record(next_application_id()))?;
                info!(application_id = %record.id, "application created");
                self.notifications.application_received(&record);
                Ok(FinalizedApplication {
                    record,
                    created: true,
                })
            }
        }
    }

    pub fn finalize_amnesty(
        &self,
        session: &ApplicantSession,
    ) -> Result<FinalizedAmnesty, IntakeError> {
        let answers = AmnestyAnswers::collect(session)?;
        let existing = self
            .amnesty
            .find(&answers.duplicate_filter())?
            .into_iter()
            .next();

        match existing {
            Some(mut record) => {
                answers.apply_to(&mut record);
                self.amnesty.update(record.clone())?;
                info!(
                    forgiveness_id = %record.id,
                    "amnesty application updated from resubmission"
                );
                Ok(FinalizedAmnesty {
                    record,
                    created: false,
                })
            }
            None => {
                let record = self
                    .amnesty
                    .insert(answers.into_record(next_forgiveness_id()))?;
                info!(forgiveness_id = %record.id, "amnesty application created");
                self.notifications.amnesty_received(&record);
                Ok(FinalizedAmnesty {
                    record,
                    created: true,
                })
            }
        }
    }
}
