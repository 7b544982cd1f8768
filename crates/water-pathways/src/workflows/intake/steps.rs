//! Step graph for the discount and amnesty wizards.
//!
//! Every step is described once by a [`StepSpec`]: whether it sits behind the wizard's
//! session marker, which earlier answers it depends on, the fields it accepts, how a valid
//! post is written into the [`ApplicantSession`], and where the applicant goes next.
//! The service layer only interprets these specs; no branching lives in the handlers.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::domain::AccountHolder;
use super::eligibility::EligibilityEvaluator;
use super::forms::{
    AccountHolderForm, AccountNumberForm, AddressForm, AdditionalQuestionsForm,
    AmnestyResidentForm, AmnestyReviewForm, CityResidentForm, ContactInfoForm, FormData,
    HouseholdBenefitsForm, HouseholdContributorsForm, HouseholdSizeForm, IncomeForm,
    IncomeMethodsForm, JobStatusForm, LegalForm, NonJobIncomeForm, NumberOfJobsForm,
    OtherIncomeSourcesForm, ReferralForm, ResidentInfoForm, SelfEmploymentForm, SignatureForm,
    ValidationErrors,
};
use super::income::{self, IncomeMethod};
use super::session::{required, ApplicantSession, MissingStateError, SessionKey, SessionMarker};

/// The two wizards served by the intake workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Program {
    Discount,
    Amnesty,
}

impl Program {
    pub const fn base_path(self) -> &'static str {
        match self {
            Program::Discount => "/apply",
            Program::Amnesty => "/amnesty",
        }
    }

    pub const fn start(self) -> Step {
        match self {
            Program::Discount => Step::Overview,
            Program::Amnesty => Step::AmnestyOverview,
        }
    }

    pub const fn marker(self) -> SessionMarker {
        match self {
            Program::Discount => SessionMarker::ActiveApplication,
            Program::Amnesty => SessionMarker::ForgivenessStarted,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Program::Discount => "discount",
            Program::Amnesty => "amnesty",
        }
    }

    /// Resolve a URL slug within this wizard.
    pub fn step(self, slug: &str) -> Option<Step> {
        Step::ALL
            .iter()
            .copied()
            .find(|step| step.program() == self && step.slug() == slug)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    Overview,
    CityResident,
    NonResident,
    HouseholdSize,
    HouseholdBenefits,
    HouseholdContributors,
    JobStatus,
    SelfEmployment,
    NumberOfJobs,
    IncomeMethods,
    Income,
    OtherIncomeSources,
    NonJobIncome,
    ReviewEligibility,
    Eligibility,
    Ineligible,
    ResidentInfo,
    Address,
    ContactInfo,
    AccountHolder,
    AccountNumber,
    ReviewApplication,
    Legal,
    Refer,
    Signature,
    DocumentsOverview,
    Confirmation,

    AmnestyOverview,
    AmnestyCityResident,
    AmnestyNonResident,
    AdditionalQuestions,
    AmnestyResidentInfo,
    Referral,
    AmnestyReview,
    AmnestyConfirmation,
}

impl Step {
    pub const ALL: [Step; 35] = [
        Step::Overview,
        Step::CityResident,
        Step::NonResident,
        Step::HouseholdSize,
        Step::HouseholdBenefits,
        Step::HouseholdContributors,
        Step::JobStatus,
        Step::SelfEmployment,
        Step::NumberOfJobs,
        Step::IncomeMethods,
        Step::Income,
        Step::OtherIncomeSources,
        Step::NonJobIncome,
        Step::ReviewEligibility,
        Step::Eligibility,
        Step::Ineligible,
        Step::ResidentInfo,
        Step::Address,
        Step::ContactInfo,
        Step::AccountHolder,
        Step::AccountNumber,
        Step::ReviewApplication,
        Step::Legal,
        Step::Refer,
        Step::Signature,
        Step::DocumentsOverview,
        Step::Confirmation,
        Step::AmnestyOverview,
        Step::AmnestyCityResident,
        Step::AmnestyNonResident,
        Step::AdditionalQuestions,
        Step::AmnestyResidentInfo,
        Step::Referral,
        Step::AmnestyReview,
        Step::AmnestyConfirmation,
    ];

    pub const fn program(self) -> Program {
        match self {
            Step::AmnestyOverview
            | Step::AmnestyCityResident
            | Step::AmnestyNonResident
            | Step::AdditionalQuestions
            | Step::AmnestyResidentInfo
            | Step::Referral
            | Step::AmnestyReview
            | Step::AmnestyConfirmation => Program::Amnesty,
            _ => Program::Discount,
        }
    }

    pub const fn slug(self) -> &'static str {
        match self {
            Step::Overview | Step::AmnestyOverview => "overview",
            Step::CityResident | Step::AmnestyCityResident => "city-resident",
            Step::NonResident | Step::AmnestyNonResident => "non-resident",
            Step::HouseholdSize => "household-size",
            Step::HouseholdBenefits => "household-benefits",
            Step::HouseholdContributors => "household-contributors",
            Step::JobStatus => "job-status",
            Step::SelfEmployment => "self-employment",
            Step::NumberOfJobs => "number-of-jobs",
            Step::IncomeMethods => "income-methods",
            Step::Income => "income",
            Step::OtherIncomeSources => "other-income-sources",
            Step::NonJobIncome => "non-job-income",
            Step::ReviewEligibility => "review-eligibility",
            Step::Eligibility => "eligibility",
            Step::Ineligible => "ineligible",
            Step::ResidentInfo | Step::AmnestyResidentInfo => "resident-info",
            Step::Address => "address",
            Step::ContactInfo => "contact-info",
            Step::AccountHolder => "account-holder",
            Step::AccountNumber => "account-number",
            Step::ReviewApplication => "review-application",
            Step::Legal => "legal",
            Step::Refer => "refer",
            Step::Signature => "signature",
            Step::DocumentsOverview => "documents-overview",
            Step::Confirmation | Step::AmnestyConfirmation => "confirmation",
            Step::AdditionalQuestions => "additional-questions",
            Step::Referral => "referral",
            Step::AmnestyReview => "review",
        }
    }

    pub fn path(self) -> String {
        format!("{}/{}", self.program().base_path(), self.slug())
    }

    /// The transition table. Each arm lists the step's guard, prerequisites, fields,
    /// session writer and successor.
    pub fn spec(self) -> StepSpec {
        let spec = StepSpec::new(self);
        match self {
            Step::Overview => spec.goes_to(Step::CityResident),
            Step::CityResident => spec
                .form(&["city_resident"], record_city_residency)
                .branches(after_city_residency),
            Step::NonResident | Step::Ineligible | Step::AmnestyNonResident => spec,
            Step::HouseholdSize => spec
                .form(&["household_size"], record_household_size)
                .goes_to(Step::HouseholdBenefits),
            Step::HouseholdBenefits => spec
                .guarded()
                .requires(&[SessionKey::HouseholdSize])
                .form(&["has_household_benefits"], record_household_benefits)
                .branches(after_household_benefits),
            Step::HouseholdContributors => spec
                .guarded()
                .form(&["household_contributors"], record_household_contributors)
                .branches(after_household_contributors),
            Step::JobStatus => spec
                .guarded()
                .form(&["has_job"], record_job_status)
                .goes_to(Step::SelfEmployment),
            Step::SelfEmployment => spec
                .guarded()
                .requires(&[SessionKey::HasJob])
                .form(&["is_self_employed"], record_self_employment)
                .branches(after_self_employment),
            Step::NumberOfJobs => spec
                .guarded()
                .form(&["number_of_jobs"], record_number_of_jobs)
                .branches(after_number_of_jobs),
            Step::IncomeMethods => spec
                .guarded()
                .form(&["income_method"], record_income_method)
                .goes_to(Step::Income),
            Step::Income => spec
                .guarded()
                .requires(&[SessionKey::IncomeMethod])
                .form(&["income", "pay_period"], record_income)
                .with_context(income_context)
                .goes_to(Step::OtherIncomeSources),
            Step::OtherIncomeSources => spec
                .guarded()
                .form(&["has_other_income"], record_other_income_sources)
                .branches(after_other_income_sources),
            Step::NonJobIncome => spec
                .guarded()
                .form(&["non_job_income"], record_non_job_income)
                .goes_to(Step::ReviewEligibility),
            Step::ReviewEligibility => spec
                .guarded()
                .with_context(review_eligibility_context)
                .goes_to(Step::Eligibility),
            Step::Eligibility => spec
                .guarded()
                .requires(&[SessionKey::HouseholdSize, SessionKey::HasHouseholdBenefits])
                .requires_income_unless_benefits()
                .with_context(eligibility_context)
                .branches(after_eligibility),
            Step::ResidentInfo => spec
                .guarded()
                .form(
                    &[
                        "first_name",
                        "middle_initial",
                        "last_name",
                        "rent_or_own",
                        "account_holder",
                    ],
                    record_resident_info,
                )
                .goes_to(Step::Address),
            Step::Address => spec
                .guarded()
                .form(
                    &["street_address", "apartment_unit", "zip_code"],
                    record_address,
                )
                .goes_to(Step::ContactInfo),
            Step::ContactInfo => spec
                .guarded()
                .requires(&[SessionKey::AccountHolder])
                .form(&["phone_number", "email_address"], record_contact_info)
                .branches(after_contact_info),
            Step::AccountHolder => spec
                .guarded()
                .form(
                    &["account_first", "account_middle", "account_last"],
                    record_account_holder,
                )
                .goes_to(Step::AccountNumber),
            Step::AccountNumber => spec
                .guarded()
                .form(
                    &["has_account_number", "account_number"],
                    record_account_number,
                )
                .goes_to(Step::ReviewApplication),
            Step::ReviewApplication => spec
                .guarded()
                .with_context(review_application_context)
                .goes_to(Step::Legal),
            Step::Legal => spec
                .guarded()
                .form(&["legal_agreement"], record_legal_agreement)
                .goes_to(Step::Refer),
            Step::Refer => spec
                .guarded()
                .form(REFERRAL_FIELDS, record_referral)
                .goes_to(Step::Signature),
            Step::Signature => spec
                .guarded()
                .requires(&[SessionKey::LegalAgreement])
                .form(&["signature"], record_signature)
                .commits(Commit::DiscountApplication)
                .goes_to(Step::DocumentsOverview),
            Step::DocumentsOverview => spec
                .guarded()
                .requires(&[SessionKey::ApplicationId])
                .goes_to(Step::Confirmation),
            Step::Confirmation => spec
                .guarded()
                .requires(&[SessionKey::ApplicationId])
                .with_context(confirmation_context),

            Step::AmnestyOverview => spec.goes_to(Step::AmnestyCityResident),
            Step::AmnestyCityResident => spec
                .form(&["city_resident"], record_amnesty_city_residency)
                .branches(after_amnesty_city_residency),
            Step::AdditionalQuestions => spec
                .guarded()
                .form(
                    &["rent_or_own", "has_past_due_balance", "in_payment_plan"],
                    record_additional_questions,
                )
                .goes_to(Step::AmnestyResidentInfo),
            Step::AmnestyResidentInfo => spec
                .guarded()
                .form(
                    &[
                        "first_name",
                        "middle_initial",
                        "last_name",
                        "street_address",
                        "apartment_unit",
                        "zip_code",
                        "phone_number",
                        "email_address",
                    ],
                    record_amnesty_resident_info,
                )
                .goes_to(Step::Referral),
            Step::Referral => spec
                .guarded()
                .form(REFERRAL_FIELDS, record_referral)
                .goes_to(Step::AmnestyReview),
            Step::AmnestyReview => spec
                .guarded()
                .with_context(amnesty_review_context)
                .form(&["legal_agreement", "signature"], record_amnesty_review)
                .commits(Commit::AmnestyApplication)
                .goes_to(Step::AmnestyConfirmation),
            Step::AmnestyConfirmation => spec
                .guarded()
                .requires(&[SessionKey::ForgivenessId]),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.program().label(), self.slug())
    }
}

const REFERRAL_FIELDS: &[&str] = &[
    "facebook",
    "google",
    "twitter",
    "linkedin",
    "bill",
    "ad",
    "pamphlet",
    "word_of_mouth",
    "custom_referral",
];

/// Collaborators available to branch and context functions.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub evaluator: &'a EligibilityEvaluator,
}

pub type ApplyFn = fn(&FormData, &mut ApplicantSession) -> Result<(), StepError>;
pub type BranchFn =
    fn(&ApplicantSession, &StepContext<'_>) -> Result<Step, MissingStateError>;
pub type ContextFn = fn(&ApplicantSession, &StepContext<'_>) -> Value;

#[derive(Debug, Clone, Copy)]
pub enum Transition {
    /// Nothing follows; posts re-render the step.
    Terminal,
    To(Step),
    Branch(BranchFn),
}

/// Durable record written when a step's post succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    DiscountApplication,
    AmnestyApplication,
}

#[derive(Debug, Clone, Copy)]
pub struct StepSpec {
    pub step: Step,
    pub guarded: bool,
    pub requires: &'static [SessionKey],
    /// Households without benefits must have finished the income questions.
    pub requires_income: bool,
    pub fields: &'static [&'static str],
    pub apply: Option<ApplyFn>,
    pub transition: Transition,
    pub commit: Option<Commit>,
    pub context: Option<ContextFn>,
}

impl StepSpec {
    fn new(step: Step) -> Self {
        Self {
            step,
            guarded: false,
            requires: &[],
            requires_income: false,
            fields: &[],
            apply: None,
            transition: Transition::Terminal,
            commit: None,
            context: None,
        }
    }

    fn guarded(mut self) -> Self {
        self.guarded = true;
        self
    }

    fn requires(mut self, keys: &'static [SessionKey]) -> Self {
        self.requires = keys;
        self
    }

    fn requires_income_unless_benefits(mut self) -> Self {
        self.requires_income = true;
        self
    }

    fn form(mut self, fields: &'static [&'static str], apply: ApplyFn) -> Self {
        self.fields = fields;
        self.apply = Some(apply);
        self
    }

    fn goes_to(mut self, next: Step) -> Self {
        self.transition = Transition::To(next);
        self
    }

    fn branches(mut self, next: BranchFn) -> Self {
        self.transition = Transition::Branch(next);
        self
    }

    fn commits(mut self, commit: Commit) -> Self {
        self.commit = Some(commit);
        self
    }

    fn with_context(mut self, context: ContextFn) -> Self {
        self.context = Some(context);
        self
    }

    /// Where a successful post leads; `None` for terminal steps.
    pub fn next(
        &self,
        session: &ApplicantSession,
        ctx: &StepContext<'_>,
    ) -> Result<Option<Step>, MissingStateError> {
        match self.transition {
            Transition::Terminal => Ok(None),
            Transition::To(step) => Ok(Some(step)),
            Transition::Branch(branch) => branch(session, ctx).map(Some),
        }
    }

    pub fn context(&self, session: &ApplicantSession, ctx: &StepContext<'_>) -> Value {
        self.context
            .map(|render| render(session, ctx))
            .unwrap_or(Value::Null)
    }
}

/// Why a step refused to run for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GuardViolation {
    #[error("session has no '{}' marker", .0.key())]
    MarkerMissing(SessionMarker),
    #[error(transparent)]
    MissingState(#[from] MissingStateError),
}

/// Redirect-to-start check run before a step renders or accepts a post.
pub fn guard(spec: &StepSpec, session: &ApplicantSession) -> Result<(), GuardViolation> {
    let marker = spec.step.program().marker();
    if spec.guarded && !session.has_marker(marker) {
        return Err(GuardViolation::MarkerMissing(marker));
    }
    if let Some(key) = session.missing(spec.requires) {
        return Err(MissingStateError { key }.into());
    }
    if spec.requires_income
        && session.has_household_benefits == Some(false)
        && !session.contains(SessionKey::AnnualIncome)
    {
        return Err(MissingStateError {
            key: SessionKey::AnnualIncome,
        }
        .into());
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    MissingState(#[from] MissingStateError),
}

fn record_city_residency(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = CityResidentForm::parse(data)?;
    session.city_resident = Some(form.city_resident);
    Ok(())
}

fn after_city_residency(
    session: &ApplicantSession,
    _: &StepContext<'_>,
) -> Result<Step, MissingStateError> {
    if required(&session.city_resident, SessionKey::CityResident)? {
        Ok(Step::HouseholdSize)
    } else {
        Ok(Step::NonResident)
    }
}

fn record_amnesty_city_residency(
    data: &FormData,
    session: &mut ApplicantSession,
) -> Result<(), StepError> {
    record_city_residency(data, session)?;
    if session.city_resident == Some(true) {
        session.set_marker(SessionMarker::ForgivenessStarted);
    }
    Ok(())
}

fn after_amnesty_city_residency(
    session: &ApplicantSession,
    ctx: &StepContext<'_>,
) -> Result<Step, MissingStateError> {
    Ok(match after_city_residency(session, ctx)? {
        Step::HouseholdSize => Step::AdditionalQuestions,
        _ => Step::AmnestyNonResident,
    })
}

fn record_household_size(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = HouseholdSizeForm::parse(data)?;
    session.household_size = Some(form.household_size);
    session.set_marker(SessionMarker::ActiveApplication);
    Ok(())
}

fn record_household_benefits(
    data: &FormData,
    session: &mut ApplicantSession,
) -> Result<(), StepError> {
    let form = HouseholdBenefitsForm::parse(data)?;
    session.has_household_benefits = Some(form.has_household_benefits);
    Ok(())
}

fn after_household_benefits(
    session: &ApplicantSession,
    _: &StepContext<'_>,
) -> Result<Step, MissingStateError> {
    if required(&session.has_household_benefits, SessionKey::HasHouseholdBenefits)? {
        Ok(Step::Eligibility)
    } else {
        Ok(Step::HouseholdContributors)
    }
}

fn record_household_contributors(
    data: &FormData,
    session: &mut ApplicantSession,
) -> Result<(), StepError> {
    let form = HouseholdContributorsForm::parse(data)?;
    session.household_contributors = Some(form.household_contributors);
    session.income_method = if form.household_contributors > 1 {
        Some(IncomeMethod::Estimate)
    } else {
        None
    };
    Ok(())
}

fn after_household_contributors(
    session: &ApplicantSession,
    _: &StepContext<'_>,
) -> Result<Step, MissingStateError> {
    if required(&session.household_contributors, SessionKey::HouseholdContributors)? == 1 {
        Ok(Step::JobStatus)
    } else {
        Ok(Step::Income)
    }
}

fn record_job_status(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = JobStatusForm::parse(data)?;
    session.has_job = Some(form.has_job);
    Ok(())
}

fn record_self_employment(
    data: &FormData,
    session: &mut ApplicantSession,
) -> Result<(), StepError> {
    let form = SelfEmploymentForm::parse(data)?;
    session.is_self_employed = Some(form.is_self_employed);
    if session.has_job != Some(true) && !form.is_self_employed {
        session.income_method = None;
        session.income = None;
        session.pay_period = None;
        session.earned_annual_income = None;
        session.annual_income = None;
    }
    Ok(())
}

fn after_self_employment(
    session: &ApplicantSession,
    _: &StepContext<'_>,
) -> Result<Step, MissingStateError> {
    let has_job = required(&session.has_job, SessionKey::HasJob)?;
    let self_employed = required(&session.is_self_employed, SessionKey::IsSelfEmployed)?;
    if has_job || self_employed {
        Ok(Step::NumberOfJobs)
    } else {
        Ok(Step::OtherIncomeSources)
    }
}

fn record_number_of_jobs(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = NumberOfJobsForm::parse(data)?;
    session.number_of_jobs = Some(form.number_of_jobs);
    session.income_method = if form.number_of_jobs > 1 {
        Some(IncomeMethod::Estimate)
    } else {
        None
    };
    Ok(())
}

fn after_number_of_jobs(
    session: &ApplicantSession,
    _: &StepContext<'_>,
) -> Result<Step, MissingStateError> {
    if required(&session.number_of_jobs, SessionKey::NumberOfJobs)? == 1 {
        Ok(Step::IncomeMethods)
    } else {
        Ok(Step::Income)
    }
}

fn record_income_method(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = IncomeMethodsForm::parse(data)?;
    session.income_method = Some(form.income_method);
    Ok(())
}

fn record_income(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let method = required(&session.income_method, SessionKey::IncomeMethod)?;
    let form = IncomeForm::parse(data, method)?;
    let annual = income::annualize(form.income, form.pay_period).map_err(ValidationErrors::from)?;

    session.income = Some(form.income);
    session.pay_period = Some(form.pay_period);
    session.earned_annual_income = Some(annual);
    session.annual_income = Some(annual);
    Ok(())
}

fn income_context(session: &ApplicantSession, _: &StepContext<'_>) -> Value {
    json!({
        "income_method": session.income_method.map(IncomeMethod::label),
    })
}

fn record_other_income_sources(
    data: &FormData,
    session: &mut ApplicantSession,
) -> Result<(), StepError> {
    let form = OtherIncomeSourcesForm::parse(data)?;
    session.has_other_income = Some(form.has_other_income);
    if !form.has_other_income {
        session.non_job_income = None;
        session.annual_income = Some(session.earned_annual_income.unwrap_or(Decimal::ZERO));
    }
    Ok(())
}

fn after_other_income_sources(
    session: &ApplicantSession,
    _: &StepContext<'_>,
) -> Result<Step, MissingStateError> {
    if required(&session.has_other_income, SessionKey::HasOtherIncome)? {
        Ok(Step::NonJobIncome)
    } else {
        Ok(Step::ReviewEligibility)
    }
}

/// Non-job income is reported monthly and added on top of any job income.
fn record_non_job_income(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = NonJobIncomeForm::parse(data)?;
    let annual_other =
        income::annualize_monthly(form.non_job_income).map_err(ValidationErrors::from)?;

    session.non_job_income = Some(form.non_job_income);
    session.annual_income = Some(match session.earned_annual_income {
        Some(earned) => earned + annual_other,
        None => annual_other,
    });
    Ok(())
}

fn review_eligibility_context(session: &ApplicantSession, _: &StepContext<'_>) -> Value {
    json!({
        "income": dollars(session.income),
        "annual_income": dollars(session.annual_income),
        "non_job_income": dollars(session.non_job_income),
    })
}

fn dollars(amount: Option<Decimal>) -> String {
    format!("${:.2}", amount.unwrap_or(Decimal::ZERO))
}

fn after_eligibility(
    session: &ApplicantSession,
    ctx: &StepContext<'_>,
) -> Result<Step, MissingStateError> {
    let household_size = required(&session.household_size, SessionKey::HouseholdSize)?;
    let benefits = required(&session.has_household_benefits, SessionKey::HasHouseholdBenefits)?;
    let annual_income = if benefits {
        Decimal::ZERO
    } else {
        required(&session.annual_income, SessionKey::AnnualIncome)?
    };

    if ctx
        .evaluator
        .is_eligible(benefits, household_size, annual_income)
    {
        Ok(Step::ResidentInfo)
    } else {
        Ok(Step::Ineligible)
    }
}

fn eligibility_context(session: &ApplicantSession, ctx: &StepContext<'_>) -> Value {
    let (Some(household_size), Some(benefits)) =
        (session.household_size, session.has_household_benefits)
    else {
        return Value::Null;
    };
    let decision = ctx
        .evaluator
        .evaluate(benefits, household_size, session.annual_income);
    json!({
        "eligible": decision.eligible,
        "summary": decision.summary(),
        "decision": decision,
    })
}

fn record_resident_info(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = ResidentInfoForm::parse(data)?;
    session.first_name = Some(form.first_name);
    session.middle_initial = form.middle_initial;
    session.last_name = Some(form.last_name);
    session.rent_or_own = Some(form.rent_or_own);
    session.account_holder = Some(form.account_holder);
    Ok(())
}

fn record_address(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = AddressForm::parse(data)?;
    session.street_address = Some(form.street_address);
    session.apartment_unit = form.apartment_unit;
    session.zip_code = Some(form.zip_code);
    Ok(())
}

fn record_contact_info(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = ContactInfoForm::parse(data)?;
    session.phone_number = Some(form.phone_number);
    session.email_address = form.email_address;
    Ok(())
}

fn after_contact_info(
    session: &ApplicantSession,
    _: &StepContext<'_>,
) -> Result<Step, MissingStateError> {
    match required(&session.account_holder, SessionKey::AccountHolder)? {
        AccountHolder::Me => Ok(Step::AccountNumber),
        AccountHolder::Landlord | AccountHolder::Other => Ok(Step::AccountHolder),
    }
}

fn record_account_holder(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = AccountHolderForm::parse(data)?;
    session.account_first = Some(form.account_first);
    session.account_middle = form.account_middle;
    session.account_last = Some(form.account_last);
    Ok(())
}

fn record_account_number(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = AccountNumberForm::parse(data)?;
    session.has_account_number = Some(form.has_account_number);
    session.account_number = form.account_number;
    Ok(())
}

fn review_application_context(session: &ApplicantSession, ctx: &StepContext<'_>) -> Value {
    json!({
        "household_size": session.household_size,
        "has_household_benefits": session.has_household_benefits,
        "annual_income": session
            .has_household_benefits
            .filter(|benefits| !benefits)
            .map(|_| dollars(session.annual_income)),
        "eligibility": eligibility_context(session, ctx),
        "first_name": session.first_name,
        "middle_initial": session.middle_initial,
        "last_name": session.last_name,
        "rent_or_own": session.rent_or_own,
        "street_address": session.street_address,
        "apartment_unit": session.apartment_unit,
        "zip_code": session.zip_code,
        "phone_number": session.phone_number,
        "email_address": session.email_address,
        "account_holder": session.account_holder,
        "account_number": session.account_number,
    })
}

fn record_legal_agreement(
    data: &FormData,
    session: &mut ApplicantSession,
) -> Result<(), StepError> {
    let form = LegalForm::parse(data)?;
    session.legal_agreement = Some(form.legal_agreement);
    Ok(())
}

fn record_referral(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let referral = ReferralForm::parse(data)?;
    session.referral = Some(referral);
    Ok(())
}

fn record_signature(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = SignatureForm::parse(data)?;
    session.signature = Some(form.signature);
    Ok(())
}

fn confirmation_context(session: &ApplicantSession, _: &StepContext<'_>) -> Value {
    json!({
        "application_id": session.application_id,
        "email_address": session.email_address,
    })
}

fn record_additional_questions(
    data: &FormData,
    session: &mut ApplicantSession,
) -> Result<(), StepError> {
    let form = AdditionalQuestionsForm::parse(data)?;
    session.rent_or_own = Some(form.rent_or_own);
    session.has_past_due_balance = Some(form.has_past_due_balance);
    session.in_payment_plan = Some(form.in_payment_plan);
    Ok(())
}

fn record_amnesty_resident_info(
    data: &FormData,
    session: &mut ApplicantSession,
) -> Result<(), StepError> {
    let form = AmnestyResidentForm::parse(data)?;
    session.first_name = Some(form.first_name);
    session.middle_initial = form.middle_initial;
    session.last_name = Some(form.last_name);
    session.street_address = Some(form.address.street_address);
    session.apartment_unit = form.address.apartment_unit;
    session.zip_code = Some(form.address.zip_code);
    session.phone_number = Some(form.contact.phone_number);
    session.email_address = form.contact.email_address;
    Ok(())
}

fn amnesty_review_context(session: &ApplicantSession, _: &StepContext<'_>) -> Value {
    json!({
        "first_name": session.first_name,
        "middle_initial": session.middle_initial,
        "last_name": session.last_name,
        "rent_or_own": session.rent_or_own,
        "has_past_due_balance": session.has_past_due_balance,
        "in_payment_plan": session.in_payment_plan,
        "street_address": session.street_address,
        "apartment_unit": session.apartment_unit,
        "zip_code": session.zip_code,
        "phone_number": session.phone_number,
        "email_address": session.email_address,
    })
}

fn record_amnesty_review(data: &FormData, session: &mut ApplicantSession) -> Result<(), StepError> {
    let form = AmnestyReviewForm::parse(data)?;
    session.legal_agreement = Some(form.legal_agreement);
    session.signature = Some(form.signature);
    Ok(())
}
