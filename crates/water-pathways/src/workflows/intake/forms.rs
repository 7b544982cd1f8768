//! Field-level validation for every wizard form.
//!
//! Each step posts a flat map of string fields. The typed forms below parse that map,
//! collect every field error at once, and only then hand a fully validated value to the
//! step graph. Messages mirror the wording applicants see next to each input.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{AccountHolder, Referral, RentOrOwn};
use super::income::{Cadence, IncomeMethod, PayPeriod, MAX_HOURS_PER_WEEK};

const MAX_NAME_LEN: usize = 100;
const MAX_MIDDLE_INITIAL_LEN: usize = 5;
const MAX_APARTMENT_LEN: usize = 10;
const MAX_ACCOUNT_NUMBER_LEN: usize = 30;
const MAX_STREET_LEN: usize = 200;
const MAX_CUSTOM_REFERRAL_LEN: usize = 60;
const MAX_SIGNATURE_LEN: usize = 200;

/// Raw urlencoded fields posted by one wizard step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormData(BTreeMap<String, String>);

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Trimmed value; blank inputs read as absent.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

impl From<HashMap<String, String>> for FormData {
    fn from(value: HashMap<String, String>) -> Self {
        Self(value.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// A user-correctable problem with one submitted field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Every field error raised by one form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn for_field(&self, field: &str) -> Option<&ValidationError> {
        self.0.iter().find(|error| error.field == field)
    }

    /// Record the error (if any) and hand back the parsed value.
    pub fn check<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.push(error);
                None
            }
        }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(value: ValidationError) -> Self {
        Self(vec![value])
    }
}

pub(crate) fn required_bool(
    data: &FormData,
    field: &'static str,
    message: &str,
) -> Result<bool, ValidationError> {
    data.get(field)
        .and_then(parse_bool)
        .ok_or_else(|| ValidationError::new(field, message))
}

/// Checkbox semantics: an absent field is `false`.
pub(crate) fn checkbox(data: &FormData, field: &'static str) -> Result<bool, ValidationError> {
    match data.get(field) {
        None => Ok(false),
        Some(raw) => parse_bool(raw)
            .ok_or_else(|| ValidationError::new(field, "Select yes or no.")),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub(crate) fn required_count(
    data: &FormData,
    field: &'static str,
    range: RangeInclusive<u8>,
    message: &str,
) -> Result<u8, ValidationError> {
    data.get(field)
        .and_then(|raw| raw.parse::<u8>().ok())
        .filter(|value| range.contains(value))
        .ok_or_else(|| ValidationError::new(field, message))
}

/// Dollar amount with an inclusive lower bound; accepts `$` and thousands separators.
pub(crate) fn required_amount(
    data: &FormData,
    field: &'static str,
    minimum: Decimal,
    message: &str,
) -> Result<Decimal, ValidationError> {
    let raw = data
        .get(field)
        .ok_or_else(|| ValidationError::new(field, message))?;
    let cleaned: String = raw
        .chars()
        .filter(|ch| *ch != '$' && *ch != ',')
        .collect();
    let amount = cleaned
        .trim()
        .parse::<Decimal>()
        .map_err(|_| ValidationError::new(field, "Enter a dollar amount such as 1250.00."))?;
    if amount < minimum {
        return Err(ValidationError::new(
            field,
            format!("Ensure this value is greater than or equal to {minimum}."),
        ));
    }
    Ok(amount)
}

pub(crate) fn required_text(
    data: &FormData,
    field: &'static str,
    max_len: usize,
    message: &str,
) -> Result<String, ValidationError> {
    let value = data
        .get(field)
        .ok_or_else(|| ValidationError::new(field, message))?;
    check_length(field, value, max_len)?;
    Ok(value.to_string())
}

pub(crate) fn optional_text(
    data: &FormData,
    field: &'static str,
    max_len: usize,
) -> Result<Option<String>, ValidationError> {
    match data.get(field) {
        None => Ok(None),
        Some(value) => {
            check_length(field, value, max_len)?;
            Ok(Some(value.to_string()))
        }
    }
}

fn check_length(field: &'static str, value: &str, max_len: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("Ensure this value has at most {max_len} characters."),
        ));
    }
    Ok(())
}

pub(crate) fn required_choice<T>(
    data: &FormData,
    field: &'static str,
    parse: fn(&str) -> Option<T>,
    message: &str,
) -> Result<T, ValidationError> {
    data.get(field)
        .and_then(parse)
        .ok_or_else(|| ValidationError::new(field, message))
}

/// Normalize a 10 digit phone number to `716-555-5555`.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let invalid = || {
        ValidationError::new(
            "phone_number",
            "Please use a valid 10 digit phone number such as 716-555-5555.",
        )
    };

    if !raw
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '(' | ')' | '-' | ' '))
    {
        return Err(invalid());
    }

    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 10 {
        return Err(invalid());
    }

    Ok(format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]))
}

pub(crate) fn phone_number(data: &FormData) -> Result<String, ValidationError> {
    let raw = data.get("phone_number").ok_or_else(|| {
        ValidationError::new("phone_number", "Make sure to provide a valid phone number.")
    })?;
    normalize_phone(raw)
}

pub(crate) fn zip_code(data: &FormData) -> Result<String, ValidationError> {
    data.get("zip_code")
        .filter(|raw| raw.len() == 5 && raw.chars().all(|ch| ch.is_ascii_digit()))
        .map(str::to_string)
        .ok_or_else(|| ValidationError::new("zip_code", "Make sure to provide a 5 digit ZIP code."))
}

/// A house number, then at least one word with a letter in it.
pub(crate) fn street_address(data: &FormData) -> Result<String, ValidationError> {
    let message = "Make sure to provide a street address.";
    let raw = data
        .get("street_address")
        .ok_or_else(|| ValidationError::new("street_address", message))?;
    check_length("street_address", raw, MAX_STREET_LEN)?;

    let mut parts = raw.split_whitespace();
    let has_number = parts
        .next()
        .and_then(|first| first.chars().next())
        .map(|ch| ch.is_ascii_digit())
        .unwrap_or(false);
    let has_street = parts.any(|word| word.chars().any(char::is_alphabetic));

    if has_number && has_street {
        Ok(raw.split_whitespace().collect::<Vec<_>>().join(" "))
    } else {
        Err(ValidationError::new(
            "street_address",
            "Make sure to provide a house number and street name, such as 123 Main St.",
        ))
    }
}

pub(crate) fn optional_email(data: &FormData) -> Result<Option<String>, ValidationError> {
    let Some(raw) = data.get("email_address") else {
        return Ok(None);
    };
    let valid = raw
        .split_once('@')
        .map(|(local, domain)| {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !raw.chars().any(char::is_whitespace)
        })
        .unwrap_or(false);
    if valid {
        Ok(Some(raw.to_string()))
    } else {
        Err(ValidationError::new(
            "email_address",
            "Enter a valid email address.",
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CityResidentForm {
    pub city_resident: bool,
}

impl CityResidentForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let city_resident = required_bool(
            data,
            "city_resident",
            "Make sure to indicate whether you live in the City of Buffalo.",
        )?;
        Ok(Self { city_resident })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HouseholdSizeForm {
    pub household_size: u8,
}

impl HouseholdSizeForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let household_size =
            required_count(data, "household_size", 1..=8, "Select your household size.")?;
        Ok(Self { household_size })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HouseholdBenefitsForm {
    pub has_household_benefits: bool,
}

impl HouseholdBenefitsForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let has_household_benefits = required_bool(
            data,
            "has_household_benefits",
            "Select whether anyone in your household receives benefits.",
        )?;
        Ok(Self {
            has_household_benefits,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HouseholdContributorsForm {
    pub household_contributors: u8,
}

impl HouseholdContributorsForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let household_contributors = required_count(
            data,
            "household_contributors",
            1..=8,
            "Select how many people contribute to household income.",
        )?;
        Ok(Self {
            household_contributors,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStatusForm {
    pub has_job: bool,
}

impl JobStatusForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let has_job = required_bool(data, "has_job", "Select your employment status.")?;
        Ok(Self { has_job })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfEmploymentForm {
    pub is_self_employed: bool,
}

impl SelfEmploymentForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let is_self_employed = required_bool(
            data,
            "is_self_employed",
            "Select your self-employment status.",
        )?;
        Ok(Self { is_self_employed })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberOfJobsForm {
    pub number_of_jobs: u8,
}

impl NumberOfJobsForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let number_of_jobs = required_count(
            data,
            "number_of_jobs",
            1..=12,
            "Select how many jobs you currently have.",
        )?;
        Ok(Self { number_of_jobs })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomeMethodsForm {
    pub income_method: IncomeMethod,
}

impl IncomeMethodsForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let income_method = required_choice(
            data,
            "income_method",
            IncomeMethod::parse,
            "Select how you would like to report your income.",
        )?;
        Ok(Self { income_method })
    }
}

/// Income amount plus its cadence; the accepted `pay_period` depends on the method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomeForm {
    pub income: Decimal,
    pub pay_period: Cadence,
}

impl IncomeForm {
    pub fn parse(data: &FormData, method: IncomeMethod) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let (income, pay_period) = match method {
            IncomeMethod::Hourly => {
                let wage = errors.check(required_amount(
                    data,
                    "income",
                    Decimal::new(1, 2),
                    "Be sure to provide an hourly wage.",
                ));
                let hours = errors.check(hours_per_week(data));
                (wage, hours.map(|hours_per_week| Cadence::Hourly { hours_per_week }))
            }
            IncomeMethod::Exact | IncomeMethod::Estimate => {
                let (income_message, period_message) = if method == IncomeMethod::Exact {
                    ("Be sure to provide your income before taxes", "Select a pay period")
                } else {
                    (
                        "Be sure to provide a household income.",
                        "Select how often your household makes this amount.",
                    )
                };
                let income = errors.check(required_amount(
                    data,
                    "income",
                    Decimal::ZERO,
                    income_message,
                ));
                let period = errors.check(required_choice(
                    data,
                    "pay_period",
                    PayPeriod::parse,
                    period_message,
                ));
                (income, period.map(Cadence::Periodic))
            }
        };

        let (Some(income), Some(pay_period)) = (income, pay_period) else {
            return Err(errors);
        };
        Ok(Self { income, pay_period })
    }
}

fn hours_per_week(data: &FormData) -> Result<u32, ValidationError> {
    let message = "Be sure to provide hours a week.";
    let raw = data
        .get("pay_period")
        .ok_or_else(|| ValidationError::new("pay_period", message))?;
    let hours = raw
        .parse::<i64>()
        .map_err(|_| ValidationError::new("pay_period", message))?;
    if !(1..=i64::from(MAX_HOURS_PER_WEEK)).contains(&hours) {
        return Err(ValidationError::new(
            "pay_period",
            format!("Hours a week must be between 1 and {MAX_HOURS_PER_WEEK}."),
        ));
    }
    u32::try_from(hours).map_err(|_| ValidationError::new("pay_period", message))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtherIncomeSourcesForm {
    pub has_other_income: bool,
}

impl OtherIncomeSourcesForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let has_other_income = required_bool(
            data,
            "has_other_income",
            "Select whether your household has other sources of income.",
        )?;
        Ok(Self { has_other_income })
    }
}

/// Monthly income from sources other than jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonJobIncomeForm {
    pub non_job_income: Decimal,
}

impl NonJobIncomeForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let non_job_income = required_amount(
            data,
            "non_job_income",
            Decimal::ZERO,
            "Be sure to provide your income from other sources.",
        )?;
        Ok(Self { non_job_income })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidentInfoForm {
    pub first_name: String,
    pub middle_initial: Option<String>,
    pub last_name: String,
    pub rent_or_own: RentOrOwn,
    pub account_holder: AccountHolder,
}

impl ResidentInfoForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let names = errors.check(parse_names(data));
        let rent_or_own = errors.check(required_choice(
            data,
            "rent_or_own",
            RentOrOwn::parse,
            "Make sure to indicate whether you own or rent.",
        ));
        let account_holder = errors.check(required_choice(
            data,
            "account_holder",
            AccountHolder::parse,
            "Make sure to indicate who officially pays the water bill.",
        ));

        let (Some((first_name, middle_initial, last_name)), Some(rent_or_own), Some(account_holder)) =
            (names, rent_or_own, account_holder)
        else {
            return Err(errors);
        };
        Ok(Self {
            first_name,
            middle_initial,
            last_name,
            rent_or_own,
            account_holder,
        })
    }
}

/// Applicant name triple shared by both wizards. Errors for both name fields are reported together.
fn parse_names(
    data: &FormData,
) -> Result<(String, Option<String>, String), ValidationError> {
    let first = required_text(
        data,
        "first_name",
        MAX_NAME_LEN,
        "Make sure to provide a first name.",
    )?;
    let middle = optional_text(data, "middle_initial", MAX_MIDDLE_INITIAL_LEN)?;
    let last = required_text(
        data,
        "last_name",
        MAX_NAME_LEN,
        "Make sure to provide a last name.",
    )?;
    Ok((first, middle, last))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressForm {
    pub street_address: String,
    pub apartment_unit: Option<String>,
    pub zip_code: String,
}

impl AddressForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let street_address = errors.check(street_address(data));
        let apartment_unit = errors.check(optional_text(data, "apartment_unit", MAX_APARTMENT_LEN));
        let zip_code = errors.check(zip_code(data));

        let (Some(street_address), Some(apartment_unit), Some(zip_code)) =
            (street_address, apartment_unit, zip_code)
        else {
            return Err(errors);
        };
        Ok(Self {
            street_address,
            apartment_unit,
            zip_code,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactInfoForm {
    pub phone_number: String,
    pub email_address: Option<String>,
}

impl ContactInfoForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let phone_number = errors.check(phone_number(data));
        let email_address = errors.check(optional_email(data));

        let (Some(phone_number), Some(email_address)) = (phone_number, email_address) else {
            return Err(errors);
        };
        Ok(Self {
            phone_number,
            email_address,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountHolderForm {
    pub account_first: String,
    pub account_middle: Option<String>,
    pub account_last: String,
}

impl AccountHolderForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let account_first = errors.check(required_text(
            data,
            "account_first",
            MAX_NAME_LEN,
            "Make sure to provide a first name.",
        ));
        let account_middle =
            errors.check(optional_text(data, "account_middle", MAX_MIDDLE_INITIAL_LEN));
        let account_last = errors.check(required_text(
            data,
            "account_last",
            MAX_NAME_LEN,
            "Make sure to provide a last name.",
        ));

        let (Some(account_first), Some(account_middle), Some(account_last)) =
            (account_first, account_middle, account_last)
        else {
            return Err(errors);
        };
        Ok(Self {
            account_first,
            account_middle,
            account_last,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountNumberForm {
    pub has_account_number: bool,
    pub account_number: Option<String>,
}

impl AccountNumberForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let has_account_number = required_bool(
            data,
            "has_account_number",
            "Select whether you know your water account number.",
        )?;
        if !has_account_number {
            return Ok(Self {
                has_account_number,
                account_number: None,
            });
        }

        let account_number = required_text(
            data,
            "account_number",
            MAX_ACCOUNT_NUMBER_LEN,
            "Make sure to provide your account number.",
        )?;
        Ok(Self {
            has_account_number,
            account_number: Some(account_number),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegalForm {
    pub legal_agreement: bool,
}

impl LegalForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let legal_agreement = checkbox(data, "legal_agreement")?;
        if !legal_agreement {
            return Err(ValidationError::new(
                "legal_agreement",
                "You must agree to the terms to continue.",
            )
            .into());
        }
        Ok(Self { legal_agreement })
    }
}

pub struct ReferralForm;

impl ReferralForm {
    pub fn parse(data: &FormData) -> Result<Referral, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let mut flag = |field| errors.check(checkbox(data, field)).unwrap_or(false);
        let mut referral = Referral {
            facebook: flag("facebook"),
            google: flag("google"),
            twitter: flag("twitter"),
            linkedin: flag("linkedin"),
            bill: flag("bill"),
            ad: flag("ad"),
            pamphlet: flag("pamphlet"),
            word_of_mouth: flag("word_of_mouth"),
            custom_referral: String::new(),
        };
        if let Some(custom) =
            errors.check(optional_text(data, "custom_referral", MAX_CUSTOM_REFERRAL_LEN))
        {
            referral.custom_referral = custom.unwrap_or_default();
        }

        if errors.is_empty() {
            Ok(referral)
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureForm {
    pub signature: String,
}

impl SignatureForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let signature = required_text(
            data,
            "signature",
            MAX_SIGNATURE_LEN,
            "Make sure to type your full legal name.",
        )?;
        Ok(Self { signature })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdditionalQuestionsForm {
    pub rent_or_own: RentOrOwn,
    pub has_past_due_balance: bool,
    pub in_payment_plan: bool,
}

impl AdditionalQuestionsForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let rent_or_own = errors.check(required_choice(
            data,
            "rent_or_own",
            RentOrOwn::parse,
            "Make sure to indicate whether you own or rent.",
        ));
        let has_past_due_balance = errors.check(required_bool(
            data,
            "has_past_due_balance",
            "Select whether your water account has a past due balance.",
        ));
        let in_payment_plan = errors.check(required_bool(
            data,
            "in_payment_plan",
            "Select whether you are currently in a payment plan.",
        ));

        let (Some(rent_or_own), Some(has_past_due_balance), Some(in_payment_plan)) =
            (rent_or_own, has_past_due_balance, in_payment_plan)
        else {
            return Err(errors);
        };
        Ok(Self {
            rent_or_own,
            has_past_due_balance,
            in_payment_plan,
        })
    }
}

/// Amnesty collects identity, address and contact details on a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmnestyResidentForm {
    pub first_name: String,
    pub middle_initial: Option<String>,
    pub last_name: String,
    pub address: AddressForm,
    pub contact: ContactInfoForm,
}

impl AmnestyResidentForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let names = errors.check(parse_names(data));
        let address = match AddressForm::parse(data) {
            Ok(address) => Some(address),
            Err(found) => {
                errors.0.extend(found.0);
                None
            }
        };
        let contact = match ContactInfoForm::parse(data) {
            Ok(contact) => Some(contact),
            Err(found) => {
                errors.0.extend(found.0);
                None
            }
        };

        let (Some((first_name, middle_initial, last_name)), Some(address), Some(contact)) =
            (names, address, contact)
        else {
            return Err(errors);
        };
        Ok(Self {
            first_name,
            middle_initial,
            last_name,
            address,
            contact,
        })
    }
}

/// Amnesty review page: agreement and typed signature in one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmnestyReviewForm {
    pub legal_agreement: bool,
    pub signature: String,
}

impl AmnestyReviewForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let legal = match LegalForm::parse(data) {
            Ok(form) => Some(form.legal_agreement),
            Err(found) => {
                errors.0.extend(found.0);
                None
            }
        };
        let signature = match SignatureForm::parse(data) {
            Ok(form) => Some(form.signature),
            Err(found) => {
                errors.0.extend(found.0);
                None
            }
        };

        let (Some(legal_agreement), Some(signature)) = (legal, signature) else {
            return Err(errors);
        };
        Ok(Self {
            legal_agreement,
            signature,
        })
    }
}

/// Identifying details used to find an earlier application for a late document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LateDocumentLookupForm {
    pub first_name: String,
    pub last_name: String,
    pub zip_code: String,
    pub phone_number: String,
    pub middle_initial: Option<String>,
    pub email_address: Option<String>,
    pub rent_or_own: Option<RentOrOwn>,
    pub street_address: Option<String>,
    pub household_size: Option<u8>,
}

impl LateDocumentLookupForm {
    pub fn parse(data: &FormData) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let names = errors.check(parse_names(data));
        let zip_code = errors.check(zip_code(data));
        let phone_number = errors.check(phone_number(data));
        let email_address = errors.check(optional_email(data));
        let rent_or_own = match data.get("rent_or_own") {
            None => Some(None),
            Some(_) => errors
                .check(required_choice(
                    data,
                    "rent_or_own",
                    RentOrOwn::parse,
                    "Make sure to indicate whether you own or rent.",
                ))
                .map(Some),
        };
        let street = match data.get("street_address") {
            None => Some(None),
            Some(_) => errors.check(street_address(data)).map(Some),
        };
        let household_size = match data.get("household_size") {
            None => Some(None),
            Some(_) => errors
                .check(required_count(
                    data,
                    "household_size",
                    1..=8,
                    "Select your household size.",
                ))
                .map(Some),
        };

        let (
            Some((first_name, middle_initial, last_name)),
            Some(zip_code),
            Some(phone_number),
            Some(email_address),
            Some(rent_or_own),
            Some(street_address),
            Some(household_size),
        ) = (
            names,
            zip_code,
            phone_number,
            email_address,
            rent_or_own,
            street,
            household_size,
        )
        else {
            return Err(errors);
        };

        Ok(Self {
            first_name,
            last_name,
            zip_code,
            phone_number,
            middle_initial,
            email_address,
            rent_or_own,
            street_address,
            household_size,
        })
    }
}
