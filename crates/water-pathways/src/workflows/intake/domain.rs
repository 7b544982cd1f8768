use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for discount applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub u64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for amnesty (forgiveness) applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForgivenessId(pub u64);

impl fmt::Display for ForgivenessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

/// Staff review status shared by both application types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    New,
    InProgress,
    Enrolled,
    Denied,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::New => "new",
            ApplicationStatus::InProgress => "in_progress",
            ApplicationStatus::Enrolled => "enrolled",
            ApplicationStatus::Denied => "denied",
        }
    }

    /// Documents are only retained while staff may still need them.
    pub const fn retains_documents(self) -> bool {
        matches!(self, ApplicationStatus::New | ApplicationStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentOrOwn {
    Rent,
    Own,
}

impl RentOrOwn {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rent" => Some(Self::Rent),
            "own" => Some(Self::Own),
            _ => None,
        }
    }
}

/// Who is named on the water bill relative to the applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountHolder {
    Me,
    Landlord,
    Other,
}

impl AccountHolder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "me" => Some(Self::Me),
            "landlord" => Some(Self::Landlord),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// How the applicant heard about the program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub facebook: bool,
    pub google: bool,
    pub twitter: bool,
    pub linkedin: bool,
    pub bill: bool,
    pub ad: bool,
    pub pamphlet: bool,
    pub word_of_mouth: bool,
    pub custom_referral: String,
}

impl Referral {
    pub fn is_empty(&self) -> bool {
        !(self.facebook
            || self.google
            || self.twitter
            || self.linkedin
            || self.bill
            || self.ad
            || self.pamphlet
            || self.word_of_mouth)
            && self.custom_referral.is_empty()
    }
}

/// Durable discount application assembled from a completed wizard session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub household_size: u8,
    pub has_household_benefits: bool,
    /// Absent when the household qualified through benefits.
    pub annual_income: Option<Decimal>,
    pub first_name: String,
    pub middle_initial: String,
    pub last_name: String,
    pub rent_or_own: RentOrOwn,
    pub street_address: String,
    pub apartment_unit: Option<String>,
    pub zip_code: String,
    pub phone_number: String,
    pub email_address: Option<String>,
    pub account_holder: AccountHolder,
    pub account_first: String,
    pub account_middle: String,
    pub account_last: String,
    pub account_number: Option<String>,
    pub legal_agreement: bool,
    pub signature: String,
    pub referral: Option<Referral>,
    pub status: ApplicationStatus,
    pub notes: String,
    pub submitted_at: DateTime<Utc>,
}

impl ApplicationRecord {
    pub fn email(&self) -> Option<&str> {
        self.email_address
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

impl fmt::Display for ApplicationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} at {}", self.id, self.last_name, self.street_address)
    }
}

/// Durable amnesty application; shares identity and residency fields but no billing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForgivenessApplication {
    pub id: ForgivenessId,
    pub first_name: String,
    pub middle_initial: String,
    pub last_name: String,
    pub rent_or_own: RentOrOwn,
    pub in_payment_plan: bool,
    pub has_past_due_balance: bool,
    pub street_address: String,
    pub apartment_unit: Option<String>,
    pub zip_code: String,
    pub phone_number: String,
    pub email_address: Option<String>,
    pub legal_agreement: bool,
    pub signature: String,
    pub referral: Option<Referral>,
    pub status: ApplicationStatus,
    pub notes: String,
    pub submitted_at: DateTime<Utc>,
}

impl ForgivenessApplication {
    pub fn email(&self) -> Option<&str> {
        self.email_address
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

impl fmt::Display for ForgivenessApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} at {}", self.id, self.last_name, self.street_address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Income,
    Benefits,
    Residence,
}

impl DocumentType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" => Some(Self::Income),
            "benefits" => Some(Self::Benefits),
            "residence" => Some(Self::Residence),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DocumentType::Income => "income",
            DocumentType::Benefits => "benefits",
            DocumentType::Residence => "residence",
        }
    }
}

/// Proof attached to an application; the bytes live in external storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub application_id: ApplicationId,
    pub doc_type: DocumentType,
    pub storage_key: String,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}
