//! Finds an applicant's earlier discount application so a late document can be attached.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{ApplicationId, ApplicationRecord, RentOrOwn};
use super::forms::LateDocumentLookupForm;
use super::repository::{ApplicationFilter, ApplicationRepository, RepositoryError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupQuery {
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

impl From<LateDocumentLookupForm> for LookupQuery {
    fn from(form: LateDocumentLookupForm) -> Self {
        Self {
            first_name: form.first_name,
            last_name: form.last_name,
            zip_code: form.zip_code,
            phone_number: form.phone_number,
            middle_initial: form.middle_initial,
            email_address: form.email_address,
            rent_or_own: form.rent_or_own,
            street_address: form.street_address,
            household_size: form.household_size,
        }
    }
}

impl LookupQuery {
    fn base_filter(&self) -> ApplicationFilter {
        ApplicationFilter {
            first_name: Some(self.first_name.clone()),
            last_name: Some(self.last_name.clone()),
            zip_code: Some(self.zip_code.clone()),
            phone_number: Some(self.phone_number.clone()),
            ..ApplicationFilter::default()
        }
    }

    fn contact_filter(&self) -> Option<ApplicationFilter> {
        if self.middle_initial.is_none() && self.email_address.is_none() {
            return None;
        }
        Some(ApplicationFilter {
            middle_initial: self.middle_initial.clone(),
            email_address: self.email_address.clone(),
            ..ApplicationFilter::default()
        })
    }

    fn residence_filter(&self) -> Option<ApplicationFilter> {
        if self.rent_or_own.is_none()
            && self.street_address.is_none()
            && self.household_size.is_none()
        {
            return None;
        }
        Some(ApplicationFilter {
            rent_or_own: self.rent_or_own,
            street_address: self.street_address.clone(),
            household_size: self.household_size,
            ..ApplicationFilter::default()
        })
    }
}

/// Result of a lookup. Zero or several candidates are expected business outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "application_id", rename_all = "snake_case")]
pub enum LookupOutcome {
    Matched(ApplicationId),
    NoMatch,
    NeedMoreInfo,
}

/// Name, ZIP and phone first; then middle initial or email; then residence details.
pub fn lookup_existing(
    repository: &dyn ApplicationRepository,
    query: &LookupQuery,
) -> Result<LookupOutcome, RepositoryError> {
    let mut candidates = repository.find(&query.base_filter())?;
    debug!(candidates = candidates.len(), "late document lookup base pass");

    for narrowing in [query.contact_filter(), query.residence_filter()] {
        if candidates.len() <= 1 {
            break;
        }
        if let Some(filter) = narrowing {
            candidates = narrow(candidates, &filter);
            debug!(candidates = candidates.len(), "late document lookup narrowed");
        }
    }

    Ok(match candidates.as_slice() {
        [] => LookupOutcome::NoMatch,
        [record] => LookupOutcome::Matched(record.id),
        _ => LookupOutcome::NeedMoreInfo,
    })
}

fn narrow(candidates: Vec<ApplicationRecord>, filter: &ApplicationFilter) -> Vec<ApplicationRecord> {
    candidates
        .into_iter()
        .filter(|record| filter.matches(record))
        .collect()
}
