use chrono::Utc;
use rust_decimal::Decimal;

use super::common::*;
use crate::workflows::intake::domain::{
    AccountHolder, ApplicationId, ApplicationRecord, ApplicationStatus, RentOrOwn,
};
use crate::workflows::intake::lookup::{lookup_existing, LookupOutcome, LookupQuery};
use crate::workflows::intake::repository::ApplicationRepository;
use crate::workflows::intake::service::StepOutcome;
use crate::workflows::intake::session::SessionId;

pub(super) fn stored_application(id: u64, middle_initial: &str, street: &str) -> ApplicationRecord {
    ApplicationRecord {
        id: ApplicationId(id),
        household_size: 3,
        has_household_benefits: false,
        annual_income: Some(Decimal::from(40_000)),
        first_name: "Ana".to_string(),
        middle_initial: middle_initial.to_string(),
        last_name: "Diaz".to_string(),
        rent_or_own: RentOrOwn::Rent,
        street_address: street.to_string(),
        apartment_unit: None,
        zip_code: "14201".to_string(),
        phone_number: "716-555-1234".to_string(),
        email_address: None,
        account_holder: AccountHolder::Me,
        account_first: "Ana".to_string(),
        account_middle: middle_initial.to_string(),
        account_last: "Diaz".to_string(),
        account_number: None,
        legal_agreement: true,
        signature: "Ana Diaz".to_string(),
        referral: None,
        status: ApplicationStatus::New,
        notes: String::new(),
        submitted_at: Utc::now(),
    }
}

fn query() -> LookupQuery {
    LookupQuery {
        first_name: "ana".to_string(),
        last_name: "DIAZ".to_string(),
        zip_code: "14201".to_string(),
        phone_number: "716-555-1234".to_string(),
        ..LookupQuery::default()
    }
}

#[test]
fn single_candidate_matches_case_insensitively() {
    let harness = Harness::new();
    harness
        .applications
        .insert(stored_application(11, "", "123 Main St"))
        .expect("insert");

    let outcome = lookup_existing(harness.applications.as_ref(), &query()).expect("lookup");

    assert_eq!(outcome, LookupOutcome::Matched(ApplicationId(11)));
}

#[test]
fn unknown_applicant_is_no_match() {
    let harness = Harness::new();
    harness
        .applications
        .insert(stored_application(11, "", "123 Main St"))
        .expect("insert");

    let outcome = lookup_existing(
        harness.applications.as_ref(),
        &LookupQuery {
            zip_code: "14202".to_string(),
            ..query()
        },
    )
    .expect("lookup");

    assert_eq!(outcome, LookupOutcome::NoMatch);
}

#[test]
fn middle_initial_separates_namesakes() {
    let harness = Harness::new();
    for (id, middle) in [(11, "M"), (12, "R")] {
        harness
            .applications
            .insert(stored_application(id, middle, "123 Main St"))
            .expect("insert");
    }

    let ambiguous = lookup_existing(harness.applications.as_ref(), &query()).expect("lookup");
    let narrowed = lookup_existing(
        harness.applications.as_ref(),
        &LookupQuery {
            middle_initial: Some("r".to_string()),
            ..query()
        },
    )
    .expect("lookup");

    assert_eq!(ambiguous, LookupOutcome::NeedMoreInfo);
    assert_eq!(narrowed, LookupOutcome::Matched(ApplicationId(12)));
}

#[test]
fn residence_details_break_remaining_ties() {
    let harness = Harness::new();
    harness
        .applications
        .insert(stored_application(11, "", "123 Main St"))
        .expect("insert");
    harness
        .applications
        .insert(stored_application(12, "", "9 Elmwood Ave"))
        .expect("insert");

    let outcome = lookup_existing(
        harness.applications.as_ref(),
        &LookupQuery {
            street_address: Some("9 elmwood ave".to_string()),
            household_size: Some(3),
            ..query()
        },
    )
    .expect("lookup");

    assert_eq!(outcome, LookupOutcome::Matched(ApplicationId(12)));
}

#[test]
fn narrowing_to_nothing_is_no_match() {
    let harness = Harness::new();
    for id in [11, 12] {
        harness
            .applications
            .insert(stored_application(id, "", "123 Main St"))
            .expect("insert");
    }

    let outcome = lookup_existing(
        harness.applications.as_ref(),
        &LookupQuery {
            rent_or_own: Some(RentOrOwn::Own),
            ..query()
        },
    )
    .expect("lookup");

    assert_eq!(outcome, LookupOutcome::NoMatch);
}

#[test]
fn service_remembers_the_matched_application() {
    let harness = Harness::new();
    harness
        .applications
        .insert(stored_application(11, "", "123 Main St"))
        .expect("insert");
    let session_id = SessionId::generate();

    let outcome = harness
        .service
        .find_late_document_application(
            &session_id,
            &form(&[
                ("first_name", "Ana"),
                ("last_name", "Diaz"),
                ("zip_code", "14201"),
                ("phone_number", "7165551234"),
            ]),
        )
        .expect("lookup runs");

    assert_eq!(
        outcome,
        StepOutcome::Redirect("/apply/later-documents/upload".to_string())
    );
    assert_eq!(
        harness.session(&session_id).late_document_application,
        Some(ApplicationId(11))
    );
}

#[test]
fn service_rerenders_invalid_lookup_form() {
    let harness = Harness::new();

    let outcome = harness
        .service
        .find_late_document_application(&SessionId::generate(), &form(&[("first_name", "Ana")]))
        .expect("lookup runs");

    let StepOutcome::Render(view) = outcome else {
        panic!("expected the lookup form");
    };
    assert_eq!(view.step, "later-documents");
    for field in ["last_name", "zip_code", "phone_number"] {
        assert!(
            view.errors.iter().any(|error| error.field == field),
            "{field} error expected"
        );
    }
}
