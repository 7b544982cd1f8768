use crate::infra::{parse_amount, parse_pay_period, InMemoryIntake};
use clap::Args;
use rust_decimal::Decimal;
use water_pathways::config::AppConfig;
use water_pathways::error::AppError;
use water_pathways::workflows::intake::{
    ApplicationStatus, Cadence, DispatchMode, EligibilityRequest, FormData, IntakeError,
    IntakeService, PayPeriod, Program, SessionId, Step, StepOutcome, ValidationErrors,
};

#[derive(Args, Debug)]
pub(crate) struct EligibilityArgs {
    /// People living in the household
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..))]
    pub(crate) household_size: u8,
    /// Someone in the household receives SNAP, HEAP, SSI, TANF or Medicaid
    #[arg(long)]
    pub(crate) benefits: bool,
    /// Job income per pay period (e.g. 1250 or $1,250.00)
    #[arg(long, value_parser = parse_amount, requires = "pay_period", conflicts_with = "hourly_wage")]
    pub(crate) income: Option<Decimal>,
    /// How often the income amount is paid
    #[arg(long, value_parser = parse_pay_period)]
    pub(crate) pay_period: Option<PayPeriod>,
    /// Hourly wage, used with --hours-per-week
    #[arg(long, value_parser = parse_amount, requires = "hours_per_week")]
    pub(crate) hourly_wage: Option<Decimal>,
    /// Hours worked in a typical week
    #[arg(long)]
    pub(crate) hours_per_week: Option<u32>,
}

impl EligibilityArgs {
    fn into_request(self) -> EligibilityRequest {
        let (income, cadence) = match (self.hourly_wage, self.hours_per_week) {
            (Some(wage), Some(hours_per_week)) => {
                (Some(wage), Some(Cadence::Hourly { hours_per_week }))
            }
            _ => (self.income, self.pay_period.map(Cadence::Periodic)),
        };

        EligibilityRequest {
            household_size: self.household_size,
            has_household_benefits: self.benefits,
            income,
            cadence,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Address the confirmation emails go to
    #[arg(long, default_value = "ana@example.com")]
    pub(crate) email: String,
    /// Leave the email address blank, so no confirmation is sent
    #[arg(long)]
    pub(crate) no_email: bool,
    /// Skip the amnesty portion of the demo.
    #[arg(long)]
    pub(crate) skip_amnesty: bool,
}

pub(crate) fn run_eligibility(args: EligibilityArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = InMemoryIntake::default().service(&config.program);
    let request = args.into_request();

    let estimate = service.estimate(&request)?;

    println!("Household size: {}", request.household_size);
    match estimate.annual_income {
        Some(annual) => println!("Annual income: ${annual}"),
        None => println!("Annual income: not required (household benefits)"),
    }
    println!("Result: {}", estimate.summary);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut program = AppConfig::load()?.program;
    program.notifications.dispatch = DispatchMode::Inline;
    let email = (!args.no_email).then_some(args.email.as_str());

    let intake = InMemoryIntake::default();
    let service = intake.service(&program);

    println!("Water discount demo");
    let session_id = service.start(Program::Discount, None)?;
    walk(&service, &session_id, discount_answers(email))?;

    let session = service.session(&session_id)?;
    let Some(application_id) = session.application_id else {
        println!("\nThe household did not qualify; no application was recorded.");
        return Ok(());
    };
    let record = service.update_status(
        application_id,
        ApplicationStatus::Enrolled,
        Some("Enrolled during the CLI demo".to_string()),
    )?;
    println!("\nApplication: {record}");
    if let Some(annual) = record.annual_income {
        println!("  Annual income: ${annual}");
    }
    let decision = service.evaluator().evaluate(
        record.has_household_benefits,
        record.household_size,
        record.annual_income,
    );
    println!("  Eligibility: {}", decision.summary());
    println!("  Status: {}", record.status.label());

    if !args.skip_amnesty {
        println!("\nAmnesty demo");
        let amnesty_session = service.start(Program::Amnesty, None)?;
        walk(&service, &amnesty_session, amnesty_answers(email))?;
        for record in intake.amnesty.records() {
            println!("\nAmnesty application: {record}");
        }
    }

    let outbox = intake.notifier.outbox();
    println!("\nEmails sent: {}", outbox.len());
    for email in outbox {
        println!("  - {}", email.subject);
    }
    println!(
        "Stored discount applications: {}",
        intake.applications.records().len()
    );

    Ok(())
}

fn walk(
    service: &IntakeService,
    session_id: &SessionId,
    answers: Vec<(Step, FormData)>,
) -> Result<(), AppError> {
    for (step, data) in answers {
        match service.submit(session_id, step, &data)? {
            StepOutcome::Redirect(location) => println!("  {:<28} -> {location}", step.path()),
            StepOutcome::Render(view) if view.errors.is_empty() => {
                println!("  {:<28} (final page)", step.path());
            }
            StepOutcome::Render(view) => {
                return Err(IntakeError::Validation(ValidationErrors(view.errors)).into());
            }
        }
    }
    Ok(())
}

fn answers(pairs: &[(&str, &str)]) -> FormData {
    pairs.iter().copied().collect()
}

/// Household of one earning $500 a week at a single job.
fn discount_answers(email: Option<&str>) -> Vec<(Step, FormData)> {
    let mut contact = answers(&[("phone_number", "(716) 555-1234")]);
    if let Some(email) = email {
        contact = contact.with("email_address", email);
    }

    vec![
        (Step::CityResident, answers(&[("city_resident", "yes")])),
        (Step::HouseholdSize, answers(&[("household_size", "1")])),
        (
            Step::HouseholdBenefits,
            answers(&[("has_household_benefits", "no")]),
        ),
        (
            Step::HouseholdContributors,
            answers(&[("household_contributors", "1")]),
        ),
        (Step::JobStatus, answers(&[("has_job", "yes")])),
        (Step::SelfEmployment, answers(&[("is_self_employed", "no")])),
        (Step::NumberOfJobs, answers(&[("number_of_jobs", "1")])),
        (Step::IncomeMethods, answers(&[("income_method", "exact")])),
        (
            Step::Income,
            answers(&[("income", "500"), ("pay_period", "weekly")]),
        ),
        (
            Step::OtherIncomeSources,
            answers(&[("has_other_income", "no")]),
        ),
        (Step::ReviewEligibility, FormData::new()),
        (Step::Eligibility, FormData::new()),
        (
            Step::ResidentInfo,
            answers(&[
                ("first_name", "Ana"),
                ("last_name", "Diaz"),
                ("rent_or_own", "rent"),
                ("account_holder", "me"),
            ]),
        ),
        (
            Step::Address,
            answers(&[("street_address", "123 Main St"), ("zip_code", "14201")]),
        ),
        (Step::ContactInfo, contact),
        (Step::AccountNumber, answers(&[("has_account_number", "no")])),
        (Step::ReviewApplication, FormData::new()),
        (Step::Legal, answers(&[("legal_agreement", "on")])),
        (Step::Refer, answers(&[("bill", "on")])),
        (Step::Signature, answers(&[("signature", "Ana Diaz")])),
    ]
}

fn amnesty_answers(email: Option<&str>) -> Vec<(Step, FormData)> {
    let mut resident = answers(&[
        ("first_name", "Ana"),
        ("last_name", "Diaz"),
        ("street_address", "123 Main St"),
        ("zip_code", "14201"),
        ("phone_number", "716-555-1234"),
    ]);
    if let Some(email) = email {
        resident = resident.with("email_address", email);
    }

    vec![
        (Step::AmnestyCityResident, answers(&[("city_resident", "yes")])),
        (
            Step::AdditionalQuestions,
            answers(&[
                ("rent_or_own", "rent"),
                ("has_past_due_balance", "yes"),
                ("in_payment_plan", "no"),
            ]),
        ),
        (Step::AmnestyResidentInfo, resident),
        (Step::Referral, answers(&[("bill", "on")])),
        (
            Step::AmnestyReview,
            answers(&[("legal_agreement", "on"), ("signature", "Ana Diaz")]),
        ),
    ]
}
