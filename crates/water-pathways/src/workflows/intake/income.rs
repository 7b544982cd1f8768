//! Income annualization for the discount wizard's income steps.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::forms::ValidationError;

pub const WEEKS_PER_YEAR: u32 = 52;
/// Two-week pay periods per year; 52 weeks split evenly, ignoring the occasional 27th cheque.
pub const BIWEEKLY_PERIODS_PER_YEAR: u32 = 26;
pub const SEMIMONTHLY_PERIODS_PER_YEAR: u32 = 24;
pub const MONTHS_PER_YEAR: u32 = 12;
pub const MAX_HOURS_PER_WEEK: u32 = 168;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayPeriod {
    Weekly,
    Biweekly,
    Semimonthly,
    Monthly,
    Annually,
}

impl PayPeriod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weekly" => Some(Self::Weekly),
            "biweekly" => Some(Self::Biweekly),
            "semimonthly" => Some(Self::Semimonthly),
            "monthly" => Some(Self::Monthly),
            "annually" | "yearly" => Some(Self::Annually),
            _ => None,
        }
    }

    pub const fn periods_per_year(self) -> u32 {
        match self {
            PayPeriod::Weekly => WEEKS_PER_YEAR,
            PayPeriod::Biweekly => BIWEEKLY_PERIODS_PER_YEAR,
            PayPeriod::Semimonthly => SEMIMONTHLY_PERIODS_PER_YEAR,
            PayPeriod::Monthly => MONTHS_PER_YEAR,
            PayPeriod::Annually => 1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PayPeriod::Weekly => "weekly",
            PayPeriod::Biweekly => "biweekly",
            PayPeriod::Semimonthly => "semimonthly",
            PayPeriod::Monthly => "monthly",
            PayPeriod::Annually => "annually",
        }
    }
}

/// How often the reported amount is earned. Hourly wages carry their weekly hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Periodic(PayPeriod),
    Hourly { hours_per_week: u32 },
}

/// The single way an application reports job income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeMethod {
    Exact,
    Hourly,
    Estimate,
}

impl IncomeMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "hourly" => Some(Self::Hourly),
            "estimate" => Some(Self::Estimate),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            IncomeMethod::Exact => "exact",
            IncomeMethod::Hourly => "hourly",
            IncomeMethod::Estimate => "estimate",
        }
    }
}

/// Project a reported amount onto a yearly figure, rounded to cents.
pub fn annualize(amount: Decimal, cadence: Cadence) -> Result<Decimal, ValidationError> {
    let annual = match cadence {
        Cadence::Periodic(period) => {
            if amount.is_sign_negative() && !amount.is_zero() {
                return Err(ValidationError::new(
                    "income",
                    "Income must be zero or greater.",
                ));
            }
            amount * Decimal::from(period.periods_per_year())
        }
        Cadence::Hourly { hours_per_week } => {
            if amount < Decimal::new(1, 2) {
                return Err(ValidationError::new(
                    "income",
                    "Hourly wage must be at least $0.01.",
                ));
            }
            if !(1..=MAX_HOURS_PER_WEEK).contains(&hours_per_week) {
                return Err(ValidationError::new(
                    "pay_period",
                    format!("Hours a week must be between 1 and {MAX_HOURS_PER_WEEK}."),
                ));
            }
            amount * Decimal::from(hours_per_week) * Decimal::from(WEEKS_PER_YEAR)
        }
    };
    Ok(to_cents(annual))
}

/// Monthly income from benefits, support or other non-job sources.
pub fn annualize_monthly(amount: Decimal) -> Result<Decimal, ValidationError> {
    annualize(amount, Cadence::Periodic(PayPeriod::Monthly)).map_err(|error| ValidationError {
        field: "non_job_income",
        ..error
    })
}

pub(crate) fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biweekly_uses_twenty_six_periods() {
        let annual = annualize(
            Decimal::from(1_000u32),
            Cadence::Periodic(PayPeriod::Biweekly),
        )
        .expect("valid amount");
        assert_eq!(annual, Decimal::from(26_000u32));
    }

    #[test]
    fn rounds_to_cents_away_from_zero() {
        let annual = annualize(Decimal::new(10_005, 4), Cadence::Periodic(PayPeriod::Annually))
            .expect("valid amount");
        assert_eq!(annual, Decimal::new(101, 2));
    }

    #[test]
    fn monthly_errors_name_non_job_income() {
        let error = annualize_monthly(Decimal::from(-5)).expect_err("negative");
        assert_eq!(error.field, "non_job_income");
    }
}
