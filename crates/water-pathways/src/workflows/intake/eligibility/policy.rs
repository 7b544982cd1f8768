use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Share of the water bill the program covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscountTier {
    NinetyPercent,
    SixtyPercent,
}

impl DiscountTier {
    pub const fn percent(self) -> u8 {
        match self {
            DiscountTier::NinetyPercent => 90,
            DiscountTier::SixtyPercent => 60,
        }
    }
}

/// Why a household did or did not qualify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum EligibilityBasis {
    HouseholdBenefits,
    IncomeWithinCeiling { annual_income: Decimal, ceiling: Decimal },
    IncomeAboveCeiling { annual_income: Decimal, ceiling: Decimal },
}

/// Outcome shown on the eligibility step and printed by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityDecision {
    pub household_size: u8,
    pub eligible: bool,
    pub basis: EligibilityBasis,
    pub discount_tier: Option<DiscountTier>,
}

impl EligibilityDecision {
    pub fn summary(&self) -> String {
        match (&self.basis, self.discount_tier) {
            (EligibilityBasis::HouseholdBenefits, Some(tier)) => format!(
                "eligible through household benefits ({}% discount)",
                tier.percent()
            ),
            (
                EligibilityBasis::IncomeWithinCeiling {
                    annual_income,
                    ceiling,
                },
                Some(tier),
            ) => format!(
                "eligible: ${annual_income} is within the ${ceiling} ceiling for a household of {} ({}% discount)",
                self.household_size,
                tier.percent()
            ),
            (
                EligibilityBasis::IncomeAboveCeiling {
                    annual_income,
                    ceiling,
                },
                _,
            ) => format!(
                "not eligible: ${annual_income} exceeds the ${ceiling} ceiling for a household of {}",
                self.household_size
            ),
            (_, None) => "not eligible".to_string(),
        }
    }
}
