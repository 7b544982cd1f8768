mod config;
mod policy;

pub use config::{EligibilityConfig, IncomeThresholds, ThresholdError};
pub use policy::{DiscountTier, EligibilityBasis, EligibilityDecision};

use rust_decimal::Decimal;

/// Stateless evaluator that applies the configured ceilings to a household.
#[derive(Debug, Clone, Default)]
pub struct EligibilityEvaluator {
    config: EligibilityConfig,
}

impl EligibilityEvaluator {
    pub fn new(config: EligibilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EligibilityConfig {
        &self.config
    }

    /// Benefits short-circuit the income test entirely.
    pub fn is_eligible(
        &self,
        has_household_benefits: bool,
        household_size: u8,
        annual_income: Decimal,
    ) -> bool {
        has_household_benefits
            || annual_income <= self.config.eligibility.ceiling_for(household_size)
    }

    pub fn discount_tier(&self, annual_income: Decimal, household_size: u8) -> DiscountTier {
        if annual_income <= self.config.very_low_income.ceiling_for(household_size) {
            DiscountTier::NinetyPercent
        } else {
            DiscountTier::SixtyPercent
        }
    }

    /// Full decision; `annual_income` is ignored for benefits-qualified households.
    pub fn evaluate(
        &self,
        has_household_benefits: bool,
        household_size: u8,
        annual_income: Option<Decimal>,
    ) -> EligibilityDecision {
        if has_household_benefits {
            return EligibilityDecision {
                household_size,
                eligible: true,
                basis: EligibilityBasis::HouseholdBenefits,
                discount_tier: Some(self.discount_tier(Decimal::ZERO, household_size)),
            };
        }

        let annual_income = annual_income.unwrap_or_default();
        let ceiling = self.config.eligibility.ceiling_for(household_size);
        if self.is_eligible(false, household_size, annual_income) {
            EligibilityDecision {
                household_size,
                eligible: true,
                basis: EligibilityBasis::IncomeWithinCeiling {
                    annual_income,
                    ceiling,
                },
                discount_tier: Some(self.discount_tier(annual_income, household_size)),
            }
        } else {
            EligibilityDecision {
                household_size,
                eligible: false,
                basis: EligibilityBasis::IncomeAboveCeiling {
                    annual_income,
                    ceiling,
                },
                discount_tier: None,
            }
        }
    }
}
