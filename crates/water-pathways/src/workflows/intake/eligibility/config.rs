use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Dollar ceilings indexed by household size, starting at one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeThresholds(Vec<Decimal>);

impl IncomeThresholds {
    pub fn new(ceilings: Vec<Decimal>) -> Result<Self, ThresholdError> {
        if ceilings.is_empty() {
            return Err(ThresholdError::Empty);
        }
        if let Some(index) = ceilings.iter().position(|value| value.is_sign_negative()) {
            return Err(ThresholdError::Negative {
                household_size: index + 1,
            });
        }
        if let Some(index) = ceilings.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(ThresholdError::Decreasing {
                household_size: index + 2,
            });
        }
        Ok(Self(ceilings))
    }

    /// Parse a comma separated list such as `41850, 47800, 53800`.
    pub fn parse_list(raw: &str) -> Result<Self, ThresholdError> {
        let ceilings = raw
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| {
                value
                    .parse::<Decimal>()
                    .map_err(|_| ThresholdError::Unparseable(value.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(ceilings)
    }

    /// Ceiling for a household; sizes past the table reuse its largest entry.
    pub fn ceiling_for(&self, household_size: u8) -> Decimal {
        let index = usize::from(household_size.max(1)) - 1;
        self.0
            .get(index)
            .or_else(|| self.0.last())
            .copied()
            .unwrap_or_default()
    }

    pub fn largest_household(&self) -> usize {
        self.0.len()
    }

    fn from_dollars(values: &[u32]) -> Self {
        Self(values.iter().copied().map(Decimal::from).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThresholdError {
    #[error("threshold table is empty")]
    Empty,
    #[error("ceiling for household size {household_size} is negative")]
    Negative { household_size: usize },
    #[error("ceiling for household size {household_size} is lower than the previous size")]
    Decreasing { household_size: usize },
    #[error("'{0}' is not a dollar amount")]
    Unparseable(String),
    #[error("expected household size {expected}, found {found}")]
    Gap { expected: usize, found: u8 },
}

/// The two program-year tables: the eligibility ceiling and the very-low-income ceiling
/// that earns the deeper discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityConfig {
    pub eligibility: IncomeThresholds,
    pub very_low_income: IncomeThresholds,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            eligibility: IncomeThresholds::from_dollars(&[
                41_850, 47_800, 53_800, 59_750, 64_550, 69_350, 74_100, 78_900,
            ]),
            very_low_income: IncomeThresholds::from_dollars(&[
                26_150, 29_900, 33_650, 37_350, 40_350, 43_350, 46_350, 49_350,
            ]),
        }
    }
}
