use rust_decimal::Decimal;

use super::common::*;
use crate::workflows::intake::eligibility::{
    DiscountTier, EligibilityBasis, EligibilityConfig, EligibilityEvaluator, IncomeThresholds,
    ThresholdError,
};
use crate::workflows::intake::income::{Cadence, PayPeriod};
use crate::workflows::intake::service::EligibilityRequest;
use crate::workflows::intake::IntakeError;

fn evaluator() -> EligibilityEvaluator {
    EligibilityEvaluator::new(EligibilityConfig::default())
}

#[test]
fn income_at_the_ceiling_is_eligible() {
    let evaluator = evaluator();
    let one_cent = Decimal::new(1, 2);

    for household_size in 1..=8u8 {
        let ceiling = evaluator.config().eligibility.ceiling_for(household_size);
        assert!(
            evaluator.is_eligible(false, household_size, ceiling),
            "household of {household_size} at {ceiling}"
        );
        assert!(
            !evaluator.is_eligible(false, household_size, ceiling + one_cent),
            "household of {household_size} above {ceiling}"
        );
    }
    assert_eq!(
        evaluator.config().eligibility.ceiling_for(1),
        Decimal::from(41_850)
    );
    assert_eq!(
        evaluator.config().eligibility.ceiling_for(8),
        Decimal::from(78_900)
    );
}

#[test]
fn benefits_qualify_regardless_of_income() {
    let decision = evaluator().evaluate(true, 3, Some(Decimal::from(500_000)));

    assert!(decision.eligible);
    assert_eq!(decision.basis, EligibilityBasis::HouseholdBenefits);
    assert_eq!(decision.discount_tier, Some(DiscountTier::NinetyPercent));
}

#[test]
fn very_low_income_earns_the_deeper_discount() {
    let evaluator = evaluator();

    assert_eq!(
        evaluator.discount_tier(Decimal::from(26_150), 1),
        DiscountTier::NinetyPercent
    );
    assert_eq!(
        evaluator.discount_tier(Decimal::from(26_151), 1),
        DiscountTier::SixtyPercent
    );
    assert_eq!(
        evaluator
            .evaluate(false, 1, Some(Decimal::from(26_000)))
            .discount_tier,
        Some(DiscountTier::NinetyPercent)
    );
}

#[test]
fn households_past_the_table_use_the_largest_ceiling() {
    let evaluator = evaluator();

    assert!(evaluator.is_eligible(false, 12, Decimal::from(78_900)));
    assert!(!evaluator.is_eligible(false, 12, Decimal::from(78_901)));
}

#[test]
fn ineligible_decision_explains_the_ceiling() {
    let decision = evaluator().evaluate(false, 2, Some(Decimal::from(50_000)));

    assert!(!decision.eligible);
    assert_eq!(decision.discount_tier, None);
    assert_eq!(
        decision.summary(),
        "not eligible: $50000 exceeds the $47800 ceiling for a household of 2"
    );
}

#[test]
fn threshold_lists_must_be_non_decreasing() {
    assert_eq!(
        IncomeThresholds::parse_list("100, 90"),
        Err(ThresholdError::Decreasing { household_size: 2 })
    );
    assert_eq!(IncomeThresholds::parse_list(" , "), Err(ThresholdError::Empty));
    assert_eq!(
        IncomeThresholds::parse_list("100, lots"),
        Err(ThresholdError::Unparseable("lots".to_string()))
    );

    let thresholds = IncomeThresholds::parse_list("30000, 35000").expect("valid list");
    assert_eq!(thresholds.largest_household(), 2);
    assert_eq!(thresholds.ceiling_for(1), Decimal::from(30_000));
}

#[test]
fn estimate_annualizes_before_evaluating() {
    let harness = Harness::new();

    let estimate = harness
        .service
        .estimate(&EligibilityRequest {
            household_size: 1,
            has_household_benefits: false,
            income: Some(Decimal::from(1_000)),
            cadence: Some(Cadence::Periodic(PayPeriod::Biweekly)),
        })
        .expect("estimate succeeds");

    assert_eq!(estimate.annual_income, Some(Decimal::from(26_000)));
    assert!(estimate.decision.eligible);
    assert_eq!(
        estimate.decision.discount_tier,
        Some(DiscountTier::NinetyPercent)
    );
}

#[test]
fn estimate_requires_income_without_benefits() {
    let harness = Harness::new();

    let error = harness
        .service
        .estimate(&EligibilityRequest {
            household_size: 2,
            has_household_benefits: false,
            income: None,
            cadence: None,
        })
        .expect_err("income is required");

    let IntakeError::Validation(errors) = error else {
        panic!("expected validation errors");
    };
    assert!(errors.for_field("income").is_some());
    assert!(errors.for_field("pay_period").is_some());
}

#[test]
fn estimate_with_benefits_ignores_income() {
    let harness = Harness::new();

    let estimate = harness
        .service
        .estimate(&EligibilityRequest {
            household_size: 5,
            has_household_benefits: true,
            income: None,
            cadence: None,
        })
        .expect("estimate succeeds");

    assert_eq!(estimate.annual_income, None);
    assert_eq!(
        estimate.summary,
        "eligible through household benefits (90% discount)"
    );
}
