//! Integration tests for cart calculation driven by YAML pricing rules.

use rusty_money::{Money, iso::GBP};
use testresult::TestResult;

use trolley::prelude::*;

const RULES: &str = r#"
currency: GBP
coupons:
  C1:
    minimum_spend: "80.00 GBP"
    discount: { type: percentage, value: "10%" }
  C2:
    minimum_spend: "150.00 GBP"
    discount: { type: percentage, value: "10%" }
  BIG:
    minimum_spend: "0.00 GBP"
    discount: { type: amount_off, value: "500.00 GBP" }
shipping:
  regions:
    domestic: { flat_fee: "10.00 GBP", free_shipping_threshold: "100.00 GBP" }
    overseas: { flat_fee: "25.00 GBP" }
"#;

fn two_of_p1() -> [LineItem<'static>; 1] {
    [LineItem::new(Money::from_minor(50_00, GBP), 2)]
}

#[test]
fn eligible_coupon_with_free_shipping() -> TestResult {
    let rules = PricingRules::from_yaml_str(RULES)?;
    let calculator = Calculator::new(rules.promotions(), rules.shipping());

    let calculation = calculator.calculate(&two_of_p1(), GBP, "domestic", Some("C1"))?;

    assert_eq!(calculation.subtotal_amount, Money::from_minor(100_00, GBP));
    assert_eq!(calculation.selected_amount, Money::from_minor(100_00, GBP));
    assert_eq!(calculation.total_discount, Money::from_minor(10_00, GBP));
    assert_eq!(calculation.shipping_fee, Money::from_minor(0, GBP));
    assert_eq!(calculation.payable_amount, Money::from_minor(90_00, GBP));
    assert_eq!(calculation.applied_coupon.as_deref(), Some("C1"));

    Ok(())
}

#[test]
fn ineligible_coupon_fails_the_calculation() -> TestResult {
    let rules = PricingRules::from_yaml_str(RULES)?;
    let calculator = Calculator::new(rules.promotions(), rules.shipping());

    let result = calculator.calculate(&two_of_p1(), GBP, "domestic", Some("C2"));

    assert!(
        matches!(
            result,
            Err(CalculationError::Promotion(PromotionError::CouponIneligible { ref coupon, minimum_spend: 150_00 })) if coupon == "C2"
        ),
        "expected CouponIneligible, got {result:?}"
    );

    Ok(())
}

#[test]
fn payable_is_never_negative() -> TestResult {
    let rules = PricingRules::from_yaml_str(RULES)?;
    let calculator = Calculator::new(rules.promotions(), rules.shipping());

    let calculation = calculator.calculate(&two_of_p1(), GBP, "overseas", Some("BIG"))?;

    assert_eq!(calculation.total_discount, calculation.selected_amount);
    assert_eq!(calculation.payable_amount, Money::from_minor(25_00, GBP));

    Ok(())
}

#[test]
fn discount_never_exceeds_selected_amount() -> TestResult {
    let rules = PricingRules::from_yaml_str(RULES)?;
    let calculator = Calculator::new(rules.promotions(), rules.shipping());

    for quantity in 1..=5 {
        let items = [LineItem::new(Money::from_minor(33_33, GBP), quantity)];

        for coupon in [None, Some("C1"), Some("BIG")] {
            let Ok(calculation) = calculator.calculate(&items, GBP, "overseas", coupon) else {
                continue;
            };

            assert!(
                calculation.total_discount.to_minor_units()
                    <= calculation.selected_amount.to_minor_units()
            );
            assert!(calculation.payable_amount.to_minor_units() >= 0);
        }
    }

    Ok(())
}

#[test]
fn free_shipping_at_threshold_and_flat_fee_below() -> TestResult {
    let rules = PricingRules::from_yaml_str(RULES)?;
    let calculator = Calculator::new(rules.promotions(), rules.shipping());

    let at = [LineItem::new(Money::from_minor(100_00, GBP), 1)];
    let below = [LineItem::new(Money::from_minor(99_99, GBP), 1)];

    assert_eq!(
        calculator.estimate_shipping(&at, GBP, "domestic")?,
        Money::from_minor(0, GBP)
    );
    assert_eq!(
        calculator.estimate_shipping(&below, GBP, "domestic")?,
        Money::from_minor(10_00, GBP)
    );

    Ok(())
}

#[test]
fn unselected_lines_do_not_affect_payable() -> TestResult {
    let rules = PricingRules::from_yaml_str(RULES)?;
    let calculator = Calculator::new(rules.promotions(), rules.shipping());

    let items = [
        LineItem::new(Money::from_minor(50_00, GBP), 2),
        LineItem::new(Money::from_minor(999_00, GBP), 1).with_selected(false),
    ];

    let calculation = calculator.calculate(&items, GBP, "domestic", Some("C1"))?;

    assert_eq!(calculation.subtotal_amount, Money::from_minor(1_099_00, GBP));
    assert_eq!(calculation.payable_amount, Money::from_minor(90_00, GBP));

    Ok(())
}

#[test]
fn unknown_region_without_default_is_rejected() -> TestResult {
    let rules = PricingRules::from_yaml_str(RULES)?;
    let calculator = Calculator::new(rules.promotions(), rules.shipping());

    let result = calculator.calculate(&two_of_p1(), GBP, "moon", None);

    assert!(matches!(
        result,
        Err(CalculationError::Shipping(ShippingError::UnknownRegion(ref region))) if region == "moon"
    ));

    Ok(())
}
