//! Cart Pricing
//!
//! Adapts stored carts to the calculation engine.

use rusty_money::{Money, iso::Currency};
use trolley::{
    calculation::{CalculationError, CartCalculation, Calculator},
    items::LineItem,
    pricing::TotalPriceError,
    rules::PricingRules,
};

use crate::domain::carts::models::{Cart, CartItem, ItemStatus};

/// Prices carts under a fixed set of promotion and shipping rules.
#[derive(Debug, Clone)]
pub struct CartPricing {
    rules: PricingRules,
}

impl CartPricing {
    pub fn new(rules: PricingRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &PricingRules {
        &self.rules
    }

    pub fn currency(&self) -> &'static Currency {
        self.rules.currency()
    }

    /// Engine lines for every line still in the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`TotalPriceError::Overflow`] when a stored price does not fit a money amount.
    pub fn line_items(&self, cart: &Cart) -> Result<Vec<LineItem<'static>>, CalculationError> {
        cart.items
            .iter()
            .filter(|item| item.status != ItemStatus::Removed)
            .map(|item| self.line_item(item))
            .collect()
    }

    fn line_item(&self, item: &CartItem) -> Result<LineItem<'static>, CalculationError> {
        let live_price = item
            .current_price
            .map(|price| self.money(price))
            .transpose()?;

        Ok(LineItem::new(self.money(item.price_snapshot)?, item.quantity)
            .with_live_price(live_price)
            .with_selected(item.selected))
    }

    fn money(&self, minor_units: u64) -> Result<Money<'static, Currency>, CalculationError> {
        let minor_units = i64::try_from(minor_units).map_err(|_err| TotalPriceError::Overflow)?;

        Ok(Money::from_minor(minor_units, self.currency()))
    }

    fn calculator(&self) -> Calculator<'_> {
        Calculator::new(self.rules.promotions(), self.rules.shipping())
    }

    /// Calculate totals for the cart.
    ///
    /// # Errors
    ///
    /// Returns an error for ineligible or unknown coupons, unknown regions and overflow.
    pub fn calculate(
        &self,
        cart: &Cart,
        region: &str,
        coupon: Option<&str>,
    ) -> Result<CartCalculation<'static>, CalculationError> {
        let items = self.line_items(cart)?;

        self.calculator()
            .calculate(&items, self.currency(), region, coupon)
    }

    /// Shipping fee for the selected lines.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown regions and overflow.
    pub fn estimate_shipping(
        &self,
        cart: &Cart,
        region: &str,
    ) -> Result<Money<'static, Currency>, CalculationError> {
        let items = self.line_items(cart)?;

        self.calculator()
            .estimate_shipping(&items, self.currency(), region)
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rusty_money::iso::GBP;
    use testresult::TestResult;

    use crate::domain::{
        carts::models::{CartItemUuid, Owner},
        products::models::ProductUuid,
    };

    use super::*;

    const RULES: &str = r#"
currency: GBP
coupons:
  C1:
    minimum_spend: "80.00 GBP"
    discount: { type: percentage, value: "10%" }
shipping:
  default: { flat_fee: "4.99 GBP" }
  regions:
    domestic: { flat_fee: "10.00 GBP", free_shipping_threshold: "100.00 GBP" }
"#;

    fn pricing() -> Result<CartPricing, trolley::rules::RulesError> {
        Ok(CartPricing::new(PricingRules::from_yaml_str(RULES)?))
    }

    fn line(quantity: u32, price: u64, selected: bool, status: ItemStatus) -> CartItem {
        CartItem {
            uuid: CartItemUuid::new(),
            product_uuid: ProductUuid::new(),
            sku: None,
            quantity,
            price_snapshot: price,
            current_price: None,
            selected,
            status,
            added_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    fn cart(items: Vec<CartItem>) -> Cart {
        let mut cart = Cart::empty(Owner::user("1"));
        cart.items = items;
        cart
    }

    #[test]
    fn removed_lines_are_not_priced() -> TestResult {
        let cart = cart(vec![
            line(2, 50_00, true, ItemStatus::Valid),
            line(1, 999_00, true, ItemStatus::Removed),
        ]);

        let calculation = pricing()?.calculate(&cart, "domestic", Some("C1"))?;

        assert_eq!(calculation.subtotal_amount, Money::from_minor(100_00, GBP));
        assert_eq!(calculation.payable_amount, Money::from_minor(90_00, GBP));

        Ok(())
    }

    #[test]
    fn live_price_is_used_when_known() -> TestResult {
        let mut repriced = line(1, 50_00, true, ItemStatus::PriceChanged);
        repriced.current_price = Some(60_00);

        let calculation = pricing()?.calculate(&cart(vec![repriced]), "domestic", None)?;

        assert_eq!(calculation.selected_amount, Money::from_minor(60_00, GBP));
        assert_eq!(calculation.shipping_fee, Money::from_minor(10_00, GBP));

        Ok(())
    }

    #[test]
    fn unknown_regions_use_the_default_rate() -> TestResult {
        let cart = cart(vec![line(1, 5_00, true, ItemStatus::Valid)]);

        let fee = pricing()?.estimate_shipping(&cart, "elsewhere")?;

        assert_eq!(fee, Money::from_minor(4_99, GBP));

        Ok(())
    }

    #[test]
    fn oversized_prices_overflow() -> TestResult {
        let cart = cart(vec![line(1, u64::MAX, true, ItemStatus::Valid)]);

        let result = pricing()?.calculate(&cart, "domestic", None);

        assert_eq!(
            result,
            Err(CalculationError::TotalPrice(TotalPriceError::Overflow))
        );

        Ok(())
    }
}
