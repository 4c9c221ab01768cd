use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::{
    config::PricingConfig,
    models::{CartLine, ShippingMethod},
};

/// Money breakdown for a set of cart lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub free_shipping: bool,
}

fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl PricingConfig {
    pub fn shipping_for(&self, subtotal: Decimal, method: ShippingMethod) -> Decimal {
        if subtotal <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        match method {
            ShippingMethod::Standard if subtotal >= self.free_shipping_threshold => Decimal::ZERO,
            ShippingMethod::Standard => self.standard_shipping,
            ShippingMethod::Express => self.express_shipping,
        }
    }

    pub fn quote_subtotal(&self, subtotal: Decimal, method: ShippingMethod) -> Quote {
        let subtotal = round_money(subtotal);
        let tax = round_money(subtotal * self.tax_rate);
        let shipping = self.shipping_for(subtotal, method);
        Quote {
            subtotal,
            tax,
            shipping,
            total: subtotal + tax + shipping,
            free_shipping: subtotal > Decimal::ZERO && shipping.is_zero(),
        }
    }

    pub fn quote(&self, lines: &[CartLine], method: ShippingMethod) -> Quote {
        let subtotal: Decimal = lines.iter().map(CartLine::line_total).sum();
        self.quote_subtotal(subtotal, method)
    }

    /// How much more a shopper needs to spend for free standard shipping.
    pub fn free_shipping_gap(&self, subtotal: Decimal) -> Decimal {
        (self.free_shipping_threshold - subtotal).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteDisplay {
    pub subtotal: String,
    pub tax: String,
    pub shipping: String,
    pub total: String,
    pub free_shipping: bool,
}

impl From<&Quote> for QuoteDisplay {
    fn from(quote: &Quote) -> Self {
        Self {
            subtotal: format!("{:.2}", quote.subtotal),
            tax: format!("{:.2}", quote.tax),
            shipping: format!("{:.2}", quote.shipping),
            total: format!("{:.2}", quote.total),
            free_shipping: quote.free_shipping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn line(cents: i64, quantity: i32) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            product_name: "Candle".to_string(),
            sku: "CND".to_string(),
            unit_price: Decimal::new(cents, 2),
            stock_quantity: 100,
            is_active: true,
            quantity,
        }
    }

    #[test]
    fn totals_add_up() {
        let pricing = PricingConfig::default();
        let quote = pricing.quote(&[line(1000, 2), line(550, 1)], ShippingMethod::Standard);

        assert_eq!(quote.subtotal, Decimal::new(2550, 2));
        assert_eq!(quote.tax, Decimal::new(204, 2));
        assert_eq!(quote.shipping, Decimal::new(599, 2));
        assert_eq!(quote.total, quote.subtotal + quote.tax + quote.shipping);
        assert_eq!(quote.total, Decimal::new(3353, 2));
        assert!(!quote.free_shipping);
    }

    #[test]
    fn subtotal_is_sum_of_line_totals() {
        let lines = vec![line(333, 3), line(1, 7), line(2500, 1)];
        let expected: Decimal = lines.iter().map(|l| l.line_total()).sum();
        let quote = PricingConfig::default().quote(&lines, ShippingMethod::Standard);
        assert_eq!(quote.subtotal, expected);
    }

    #[test]
    fn standard_shipping_is_free_at_threshold() {
        let pricing = PricingConfig::default();
        let quote = pricing.quote(&[line(5000, 1)], ShippingMethod::Standard);
        assert!(quote.shipping.is_zero());
        assert!(quote.free_shipping);

        let quote = pricing.quote(&[line(4999, 1)], ShippingMethod::Standard);
        assert_eq!(quote.shipping, pricing.standard_shipping);
    }

    #[test]
    fn express_is_never_free() {
        let pricing = PricingConfig::default();
        let quote = pricing.quote(&[line(20000, 1)], ShippingMethod::Express);
        assert_eq!(quote.shipping, pricing.express_shipping);
        assert!(!quote.free_shipping);
    }

    #[test]
    fn empty_cart_costs_nothing() {
        let quote = PricingConfig::default().quote(&[], ShippingMethod::Express);
        assert!(quote.total.is_zero());
    }

    #[test]
    fn tax_rounds_half_away_from_zero() {
        let pricing = PricingConfig {
            tax_rate: Decimal::new(10, 2),
            ..PricingConfig::default()
        };
        // 0.25 * 0.10 = 0.025 -> 0.03
        let quote = pricing.quote_subtotal(Decimal::new(25, 2), ShippingMethod::Standard);
        assert_eq!(quote.tax, Decimal::new(3, 2));
    }

    #[test]
    fn reports_gap_to_free_shipping() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.free_shipping_gap(Decimal::new(4000, 2)), Decimal::new(1000, 2));
        assert_eq!(pricing.free_shipping_gap(Decimal::new(9000, 2)), Decimal::ZERO);
    }
}
