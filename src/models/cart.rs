use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart item joined with the live product row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CartLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub unit_price: Decimal,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub quantity: i32,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Inactive products can't be bought, whatever the stock column says.
    pub fn available(&self) -> i32 {
        if self.is_active {
            self.stock_quantity.max(0)
        } else {
            0
        }
    }

    pub fn shortfall(&self) -> Option<StockShortfall> {
        let available = self.available();
        (self.quantity > available).then(|| StockShortfall {
            product_id: self.product_id,
            product_name: self.product_name.clone(),
            requested: self.quantity,
            available,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub product_id: Uuid,
    pub product_name: String,
    pub requested: i32,
    pub available: i32,
}

/// Every line whose quantity exceeds what can currently be sold.
pub fn stock_shortfalls(lines: &[CartLine]) -> Vec<StockShortfall> {
    lines.iter().filter_map(CartLine::shortfall).collect()
}

#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartEntry {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct SaveCartRequest {
    pub items: Vec<CartEntry>,
}

/// Merges duplicate products and drops non-positive quantities, keeping first-seen order.
pub fn normalize_entries(entries: Vec<CartEntry>) -> Vec<CartEntry> {
    let mut merged: Vec<CartEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.quantity <= 0 {
            continue;
        }
        match merged.iter_mut().find(|e| e.product_id == entry.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(entry.quantity),
            None => merged.push(entry),
        }
    }
    merged
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLineDisplay {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub unit_price: String,
    pub quantity: i32,
    pub line_total: String,
    pub available: i32,
    pub short: bool,
}

impl From<&CartLine> for CartLineDisplay {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            sku: line.sku.clone(),
            unit_price: format!("{:.2}", line.unit_price),
            quantity: line.quantity,
            line_total: format!("{:.2}", line.line_total()),
            available: line.available(),
            short: line.shortfall().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: Decimal, quantity: i32, stock: i32) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            product_name: "Tea Towel".to_string(),
            sku: "TT-1".to_string(),
            unit_price: price,
            stock_quantity: stock,
            is_active: true,
            quantity,
        }
    }

    #[test]
    fn line_total_multiplies_price() {
        assert_eq!(line(Decimal::new(450, 2), 3, 10).line_total(), Decimal::new(1350, 2));
    }

    #[test]
    fn reports_only_short_lines() {
        let lines = vec![
            line(Decimal::ONE, 2, 2),
            line(Decimal::ONE, 5, 4),
            line(Decimal::ONE, 1, 0),
        ];
        let short = stock_shortfalls(&lines);
        assert_eq!(short.len(), 2);
        assert_eq!(short[0].requested, 5);
        assert_eq!(short[0].available, 4);
        assert_eq!(short[1].available, 0);
    }

    #[test]
    fn inactive_products_have_no_stock() {
        let mut l = line(Decimal::ONE, 1, 50);
        l.is_active = false;
        assert_eq!(l.available(), 0);
        assert!(l.shortfall().is_some());
    }

    #[test]
    fn normalizing_merges_duplicates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let entries = vec![
            CartEntry { product_id: a, quantity: 1 },
            CartEntry { product_id: b, quantity: 0 },
            CartEntry { product_id: a, quantity: 2 },
        ];
        let merged = normalize_entries(entries);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].product_id, a);
        assert_eq!(merged[0].quantity, 3);
    }
}
