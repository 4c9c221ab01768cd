use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product joined with its category name, for listings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductListing {
    pub id: Uuid,
    pub category_id: Uuid,
    pub category_name: String,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDisplay {
    pub id: Uuid,
    pub category_id: Uuid,
    pub category_name: String,
    pub name: String,
    pub sku: String,
    pub description: String,
    pub price: String,
    pub stock_quantity: i32,
    pub image_url: String,
    pub is_active: bool,
    pub in_stock: bool,
    pub low_stock: bool,
}

pub const LOW_STOCK_LEVEL: i32 = 5;

impl From<ProductListing> for ProductDisplay {
    fn from(p: ProductListing) -> Self {
        Self {
            id: p.id,
            category_id: p.category_id,
            category_name: p.category_name,
            name: p.name,
            sku: p.sku,
            description: p.description.unwrap_or_default(),
            price: format!("{:.2}", p.price),
            stock_quantity: p.stock_quantity,
            image_url: p.image_url.unwrap_or_default(),
            is_active: p.is_active,
            in_stock: p.is_active && p.stock_quantity > 0,
            low_stock: p.stock_quantity <= LOW_STOCK_LEVEL,
        }
    }
}

/// Admin form for creating or editing a product. HTML checkboxes send "on" or nothing.
#[derive(Debug, Deserialize)]
pub struct ProductForm {
    pub category_id: String,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: String,
    pub stock_quantity: String,
    pub image_url: Option<String>,
    pub is_active: Option<String>,
}

/// Validated product fields ready to bind into an insert or update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInput {
    pub category_id: Uuid,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ProductForm {
    pub fn validate(self) -> Result<ProductInput, String> {
        let category_id = Uuid::parse_str(self.category_id.trim())
            .map_err(|_| "Please choose a category".to_string())?;

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err("Product name is required".to_string());
        }

        let sku = self.sku.trim().to_uppercase();
        if sku.is_empty() {
            return Err("SKU is required".to_string());
        }

        let price = Decimal::from_str(self.price.trim())
            .map_err(|_| "Price must be a number".to_string())?;
        if price.is_sign_negative() {
            return Err("Price cannot be negative".to_string());
        }
        if price.scale() > 2 {
            return Err("Price can have at most two decimal places".to_string());
        }

        let stock_quantity = self
            .stock_quantity
            .trim()
            .parse::<i32>()
            .map_err(|_| "Stock quantity must be a whole number".to_string())?;
        if stock_quantity < 0 {
            return Err("Stock quantity cannot be negative".to_string());
        }

        Ok(ProductInput {
            category_id,
            name,
            sku,
            description: non_blank(self.description),
            price,
            stock_quantity,
            image_url: non_blank(self.image_url),
            is_active: self.is_active.is_some(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    pub description: Option<String>,
    pub is_active: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

impl CategoryForm {
    pub fn validate(self) -> Result<CategoryInput, String> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err("Category name is required".to_string());
        }
        Ok(CategoryInput {
            name,
            description: non_blank(self.description),
            is_active: self.is_active.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(price: &str, stock: &str) -> ProductForm {
        ProductForm {
            category_id: Uuid::nil().to_string(),
            name: "  Enamel Mug ".to_string(),
            sku: "mug-01".to_string(),
            description: Some("   ".to_string()),
            price: price.to_string(),
            stock_quantity: stock.to_string(),
            image_url: None,
            is_active: Some("on".to_string()),
        }
    }

    #[test]
    fn validates_product_form() {
        let input = form("12.50", "7").validate().unwrap();
        assert_eq!(input.name, "Enamel Mug");
        assert_eq!(input.sku, "MUG-01");
        assert_eq!(input.price, Decimal::new(1250, 2));
        assert_eq!(input.stock_quantity, 7);
        assert_eq!(input.description, None);
        assert!(input.is_active);
    }

    #[test]
    fn rejects_negative_or_malformed_numbers() {
        assert!(form("-1", "1").validate().is_err());
        assert!(form("1.999", "1").validate().is_err());
        assert!(form("abc", "1").validate().is_err());
        assert!(form("1", "-3").validate().is_err());
        assert!(form("1", "2.5").validate().is_err());
    }

    #[test]
    fn requires_a_category() {
        let mut f = form("1", "1");
        f.category_id = String::new();
        assert_eq!(f.validate().unwrap_err(), "Please choose a category");
    }

    #[test]
    fn unchecked_category_is_inactive() {
        let input = CategoryForm {
            name: "Kitchen".to_string(),
            description: None,
            is_active: None,
        }
        .validate()
        .unwrap();
        assert!(!input.is_active);
    }
}
