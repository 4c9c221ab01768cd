use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses an order may move to from this one.
    pub fn next_statuses(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.next_statuses().contains(&next)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown order status: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown payment status: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
}

impl ShippingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::Standard => "standard",
            ShippingMethod::Express => "express",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub shipping_method: String,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub shipping_name: String,
    pub shipping_address_line1: String,
    pub shipping_address_line2: Option<String>,
    pub shipping_city: String,
    pub shipping_state: Option<String>,
    pub shipping_postal_code: String,
    pub shipping_country: String,
    pub billing_name: String,
    pub billing_address_line1: String,
    pub billing_address_line2: Option<String>,
    pub billing_city: String,
    pub billing_state: Option<String>,
    pub billing_postal_code: String,
    pub billing_country: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item snapshot. `product_id` is cleared if the product is later deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
}

/// Checkout form, as posted by the checkout page or the JSON endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub shipping_name: String,
    pub shipping_address_line1: String,
    pub shipping_address_line2: Option<String>,
    pub shipping_city: String,
    pub shipping_state: Option<String>,
    pub shipping_postal_code: String,
    pub shipping_country: String,
    #[serde(default)]
    pub shipping_method: ShippingMethod,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub billing_same_as_shipping: Option<String>,
    pub billing_name: Option<String>,
    pub billing_address_line1: Option<String>,
    pub billing_address_line2: Option<String>,
    pub billing_city: Option<String>,
    pub billing_state: Option<String>,
    pub billing_postal_code: Option<String>,
    pub billing_country: Option<String>,
    pub notes: Option<String>,
}

/// Validated checkout details that get snapshotted onto the order row.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutDetails {
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub shipping: Address,
    pub billing: Address,
    pub shipping_method: ShippingMethod,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(value: &str, label: &str) -> Result<String, String> {
    let value = trimmed(value);
    if value.is_empty() {
        Err(format!("{} is required", label))
    } else {
        Ok(value)
    }
}

fn required_opt(value: &Option<String>, label: &str) -> Result<String, String> {
    optional(value).ok_or_else(|| format!("{} is required", label))
}

impl CheckoutForm {
    /// The billing address defaults to the shipping address unless a separate one is filled in.
    pub fn validate(&self) -> Result<CheckoutDetails, String> {
        let contact_email = trimmed(&self.contact_email).to_lowercase();
        if !contact_email.contains('@') {
            return Err("A valid contact email is required".to_string());
        }

        let shipping = Address {
            name: required(&self.shipping_name, "Shipping name")?,
            line1: required(&self.shipping_address_line1, "Shipping address")?,
            line2: optional(&self.shipping_address_line2),
            city: required(&self.shipping_city, "Shipping city")?,
            state: optional(&self.shipping_state),
            postal_code: required(&self.shipping_postal_code, "Shipping postal code")?,
            country: required(&self.shipping_country, "Shipping country")?,
        };

        let separate_billing = self.billing_same_as_shipping.is_none()
            && optional(&self.billing_address_line1).is_some();

        let billing = if separate_billing {
            Address {
                name: required_opt(&self.billing_name, "Billing name")?,
                line1: required_opt(&self.billing_address_line1, "Billing address")?,
                line2: optional(&self.billing_address_line2),
                city: required_opt(&self.billing_city, "Billing city")?,
                state: optional(&self.billing_state),
                postal_code: required_opt(&self.billing_postal_code, "Billing postal code")?,
                country: required_opt(&self.billing_country, "Billing country")?,
            }
        } else {
            shipping.clone()
        };

        Ok(CheckoutDetails {
            contact_email,
            contact_phone: optional(&self.contact_phone),
            shipping,
            billing,
            shipping_method: self.shipping_method,
            payment_method: self.payment_method,
            notes: optional(&self.notes),
        })
    }
}

/// Human-readable order number: `ORD-YYYYMMDD-` followed by eight uppercase hex characters.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDisplay {
    pub id: Uuid,
    pub order_number: String,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub shipping_method: String,
    pub subtotal: String,
    pub tax_amount: String,
    pub shipping_amount: String,
    pub total_amount: String,
    pub contact_email: String,
    pub shipping_address: String,
    pub billing_address: String,
    pub notes: String,
    pub created_at: String,
    pub can_cancel: bool,
}

fn format_address(
    name: &str,
    line1: &str,
    line2: &Option<String>,
    city: &str,
    state: &Option<String>,
    postal_code: &str,
    country: &str,
) -> String {
    let mut parts = vec![name.to_string(), line1.to_string()];
    if let Some(line2) = line2 {
        parts.push(line2.clone());
    }
    match state {
        Some(state) => parts.push(format!("{}, {} {}", city, state, postal_code)),
        None => parts.push(format!("{} {}", city, postal_code)),
    }
    parts.push(country.to_string());
    parts.join(", ")
}

impl From<&Order> for OrderDisplay {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number.clone(),
            status: order.status.to_string(),
            payment_status: order.payment_status.to_string(),
            payment_method: order.payment_method.replace('_', " "),
            shipping_method: order.shipping_method.clone(),
            subtotal: format!("{:.2}", order.subtotal),
            tax_amount: format!("{:.2}", order.tax_amount),
            shipping_amount: format!("{:.2}", order.shipping_amount),
            total_amount: format!("{:.2}", order.total_amount),
            contact_email: order.contact_email.clone(),
            shipping_address: format_address(
                &order.shipping_name,
                &order.shipping_address_line1,
                &order.shipping_address_line2,
                &order.shipping_city,
                &order.shipping_state,
                &order.shipping_postal_code,
                &order.shipping_country,
            ),
            billing_address: format_address(
                &order.billing_name,
                &order.billing_address_line1,
                &order.billing_address_line2,
                &order.billing_city,
                &order.billing_state,
                &order.billing_postal_code,
                &order.billing_country,
            ),
            notes: order.notes.clone().unwrap_or_default(),
            created_at: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
            can_cancel: order.status == OrderStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemDisplay {
    pub product_name: String,
    pub product_sku: String,
    pub unit_price: String,
    pub quantity: i32,
    pub line_total: String,
}

impl From<&OrderItem> for OrderItemDisplay {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_name: item.product_name.clone(),
            product_sku: item.product_sku.clone(),
            unit_price: format!("{:.2}", item.unit_price),
            quantity: item.quantity,
            line_total: format!("{:.2}", item.line_total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn checkout_form() -> CheckoutForm {
        CheckoutForm {
            contact_email: " Buyer@Example.com ".to_string(),
            shipping_name: "Grace Hopper".to_string(),
            shipping_address_line1: "1 Navy Way".to_string(),
            shipping_city: "Arlington".to_string(),
            shipping_state: Some("VA".to_string()),
            shipping_postal_code: "22201".to_string(),
            shipping_country: "US".to_string(),
            billing_same_as_shipping: Some("on".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn status_transitions_follow_fulfilment_order() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        assert!(OrderStatus::Cancelled.next_statuses().is_empty());
    }

    #[test]
    fn parses_statuses() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!("refunded".parse::<PaymentStatus>().unwrap(), PaymentStatus::Refunded);
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn billing_defaults_to_shipping() {
        let details = checkout_form().validate().unwrap();
        assert_eq!(details.contact_email, "buyer@example.com");
        assert_eq!(details.billing, details.shipping);
        assert_eq!(details.shipping_method, ShippingMethod::Standard);
    }

    #[test]
    fn separate_billing_must_be_complete() {
        let mut form = checkout_form();
        form.billing_same_as_shipping = None;
        form.billing_address_line1 = Some("2 Other St".to_string());
        assert_eq!(form.validate().unwrap_err(), "Billing name is required");

        form.billing_name = Some("Accounts".to_string());
        form.billing_city = Some("Boston".to_string());
        form.billing_postal_code = Some("02101".to_string());
        form.billing_country = Some("US".to_string());
        let details = form.validate().unwrap();
        assert_eq!(details.billing.city, "Boston");
        assert_ne!(details.billing, details.shipping);
    }

    #[test]
    fn shipping_fields_are_required() {
        let mut form = checkout_form();
        form.shipping_city = "   ".to_string();
        assert_eq!(form.validate().unwrap_err(), "Shipping city is required");
    }

    #[test]
    fn order_numbers_carry_the_date() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let number = generate_order_number(now);
        assert!(number.starts_with("ORD-20240309-"));
        let suffix = &number["ORD-20240309-".len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_ne!(number, generate_order_number(now));
    }

    #[test]
    fn formats_addresses_without_empty_parts() {
        let formatted = format_address(
            "Grace Hopper",
            "1 Navy Way",
            &None,
            "Arlington",
            &Some("VA".to_string()),
            "22201",
            "US",
        );
        assert_eq!(formatted, "Grace Hopper, 1 Navy Way, Arlington, VA 22201, US");
    }
}
