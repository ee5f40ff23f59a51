//! Data types that are persisted by, or handed out from, the storefront backends.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row, Type};
pub use storefront_common::Money;
use thiserror::Error;

use crate::helpers::{canonical_identifier, deserialize_identifier};

//--------------------------------------     Identifiers      ---------------------------------------------------------
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identifies a storefront. Every order, product, delivery area and affiliate belongs to exactly one store.
    StoreId
);
string_id!(ProductId);
string_id!(
    /// The immutable, customer-facing order identifier (`ORD-YYYYMMDD-XXXXXX`).
    OrderNumber
);

//--------------------------------------    PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// No confirmed payment has been seen for the order.
    Unpaid,
    /// The gateway (or a trusted fallback) confirmed payment. Terminal.
    Paid,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Unpaid => write!(f, "Unpaid"),
            PaymentStatus::Paid => write!(f, "Paid"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status: {0}")]
pub struct ConversionError(String);

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unpaid" => Ok(Self::Unpaid),
            "Paid" => Ok(Self::Paid),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------  FulfillmentStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum FulfillmentStatus {
    /// Order placed, waiting for payment.
    Pending,
    /// Paid and being prepared.
    Processing,
    Shipped,
    Delivered,
    /// Cancelled by the buyer, an administrator or a failed payment. Stock has been restored.
    Cancelled,
    Refunded,
}

impl FulfillmentStatus {
    /// Orders that have physically left the store cannot be cancelled.
    pub fn can_cancel(&self) -> bool {
        !matches!(self, Self::Shipped | Self::Delivered)
    }

    /// The administrative fulfilment transitions that are permitted.
    pub fn can_transition_to(&self, next: FulfillmentStatus) -> bool {
        use FulfillmentStatus::*;
        matches!(
            (self, next),
            (Processing, Shipped) |
                (Shipped, Delivered) |
                (Processing, Refunded) |
                (Shipped, Refunded) |
                (Delivered, Refunded)
        )
    }
}

impl Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FulfillmentStatus::Pending => "Pending",
            FulfillmentStatus::Processing => "Processing",
            FulfillmentStatus::Shipped => "Shipped",
            FulfillmentStatus::Delivered => "Delivered",
            FulfillmentStatus::Cancelled => "Cancelled",
            FulfillmentStatus::Refunded => "Refunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for FulfillmentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid fulfillment status: {s}"))),
        }
    }
}

impl From<String> for FulfillmentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid fulfillment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            FulfillmentStatus::Pending
        })
    }
}

//--------------------------------------        Store         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub email: Option<String>,
    pub currency: String,
    /// Applied to `subtotal - discount`. Zero for most stores.
    pub tax_percent: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStore {
    pub id: StoreId,
    pub name: String,
    pub email: Option<String>,
    pub currency: String,
    pub tax_percent: f64,
    pub is_active: bool,
}

impl NewStore {
    pub fn new<S: Into<StoreId>>(id: S, name: &str, currency: &str) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            email: None,
            currency: currency.to_string(),
            tax_percent: 0.0,
            is_active: true,
        }
    }
}

//--------------------------------------       Customer       ---------------------------------------------------------
/// A registered buyer. Guests have no customer record.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub wholesaler_verified: bool,
    pub wholesaler_discount_percent: Option<f64>,
}

//--------------------------------------     DeliveryArea     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DeliveryArea {
    pub id: String,
    pub store_id: StoreId,
    pub name: String,
    pub fee: Money,
}

//--------------------------------------       Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    pub image_url: Option<String>,
    pub price: Money,
    pub sale_percentage: Option<f64>,
    pub is_on_sale: bool,
    /// The comparison price offered to verified wholesalers.
    pub wholesaler_price: Option<Money>,
    pub is_active: bool,
    pub general_quantity: i64,
    pub sold_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One variant axis-value pair (e.g. size=XL) with its own stock counter.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SpecificationStock {
    pub product_id: ProductId,
    pub position: i64,
    pub specification_id: String,
    pub value_id: String,
    pub display_title: String,
    pub display_value: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    pub image_url: Option<String>,
    pub price: Money,
    pub sale_percentage: Option<f64>,
    pub is_on_sale: bool,
    pub wholesaler_price: Option<Money>,
    pub is_active: bool,
    pub general_quantity: i64,
    pub specifications: Vec<NewSpecificationStock>,
}

impl NewProduct {
    pub fn new<P: Into<ProductId>, S: Into<StoreId>>(id: P, store_id: S, name: &str, price: Money, qty: i64) -> Self {
        Self {
            id: id.into(),
            store_id: store_id.into(),
            name: name.to_string(),
            image_url: None,
            price,
            sale_percentage: None,
            is_on_sale: false,
            wholesaler_price: None,
            is_active: true,
            general_quantity: qty,
            specifications: vec![],
        }
    }

    pub fn with_specification(mut self, spec: NewSpecificationStock) -> Self {
        self.specifications.push(spec);
        self
    }

    pub fn on_sale(mut self, percentage: f64) -> Self {
        self.is_on_sale = true;
        self.sale_percentage = Some(percentage);
        self
    }

    pub fn with_wholesaler_price(mut self, price: Money) -> Self {
        self.wholesaler_price = Some(price);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSpecificationStock {
    pub specification_id: String,
    pub value_id: String,
    pub display_title: String,
    pub display_value: String,
    pub quantity: i64,
}

impl NewSpecificationStock {
    pub fn new(specification_id: &str, value_id: &str, title: &str, value: &str, quantity: i64) -> Self {
        Self {
            specification_id: canonical_identifier(specification_id),
            value_id: canonical_identifier(value_id),
            display_title: title.to_string(),
            display_value: value.to_string(),
            quantity,
        }
    }
}

/// A buyer's choice of specification value for one line item.
///
/// Both identifiers are held in canonical form (see [`canonical_identifier`]), whatever wire type the client used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedSpecification {
    #[serde(deserialize_with = "deserialize_identifier")]
    pub specification_id: String,
    #[serde(deserialize_with = "deserialize_identifier")]
    pub value_id: String,
}

impl SelectedSpecification {
    pub fn new(specification_id: &str, value_id: &str) -> Self {
        Self { specification_id: canonical_identifier(specification_id), value_id: canonical_identifier(value_id) }
    }
}

impl Display for SelectedSpecification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.specification_id, self.value_id)
    }
}

//--------------------------------------  AffiliateAccount    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AffiliateAccount {
    pub id: String,
    pub store_id: StoreId,
    pub code: String,
    pub name: String,
    pub commission_percent: f64,
    pub total_sales: Money,
    pub total_commission: Money,
    pub total_paid_out: Money,
    /// Always `total_commission - total_paid_out`, and never negative.
    pub balance: Money,
    pub total_orders: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAffiliate {
    pub id: String,
    pub store_id: StoreId,
    pub code: String,
    pub name: String,
    pub commission_percent: f64,
}

//--------------------------------------      Snapshots       ---------------------------------------------------------
/// Point-in-time copy of the store, frozen into the order when it is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub store_id: StoreId,
    pub name: String,
    pub email: Option<String>,
    pub currency: String,
}

impl From<&Store> for StoreSnapshot {
    fn from(store: &Store) -> Self {
        Self {
            store_id: store.id.clone(),
            name: store.name.clone(),
            email: store.email.clone(),
            currency: store.currency.clone(),
        }
    }
}

/// Point-in-time copy of the buyer. Exactly one of `user_id` and `guest_id` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub user_id: Option<String>,
    pub guest_id: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_wholesaler: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateSnapshot {
    pub affiliate_id: String,
    pub code: String,
    pub commission_percent: f64,
}

impl From<&AffiliateAccount> for AffiliateSnapshot {
    fn from(account: &AffiliateAccount) -> Self {
        Self {
            affiliate_id: account.id.clone(),
            code: account.code.clone(),
            commission_percent: account.commission_percent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub country: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

//--------------------------------------      LineItem        ---------------------------------------------------------
/// Which pricing rule produced a line item's unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PriceRule {
    List,
    Sale,
    Wholesaler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    /// The product's list price when the order was placed.
    pub list_price: Money,
    pub unit_price: Money,
    pub price_rule: PriceRule,
    pub quantity: i64,
    pub line_total: Money,
    pub selected_specifications: Vec<SelectedSpecification>,
}

impl<'r> FromRow<'r, SqliteRow> for LineItem {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            product_id: row.try_get("product_id")?,
            product_name: row.try_get("product_name")?,
            product_image: row.try_get("product_image")?,
            list_price: row.try_get("list_price")?,
            unit_price: row.try_get("unit_price")?,
            price_rule: row.try_get("price_rule")?,
            quantity: row.try_get("quantity")?,
            line_total: row.try_get("line_total")?,
            selected_specifications: json_column(row, "selected_specifications")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl PricingBreakdown {
    /// The amount that affiliate commission is calculated on.
    pub fn commissionable(&self) -> Money {
        self.subtotal - self.discount
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub store: StoreSnapshot,
    pub customer: CustomerSnapshot,
    pub shipping_info: ContactDetails,
    pub billing_info: Option<ContactDetails>,
    pub delivery_area_id: Option<String>,
    pub line_items: Vec<LineItem>,
    pub pricing: PricingBreakdown,
    pub affiliate: Option<AffiliateSnapshot>,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub payment_reference: Option<String>,
    pub authorization_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn is_cancelled(&self) -> bool {
        self.fulfillment_status == FulfillmentStatus::Cancelled
    }

    /// True while the order still waits on the payment gateway.
    pub fn awaiting_payment(&self) -> bool {
        self.payment_status == PaymentStatus::Unpaid && self.fulfillment_status == FulfillmentStatus::Pending
    }
}

/// Line items are stored in their own table, so `from_row` leaves `line_items` empty. The backend fills them in.
impl<'r> FromRow<'r, SqliteRow> for Order {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let affiliate_id: Option<String> = row.try_get("affiliate_id")?;
        let affiliate = match affiliate_id {
            Some(affiliate_id) => Some(AffiliateSnapshot {
                affiliate_id,
                code: row.try_get::<Option<String>, _>("affiliate_code")?.unwrap_or_default(),
                commission_percent: row.try_get::<Option<f64>, _>("affiliate_commission_percent")?.unwrap_or_default(),
            }),
            None => None,
        };
        let billing: Option<String> = row.try_get("billing_info")?;
        let billing_info = billing.map(|s| parse_json("billing_info", &s)).transpose()?;
        Ok(Self {
            id: row.try_get("id")?,
            order_number: row.try_get("order_number")?,
            store: StoreSnapshot {
                store_id: row.try_get("store_id")?,
                name: row.try_get("store_name")?,
                email: row.try_get("store_email")?,
                currency: row.try_get("currency")?,
            },
            customer: CustomerSnapshot {
                user_id: row.try_get("customer_user_id")?,
                guest_id: row.try_get("customer_guest_id")?,
                name: row.try_get("customer_name")?,
                email: row.try_get("customer_email")?,
                phone: row.try_get("customer_phone")?,
                is_wholesaler: row.try_get("customer_is_wholesaler")?,
            },
            shipping_info: json_column(row, "shipping_info")?,
            billing_info,
            delivery_area_id: row.try_get("delivery_area_id")?,
            line_items: vec![],
            pricing: PricingBreakdown {
                subtotal: row.try_get("subtotal")?,
                discount: row.try_get("discount")?,
                shipping: row.try_get("shipping_cost")?,
                tax: row.try_get("tax")?,
                total: row.try_get("total")?,
            },
            affiliate,
            payment_status: row.try_get("payment_status")?,
            fulfillment_status: row.try_get("fulfillment_status")?,
            payment_reference: row.try_get("payment_reference")?,
            authorization_url: row.try_get("authorization_url")?,
            paid_at: row.try_get("paid_at")?,
            cancelled_at: row.try_get("cancelled_at")?,
            cancelled_by: row.try_get("cancelled_by")?,
            cancellation_reason: row.try_get("cancellation_reason")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn json_column<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    parse_json(column, &raw)
}

fn parse_json<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(raw)
        .map_err(|e| sqlx::Error::ColumnDecode { index: column.to_string(), source: Box::new(e) })
}

/// Everything needed to persist a freshly placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub store: StoreSnapshot,
    pub customer: CustomerSnapshot,
    pub shipping_info: ContactDetails,
    pub billing_info: Option<ContactDetails>,
    pub delivery_area_id: Option<String>,
    pub line_items: Vec<LineItem>,
    pub pricing: PricingBreakdown,
    pub affiliate: Option<AffiliateSnapshot>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn cancellable_states() {
        use FulfillmentStatus::*;
        assert!(Pending.can_cancel());
        assert!(Processing.can_cancel());
        assert!(!Shipped.can_cancel());
        assert!(!Delivered.can_cancel());
    }

    #[test]
    fn fulfilment_transitions() {
        use FulfillmentStatus::*;
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Delivered.can_transition_to(Refunded));
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Delivered.can_transition_to(Processing));
        assert!(!Cancelled.can_transition_to(Refunded));
    }

    #[test]
    fn status_parsing() {
        assert_eq!("canceled".parse::<FulfillmentStatus>().unwrap(), FulfillmentStatus::Cancelled);
        assert_eq!("Shipped".parse::<FulfillmentStatus>().unwrap(), FulfillmentStatus::Shipped);
        assert_eq!(FulfillmentStatus::from("nonsense".to_string()), FulfillmentStatus::Pending);
        assert_eq!("Paid".parse::<PaymentStatus>().unwrap(), PaymentStatus::Paid);
        assert!("paid!".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn selected_specifications_accept_numbers_and_strings() {
        let a: SelectedSpecification = serde_json::from_value(json!({"specification_id": 3, "value_id": "0012"})).unwrap();
        let b = SelectedSpecification::new("3", "12");
        assert_eq!(a, b);
    }
}
