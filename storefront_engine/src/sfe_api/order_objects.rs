use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{ContactDetails, FulfillmentStatus, PaymentStatus, ProductId, SelectedSpecification, StoreId},
    helpers::deserialize_identifier,
    pricing::OrderDiscount,
    sfe_api::errors::OrderFlowError,
};

/// Who is placing the order. Exactly one of the two identities must be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyerIdentity {
    User(String),
    Guest(String),
}

impl BuyerIdentity {
    /// Blank identifiers count as absent.
    pub fn from_parts(user_id: Option<&str>, guest_id: Option<&str>) -> Result<Self, OrderFlowError> {
        let user_id = user_id.map(str::trim).filter(|s| !s.is_empty());
        let guest_id = guest_id.map(str::trim).filter(|s| !s.is_empty());
        match (user_id, guest_id) {
            (Some(user), None) => Ok(Self::User(user.to_string())),
            (None, Some(guest)) => Ok(Self::Guest(guest.to_string())),
            _ => Err(OrderFlowError::MissingIdentity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRequest {
    #[serde(deserialize_with = "deserialize_product_id")]
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub selected_specifications: Vec<SelectedSpecification>,
}

fn deserialize_product_id<'de, D>(deserializer: D) -> Result<ProductId, D::Error>
where D: serde::Deserializer<'de> {
    deserialize_identifier(deserializer).map(ProductId::from)
}

impl OrderItemRequest {
    pub fn new<P: Into<ProductId>>(product_id: P, quantity: i64) -> Self {
        Self { product_id: product_id.into(), quantity, selected_specifications: vec![] }
    }

    pub fn with_specification(mut self, specification_id: &str, value_id: &str) -> Self {
        self.selected_specifications.push(SelectedSpecification::new(specification_id, value_id));
        self
    }
}

/// A request to place a new order against a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub guest_id: Option<String>,
    pub items: Vec<OrderItemRequest>,
    pub shipping: ContactDetails,
    #[serde(default)]
    pub billing: Option<ContactDetails>,
    #[serde(default)]
    pub delivery_area_id: Option<String>,
    /// An affiliate id or referral code.
    #[serde(default)]
    pub affiliate: Option<String>,
    #[serde(default)]
    pub coupon: Option<OrderDiscount>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PlaceOrderRequest {
    pub fn for_guest(guest_id: &str, shipping: ContactDetails) -> Self {
        Self {
            user_id: None,
            guest_id: Some(guest_id.to_string()),
            items: vec![],
            shipping,
            billing: None,
            delivery_area_id: None,
            affiliate: None,
            coupon: None,
            notes: None,
        }
    }

    pub fn for_user(user_id: &str, shipping: ContactDetails) -> Self {
        Self { user_id: Some(user_id.to_string()), guest_id: None, ..Self::for_guest("", shipping) }
    }

    pub fn with_item(mut self, item: OrderItemRequest) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_affiliate(mut self, reference: &str) -> Self {
        self.affiliate = Some(reference.to_string());
        self
    }

    pub fn with_delivery_area(mut self, area_id: &str) -> Self {
        self.delivery_area_id = Some(area_id.to_string());
        self
    }

    pub fn with_coupon(mut self, coupon: OrderDiscount) -> Self {
        self.coupon = Some(coupon);
        self
    }

    pub fn identity(&self) -> Result<BuyerIdentity, OrderFlowError> {
        BuyerIdentity::from_parts(self.user_id.as_deref(), self.guest_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub store_id: Option<StoreId>,
    pub customer_user_id: Option<String>,
    pub customer_guest_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub fulfillment_status: Option<Vec<FulfillmentStatus>>,
    pub has_payment_reference: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn with_store_id(mut self, store_id: StoreId) -> Self {
        self.store_id = Some(store_id);
        self
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.customer_user_id = Some(user_id);
        self
    }

    pub fn with_guest_id(mut self, guest_id: String) -> Self {
        self.customer_guest_id = Some(guest_id);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn with_fulfillment_status(mut self, status: FulfillmentStatus) -> Self {
        self.fulfillment_status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_payment_reference(mut self, present: bool) -> Self {
        self.has_payment_reference = Some(present);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Orders whose payment was started but has not been settled either way.
    pub fn awaiting_payment() -> Self {
        Self::default()
            .with_payment_status(PaymentStatus::Unpaid)
            .with_fulfillment_status(FulfillmentStatus::Pending)
            .with_payment_reference(true)
    }

    pub fn is_empty(&self) -> bool {
        self.store_id.is_none() &&
            self.customer_user_id.is_none() &&
            self.customer_guest_id.is_none() &&
            self.payment_status.is_none() &&
            self.fulfillment_status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.has_payment_reference.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(store_id) = &self.store_id {
            write!(f, "store: {store_id}. ")?;
        }
        if let Some(user_id) = &self.customer_user_id {
            write!(f, "user: {user_id}. ")?;
        }
        if let Some(guest_id) = &self.customer_guest_id {
            write!(f, "guest: {guest_id}. ")?;
        }
        if let Some(status) = &self.payment_status {
            write!(f, "payment: {status}. ")?;
        }
        if let Some(statuses) = &self.fulfillment_status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "fulfillment: [{statuses}]. ")?;
        }
        if let Some(present) = self.has_payment_reference {
            write!(f, "has reference: {present}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        Ok(())
    }
}
