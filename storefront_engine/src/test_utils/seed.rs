//! Canned directory data for tests.
use crate::{
    db_types::{ContactDetails, Customer, DeliveryArea, Money, NewAffiliate, NewProduct, NewSpecificationStock, NewStore},
    order_objects::{OrderItemRequest, PlaceOrderRequest},
    traits::{AffiliateManagement, InventoryManagement, StoreDirectory},
    SqliteDatabase,
};

pub const STORE_ID: &str = "store-1";
pub const TEE_ID: &str = "tee";
pub const MUG_ID: &str = "mug";
pub const AFFILIATE_ID: &str = "aff-1";
pub const AFFILIATE_CODE: &str = "ALICE10";
pub const AREA_ID: &str = "lagos-island";
pub const WHOLESALER_ID: &str = "wholesaler-1";

pub fn shipping() -> ContactDetails {
    ContactDetails {
        name: "Ada Obi".to_string(),
        email: "ada@example.com".to_string(),
        phone: "+2348000000000".to_string(),
        address: "1 Marina Road".to_string(),
        city: "Lagos".to_string(),
        state: Some("Lagos".to_string()),
        country: "NG".to_string(),
        postal_code: None,
    }
}

pub fn guest_order(items: Vec<OrderItemRequest>) -> PlaceOrderRequest {
    items.into_iter().fold(PlaceOrderRequest::for_guest("guest-1", shipping()), |req, item| req.with_item(item))
}

/// One store with a t-shirt (size L is capped at 2 units), a mug, a delivery area, an affiliate at 10% and a verified
/// wholesaler.
pub async fn seed_store(db: &SqliteDatabase, tee_stock: i64) {
    db.upsert_store(NewStore::new(STORE_ID, "Test Store", "NGN")).await.expect("Error seeding store");
    let tee = NewProduct::new(TEE_ID, STORE_ID, "T-Shirt", Money::from(1000), tee_stock)
        .with_specification(NewSpecificationStock::new("1", "10", "Size", "M", tee_stock))
        .with_specification(NewSpecificationStock::new("1", "11", "Size", "L", tee_stock.min(2)))
        .with_specification(NewSpecificationStock::new("2", "20", "Colour", "Red", tee_stock));
    db.upsert_product(tee).await.expect("Error seeding t-shirt");
    let mug = NewProduct::new(MUG_ID, STORE_ID, "Mug", Money::from(500), 100).with_wholesaler_price(Money::from(350));
    db.upsert_product(mug).await.expect("Error seeding mug");
    let area = DeliveryArea {
        id: AREA_ID.to_string(),
        store_id: STORE_ID.into(),
        name: "Lagos Island".to_string(),
        fee: Money::from(300),
    };
    db.upsert_delivery_area(area).await.expect("Error seeding delivery area");
    let affiliate = NewAffiliate {
        id: AFFILIATE_ID.to_string(),
        store_id: STORE_ID.into(),
        code: AFFILIATE_CODE.to_string(),
        name: "Alice".to_string(),
        commission_percent: 10.0,
    };
    db.upsert_affiliate(affiliate).await.expect("Error seeding affiliate");
    let wholesaler = Customer {
        id: WHOLESALER_ID.to_string(),
        name: "Bulk Buyer".to_string(),
        email: "bulk@example.com".to_string(),
        phone: None,
        wholesaler_verified: true,
        wholesaler_discount_percent: Some(15.0),
    };
    db.upsert_customer(wholesaler).await.expect("Error seeding customer");
}
