use std::time::Duration;

use cucumber::{then, when};
use storefront_engine::{
    db_types::{FulfillmentStatus, Money, OrderNumber, PaymentStatus, ProductId},
    inventory::StockLevel,
    order_objects::OrderItemRequest,
    test_utils::seed::{guest_order, AFFILIATE_ID},
    traits::{GatewayStatus, InventoryManagement},
    OrderFlowError,
};

use crate::cucumber::StorefrontWorld;

fn item(product: &str, quantity: i64, size: Option<&str>) -> OrderItemRequest {
    let item = OrderItemRequest::new(product, quantity);
    match size {
        Some("M") => item.with_specification("1", "10"),
        Some("L") => item.with_specification("1", "11"),
        Some(other) => panic!("Unknown size {other}"),
        None => item,
    }
}

async fn place(world: &mut StorefrontWorld, alias: Option<&str>, guest: &str, items: Vec<OrderItemRequest>, affiliate: Option<&str>) {
    let mut request = guest_order(items);
    request.guest_id = Some(guest.to_string());
    if let Some(code) = affiliate {
        request = request.with_affiliate(code);
    }
    let store_id = world.store_id();
    let result = world.system().orders.place_order(&store_id, request).await;
    match result {
        Ok(order) => {
            world.last_error = None;
            if let Some(alias) = alias {
                world.orders.insert(alias.to_string(), order.order_number);
            }
        },
        Err(e) => world.last_error = Some(e),
    }
}

//------------------------------------------ Placement ------------------------------------------

#[when(expr = "guest '{word}' orders {int} of '{word}' as order '{word}'")]
async fn guest_orders(world: &mut StorefrontWorld, guest: String, qty: i64, product: String, alias: String) {
    place(world, Some(&alias), &guest, vec![item(&product, qty, None)], None).await;
    assert!(world.last_error.is_none(), "Order was rejected: {:?}", world.last_error);
}

#[when(expr = "guest '{word}' orders {int} of '{word}' in size {word} as order '{word}'")]
async fn guest_orders_size(
    world: &mut StorefrontWorld,
    guest: String,
    qty: i64,
    product: String,
    size: String,
    alias: String,
) {
    place(world, Some(&alias), &guest, vec![item(&product, qty, Some(&size))], None).await;
    assert!(world.last_error.is_none(), "Order was rejected: {:?}", world.last_error);
}

#[when(expr = "guest '{word}' orders {int} of '{word}' through affiliate '{word}' as order '{word}'")]
async fn guest_orders_via_affiliate(
    world: &mut StorefrontWorld,
    guest: String,
    qty: i64,
    product: String,
    affiliate: String,
    alias: String,
) {
    place(world, Some(&alias), &guest, vec![item(&product, qty, None)], Some(&affiliate)).await;
    assert!(world.last_error.is_none(), "Order was rejected: {:?}", world.last_error);
}

#[when(expr = "guest '{word}' tries to order {int} of '{word}'")]
async fn guest_tries_to_order(world: &mut StorefrontWorld, guest: String, qty: i64, product: String) {
    place(world, None, &guest, vec![item(&product, qty, None)], None).await;
}

#[when(expr = "guest '{word}' tries to order {int} of '{word}' in size {word}")]
async fn guest_tries_to_order_size(world: &mut StorefrontWorld, guest: String, qty: i64, product: String, size: String) {
    place(world, None, &guest, vec![item(&product, qty, Some(&size))], None).await;
}

#[when(expr = "guest '{word}' tries to order {int} of '{word}' and {int} of '{word}'")]
async fn guest_tries_to_order_two(
    world: &mut StorefrontWorld,
    guest: String,
    qty1: i64,
    product1: String,
    qty2: i64,
    product2: String,
) {
    place(world, None, &guest, vec![item(&product1, qty1, None), item(&product2, qty2, None)], None).await;
}

#[when(expr = "guest '{word}' tries to order {int} of '{word}' through affiliate '{word}'")]
async fn guest_tries_affiliate(world: &mut StorefrontWorld, guest: String, qty: i64, product: String, affiliate: String) {
    place(world, None, &guest, vec![item(&product, qty, None)], Some(&affiliate)).await;
}

#[then(expr = "the order is rejected for insufficient {word} stock")]
async fn rejected_for_stock(world: &mut StorefrontWorld, level: String) {
    match &world.last_error {
        Some(OrderFlowError::InsufficientStock { level: l, .. }) => {
            let general = matches!(l, StockLevel::General);
            assert_eq!(general, level == "general", "Wrong stock level: {l}");
        },
        other => panic!("Expected an insufficient stock error, got {other:?}"),
    }
}

#[then(expr = "the order is rejected because {string} was not found")]
async fn rejected_not_found(world: &mut StorefrontWorld, what: String) {
    match &world.last_error {
        Some(OrderFlowError::NotFound(msg)) => assert!(msg.contains(&what), "{msg} does not mention {what}"),
        other => panic!("Expected a not found error, got {other:?}"),
    }
}

#[then(expr = "product '{word}' has {int} units left")]
async fn units_left(world: &mut StorefrontWorld, product: String, qty: i64) {
    let stock = world.system().db.fetch_product_stock(&ProductId::from(product)).await.unwrap().expect("No product");
    assert_eq!(stock.general_quantity, qty);
}

#[then(expr = "product '{word}' has sold {int} units")]
async fn units_sold(world: &mut StorefrontWorld, product: String, qty: i64) {
    let stock = world.system().db.fetch_product_stock(&ProductId::from(product)).await.unwrap().expect("No product");
    assert_eq!(stock.sold_count, qty);
}

#[then(expr = "size {word} of '{word}' has {int} units left")]
async fn size_units_left(world: &mut StorefrontWorld, size: String, product: String, qty: i64) {
    let stock = world.system().db.fetch_product_stock(&ProductId::from(product)).await.unwrap().expect("No product");
    let value_id = match size.as_str() {
        "M" => "10",
        "L" => "11",
        other => panic!("Unknown size {other}"),
    };
    assert_eq!(stock.specification_quantity("1", value_id), Some(qty));
}

#[then(expr = "order '{word}' is {word} and {word}")]
async fn order_status(world: &mut StorefrontWorld, alias: String, payment: String, fulfillment: String) {
    let order = world.order(&alias).await;
    assert_eq!(order.payment_status, payment.parse::<PaymentStatus>().unwrap());
    assert_eq!(order.fulfillment_status, fulfillment.parse::<FulfillmentStatus>().unwrap());
}

#[then(expr = "order '{word}' has a total of {int}")]
async fn order_total(world: &mut StorefrontWorld, alias: String, total: i64) {
    let order = world.order(&alias).await;
    assert_eq!(order.pricing.total, Money::from(total));
}

#[then(expr = "order '{word}' does not exist")]
async fn order_gone(world: &mut StorefrontWorld, alias: String) {
    let number = world.order_number(&alias);
    let order = world.system().orders.fetch_order(&number).await.unwrap();
    assert!(order.is_none(), "Order {number} still exists");
}

//------------------------------------------ Payments ------------------------------------------

#[when(expr = "payment for order '{word}' is started")]
async fn start_payment(world: &mut StorefrontWorld, alias: String) {
    let number = world.order_number(&alias);
    let store_id = world.store_id();
    let result = world.system().payments.initialize_payment(&store_id, &number, None).await;
    match result {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e),
    }
}

#[when("the gateway refuses payments")]
async fn refuse_payments(world: &mut StorefrontWorld) {
    world.system().gateway.refuse_payments(true);
}

#[when("the gateway goes offline")]
async fn gateway_offline(world: &mut StorefrontWorld) {
    world.system().gateway.go_offline(true);
}

#[then("the gateway error is reported")]
async fn gateway_error(world: &mut StorefrontWorld) {
    assert!(
        matches!(world.last_error, Some(OrderFlowError::PaymentGateway(_))),
        "Expected a gateway error, got {:?}",
        world.last_error
    );
}

#[when(expr = "the gateway reports {word} for order '{word}'")]
async fn gateway_reports(world: &mut StorefrontWorld, status: String, alias: String) {
    let reference = world.reference(&alias).await;
    world.system().gateway.set_status(&reference, GatewayStatus::from(status.as_str()));
}

#[when(expr = "a {word} webhook arrives for order '{word}'")]
async fn webhook_arrives(world: &mut StorefrontWorld, event: String, alias: String) {
    let reference = world.reference(&alias).await;
    let payload = serde_json::json!({ "event": format!("charge.{event}"), "data": { "reference": reference } });
    let store_id = world.store_id();
    world.system().payments.webhook(&store_id, &payload).await.expect("Error handling webhook");
}

#[when(expr = "order '{word}' is polled")]
async fn poll_order(world: &mut StorefrontWorld, alias: String) {
    let reference = world.reference(&alias).await;
    let store_id = world.store_id();
    let outcome = world.system().payments.poll(&store_id, &reference).await.expect("Error polling payment");
    world.last_poll = Some(outcome);
}

#[then(expr = "polling should {word}")]
async fn polling_should(world: &mut StorefrontWorld, verdict: String) {
    let poll = world.last_poll.as_ref().expect("Nothing has been polled");
    let expected = match verdict.as_str() {
        "continue" => true,
        "stop" => false,
        other => panic!("Unknown verdict {other}"),
    };
    assert_eq!(poll.should_continue_polling, expected, "{}", poll.message);
}

#[then(expr = "the poll message says {string}")]
async fn poll_message(world: &mut StorefrontWorld, text: String) {
    let poll = world.last_poll.as_ref().expect("Nothing has been polled");
    assert!(poll.message.contains(&text), "'{}' does not contain '{text}'", poll.message);
}

#[then(expr = "the gateway was asked {int} times")]
async fn gateway_verify_count(world: &mut StorefrontWorld, count: usize) {
    assert_eq!(world.system().gateway.verify_calls(), count);
}

//------------------------------------------ Lifecycle ------------------------------------------

#[when(expr = "order '{word}' is cancelled by '{word}'")]
async fn cancel(world: &mut StorefrontWorld, alias: String, by: String) {
    let number = world.order_number(&alias);
    let store_id = world.store_id();
    let result = world.system().orders.cancel_order(&store_id, &number, "Changed my mind", &by).await;
    match result {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "order '{word}' is marked {word}")]
async fn fulfil(world: &mut StorefrontWorld, alias: String, status: String) {
    let number: OrderNumber = world.order_number(&alias);
    let status = status.parse::<FulfillmentStatus>().expect("Not a fulfillment status");
    world.system().orders.update_fulfillment_status(&number, status).await.expect("Error updating order");
}

#[then("the cancellation is refused")]
async fn cancellation_refused(world: &mut StorefrontWorld) {
    assert!(
        matches!(world.last_error, Some(OrderFlowError::CannotCancel { .. })),
        "Expected CannotCancel, got {:?}",
        world.last_error
    );
}

//------------------------------------------ Affiliates ------------------------------------------

#[then(expr = "the affiliate has a balance of {int} from {int} orders")]
async fn affiliate_balance(world: &mut StorefrontWorld, balance: i64, orders: i64) {
    let store_id = world.store_id();
    let account = world.system().affiliates.account(&store_id, AFFILIATE_ID).await.expect("Error fetching affiliate");
    assert_eq!(account.balance, Money::from(balance));
    assert_eq!(account.total_orders, orders);
}

#[then(expr = "the affiliate has total sales of {int}")]
async fn affiliate_sales(world: &mut StorefrontWorld, sales: i64) {
    let store_id = world.store_id();
    let account = world.system().affiliates.account(&store_id, AFFILIATE_ID).await.expect("Error fetching affiliate");
    assert_eq!(account.total_sales, Money::from(sales));
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut StorefrontWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
