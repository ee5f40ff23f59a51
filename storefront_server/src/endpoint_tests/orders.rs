use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;
use storefront_engine::{
    test_utils::seed::{AFFILIATE_CODE, MUG_ID, STORE_ID},
    InventoryApi,
};

use super::helpers::{mug_order, place_and_pay, send, test_state};

#[actix_web::test]
async fn health_check() {
    let state = test_state(|_| {}).await;
    let (status, body) = send(&state, TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("👍️\n"));
}

#[actix_web::test]
async fn place_order_takes_stock() {
    let state = test_state(|_| {}).await;
    let req = TestRequest::post().uri(&format!("/orders/{STORE_ID}")).set_json(mug_order(3));
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order = &body["order"];
    assert_eq!(order["payment_status"], "Unpaid");
    assert_eq!(order["fulfillment_status"], "Pending");
    assert_eq!(order["customer"]["guest_id"], "guest-42");
    assert!(body.get("payment").is_none());
    let stock = InventoryApi::new(state.db.clone()).stock(&MUG_ID.into()).await.unwrap();
    assert_eq!(stock.general_quantity, 97);

    let number = order["order_number"].as_str().unwrap();
    let (status, fetched) = send(&state, TestRequest::get().uri(&format!("/orders/{STORE_ID}/{number}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["order_number"], number);
}

#[actix_web::test]
async fn place_order_with_payment() {
    let state = test_state(|_| {}).await;
    let mut body = mug_order(1);
    body["initialize_payment"] = json!(true);
    let (status, body) = send(&state, TestRequest::post().uri(&format!("/orders/{STORE_ID}")).set_json(body)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment"]["reference"], "ref-1");
    assert_eq!(body["payment"]["authorization_url"], "https://pay.example.com/ref-1");
    assert_eq!(body["order"]["payment_reference"], "ref-1");
}

#[actix_web::test]
async fn refused_payment_withdraws_the_order() {
    let state = test_state(|_| {}).await;
    state.gateway.refuse_payments(true);
    let mut body = mug_order(4);
    body["initialize_payment"] = json!(true);
    let (status, body) = send(&state, TestRequest::post().uri(&format!("/orders/{STORE_ID}")).set_json(body)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY, "{body}");
    let stock = InventoryApi::new(state.db.clone()).stock(&MUG_ID.into()).await.unwrap();
    assert_eq!(stock.general_quantity, 100);
}

#[actix_web::test]
async fn place_order_insufficient_stock() {
    let state = test_state(|_| {}).await;
    let (status, body) =
        send(&state, TestRequest::post().uri(&format!("/orders/{STORE_ID}")).set_json(mug_order(101))).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert!(body["error"].as_str().is_some());
}

#[actix_web::test]
async fn place_order_needs_exactly_one_identity() {
    let state = test_state(|_| {}).await;
    let mut body = mug_order(1);
    body["user_id"] = json!("user-7");
    let (status, _) = send(&state, TestRequest::post().uri(&format!("/orders/{STORE_ID}")).set_json(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = mug_order(1);
    body["guest_id"] = json!("   ");
    let (status, _) = send(&state, TestRequest::post().uri(&format!("/orders/{STORE_ID}")).set_json(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_store_and_order() {
    let state = test_state(|_| {}).await;
    let (status, _) = send(&state, TestRequest::post().uri("/orders/no-such-store").set_json(mug_order(1))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&state, TestRequest::get().uri(&format!("/orders/{STORE_ID}/ORD-NOPE"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn cancel_restores_stock_once() {
    let state = test_state(|_| {}).await;
    let (status, body) =
        send(&state, TestRequest::post().uri(&format!("/orders/{STORE_ID}")).set_json(mug_order(5))).await;
    assert_eq!(status, StatusCode::OK);
    let number = body["order"]["order_number"].as_str().unwrap().to_string();
    let uri = format!("/orders/{STORE_ID}/{number}/cancel");

    let (status, body) = send(&state, TestRequest::post().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["changed"], true);
    assert_eq!(body["order"]["fulfillment_status"], "Cancelled");
    assert_eq!(body["order"]["cancelled_by"], "customer");

    let req = TestRequest::post().uri(&uri).set_json(json!({"reason": "Changed my mind", "cancelled_by": "admin"}));
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);
    let stock = InventoryApi::new(state.db.clone()).stock(&MUG_ID.into()).await.unwrap();
    assert_eq!(stock.general_quantity, 100);
}

#[actix_web::test]
async fn fulfillment_updates() {
    let state = test_state(|cfg| cfg.enable_payment_fallback = true).await;
    let (number, reference) = place_and_pay(&state, mug_order(1)).await;
    let uri = format!("/orders/{STORE_ID}/{number}/fulfillment");

    // Unpaid orders cannot ship
    let req = TestRequest::patch().uri(&uri).set_json(json!({"status": "shipped"}));
    let (status, _) = send(&state, req).await;
    assert_ne!(status, StatusCode::OK);

    let fallback = format!("/payments/{STORE_ID}/update-order-status/{reference}");
    let (status, _) = send(&state, TestRequest::patch().uri(&fallback)).await;
    assert_eq!(status, StatusCode::OK);

    let req = TestRequest::patch().uri(&uri).set_json(json!({"status": "Shipped"}));
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["fulfillment_status"], "Shipped");

    let req = TestRequest::patch().uri(&uri).set_json(json!({"status": "teleported"}));
    let (status, _) = send(&state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = TestRequest::patch().uri(&format!("/orders/other-store/{number}/fulfillment"));
    let (status, _) = send(&state, req.set_json(json!({"status": "delivered"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Shipped orders cannot be cancelled
    let (status, _) = send(&state, TestRequest::post().uri(&format!("/orders/{STORE_ID}/{number}/cancel"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn affiliate_earns_commission_when_paid() {
    let state = test_state(|cfg| cfg.enable_payment_fallback = true).await;
    let mut body = mug_order(2);
    body["affiliate"] = json!(AFFILIATE_CODE);
    let (_, reference) = place_and_pay(&state, body).await;
    let fallback = format!("/payments/{STORE_ID}/update-order-status/{reference}");
    let (status, _) = send(&state, TestRequest::patch().uri(&fallback)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, account) = send(&state, TestRequest::get().uri(&format!("/affiliates/{STORE_ID}/aff-1"))).await;
    assert_eq!(status, StatusCode::OK, "{account}");
    assert_eq!(account["total_orders"], 1);
    assert!(account["total_commission"].as_i64().unwrap() > 0);
    assert_eq!(account["balance"], account["total_commission"]);

    let (status, _) = send(&state, TestRequest::get().uri(&format!("/affiliates/{STORE_ID}/nobody"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
