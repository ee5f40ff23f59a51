use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;
use storefront_engine::{
    test_utils::seed::{MUG_ID, STORE_ID},
    traits::GatewayStatus,
    InventoryApi,
};

use super::helpers::{mug_order, place_and_pay, send, signed_webhook, test_state, webhook_request};

#[actix_web::test]
async fn initialize_is_idempotent() {
    let state = test_state(|_| {}).await;
    let (status, body) =
        send(&state, TestRequest::post().uri(&format!("/orders/{STORE_ID}")).set_json(mug_order(1))).await;
    assert_eq!(status, StatusCode::OK);
    let number = body["order"]["order_number"].clone();
    let uri = format!("/payments/{STORE_ID}/initialize");

    let (status, first) = send(&state, TestRequest::post().uri(&uri).set_json(json!({"order_number": number}))).await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["already_initialized"], false);
    let (status, second) = send(&state, TestRequest::post().uri(&uri).set_json(json!({"order_number": number}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["already_initialized"], true);
    assert_eq!(first["reference"], second["reference"]);
    assert_eq!(state.gateway.requests().len(), 1);

    let (status, _) =
        send(&state, TestRequest::post().uri(&uri).set_json(json!({"order_number": "ORD-MISSING"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn signed_webhook_pays_the_order() {
    let state = test_state(|_| {}).await;
    let (number, reference) = place_and_pay(&state, mug_order(1)).await;
    let payload = json!({"event": "charge.success", "data": {"reference": reference, "status": "success"}});

    let (status, body) = send(&state, signed_webhook(&payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true, "{body}");

    let (_, order) = send(&state, TestRequest::get().uri(&format!("/orders/{STORE_ID}/{number}"))).await;
    assert_eq!(order["payment_status"], "Paid");
    assert_eq!(order["fulfillment_status"], "Processing");

    // A redelivery changes nothing
    let (status, body) = send(&state, signed_webhook(&payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], format!("Order {number} is already paid."));
}

#[actix_web::test]
async fn failed_charge_cancels_the_order() {
    let state = test_state(|_| {}).await;
    let (number, reference) = place_and_pay(&state, mug_order(6)).await;
    let payload = json!({"event": "charge.failed", "data": {"reference": reference}});
    let (status, _) = send(&state, signed_webhook(&payload)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, order) = send(&state, TestRequest::get().uri(&format!("/orders/{STORE_ID}/{number}"))).await;
    assert_eq!(order["fulfillment_status"], "Cancelled");
    let stock = InventoryApi::new(state.db.clone()).stock(&MUG_ID.into()).await.unwrap();
    assert_eq!(stock.general_quantity, 100);
}

#[actix_web::test]
async fn webhook_without_status_asks_the_gateway() {
    let state = test_state(|_| {}).await;
    let (_, reference) = place_and_pay(&state, mug_order(1)).await;
    state.gateway.set_status(&reference, GatewayStatus::Success);
    let payload = json!({"reference": reference});
    let (_, body) = send(&state, signed_webhook(&payload)).await;
    assert_eq!(body["success"], true, "{body}");
    assert_eq!(state.gateway.verify_calls(), 1);
}

#[actix_web::test]
async fn webhook_signature_is_checked() {
    let state = test_state(|_| {}).await;
    let (_, reference) = place_and_pay(&state, mug_order(1)).await;
    let payload = json!({"event": "charge.success", "data": {"reference": reference}});

    let (status, _) = send(&state, webhook_request(&payload, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&state, webhook_request(&payload, Some("bm90IGEgc2lnbmF0dXJl"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, report) = send(&state, TestRequest::get().uri(&format!("/payments/{STORE_ID}/status/{reference}"))).await;
    assert_eq!(report["payment_status"], "Unpaid");
}

#[actix_web::test]
async fn webhook_rejects_everything_without_a_secret() {
    let state = test_state(|cfg| cfg.webhook.hmac_secret = Default::default()).await;
    let payload = json!({"event": "charge.success", "data": {"reference": "ref-1"}});
    let (status, _) = send(&state, signed_webhook(&payload)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn webhook_whitelist() {
    let state = test_state(|cfg| cfg.webhook.whitelist = Some(vec!["10.0.0.1".parse().unwrap()])).await;
    let (_, reference) = place_and_pay(&state, mug_order(1)).await;
    let payload = json!({"event": "charge.success", "data": {"reference": reference}});

    let req = signed_webhook(&payload).peer_addr("192.168.1.20:5000".parse().unwrap());
    let (status, _) = send(&state, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = signed_webhook(&payload).peer_addr("10.0.0.1:5000".parse().unwrap());
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true, "{body}");
}

#[actix_web::test]
async fn bad_webhook_payloads_still_get_a_200() {
    let state = test_state(|cfg| cfg.webhook.hmac_checks = false).await;
    let req = webhook_request(&json!("ignored"), None).set_payload("{not json");
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (status, body) = send(&state, webhook_request(&json!({"event": "charge.success", "data": {}}), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let payload = json!({"event": "charge.success", "data": {"reference": "ref-unknown"}});
    let (status, body) = send(&state, webhook_request(&payload, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn client_polling() {
    let state = test_state(|_| {}).await;
    let (_, reference) = place_and_pay(&state, mug_order(1)).await;
    let uri = format!("/payments/{STORE_ID}/poll/{reference}");

    let (status, body) = send(&state, TestRequest::get().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["should_continue_polling"], true);

    state.gateway.go_offline(true);
    let (status, body) = send(&state, TestRequest::get().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["should_continue_polling"], true);

    state.gateway.go_offline(false);
    state.gateway.set_status(&reference, GatewayStatus::Success);
    let (_, body) = send(&state, TestRequest::get().uri(&uri)).await;
    assert_eq!(body["should_continue_polling"], false);
    assert_eq!(body["payment_status"], "Paid");

    // Settled orders are answered without asking the gateway
    let calls = state.gateway.verify_calls();
    let (_, body) = send(&state, TestRequest::get().uri(&uri)).await;
    assert_eq!(body["should_continue_polling"], false);
    assert_eq!(state.gateway.verify_calls(), calls);

    let (status, _) = send(&state, TestRequest::get().uri(&format!("/payments/{STORE_ID}/poll/ref-404"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn verify_and_status() {
    let state = test_state(|_| {}).await;
    let (number, reference) = place_and_pay(&state, mug_order(2)).await;

    let (status, report) = send(&state, TestRequest::get().uri(&format!("/payments/{STORE_ID}/status/{reference}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["order_number"], number.as_str());
    assert_eq!(report["authorization_url"], format!("https://pay.example.com/{reference}"));
    assert_eq!(state.gateway.verify_calls(), 0);

    state.gateway.set_status(&reference, GatewayStatus::Success);
    let (status, body) = send(&state, TestRequest::get().uri(&format!("/payments/{STORE_ID}/verify/{reference}"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["outcome"], "paid");

    state.gateway.go_offline(true);
    let (status, _) = send(&state, TestRequest::get().uri(&format!("/payments/{STORE_ID}/verify/{reference}"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn fallback_is_off_by_default() {
    let state = test_state(|_| {}).await;
    let (_, reference) = place_and_pay(&state, mug_order(1)).await;
    let (status, _) =
        send(&state, TestRequest::patch().uri(&format!("/payments/{STORE_ID}/update-order-status/{reference}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn fallback_marks_paid_or_cancelled() {
    let state = test_state(|cfg| cfg.enable_payment_fallback = true).await;
    let (_, paid) = place_and_pay(&state, mug_order(1)).await;
    let (status, body) =
        send(&state, TestRequest::patch().uri(&format!("/payments/{STORE_ID}/update-order-status/{paid}"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["result"]["order"]["payment_status"], "Paid");

    let (_, failed) = place_and_pay(&state, mug_order(1)).await;
    let req = TestRequest::patch()
        .uri(&format!("/payments/{STORE_ID}/update-order-status/{failed}"))
        .set_json(json!({"status": "failed"}));
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["result"]["order"]["fulfillment_status"], "Cancelled");
}

#[actix_web::test]
async fn background_poll_settles_the_payment() {
    let state = test_state(|cfg| {
        cfg.polling.enabled = true;
        cfg.polling.min_delay = Duration::from_millis(5);
        cfg.polling.max_delay = Duration::from_millis(20);
    })
    .await;
    let (number, reference) = place_and_pay(&state, mug_order(1)).await;
    assert!(state.polls.handles().is_polling(&reference));
    state.gateway.set_status(&reference, GatewayStatus::Success);

    let mut paid = false;
    for _ in 0..100 {
        actix_web::rt::time::sleep(Duration::from_millis(20)).await;
        let (_, order) = send(&state, TestRequest::get().uri(&format!("/orders/{STORE_ID}/{number}"))).await;
        if order["payment_status"] == "Paid" {
            paid = true;
            break;
        }
    }
    assert!(paid, "The background poll never settled the payment");
    for _ in 0..50 {
        if !state.polls.handles().is_polling(&reference) {
            break;
        }
        actix_web::rt::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!state.polls.handles().is_polling(&reference));
}
