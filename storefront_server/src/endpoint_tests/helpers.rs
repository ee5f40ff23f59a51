use actix_web::{body::to_bytes, http::StatusCode, test, test::TestRequest, App};
use log::debug;
use serde_json::{json, Value};
use storefront_common::Secret;
use storefront_engine::{
    test_utils::{
        fake_gateway::FakeGateway,
        prepare_env::new_test_database,
        seed::{seed_store, STORE_ID},
    },
    EventProducers,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    helpers::calculate_hmac,
    poll_worker::PollHandles,
    server::{configure_app, new_app_state, AppState},
};

pub const WEBHOOK_SECRET: &str = "endpoint-test-secret";

pub type TestState = AppState<SqliteDatabase, FakeGateway>;

/// A seeded store behind a fake gateway. Background polling is off unless `tweak` turns it back on.
pub async fn test_state<F: FnOnce(&mut ServerConfig)>(tweak: F) -> TestState {
    let _ = env_logger::try_init();
    let db = new_test_database().await;
    seed_store(&db, 10).await;
    let mut config = ServerConfig::default();
    config.polling.enabled = false;
    config.webhook.hmac_secret = Secret::new(WEBHOOK_SECRET.to_string());
    tweak(&mut config);
    new_app_state(&config, db, FakeGateway::default(), EventProducers::default(), PollHandles::new())
}

/// Sends `req` through a freshly configured app. Errors raised by middleware are rendered the way the server would.
pub async fn send(state: &TestState, req: TestRequest) -> (StatusCode, Value) {
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, state))).await;
    let res = match test::try_call_service(&app, req.to_request()).await {
        Ok(res) => res.into_parts().1.map_into_boxed_body(),
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let bytes = to_bytes(res.into_body()).await.unwrap_or_default();
    debug!("Response: {status} {}", String::from_utf8_lossy(&bytes));
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

pub fn mug_order(quantity: i64) -> Value {
    json!({
        "guest_id": "guest-42",
        "items": [{"product_id": "mug", "quantity": quantity}],
        "shipping": {
            "name": "Ada Obi",
            "email": "ada@example.com",
            "phone": "+2348000000000",
            "address": "1 Marina Road",
            "city": "Lagos",
            "country": "NG"
        }
    })
}

/// Places `body` and starts its payment. Returns the order number and the payment reference.
pub async fn place_and_pay(state: &TestState, mut body: Value) -> (String, String) {
    body["initialize_payment"] = json!(true);
    let (status, placed) = send(state, TestRequest::post().uri(&format!("/orders/{STORE_ID}")).set_json(body)).await;
    assert_eq!(status, StatusCode::OK, "{placed}");
    let order_number = placed["order"]["order_number"].as_str().unwrap().to_string();
    let reference = placed["payment"]["reference"].as_str().unwrap().to_string();
    (order_number, reference)
}

pub fn webhook_request(payload: &Value, signature: Option<&str>) -> TestRequest {
    let body = payload.to_string();
    let mut req = TestRequest::post()
        .uri(&format!("/payments/{STORE_ID}/webhook"))
        .insert_header(("content-type", "application/json"));
    if let Some(sig) = signature {
        req = req.insert_header(("x-gateway-signature", sig.to_string()));
    }
    req.set_payload(body)
}

pub fn signed_webhook(payload: &Value) -> TestRequest {
    let signature = calculate_hmac(WEBHOOK_SECRET, payload.to_string().as_bytes()).unwrap();
    webhook_request(payload, Some(&signature))
}
