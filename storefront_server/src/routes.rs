//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (database calls, gateway calls)
//! must be awaited as a future so that the worker can handle other requests in the meantime.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use serde_json::Value;
use storefront_engine::{
    db_types::{FulfillmentStatus, OrderNumber, StoreId},
    traits::{GatewayStatus, PaymentGateway, StorefrontDatabase},
    AffiliateApi,
    OrderFlowApi,
    PaymentFlowApi,
};

use crate::{
    data_objects::{
        CancelOrderParams,
        FulfillmentParams,
        InitializePaymentParams,
        JsonResponse,
        PlaceOrderParams,
        PlacedOrder,
        ReconcileResponse,
        UpdateOrderStatusParams,
    },
    errors::ServerError,
    poll_worker::PollRegistry,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(place_order => Post "/orders/{store_id}" impl StorefrontDatabase, PaymentGateway);
/// Places an order. If `initialize_payment` is set, the payment is started in the same call. Should the gateway
/// refuse it, the order is withdrawn again and the gateway error is returned.
pub async fn place_order<B, G>(
    path: web::Path<String>,
    body: web::Json<PlaceOrderParams>,
    orders: web::Data<OrderFlowApi<B>>,
    payments: web::Data<PaymentFlowApi<B, G>>,
    polls: web::Data<PollRegistry<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase + 'static,
    G: PaymentGateway + 'static,
{
    let store_id = StoreId::from(path.into_inner());
    let params = body.into_inner();
    debug!("💻️ POST new order for store {store_id}");
    let order = orders.place_order(&store_id, params.order).await?;
    let payment = if params.initialize_payment {
        let payment = payments.initialize_payment(&store_id, &order.order_number, params.callback_url).await?;
        polls.schedule(&store_id, &payment.reference);
        Some(payment)
    } else {
        None
    };
    let order = orders.fetch_order(&order.order_number).await?.unwrap_or(order);
    Ok(HttpResponse::Ok().json(PlacedOrder { order, payment }))
}

route!(order_by_number => Get "/orders/{store_id}/{order_number}" impl StorefrontDatabase);
pub async fn order_by_number<B: StorefrontDatabase>(
    path: web::Path<(String, String)>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (store_id, order_number) = path.into_inner();
    debug!("💻️ GET order {order_number} for store {store_id}");
    let order = api.order_for_store(&StoreId::from(store_id), &OrderNumber::from(order_number)).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{store_id}/{order_number}/cancel" impl StorefrontDatabase);
pub async fn cancel_order<B: StorefrontDatabase>(
    path: web::Path<(String, String)>,
    body: Option<web::Json<CancelOrderParams>>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (store_id, order_number) = path.into_inner();
    let params = body.map(|b| b.into_inner()).unwrap_or_default();
    let reason = params.reason.unwrap_or_else(|| "Cancelled on request".to_string());
    let cancelled_by = params.cancelled_by.unwrap_or_else(|| "customer".to_string());
    info!("💻️ Cancel request for order {order_number} in store {store_id} by {cancelled_by}");
    let result =
        api.cancel_order(&StoreId::from(store_id), &OrderNumber::from(order_number), &reason, &cancelled_by).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(update_fulfillment => Patch "/orders/{store_id}/{order_number}/fulfillment" impl StorefrontDatabase);
pub async fn update_fulfillment<B: StorefrontDatabase>(
    path: web::Path<(String, String)>,
    body: web::Json<FulfillmentParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (store_id, order_number) = path.into_inner();
    let status =
        body.status.parse::<FulfillmentStatus>().map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    let order_number = OrderNumber::from(order_number);
    api.order_for_store(&StoreId::from(store_id), &order_number).await?;
    let order = api.update_fulfillment_status(&order_number, status).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(initialize_payment => Post "/payments/{store_id}/initialize" impl StorefrontDatabase, PaymentGateway);
pub async fn initialize_payment<B, G>(
    path: web::Path<String>,
    body: web::Json<InitializePaymentParams>,
    api: web::Data<PaymentFlowApi<B, G>>,
    polls: web::Data<PollRegistry<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase + 'static,
    G: PaymentGateway + 'static,
{
    let store_id = StoreId::from(path.into_inner());
    let params = body.into_inner();
    debug!("💻️ Initialize payment for order {} in store {store_id}", params.order_number);
    let payment = api.initialize_payment(&store_id, &params.order_number, params.callback_url).await?;
    polls.schedule(&store_id, &payment.reference);
    Ok(HttpResponse::Ok().json(payment))
}

route!(verify_payment => Get "/payments/{store_id}/verify/{reference}" impl StorefrontDatabase, PaymentGateway);
pub async fn verify_payment<B, G>(
    path: web::Path<(String, String)>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    G: PaymentGateway,
{
    let (store_id, reference) = path.into_inner();
    debug!("💻️ Verify payment {reference} for store {store_id}");
    let outcome = api.verify(&StoreId::from(store_id), &reference).await?;
    Ok(HttpResponse::Ok().json(ReconcileResponse::from(outcome)))
}

route!(payment_status => Get "/payments/{store_id}/status/{reference}" impl StorefrontDatabase, PaymentGateway);
pub async fn payment_status<B, G>(
    path: web::Path<(String, String)>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    G: PaymentGateway,
{
    let (store_id, reference) = path.into_inner();
    trace!("💻️ Payment status for {reference} in store {store_id}");
    let report = api.status(&StoreId::from(store_id), &reference).await?;
    Ok(HttpResponse::Ok().json(report))
}

route!(poll_payment => Get "/payments/{store_id}/poll/{reference}" impl StorefrontDatabase, PaymentGateway);
pub async fn poll_payment<B, G>(
    path: web::Path<(String, String)>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    G: PaymentGateway,
{
    let (store_id, reference) = path.into_inner();
    trace!("💻️ Client poll for payment {reference} in store {store_id}");
    let outcome = api.poll(&StoreId::from(store_id), &reference).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Gateway webhook. Responses are always in the 200 range, otherwise the gateway keeps retrying.
///
/// The webhook is mounted by [`crate::server::webhook_service`], behind the whitelist and HMAC middleware.
pub async fn payment_webhook<B, G>(
    path: web::Path<String>,
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> HttpResponse
where
    B: StorefrontDatabase,
    G: PaymentGateway,
{
    let store_id = StoreId::from(path.into_inner());
    trace!("💻️ Received webhook for store {store_id}");
    let result = match serde_json::from_slice::<Value>(&body) {
        Err(e) => {
            warn!("💻️ Webhook for store {store_id} is not valid JSON. {e}");
            JsonResponse::failure("The payload is not valid JSON.")
        },
        Ok(payload) => match api.webhook(&store_id, &payload).await {
            Ok(outcome) => {
                info!("💻️ Webhook for store {store_id} handled. {}", outcome.message());
                JsonResponse::success(outcome.message())
            },
            Err(e) => {
                warn!("💻️ Could not handle webhook for store {store_id}. {e}");
                JsonResponse::failure(e)
            },
        },
    };
    HttpResponse::Ok().json(result)
}

route!(update_order_status => Patch "/payments/{store_id}/update-order-status/{reference}" impl StorefrontDatabase, PaymentGateway);
/// The manual payment fallback. Only mounted when `SF_ENABLE_PAYMENT_FALLBACK` is set.
pub async fn update_order_status<B, G>(
    path: web::Path<(String, String)>,
    body: Option<web::Json<UpdateOrderStatusParams>>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    G: PaymentGateway,
{
    let (store_id, reference) = path.into_inner();
    let status = body.and_then(|b| b.into_inner().status).map(|s| GatewayStatus::from(s.as_str()));
    let outcome = api.confirm_payment(&StoreId::from(store_id), &reference, status).await?;
    Ok(HttpResponse::Ok().json(ReconcileResponse::from(outcome)))
}

//----------------------------------------------   Affiliates  ----------------------------------------------------
route!(affiliate_account => Get "/affiliates/{store_id}/{affiliate_id}" impl StorefrontDatabase);
pub async fn affiliate_account<B: StorefrontDatabase>(
    path: web::Path<(String, String)>,
    api: web::Data<AffiliateApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (store_id, affiliate_id) = path.into_inner();
    debug!("💻️ GET affiliate {affiliate_id} for store {store_id}");
    let account = api.account(&StoreId::from(store_id), &affiliate_id).await?;
    Ok(HttpResponse::Ok().json(account))
}
