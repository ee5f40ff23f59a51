use std::time::Duration;

use actix_web::{
    dev::{HttpServiceFactory, Server},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use gateway_tools::GatewayApi;
use log::*;
use storefront_engine::{
    db_types::Order,
    events::{EventHandlers, EventHooks},
    traits::{PaymentGateway, StorefrontDatabase},
    AffiliateApi,
    EventProducers,
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
};

use crate::{
    config::{ServerConfig, ServerOptions, WebhookConfig},
    errors::ServerError,
    integrations::gateway::HttpPaymentGateway,
    middleware::{HmacMiddlewareFactory, IpWhitelistFactory},
    poll_worker::{PollHandles, PollRegistry},
    routes::{
        health,
        payment_webhook,
        AffiliateAccountRoute,
        CancelOrderRoute,
        InitializePaymentRoute,
        OrderByNumberRoute,
        PaymentStatusRoute,
        PlaceOrderRoute,
        PollPaymentRoute,
        UpdateFulfillmentRoute,
        UpdateOrderStatusRoute,
        VerifyPaymentRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 128;

/// Everything a worker needs to build its copy of the application.
#[derive(Clone)]
pub struct AppState<B, G> {
    pub db: B,
    pub gateway: G,
    pub producers: EventProducers,
    pub polls: PollRegistry<B, G>,
    pub options: ServerOptions,
    pub webhook: WebhookConfig,
    pub callback_url: Option<String>,
}

impl<B: Clone, G: Clone> AppState<B, G> {
    pub fn payment_api(&self) -> PaymentFlowApi<B, G> {
        PaymentFlowApi::new(self.db.clone(), self.gateway.clone(), self.producers.clone())
            .with_callback_url(self.callback_url.clone())
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let api = GatewayApi::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = HttpPaymentGateway::new(api);
    let handles = PollHandles::new();
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, polling_hooks(&handles));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let state = new_app_state(&config, db, gateway, producers, handles.clone());
    match state.polls.resume().await {
        Ok(n) => debug!("💻️ {n} payment polls resumed"),
        Err(e) => warn!("💻️ Could not resume polling for unsettled payments. {e}"),
    }
    let srv = create_server_instance(&config, state)?;
    let result = srv.await;
    handles.shutdown();
    result.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn new_app_state<B: Clone, G: Clone>(
    config: &ServerConfig,
    db: B,
    gateway: G,
    producers: EventProducers,
    handles: PollHandles,
) -> AppState<B, G> {
    let payments = PaymentFlowApi::new(db.clone(), gateway.clone(), producers.clone())
        .with_callback_url(config.callback_url.clone());
    AppState {
        db,
        gateway,
        producers,
        polls: PollRegistry::new(payments, handles, config.polling),
        options: ServerOptions::from_config(config),
        webhook: config.webhook.clone(),
        callback_url: config.callback_url.clone(),
    }
}

pub fn create_server_instance<G>(
    config: &ServerConfig,
    state: AppState<SqliteDatabase, G>,
) -> Result<Server, ServerError>
where
    G: PaymentGateway + Send + 'static,
{
    let srv = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sf::access_log"))
            .configure(move |cfg| configure_app(cfg, &state))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers the APIs and every route. Shared by the server and the endpoint tests.
pub fn configure_app<B, G>(cfg: &mut web::ServiceConfig, state: &AppState<B, G>)
where
    B: StorefrontDatabase + 'static,
    G: PaymentGateway + 'static,
{
    cfg.app_data(web::Data::new(OrderFlowApi::new(state.db.clone(), state.producers.clone())))
        .app_data(web::Data::new(state.payment_api()))
        .app_data(web::Data::new(AffiliateApi::new(state.db.clone())))
        .app_data(web::Data::new(state.polls.clone()))
        .service(health)
        .service(PlaceOrderRoute::<B, G>::new())
        .service(OrderByNumberRoute::<B>::new())
        .service(CancelOrderRoute::<B>::new())
        .service(UpdateFulfillmentRoute::<B>::new())
        .service(InitializePaymentRoute::<B, G>::new())
        .service(VerifyPaymentRoute::<B, G>::new())
        .service(PaymentStatusRoute::<B, G>::new())
        .service(PollPaymentRoute::<B, G>::new())
        .service(webhook_service::<B, G>(&state.webhook, &state.options))
        .service(AffiliateAccountRoute::<B>::new());
    if state.options.enable_payment_fallback {
        cfg.service(UpdateOrderStatusRoute::<B, G>::new());
    }
}

/// The gateway webhook, behind the IP whitelist and the HMAC signature check.
pub fn webhook_service<B, G>(webhook: &WebhookConfig, options: &ServerOptions) -> impl HttpServiceFactory
where
    B: StorefrontDatabase + 'static,
    G: PaymentGateway + 'static,
{
    let hmac = HmacMiddlewareFactory::new(&webhook.hmac_header, webhook.hmac_secret.clone(), webhook.hmac_checks);
    let whitelist =
        IpWhitelistFactory::new(webhook.whitelist.clone(), options.use_x_forwarded_for, options.use_forwarded);
    web::resource("/payments/{store_id}/webhook")
        .name("payment_webhook")
        .route(web::post().to(payment_webhook::<B, G>))
        .wrap(hmac)
        .wrap(whitelist)
}

/// Once an order is paid or cancelled, by whatever path, there is nothing left to poll for.
pub fn polling_hooks(handles: &PollHandles) -> EventHooks {
    let mut hooks = EventHooks::default();
    let on_paid = handles.clone();
    let on_cancelled = handles.clone();
    hooks
        .on_order_paid(move |ev| {
            stop_polling(&on_paid, &ev.order);
            Box::pin(async {})
        })
        .on_order_cancelled(move |ev| {
            stop_polling(&on_cancelled, &ev.order);
            Box::pin(async {})
        });
    hooks
}

fn stop_polling(handles: &PollHandles, order: &Order) {
    if let Some(reference) = &order.payment_reference {
        if handles.stop(reference) {
            debug!("📬️ Order {} is {}. Background polling stopped.", order.order_number, order.fulfillment_status);
        }
    }
}
