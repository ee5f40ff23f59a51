use std::collections::HashMap;

use cucumber::World;
use log::*;
use storefront_engine::{
    db_types::{Order, OrderNumber, StoreId},
    payment_objects::PollOutcome,
    test_utils::{
        fake_gateway::FakeGateway,
        prepare_env::{create_database, random_db_path, run_migrations},
        seed::STORE_ID,
    },
    AffiliateApi,
    EventProducers,
    OrderFlowApi,
    OrderFlowError,
    PaymentFlowApi,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct StorefrontWorld {
    pub system: Option<StorefrontSystem>,
    /// Orders placed in this scenario, by the alias the scenario gave them.
    pub orders: HashMap<String, OrderNumber>,
    pub last_error: Option<OrderFlowError>,
    pub last_poll: Option<PollOutcome>,
}

#[derive(Debug)]
pub struct StorefrontSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub gateway: FakeGateway,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentFlowApi<SqliteDatabase, FakeGateway>,
    pub affiliates: AffiliateApi<SqliteDatabase>,
}

impl StorefrontWorld {
    pub fn system(&self) -> &StorefrontSystem {
        self.system.as_ref().expect("Storefront not initialised")
    }

    pub fn store_id(&self) -> StoreId {
        StoreId::from(STORE_ID)
    }

    pub fn order_number(&self, alias: &str) -> OrderNumber {
        self.orders.get(alias).cloned().unwrap_or_else(|| panic!("No order called {alias} was placed"))
    }

    pub async fn order(&self, alias: &str) -> Order {
        let number = self.order_number(alias);
        self.system().orders.fetch_order(&number).await.expect("Error fetching order").expect("Order does not exist")
    }

    /// The gateway reference for an order whose payment has started.
    pub async fn reference(&self, alias: &str) -> String {
        self.order(alias).await.payment_reference.expect("Payment has not been started for this order")
    }
}

impl StorefrontSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 4).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let gateway = FakeGateway::default();
        let producers = EventProducers::default();
        let orders = OrderFlowApi::new(db.clone(), producers.clone());
        let payments = PaymentFlowApi::new(db.clone(), gateway.clone(), producers);
        let affiliates = AffiliateApi::new(db.clone());
        Self { db_path: url, db, gateway, orders, payments, affiliates }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
