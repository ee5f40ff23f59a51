use cucumber::given;
use storefront_engine::test_utils::seed::seed_store;

use crate::cucumber::{storefront_world::StorefrontSystem, StorefrontWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut StorefrontWorld) {
    let system = StorefrontSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a store with {int} t-shirts in stock")]
async fn seeded_store(world: &mut StorefrontWorld, quantity: i64) {
    seed_store(&world.system().db, quantity).await;
}
