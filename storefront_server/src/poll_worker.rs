//! Server-driven payment polling.
//!
//! After a payment is started, the server checks on it in the background with an exponential backoff, until the
//! payment settles, the attempts run out, or someone stops the poll. Each poll is keyed by its payment reference, so
//! a reference is never polled twice at the same time. When an order is paid or cancelled by any other path (a
//! webhook, a client poll), the event hooks stop the background poll for it.
//!
//! On startup, [`PollRegistry::resume`] re-schedules every order that has a payment reference but is still awaiting
//! payment.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use backon::{BackoffBuilder, ExponentialBuilder};
use log::*;
use storefront_engine::{
    db_types::StoreId,
    traits::{PaymentGateway, StorefrontDatabase},
    OrderFlowError,
    PaymentFlowApi,
};
use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;

/// The cancellation handles of the running polls, keyed by payment reference.
///
/// `PollHandles` is `Send + Sync` and cheap to clone, so event hooks running on any thread can stop a poll.
#[derive(Clone, Default)]
pub struct PollHandles {
    tasks: Arc<Mutex<HashMap<String, CancellationToken>>>,
    shutdown: CancellationToken,
}

impl PollHandles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `reference` for a new poll. Returns `None` if it is already being polled.
    fn register(&self, reference: &str) -> Option<CancellationToken> {
        let mut tasks = match self.tasks.lock() {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("🕰️ The poll registry lock is poisoned. {e}");
                return None;
            },
        };
        if tasks.contains_key(reference) {
            return None;
        }
        let token = self.shutdown.child_token();
        tasks.insert(reference.to_string(), token.clone());
        Some(token)
    }

    fn finish(&self, reference: &str) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.remove(reference);
        }
    }

    /// Stops the poll for `reference`, if there is one. Returns true if a poll was stopped.
    pub fn stop(&self, reference: &str) -> bool {
        let token = self.tasks.lock().ok().and_then(|mut tasks| tasks.remove(reference));
        match token {
            Some(token) => {
                token.cancel();
                debug!("🕰️ Polling for payment {reference} stopped");
                true
            },
            None => false,
        }
    }

    pub fn is_polling(&self, reference: &str) -> bool {
        self.tasks.lock().map(|tasks| tasks.contains_key(reference)).unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    /// Stops every running poll.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.clear();
        }
    }
}

pub struct PollRegistry<B, G> {
    api: PaymentFlowApi<B, G>,
    handles: PollHandles,
    config: PollConfig,
}

impl<B: Clone, G: Clone> Clone for PollRegistry<B, G> {
    fn clone(&self) -> Self {
        Self { api: self.api.clone(), handles: self.handles.clone(), config: self.config }
    }
}

impl<B, G> PollRegistry<B, G> {
    pub fn new(api: PaymentFlowApi<B, G>, handles: PollHandles, config: PollConfig) -> Self {
        Self { api, handles, config }
    }

    pub fn handles(&self) -> &PollHandles {
        &self.handles
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.config.min_delay)
            .with_max_delay(self.config.max_delay)
            .with_max_times(self.config.max_attempts)
            .with_jitter()
    }
}

impl<B, G> PollRegistry<B, G>
where
    B: StorefrontDatabase + 'static,
    G: PaymentGateway + 'static,
{
    /// Starts polling `reference` on the current worker. Returns false if background polling is disabled or the
    /// reference is already being polled.
    pub fn schedule(&self, store_id: &StoreId, reference: &str) -> bool {
        if !self.config.enabled {
            return false;
        }
        let Some(token) = self.handles.register(reference) else {
            debug!("🕰️ Payment {reference} is already being polled");
            return false;
        };
        debug!("🕰️ Polling payment {reference} for store {store_id}");
        let job = PollJob {
            api: self.api.clone(),
            handles: self.handles.clone(),
            backoff: self.backoff(),
            store_id: store_id.clone(),
            reference: reference.to_string(),
        };
        actix_web::rt::spawn(job.run(token));
        true
    }

    /// Schedules a poll for every order with a payment still awaiting settlement. Returns the number scheduled.
    pub async fn resume(&self) -> Result<usize, OrderFlowError> {
        if !self.config.enabled {
            return Ok(0);
        }
        let orders = self.api.orders_awaiting_payment().await?;
        let count = orders
            .iter()
            .filter_map(|o| o.payment_reference.as_deref().map(|r| (&o.store.store_id, r)))
            .filter(|(store_id, reference)| self.schedule(store_id, reference))
            .count();
        info!("🕰️ Resumed polling for {count} unsettled payments");
        Ok(count)
    }
}

struct PollJob<B, G> {
    api: PaymentFlowApi<B, G>,
    handles: PollHandles,
    backoff: ExponentialBuilder,
    store_id: StoreId,
    reference: String,
}

impl<B, G> PollJob<B, G>
where
    B: StorefrontDatabase,
    G: PaymentGateway,
{
    async fn run(self, token: CancellationToken) {
        let reference = self.reference.as_str();
        let mut delays = self.backoff.build();
        let mut attempts = 0;
        loop {
            let Some(delay) = delays.next() else {
                info!("🕰️ Payment {reference} is still unsettled after {attempts} checks. Giving up.");
                break;
            };
            tokio::select! {
                _ = token.cancelled() => {
                    trace!("🕰️ Poll for payment {reference} cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempts += 1;
            match self.api.poll(&self.store_id, reference).await {
                Ok(outcome) if outcome.should_continue_polling => {
                    trace!("🕰️ Check {attempts} for payment {reference}: {}", outcome.message);
                },
                Ok(outcome) => {
                    info!("🕰️ {}", outcome.message);
                    break;
                },
                Err(e) => {
                    warn!("🕰️ Polling payment {reference} failed. {e}. Giving up.");
                    break;
                },
            }
        }
        self.handles.finish(reference);
    }
}
