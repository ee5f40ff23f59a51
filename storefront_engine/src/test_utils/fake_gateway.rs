//! An in-memory payment gateway for tests.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
};

use log::*;

use crate::{
    db_types::StoreId,
    traits::{GatewayError, GatewayStatus, PaymentGateway, PaymentRequest, PaymentSession},
};

/// Hands out sequential references and reports whatever status the test has set for them (`pending` by default).
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    statuses: Arc<Mutex<HashMap<String, GatewayStatus>>>,
    requests: Arc<Mutex<Vec<PaymentRequest>>>,
    next_reference: Arc<AtomicUsize>,
    verify_calls: Arc<AtomicUsize>,
    refuse_initialize: Arc<AtomicBool>,
    offline: Arc<AtomicBool>,
}

impl FakeGateway {
    pub fn set_status(&self, reference: &str, status: GatewayStatus) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.insert(reference.to_string(), status);
        }
    }

    /// Makes every subsequent `initialize` call fail.
    pub fn refuse_payments(&self, refuse: bool) {
        self.refuse_initialize.store(refuse, Ordering::SeqCst);
    }

    /// Makes every subsequent `verify` call fail.
    pub fn go_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl PaymentGateway for FakeGateway {
    async fn initialize(&self, store_id: &StoreId, request: PaymentRequest) -> Result<PaymentSession, GatewayError> {
        if self.refuse_initialize.load(Ordering::SeqCst) {
            return Err(GatewayError::new("Payment initialization refused"));
        }
        let n = self.next_reference.fetch_add(1, Ordering::SeqCst) + 1;
        let reference = format!("ref-{n}");
        trace!("🏦️ Fake gateway started {reference} for {} in {store_id}", request.amount);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.set_status(&reference, GatewayStatus::Pending);
        Ok(PaymentSession { authorization_url: format!("https://pay.example.com/{reference}"), reference })
    }

    async fn verify(&self, _store_id: &StoreId, reference: &str) -> Result<GatewayStatus, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::new("Gateway unreachable"));
        }
        self.statuses
            .lock()
            .map_err(|_| GatewayError::new("Fake gateway state is poisoned"))?
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::new(format!("Unknown transaction {reference}")))
    }
}
