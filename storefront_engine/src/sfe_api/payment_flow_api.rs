use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde_json::{json, Value};

use crate::{
    db_types::{Order, OrderNumber, StoreId},
    events::{EventProducers, OrderCancelledEvent, OrderPaidEvent},
    sfe_api::{
        errors::OrderFlowError,
        order_objects::OrderQueryFilter,
        payment_objects::{
            PaymentInitialization,
            PaymentStatusReport,
            PollOutcome,
            ReconcileOutcome,
            WebhookNotification,
        },
    },
    traits::{
        Cancellation,
        GatewayStatus,
        PaymentGateway,
        PaymentRequest,
        PaymentTransition,
        StatusClass,
        StorefrontDatabase,
        StorefrontDbError,
    },
};

/// Who is recorded as cancelling an order after the gateway reports a failed payment.
pub const GATEWAY_CANCELLER: &str = "payment-gateway";

/// `PaymentFlowApi` owns the payment side of an order: starting a payment with the gateway, and reconciling the
/// gateway's answers.
///
/// Confirmation can arrive by webhook, by polling, or through the fallback endpoint, in any order and any number of
/// times. All three feed [`Self::reconcile`], which relies on the backend's "set Paid only if Unpaid" transition, so
/// exactly one of them moves the order and accrues commission.
pub struct PaymentFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    callback_url: Option<String>,
}

impl<B, G> Debug for PaymentFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B: Clone, G: Clone> Clone for PaymentFlowApi<B, G> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            gateway: self.gateway.clone(),
            producers: self.producers.clone(),
            callback_url: self.callback_url.clone(),
        }
    }
}

impl<B, G> PaymentFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, callback_url: None }
    }

    /// The callback URL sent to the gateway when the caller does not supply one.
    pub fn with_callback_url(mut self, url: Option<String>) -> Self {
        self.callback_url = url;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> PaymentFlowApi<B, G>
where
    B: StorefrontDatabase,
    G: PaymentGateway,
{
    /// Starts a payment attempt for an order awaiting payment.
    ///
    /// Calling this again for an order that already has a payment reference returns the existing attempt. If the
    /// gateway refuses to start the payment, the order is deleted and its stock returned, and the gateway error is
    /// passed on.
    pub async fn initialize_payment(
        &self,
        store_id: &StoreId,
        order_number: &OrderNumber,
        callback_url: Option<String>,
    ) -> Result<PaymentInitialization, OrderFlowError> {
        let order = self
            .db
            .fetch_order(order_number)
            .await?
            .filter(|o| &o.store.store_id == store_id)
            .ok_or_else(|| StorefrontDbError::OrderNotFound(order_number.clone()))?;
        if let Some(existing) = existing_initialization(&order) {
            debug!("🏦️ Order {order_number} already has payment {}. Returning it.", existing.reference);
            return Ok(existing);
        }
        if !order.awaiting_payment() {
            return Err(OrderFlowError::Validation(format!(
                "Order {order_number} is {}/{} and does not need payment",
                order.payment_status, order.fulfillment_status
            )));
        }
        let request = self.payment_request(&order, callback_url.or_else(|| self.callback_url.clone()));
        let session = match self.gateway.initialize(store_id, request).await {
            Ok(session) => session,
            Err(e) => {
                warn!("🏦️ The gateway could not start a payment for order {order_number}: {e}");
                self.compensate(order_number).await;
                return Err(e.into());
            },
        };
        match self.db.attach_payment_reference(order_number, &session.reference, &session.authorization_url).await {
            Ok(order) => {
                info!("🏦️ Payment {} started for order {order_number}", session.reference);
                Ok(PaymentInitialization {
                    order_number: order.order_number,
                    reference: session.reference,
                    authorization_url: session.authorization_url,
                    already_initialized: false,
                })
            },
            Err(StorefrontDbError::PaymentAlreadyStarted(_)) => {
                // A concurrent request won. Its attempt is the one the order tracks.
                let order = self
                    .db
                    .fetch_order(order_number)
                    .await?
                    .ok_or_else(|| StorefrontDbError::OrderNotFound(order_number.clone()))?;
                existing_initialization(&order).ok_or_else(|| {
                    OrderFlowError::Internal(format!("Order {order_number} lost its payment reference"))
                })
            },
            Err(e) => {
                error!("🏦️ Could not record payment {} for order {order_number}: {e}", session.reference);
                self.compensate(order_number).await;
                Err(e.into())
            },
        }
    }

    fn payment_request(&self, order: &Order, callback_url: Option<String>) -> PaymentRequest {
        PaymentRequest {
            amount: order.pricing.total,
            currency: order.store.currency.clone(),
            buyer_email: order.customer.email.clone(),
            buyer_name: order.customer.name.clone(),
            buyer_phone: order.customer.phone.clone(),
            description: format!("Order {} from {}", order.order_number, order.store.name),
            metadata: json!({
                "order_number": order.order_number,
                "store_id": order.store.store_id,
                "user_id": order.customer.user_id,
                "guest_id": order.customer.guest_id,
            }),
            callback_url,
        }
    }

    /// Deletes an order whose payment could not start, returning its stock in the same transaction.
    async fn compensate(&self, order_number: &OrderNumber) {
        match self.db.abandon_order(order_number).await {
            Ok(abandoned) => {
                let units: i64 = abandoned.restored.iter().map(|r| r.quantity).sum();
                info!("🏦️ Order {order_number} abandoned. {units} units returned to stock.");
            },
            Err(e) => error!("🏦️ Could not abandon order {order_number} after a failed payment start: {e}"),
        }
    }

    /// The single payment transition shared by the webhook, poll and fallback paths.
    ///
    /// * A settled status (`success`, `captured`, `paid`) moves an `Unpaid` order to `Paid`/`Processing` and accrues
    ///   the affiliate commission, once.
    /// * A failed status (`failed`, `cancelled`, `declined`) cancels an `Unpaid` order and returns its stock.
    /// * Anything else changes nothing; the caller should check again later.
    pub async fn reconcile(
        &self,
        store_id: &StoreId,
        reference: &str,
        status: GatewayStatus,
    ) -> Result<ReconcileOutcome, OrderFlowError> {
        trace!("🔄️ Reconciling payment {reference} in store {store_id} with status {status}");
        let outcome = match status.class() {
            StatusClass::Settled => match self.db.mark_order_paid(store_id, reference, Utc::now()).await? {
                PaymentTransition::Transitioned { order, accrual } => {
                    self.producers.publish_order_paid(OrderPaidEvent::new(order.clone(), accrual)).await;
                    ReconcileOutcome::Paid { order, accrual }
                },
                PaymentTransition::AlreadyPaid(order) => {
                    debug!("🔄️ Order {} is already paid. Nothing to do.", order.order_number);
                    ReconcileOutcome::AlreadyPaid { order }
                },
                PaymentTransition::NotPayable(order) => {
                    warn!(
                        "🔄️ Payment {reference} reports {status}, but order {} is {}. It will need a manual refund.",
                        order.order_number, order.fulfillment_status
                    );
                    ReconcileOutcome::NotPayable { order }
                },
            },
            StatusClass::Failed => {
                let cancellation = Cancellation::new(format!("Payment {status}"), GATEWAY_CANCELLER);
                let result = self.db.cancel_unpaid_order_for_reference(store_id, reference, cancellation).await?;
                if result.changed {
                    self.producers.publish_order_cancelled(OrderCancelledEvent::new(result.order.clone())).await;
                    ReconcileOutcome::Cancelled { order: result.order }
                } else {
                    settled_outcome(result.order, &status)
                }
            },
            StatusClass::Undetermined => {
                let order = self
                    .db
                    .fetch_order_by_reference(store_id, reference)
                    .await?
                    .ok_or_else(|| StorefrontDbError::ReferenceNotFound(reference.to_string()))?;
                settled_outcome(order, &status)
            },
        };
        debug!("🔄️ {}", outcome.message());
        Ok(outcome)
    }

    /// Asks the gateway for the current status of a payment, and reconciles it.
    pub async fn verify(&self, store_id: &StoreId, reference: &str) -> Result<ReconcileOutcome, OrderFlowError> {
        let status = self.gateway.verify(store_id, reference).await?;
        self.reconcile(store_id, reference, status).await
    }

    /// One polling step.
    ///
    /// Orders that are already paid or cancelled are reported without contacting the gateway. Gateway errors and
    /// unexpected failures during reconciliation are reported as "continue polling". An unknown reference is an
    /// error.
    pub async fn poll(&self, store_id: &StoreId, reference: &str) -> Result<PollOutcome, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_reference(store_id, reference)
            .await?
            .ok_or_else(|| StorefrontDbError::ReferenceNotFound(reference.to_string()))?;
        if !order.awaiting_payment() {
            let outcome = settled_outcome(order, &GatewayStatus::Pending);
            return Ok(PollOutcome::from_outcome(reference, &outcome));
        }
        let status = match self.gateway.verify(store_id, reference).await {
            Ok(status) => status,
            Err(e) => {
                warn!("🕰️ Could not verify payment {reference}: {e}. Will try again.");
                return Ok(PollOutcome::retry_later(reference, &order, format!("Payment could not be verified: {e}")));
            },
        };
        match self.reconcile(store_id, reference, status).await {
            Ok(outcome) => Ok(PollOutcome::from_outcome(reference, &outcome)),
            Err(OrderFlowError::NotFound(msg)) => Err(OrderFlowError::NotFound(msg)),
            Err(e) => {
                warn!("🕰️ Reconciling payment {reference} failed: {e}. Will try again.");
                Ok(PollOutcome::retry_later(reference, &order, format!("Payment could not be reconciled: {e}")))
            },
        }
    }

    /// Handles a gateway webhook. If the payload carries no usable status, the gateway is asked instead.
    pub async fn webhook(&self, store_id: &StoreId, payload: &Value) -> Result<ReconcileOutcome, OrderFlowError> {
        let notification = WebhookNotification::from_value(payload)
            .ok_or_else(|| OrderFlowError::Validation("The webhook payload does not contain a reference".to_string()))?;
        let event = notification.event.as_deref().unwrap_or("(none)");
        debug!("🔄️ Webhook {event} received for payment {}", notification.reference);
        match notification.status {
            Some(status) => self.reconcile(store_id, &notification.reference, status).await,
            None => self.verify(store_id, &notification.reference).await,
        }
    }

    /// The manual fallback. The caller's word is trusted: the status defaults to `success` and the gateway is not
    /// consulted.
    pub async fn confirm_payment(
        &self,
        store_id: &StoreId,
        reference: &str,
        status: Option<GatewayStatus>,
    ) -> Result<ReconcileOutcome, OrderFlowError> {
        let status = status.unwrap_or(GatewayStatus::Success);
        warn!("🔄️ Payment {reference} in store {store_id} is being set to {status} by the fallback endpoint");
        self.reconcile(store_id, reference, status).await
    }

    /// The stored state of a payment. The gateway is not contacted.
    pub async fn status(&self, store_id: &StoreId, reference: &str) -> Result<PaymentStatusReport, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_reference(store_id, reference)
            .await?
            .ok_or_else(|| StorefrontDbError::ReferenceNotFound(reference.to_string()))?;
        Ok(PaymentStatusReport::new(reference, &order))
    }

    /// Orders whose payment was started but not settled, e.g. to resume polling after a restart.
    pub async fn orders_awaiting_payment(&self) -> Result<Vec<Order>, OrderFlowError> {
        Ok(self.db.search_orders(OrderQueryFilter::awaiting_payment()).await?)
    }
}

fn existing_initialization(order: &Order) -> Option<PaymentInitialization> {
    match (&order.payment_reference, &order.authorization_url) {
        (Some(reference), Some(url)) if order.awaiting_payment() => Some(PaymentInitialization {
            order_number: order.order_number.clone(),
            reference: reference.clone(),
            authorization_url: url.clone(),
            already_initialized: true,
        }),
        _ => None,
    }
}

/// The outcome for an order the current signal did not change.
fn settled_outcome(order: Order, status: &GatewayStatus) -> ReconcileOutcome {
    if order.is_paid() {
        ReconcileOutcome::AlreadyPaid { order }
    } else if order.is_cancelled() {
        ReconcileOutcome::AlreadyCancelled { order }
    } else if order.awaiting_payment() {
        ReconcileOutcome::Pending { order, gateway_status: status.to_string() }
    } else {
        ReconcileOutcome::NotPayable { order }
    }
}
