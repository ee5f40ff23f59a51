use storefront_engine::{
    db_types::{Money, NewAffiliate, PaymentStatus, StoreId},
    order_objects::OrderItemRequest,
    payment_objects::ReconcileOutcome,
    test_utils::{
        fake_gateway::FakeGateway,
        prepare_env::new_test_database,
        seed::{guest_order, seed_store, AFFILIATE_CODE, AFFILIATE_ID, STORE_ID, TEE_ID},
    },
    traits::{AffiliateManagement, GatewayStatus},
    AffiliateApi,
    EventProducers,
    OrderFlowApi,
    PaymentFlowApi,
};
use tokio::runtime::Runtime;

const SIGNALS: usize = 8;

#[test]
fn concurrent_confirmations_pay_once() {
    let _ = env_logger::try_init();
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let db = new_test_database().await;
        seed_store(&db, 10).await;
        let store_id = StoreId::from(STORE_ID);
        let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
        let gateway = FakeGateway::default();
        let payments = PaymentFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());

        let request = guest_order(vec![OrderItemRequest::new(TEE_ID, 4)]).with_affiliate("ALICE10");
        let order = orders.place_order(&store_id, request).await.unwrap();
        let init = payments.initialize_payment(&store_id, &order.order_number, None).await.unwrap();
        gateway.set_status(&init.reference, GatewayStatus::Success);

        // Webhooks and polls for the same payment, all at once
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..SIGNALS {
            let payments = payments.clone();
            let store_id = store_id.clone();
            let reference = init.reference.clone();
            tasks.spawn(async move {
                if i % 2 == 0 {
                    let payload = serde_json::json!({"event": "charge.success", "data": {"reference": reference}});
                    payments.webhook(&store_id, &payload).await
                } else {
                    payments.verify(&store_id, &reference).await
                }
            });
        }
        let mut transitions = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap().expect("Reconciliation failed") {
                ReconcileOutcome::Paid { accrual, .. } => {
                    transitions += 1;
                    assert_eq!(accrual.map(|a| a.commission), Some(Money::from(400)));
                },
                ReconcileOutcome::AlreadyPaid { .. } => {},
                other => panic!("Unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(transitions, 1);

        let order = orders.fetch_order(&order.order_number).await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(order.paid_at.is_some());
        let account = AffiliateApi::new(db.clone()).account(&store_id, AFFILIATE_ID).await.unwrap();
        assert_eq!(account.balance, Money::from(400));
        assert_eq!(account.total_sales, Money::from(4000));
        assert_eq!(account.total_orders, 1);
        assert_eq!(db.fetch_accruals(AFFILIATE_ID).await.unwrap().len(), 1);
        db.close().await;
    });
}

#[test]
fn payouts_never_overdraw() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let db = new_test_database().await;
        seed_store(&db, 10).await;
        let store_id = StoreId::from(STORE_ID);
        let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
        let payments = PaymentFlowApi::new(db.clone(), FakeGateway::default(), EventProducers::default());
        let order = orders
            .place_order(&store_id, guest_order(vec![OrderItemRequest::new(TEE_ID, 2)]).with_affiliate(AFFILIATE_ID))
            .await
            .unwrap();
        let init = payments.initialize_payment(&store_id, &order.order_number, None).await.unwrap();
        payments.confirm_payment(&store_id, &init.reference, None).await.unwrap();

        let affiliates = AffiliateApi::new(db.clone());
        let account = affiliates.payout(AFFILIATE_ID, Money::from(150)).await.unwrap();
        assert_eq!(account.balance, Money::from(50));
        assert_eq!(account.total_paid_out, Money::from(150));
        assert!(affiliates.payout(AFFILIATE_ID, Money::from(51)).await.is_err());
        assert!(affiliates.payout(AFFILIATE_ID, Money::from(0)).await.is_err());

        // Cancelling now can only claw back what is left
        let result = orders.cancel_order(&store_id, &order.order_number, "Fraud", "admin").await.unwrap();
        assert_eq!(result.reversed_commission.map(|r| r.commission), Some(Money::from(50)));
        let account = affiliates.account(&store_id, AFFILIATE_ID).await.unwrap();
        assert_eq!(account.balance, Money::from(0));
        db.close().await;
    });
}

#[test]
fn commission_uses_the_rate_frozen_at_placement() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let db = new_test_database().await;
        seed_store(&db, 10).await;
        let store_id = StoreId::from(STORE_ID);
        let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
        let payments = PaymentFlowApi::new(db.clone(), FakeGateway::default(), EventProducers::default());
        let order = orders
            .place_order(&store_id, guest_order(vec![OrderItemRequest::new(TEE_ID, 2)]).with_affiliate(AFFILIATE_CODE))
            .await
            .unwrap();
        assert_eq!(order.affiliate.as_ref().map(|a| a.commission_percent), Some(10.0));

        // The rate goes up while the order waits for payment
        let raised = NewAffiliate {
            id: AFFILIATE_ID.to_string(),
            store_id: store_id.clone(),
            code: AFFILIATE_CODE.to_string(),
            name: "Alice".to_string(),
            commission_percent: 25.0,
        };
        db.upsert_affiliate(raised).await.unwrap();

        let init = payments.initialize_payment(&store_id, &order.order_number, None).await.unwrap();
        match payments.confirm_payment(&store_id, &init.reference, None).await.unwrap() {
            ReconcileOutcome::Paid { accrual, .. } => {
                let accrual = accrual.expect("Commission should have been accrued");
                assert_eq!(accrual.sales, Money::from(2000));
                assert_eq!(accrual.commission, Money::from(200));
            },
            other => panic!("Unexpected outcome: {other:?}"),
        }
        let account = AffiliateApi::new(db.clone()).account(&store_id, AFFILIATE_ID).await.unwrap();
        assert_eq!(account.commission_percent, 25.0);
        assert_eq!(account.balance, Money::from(200));
        db.close().await;
    });
}
