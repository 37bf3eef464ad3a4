use std::sync::{Arc, Mutex};

use mockall::mock;
use spg_common::UsdAmount;
use stay_payment_engine::{
    db_types::{Order, OrderItem},
    helpers::CardDetails,
    traits::{
        CardGateway,
        ChargeRequest,
        ChargeResult,
        GatewayCardSummary,
        GatewayError,
        NotificationDispatcher,
        NotifyError,
        PaymentMethodInfo,
        PaymentReceipt,
        RefundResult,
    },
};

mock! {
    pub CardGw {
        pub async fn retrieve_payment_method(
            &self,
            card: CardDetails,
            amount: UsdAmount,
        ) -> Result<PaymentMethodInfo, GatewayError>;
        pub async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeResult, GatewayError>;
        pub async fn refund_charge(&self, transaction_id: String) -> Result<RefundResult, GatewayError>;
    }
}

/// `Arc` wrapper so that the mock satisfies the `Clone` bound on [`CardGateway`]. Expectations are
/// set on the inner mock before wrapping.
#[derive(Clone)]
pub struct SharedMockGateway(pub Arc<MockCardGw>);

impl SharedMockGateway {
    pub fn new(mock: MockCardGw) -> Self {
        Self(Arc::new(mock))
    }

    /// A gateway that reports sufficient funds and settles every charge.
    pub fn always_succeeds(transaction_id: &str) -> Self {
        let mut mock = MockCardGw::new();
        let txid = transaction_id.to_string();
        mock.expect_retrieve_payment_method().returning(|_, _| {
            Ok(PaymentMethodInfo {
                has_sufficient_funds: true,
                currency: "USD".to_string(),
                card: GatewayCardSummary { brand: Some("visa".to_string()), last4: Some("4242".to_string()) },
            })
        });
        mock.expect_create_charge().returning(move |_| {
            Ok(ChargeResult::Succeeded { transaction_id: txid.clone(), card: GatewayCardSummary::default() })
        });
        mock.expect_refund_charge().returning(|_| Ok(RefundResult { refund_id: "re_mock".to_string() }));
        Self::new(mock)
    }
}

impl CardGateway for SharedMockGateway {
    async fn retrieve_payment_method(
        &self,
        card: &CardDetails,
        amount: UsdAmount,
    ) -> Result<PaymentMethodInfo, GatewayError> {
        self.0.retrieve_payment_method(card.clone(), amount).await
    }

    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeResult, GatewayError> {
        self.0.create_charge(request).await
    }

    async fn refund_charge(&self, transaction_id: &str) -> Result<RefundResult, GatewayError> {
        self.0.refund_charge(transaction_id.to_string()).await
    }
}

/// Records notifications instead of sending them.
#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    pub receipts: Arc<Mutex<Vec<PaymentReceipt>>>,
    pub order_confirmations: Arc<Mutex<Vec<Order>>>,
}

impl NotificationDispatcher for RecordingDispatcher {
    async fn send_payment_confirmation(&self, receipt: &PaymentReceipt) -> Result<(), NotifyError> {
        self.receipts.lock().unwrap().push(receipt.clone());
        Ok(())
    }

    async fn send_admin_payment_notification(&self, _receipt: &PaymentReceipt) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn send_order_confirmation(&self, order: &Order, _items: &[OrderItem]) -> Result<(), NotifyError> {
        self.order_confirmations.lock().unwrap().push(order.clone());
        Ok(())
    }
}
