//! Test doubles for the engine's collaborator traits.
//!
//! The traits require `Clone` so that the flow APIs can share their collaborators across tasks, which
//! a bare `mockall` mock cannot satisfy. The mocks are therefore wrapped in `Arc` newtypes that
//! implement the traits by delegation; expectations are set on the inner mock before wrapping.
use std::sync::{Arc, Mutex};

use mockall::mock;
use spg_common::UsdAmount;

use crate::{
    db_types::{Order, OrderItem},
    helpers::CardDetails,
    traits::{
        CardGateway,
        ChargeRequest,
        ChargeResult,
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

#[derive(Clone)]
pub struct SharedMockGateway(pub Arc<MockCardGw>);

impl SharedMockGateway {
    pub fn new(mock: MockCardGw) -> Self {
        Self(Arc::new(mock))
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

/// A dispatcher that records every notification it is asked to send. Because the flows dispatch
/// emails from a spawned task, tests should yield (or poll [`MemoryDispatcher::counts`]) before
/// asserting.
#[derive(Clone, Default)]
pub struct MemoryDispatcher {
    sent: Arc<Mutex<SentNotifications>>,
}

#[derive(Debug, Default)]
pub struct SentNotifications {
    pub customer_receipts: Vec<PaymentReceipt>,
    pub admin_receipts: Vec<PaymentReceipt>,
    pub order_confirmations: Vec<Order>,
}

impl MemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// (customer receipts, admin receipts, order confirmations) recorded so far.
    pub fn counts(&self) -> (usize, usize, usize) {
        let sent = self.sent.lock().unwrap();
        (sent.customer_receipts.len(), sent.admin_receipts.len(), sent.order_confirmations.len())
    }

    pub fn with_sent<R>(&self, f: impl FnOnce(&SentNotifications) -> R) -> R {
        f(&self.sent.lock().unwrap())
    }
}

impl NotificationDispatcher for MemoryDispatcher {
    async fn send_payment_confirmation(&self, receipt: &PaymentReceipt) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().customer_receipts.push(receipt.clone());
        Ok(())
    }

    async fn send_admin_payment_notification(&self, receipt: &PaymentReceipt) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().admin_receipts.push(receipt.clone());
        Ok(())
    }

    async fn send_order_confirmation(&self, order: &Order, _items: &[OrderItem]) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().order_confirmations.push(order.clone());
        Ok(())
    }
}

/// A dispatcher whose every delivery fails. Payment flows must shrug this off.
#[derive(Clone, Default)]
pub struct BrokenDispatcher;

impl NotificationDispatcher for BrokenDispatcher {
    async fn send_payment_confirmation(&self, _receipt: &PaymentReceipt) -> Result<(), NotifyError> {
        Err(NotifyError::DeliveryFailed("smtp connection refused".to_string()))
    }

    async fn send_admin_payment_notification(&self, _receipt: &PaymentReceipt) -> Result<(), NotifyError> {
        Err(NotifyError::DeliveryFailed("smtp connection refused".to_string()))
    }

    async fn send_order_confirmation(&self, _order: &Order, _items: &[OrderItem]) -> Result<(), NotifyError> {
        Err(NotifyError::DeliveryFailed("smtp connection refused".to_string()))
    }
}
