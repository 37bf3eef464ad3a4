use std::future::Future;

use serde::{Deserialize, Serialize};
use spg_common::UsdAmount;
use thiserror::Error;

use crate::db_types::{Order, OrderItem};

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("Could not deliver notification: {0}")]
    DeliveryFailed(String),
}

/// The fields that appear in payment emails. Deliberately a subset of [`crate::db_types::Payment`] so
/// that templates cannot leak audit-only columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub amount: UsdAmount,
    pub currency: String,
    pub email: String,
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
    pub description: Option<String>,
}

/// Sink for customer and back-office emails.
///
/// Implementations must be fire-and-forget safe: the payment flows log delivery failures and carry on,
/// so a slow or broken mail server must never fail a charge that the gateway has already settled.
///
/// The methods are desugared `async fn`s with an explicit `Send` bound on the returned future, since
/// the flows run the sends on spawned tasks.
pub trait NotificationDispatcher: Clone + Send + Sync {
    /// Receipt to the paying customer.
    fn send_payment_confirmation(
        &self,
        receipt: &PaymentReceipt,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;

    /// Copy of the receipt to the back-office address.
    fn send_admin_payment_notification(
        &self,
        receipt: &PaymentReceipt,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;

    /// Order summary to the customer once their order reaches the completed state.
    fn send_order_confirmation(
        &self,
        order: &Order,
        items: &[OrderItem],
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}
