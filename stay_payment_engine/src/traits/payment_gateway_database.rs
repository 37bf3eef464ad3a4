use thiserror::Error;

use crate::{
    db_types::{NewOrder, NewPayment, Order, OrderId, OrderItem, OrderStatusType, Payment, PaymentStatus},
    spe_api::payment_objects::{PaymentSearchFilter, SearchPage},
};

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(i64),
    #[error("A record with this transaction id already exists: {0}")]
    DuplicateTransactionId(String),
    #[error("The order is not in the required state for this operation")]
    StalePreconditions,
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// The storage backend for orders and payment audit records.
///
/// All status transitions are compare-and-set: the `from` state is part of the `WHERE` clause, so two
/// racing writers cannot both apply the same transition. Callers receive [`PaymentGatewayError::StalePreconditions`]
/// when they lose the race.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone {
    /// Inserts the order and its line items in a single transaction and returns the stored order.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_order_items(&self, order: &Order) -> Result<Vec<OrderItem>, PaymentGatewayError>;

    async fn fetch_orders_for_customer(&self, email: &str) -> Result<Vec<Order>, PaymentGatewayError>;

    /// The order settled by the given payment, if any.
    async fn fetch_order_by_payment_id(&self, payment_id: i64) -> Result<Option<Order>, PaymentGatewayError>;

    /// Moves the order from `from` to `to`. Fails with [`PaymentGatewayError::StalePreconditions`] if
    /// the order is no longer in the `from` state.
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
    ) -> Result<Order, PaymentGatewayError>;

    /// Records a payment outcome against an order: sets `payment_id` and moves the order to `status`
    /// in one statement, guarded on the order not already being completed or refunded.
    async fn attach_payment_to_order(
        &self,
        order_id: &OrderId,
        payment_id: i64,
        status: OrderStatusType,
    ) -> Result<Order, PaymentGatewayError>;

    /// Inserts a payment audit record. The transaction id must be globally unique.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentGatewayError>;

    async fn fetch_payment_by_id(&self, id: i64) -> Result<Option<Payment>, PaymentGatewayError>;

    async fn fetch_payment_by_transaction_id(&self, txid: &str) -> Result<Option<Payment>, PaymentGatewayError>;

    /// Moves a payment from `from` to `to`, optionally recording the gateway's refund reference.
    async fn update_payment_status(
        &self,
        id: i64,
        from: PaymentStatus,
        to: PaymentStatus,
        refund_id: Option<String>,
    ) -> Result<Payment, PaymentGatewayError>;

    /// Returns one page of payments matching the filter, newest first, along with the total number of
    /// matching records.
    async fn search_payments(
        &self,
        filter: PaymentSearchFilter,
        page: SearchPage,
    ) -> Result<(Vec<Payment>, i64), PaymentGatewayError>;

    async fn close(&mut self) -> Result<(), PaymentGatewayError>;
}
