use spg_common::UsdAmount;
use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType, Payment, PaymentStatus},
    traits::PaymentGatewayError,
};

/// The business-level failure taxonomy of the charge lifecycle. Variants that carry a [`Payment`]
/// indicate that an audit record was persisted for the attempt before the error was raised.
#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("Minimum payment amount is ${}", minimum.whole_dollars())]
    BelowMinimum { minimum: UsdAmount },
    #[error("Invalid card number")]
    InvalidCardNumber,
    #[error("Card details or a stored payment method id are required")]
    MissingFundingSource,
    #[error("Unable to verify card balance")]
    VerificationFailed(String),
    #[error("Insufficient funds")]
    InsufficientFunds { payment: Payment },
    #[error("Payment failed: {}", .payment.failure_reason.as_deref().unwrap_or("card declined"))]
    Declined { payment: Payment },
    #[error("Payment {0} does not exist")]
    PaymentNotFound(i64),
    #[error("Only completed payments can be refunded, this one is {status}")]
    RefundNotAllowed { status: PaymentStatus },
    #[error("Error processing payment: {reason}")]
    ProcessingError { payment: Option<Payment>, reason: String },
    #[error("Storage error in payment flow: {0}")]
    Database(#[from] PaymentGatewayError),
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order items are required")]
    EmptyOrder,
    #[error("Order {0} has already been paid")]
    OrderAlreadyPaid(OrderId),
    #[error("An order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error(transparent)]
    PaymentFlow(#[from] PaymentFlowError),
    #[error("Storage error in order flow: {0}")]
    Database(#[from] PaymentGatewayError),
}
