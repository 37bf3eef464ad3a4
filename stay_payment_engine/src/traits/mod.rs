//! The seams between the engine and its collaborators.
//!
//! Each trait here is implemented once for production (sqlite storage, the HTTP card gateway client,
//! the SMTP mailer) and mocked in tests with `mockall`.
mod card_gateway;
mod notifications;
mod payment_gateway_database;

pub use card_gateway::{
    CardGateway,
    ChargeRequest,
    ChargeResult,
    GatewayCardSummary,
    GatewayError,
    PaymentMethodInfo,
    RefundResult,
};
pub use notifications::{NotificationDispatcher, NotifyError, PaymentReceipt};
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
