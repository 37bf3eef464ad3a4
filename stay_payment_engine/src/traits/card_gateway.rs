use serde::{Deserialize, Serialize};
use spg_common::UsdAmount;
use thiserror::Error;

use crate::helpers::CardDetails;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway could not be reached at all.
    #[error("Gateway transport error: {0}")]
    Transport(String),
    /// The gateway rejected the request as malformed before attempting the charge.
    #[error("Gateway rejected the request: {0}")]
    InvalidRequest(String),
    /// The gateway returned an error response.
    #[error("Gateway API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// What the gateway reports about a funding source before any charge is attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodInfo {
    pub has_sufficient_funds: bool,
    pub currency: String,
    pub card: GatewayCardSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayCardSummary {
    pub brand: Option<String>,
    pub last4: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount: UsdAmount,
    pub currency: String,
    /// Raw card details, when the customer typed a card in.
    pub card: Option<CardDetails>,
    /// The id of a payment method stored with the processor, as an alternative to raw card details.
    pub payment_method_id: Option<String>,
    pub description: Option<String>,
    pub customer_email: String,
}

/// The three ways a submitted charge can resolve. A transport or API fault is a [`GatewayError`]
/// instead; a decline is a successful round trip with a negative answer.
#[derive(Debug, Clone)]
pub enum ChargeResult {
    Succeeded {
        transaction_id: String,
        card: GatewayCardSummary,
    },
    /// The customer must complete an extra authentication step before the charge settles.
    RequiresAction {
        transaction_id: String,
        client_secret: String,
    },
    Declined {
        /// Some gateways assign a transaction id even to declined charges.
        transaction_id: Option<String>,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    pub refund_id: String,
}

/// Client for the external card processor.
#[allow(async_fn_in_trait)]
pub trait CardGateway: Clone {
    /// Looks up the funding source and reports whether it can cover `amount`.
    async fn retrieve_payment_method(
        &self,
        card: &CardDetails,
        amount: UsdAmount,
    ) -> Result<PaymentMethodInfo, GatewayError>;

    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeResult, GatewayError>;

    /// Refunds a settled charge in full.
    async fn refund_charge(&self, transaction_id: &str) -> Result<RefundResult, GatewayError>;
}
