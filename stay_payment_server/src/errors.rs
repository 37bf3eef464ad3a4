use std::env;

use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use spg_common::parse_boolean_flag;
use stay_payment_engine::{OrderFlowError, PaymentFlowError, MINIMUM_PAYMENT};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error(transparent)]
    PaymentFlow(#[from] PaymentFlowError),
    #[error(transparent)]
    OrderFlow(#[from] OrderFlowError),
}

impl ServerError {
    /// The machine-readable `code` field carried in every error response.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequestBody(_) | Self::InvalidRequestPath(_) => "invalid_request",
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientPermissions(_) => "forbidden",
                _ => "unauthorized",
            },
            Self::NoRecordFound(_) => "not_found",
            Self::InsufficientPermissions(_) => "forbidden",
            Self::PaymentFlow(e) => payment_flow_code(e),
            Self::OrderFlow(e) => match e {
                OrderFlowError::OrderNotFound(_) => "not_found",
                OrderFlowError::EmptyOrder => "invalid_request",
                OrderFlowError::OrderAlreadyPaid(_) => "order_already_paid",
                OrderFlowError::InvalidTransition { .. } => "invalid_transition",
                OrderFlowError::PaymentFlow(e) => payment_flow_code(e),
                OrderFlowError::Database(_) => "processing_error",
            },
            _ => "processing_error",
        }
    }

    fn public_message(&self) -> String {
        if self.status_code().is_server_error() && !expose_error_detail() {
            return match self {
                Self::PaymentFlow(PaymentFlowError::VerificationFailed(_)) |
                Self::OrderFlow(OrderFlowError::PaymentFlow(PaymentFlowError::VerificationFailed(_))) => {
                    "Unable to verify card balance".to_string()
                },
                _ => "Error processing payment".to_string(),
            };
        }
        self.to_string()
    }
}

fn payment_flow_code(e: &PaymentFlowError) -> &'static str {
    match e {
        PaymentFlowError::BelowMinimum { .. } => "below_minimum",
        PaymentFlowError::InvalidCardNumber => "invalid_card",
        PaymentFlowError::MissingFundingSource => "invalid_request",
        PaymentFlowError::InsufficientFunds { .. } => "insufficient_funds",
        PaymentFlowError::Declined { .. } => "payment_failed",
        PaymentFlowError::PaymentNotFound(_) => "not_found",
        PaymentFlowError::RefundNotAllowed { .. } => "refund_not_allowed",
        PaymentFlowError::VerificationFailed(_) | PaymentFlowError::ProcessingError { .. } => "processing_error",
        PaymentFlowError::Database(_) => "processing_error",
    }
}

fn payment_flow_status(e: &PaymentFlowError) -> StatusCode {
    match e {
        PaymentFlowError::BelowMinimum { .. } |
        PaymentFlowError::InvalidCardNumber |
        PaymentFlowError::MissingFundingSource |
        PaymentFlowError::InsufficientFunds { .. } |
        PaymentFlowError::Declined { .. } |
        PaymentFlowError::RefundNotAllowed { .. } => StatusCode::BAD_REQUEST,
        PaymentFlowError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
        PaymentFlowError::VerificationFailed(_) |
        PaymentFlowError::ProcessingError { .. } |
        PaymentFlowError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn expose_error_detail() -> bool {
    parse_boolean_flag(env::var("SPG_EXPOSE_ERROR_DETAIL").ok(), false)
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) | Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                _ => StatusCode::UNAUTHORIZED,
            },
            Self::InitializeError(_) |
            Self::BackendError(_) |
            Self::IOError(_) |
            Self::ConfigurationError(_) |
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::PaymentFlow(e) => payment_flow_status(e),
            Self::OrderFlow(e) => match e {
                OrderFlowError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                OrderFlowError::EmptyOrder | OrderFlowError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
                OrderFlowError::OrderAlreadyPaid(_) => StatusCode::CONFLICT,
                OrderFlowError::PaymentFlow(e) => payment_flow_status(e),
                OrderFlowError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            error!("💻️ {self}");
        }
        let mut body = serde_json::json!({
            "success": false,
            "error": self.public_message(),
            "code": self.code(),
        });
        if self.code() == "below_minimum" {
            body["minimumAmount"] = serde_json::json!(MINIMUM_PAYMENT.whole_dollars());
        }
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token provided.")]
    MissingToken,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Access token has expired.")]
    ExpiredToken,
}
