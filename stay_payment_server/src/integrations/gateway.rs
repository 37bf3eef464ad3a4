use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::{Deserialize, Serialize};
use spg_common::UsdAmount;
use stay_payment_engine::{
    helpers::CardDetails,
    traits::{CardGateway, ChargeRequest, ChargeResult, GatewayCardSummary, GatewayError, PaymentMethodInfo, RefundResult},
};

use crate::config::GatewayConfig;

/// REST client for the card processor.
///
/// Charge amounts go over the wire in minor units (cents), which is the identity conversion for
/// [`UsdAmount`].
#[derive(Clone)]
pub struct HttpCardGateway {
    config: GatewayConfig,
    client: Arc<Client>,
}

#[derive(Serialize)]
struct CardPayload<'a> {
    number: &'a str,
    exp_month: u8,
    exp_year: u16,
    cvc: &'a str,
}

impl<'a> From<&'a CardDetails> for CardPayload<'a> {
    fn from(card: &'a CardDetails) -> Self {
        Self { number: &card.card_number, exp_month: card.exp_month, exp_year: card.exp_year, cvc: &card.cvv }
    }
}

#[derive(Deserialize)]
struct BalanceCheckResponse {
    has_sufficient_funds: bool,
    currency: String,
    #[serde(default)]
    card: CardSummaryPayload,
}

#[derive(Default, Deserialize)]
struct CardSummaryPayload {
    brand: Option<String>,
    last4: Option<String>,
}

impl From<CardSummaryPayload> for GatewayCardSummary {
    fn from(p: CardSummaryPayload) -> Self {
        GatewayCardSummary { brand: p.brand, last4: p.last4 }
    }
}

#[derive(Deserialize)]
struct ChargeResponse {
    id: String,
    status: String,
    client_secret: Option<String>,
    decline_reason: Option<String>,
    #[serde(default)]
    card: CardSummaryPayload,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
}

impl HttpCardGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.api_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client =
            Client::builder().default_headers(headers).build().map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    async fn post<T: serde::de::DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let url = self.url(path);
        trace!("Sending gateway request: {url}");
        let response =
            self.client.post(url).json(body).send().await.map_err(|e| GatewayError::Transport(e.to_string()))?;
        if response.status().is_success() {
            response.json::<T>().await.map_err(|e| GatewayError::Transport(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayError::Transport(e.to_string()))?;
            Err(GatewayError::Api { status, message })
        }
    }
}

impl CardGateway for HttpCardGateway {
    async fn retrieve_payment_method(
        &self,
        card: &CardDetails,
        amount: UsdAmount,
    ) -> Result<PaymentMethodInfo, GatewayError> {
        let body = serde_json::json!({
            "card": CardPayload::from(card),
            "amount": amount.value(),
            "currency": "USD",
        });
        let response: BalanceCheckResponse = self.post("/v1/balance_checks", &body).await?;
        Ok(PaymentMethodInfo {
            has_sufficient_funds: response.has_sufficient_funds,
            currency: response.currency,
            card: response.card.into(),
        })
    }

    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeResult, GatewayError> {
        let mut body = serde_json::json!({
            "amount": request.amount.value(),
            "currency": request.currency,
            "description": request.description,
            "receipt_email": request.customer_email,
        });
        match (&request.card, &request.payment_method_id) {
            (Some(card), _) => body["card"] = serde_json::json!(CardPayload::from(card)),
            (None, Some(id)) => body["payment_method"] = serde_json::json!(id),
            (None, None) => {
                return Err(GatewayError::InvalidRequest("No funding source on the charge request".to_string()))
            },
        }
        debug!("Submitting a {} charge to the gateway", request.amount);
        let response: ChargeResponse = self.post("/v1/charges", &body).await?;
        let result = match response.status.as_str() {
            "succeeded" => ChargeResult::Succeeded { transaction_id: response.id, card: response.card.into() },
            "requires_action" => ChargeResult::RequiresAction {
                transaction_id: response.id,
                client_secret: response.client_secret.unwrap_or_default(),
            },
            _ => ChargeResult::Declined {
                transaction_id: Some(response.id),
                reason: response.decline_reason.unwrap_or_else(|| "Payment failed".to_string()),
            },
        };
        Ok(result)
    }

    async fn refund_charge(&self, transaction_id: &str) -> Result<RefundResult, GatewayError> {
        let path = format!("/v1/charges/{transaction_id}/refund");
        info!("Requesting a refund of charge {transaction_id}");
        let response: RefundResponse = self.post(&path, &serde_json::json!({})).await?;
        Ok(RefundResult { refund_id: response.id })
    }
}
