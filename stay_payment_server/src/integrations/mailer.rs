use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::Client;
use serde::Serialize;
use stay_payment_engine::{
    db_types::{Order, OrderItem},
    traits::{NotificationDispatcher, NotifyError, PaymentReceipt},
};

use crate::config::MailConfig;

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Posts plain-text emails to a transactional mail API.
///
/// Delivery is retried with exponential backoff. This is deliberately different from the charge path,
/// which never retries: a duplicate email is an annoyance, a duplicate charge is not.
#[derive(Clone)]
pub struct HttpMailer {
    config: MailConfig,
    client: Arc<Client>,
}

#[derive(Serialize)]
struct MailMessage {
    from: String,
    to: String,
    subject: String,
    text: String,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config, client: Arc::new(Client::new()) }
    }

    fn message(&self, to: &str, subject: String, text: String) -> MailMessage {
        MailMessage { from: self.config.sender.clone(), to: to.to_string(), subject, text }
    }

    async fn deliver(&self, message: MailMessage) -> Result<(), NotifyError> {
        if self.config.api_url.is_empty() {
            warn!("📧 No mail API configured. Dropping email to {} ({})", message.to, message.subject);
            return Ok(());
        }
        let url = format!("{}/v1/send", self.config.api_url.trim_end_matches('/'));
        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let result = self
                .client
                .post(&url)
                .bearer_auth(self.config.api_key.reveal())
                .json(&message)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    debug!("📧 Email to {} delivered on attempt {attempt}", message.to);
                    return Ok(());
                },
                Ok(response) => {
                    last_error = format!("mail API returned {}", response.status());
                },
                Err(e) => {
                    last_error = e.to_string();
                },
            }
            if attempt < MAX_ATTEMPTS {
                let backoff = BASE_BACKOFF * 2u32.pow(attempt - 1);
                warn!("📧 Attempt {attempt} to email {} failed: {last_error}. Retrying in {backoff:?}", message.to);
                tokio::time::sleep(backoff).await;
            }
        }
        Err(NotifyError::DeliveryFailed(last_error))
    }
}

impl NotificationDispatcher for HttpMailer {
    async fn send_payment_confirmation(&self, receipt: &PaymentReceipt) -> Result<(), NotifyError> {
        let card = match (&receipt.card_brand, &receipt.card_last4) {
            (Some(brand), Some(last4)) => format!("{brand} card ending in {last4}"),
            (None, Some(last4)) => format!("card ending in {last4}"),
            _ => "your card".to_string(),
        };
        let text = format!(
            "Thank you for your payment of {} {}.\n\nThe {card} was charged successfully.\nTransaction reference: \
             {}\n{}",
            receipt.amount,
            receipt.currency,
            receipt.transaction_id,
            receipt.description.as_deref().unwrap_or_default(),
        );
        let message = self.message(&receipt.email, "Payment confirmation".to_string(), text);
        self.deliver(message).await
    }

    async fn send_admin_payment_notification(&self, receipt: &PaymentReceipt) -> Result<(), NotifyError> {
        let text = format!(
            "Payment received.\n\nCustomer: {}\nAmount: {} {}\nTransaction reference: {}",
            receipt.email, receipt.amount, receipt.currency, receipt.transaction_id,
        );
        let message = self.message(&self.config.admin_email, "Payment received".to_string(), text);
        self.deliver(message).await
    }

    async fn send_order_confirmation(&self, order: &Order, items: &[OrderItem]) -> Result<(), NotifyError> {
        let lines = items
            .iter()
            .map(|i| format!("  {} x{} at {} = {}", i.name, i.quantity, i.price, i.subtotal))
            .collect::<Vec<_>>()
            .join("\n");
        let text = format!(
            "Your order {} is confirmed.\n\n{lines}\n\nTotal: {}\n\nWe look forward to welcoming you.",
            order.order_id, order.total_amount,
        );
        let message = self.message(&order.customer_email, format!("Order {} confirmed", order.order_id), text);
        self.deliver(message).await
    }
}
