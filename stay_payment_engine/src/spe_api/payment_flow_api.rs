use futures_util::future::join;
use log::*;
use spg_common::UsdAmount;

use crate::{
    db_types::{synthetic_transaction_id, NewPayment, Payment, PaymentStatus},
    spe_api::{
        payment_objects::{BalanceCheck, ChargeInstruction, PaymentResult, PaymentSearchFilter, SearchPage},
        PaymentFlowError,
    },
    traits::{
        CardGateway,
        ChargeRequest,
        ChargeResult,
        NotificationDispatcher,
        PaymentGatewayDatabase,
        PaymentReceipt,
    },
};

/// Charges below this amount are rejected before anything else happens.
pub const MINIMUM_PAYMENT: UsdAmount = UsdAmount::from_dollars(90);

/// `PaymentFlowApi` runs the full charge lifecycle: the balance pre-flight, the gateway submission,
/// persistence of exactly one audit record per attempt, and the confirmation emails.
///
/// Rules it enforces:
/// * No charge below [`MINIMUM_PAYMENT`].
/// * A charge attempt that got past the amount check leaves exactly one [`Payment`] row behind,
///   whatever happened, including gateway faults.
/// * Emails are best effort. Once the gateway has settled a charge, nothing the mail server does can
///   fail the request.
#[derive(Clone)]
pub struct PaymentFlowApi<B, G, N>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    db: B,
    gateway: G,
    dispatcher: N,
}

impl<B, G, N> PaymentFlowApi<B, G, N>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    pub fn new(db: B, gateway: G, dispatcher: N) -> Self {
        Self { db, gateway, dispatcher }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// The pre-flight balance check. Never persists anything and never charges the card.
    ///
    /// Requires raw card details; a stored payment method was already vetted by the processor when it
    /// was saved.
    pub async fn verify_funds(
        &self,
        instruction: &ChargeInstruction,
    ) -> Result<BalanceCheck, PaymentFlowError> {
        if instruction.amount < MINIMUM_PAYMENT {
            return Err(PaymentFlowError::BelowMinimum { minimum: MINIMUM_PAYMENT });
        }
        let card = instruction
            .card
            .clone()
            .ok_or(PaymentFlowError::MissingFundingSource)?
            .validated()
            .map_err(|_| PaymentFlowError::InvalidCardNumber)?;
        let info = self
            .gateway
            .retrieve_payment_method(&card, instruction.amount)
            .await
            .map_err(|e| PaymentFlowError::VerificationFailed(e.to_string()))?;
        debug!(
            "🔍 Balance check for {}: sufficient={}, currency={}",
            instruction.email, info.has_sufficient_funds, info.currency
        );
        Ok(BalanceCheck { has_sufficient_funds: info.has_sufficient_funds, currency: info.currency })
    }

    /// Runs one charge attempt end to end.
    pub async fn process_payment(
        &self,
        instruction: ChargeInstruction,
    ) -> Result<PaymentResult, PaymentFlowError> {
        if instruction.amount < MINIMUM_PAYMENT {
            return Err(PaymentFlowError::BelowMinimum { minimum: MINIMUM_PAYMENT });
        }
        let card = match instruction.card.clone() {
            Some(card) => Some(card.validated().map_err(|_| PaymentFlowError::InvalidCardNumber)?),
            None if instruction.payment_method_id.is_some() => None,
            None => return Err(PaymentFlowError::MissingFundingSource),
        };
        // The balance pre-flight only applies to raw cards. A fault at this stage still leaves an
        // audit record: the amount and card checks have passed, so the attempt is on the books.
        if let Some(card) = &card {
            let info = match self.gateway.retrieve_payment_method(card, instruction.amount).await {
                Ok(info) => info,
                Err(e) => {
                    error!("💳 Gateway fault during balance check for {}: {e}", instruction.email);
                    let record = self
                        .new_payment(&instruction, PaymentStatus::Failed, synthetic_transaction_id())
                        .with_failure_reason(e.to_string());
                    self.db.insert_payment(record).await?;
                    return Err(PaymentFlowError::VerificationFailed(e.to_string()));
                },
            };
            if !info.has_sufficient_funds {
                info!("💳 Insufficient funds for {} ({})", instruction.email, instruction.amount);
                let record = self
                    .new_payment(&instruction, PaymentStatus::InsufficientFunds, synthetic_transaction_id())
                    .with_failure_reason("Insufficient funds on card");
                let payment = self.db.insert_payment(record).await?;
                return Err(PaymentFlowError::InsufficientFunds { payment });
            }
        }

        let request = ChargeRequest {
            amount: instruction.amount,
            currency: instruction.currency.clone(),
            card: card.clone(),
            payment_method_id: instruction.payment_method_id.clone(),
            description: instruction.description.clone(),
            customer_email: instruction.email.clone(),
        };
        // TODO: attach an idempotency key to the charge so that a timed-out submission can be retried
        // without risking a double charge. Until then, gateway faults are never auto-retried.
        let outcome = match self.gateway.create_charge(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("💳 Gateway fault while charging {}: {e}", instruction.email);
                let record = self
                    .new_payment(&instruction, PaymentStatus::Failed, synthetic_transaction_id())
                    .with_failure_reason(e.to_string());
                let payment = self.db.insert_payment(record).await?;
                return Err(PaymentFlowError::ProcessingError {
                    payment: Some(payment),
                    reason: e.to_string(),
                });
            },
        };

        match outcome {
            ChargeResult::Succeeded { transaction_id, card: summary } => {
                let mut record = self.new_payment(&instruction, PaymentStatus::Completed, transaction_id);
                record.card_brand = summary.brand;
                record.card_last4 = summary.last4.or(card.as_ref().map(|c| c.last4()));
                let payment = self.db.insert_payment(record).await?;
                info!("💳 Payment {} completed for {}", payment.transaction_id, payment.email);
                self.dispatch_receipts(&payment);
                Ok(PaymentResult::Completed { payment })
            },
            ChargeResult::RequiresAction { transaction_id, client_secret } => {
                let record = self.new_payment(&instruction, PaymentStatus::Pending, transaction_id);
                let payment = self.db.insert_payment(record).await?;
                info!("💳 Payment {} requires customer action", payment.transaction_id);
                Ok(PaymentResult::RequiresAction { payment, client_secret })
            },
            ChargeResult::Declined { transaction_id, reason } => {
                let txid = transaction_id.unwrap_or_else(synthetic_transaction_id);
                let record = self
                    .new_payment(&instruction, PaymentStatus::Failed, txid)
                    .with_failure_reason(reason.clone());
                let payment = self.db.insert_payment(record).await?;
                info!("💳 Payment {} declined: {reason}", payment.transaction_id);
                Err(PaymentFlowError::Declined { payment })
            },
        }
    }

    pub async fn fetch_payment(&self, id: i64) -> Result<Payment, PaymentFlowError> {
        self.db.fetch_payment_by_id(id).await?.ok_or(PaymentFlowError::PaymentNotFound(id))
    }

    /// One page of the payment history, newest first, plus the total number of matching records.
    pub async fn payment_history(
        &self,
        filter: PaymentSearchFilter,
        page: SearchPage,
    ) -> Result<(Vec<Payment>, i64), PaymentFlowError> {
        Ok(self.db.search_payments(filter, page).await?)
    }

    /// Refunds a completed payment in full. When an order references the payment, the order follows it
    /// into the refunded state.
    pub async fn refund_payment(&self, id: i64) -> Result<Payment, PaymentFlowError> {
        let payment = self.fetch_payment(id).await?;
        if payment.status != PaymentStatus::Completed {
            return Err(PaymentFlowError::RefundNotAllowed { status: payment.status });
        }
        let refund = self
            .gateway
            .refund_charge(&payment.transaction_id)
            .await
            .map_err(|e| PaymentFlowError::ProcessingError { payment: None, reason: e.to_string() })?;
        let payment = self
            .db
            .update_payment_status(id, PaymentStatus::Completed, PaymentStatus::Refunded, Some(refund.refund_id))
            .await?;
        info!("💳 Payment {} refunded ({:?})", payment.transaction_id, payment.refund_id);
        if let Some(order) = self.db.fetch_order_by_payment_id(id).await? {
            use crate::db_types::OrderStatusType::{Completed, Refunded};
            match self.db.update_order_status(&order.order_id, Completed, Refunded).await {
                Ok(order) => debug!("🛒 Order {} marked refunded", order.order_id),
                Err(e) => warn!("🛒 Could not mirror refund onto order {}: {e}", order.order_id),
            }
        }
        Ok(payment)
    }

    fn new_payment(&self, instruction: &ChargeInstruction, status: PaymentStatus, txid: String) -> NewPayment {
        let mut record = NewPayment::new(instruction.user_id.clone(), instruction.amount, status, txid)
            .with_currency(&instruction.currency);
        record.payment_method = instruction.payment_method;
        record.card_last4 = instruction.card.as_ref().map(|c| c.last4());
        record.card_holder_name = instruction.card.as_ref().and_then(|c| c.holder_name.clone());
        record.email = instruction.email.clone();
        record.description = instruction.description.clone();
        record
    }

    fn dispatch_receipts(&self, payment: &Payment) {
        let receipt = PaymentReceipt {
            transaction_id: payment.transaction_id.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            email: payment.email.clone(),
            card_brand: payment.card_brand.clone(),
            card_last4: payment.card_last4.clone(),
            description: payment.description.clone(),
        };
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let (customer, admin) = join(
                dispatcher.send_payment_confirmation(&receipt),
                dispatcher.send_admin_payment_notification(&receipt),
            )
            .await;
            if let Err(e) = customer {
                warn!("📧 Could not send payment confirmation to {}: {e}", receipt.email);
            }
            if let Err(e) = admin {
                warn!("📧 Could not send admin notification for {}: {e}", receipt.transaction_id);
            }
        });
    }
}
