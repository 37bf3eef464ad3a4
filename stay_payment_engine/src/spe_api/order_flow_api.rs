use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatusType, PaymentMethod},
    helpers::CardDetails,
    spe_api::{
        order_objects::{OrderPaymentResult, OrderWithItems},
        payment_flow_api::PaymentFlowApi,
        payment_objects::{ChargeInstruction, PaymentResult},
        OrderFlowError,
        PaymentFlowError,
    },
    traits::{CardGateway, NotificationDispatcher, PaymentGatewayDatabase, PaymentGatewayError},
};

/// `OrderFlowApi` keeps order state consistent with payment outcomes.
///
/// Order status transitions are one-way. `Pending` can move to `Completed` or `Failed`, and
/// `Completed` can move to `Refunded`; nothing ever moves back to `Pending`. All transitions are
/// applied with a compare-and-set update, so two requests racing to complete the same order cannot
/// both win.
#[derive(Clone)]
pub struct OrderFlowApi<B, G, N>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    db: B,
    payments: PaymentFlowApi<B, G, N>,
    dispatcher: N,
}

impl<B, G, N> OrderFlowApi<B, G, N>
where
    B: PaymentGatewayDatabase,
    G: CardGateway,
    N: NotificationDispatcher + 'static,
{
    pub fn new(db: B, payments: PaymentFlowApi<B, G, N>, dispatcher: N) -> Self {
        Self { db, payments, dispatcher }
    }

    /// Creates a new pending order. Orders without line items are rejected.
    pub async fn create_order(&self, order: NewOrder) -> Result<OrderWithItems, OrderFlowError> {
        if order.items.is_empty() {
            return Err(OrderFlowError::EmptyOrder);
        }
        let stored = self.db.insert_order(order).await?;
        let items = self.db.fetch_order_items(&stored).await?;
        info!("🛒 Order {} created for {} ({})", stored.order_id, stored.customer_email, stored.total_amount);
        Ok(OrderWithItems { order: stored, items })
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<OrderWithItems, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let items = self.db.fetch_order_items(&order).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Every order a customer has placed, newest first, with line items attached.
    pub async fn orders_for_customer(&self, email: &str) -> Result<Vec<OrderWithItems>, OrderFlowError> {
        let orders = self.db.fetch_orders_for_customer(email).await?;
        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.db.fetch_order_items(&order).await?;
            result.push(OrderWithItems { order, items });
        }
        Ok(result)
    }

    /// The manual, admin-driven transition. Moving an order to `Completed` this way sends the order
    /// confirmation email even though no payment reference is attached.
    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if order.status == new_status {
            return Ok(order);
        }
        if !transition_is_allowed(order.status, new_status) {
            return Err(OrderFlowError::InvalidTransition { from: order.status, to: new_status });
        }
        let updated = match self.db.update_order_status(order_id, order.status, new_status).await {
            Ok(order) => order,
            // Lost the race against a concurrent transition. Treat it like the transition check above.
            Err(PaymentGatewayError::StalePreconditions) => {
                return Err(OrderFlowError::InvalidTransition { from: order.status, to: new_status })
            },
            Err(e) => return Err(e.into()),
        };
        debug!("🛒 Order {} moved from {} to {}", updated.order_id, order.status, updated.status);
        if updated.status == OrderStatusType::Completed {
            let items = self.db.fetch_order_items(&updated).await?;
            self.dispatch_order_confirmation(updated.clone(), items);
        }
        Ok(updated)
    }

    /// The order-integrated payment flow. Charges the order total to the given card and mirrors the
    /// outcome onto the order.
    ///
    /// An order that is already completed (or refunded) is rejected before any gateway traffic.
    /// Outcomes where no charge was submitted, below-minimum, bad card, insufficient funds, or a
    /// failed balance check, leave the order untouched.
    pub async fn pay_order(
        &self,
        order_id: &OrderId,
        user_id: &str,
        card: CardDetails,
    ) -> Result<OrderPaymentResult, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if matches!(order.status, OrderStatusType::Completed | OrderStatusType::Refunded) {
            return Err(OrderFlowError::OrderAlreadyPaid(order_id.clone()));
        }
        let instruction = ChargeInstruction {
            user_id: user_id.to_string(),
            amount: order.total_amount,
            currency: "USD".to_string(),
            payment_method: PaymentMethod::CreditCard,
            card: Some(card),
            payment_method_id: None,
            email: order.customer_email.clone(),
            description: Some(format!("Payment for order {}", order.order_id)),
        };
        match self.payments.process_payment(instruction).await {
            Ok(PaymentResult::Completed { payment }) => {
                let order = self.attach(order_id, payment.id, OrderStatusType::Completed).await?;
                info!("🛒 Order {} paid by payment {}", order.order_id, payment.transaction_id);
                Ok(OrderPaymentResult::Settled { order, payment })
            },
            Ok(PaymentResult::RequiresAction { payment, client_secret }) => {
                // The charge is not settled yet, so the order stays pending.
                Ok(OrderPaymentResult::RequiresAction { order, payment, client_secret })
            },
            Err(PaymentFlowError::Declined { payment }) => {
                let _ = self.attach(order_id, payment.id, OrderStatusType::Failed).await?;
                Err(PaymentFlowError::Declined { payment }.into())
            },
            Err(PaymentFlowError::ProcessingError { payment: Some(payment), reason }) => {
                let _ = self.attach(order_id, payment.id, OrderStatusType::Failed).await?;
                Err(PaymentFlowError::ProcessingError { payment: Some(payment), reason }.into())
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn attach(
        &self,
        order_id: &OrderId,
        payment_id: i64,
        status: OrderStatusType,
    ) -> Result<Order, OrderFlowError> {
        match self.db.attach_payment_to_order(order_id, payment_id, status).await {
            Ok(order) => Ok(order),
            Err(PaymentGatewayError::StalePreconditions) => {
                // A concurrent request completed the order while our charge was in flight. The payment
                // record stands; the order keeps the first writer's outcome.
                warn!("🛒 Order {order_id} changed state while payment {payment_id} was in flight");
                Err(OrderFlowError::OrderAlreadyPaid(order_id.clone()))
            },
            Err(e) => Err(e.into()),
        }
    }

    fn dispatch_order_confirmation(&self, order: Order, items: Vec<OrderItem>) {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.send_order_confirmation(&order, &items).await {
                warn!("📧 Could not send order confirmation for {}: {e}", order.order_id);
            }
        });
    }
}

fn transition_is_allowed(from: OrderStatusType, to: OrderStatusType) -> bool {
    use OrderStatusType::*;
    match (from, to) {
        (Pending, Completed) | (Pending, Failed) => true,
        (Failed, Completed) => true,
        (Completed, Refunded) => true,
        _ => false,
    }
}
