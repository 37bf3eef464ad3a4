use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spg_common::UsdAmount;
use stay_payment_engine::{
    db_types::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatusType, Payment, PaymentMethod, PaymentStatus},
    helpers::CardDetails,
    order_objects::OrderWithItems,
    payment_objects::ChargeInstruction,
};

use crate::{auth::JwtClaims, errors::ServerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//--------------------------------------   Payment requests    -------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardParams {
    pub card_number: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub cvv: String,
    pub card_holder_name: Option<String>,
}

impl From<CardParams> for CardDetails {
    fn from(p: CardParams) -> Self {
        CardDetails {
            card_number: p.card_number,
            exp_month: p.exp_month,
            exp_year: p.exp_year,
            cvv: p.cvv,
            holder_name: p.card_holder_name,
        }
    }
}

/// Body of `POST /api/payments/process` and `POST /api/payments/verify`. Amounts are in dollars.
///
/// The funding source is either the card fields, inline at the top level, or `paymentMethodId` for a
/// method already stored with the processor. At least one of the two must be supplied.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentParams {
    pub amount: f64,
    pub currency: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_method_id: Option<String>,
    #[serde(flatten)]
    pub card: Option<CardParams>,
}

impl PaymentParams {
    pub fn to_instruction(&self, claims: &JwtClaims) -> Result<ChargeInstruction, ServerError> {
        let amount = UsdAmount::try_from_dollars_f64(self.amount)
            .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
        if self.card.is_none() && self.payment_method_id.is_none() {
            return Err(ServerError::InvalidRequestBody(
                "Either card details or paymentMethodId must be supplied".to_string(),
            ));
        }
        Ok(ChargeInstruction {
            user_id: claims.sub.clone(),
            amount,
            currency: self.currency.clone().unwrap_or_else(|| "USD".to_string()).to_uppercase(),
            payment_method: self.payment_method.unwrap_or(PaymentMethod::CreditCard),
            card: self.card.clone().map(Into::into),
            payment_method_id: self.payment_method_id.clone(),
            email: self.email.clone().unwrap_or_else(|| claims.email.clone()),
            description: self.description.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProcessedResponse {
    pub success: bool,
    pub payment_id: i64,
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
}

impl From<&Payment> for PaymentProcessedResponse {
    fn from(p: &Payment) -> Self {
        Self {
            success: true,
            payment_id: p.id,
            transaction_id: p.transaction_id.clone(),
            amount: p.amount.as_dollars_f64(),
            currency: p.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiresActionResponse {
    pub success: bool,
    pub requires_action: bool,
    pub payment_id: i64,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceCheckResponse {
    pub success: bool,
    pub has_sufficient_funds: bool,
    pub currency: String,
}

/// A payment as exposed over the API. Card data is reduced to brand and last four digits.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: i64,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
    pub card_holder_name: Option<String>,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub failure_reason: Option<String>,
    pub refund_id: Option<String>,
    pub email: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentView {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            amount: p.amount.as_dollars_f64(),
            currency: p.currency,
            payment_method: p.payment_method,
            card_brand: p.card_brand,
            card_last4: p.card_last4,
            card_holder_name: p.card_holder_name,
            status: p.status,
            transaction_id: p.transaction_id,
            failure_reason: p.failure_reason,
            refund_id: p.refund_id,
            email: p.email,
            description: p.description,
            created_at: p.created_at,
        }
    }
}

//--------------------------------------   Payment history     -------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<PaymentStatus>,
    pub method: Option<PaymentMethod>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub count: usize,
    pub page: i64,
    pub total_pages: i64,
    pub total_payments: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub payments: Vec<PaymentView>,
    pub pagination: Pagination,
}

//--------------------------------------       Orders          -------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderParams {
    pub customer_email: String,
    pub total_amount: f64,
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub items: Vec<NewOrderItemParams>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItemParams {
    pub product_id: String,
    pub name: String,
    pub quantity: Option<i64>,
    pub price: f64,
}

impl NewOrderParams {
    pub fn to_new_order(&self) -> Result<NewOrder, ServerError> {
        let total = UsdAmount::try_from_dollars_f64(self.total_amount)
            .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
        let items = self
            .items
            .iter()
            .map(|item| {
                let price = UsdAmount::try_from_dollars_f64(item.price)
                    .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
                Ok(NewOrderItem {
                    product_id: item.product_id.clone(),
                    name: item.name.clone(),
                    quantity: item.quantity,
                    price,
                })
            })
            .collect::<Result<Vec<_>, ServerError>>()?;
        let method = self.payment_method.unwrap_or(PaymentMethod::CreditCard);
        Ok(NewOrder::new(self.customer_email.clone(), total, method).with_items(items))
    }
}

/// Response to `GET /api/orders`: everything the authenticated customer has ordered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyOrdersResponse {
    pub customer_email: String,
    pub total_orders: usize,
    pub orders: Vec<OrderView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveOrderParams {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    pub subtotal: f64,
}

impl From<OrderItem> for OrderItemView {
    fn from(item: OrderItem) -> Self {
        Self {
            product_id: item.product_id,
            name: item.name,
            quantity: item.quantity,
            price: item.price.as_dollars_f64(),
            subtotal: item.subtotal.as_dollars_f64(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: String,
    pub customer_email: String,
    pub total_amount: f64,
    pub payment_method: PaymentMethod,
    pub status: OrderStatusType,
    pub payment_id: Option<i64>,
    pub items: Vec<OrderItemView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderWithItems> for OrderView {
    fn from(result: OrderWithItems) -> Self {
        Self::from_parts(result.order, result.items)
    }
}

impl OrderView {
    pub fn from_parts(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            order_id: order.order_id.0,
            customer_email: order.customer_email,
            total_amount: order.total_amount.as_dollars_f64(),
            payment_method: order.payment_method,
            status: order.status,
            payment_id: order.payment_id,
            items: items.into_iter().map(Into::into).collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}
