use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use spg_common::{UsdAmount, USD_CURRENCY_CODE};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(pub &'static str, pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
/// The public identifier of an order, as shared with customers and the storefront. Distinct from the
/// database rowid.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh order id. Uniqueness is backed by the unique constraint on the orders table.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self(format!("ord-{:016x}", rng.gen::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been created and no payment outcome has been recorded yet.
    Pending,
    /// A payment for the full order amount has completed, or an admin has manually confirmed the order.
    Completed,
    /// The payment attempt linked to this order was declined or errored.
    Failed,
    /// The order's completed payment has been refunded.
    Refunded,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Completed => write!(f, "completed"),
            OrderStatusType::Failed => write!(f, "failed"),
            OrderStatusType::Refunded => write!(f, "refunded"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError("order status", s.to_string())),
        }
    }
}

//--------------------------------------    PaymentStatus      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// The charge is in flight, typically waiting for a 3-D Secure step-up by the customer.
    Pending,
    /// The gateway confirmed the charge.
    Completed,
    /// The gateway declined the charge, or an internal fault aborted the attempt.
    Failed,
    /// A previously completed charge has been refunded.
    Refunded,
    /// The pre-flight balance check found the funding source unable to cover the amount.
    InsufficientFunds,
}

impl PaymentStatus {
    /// A terminal status never transitions again, with the one exception of `Completed -> Refunded`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Refunded => write!(f, "refunded"),
            PaymentStatus::InsufficientFunds => write!(f, "insufficient_funds"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            "insufficient_funds" => Ok(Self::InsufficientFunds),
            s => Err(ConversionError("payment status", s.to_string())),
        }
    }
}

//--------------------------------------    PaymentMethod      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Paypal,
    BankTransfer,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::CreditCard => write!(f, "credit_card"),
            PaymentMethod::Paypal => write!(f, "paypal"),
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(Self::CreditCard),
            "paypal" => Ok(Self::Paypal),
            "bank_transfer" => Ok(Self::BankTransfer),
            s => Err(ConversionError("payment method", s.to_string())),
        }
    }
}

//--------------------------------------        Role           -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A regular customer. May read and mutate only their own orders and payments.
    User,
    /// Back-office staff. May read any record and drive manual order transitions and refunds.
    Admin,
}

pub type Roles = Vec<Role>;

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError("role", s.to_string())),
        }
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_email: String,
    pub total_amount: UsdAmount,
    pub payment_method: PaymentMethod,
    pub status: OrderStatusType,
    /// Reference to the payment that settled (or failed to settle) this order. `None` until a payment
    /// attempt has resolved against the gateway.
    pub payment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      OrderItem        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub price: UsdAmount,
    /// Always `price * quantity`. Stored for audit, recomputed on every read path.
    pub subtotal: UsdAmount,
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_email: String,
    pub total_amount: UsdAmount,
    pub payment_method: PaymentMethod,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new(customer_email: String, total_amount: UsdAmount, payment_method: PaymentMethod) -> Self {
        Self { order_id: OrderId::random(), customer_email, total_amount, payment_method, items: Vec::new() }
    }

    pub fn with_items(mut self, items: Vec<NewOrderItem>) -> Self {
        self.items = items;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub name: String,
    /// Defaults to 1 when the storefront omits it.
    pub quantity: Option<i64>,
    pub price: UsdAmount,
}

impl NewOrderItem {
    pub fn quantity(&self) -> i64 {
        self.quantity.unwrap_or(1).max(1)
    }

    pub fn subtotal(&self) -> UsdAmount {
        self.price * self.quantity()
    }
}

//--------------------------------------       Payment         -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    /// The id of the owning user in the external user-record store.
    pub user_id: String,
    pub amount: UsdAmount,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
    pub card_holder_name: Option<String>,
    pub status: PaymentStatus,
    /// Globally unique. Assigned exactly once at creation: the gateway's transaction id, or a synthetic
    /// `FAIL-` id for attempts that never produced one.
    pub transaction_id: String,
    pub failure_reason: Option<String>,
    pub refund_id: Option<String>,
    pub email: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      NewPayment       -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub user_id: String,
    pub amount: UsdAmount,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
    pub card_holder_name: Option<String>,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub failure_reason: Option<String>,
    pub email: String,
    pub description: Option<String>,
}

impl NewPayment {
    pub fn new(user_id: String, amount: UsdAmount, status: PaymentStatus, transaction_id: String) -> Self {
        Self {
            user_id,
            amount,
            currency: USD_CURRENCY_CODE.to_string(),
            payment_method: PaymentMethod::CreditCard,
            card_brand: None,
            card_last4: None,
            card_holder_name: None,
            status,
            transaction_id,
            failure_reason: None,
            email: String::new(),
            description: None,
        }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into().to_uppercase();
        self
    }

    pub fn with_failure_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}

/// A synthetic transaction id for charge attempts that never received one from the gateway. The
/// transaction id column is unique, so the random component is a full 64 bits; a collision within the
/// same millisecond would otherwise lose the mandatory audit record.
pub fn synthetic_transaction_id() -> String {
    let mut rng = rand::thread_rng();
    format!("FAIL-{}-{:016x}", Utc::now().timestamp_millis(), rng.gen::<u64>())
}
