use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spg_common::UsdAmount;

use crate::{
    db_types::{Payment, PaymentMethod, PaymentStatus},
    helpers::CardDetails,
};

/// Everything the processor needs to run one charge attempt.
///
/// The funding source is either raw card details or the id of a payment method stored with the
/// processor; at least one must be present.
#[derive(Debug, Clone)]
pub struct ChargeInstruction {
    pub user_id: String,
    pub amount: UsdAmount,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub card: Option<CardDetails>,
    pub payment_method_id: Option<String>,
    pub email: String,
    pub description: Option<String>,
}

/// Result of the pre-flight balance check. No charge has been attempted when this is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub has_sufficient_funds: bool,
    pub currency: String,
}

/// A charge attempt that did not end in an error. `RequiresAction` is not settled yet; the customer
/// completes the step-up out of band using the client secret.
#[derive(Debug, Clone)]
pub enum PaymentResult {
    Completed { payment: Payment },
    RequiresAction { payment: Payment, client_secret: String },
}

impl PaymentResult {
    pub fn payment(&self) -> &Payment {
        match self {
            PaymentResult::Completed { payment } => payment,
            PaymentResult::RequiresAction { payment, .. } => payment,
        }
    }
}

//--------------------------------------   History queries     -------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentSearchFilter {
    /// Restrict to one user's payments. Admin searches leave this unset.
    pub user_id: Option<String>,
    pub status: Option<PaymentStatus>,
    pub method: Option<PaymentMethod>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl PaymentSearchFilter {
    pub fn for_user<S: Into<String>>(user_id: S) -> Self {
        Self { user_id: Some(user_id.into()), ..Default::default() }
    }
}

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// One page of a search, 1-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchPage {
    pub page: i64,
    pub limit: i64,
}

impl Default for SearchPage {
    fn default() -> Self {
        Self { page: 1, limit: DEFAULT_PAGE_SIZE }
    }
}

impl SearchPage {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total == 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        }
    }
}
