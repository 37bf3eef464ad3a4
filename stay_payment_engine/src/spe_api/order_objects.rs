use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem, Payment};

/// An order together with its line items, as returned by the read paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Outcome of the order-integrated payment flow for charges that did not error.
#[derive(Debug, Clone)]
pub enum OrderPaymentResult {
    /// The charge settled and the order is completed.
    Settled { order: Order, payment: Payment },
    /// The charge is awaiting customer authentication. The order stays pending until the step-up
    /// resolves.
    RequiresAction { order: Order, payment: Payment, client_secret: String },
}
