use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatusType},
    traits::PaymentGatewayError,
};

/// Inserts a new order into the database using the given connection. This is not atomic. You can
/// embed this call inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the
/// connection argument.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentGatewayError> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_email,
                total_amount,
                payment_method,
                status
            ) VALUES ($1, $2, $3, $4, 'pending')
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.customer_email)
    .bind(order.total_amount)
    .bind(order.payment_method)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order [{}] inserted with id {}", order.order_id, order.id);
    Ok(order)
}

/// Inserts one line item against the order's rowid. The subtotal is computed here so that the stored
/// value can never drift from `price * quantity`.
pub async fn insert_order_item(
    order_rowid: i64,
    product_id: &str,
    name: &str,
    quantity: i64,
    price: i64,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, PaymentGatewayError> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, product_id, name, quantity, price, subtotal)
            VALUES ($1, $2, $3, $4, $5, $4 * $5)
            RETURNING *;
        "#,
    )
    .bind(order_rowid)
    .bind(product_id)
    .bind(name)
    .bind(quantity)
    .bind(price)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_payment_id(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE payment_id = $1").bind(payment_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_rowid: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_rowid)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// All orders placed by a customer, newest first.
pub async fn fetch_orders_for_customer(email: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE customer_email = $1 ORDER BY created_at DESC")
        .bind(email)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Compare-and-set status transition. Returns `StalePreconditions` when the order has left the `from`
/// state, so racing writers cannot both apply the same transition.
pub async fn update_order_status(
    order_id: &OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let updated: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders
            SET status = $1, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND status = $3
            RETURNING *;
        "#,
    )
    .bind(to)
    .bind(order_id.as_str())
    .bind(from)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(order) => {
            debug!("📝️ Order [{}] status set to {}", order.order_id, order.status);
            Ok(order)
        },
        None => match fetch_order_by_order_id(order_id, conn).await? {
            Some(_) => Err(PaymentGatewayError::StalePreconditions),
            None => Err(PaymentGatewayError::OrderNotFound(order_id.clone())),
        },
    }
}

/// Attaches a payment reference and resolves the order's status in a single guarded statement. The
/// guard excludes completed and refunded orders, so a settled order can never be overwritten by a
/// late-arriving payment outcome.
pub async fn attach_payment_to_order(
    order_id: &OrderId,
    payment_id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let updated: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders
            SET status = $1, payment_id = $2, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $3 AND status NOT IN ('completed', 'refunded')
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(payment_id)
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(order) => {
            debug!("📝️ Order [{}] resolved to {} by payment {payment_id}", order.order_id, order.status);
            Ok(order)
        },
        None => match fetch_order_by_order_id(order_id, conn).await? {
            Some(_) => Err(PaymentGatewayError::StalePreconditions),
            None => Err(PaymentGatewayError::OrderNotFound(order_id.clone())),
        },
    }
}
