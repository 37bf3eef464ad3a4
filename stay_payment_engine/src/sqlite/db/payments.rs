use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewPayment, Payment, PaymentStatus},
    spe_api::payment_objects::{PaymentSearchFilter, SearchPage},
    traits::PaymentGatewayError,
};

pub async fn insert_payment(payment: &NewPayment, conn: &mut SqliteConnection) -> Result<Payment, PaymentGatewayError> {
    let result = sqlx::query_as::<_, Payment>(
        r#"
            INSERT INTO payments (
                user_id,
                amount,
                currency,
                payment_method,
                card_brand,
                card_last4,
                card_holder_name,
                status,
                transaction_id,
                failure_reason,
                email,
                description
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(&payment.user_id)
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(payment.payment_method)
    .bind(&payment.card_brand)
    .bind(&payment.card_last4)
    .bind(&payment.card_holder_name)
    .bind(payment.status)
    .bind(&payment.transaction_id)
    .bind(&payment.failure_reason)
    .bind(&payment.email)
    .bind(&payment.description)
    .fetch_one(conn)
    .await;
    match result {
        Ok(payment) => {
            debug!("📝️ Payment [{}] inserted with id {}", payment.transaction_id, payment.id);
            Ok(payment)
        },
        Err(sqlx::Error::Database(de)) if de.is_unique_violation() => {
            Err(PaymentGatewayError::DuplicateTransactionId(payment.transaction_id.clone()))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_payment_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_by_transaction_id(
    txid: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE transaction_id = $1").bind(txid).fetch_optional(conn).await?;
    Ok(payment)
}

/// Compare-and-set payment status transition, optionally recording the gateway's refund reference.
pub async fn update_payment_status(
    id: i64,
    from: PaymentStatus,
    to: PaymentStatus,
    refund_id: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Payment, PaymentGatewayError> {
    let updated: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments
            SET status = $1, refund_id = COALESCE($2, refund_id)
            WHERE id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(to)
    .bind(refund_id)
    .bind(id)
    .bind(from)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(payment) => {
            debug!("📝️ Payment [{}] status set to {}", payment.transaction_id, payment.status);
            Ok(payment)
        },
        None => match fetch_payment_by_id(id, conn).await? {
            Some(_) => Err(PaymentGatewayError::StalePreconditions),
            None => Err(PaymentGatewayError::PaymentNotFound(id)),
        },
    }
}

/// Fetches one page of payments matching the filter, newest first, along with the total number of
/// matching rows.
pub async fn search_payments(
    filter: PaymentSearchFilter,
    page: SearchPage,
    conn: &mut SqliteConnection,
) -> Result<(Vec<Payment>, i64), sqlx::Error> {
    let total: i64 = {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM payments ");
        push_filter(&mut builder, &filter);
        builder.build_query_scalar().fetch_one(&mut *conn).await?
    };
    let mut builder = QueryBuilder::new("SELECT * FROM payments ");
    push_filter(&mut builder, &filter);
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(page.limit);
    builder.push(" OFFSET ");
    builder.push_bind(page.offset());
    trace!("📝️ Executing query: {}", builder.sql());
    let payments = builder.build_query_as::<Payment>().fetch_all(conn).await?;
    Ok((payments, total))
}

fn push_filter(builder: &mut QueryBuilder<'_, sqlx::Sqlite>, filter: &PaymentSearchFilter) {
    let is_empty = filter.user_id.is_none() &&
        filter.status.is_none() &&
        filter.method.is_none() &&
        filter.from.is_none() &&
        filter.until.is_none();
    if is_empty {
        return;
    }
    builder.push("WHERE ");
    let mut where_clause = builder.separated(" AND ");
    if let Some(user_id) = &filter.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id.clone());
    }
    if let Some(status) = filter.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status);
    }
    if let Some(method) = filter.method {
        where_clause.push("payment_method = ");
        where_clause.push_bind_unseparated(method);
    }
    if let Some(from) = filter.from {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(from);
    }
    if let Some(until) = filter.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
}
