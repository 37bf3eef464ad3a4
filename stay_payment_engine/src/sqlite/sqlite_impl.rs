//! `SqliteDatabase` is a concrete implementation of a Stay Payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the [`PaymentGatewayDatabase`] trait.
use std::fmt::Debug;

use sqlx::SqlitePool;

use super::db::{db_url, new_pool, orders, payments};
use crate::{
    db_types::{NewOrder, NewPayment, Order, OrderId, OrderItem, OrderStatusType, Payment, PaymentStatus},
    spe_api::payment_objects::{PaymentSearchFilter, SearchPage},
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new connection pool using the `SPG_DATABASE_URL` environment variable, or the
    /// default url.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let stored = orders::insert_order(&order, &mut tx).await?;
        for item in &order.items {
            orders::insert_order_item(
                stored.id,
                &item.product_id,
                &item.name,
                item.quantity(),
                item.price.value(),
                &mut tx,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(stored)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_order_id(order_id, &mut conn).await?)
    }

    async fn fetch_order_items(&self, order: &Order) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_items(order.id, &mut conn).await?)
    }

    async fn fetch_orders_for_customer(&self, email: &str) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_customer(email, &mut conn).await?)
    }

    async fn fetch_order_by_payment_id(&self, payment_id: i64) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_payment_id(payment_id, &mut conn).await?)
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
    ) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::update_order_status(order_id, from, to, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn attach_payment_to_order(
        &self,
        order_id: &OrderId,
        payment_id: i64,
        status: OrderStatusType,
    ) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::attach_payment_to_order(order_id, payment_id, status, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let stored = payments::insert_payment(&payment, &mut tx).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn fetch_payment_by_id(&self, id: i64) -> Result<Option<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_by_id(id, &mut conn).await?)
    }

    async fn fetch_payment_by_transaction_id(&self, txid: &str) -> Result<Option<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_by_transaction_id(txid, &mut conn).await?)
    }

    async fn update_payment_status(
        &self,
        id: i64,
        from: PaymentStatus,
        to: PaymentStatus,
        refund_id: Option<String>,
    ) -> Result<Payment, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::update_payment_status(id, from, to, refund_id, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn search_payments(
        &self,
        filter: PaymentSearchFilter,
        page: SearchPage,
    ) -> Result<(Vec<Payment>, i64), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::search_payments(filter, page, &mut conn).await?)
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}
