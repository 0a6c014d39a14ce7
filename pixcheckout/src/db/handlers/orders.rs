//! Database repository for orders and the `order_updates` status history.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

use crate::db::{
    errors::{DbError, Result},
    models::orders::{Order, OrderCreateDBRequest, OrderDetails, OrderFilter, OrderPaymentUpdate, OrderStatus, OrderUpdateRecord},
};
use crate::types::{OrderId, abbrev_uuid};

const DETAILS_SELECT: &str = r#"
    SELECT o.*,
           c.name AS customer_name,
           c.email AS customer_email,
           c.phone AS customer_phone,
           p.name AS product_name
    FROM orders o
    JOIN customers c ON c.id = o.customer_id
    JOIN products p ON p.id = o.product_id
"#;

const FILTER_CLAUSE: &str = r#"
    WHERE ($1::order_status IS NULL OR o.status = $1)
      AND ($2::uuid IS NULL OR o.customer_id = $2)
      AND ($3::uuid IS NULL OR o.product_id = $3)
      AND ($4::timestamptz IS NULL OR o.created_at >= $4)
      AND ($5::timestamptz IS NULL OR o.created_at < $5)
      AND ($6::text IS NULL OR c.name ILIKE '%' || $6 || '%' OR c.email ILIKE '%' || $6 || '%')
"#;

pub struct Orders<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Orders<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(order_id = %abbrev_uuid(&request.id)), err)]
    pub async fn create(&mut self, request: &OrderCreateDBRequest) -> Result<Order> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (id, customer_id, product_id, total_amount, discount_amount, coupon_id, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(request.customer_id)
        .bind(request.product_id)
        .bind(request.total_amount)
        .bind(request.discount_amount)
        .bind(request.coupon_id)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(order)
    }

    /// Store the Pix QR code and copy-and-paste code returned by the gateway.
    #[instrument(skip(self, qr_code, payment_code), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn set_payment_details(&mut self, id: OrderId, qr_code: &str, payment_code: &str) -> Result<Order> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET payment_qr_code = $2, payment_code = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(qr_code)
        .bind(payment_code)
        .fetch_optional(&mut *self.db)
        .await?;

        order.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: OrderId) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(order)
    }

    /// Lock the order row for the rest of the transaction.
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn get_details(&mut self, id: OrderId) -> Result<Option<OrderDetails>> {
        let query = format!("{DETAILS_SELECT} WHERE o.id = $1");
        let details = sqlx::query_as::<_, OrderDetails>(&query)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(details)
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &OrderFilter) -> Result<Vec<OrderDetails>> {
        let query = format!("{DETAILS_SELECT} {FILTER_CLAUSE} ORDER BY o.created_at DESC OFFSET $7 LIMIT $8");
        let orders = sqlx::query_as::<_, OrderDetails>(&query)
            .bind(filter.status)
            .bind(filter.customer_id)
            .bind(filter.product_id)
            .bind(filter.created_after)
            .bind(filter.created_before)
            .bind(filter.search.as_deref())
            .bind(filter.skip)
            .bind(filter.limit)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(orders)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &OrderFilter) -> Result<i64> {
        let query = format!(
            "SELECT COUNT(*) FROM orders o JOIN customers c ON c.id = o.customer_id {FILTER_CLAUSE}"
        );
        let count = sqlx::query_scalar::<_, i64>(&query)
            .bind(filter.status)
            .bind(filter.customer_id)
            .bind(filter.product_id)
            .bind(filter.created_after)
            .bind(filter.created_before)
            .bind(filter.search.as_deref())
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Apply a gateway payment outcome. Orders that are already paid are left untouched and
    /// `None` is returned. A paid outcome without a timestamp is stamped with the current time.
    #[instrument(skip(self, update), fields(order_id = %abbrev_uuid(&id), status = %update.status), err)]
    pub async fn apply_payment_update(&mut self, id: OrderId, update: &OrderPaymentUpdate) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET
                status = $2,
                paid_at = COALESCE($3, paid_at, CASE WHEN $2 = 'paid'::order_status THEN NOW() END),
                transaction_id = $4,
                payment_method = COALESCE($5, payment_method),
                updated_at = NOW()
            WHERE id = $1 AND status <> 'paid'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(update.paid_at)
        .bind(&update.transaction_id)
        .bind(&update.payment_method)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id), status = %status), err)]
    pub async fn update_status(&mut self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&mut *self.db)
        .await?;

        order.ok_or(DbError::NotFound)
    }

    /// Expire every pending order whose deadline has passed, writing one `order_updates`
    /// row per expired order. Returns the expired orders.
    #[instrument(skip(self), err)]
    pub async fn expire_overdue(&mut self) -> Result<Vec<Order>> {
        let expired = sqlx::query_as::<_, Order>(
            r#"
            WITH expired AS (
                UPDATE orders
                SET status = 'expired', updated_at = NOW()
                WHERE status = 'pending' AND expires_at < NOW()
                RETURNING *
            ), history AS (
                INSERT INTO order_updates (order_id, status)
                SELECT id, status FROM expired
            )
            SELECT * FROM expired
            "#,
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(expired)
    }

    /// Unpaid orders placed with this customer email since `since`. Feeds the fraud check.
    #[instrument(skip(self, email), err)]
    pub async fn count_unpaid_by_email_since(&mut self, email: &str, since: DateTime<Utc>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM orders o
            JOIN customers c ON c.id = o.customer_id
            WHERE LOWER(c.email) = LOWER($1) AND o.status <> 'paid' AND o.created_at >= $2
            "#,
        )
        .bind(email)
        .bind(since)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&order_id), status = %status), err)]
    pub async fn record_update(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        sqlx::query("INSERT INTO order_updates (order_id, status) VALUES ($1, $2)")
            .bind(order_id)
            .bind(status)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&order_id)), err)]
    pub async fn list_updates(&mut self, order_id: OrderId) -> Result<Vec<OrderUpdateRecord>> {
        let updates = sqlx::query_as::<_, OrderUpdateRecord>(
            "SELECT * FROM order_updates WHERE order_id = $1 ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_customer, create_test_product};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn order_request(customer_id: Uuid, product_id: Uuid, expires_in: Duration) -> OrderCreateDBRequest {
        OrderCreateDBRequest {
            id: Uuid::new_v4(),
            customer_id,
            product_id,
            total_amount: Decimal::new(5000, 2),
            discount_amount: Decimal::ZERO,
            coupon_id: None,
            expires_at: Utc::now() + expires_in,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_expire_overdue_only_touches_pending_past_deadline(pool: PgPool) {
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(5000, 2)).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Orders::new(&mut conn);

        let overdue = repo.create(&order_request(customer.id, product.id, Duration::minutes(-1))).await.unwrap();
        let fresh = repo.create(&order_request(customer.id, product.id, Duration::minutes(30))).await.unwrap();
        let paid = repo.create(&order_request(customer.id, product.id, Duration::minutes(-1))).await.unwrap();
        repo.update_status(paid.id, OrderStatus::Paid).await.unwrap();

        let expired = repo.expire_overdue().await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, overdue.id);
        assert_eq!(expired[0].status, OrderStatus::Expired);

        let history = repo.list_updates(overdue.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, OrderStatus::Expired);

        assert_eq!(repo.get_by_id(fresh.id).await.unwrap().unwrap().status, OrderStatus::Pending);
        assert_eq!(repo.get_by_id(paid.id).await.unwrap().unwrap().status, OrderStatus::Paid);

        // Nothing left to expire on a second pass.
        assert!(repo.expire_overdue().await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_payment_update_does_not_downgrade_paid_orders(pool: PgPool) {
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(5000, 2)).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Orders::new(&mut conn);

        let order = repo.create(&order_request(customer.id, product.id, Duration::minutes(30))).await.unwrap();

        let paid = repo
            .apply_payment_update(
                order.id,
                &OrderPaymentUpdate {
                    status: OrderStatus::Paid,
                    paid_at: Some(Utc::now()),
                    transaction_id: "tx_1".to_string(),
                    payment_method: Some("pix".to_string()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        assert_eq!(paid.transaction_id.as_deref(), Some("tx_1"));

        let replay = repo
            .apply_payment_update(
                order.id,
                &OrderPaymentUpdate {
                    status: OrderStatus::Expired,
                    paid_at: None,
                    transaction_id: "tx_2".to_string(),
                    payment_method: None,
                },
            )
            .await
            .unwrap();
        assert!(replay.is_none());
        assert_eq!(repo.get_by_id(order.id).await.unwrap().unwrap().status, OrderStatus::Paid);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_paid_update_without_timestamp_is_stamped(pool: PgPool) {
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(5000, 2)).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Orders::new(&mut conn);

        let failed = repo.create(&order_request(customer.id, product.id, Duration::minutes(30))).await.unwrap();
        let failed = repo
            .apply_payment_update(
                failed.id,
                &OrderPaymentUpdate {
                    status: OrderStatus::Failed,
                    paid_at: None,
                    transaction_id: "tx_failed".to_string(),
                    payment_method: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(failed.paid_at.is_none());

        let before = Utc::now() - Duration::seconds(5);
        let order = repo.create(&order_request(customer.id, product.id, Duration::minutes(30))).await.unwrap();
        let paid = repo
            .apply_payment_update(
                order.id,
                &OrderPaymentUpdate {
                    status: OrderStatus::Paid,
                    paid_at: None,
                    transaction_id: "tx_paid".to_string(),
                    payment_method: Some("pix".to_string()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        let paid_at = paid.paid_at.expect("paid orders carry a payment time");
        assert!(paid_at >= before);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_and_details(pool: PgPool) {
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(5000, 2)).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Orders::new(&mut conn);

        let first = repo.create(&order_request(customer.id, product.id, Duration::minutes(30))).await.unwrap();
        let second = repo.create(&order_request(customer.id, product.id, Duration::minutes(30))).await.unwrap();
        repo.update_status(second.id, OrderStatus::Cancelled).await.unwrap();

        let all = OrderFilter {
            limit: 10,
            ..Default::default()
        };
        assert_eq!(repo.count(&all).await.unwrap(), 2);

        let pending = OrderFilter {
            limit: 10,
            status: Some(OrderStatus::Pending),
            ..Default::default()
        };
        let listed = repo.list(&pending).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].order.id, first.id);
        assert_eq!(listed[0].customer_email, customer.email);
        assert_eq!(listed[0].product_name, product.name);

        let search = OrderFilter {
            limit: 10,
            search: Some("nobody".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.count(&search).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_count_unpaid_by_email_since(pool: PgPool) {
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(5000, 2)).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Orders::new(&mut conn);

        let since = Utc::now() - Duration::hours(1);
        assert_eq!(repo.count_unpaid_by_email_since(&customer.email, since).await.unwrap(), 0);

        repo.create(&order_request(customer.id, product.id, Duration::minutes(30))).await.unwrap();
        let paid = repo.create(&order_request(customer.id, product.id, Duration::minutes(30))).await.unwrap();
        repo.update_status(paid.id, OrderStatus::Paid).await.unwrap();

        let upper = customer.email.to_uppercase();
        assert_eq!(repo.count_unpaid_by_email_since(&upper, since).await.unwrap(), 1);
        assert_eq!(repo.count_unpaid_by_email_since(&customer.email, Utc::now() + Duration::minutes(1)).await.unwrap(), 0);
    }
}
