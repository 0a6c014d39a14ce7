//! Audit trail for admin and gateway mutations.

use serde::Serialize;
use sqlx::PgConnection;
use tracing::instrument;

use crate::db::{
    errors::Result,
    handlers::AuditLogs,
    models::{
        audit_logs::{AuditAction, AuditLog, AuditLogCreateDBRequest},
        orders::Order,
    },
};
use crate::notifications;
use crate::types::UserId;

fn snapshot<T: Serialize>(value: Option<&T>) -> Option<serde_json::Value> {
    value.and_then(|v| serde_json::to_value(v).ok())
}

/// Record one audited change. `old` and `new` are serialized as the row images.
#[instrument(skip(conn, old, new), err)]
pub async fn record<T: Serialize>(
    conn: &mut PgConnection,
    table: &str,
    record_id: &str,
    action: AuditAction,
    old: Option<&T>,
    new: Option<&T>,
    user_id: Option<UserId>,
) -> Result<AuditLog> {
    AuditLogs::new(conn)
        .create(&AuditLogCreateDBRequest {
            table_name: table.to_string(),
            record_id: record_id.to_string(),
            action,
            old_data: snapshot(old),
            new_data: snapshot(new),
            user_id,
        })
        .await
}

/// Audit an order update and raise a status-change notification when the status moved.
pub async fn record_order_update(conn: &mut PgConnection, old: &Order, new: &Order, user_id: Option<UserId>) -> Result<()> {
    record(&mut *conn, "orders", &new.id.to_string(), AuditAction::Update, Some(old), Some(new), user_id).await?;

    if old.status != new.status {
        notifications::notify(conn, &notifications::status_changed(new.id, old.status, new.status)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Notifications, Orders};
    use crate::db::handlers::notifications::NotificationFilter;
    use crate::db::models::audit_logs::AuditLogFilter;
    use crate::db::models::orders::OrderStatus;
    use crate::test_utils::{create_test_customer, create_test_order, create_test_product};
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_order_status_change_is_audited_and_notified(pool: PgPool) {
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(5000, 2)).await;
        let order = create_test_order(&pool, customer.id, product.id, OrderStatus::Pending).await;

        let mut conn = pool.acquire().await.unwrap();
        let updated = Orders::new(&mut conn).update_status(order.id, OrderStatus::Cancelled).await.unwrap();
        record_order_update(&mut conn, &order, &updated, None).await.unwrap();

        let logs = AuditLogs::new(&mut conn)
            .list(&AuditLogFilter {
                limit: 10,
                table_name: Some("orders".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "UPDATE");
        assert_eq!(logs[0].old_data.as_ref().unwrap()["status"], "pending");
        assert_eq!(logs[0].new_data.as_ref().unwrap()["status"], "cancelled");

        let notifications = Notifications::new(&mut conn)
            .list(&NotificationFilter {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Status do Pedido Atualizado");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unchanged_status_does_not_notify(pool: PgPool) {
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::TEN).await;
        let order = create_test_order(&pool, customer.id, product.id, OrderStatus::Pending).await;

        let mut conn = pool.acquire().await.unwrap();
        record_order_update(&mut conn, &order, &order, None).await.unwrap();

        let count = Notifications::new(&mut conn)
            .count(&NotificationFilter::default())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
