//! In-app notification messages raised by the order lifecycle.
//!
//! The builders here only shape [`NotificationCreateDBRequest`]s; callers insert them with
//! [`notify`] on whatever connection or transaction they already hold.

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgConnection;

use crate::db::{
    errors::Result,
    handlers::Notifications,
    models::{
        notifications::{Notification, NotificationCreateDBRequest, NotificationType},
        orders::{Order, OrderStatus},
    },
};
use crate::types::OrderId;

/// Broadcast raised when a customer places an order.
pub fn new_order(order: &Order) -> NotificationCreateDBRequest {
    NotificationCreateDBRequest {
        user_id: None,
        notification_type: NotificationType::OrderStatus,
        title: "Novo Pedido".to_string(),
        content: format!("Novo pedido criado no valor de R$ {:.2}", order.total_amount),
        data: json!({ "order_id": order.id, "amount": order.total_amount }),
    }
}

/// Outcome of a gateway payment update, addressed to the order's customer.
pub fn payment_outcome(order: &Order, amount: Decimal) -> NotificationCreateDBRequest {
    let (title, content) = if order.status == OrderStatus::Paid {
        ("Pagamento Confirmado", format!("Seu pagamento de R$ {amount:.2} foi confirmado"))
    } else {
        ("Pagamento Expirado", "Seu pagamento expirou".to_string())
    };

    NotificationCreateDBRequest {
        user_id: Some(order.customer_id),
        notification_type: NotificationType::Payment,
        title: title.to_string(),
        content,
        data: json!({ "order_id": order.id, "amount": amount, "status": order.status }),
    }
}

/// Broadcast raised when a payment is simulated from the checkout.
pub fn payment_simulated(order: &Order) -> NotificationCreateDBRequest {
    NotificationCreateDBRequest {
        user_id: None,
        notification_type: NotificationType::Payment,
        title: "Pagamento Confirmado".to_string(),
        content: format!("Pagamento do pedido {} foi confirmado", order.id),
        data: json!({ "order_id": order.id, "amount": order.total_amount, "status": order.status }),
    }
}

pub fn status_changed(order_id: OrderId, old: OrderStatus, new: OrderStatus) -> NotificationCreateDBRequest {
    NotificationCreateDBRequest {
        user_id: None,
        notification_type: NotificationType::OrderStatus,
        title: "Status do Pedido Atualizado".to_string(),
        content: format!("O pedido {order_id} mudou de {old} para {new}"),
        data: json!({ "order_id": order_id, "old_status": old, "new_status": new }),
    }
}

pub async fn notify(conn: &mut PgConnection, request: &NotificationCreateDBRequest) -> Result<Notification> {
    Notifications::new(conn).create(request).await
}
