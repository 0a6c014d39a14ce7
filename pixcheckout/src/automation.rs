//! Workflow and rule execution.
//!
//! Workflows fire on a named trigger (`order_paid` is raised by the payment webhook) or on
//! demand; rules fire when every condition holds against a JSON context. Both run a list of
//! tagged [`Action`]s and write one `automation_executions` row per run.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    AppState, checkout,
    db::{
        handlers::{Executions, Rules, Workflows, repository::Repository},
        models::{
            automation::{Execution, ExecutionCreateDBRequest},
            notifications::{NotificationCreateDBRequest, NotificationType},
            orders::OrderStatus,
        },
    },
    email::EmailTemplate,
    errors::{Error, Result},
    notifications, settings,
    types::{RuleId, WorkflowId},
    whatsapp::render_template,
};

pub const ORDER_PAID_TRIGGER: &str = "order_paid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Condition {
    /// Dotted path into the context, e.g. `order.amount`
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Notify {
        title: String,
        content: String,
    },
    SendEmail {
        to: String,
        template: EmailTemplate,
        #[serde(default)]
        data: Value,
    },
    SendWhatsapp {
        to: String,
        template: String,
        #[serde(default)]
        data: Value,
    },
    /// Moves the order named by `order_id` in the context
    UpdateOrderStatus {
        status: OrderStatus,
    },
}

/// Resolve a dotted path such as `customer.email` inside a JSON value.
pub fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(context, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Numbers, and strings holding numbers (decimal amounts serialize as strings).
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    a == b || matches!((as_number(a), as_number(b)), (Some(x), Some(y)) if x == y)
}

pub fn evaluate_condition(condition: &Condition, context: &Value) -> bool {
    let Some(actual) = lookup(context, &condition.field) else {
        return condition.operator == ConditionOperator::Neq;
    };
    let expected = &condition.value;

    let compare = |f: fn(f64, f64) -> bool| match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    };

    match condition.operator {
        ConditionOperator::Eq => loosely_equal(actual, expected),
        ConditionOperator::Neq => !loosely_equal(actual, expected),
        ConditionOperator::Gt => compare(|a, b| a > b),
        ConditionOperator::Gte => compare(|a, b| a >= b),
        ConditionOperator::Lt => compare(|a, b| a < b),
        ConditionOperator::Lte => compare(|a, b| a <= b),
        ConditionOperator::Contains => match (actual, expected) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|item| loosely_equal(item, needle)),
            _ => false,
        },
        ConditionOperator::In => match expected {
            Value::Array(options) => options.iter().any(|option| loosely_equal(actual, option)),
            _ => false,
        },
    }
}

/// All conditions must hold; an empty list always holds.
pub fn conditions_hold(conditions: &[Condition], context: &Value) -> bool {
    conditions.iter().all(|c| evaluate_condition(c, context))
}

fn parse<T: serde::de::DeserializeOwned>(value: &Value, what: &str) -> Result<Vec<T>> {
    serde_json::from_value(value.clone()).map_err(|e| Error::BadRequest {
        message: format!("Invalid {what}: {e}"),
    })
}

pub fn parse_actions(value: &Value) -> Result<Vec<Action>> {
    parse(value, "actions")
}

pub fn parse_conditions(value: &Value) -> Result<Vec<Condition>> {
    parse(value, "conditions")
}

fn fill(text: &str, context: &Value) -> String {
    render_template(text, context)
}

async fn execute_action(state: &AppState, action: &Action, context: &Value) -> Result<Value> {
    match action {
        Action::Notify { title, content } => {
            let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            let notification = notifications::notify(
                &mut conn,
                &NotificationCreateDBRequest {
                    user_id: None,
                    notification_type: NotificationType::Automation,
                    title: fill(title, context),
                    content: fill(content, context),
                    data: context.clone(),
                },
            )
            .await?;
            Ok(json!({ "notification_id": notification.id }))
        }
        Action::SendEmail { to, template, data } => {
            let log = state.email.send(&state.db, &fill(to, context), &[], *template, data).await?;
            Ok(json!({ "email_log_id": log.id }))
        }
        Action::SendWhatsapp { to, template, data } => {
            let app_settings = {
                let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
                settings::load(&mut conn, &state.cipher).await?
            };
            let log = state
                .whatsapp
                .send(&state.db, &app_settings.whatsapp_settings, &fill(to, context), template, data)
                .await?;
            Ok(json!({ "whatsapp_log_id": log.id }))
        }
        Action::UpdateOrderStatus { status } => {
            let order_id = lookup(context, "order_id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| Error::BadRequest {
                    message: "Context has no order_id".to_string(),
                })?;

            let updated = checkout::change_order_status(state, order_id, *status, None).await?;
            Ok(json!({ "order_id": order_id, "status": updated.status }))
        }
    }
}

/// Run every action, recording each outcome. Returns whether all succeeded.
async fn run_actions(state: &AppState, actions: &[Action], context: &Value) -> (bool, Value) {
    let mut results = Vec::with_capacity(actions.len());
    let mut all_ok = true;

    for action in actions {
        match execute_action(state, action, context).await {
            Ok(output) => results.push(json!({ "success": true, "output": output })),
            Err(e) => {
                all_ok = false;
                tracing::warn!(error = %e, "Automation action failed");
                results.push(json!({ "success": false, "error": e.to_string() }));
            }
        }
    }

    (all_ok, Value::Array(results))
}

async fn log_execution(
    state: &AppState,
    workflow_id: Option<WorkflowId>,
    rule_id: Option<RuleId>,
    success: bool,
    result: Value,
    started: Instant,
) -> Result<Execution> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let execution = Executions::new(&mut conn)
        .create(&ExecutionCreateDBRequest {
            workflow_id,
            rule_id,
            success,
            result,
            duration_ms: started.elapsed().as_millis() as i64,
        })
        .await?;
    Ok(execution)
}

/// Run a workflow's actions against `context`, whether or not it is active.
#[instrument(skip(state, context), err)]
pub async fn execute_workflow(state: &AppState, id: WorkflowId, context: &Value) -> Result<Execution> {
    let started = Instant::now();
    let workflow = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Workflows::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
            resource: "Workflow".to_string(),
            id: id.to_string(),
        })?
    };

    let (success, result) = match parse_actions(&workflow.actions) {
        Ok(actions) => run_actions(state, &actions, context).await,
        Err(e) => (false, json!([{ "success": false, "error": e.to_string() }])),
    };

    log_execution(state, Some(workflow.id), None, success, result, started).await
}

/// Evaluate active rules by descending priority, running the actions of each rule whose
/// conditions hold. Returns one execution per rule that fired.
#[instrument(skip_all, err)]
pub async fn evaluate_rules(state: &AppState, context: &Value) -> Result<Vec<Execution>> {
    let rules = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Rules::new(&mut conn).active_by_priority().await?
    };

    let mut executions = Vec::new();
    for rule in rules {
        let started = Instant::now();
        let conditions = match parse_conditions(&rule.conditions) {
            Ok(conditions) => conditions,
            Err(e) => {
                tracing::warn!(rule_id = %rule.id, error = %e, "Skipping rule with invalid conditions");
                continue;
            }
        };
        if !conditions_hold(&conditions, context) {
            continue;
        }

        let (success, result) = match parse_actions(&rule.actions) {
            Ok(actions) => run_actions(state, &actions, context).await,
            Err(e) => (false, json!([{ "success": false, "error": e.to_string() }])),
        };
        executions.push(log_execution(state, None, Some(rule.id), success, result, started).await?);
    }

    Ok(executions)
}

/// Run every active workflow registered for `trigger`.
#[instrument(skip(state, context), err)]
pub async fn run_trigger(state: &AppState, trigger: &str, context: &Value) -> Result<Vec<Execution>> {
    let workflows = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Workflows::new(&mut conn).active_for_trigger(trigger).await?
    };

    let mut executions = Vec::with_capacity(workflows.len());
    for workflow in workflows {
        executions.push(execute_workflow(state, workflow.id, context).await?);
    }
    Ok(executions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Notifications, Orders};
    use crate::db::handlers::notifications::NotificationFilter;
    use crate::db::models::automation::{RuleCreateDBRequest, WorkflowCreateDBRequest};
    use crate::test_utils::{create_test_customer, create_test_order, create_test_product, create_test_state};
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    fn cond(field: &str, operator: ConditionOperator, value: Value) -> Condition {
        Condition {
            field: field.to_string(),
            operator,
            value,
        }
    }

    #[test]
    fn test_lookup_dotted_paths() {
        let ctx = json!({"order": {"items": [{"sku": "A1"}], "amount": "97.00"}});
        assert_eq!(lookup(&ctx, "order.amount"), Some(&json!("97.00")));
        assert_eq!(lookup(&ctx, "order.items.0.sku"), Some(&json!("A1")));
        assert_eq!(lookup(&ctx, "order.missing"), None);
    }

    #[test]
    fn test_condition_operators() {
        let ctx = json!({"amount": "150.00", "status": "paid", "tags": ["vip", "br"], "email": "ana@loja.com"});

        assert!(evaluate_condition(&cond("status", ConditionOperator::Eq, json!("paid")), &ctx));
        assert!(evaluate_condition(&cond("amount", ConditionOperator::Eq, json!(150)), &ctx));
        assert!(evaluate_condition(&cond("status", ConditionOperator::Neq, json!("expired")), &ctx));
        assert!(evaluate_condition(&cond("amount", ConditionOperator::Gt, json!(100)), &ctx));
        assert!(evaluate_condition(&cond("amount", ConditionOperator::Gte, json!("150")), &ctx));
        assert!(!evaluate_condition(&cond("amount", ConditionOperator::Lt, json!(150)), &ctx));
        assert!(evaluate_condition(&cond("amount", ConditionOperator::Lte, json!(150.0)), &ctx));
        assert!(evaluate_condition(&cond("email", ConditionOperator::Contains, json!("@loja")), &ctx));
        assert!(evaluate_condition(&cond("tags", ConditionOperator::Contains, json!("vip")), &ctx));
        assert!(evaluate_condition(&cond("status", ConditionOperator::In, json!(["paid", "pending"])), &ctx));
        assert!(!evaluate_condition(&cond("status", ConditionOperator::In, json!("paid")), &ctx));
        assert!(!evaluate_condition(&cond("status", ConditionOperator::Gt, json!(1)), &ctx));
    }

    #[test]
    fn test_missing_field() {
        let ctx = json!({});
        assert!(!evaluate_condition(&cond("x", ConditionOperator::Eq, json!(1)), &ctx));
        assert!(evaluate_condition(&cond("x", ConditionOperator::Neq, json!(1)), &ctx));
        assert!(conditions_hold(&[], &ctx));
    }

    #[test]
    fn test_parse_actions() {
        let actions = parse_actions(&json!([
            {"type": "notify", "title": "Venda", "content": "Pedido {order_id}"},
            {"type": "update_order_status", "status": "cancelled"},
            {"type": "send_email", "to": "{email}", "template": "payment_received"}
        ]))
        .unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[1], Action::UpdateOrderStatus { status: OrderStatus::Cancelled });

        assert!(parse_actions(&json!([{"type": "launch_rocket"}])).is_err());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_order_paid_workflow_notifies(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        {
            let mut conn = pool.acquire().await.unwrap();
            Workflows::new(&mut conn)
                .create(&WorkflowCreateDBRequest {
                    name: "Avisar venda".to_string(),
                    description: None,
                    trigger_type: ORDER_PAID_TRIGGER.to_string(),
                    trigger_config: json!({}),
                    actions: json!([{"type": "notify", "title": "Venda", "content": "Pedido {order_id} pago"}]),
                    active: true,
                })
                .await
                .unwrap();
        }

        let executions = run_trigger(&state, ORDER_PAID_TRIGGER, &json!({"order_id": "abc"}))
            .await
            .unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, "success");

        let mut conn = pool.acquire().await.unwrap();
        let notes = Notifications::new(&mut conn)
            .list(&NotificationFilter {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "Pedido abc pago");
        assert_eq!(notes[0].notification_type, "automation");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_rules_fire_by_condition(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(50000, 2)).await;
        let order = create_test_order(&pool, customer.id, product.id, OrderStatus::Pending).await;

        {
            let mut conn = pool.acquire().await.unwrap();
            let mut rules = Rules::new(&mut conn);
            rules
                .create(&RuleCreateDBRequest {
                    name: "Cancelar pedidos grandes".to_string(),
                    description: None,
                    conditions: json!([{"field": "amount", "operator": "gt", "value": 300}]),
                    actions: json!([{"type": "update_order_status", "status": "cancelled"}]),
                    priority: 10,
                    active: true,
                })
                .await
                .unwrap();
            rules
                .create(&RuleCreateDBRequest {
                    name: "Nunca".to_string(),
                    description: None,
                    conditions: json!([{"field": "amount", "operator": "lt", "value": 1}]),
                    actions: json!([{"type": "notify", "title": "x", "content": "y"}]),
                    priority: 0,
                    active: true,
                })
                .await
                .unwrap();
        }

        let context = json!({"order_id": order.id, "amount": order.total_amount});
        let executions = evaluate_rules(&state, &context).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, "success");

        let mut conn = pool.acquire().await.unwrap();
        let reloaded = Orders::new(&mut conn).get_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, OrderStatus::Cancelled);

        // A second pass cannot cancel again and is logged as failed.
        let executions = evaluate_rules(&state, &context).await.unwrap();
        assert_eq!(executions[0].status, "failed");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_execute_missing_workflow(pool: PgPool) {
        let state = create_test_state(pool).await;
        let err = execute_workflow(&state, Uuid::new_v4(), &json!({})).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
