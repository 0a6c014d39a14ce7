//! Database models for automation workflows, rules and their execution log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::{RuleId, WorkflowId};

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Workflow {
    #[schema(value_type = String, format = "uuid")]
    pub id: WorkflowId,
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: String,
    pub trigger_config: serde_json::Value,
    pub actions: serde_json::Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WorkflowCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: String,
    pub trigger_config: serde_json::Value,
    pub actions: serde_json::Value,
    pub active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub trigger_config: Option<serde_json::Value>,
    pub actions: Option<serde_json::Value>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Rule {
    #[schema(value_type = String, format = "uuid")]
    pub id: RuleId,
    pub name: String,
    pub description: Option<String>,
    pub conditions: serde_json::Value,
    pub actions: serde_json::Value,
    pub priority: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RuleCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
    pub conditions: serde_json::Value,
    pub actions: serde_json::Value,
    pub priority: i32,
    pub active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RuleUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub conditions: Option<serde_json::Value>,
    pub actions: Option<serde_json::Value>,
    pub priority: Option<i32>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Execution {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub workflow_id: Option<WorkflowId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub rule_id: Option<RuleId>,
    pub status: String,
    pub result: serde_json::Value,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ExecutionCreateDBRequest {
    pub workflow_id: Option<WorkflowId>,
    pub rule_id: Option<RuleId>,
    pub success: bool,
    pub result: serde_json::Value,
    pub duration_ms: i64,
}
