//! Workflow and rule payloads. Actions and conditions arrive typed and are stored as JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    automation::{Action, Condition},
    db::models::automation::{RuleCreateDBRequest, RuleUpdateDBRequest, WorkflowCreateDBRequest, WorkflowUpdateDBRequest},
    errors::Result,
    types::{RuleId, WorkflowId},
};

fn default_active() -> bool {
    true
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value).map_err(anyhow::Error::from)?)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowCreate {
    pub name: String,
    pub description: Option<String>,
    /// Trigger name, e.g. `order_paid` or `manual`
    pub trigger_type: String,
    #[serde(default)]
    pub trigger_config: Value,
    pub actions: Vec<Action>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl WorkflowCreate {
    pub fn into_db_request(self) -> Result<WorkflowCreateDBRequest> {
        Ok(WorkflowCreateDBRequest {
            actions: to_json(&self.actions)?,
            name: self.name,
            description: self.description,
            trigger_type: self.trigger_type,
            trigger_config: self.trigger_config,
            active: self.active,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WorkflowUpdate {
    pub name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub trigger_config: Option<Value>,
    pub actions: Option<Vec<Action>>,
    pub active: Option<bool>,
}

impl WorkflowUpdate {
    pub fn into_db_request(self) -> Result<WorkflowUpdateDBRequest> {
        Ok(WorkflowUpdateDBRequest {
            actions: self.actions.as_ref().map(to_json).transpose()?,
            name: self.name,
            description: self.description,
            trigger_config: self.trigger_config,
            active: self.active,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RuleCreate {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl RuleCreate {
    pub fn into_db_request(self) -> Result<RuleCreateDBRequest> {
        Ok(RuleCreateDBRequest {
            conditions: to_json(&self.conditions)?,
            actions: to_json(&self.actions)?,
            name: self.name,
            description: self.description,
            priority: self.priority,
            active: self.active,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RuleUpdate {
    pub name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub conditions: Option<Vec<Condition>>,
    pub actions: Option<Vec<Action>>,
    pub priority: Option<i32>,
    pub active: Option<bool>,
}

impl RuleUpdate {
    pub fn into_db_request(self) -> Result<RuleUpdateDBRequest> {
        Ok(RuleUpdateDBRequest {
            conditions: self.conditions.as_ref().map(to_json).transpose()?,
            actions: self.actions.as_ref().map(to_json).transpose()?,
            name: self.name,
            description: self.description,
            priority: self.priority,
            active: self.active,
        })
    }
}

/// Context handed to a workflow run or rule evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub context: Value,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListExecutionsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[param(value_type = Option<String>, format = "uuid")]
    pub workflow_id: Option<WorkflowId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub rule_id: Option<RuleId>,
}
