//! Database repositories for automation workflows, rules and the execution log.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::automation::{
        Execution, ExecutionCreateDBRequest, Rule, RuleCreateDBRequest, RuleUpdateDBRequest, Workflow, WorkflowCreateDBRequest,
        WorkflowUpdateDBRequest,
    },
};
use crate::types::{RuleId, WorkflowId, abbrev_uuid};

#[derive(Debug, Clone)]
pub struct AutomationFilter {
    pub skip: i64,
    pub limit: i64,
    pub active_only: bool,
}

impl AutomationFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            active_only: false,
        }
    }
}

pub struct Workflows<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Workflows<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Active workflows listening for `trigger_type`.
    #[instrument(skip(self), err)]
    pub async fn active_for_trigger(&mut self, trigger_type: &str) -> Result<Vec<Workflow>> {
        let workflows = sqlx::query_as::<_, Workflow>(
            "SELECT * FROM automation_workflows WHERE active AND trigger_type = $1 ORDER BY created_at ASC",
        )
        .bind(trigger_type)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(workflows)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Workflows<'c> {
    type CreateRequest = WorkflowCreateDBRequest;
    type UpdateRequest = WorkflowUpdateDBRequest;
    type Response = Workflow;
    type Id = WorkflowId;
    type Filter = AutomationFilter;

    #[instrument(skip(self, request), fields(name = %request.name, trigger = %request.trigger_type), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let workflow = sqlx::query_as::<_, Workflow>(
            r#"
            INSERT INTO automation_workflows (id, name, description, trigger_type, trigger_config, actions, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.trigger_type)
        .bind(&request.trigger_config)
        .bind(&request.actions)
        .bind(request.active)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(workflow)
    }

    #[instrument(skip(self), fields(workflow_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let workflow = sqlx::query_as::<_, Workflow>("SELECT * FROM automation_workflows WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(workflow)
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let workflows = sqlx::query_as::<_, Workflow>(
            r#"
            SELECT * FROM automation_workflows
            WHERE (NOT $3 OR active)
            ORDER BY created_at DESC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(filter.skip)
        .bind(filter.limit)
        .bind(filter.active_only)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(workflows)
    }

    #[instrument(skip(self), fields(workflow_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM automation_workflows WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(workflow_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let workflow = sqlx::query_as::<_, Workflow>(
            r#"
            UPDATE automation_workflows
            SET
                name = COALESCE($2, name),
                description = CASE WHEN $3::boolean THEN $4 ELSE description END,
                trigger_config = COALESCE($5, trigger_config),
                actions = COALESCE($6, actions),
                active = COALESCE($7, active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(request.description.is_some())
        .bind(request.description.clone().flatten())
        .bind(&request.trigger_config)
        .bind(&request.actions)
        .bind(request.active)
        .fetch_optional(&mut *self.db)
        .await?;

        workflow.ok_or(DbError::NotFound)
    }
}

pub struct Rules<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Rules<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Active rules, highest priority first.
    #[instrument(skip(self), err)]
    pub async fn active_by_priority(&mut self) -> Result<Vec<Rule>> {
        let rules = sqlx::query_as::<_, Rule>("SELECT * FROM automation_rules WHERE active ORDER BY priority DESC, created_at ASC")
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rules)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Rules<'c> {
    type CreateRequest = RuleCreateDBRequest;
    type UpdateRequest = RuleUpdateDBRequest;
    type Response = Rule;
    type Id = RuleId;
    type Filter = AutomationFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let rule = sqlx::query_as::<_, Rule>(
            r#"
            INSERT INTO automation_rules (id, name, description, conditions, actions, priority, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.conditions)
        .bind(&request.actions)
        .bind(request.priority)
        .bind(request.active)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(rule)
    }

    #[instrument(skip(self), fields(rule_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let rule = sqlx::query_as::<_, Rule>("SELECT * FROM automation_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(rule)
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let rules = sqlx::query_as::<_, Rule>(
            r#"
            SELECT * FROM automation_rules
            WHERE (NOT $3 OR active)
            ORDER BY priority DESC, created_at DESC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(filter.skip)
        .bind(filter.limit)
        .bind(filter.active_only)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rules)
    }

    #[instrument(skip(self), fields(rule_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM automation_rules WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(rule_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let rule = sqlx::query_as::<_, Rule>(
            r#"
            UPDATE automation_rules
            SET
                name = COALESCE($2, name),
                description = CASE WHEN $3::boolean THEN $4 ELSE description END,
                conditions = COALESCE($5, conditions),
                actions = COALESCE($6, actions),
                priority = COALESCE($7, priority),
                active = COALESCE($8, active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(request.description.is_some())
        .bind(request.description.clone().flatten())
        .bind(&request.conditions)
        .bind(&request.actions)
        .bind(request.priority)
        .bind(request.active)
        .fetch_optional(&mut *self.db)
        .await?;

        rule.ok_or(DbError::NotFound)
    }
}

pub struct Executions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Executions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(success = request.success, duration_ms = request.duration_ms), err)]
    pub async fn create(&mut self, request: &ExecutionCreateDBRequest) -> Result<Execution> {
        let execution = sqlx::query_as::<_, Execution>(
            r#"
            INSERT INTO automation_executions (id, workflow_id, rule_id, status, result, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.workflow_id)
        .bind(request.rule_id)
        .bind(if request.success { "success" } else { "failed" })
        .bind(&request.result)
        .bind(request.duration_ms)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(execution)
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self, workflow_id: Option<WorkflowId>, rule_id: Option<RuleId>, skip: i64, limit: i64) -> Result<Vec<Execution>> {
        let executions = sqlx::query_as::<_, Execution>(
            r#"
            SELECT * FROM automation_executions
            WHERE ($1::uuid IS NULL OR workflow_id = $1)
              AND ($2::uuid IS NULL OR rule_id = $2)
            ORDER BY created_at DESC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(workflow_id)
        .bind(rule_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(executions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn rule(name: &str, priority: i32, active: bool) -> RuleCreateDBRequest {
        RuleCreateDBRequest {
            name: name.to_string(),
            description: None,
            conditions: serde_json::json!([]),
            actions: serde_json::json!([]),
            priority,
            active,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_rules_ordered_by_priority(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Rules::new(&mut conn);

        repo.create(&rule("low", 1, true)).await.unwrap();
        repo.create(&rule("high", 10, true)).await.unwrap();
        repo.create(&rule("off", 100, false)).await.unwrap();

        let names: Vec<String> = repo.active_by_priority().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["high", "low"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_workflow_trigger_lookup_and_executions(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let workflow = Workflows::new(&mut conn)
            .create(&WorkflowCreateDBRequest {
                name: "Pago".to_string(),
                description: Some("notify on payment".to_string()),
                trigger_type: "order_paid".to_string(),
                trigger_config: serde_json::json!({}),
                actions: serde_json::json!([]),
                active: true,
            })
            .await
            .unwrap();

        let mut workflows = Workflows::new(&mut conn);
        assert_eq!(workflows.active_for_trigger("order_paid").await.unwrap().len(), 1);
        assert!(workflows.active_for_trigger("order_expired").await.unwrap().is_empty());

        let updated = workflows
            .update(
                workflow.id,
                &WorkflowUpdateDBRequest {
                    description: Some(None),
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.description.is_none());
        assert!(workflows.active_for_trigger("order_paid").await.unwrap().is_empty());

        let mut executions = Executions::new(&mut conn);
        executions
            .create(&ExecutionCreateDBRequest {
                workflow_id: Some(workflow.id),
                rule_id: None,
                success: true,
                result: serde_json::json!({"actions": 0}),
                duration_ms: 3,
            })
            .await
            .unwrap();
        let listed = executions.list(Some(workflow.id), None, 0, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, "success");
    }
}
