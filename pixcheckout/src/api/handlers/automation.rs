use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        automation::{ExecuteRequest, ListExecutionsQuery, RuleCreate, RuleUpdate, WorkflowCreate, WorkflowUpdate},
        pagination::Pagination,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    automation,
    db::{
        handlers::{Executions, Repository, Rules, Workflows, automation::AutomationFilter},
        models::automation::{Execution, Rule, Workflow},
    },
    errors::{Error, Result},
    types::{RuleId, WorkflowId},
};

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Name is required".to_string(),
        });
    }
    Ok(())
}

fn not_found(resource: &str, id: impl ToString) -> Error {
    Error::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/automation/workflows",
    tag = "automation",
    params(Pagination),
    responses((status = 200, description = "Workflows", body = Vec<Workflow>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_workflows(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    _: RequiresPermission<resource::Automation, operation::ReadAll>,
) -> Result<Json<Vec<Workflow>>> {
    let (skip, limit) = pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let workflows = Workflows::new(&mut conn).list(&AutomationFilter::new(skip, limit)).await?;
    Ok(Json(workflows))
}

#[utoipa::path(
    post,
    path = "/automation/workflows",
    tag = "automation",
    request_body = WorkflowCreate,
    responses(
        (status = 201, description = "Workflow created", body = Workflow),
        (status = 400, description = "Invalid workflow"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_workflow(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Automation, operation::CreateAll>,
    Json(request): Json<WorkflowCreate>,
) -> Result<(StatusCode, Json<Workflow>)> {
    require_name(&request.name)?;
    let db_request = request.into_db_request()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let workflow = Workflows::new(&mut conn).create(&db_request).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

#[utoipa::path(
    get,
    path = "/automation/workflows/{id}",
    tag = "automation",
    params(("id" = String, Path, description = "Workflow ID")),
    responses(
        (status = 200, description = "Workflow", body = Workflow),
        (status = 404, description = "Workflow not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(workflow_id = %id))]
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<WorkflowId>,
    _: RequiresPermission<resource::Automation, operation::ReadAll>,
) -> Result<Json<Workflow>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let workflow = Workflows::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| not_found("Workflow", id))?;
    Ok(Json(workflow))
}

#[utoipa::path(
    patch,
    path = "/automation/workflows/{id}",
    tag = "automation",
    request_body = WorkflowUpdate,
    params(("id" = String, Path, description = "Workflow ID")),
    responses(
        (status = 200, description = "Workflow updated", body = Workflow),
        (status = 404, description = "Workflow not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(workflow_id = %id))]
pub async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<WorkflowId>,
    _: RequiresPermission<resource::Automation, operation::UpdateAll>,
    Json(request): Json<WorkflowUpdate>,
) -> Result<Json<Workflow>> {
    let db_request = request.into_db_request()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let workflow = Workflows::new(&mut conn).update(id, &db_request).await?;
    Ok(Json(workflow))
}

#[utoipa::path(
    delete,
    path = "/automation/workflows/{id}",
    tag = "automation",
    params(("id" = String, Path, description = "Workflow ID")),
    responses(
        (status = 204, description = "Workflow deleted"),
        (status = 404, description = "Workflow not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(workflow_id = %id))]
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<WorkflowId>,
    _: RequiresPermission<resource::Automation, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Workflows::new(&mut conn).delete(id).await? {
        return Err(not_found("Workflow", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Run a workflow's actions now against the given context.
#[utoipa::path(
    post,
    path = "/automation/workflows/{id}/execute",
    tag = "automation",
    request_body = ExecuteRequest,
    params(("id" = String, Path, description = "Workflow ID")),
    responses(
        (status = 200, description = "Execution record", body = Execution),
        (status = 404, description = "Workflow not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(workflow_id = %id))]
pub async fn execute_workflow(
    State(state): State<AppState>,
    Path(id): Path<WorkflowId>,
    _: RequiresPermission<resource::Automation, operation::SystemAccess>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<Execution>> {
    let execution = automation::execute_workflow(&state, id, &request.context).await?;
    Ok(Json(execution))
}

#[utoipa::path(
    get,
    path = "/automation/rules",
    tag = "automation",
    params(Pagination),
    responses((status = 200, description = "Rules", body = Vec<Rule>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_rules(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    _: RequiresPermission<resource::Automation, operation::ReadAll>,
) -> Result<Json<Vec<Rule>>> {
    let (skip, limit) = pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rules = Rules::new(&mut conn).list(&AutomationFilter::new(skip, limit)).await?;
    Ok(Json(rules))
}

#[utoipa::path(
    post,
    path = "/automation/rules",
    tag = "automation",
    request_body = RuleCreate,
    responses(
        (status = 201, description = "Rule created", body = Rule),
        (status = 400, description = "Invalid rule"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_rule(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Automation, operation::CreateAll>,
    Json(request): Json<RuleCreate>,
) -> Result<(StatusCode, Json<Rule>)> {
    require_name(&request.name)?;
    let db_request = request.into_db_request()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rule = Rules::new(&mut conn).create(&db_request).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

#[utoipa::path(
    get,
    path = "/automation/rules/{id}",
    tag = "automation",
    params(("id" = String, Path, description = "Rule ID")),
    responses(
        (status = 200, description = "Rule", body = Rule),
        (status = 404, description = "Rule not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(rule_id = %id))]
pub async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<RuleId>,
    _: RequiresPermission<resource::Automation, operation::ReadAll>,
) -> Result<Json<Rule>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rule = Rules::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found("Rule", id))?;
    Ok(Json(rule))
}

#[utoipa::path(
    patch,
    path = "/automation/rules/{id}",
    tag = "automation",
    request_body = RuleUpdate,
    params(("id" = String, Path, description = "Rule ID")),
    responses(
        (status = 200, description = "Rule updated", body = Rule),
        (status = 404, description = "Rule not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(rule_id = %id))]
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<RuleId>,
    _: RequiresPermission<resource::Automation, operation::UpdateAll>,
    Json(request): Json<RuleUpdate>,
) -> Result<Json<Rule>> {
    let db_request = request.into_db_request()?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rule = Rules::new(&mut conn).update(id, &db_request).await?;
    Ok(Json(rule))
}

#[utoipa::path(
    delete,
    path = "/automation/rules/{id}",
    tag = "automation",
    params(("id" = String, Path, description = "Rule ID")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 404, description = "Rule not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(rule_id = %id))]
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<RuleId>,
    _: RequiresPermission<resource::Automation, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Rules::new(&mut conn).delete(id).await? {
        return Err(not_found("Rule", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Evaluate every active rule against the context. Returns one execution per rule that fired.
#[utoipa::path(
    post,
    path = "/automation/rules/evaluate",
    tag = "automation",
    request_body = ExecuteRequest,
    responses((status = 200, description = "Executions of the rules that fired", body = Vec<Execution>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn evaluate_rules(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Automation, operation::SystemAccess>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<Vec<Execution>>> {
    let executions = automation::evaluate_rules(&state, &request.context).await?;
    Ok(Json(executions))
}

#[utoipa::path(
    get,
    path = "/automation/executions",
    tag = "automation",
    params(ListExecutionsQuery),
    responses((status = 200, description = "Execution log, newest first", body = Vec<Execution>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ListExecutionsQuery>,
    _: RequiresPermission<resource::Automation, operation::ReadAll>,
) -> Result<Json<Vec<Execution>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let executions = Executions::new(&mut conn)
        .list(query.workflow_id, query.rule_id, skip, limit)
        .await?;
    Ok(Json(executions))
}
