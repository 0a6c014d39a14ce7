//! Database models for blocked client addresses and login attempts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::{BlockedIpId, UserId};

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct BlockedIp {
    #[schema(value_type = String, format = "uuid")]
    pub id: BlockedIpId,
    pub ip_address: String,
    pub reason: Option<String>,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BlockedIpCreateDBRequest {
    pub ip_address: String,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LoginAttempt {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    pub email: String,
    pub ip_address: Option<String>,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}
