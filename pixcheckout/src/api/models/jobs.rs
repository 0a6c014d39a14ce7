use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExpireOrdersResponse {
    /// Pending orders moved to expired
    pub expired: u64,
}
