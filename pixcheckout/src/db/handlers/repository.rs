//! Base repository trait for database operations.

use crate::db::errors::Result;

/// A repository is a data access layer over one postgres table, providing create, read, update,
/// delete and list operations. Tables with richer access patterns (orders, logs) expose
/// inherent methods instead of implementing this trait.
#[async_trait::async_trait]
pub trait Repository {
    type CreateRequest;
    type UpdateRequest;
    type Response;
    type Id: Send + Sync;
    type Filter: Send + Sync;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// List entities with filtering and pagination
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Returns `DbError::NotFound` if the entity does not exist
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
