//! Database repository for products.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::products::{Product, ProductCreateDBRequest, ProductUpdateDBRequest},
};
use crate::types::{ProductId, abbrev_uuid};

/// Filter for listing products
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub skip: i64,
    pub limit: i64,
    pub active_only: bool,
}

impl ProductFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            active_only: false,
        }
    }
}

pub struct Products<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Products<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Product available for checkout, i.e. existing and active.
    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&id)), err)]
    pub async fn get_active(&mut self, id: ProductId) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND active")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(product)
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self, active_only: bool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE (NOT $1 OR active)")
            .bind(active_only)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Products<'c> {
    type CreateRequest = ProductCreateDBRequest;
    type UpdateRequest = ProductUpdateDBRequest;
    type Response = Product;
    type Id = ProductId;
    type Filter = ProductFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, name, description, price, image_url, type, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.price)
        .bind(&request.image_url)
        .bind(request.product_type)
        .bind(request.active)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(product)
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
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

        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(product_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                image_url = COALESCE($5, image_url),
                type = COALESCE($6, type),
                active = COALESCE($7, active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.price)
        .bind(&request.image_url)
        .bind(request.product_type)
        .bind(request.active)
        .fetch_optional(&mut *self.db)
        .await?;

        product.ok_or(DbError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::products::ProductType;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    fn create_request(name: &str, active: bool) -> ProductCreateDBRequest {
        ProductCreateDBRequest {
            name: name.to_string(),
            description: "Curso online".to_string(),
            price: Decimal::new(9990, 2),
            image_url: String::new(),
            product_type: ProductType::Service,
            active,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_product_crud(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Products::new(&mut conn);

        let product = repo.create(&create_request("Curso", true)).await.unwrap();
        assert_eq!(product.price, Decimal::new(9990, 2));
        assert_eq!(product.product_type, ProductType::Service);

        let updated = repo
            .update(
                product.id,
                &ProductUpdateDBRequest {
                    price: Some(Decimal::new(7990, 2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, Decimal::new(7990, 2));
        assert_eq!(updated.name, "Curso");

        assert!(repo.delete(product.id).await.unwrap());
        assert!(repo.get_by_id(product.id).await.unwrap().is_none());
        assert!(matches!(
            repo.update(product.id, &ProductUpdateDBRequest::default()).await,
            Err(DbError::NotFound)
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_inactive_products_hidden_from_checkout(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Products::new(&mut conn);

        let active = repo.create(&create_request("Ativo", true)).await.unwrap();
        let inactive = repo.create(&create_request("Inativo", false)).await.unwrap();

        assert!(repo.get_active(active.id).await.unwrap().is_some());
        assert!(repo.get_active(inactive.id).await.unwrap().is_none());

        let mut filter = ProductFilter::new(0, 10);
        assert_eq!(repo.list(&filter).await.unwrap().len(), 2);
        filter.active_only = true;
        assert_eq!(repo.list(&filter).await.unwrap().len(), 1);
        assert_eq!(repo.count(true).await.unwrap(), 1);
    }
}
