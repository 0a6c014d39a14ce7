//! Database repository for shareable payment links.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::Result,
    models::payment_links::{PaymentLink, PaymentLinkCreateDBRequest},
};
use crate::types::{PaymentLinkId, ProductId, abbrev_uuid};

pub struct PaymentLinks<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PaymentLinks<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(product_id = %abbrev_uuid(&request.product_id)), err)]
    pub async fn create(&mut self, request: &PaymentLinkCreateDBRequest) -> Result<PaymentLink> {
        let link = sqlx::query_as::<_, PaymentLink>(
            r#"
            INSERT INTO payment_links (id, product_id, url_token, expires_at, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.product_id)
        .bind(&request.url_token)
        .bind(request.expires_at)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(link)
    }

    #[instrument(skip(self, token), err)]
    pub async fn get_by_token(&mut self, token: &str) -> Result<Option<PaymentLink>> {
        let link = sqlx::query_as::<_, PaymentLink>("SELECT * FROM payment_links WHERE url_token = $1")
            .bind(token)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(link)
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self, product_id: Option<ProductId>, skip: i64, limit: i64) -> Result<Vec<PaymentLink>> {
        let links = sqlx::query_as::<_, PaymentLink>(
            r#"
            SELECT * FROM payment_links
            WHERE ($1::uuid IS NULL OR product_id = $1)
            ORDER BY created_at DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(product_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(links)
    }

    /// Deactivate a link. Returns false if it does not exist.
    #[instrument(skip(self), fields(link_id = %abbrev_uuid(&id)), err)]
    pub async fn deactivate(&mut self, id: PaymentLinkId) -> Result<bool> {
        let result = sqlx::query("UPDATE payment_links SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_product;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_lookup_and_deactivate(pool: PgPool) {
        let product = create_test_product(&pool, Decimal::new(1990, 2)).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PaymentLinks::new(&mut conn);

        let link = repo
            .create(&PaymentLinkCreateDBRequest {
                product_id: product.id,
                url_token: "tok_abc".to_string(),
                expires_at: Utc::now() + Duration::minutes(30),
                created_by: None,
            })
            .await
            .unwrap();
        assert!(link.is_usable(Utc::now()));

        let found = repo.get_by_token("tok_abc").await.unwrap().unwrap();
        assert_eq!(found.id, link.id);

        assert!(repo.deactivate(link.id).await.unwrap());
        let found = repo.get_by_token("tok_abc").await.unwrap().unwrap();
        assert!(!found.is_usable(Utc::now()));

        assert_eq!(repo.list(Some(product.id), 0, 10).await.unwrap().len(), 1);
        assert!(!repo.deactivate(Uuid::new_v4()).await.unwrap());
    }
}
