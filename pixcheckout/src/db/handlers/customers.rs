//! Database repository for customers.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::Result,
    models::customers::{Customer, CustomerUpsertDBRequest},
};
use crate::types::{CustomerId, abbrev_uuid};

pub struct Customers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Customers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a customer, or refresh name, phone and document of the customer with this email.
    #[instrument(skip(self, request), err)]
    pub async fn upsert_by_email(&mut self, request: &CustomerUpsertDBRequest) -> Result<Customer> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (id, name, email, cpf, phone)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name, cpf = EXCLUDED.cpf, phone = EXCLUDED.phone
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.cpf)
        .bind(&request.phone)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(customer)
    }

    #[instrument(skip(self), fields(customer_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: CustomerId) -> Result<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(customer)
    }

    /// List customers, newest first, optionally matching `search` against name, email or document.
    #[instrument(skip(self), err)]
    pub async fn list(&mut self, skip: i64, limit: i64, search: Option<&str>) -> Result<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT * FROM customers
            WHERE ($3::text IS NULL OR name ILIKE '%' || $3 || '%' OR email ILIKE '%' || $3 || '%' OR cpf LIKE '%' || $3 || '%')
            ORDER BY created_at DESC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(skip)
        .bind(limit)
        .bind(search)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(customers)
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self, search: Option<&str>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM customers
            WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%' OR email ILIKE '%' || $1 || '%' OR cpf LIKE '%' || $1 || '%')
            "#,
        )
        .bind(search)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn request(name: &str, phone: &str) -> CustomerUpsertDBRequest {
        CustomerUpsertDBRequest {
            name: name.to_string(),
            email: "maria@example.com".to_string(),
            cpf: "52998224725".to_string(),
            phone: phone.to_string(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upsert_refreshes_existing_customer(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Customers::new(&mut conn);

        let first = repo.upsert_by_email(&request("Maria", "11987654321")).await.unwrap();
        let second = repo.upsert_by_email(&request("Maria Silva", "1133334444")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Maria Silva");
        assert_eq!(second.phone, "1133334444");
        assert_eq!(repo.count(None).await.unwrap(), 1);
        assert_eq!(repo.list(0, 10, Some("silva")).await.unwrap().len(), 1);
        assert!(repo.list(0, 10, Some("joao")).await.unwrap().is_empty());
    }
}
