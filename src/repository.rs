use crate::{
    entity::{Column, ColumnValue, EntityDescriptor},
    models::{Role, User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};
use std::sync::Arc;

/// Repository Trait
///
/// The abstract contract for all persistence: the credential store, the token blacklist
/// store, and the generic entity tables. Handlers only ever see `Arc<dyn Repository>`, which
/// lets tests swap in an in-memory implementation.
///
/// Every method is attempted exactly once and surfaces driver failures as `sqlx::Error`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credential Store ---
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;
    // Returns rows affected. A duplicate email surfaces as a unique violation.
    async fn create_user(&self, email: &str, password_hash: &str, role: Role)
    -> Result<u64, sqlx::Error>;

    // --- Token Blacklist Store ---
    async fn revoke_token(&self, jti: &str, expiration: DateTime<Utc>) -> Result<(), sqlx::Error>;

    /// is_token_revoked
    ///
    /// Called synchronously inside token verification on every guarded request, so it is a
    /// blocking round trip on the hot path. Callers must treat an error as "not verified".
    async fn is_token_revoked(&self, jti: &str) -> Result<bool, sqlx::Error>;

    /// Deletes blacklist rows whose expiration has passed. Returns rows removed.
    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error>;

    // --- Generic Entity Tables ---
    // Read methods return each row of the descriptor's projection as a JSON object.
    async fn fetch_records(&self, entity: &EntityDescriptor) -> Result<Vec<Value>, sqlx::Error>;
    // Zero or one record.
    async fn fetch_record(&self, entity: &EntityDescriptor, id: i64)
    -> Result<Vec<Value>, sqlx::Error>;
    async fn record_exists(&self, entity: &EntityDescriptor, id: i64) -> Result<bool, sqlx::Error>;

    // Write methods return rows affected.
    async fn insert_record(
        &self,
        entity: &EntityDescriptor,
        columns: Vec<Column>,
    ) -> Result<u64, sqlx::Error>;
    async fn update_record(
        &self,
        entity: &EntityDescriptor,
        id: i64,
        columns: Vec<Column>,
    ) -> Result<u64, sqlx::Error>;
    async fn delete_record(&self, entity: &EntityDescriptor, id: i64) -> Result<u64, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Binds one value. Identifiers never pass through here, only values.
fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: ColumnValue) {
    match value {
        ColumnValue::BigInt(v) => builder.push_bind(v),
        ColumnValue::SmallInt(v) => builder.push_bind(v),
        ColumnValue::Text(v) => builder.push_bind(v),
        ColumnValue::Date(v) => builder.push_bind(v),
    };
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, email, password_hash, role FROM "user" WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query(r#"INSERT INTO "user" (email, password_hash, role) VALUES ($1, $2, $3)"#)
                .bind(email)
                .bind(password_hash)
                .bind(role.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn revoke_token(&self, jti: &str, expiration: DateTime<Utc>) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO token_blacklist (jti, expiration) VALUES ($1, $2)")
            .bind(jti)
            .bind(expiration)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_token_revoked(&self, jti: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM token_blacklist WHERE jti = $1)",
        )
        .bind(jti)
        .fetch_one(&self.pool)
        .await
    }

    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expiration < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// fetch_records
    ///
    /// Wraps the descriptor's projection so PostgreSQL serializes each row, which keeps this
    /// method independent of the entity's column types.
    async fn fetch_records(&self, entity: &EntityDescriptor) -> Result<Vec<Value>, sqlx::Error> {
        let sql = format!(
            "SELECT row_to_json(entity_row) FROM ({}) AS entity_row ORDER BY entity_row.id",
            entity.select
        );
        let rows = sqlx::query_scalar::<_, Json<Value>>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }

    async fn fetch_record(
        &self,
        entity: &EntityDescriptor,
        id: i64,
    ) -> Result<Vec<Value>, sqlx::Error> {
        let sql = format!(
            "SELECT row_to_json(entity_row) FROM ({}) AS entity_row WHERE entity_row.id = $1",
            entity.select
        );
        let rows = sqlx::query_scalar::<_, Json<Value>>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }

    async fn record_exists(&self, entity: &EntityDescriptor, id: i64) -> Result<bool, sqlx::Error> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)", entity.table);
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    /// insert_record
    ///
    /// `INSERT INTO <table> (<columns>) VALUES ($1, ...)`. Column names come from the
    /// descriptor-checked payload; every value is bound.
    async fn insert_record(
        &self,
        entity: &EntityDescriptor,
        columns: Vec<Column>,
    ) -> Result<u64, sqlx::Error> {
        let names = columns.iter().map(|c| c.name).collect::<Vec<_>>().join(", ");
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} ({}) VALUES (", entity.table, names));

        for (i, column) in columns.into_iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            push_value(&mut builder, column.value);
        }
        builder.push(")");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// update_record
    ///
    /// `UPDATE <table> SET a = $1, b = $2 WHERE id = $n`.
    async fn update_record(
        &self,
        entity: &EntityDescriptor,
        id: i64,
        columns: Vec<Column>,
    ) -> Result<u64, sqlx::Error> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("UPDATE {} SET ", entity.table));

        for (i, column) in columns.into_iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(column.name).push(" = ");
            push_value(&mut builder, column.value);
        }
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_record(&self, entity: &EntityDescriptor, id: i64) -> Result<u64, sqlx::Error> {
        let sql = format!("DELETE FROM {} WHERE id = $1", entity.table);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
