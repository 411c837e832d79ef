//! Queries against the `discount` table.
//!
//! The table is insert-only from the pipeline's point of view: rows are never
//! updated, and every row carries the attribution of whoever loaded it.

use chrono::{DateTime, Utc};
use dropbatch_common::types::Discount;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::DbResult;

/// A persisted discount row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DiscountRow {
    pub id: Uuid,
    pub name: String,
    pub percentage: f64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Insert one discount inside the caller's transaction.
///
/// Returns the generated row id.
pub async fn insert_discount(
    tx: &mut Transaction<'_, Postgres>,
    discount: &Discount,
    created_by: &str,
) -> DbResult<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO discount (id, name, percentage, created_by)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(id)
    .bind(&discount.name)
    .bind(discount.percentage)
    .bind(created_by)
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

/// Most recent rows attributed to `created_by`, newest first.
pub async fn list_recent(
    pool: &PgPool,
    created_by: &str,
    limit: i64,
) -> DbResult<Vec<DiscountRow>> {
    let rows = sqlx::query_as::<_, DiscountRow>(
        r#"
        SELECT id, name, percentage, created_by, created_at
        FROM discount
        WHERE created_by = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(created_by)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Total rows attributed to `created_by`.
pub async fn count_by_creator(pool: &PgPool, created_by: &str) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discount WHERE created_by = $1")
        .bind(created_by)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
