//! Transactional chunk writers
//!
//! Implement [`ChunkSink`] for any store that can apply a group of inserts
//! atomically.

use async_trait::async_trait;
use dropbatch_common::types::Discount;
use sqlx::PgPool;
use tracing::debug;

use crate::db::{discounts, DbResult};

/// Writes one chunk of normalized records.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Insert every record of `chunk` in a single transaction.
    ///
    /// On `Err` none of the chunk's records may be visible in the store.
    /// Returns the number of rows written.
    async fn write_chunk(&self, chunk: &[Discount]) -> DbResult<u64>;
}

/// PostgreSQL sink inserting into the `discount` table
#[derive(Clone)]
pub struct PgDiscountSink {
    pool: PgPool,
    created_by: String,
}

impl PgDiscountSink {
    pub fn new(pool: PgPool, created_by: impl Into<String>) -> Self {
        Self {
            pool,
            created_by: created_by.into(),
        }
    }
}

#[async_trait]
impl ChunkSink for PgDiscountSink {
    async fn write_chunk(&self, chunk: &[Discount]) -> DbResult<u64> {
        // An uncommitted transaction rolls back when dropped, so any `?`
        // below leaves the table untouched.
        let mut tx = self.pool.begin().await?;

        for discount in chunk {
            let id = discounts::insert_discount(&mut tx, discount, &self.created_by).await?;
            debug!(%id, name = %discount.name, "Staged discount insert");
        }

        tx.commit().await?;

        Ok(chunk.len() as u64)
    }
}
