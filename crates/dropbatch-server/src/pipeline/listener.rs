//! Completion hooks invoked once at the end of every run

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info, warn};

use super::types::RunReport;
use crate::db::discounts;

/// Called exactly once per run with its final report.
#[async_trait]
pub trait CompletionListener: Send + Sync {
    async fn after_run(&self, report: &RunReport);
}

/// Logs the run outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

#[async_trait]
impl CompletionListener for LoggingListener {
    async fn after_run(&self, report: &RunReport) {
        log_outcome(report);
    }
}

fn log_outcome(report: &RunReport) {
    let stats = &report.stats;
    match report.error() {
        None => info!(
            file_paths = %report.params.joined_paths(),
            timestamp = report.params.timestamp(),
            records_written = stats.records_written,
            chunks_committed = stats.chunks_committed,
            duration_secs = stats.duration_secs,
            "Run completed"
        ),
        Some(err) => error!(
            file_paths = %report.params.joined_paths(),
            timestamp = report.params.timestamp(),
            records_written = stats.records_written,
            chunks_committed = stats.chunks_committed,
            error = %err,
            "Run failed"
        ),
    }
}

/// Logs the outcome and, after a successful run, reads the freshly written
/// rows back from PostgreSQL so operators can see what was loaded.
#[derive(Clone)]
pub struct DiscountAuditListener {
    pool: PgPool,
    created_by: String,
}

impl DiscountAuditListener {
    pub fn new(pool: PgPool, created_by: impl Into<String>) -> Self {
        Self {
            pool,
            created_by: created_by.into(),
        }
    }
}

#[async_trait]
impl CompletionListener for DiscountAuditListener {
    async fn after_run(&self, report: &RunReport) {
        log_outcome(report);

        if !report.is_success() || report.stats.records_written == 0 {
            return;
        }

        let limit = i64::try_from(report.stats.records_written).unwrap_or(i64::MAX);
        match discounts::list_recent(&self.pool, &self.created_by, limit).await {
            Ok(rows) => {
                for row in rows {
                    info!(
                        id = %row.id,
                        name = %row.name,
                        percentage = row.percentage,
                        created_by = %row.created_by,
                        "Found discount in the database"
                    );
                }
            },
            Err(e) => warn!(error = %e, "Failed to read back loaded discounts"),
        }
    }
}
