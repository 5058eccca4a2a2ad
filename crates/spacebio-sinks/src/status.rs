//! Per-identifier processing status — the sole source of truth for
//! resumption across runs. The durable record lives in the
//! `processing_status` table; rows are created on the first `processing`
//! mark, updated at each stage transition, never deleted by the pipeline.

use async_trait::async_trait;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Processing,
    Completed,
    Failed,
    SkippedNoSections,
}

impl ProcessingState {
    /// The value stored in the status column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Processing => "processing",
            ProcessingState::Completed => "completed",
            ProcessingState::Failed => "failed",
            ProcessingState::SkippedNoSections => "skipped_no_sections",
        }
    }
}

/// Seam between the scheduler and the durable status store.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Identifiers already in `completed` state; the scheduler skips these.
    async fn completed_ids(&self) -> anyhow::Result<HashSet<String>>;

    /// Mark `processing`, creating the row on first sight and bumping
    /// `attempts` on every call.
    async fn mark_processing(&self, pmc_id: &str) -> anyhow::Result<()>;

    async fn mark_completed(&self, pmc_id: &str) -> anyhow::Result<()>;

    async fn mark_failed(&self, pmc_id: &str, error: &str) -> anyhow::Result<()>;

    async fn mark_skipped_no_sections(&self, pmc_id: &str) -> anyhow::Result<()>;

    /// Append to the error log. Separate from `mark_failed` so the log keeps
    /// one row per failure across runs.
    async fn log_error(&self, pmc_id: &str, message: &str, kind: &str) -> anyhow::Result<()>;
}
