use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::analysis::FeatureAnalysis;

/// Status of an analysis job in the in-memory queue.
///
/// Transitions are monotonic: `Queued -> Processing -> Completed | Failed`.
/// A job never re-enters `Queued` and terminal states are absorbing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    BulkAnalysis,
    SingleAnalysis,
}

/// One feature/ticket to analyze, as synced from the issue tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisItem {
    pub key: String,
    pub summary: String,
    #[serde(default)]
    pub description: String,
}

/// Job payload. Tagged per job kind so worker dispatch is exhaustive.
#[derive(Debug, Clone)]
pub enum JobPayload {
    Bulk {
        project_key: String,
        items: Vec<AnalysisItem>,
    },
    Single {
        item: AnalysisItem,
    },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Bulk { .. } => JobKind::BulkAnalysis,
            JobPayload::Single { .. } => JobKind::SingleAnalysis,
        }
    }

    pub fn items(&self) -> &[AnalysisItem] {
        match self {
            JobPayload::Bulk { items, .. } => items,
            JobPayload::Single { item } => std::slice::from_ref(item),
        }
    }
}

/// Per-item success record, appended in item visit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResult {
    pub item_key: String,
    pub analysis: FeatureAnalysis,
}

/// What a failure record describes.
///
/// `Setup` errors are job-level (analysis endpoint unreachable before any
/// item was attempted) and carry no item key; the other two are per-item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorKind {
    Setup,
    Analysis,
    WriteBack,
}

/// Per-item (or job-level) failure record, appended in item visit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemError {
    pub item_key: Option<String>,
    pub kind: ItemErrorKind,
    pub message: String,
}

/// One unit of asynchronous analysis work and its lifecycle state.
///
/// Mutated exclusively by the worker once processing starts; everything the
/// HTTP layer sees is a [`JobStatusView`] snapshot.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub id: Uuid,
    pub payload: JobPayload,
    pub status: JobStatus,
    pub progress: usize,
    pub total: usize,
    pub results: Vec<ItemResult>,
    pub errors: Vec<ItemError>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AnalysisJob {
    pub fn new(payload: JobPayload) -> Self {
        let total = payload.items().len();
        Self {
            id: Uuid::new_v4(),
            payload,
            status: JobStatus::Queued,
            progress: 0,
            total,
            results: Vec::new(),
            errors: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Copy-out snapshot of a job returned to polling callers.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: usize,
    pub total: usize,
    pub results: Vec<ItemResult>,
    pub errors: Vec<ItemError>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&AnalysisJob> for JobStatusView {
    fn from(job: &AnalysisJob) -> Self {
        Self {
            id: job.id,
            kind: job.payload.kind(),
            status: job.status,
            progress: job.progress,
            total: job.total,
            results: job.results.clone(),
            errors: job.errors.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

/// Aggregate queue statistics, computed by scanning the job store.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub active_workers: usize,
    pub current_job: Option<Uuid>,
}

/// Fired on every job state transition, in transition order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Created { job_id: Uuid },
    Started { job_id: Uuid },
    Progress { job_id: Uuid, progress: usize, total: usize },
    Completed { job_id: Uuid },
    Failed { job_id: Uuid },
}
