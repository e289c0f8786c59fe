//! Test doubles for the queue's external collaborators, plus polling helpers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use feature_triage::db::{StoreError, TicketStore};
use feature_triage::models::analysis::{FeatureAnalysis, MoscowPriority};
use feature_triage::models::job::{AnalysisItem, JobStatusView};
use feature_triage::services::analysis::{AnalysisError, AnalysisProvider};
use feature_triage::services::queue::{AnalysisQueue, QueueOptions};

/// Scripted stand-in for the Ollama client.
pub struct MockAnalysis {
    pub available: AtomicBool,
    pub fail_keys: HashSet<String>,
}

impl MockAnalysis {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            fail_keys: HashSet::new(),
        }
    }

    pub fn unavailable() -> Self {
        let mock = Self::new();
        mock.available.store(false, Ordering::SeqCst);
        mock
    }

    pub fn failing_for(keys: &[&str]) -> Self {
        let mut mock = Self::new();
        mock.fail_keys = keys.iter().map(|k| k.to_string()).collect();
        mock
    }
}

impl AnalysisProvider for MockAnalysis {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn analyze(&self, item: &AnalysisItem) -> Result<FeatureAnalysis, AnalysisError> {
        if self.fail_keys.contains(&item.key) {
            Err(AnalysisError::Parse(format!(
                "scripted failure for {}",
                item.key
            )))
        } else {
            Ok(sample_analysis())
        }
    }
}

/// Records write-backs in submission order; optionally rejects chosen keys.
pub struct MockTicketStore {
    pub recorded: Mutex<Vec<String>>,
    pub fail_keys: HashSet<String>,
}

impl MockTicketStore {
    pub fn new() -> Self {
        Self {
            recorded: Mutex::new(Vec::new()),
            fail_keys: HashSet::new(),
        }
    }

    pub fn failing_for(keys: &[&str]) -> Self {
        let mut store = Self::new();
        store.fail_keys = keys.iter().map(|k| k.to_string()).collect();
        store
    }

    pub fn recorded_keys(&self) -> Vec<String> {
        self.recorded.lock().unwrap().clone()
    }
}

impl TicketStore for MockTicketStore {
    async fn record_analysis(
        &self,
        item_key: &str,
        _analysis: &FeatureAnalysis,
    ) -> Result<(), StoreError> {
        if self.fail_keys.contains(item_key) {
            return Err(StoreError::WriteFailed(format!(
                "upsert rejected for {item_key}"
            )));
        }
        self.recorded.lock().unwrap().push(item_key.to_string());
        Ok(())
    }
}

pub fn sample_analysis() -> FeatureAnalysis {
    FeatureAnalysis {
        engineering_score: 4,
        clarity_score: 4,
        completeness_score: 3,
        implementability_score: 4,
        overall_score: 4,
        suggested_priority: MoscowPriority::Should,
    }
}

pub fn item(key: &str) -> AnalysisItem {
    AnalysisItem {
        key: key.to_string(),
        summary: format!("Feature {key}"),
        description: String::new(),
    }
}

pub fn items(keys: &[&str]) -> Vec<AnalysisItem> {
    keys.iter().map(|k| item(k)).collect()
}

pub fn test_options() -> QueueOptions {
    QueueOptions {
        workers: 1,
        item_delay: Duration::from_millis(5),
        retention: Duration::from_secs(3600),
        cleanup_interval: Duration::from_secs(3600),
    }
}

/// Start a queue over the given doubles, keeping handles for inspection.
pub fn start_queue(
    analysis: MockAnalysis,
    store: MockTicketStore,
) -> (
    Arc<AnalysisQueue<MockAnalysis, MockTicketStore>>,
    Arc<MockAnalysis>,
    Arc<MockTicketStore>,
) {
    let analysis = Arc::new(analysis);
    let store = Arc::new(store);
    let queue = AnalysisQueue::start(Arc::clone(&analysis), Arc::clone(&store), test_options());
    (queue, analysis, store)
}

/// Poll until the job reaches a terminal state or the deadline passes.
pub async fn wait_until_terminal<A, S>(
    queue: &AnalysisQueue<A, S>,
    job_id: Uuid,
) -> JobStatusView
where
    A: AnalysisProvider + 'static,
    S: TicketStore + 'static,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(view) = queue.get_job(job_id) {
            if view.status.is_terminal() {
                return view;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!("job {job_id} did not reach a terminal state in time");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Every processed item yields exactly one outcome; job-level setup errors
/// carry no item key and do not count toward progress.
pub fn assert_progress_invariant(view: &JobStatusView) {
    let item_errors = view.errors.iter().filter(|e| e.item_key.is_some()).count();
    assert_eq!(
        view.results.len() + item_errors,
        view.progress,
        "results + per-item errors must equal progress"
    );
    assert!(view.progress <= view.total, "progress must not exceed total");
}
