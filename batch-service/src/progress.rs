//! In-memory record of batch runs.
//!
//! The store is owned and injected rather than global. Finished runs expire
//! after a TTL, and once `max_runs` entries are tracked the oldest finished
//! run makes room for a new one. Running batches are never evicted.

use chrono::{DateTime, Utc};
use redpost_core::{AccountId, BatchConfig, CoreError, ErrorExt, PostRecord, SubmittedPost};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    /// The run stopped without finishing its loop, e.g. the worker panicked.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSuccess {
    pub post: PostRecord,
    pub result: SubmittedPost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostFailure {
    pub post: PostRecord,
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
}

impl PostFailure {
    pub fn from_error(post: PostRecord, error: &CoreError) -> Self {
        Self {
            post,
            code: error.error_code(),
            message: error.user_friendly_message(),
            detail: error.diagnostic_detail(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub run_id: Uuid,
    pub account_id: AccountId,
    pub total: usize,
    pub current: usize,
    pub completed: Vec<PostSuccess>,
    pub failed: Vec<PostFailure>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchProgress {
    fn new(run_id: Uuid, account_id: AccountId, total: usize) -> Self {
        Self {
            run_id,
            account_id,
            total,
            current: 0,
            completed: Vec::new(),
            failed: Vec::new(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_finished(&self) -> bool {
        self.status != RunStatus::Running
    }
}

/// Cooperative cancellation shared between a run and whoever may stop it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct RunEntry {
    progress: BatchProgress,
    cancel: CancelFlag,
    created: Instant,
    finished: Option<Instant>,
}

#[derive(Debug)]
pub struct ProgressStore {
    runs: RwLock<HashMap<Uuid, RunEntry>>,
    ttl: Duration,
    max_runs: usize,
}

impl ProgressStore {
    pub fn new(ttl: Duration, max_runs: usize) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            ttl,
            max_runs: max_runs.max(1),
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(
            Duration::from_secs(config.progress_ttl_secs),
            config.max_tracked_runs,
        )
    }

    /// Registers a new running batch.
    pub async fn create(&self, account_id: AccountId, total: usize) -> (Uuid, CancelFlag) {
        let run_id = Uuid::new_v4();
        let cancel = CancelFlag::default();

        let mut runs = self.runs.write().await;
        self.evict(&mut runs);
        runs.insert(
            run_id,
            RunEntry {
                progress: BatchProgress::new(run_id, account_id, total),
                cancel: cancel.clone(),
                created: Instant::now(),
                finished: None,
            },
        );

        info!("Created batch run {} for account {} ({} posts)", run_id, account_id, total);
        (run_id, cancel)
    }

    pub async fn record_success(&self, run_id: Uuid, post: PostRecord, result: SubmittedPost) {
        if let Some(entry) = self.runs.write().await.get_mut(&run_id) {
            entry.progress.current += 1;
            entry.progress.completed.push(PostSuccess { post, result });
        }
    }

    pub async fn record_failure(&self, run_id: Uuid, failure: PostFailure) {
        if let Some(entry) = self.runs.write().await.get_mut(&run_id) {
            entry.progress.current += 1;
            entry.progress.failed.push(failure);
        }
    }

    /// Closes a run whose loop ended. It counts as cancelled only when the
    /// cancel flag is set and some posts were never attempted.
    pub async fn finish(&self, run_id: Uuid) -> Option<BatchProgress> {
        let mut runs = self.runs.write().await;
        let entry = runs.get_mut(&run_id)?;

        let skipped = entry.progress.current < entry.progress.total;
        entry.progress.status = if entry.cancel.is_cancelled() && skipped {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        entry.progress.finished_at = Some(Utc::now());
        entry.finished = Some(Instant::now());

        info!(
            "Batch run {} finished as {:?}: {} completed, {} failed of {}",
            run_id,
            entry.progress.status,
            entry.progress.completed_count(),
            entry.progress.failed_count(),
            entry.progress.total
        );
        Some(entry.progress.clone())
    }

    /// Closes a run that ended abnormally. A run that is already finished
    /// keeps its status.
    pub async fn abort(&self, run_id: Uuid, reason: impl Into<String>) -> Option<BatchProgress> {
        let mut runs = self.runs.write().await;
        let entry = runs.get_mut(&run_id)?;
        if entry.finished.is_some() {
            return Some(entry.progress.clone());
        }

        entry.progress.status = RunStatus::Failed;
        entry.progress.error = Some(reason.into());
        entry.progress.finished_at = Some(Utc::now());
        entry.finished = Some(Instant::now());

        warn!(
            "Batch run {} aborted after {} of {} posts",
            run_id, entry.progress.current, entry.progress.total
        );
        Some(entry.progress.clone())
    }

    pub async fn snapshot(&self, run_id: Uuid) -> Option<BatchProgress> {
        self.runs
            .read()
            .await
            .get(&run_id)
            .map(|entry| entry.progress.clone())
    }

    /// Requests cancellation. `false` when the run is unknown or already done.
    pub async fn cancel(&self, run_id: Uuid) -> bool {
        match self.runs.read().await.get(&run_id) {
            Some(entry) if entry.finished.is_none() => {
                entry.cancel.cancel();
                info!("Cancellation requested for batch run {}", run_id);
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }

    fn evict(&self, runs: &mut HashMap<Uuid, RunEntry>) {
        let ttl = self.ttl;
        let before = runs.len();
        runs.retain(|_, entry| match entry.finished {
            Some(finished) => finished.elapsed() < ttl,
            None => true,
        });

        while runs.len() >= self.max_runs {
            let oldest = runs
                .iter()
                .filter(|(_, entry)| entry.finished.is_some())
                .min_by_key(|(_, entry)| entry.created)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    runs.remove(&id);
                }
                None => break,
            }
        }

        let evicted = before - runs.len();
        if evicted > 0 {
            debug!("Evicted {} finished batch runs", evicted);
        }
    }
}
