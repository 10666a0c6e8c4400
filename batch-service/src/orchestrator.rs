use crate::delay::DelayRange;
use crate::progress::{BatchProgress, CancelFlag, PostFailure, ProgressStore};
use async_trait::async_trait;
use reddit_client::RedditClient;
use redpost_core::{AccountId, CoreError, ErrorExt, ErrorReporter, PostRecord, SubmittedPost};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const CANCEL_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// What the orchestrator needs from the Reddit side.
#[async_trait]
pub trait PostSubmitter: Send + Sync {
    async fn submit(
        &self,
        post: &PostRecord,
        account_id: AccountId,
    ) -> Result<SubmittedPost, CoreError>;

    /// Fails when the account cannot be resolved.
    async fn verify_account(&self, account_id: AccountId) -> Result<(), CoreError>;
}

#[async_trait]
impl PostSubmitter for RedditClient {
    async fn submit(
        &self,
        post: &PostRecord,
        account_id: AccountId,
    ) -> Result<SubmittedPost, CoreError> {
        RedditClient::submit(self, post, account_id).await
    }

    async fn verify_account(&self, account_id: AccountId) -> Result<(), CoreError> {
        RedditClient::verify_account(self, account_id).await
    }
}

/// Reported after every attempt, successful or not.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub run_id: Uuid,
    pub current: usize,
    pub total: usize,
    pub post: PostRecord,
    pub succeeded: bool,
}

/// A created run that has not started submitting yet.
#[derive(Debug)]
pub struct BatchRun {
    pub run_id: Uuid,
    pub account_id: AccountId,
    posts: Vec<PostRecord>,
    cancel: CancelFlag,
}

impl BatchRun {
    pub fn posts(&self) -> &[PostRecord] {
        &self.posts
    }
}

#[derive(Clone)]
pub struct BatchOrchestrator {
    submitter: Arc<dyn PostSubmitter>,
    store: Arc<ProgressStore>,
    tick: Duration,
}

impl BatchOrchestrator {
    pub fn new(submitter: Arc<dyn PostSubmitter>, store: Arc<ProgressStore>) -> Self {
        Self {
            submitter,
            store,
            tick: CANCEL_CHECK_INTERVAL,
        }
    }

    pub fn store(&self) -> &Arc<ProgressStore> {
        &self.store
    }

    /// Filters to valid posts and creates a run. `Ok(None)` when nothing is
    /// left to submit; an unknown account fails before any run exists.
    pub async fn begin(
        &self,
        account_id: AccountId,
        posts: Vec<PostRecord>,
    ) -> Result<Option<BatchRun>, CoreError> {
        let submitted = posts.len();
        let posts: Vec<PostRecord> = posts.into_iter().filter(|p| p.is_valid).collect();
        if posts.len() < submitted {
            debug!(
                "Skipping {} invalid posts for account {}",
                submitted - posts.len(),
                account_id
            );
        }
        if posts.is_empty() {
            info!("No valid posts to submit for account {}", account_id);
            return Ok(None);
        }

        self.submitter.verify_account(account_id).await?;

        let (run_id, cancel) = self.store.create(account_id, posts.len()).await;
        Ok(Some(BatchRun {
            run_id,
            account_id,
            posts,
            cancel,
        }))
    }

    /// Submits the run's posts one at a time, in order.
    pub async fn execute<F>(
        &self,
        run: BatchRun,
        delay: DelayRange,
        mut on_progress: F,
    ) -> Result<BatchProgress, CoreError>
    where
        F: FnMut(&ProgressEvent) + Send,
    {
        let BatchRun {
            run_id,
            account_id,
            posts,
            cancel,
        } = run;
        let total = posts.len();
        info!(
            "Starting batch run {} for account {}: {} posts, delay {}-{}s",
            run_id, account_id, total, delay.from_secs, delay.up_to_secs
        );

        for (index, post) in posts.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Batch run {} cancelled before post {}", run_id, post.id);
                break;
            }

            let succeeded = match self.submitter.submit(&post, account_id).await {
                Ok(result) => {
                    self.store.record_success(run_id, post.clone(), result).await;
                    true
                }
                Err(e) => {
                    e.log_warn();
                    self.store
                        .record_failure(run_id, PostFailure::from_error(post.clone(), &e))
                        .await;
                    false
                }
            };

            on_progress(&ProgressEvent {
                run_id,
                current: index + 1,
                total,
                post,
                succeeded,
            });

            if index + 1 < total {
                let wait = delay.sample();
                debug!("Batch run {} waiting {:?} before next post", run_id, wait);
                if !self.wait_unless_cancelled(wait, &cancel).await {
                    info!("Batch run {} cancelled during delay", run_id);
                    break;
                }
            }
        }

        self.store.finish(run_id).await.ok_or_else(|| CoreError::Internal {
            message: format!("batch run {} disappeared from the progress store", run_id),
        })
    }

    /// Filters, creates and executes a run to completion.
    pub async fn run_batch<F>(
        &self,
        account_id: AccountId,
        posts: Vec<PostRecord>,
        delay: DelayRange,
        on_progress: F,
    ) -> Result<Option<BatchProgress>, CoreError>
    where
        F: FnMut(&ProgressEvent) + Send,
    {
        match self.begin(account_id, posts).await? {
            Some(run) => Ok(Some(self.execute(run, delay, on_progress).await?)),
            None => Ok(None),
        }
    }

    /// Like `run_batch`, but executes on a background task and returns the
    /// run id as soon as the run exists. If the worker panics the run is
    /// closed as `Failed`, so it never stays running.
    pub async fn spawn_batch(
        &self,
        account_id: AccountId,
        posts: Vec<PostRecord>,
        delay: DelayRange,
    ) -> Result<Option<Uuid>, CoreError> {
        let Some(run) = self.begin(account_id, posts).await? else {
            return Ok(None);
        };
        let run_id = run.run_id;

        let worker = self.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            let handle =
                tokio::spawn(async move { worker.execute(run, delay, log_progress).await });

            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    ErrorReporter::new().report_error(&e);
                    store.abort(run_id, e.user_friendly_message()).await;
                }
                Err(join_error) => {
                    let reason = match join_error.try_into_panic() {
                        Ok(payload) => panic_message(payload.as_ref()),
                        Err(_) => "worker task was cancelled".to_string(),
                    };
                    let e = CoreError::Internal {
                        message: format!("batch run {} worker stopped: {}", run_id, reason),
                    };
                    ErrorReporter::new().report_error(&e);
                    store.abort(run_id, e.to_string()).await;
                }
            }
        });

        Ok(Some(run_id))
    }

    pub async fn cancel(&self, run_id: Uuid) -> bool {
        self.store.cancel(run_id).await
    }

    pub async fn progress(&self, run_id: Uuid) -> Option<BatchProgress> {
        self.store.snapshot(run_id).await
    }

    /// Sleeps in ticks so cancellation lands within one tick. Returns
    /// `false` if cancelled.
    async fn wait_unless_cancelled(&self, total: Duration, cancel: &CancelFlag) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            if cancel.is_cancelled() {
                return false;
            }
            let step = remaining.min(self.tick);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
        if cancel.is_cancelled() {
            warn!("Cancellation arrived at the end of a delay");
            return false;
        }
        true
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}

fn log_progress(event: &ProgressEvent) {
    debug!(
        "Batch run {} progress {}/{} (post {} {})",
        event.run_id,
        event.current,
        event.total,
        event.post.id,
        if event.succeeded { "ok" } else { "failed" }
    );
}
