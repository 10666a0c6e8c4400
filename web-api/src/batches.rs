use crate::response::{ApiError, ApiResponse, ApiResult};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use batch_service::{BatchProgress, DelayRange};
use redpost_core::{parse_posts_file, AccountId, FlairTemplate, PostRecord};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ParsedPosts {
    pub total: usize,
    pub valid: usize,
    pub posts: Vec<PostRecord>,
}

pub async fn parse_posts(body: Bytes) -> ApiResponse<ParsedPosts> {
    let posts = parse_posts_file(&body);
    ApiResponse(ParsedPosts {
        total: posts.len(),
        valid: posts.iter().filter(|p| p.is_valid).count(),
        posts,
    })
}

/// A post as sent by the client. Validity flags, if present, are ignored
/// and recomputed.
#[derive(Debug, Deserialize)]
pub struct PostInput {
    pub id: u32,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub flair_id: Option<String>,
    #[serde(default)]
    pub flair_text: Option<String>,
}

impl From<PostInput> for PostRecord {
    fn from(p: PostInput) -> Self {
        PostRecord::new(p.id, p.subreddit, p.title, p.url, p.flair_id, p.flair_text)
    }
}

#[derive(Debug, Deserialize)]
pub struct StartBatchRequest {
    pub account_id: AccountId,
    pub posts: Vec<PostInput>,
    #[serde(default)]
    pub delay_from_secs: Option<u64>,
    #[serde(default)]
    pub delay_up_to_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct BatchStarted {
    pub run_id: Option<Uuid>,
}

pub async fn start_batch(
    State(state): State<AppState>,
    Json(request): Json<StartBatchRequest>,
) -> ApiResult<BatchStarted> {
    let delay = DelayRange::new(
        request
            .delay_from_secs
            .unwrap_or(state.batch.default_delay_from_secs),
        request
            .delay_up_to_secs
            .unwrap_or(state.batch.default_delay_up_to_secs),
    )?;

    let posts = request.posts.into_iter().map(PostRecord::from).collect();

    let run_id = state
        .orchestrator
        .spawn_batch(request.account_id, posts, delay)
        .await?;
    match run_id {
        Some(run_id) => info!("Batch run {} started for account {}", run_id, request.account_id),
        None => info!("Nothing to submit for account {}", request.account_id),
    }

    Ok(ApiResponse(BatchStarted { run_id }))
}

pub async fn batch_progress(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<BatchProgress> {
    state
        .orchestrator
        .progress(run_id)
        .await
        .map(ApiResponse)
        .ok_or_else(|| ApiError::not_found(format!("batch run {}", run_id)))
}

#[derive(Debug, Serialize)]
pub struct CancelOutcome {
    pub run_id: Uuid,
    pub cancelled: bool,
}

/// `cancelled` is false when the run had already finished.
pub async fn cancel_batch(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<CancelOutcome> {
    if state.orchestrator.progress(run_id).await.is_none() {
        return Err(ApiError::not_found(format!("batch run {}", run_id)));
    }
    let cancelled = state.orchestrator.cancel(run_id).await;
    Ok(ApiResponse(CancelOutcome { run_id, cancelled }))
}

#[derive(Debug, Deserialize)]
pub struct FlairQuery {
    pub subreddit: String,
    pub account_id: AccountId,
}

pub async fn list_flairs(
    State(state): State<AppState>,
    Query(query): Query<FlairQuery>,
) -> ApiResult<Vec<FlairTemplate>> {
    let flairs = state
        .reddit
        .list_flairs(&query.subreddit, query.account_id)
        .await?;
    Ok(ApiResponse(flairs))
}
