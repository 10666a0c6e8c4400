use crate::response::{ApiError, ApiResponse, ApiResult};
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use database::{AccountSummary, AccountUpdate, NewAccount};
use redpost_core::AccountId;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: AccountId,
    pub deleted: bool,
}

pub async fn list_accounts(State(state): State<AppState>) -> ApiResult<Vec<AccountSummary>> {
    Ok(ApiResponse(state.db.list_accounts().await?))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> ApiResult<AccountSummary> {
    summary(&state, id).await.map(ApiResponse)
}

pub async fn create_account(
    State(state): State<AppState>,
    Json(input): Json<NewAccount>,
) -> ApiResult<AccountSummary> {
    let account = state.db.create_account(input).await?;
    info!("Account {} ({}) created", account.id, account.username);
    summary(&state, account.id).await.map(ApiResponse)
}

pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    Json(update): Json<AccountUpdate>,
) -> ApiResult<AccountSummary> {
    if state.db.update_account(id, update).await?.is_none() {
        return Err(ApiError::not_found(format!("account {}", id)));
    }
    summary(&state, id).await.map(ApiResponse)
}

pub async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> ApiResult<Deleted> {
    if !state.db.delete_account(id).await? {
        return Err(ApiError::not_found(format!("account {}", id)));
    }
    info!("Account {} deleted", id);
    Ok(ApiResponse(Deleted { id, deleted: true }))
}

async fn summary(state: &AppState, id: AccountId) -> Result<AccountSummary, ApiError> {
    state
        .db
        .get_account_summary(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("account {}", id)))
}
