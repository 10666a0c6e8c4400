//! Browser side of the OAuth2 grant: hand out the authorize URL, then
//! finish the exchange when Reddit redirects back.

use crate::response::{ApiError, ApiResponse, ApiResult};
use crate::{AppState, PendingAuthorization};
use axum::extract::{Path, RawQuery, State};
use reddit_client::AuthorizationFlow;
use redpost_core::{AccountId, RedditApiError};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct AuthorizationStart {
    pub account_id: AccountId,
    pub authorize_url: String,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorizationDone {
    pub account_id: AccountId,
    pub authorized: bool,
}

pub async fn start_authorization(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> ApiResult<AuthorizationStart> {
    let flow = state.reddit.authorization_flow(account_id).await?;
    let (authorize_url, csrf) = flow.authorize_url();
    let secret = csrf.secret().clone();

    state
        .pending
        .insert(
            secret.clone(),
            PendingAuthorization {
                account_id,
                state: csrf,
                flow,
            },
        )
        .await;
    info!("Authorization started for account {}", account_id);

    Ok(ApiResponse(AuthorizationStart {
        account_id,
        authorize_url,
        state: secret,
    }))
}

/// Each pending state is consumed by the first callback that presents it
/// and expires if no callback arrives in time.
pub async fn authorization_callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> ApiResult<AuthorizationDone> {
    let query = query.unwrap_or_default();
    let callback_url = format!("{}?{}", state.redirect_uri, query);

    let returned_state = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned());
    let pending = match returned_state {
        Some(returned) => state.pending.take(&returned).await,
        None => None,
    };
    let Some(pending) = pending else {
        // Surface a provider-side denial even when the state is unusable
        let reason = url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "error")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_else(|| "Unknown or expired authorization state".to_string());
        return Err(RedditApiError::AuthenticationFailed { reason }.into());
    };

    let code = AuthorizationFlow::extract_code(&callback_url, &pending.state)?;
    let refresh_token = pending.flow.exchange_code(&code).await?;

    if !state.db.set_refresh_token(pending.account_id, &refresh_token).await? {
        return Err(ApiError::not_found(format!("account {}", pending.account_id)));
    }
    info!("Account {} authorized", pending.account_id);

    Ok(ApiResponse(AuthorizationDone {
        account_id: pending.account_id,
        authorized: true,
    }))
}
