use crate::proxy::transport_error;
use crate::{AccountSession, RedditClient};
use redpost_core::{AccountId, CoreError, RedditApiError};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

impl RedditClient {
    /// Exchanges the account's refresh token for a fresh access token.
    pub async fn get_access_token(&self, account_id: AccountId) -> Result<String, CoreError> {
        let session = self.open_session(account_id).await?;
        self.fetch_access_token(&session).await
    }

    /// One POST to the token endpoint. No caching and no retry.
    pub async fn fetch_access_token(&self, session: &AccountSession) -> Result<String, CoreError> {
        let credentials = &session.credentials;
        let account_id = credentials.account_id;

        let invalid = |reason: &str| RedditApiError::InvalidCredentials {
            account_id,
            reason: reason.to_string(),
        };
        if credentials.client_id.trim().is_empty() {
            return Err(invalid("client id is missing").into());
        }
        if credentials.client_secret.trim().is_empty() {
            return Err(invalid("client secret is missing").into());
        }
        let Some(refresh_token) = credentials.refresh_token.as_issued() else {
            return Err(invalid("no refresh token configured; authorize the account first").into());
        };

        let url = &self.endpoints.token_url;
        info!("Requesting access token for account {}", account_id);

        let response = session
            .client_for(url)
            .post(url.clone())
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, session.proxy()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, session.proxy()))?;

        if status == StatusCode::UNAUTHORIZED {
            warn!("Token endpoint rejected credentials for account {}", account_id);
            return Err(RedditApiError::Unauthorized { raw: Some(body) }.into());
        }
        if !status.is_success() {
            error!(
                "Token endpoint returned {} for account {}",
                status, account_id
            );
            return Err(RedditApiError::ProviderError {
                status: status.as_u16(),
                raw: body,
            }
            .into());
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|_| {
            RedditApiError::UnexpectedResponseFormat { raw: body.clone() }
        })?;

        // Reddit answers a revoked refresh token with 200 and an error field
        if parsed.error.as_deref() == Some("invalid_grant") {
            warn!("Refresh token for account {} is no longer valid", account_id);
            return Err(RedditApiError::Unauthorized { raw: Some(body) }.into());
        }

        match parsed.access_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                debug!("Obtained access token for account {}", account_id);
                Ok(token)
            }
            None => Err(RedditApiError::ProviderError {
                status: status.as_u16(),
                raw: body,
            }
            .into()),
        }
    }
}
