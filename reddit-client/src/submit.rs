use crate::proxy::transport_error;
use crate::response::normalize_submit_response;
use crate::RedditClient;
use redpost_core::{AccountId, CoreError, FlairSelector, PostRecord, RedditApiError, SubmittedPost};
use reqwest::StatusCode;
use tracing::{error, info, warn};
use url::Url;

/// Accepts only absolute URLs that carry both a scheme and a host.
pub fn validate_post_url(raw: &str) -> Result<Url, RedditApiError> {
    let invalid = || RedditApiError::InvalidUrl {
        url: raw.to_string(),
    };
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(invalid()),
    }
}

/// Form body for `/api/submit`. At most one flair selector is included.
pub fn build_submit_form(post: &PostRecord) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("api_type", "json".to_string()),
        ("sr", post.subreddit.clone()),
        ("title", post.title.clone()),
        ("kind", post.kind().as_str().to_string()),
    ];
    if let Some(url) = &post.url {
        form.push(("url", url.trim().to_string()));
    }
    match post.flair_selector() {
        Some(FlairSelector::Id(id)) => form.push(("flair_id", id)),
        Some(FlairSelector::Text(text)) => form.push(("flair_text", text)),
        None => {}
    }
    form
}

impl RedditClient {
    /// Submits one post with a freshly exchanged access token.
    pub async fn submit(
        &self,
        post: &PostRecord,
        account_id: AccountId,
    ) -> Result<SubmittedPost, CoreError> {
        let session = self.open_session(account_id).await?;

        if let Some(raw_url) = &post.url {
            validate_post_url(raw_url)?;
        }

        let access_token = self.fetch_access_token(&session).await?;
        let url = self.endpoints.api_url("/api/submit")?;

        info!(
            "Submitting post {} to r/{} for account {}",
            post.id, post.subreddit, account_id
        );

        let response = session
            .client_for(&url)
            .post(url.clone())
            .bearer_auth(&access_token)
            .form(&build_submit_form(post))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, session.proxy()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, session.proxy()))?;

        match status {
            StatusCode::UNAUTHORIZED => {
                warn!("Submit rejected access token for account {}", account_id);
                return Err(RedditApiError::Unauthorized { raw: Some(body) }.into());
            }
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Rate limited on submit, retry after {:?} seconds", retry_after);
                return Err(RedditApiError::RateLimited {
                    retry_after,
                    message: match retry_after {
                        Some(seconds) => format!(
                            "Reddit rate limit reached. Try again in {} seconds",
                            seconds
                        ),
                        None => "Reddit rate limit reached. Wait before posting again".to_string(),
                    },
                    raw: Some(body),
                }
                .into());
            }
            status if !status.is_success() => {
                error!("Submit failed with status {} for post {}", status, post.id);
                return Err(RedditApiError::ProviderError {
                    status: status.as_u16(),
                    raw: body,
                }
                .into());
            }
            _ => {}
        }

        match normalize_submit_response(&body) {
            Ok(submitted) => {
                info!(
                    "Post {} submitted as {} ({})",
                    post.id, submitted.fullname, submitted.url
                );
                Ok(submitted)
            }
            Err(e) => {
                warn!("Post {} rejected: {}", post.id, e);
                Err(e.into())
            }
        }
    }
}
