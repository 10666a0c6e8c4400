use crate::proxy::transport_error;
use crate::{AccountSession, RedditClient};
use redpost_core::{AccountId, CoreError, FlairTemplate, RedditApiError};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlairSource {
    LinkFlairV2,
    About,
    FlairSelector,
}

impl FlairSource {
    const ORDER: [FlairSource; 3] = [
        FlairSource::LinkFlairV2,
        FlairSource::About,
        FlairSource::FlairSelector,
    ];

    fn path(&self, subreddit: &str) -> String {
        match self {
            FlairSource::LinkFlairV2 => format!("/r/{}/api/link_flair_v2", subreddit),
            FlairSource::About => format!("/r/{}/about", subreddit),
            FlairSource::FlairSelector => format!("/r/{}/api/flairselector", subreddit),
        }
    }

    fn method(&self) -> Method {
        match self {
            FlairSource::FlairSelector => Method::POST,
            _ => Method::GET,
        }
    }
}

impl RedditClient {
    /// Link flair templates for a subreddit, trying each known endpoint in turn.
    ///
    /// An empty list is a normal answer. An error is returned only when every
    /// endpoint failed at the transport or authorization level.
    pub async fn list_flairs(
        &self,
        subreddit: &str,
        account_id: AccountId,
    ) -> Result<Vec<FlairTemplate>, CoreError> {
        let subreddit = subreddit
            .trim()
            .trim_start_matches('/')
            .trim_start_matches("r/")
            .trim_end_matches('/');
        if subreddit.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "subreddit is required".to_string(),
            });
        }

        let session = self.open_session(account_id).await?;
        let access_token = self.fetch_access_token(&session).await?;

        let mut last_hard_error = None;
        let mut all_hard = true;

        for source in FlairSource::ORDER {
            match self.fetch_flairs(&session, &access_token, source, subreddit).await {
                Ok(templates) if !templates.is_empty() => {
                    info!(
                        "Found {} flairs for r/{} via {:?}",
                        templates.len(),
                        subreddit,
                        source
                    );
                    return Ok(templates);
                }
                Ok(_) => all_hard = false,
                Err(e) => last_hard_error = Some(e),
            }
        }

        match last_hard_error {
            Some(e) if all_hard => Err(e.into()),
            _ => {
                debug!("No flairs available for r/{}", subreddit);
                Ok(Vec::new())
            }
        }
    }

    /// `Err` only for hard failures; soft failures read as an empty list.
    async fn fetch_flairs(
        &self,
        session: &AccountSession,
        access_token: &str,
        source: FlairSource,
        subreddit: &str,
    ) -> Result<Vec<FlairTemplate>, RedditApiError> {
        let url = self.endpoints.api_url(&source.path(subreddit))?;
        let mut request = session
            .client_for(&url)
            .request(source.method(), url.clone())
            .bearer_auth(access_token)
            .timeout(self.flair_timeout);
        if source == FlairSource::FlairSelector {
            request = request.form(&[("is_newlink", "true")]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, session.proxy()))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let raw = response.text().await.unwrap_or_default();
            warn!("{:?} flair lookup for r/{} returned {}", source, subreddit, status);
            return Err(if status == StatusCode::UNAUTHORIZED {
                RedditApiError::Unauthorized { raw: Some(raw) }
            } else {
                RedditApiError::ProviderError {
                    status: status.as_u16(),
                    raw,
                }
            });
        }
        if !status.is_success() {
            debug!("{:?} flair lookup for r/{} returned {}", source, subreddit, status);
            return Ok(Vec::new());
        }

        match response.json::<Value>().await {
            Ok(payload) => Ok(normalize_flair_payload(&payload)),
            Err(e) => {
                debug!("{:?} flair payload for r/{} unreadable: {}", source, subreddit, e);
                Ok(Vec::new())
            }
        }
    }
}

/// Extracts templates from a bare array, a `choices` object or an
/// `about`-style `data.link_flair_templates` object.
pub fn normalize_flair_payload(payload: &Value) -> Vec<FlairTemplate> {
    let entries = match payload {
        Value::Array(items) => Some(items),
        Value::Object(_) => payload
            .get("choices")
            .and_then(Value::as_array)
            .or_else(|| {
                payload
                    .get("data")
                    .and_then(|d| d.get("link_flair_templates"))
                    .and_then(Value::as_array)
            }),
        _ => None,
    };

    entries
        .map(|items| items.iter().filter_map(normalize_template).collect())
        .unwrap_or_default()
}

fn normalize_template(entry: &Value) -> Option<FlairTemplate> {
    let text = string_field(entry, &["text", "flair_text"]);
    let id = string_field(entry, &["id", "flair_template_id"]);
    if text.is_none() && id.is_none() {
        return None;
    }

    let mut template = FlairTemplate::new(text.unwrap_or_default(), id.unwrap_or_default());
    if let Some(color) = string_field(entry, &["background_color", "backgroundColor"]) {
        template.background_color = color;
    }
    if let Some(color) = string_field(entry, &["text_color", "textColor"]) {
        template.text_color = color;
    }
    if let Some(css_class) = string_field(entry, &["css_class", "flair_css_class"]) {
        template.css_class = css_class;
    }
    template.text_editable = bool_field(entry, &["text_editable", "flair_text_editable"]);
    template.mod_only = bool_field(entry, &["mod_only", "modOnly"]);
    Some(template)
}

fn string_field(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| entry.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn bool_field(entry: &Value, keys: &[&str]) -> bool {
    keys.iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_bool))
        .unwrap_or(false)
}
