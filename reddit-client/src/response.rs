//! Normalization of `/api/submit` responses.
//!
//! Reddit answers the same logical outcome in two envelopes: the structured
//! `{"json": {"errors", "data"}}` form requested with `api_type=json`, and
//! the older `{"success", "jquery"}` instruction list. Bodies are parsed into
//! [`SubmitResponse`] first and only then interpreted, so an unknown shape is
//! always reported instead of being mistaken for success.

use redpost_core::{RedditApiError, SubmittedPost};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

const REDDIT_WEB_BASE: &str = "https://www.reddit.com";
const LINK_KIND_PREFIX: &str = "t3_";
const GENERIC_REJECTION: &str =
    "Submission rejected by Reddit, possibly due to account restrictions";
const ERROR_MARKERS: &[&str] = &[
    "error",
    "allowed",
    "doesn't exist",
    "does not exist",
    "try again",
    "too much",
    "already",
    "banned",
    "restricted",
    "invalid",
];

#[derive(Debug, Clone, Deserialize)]
pub struct StructuredBody {
    pub json: StructuredJson,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructuredJson {
    #[serde(default)]
    pub errors: Vec<Vec<Value>>,
    pub data: Option<StructuredData>,
    pub ratelimit: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructuredData {
    pub id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub permalink: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyEnvelope {
    pub success: bool,
    #[serde(default)]
    pub jquery: Vec<Vec<Value>>,
}

#[derive(Debug, Clone)]
pub enum SubmitResponse {
    Structured(StructuredJson),
    Legacy(LegacyEnvelope),
}

impl SubmitResponse {
    /// Tries the structured envelope, then the legacy one.
    pub fn parse(body: &str) -> Result<Self, RedditApiError> {
        let unexpected = || RedditApiError::UnexpectedResponseFormat {
            raw: body.to_string(),
        };
        let value: Value = serde_json::from_str(body).map_err(|_| unexpected())?;

        if let Ok(structured) = serde_json::from_value::<StructuredBody>(value.clone()) {
            debug!("Submit response parsed as structured envelope");
            return Ok(SubmitResponse::Structured(structured.json));
        }
        if let Ok(legacy) = serde_json::from_value::<LegacyEnvelope>(value) {
            debug!("Submit response parsed as legacy jquery envelope");
            return Ok(SubmitResponse::Legacy(legacy));
        }

        warn!("Submit response matched no known shape");
        Err(unexpected())
    }

    pub fn into_result(self, raw: &str) -> Result<SubmittedPost, RedditApiError> {
        match self {
            SubmitResponse::Structured(json) => structured_outcome(json, raw),
            SubmitResponse::Legacy(envelope) => legacy_outcome(envelope, raw),
        }
    }
}

pub fn normalize_submit_response(body: &str) -> Result<SubmittedPost, RedditApiError> {
    SubmitResponse::parse(body)?.into_result(body)
}

fn structured_outcome(json: StructuredJson, raw: &str) -> Result<SubmittedPost, RedditApiError> {
    if let Some(first) = json.errors.first() {
        let code = first.first().and_then(Value::as_str).unwrap_or_default();
        let message = first.get(1).and_then(Value::as_str).unwrap_or_default();
        return Err(classify_rejection(code, message, raw));
    }

    if let Some(data) = json.data {
        let url = data
            .permalink
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(absolute_permalink)
            .or(data.url.clone());
        let id = data
            .id
            .filter(|id| !id.is_empty())
            .or_else(|| url.as_deref().and_then(post_id_from_url));

        return match (id, url) {
            (Some(post_id), Some(url)) => Ok(SubmittedPost {
                fullname: data
                    .name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| format!("{}{}", LINK_KIND_PREFIX, post_id)),
                post_id,
                url,
            }),
            _ => Err(RedditApiError::UnexpectedResponseFormat {
                raw: raw.to_string(),
            }),
        };
    }

    if let Some(seconds) = json.ratelimit {
        let retry_after = seconds.max(0.0).ceil() as u64;
        return Err(RedditApiError::RateLimited {
            retry_after: Some(retry_after),
            message: format!(
                "Reddit rate limit reached. Try again in {} seconds",
                retry_after
            ),
            raw: Some(raw.to_string()),
        });
    }

    Err(RedditApiError::ProviderRejected {
        code: None,
        message: GENERIC_REJECTION.to_string(),
        raw: Some(raw.to_string()),
    })
}

fn legacy_outcome(envelope: LegacyEnvelope, raw: &str) -> Result<SubmittedPost, RedditApiError> {
    if envelope.success {
        let Some(url) = find_redirect(&envelope.jquery) else {
            return Err(RedditApiError::UnexpectedResponseFormat {
                raw: raw.to_string(),
            });
        };
        let Some(post_id) = post_id_from_url(&url) else {
            return Err(RedditApiError::UnexpectedResponseFormat {
                raw: raw.to_string(),
            });
        };
        return Ok(SubmittedPost {
            fullname: format!("{}{}", LINK_KIND_PREFIX, post_id),
            post_id,
            url: absolute_permalink(&url),
        });
    }

    let strings: Vec<&str> = envelope.jquery.iter().flat_map(|entry| call_strings(entry)).collect();

    // Selectors look like ".error.SUBREDDIT_NOEXIST.field-sr"
    let code = strings
        .iter()
        .find_map(|s| s.strip_prefix(".error."))
        .and_then(|rest| rest.split('.').next())
        .filter(|c| !c.is_empty());

    let text = strings.iter().copied().find(|s| looks_like_error(s));

    match (code, text) {
        (Some(code), Some(text)) if code == "RATELIMIT" => Err(classify_rejection(code, text, raw)),
        (_, Some(text)) => Err(RedditApiError::ProviderRejected {
            code: code.map(str::to_string),
            message: text.to_string(),
            raw: Some(raw.to_string()),
        }),
        (Some(code), None) => Err(classify_rejection(code, "", raw)),
        (None, None) => Err(RedditApiError::ProviderRejected {
            code: None,
            message: GENERIC_REJECTION.to_string(),
            raw: Some(raw.to_string()),
        }),
    }
}

/// Maps a Reddit error code to an actionable error.
pub fn classify_rejection(code: &str, message: &str, raw: &str) -> RedditApiError {
    let raw = Some(raw.to_string());
    let known = match code {
        "SUBREDDIT_NOTALLOWED" => Some("This account is not allowed to post in that subreddit"),
        "SUBREDDIT_NOEXIST" => Some("That subreddit does not exist"),
        "ALREADY_SUB" => Some("That link has already been submitted to this subreddit"),
        "RATELIMIT" => {
            let retry_after = parse_retry_after(message);
            let message = match retry_after {
                Some(seconds) => format!(
                    "Reddit rate limit reached. Try again in {} seconds",
                    seconds
                ),
                None if !message.is_empty() => format!("Reddit rate limit reached: {}", message),
                None => "Reddit rate limit reached. Wait before posting again".to_string(),
            };
            return RedditApiError::RateLimited {
                retry_after,
                message,
                raw,
            };
        }
        _ => None,
    };

    let message = match known {
        Some(known) => known.to_string(),
        None if !message.is_empty() => message.to_string(),
        None if !code.is_empty() => format!("Reddit rejected the submission ({})", code),
        None => GENERIC_REJECTION.to_string(),
    };

    RedditApiError::ProviderRejected {
        code: Some(code.to_string()).filter(|c| !c.is_empty()),
        message,
        raw,
    }
}

/// Reads "try again in 9 minutes" style hints into seconds.
pub fn parse_retry_after(message: &str) -> Option<u64> {
    let lower = message.to_ascii_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    words.windows(2).find_map(|pair| {
        let amount: u64 = pair[0].parse().ok()?;
        let unit = pair[1];
        if unit.starts_with("hour") {
            Some(amount.saturating_mul(3600))
        } else if unit.starts_with("minute") {
            Some(amount.saturating_mul(60))
        } else if unit.starts_with("second") {
            Some(amount)
        } else if unit.starts_with("millisecond") {
            Some(amount.div_ceil(1000))
        } else {
            None
        }
    })
}

fn find_redirect(entries: &[Vec<Value>]) -> Option<String> {
    let mut after_redirect = false;
    let mut fallback = None;

    for entry in entries {
        let op = entry.get(2).and_then(Value::as_str);
        if op == Some("attr") && entry.get(3).and_then(Value::as_str) == Some("redirect") {
            after_redirect = true;
            continue;
        }
        if let Some(url) = call_strings(entry).into_iter().find(|s| s.contains("/comments/")) {
            if after_redirect {
                return Some(url.to_string());
            }
            fallback.get_or_insert_with(|| url.to_string());
        }
    }

    fallback
}

/// String arguments of a `call` instruction.
fn call_strings(entry: &[Value]) -> Vec<&str> {
    if entry.get(2).and_then(Value::as_str) != Some("call") {
        return Vec::new();
    }
    match entry.get(3) {
        Some(Value::Array(args)) => args.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(arg)) => vec![arg.as_str()],
        _ => Vec::new(),
    }
}

fn looks_like_error(text: &str) -> bool {
    if text.len() <= 10 || text.starts_with('.') {
        return false;
    }
    let lower = text.to_ascii_lowercase();
    ERROR_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn post_id_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/comments/")?;
    let id = rest.split(['/', '?', '#']).next()?;
    (!id.is_empty()).then(|| id.to_string())
}

fn absolute_permalink(permalink: &str) -> String {
    if permalink.starts_with("http://") || permalink.starts_with("https://") {
        permalink.to_string()
    } else {
        format!("{}/{}", REDDIT_WEB_BASE, permalink.trim_start_matches('/'))
    }
}
