use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

pub type AccountId = i64;

/// Value older account rows carry in place of a real refresh token.
const REFRESH_TOKEN_PLACEHOLDER: &str = "YOUR_REFRESH_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    Http,
    Socks5,
}

impl ProxyKind {
    pub fn scheme(&self) -> &'static str {
        match self {
            ProxyKind::Http => "http",
            ProxyKind::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for ProxyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyKind::Http),
            "socks5" => Ok(ProxyKind::Socks5),
            other => Err(ConfigError::InvalidValue {
                field: "proxy_type".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDescriptor {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyDescriptor {
    pub fn new(kind: ProxyKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            kind,
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// `host:port`, used in diagnostics.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Proxy URL with optional credentials embedded as userinfo.
    pub fn proxy_url(&self) -> Result<Url, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            field: "proxy".to_string(),
            value: format!("{}://{}", self.kind, self.endpoint()),
        };

        let mut url = Url::parse(&format!("{}://{}", self.kind.scheme(), self.endpoint()))
            .map_err(|_| invalid())?;

        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            url.set_username(username).map_err(|_| invalid())?;
            url.set_password(self.password.as_deref()).map_err(|_| invalid())?;
        }

        Ok(url)
    }
}

impl fmt::Debug for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyDescriptor")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum RefreshToken {
    Unconfigured,
    Issued(String),
}

impl RefreshToken {
    /// Maps a stored column value onto the explicit token state. Missing,
    /// blank and placeholder values all mean the account was never authorized.
    pub fn from_stored(value: Option<String>) -> Self {
        match value {
            Some(token)
                if !token.trim().is_empty() && token.trim() != REFRESH_TOKEN_PLACEHOLDER =>
            {
                RefreshToken::Issued(token)
            }
            _ => RefreshToken::Unconfigured,
        }
    }

    pub fn as_issued(&self) -> Option<&str> {
        match self {
            RefreshToken::Issued(token) => Some(token),
            RefreshToken::Unconfigured => None,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, RefreshToken::Issued(_))
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshToken::Unconfigured => f.write_str("Unconfigured"),
            RefreshToken::Issued(_) => f.write_str("Issued(***)"),
        }
    }
}

/// What the pipeline needs to act on behalf of one account.
#[derive(Clone)]
pub struct CredentialRecord {
    pub account_id: AccountId,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: RefreshToken,
    pub proxy: Option<ProxyDescriptor>,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("account_id", &self.account_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("refresh_token", &self.refresh_token)
            .field("proxy", &self.proxy)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Link,
    #[serde(rename = "self")]
    SelfPost,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Link => "link",
            PostKind::SelfPost => "self",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlairSelector {
    Id(String),
    Text(String),
}

/// One post parsed from an upload. `id` is only meaningful within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: u32,
    pub subreddit: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub flair_id: Option<String>,
    #[serde(default)]
    pub flair_text: Option<String>,
    pub is_valid: bool,
    #[serde(default)]
    pub has_url: bool,
    #[serde(default)]
    pub has_subreddit: bool,
    #[serde(default)]
    pub has_title: bool,
}

impl PostRecord {
    pub fn new(
        id: u32,
        subreddit: impl Into<String>,
        title: impl Into<String>,
        url: Option<String>,
        flair_id: Option<String>,
        flair_text: Option<String>,
    ) -> Self {
        let subreddit = subreddit.into().trim().to_string();
        let title = title.into().trim().to_string();
        let url = non_blank(url);
        let has_subreddit = !subreddit.is_empty();
        let has_title = !title.is_empty();

        Self {
            id,
            has_url: url.is_some(),
            url,
            flair_id: non_blank(flair_id),
            flair_text: non_blank(flair_text),
            is_valid: has_subreddit && has_title,
            has_subreddit,
            has_title,
            subreddit,
            title,
        }
    }

    pub fn kind(&self) -> PostKind {
        if self.url.is_some() {
            PostKind::Link
        } else {
            PostKind::SelfPost
        }
    }

    /// Flair id wins over flair text; at most one selector is ever sent.
    pub fn flair_selector(&self) -> Option<FlairSelector> {
        match (&self.flair_id, &self.flair_text) {
            (Some(id), _) => Some(FlairSelector::Id(id.clone())),
            (None, Some(text)) => Some(FlairSelector::Text(text.clone())),
            (None, None) => None,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedPost {
    pub post_id: String,
    pub fullname: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlairTemplate {
    pub text: String,
    pub id: String,
    pub background_color: String,
    pub text_color: String,
    pub css_class: String,
    pub text_editable: bool,
    pub mod_only: bool,
}

impl FlairTemplate {
    pub const DEFAULT_BACKGROUND_COLOR: &'static str = "transparent";
    pub const DEFAULT_TEXT_COLOR: &'static str = "dark";

    pub fn new(text: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            id: id.into(),
            background_color: Self::DEFAULT_BACKGROUND_COLOR.to_string(),
            text_color: Self::DEFAULT_TEXT_COLOR.to_string(),
            css_class: String::new(),
            text_editable: false,
            mod_only: false,
        }
    }
}
