pub mod authorize;
pub mod flair;
pub mod proxy;
pub mod response;
pub mod submit;
pub mod token;

#[cfg(test)]
mod tests;

pub use authorize::{AuthorizationFlow, REQUIRED_SCOPES};
pub use flair::normalize_flair_payload;
pub use proxy::{AgentFactory, ProxyAgents};
pub use response::{normalize_submit_response, SubmitResponse};
pub use submit::{build_submit_form, validate_post_url};

use redpost_core::{
    AccountId, ConfigError, CoreError, CredentialRecord, CredentialResolver, RedditApiError,
    RedditConfig,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Base URLs the client talks to. Overridable so tests can point at a mock.
#[derive(Debug, Clone)]
pub struct RedditEndpoints {
    pub token_url: Url,
    pub api_base: Url,
}

impl RedditEndpoints {
    pub fn from_config(config: &RedditConfig) -> Result<Self, ConfigError> {
        let parse = |field: &str, value: &str| {
            Url::parse(value).map_err(|_| ConfigError::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
            })
        };

        Ok(Self {
            token_url: parse("reddit.token_url", &config.token_url)?,
            api_base: parse("reddit.api_base", &config.api_base)?,
        })
    }

    /// Joins an absolute API path (`/api/submit`) onto the base URL.
    pub fn api_url(&self, path: &str) -> Result<Url, RedditApiError> {
        let base = self.api_base.as_str().trim_end_matches('/');
        let joined = format!("{}/{}", base, path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|_| RedditApiError::InvalidUrl { url: joined })
    }
}

/// Credentials and transport resolved for one operation on one account.
#[derive(Debug, Clone)]
pub struct AccountSession {
    pub credentials: CredentialRecord,
    agents: Option<ProxyAgents>,
    direct: Client,
}

impl AccountSession {
    /// Client for `url`: the proxied agent matching its scheme, or the direct client.
    pub fn client_for(&self, url: &Url) -> &Client {
        match &self.agents {
            Some(agents) => agents.for_url(url),
            None => &self.direct,
        }
    }

    pub fn proxy(&self) -> Option<&redpost_core::ProxyDescriptor> {
        self.credentials.proxy.as_ref()
    }

    pub fn agents(&self) -> Option<&ProxyAgents> {
        self.agents.as_ref()
    }
}

/// Per-account Reddit pipeline: token exchange, submission and flair lookup.
///
/// Holds no per-account state of its own beyond the shared proxy agent
/// cache; credentials are resolved again for every operation.
#[derive(Clone)]
pub struct RedditClient {
    resolver: Arc<dyn CredentialResolver>,
    agents: Arc<AgentFactory>,
    endpoints: RedditEndpoints,
    request_timeout: Duration,
    flair_timeout: Duration,
    config: RedditConfig,
}

impl RedditClient {
    pub fn new(
        resolver: Arc<dyn CredentialResolver>,
        config: &RedditConfig,
    ) -> Result<Self, CoreError> {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let agents = AgentFactory::new(
            config.user_agent.clone(),
            Duration::from_secs(config.connect_timeout_secs),
            request_timeout,
        )?;

        Ok(Self {
            resolver,
            agents: Arc::new(agents),
            endpoints: RedditEndpoints::from_config(config)?,
            request_timeout,
            flair_timeout: Duration::from_secs(config.flair_timeout_secs),
            config: config.clone(),
        })
    }

    pub fn endpoints(&self) -> &RedditEndpoints {
        &self.endpoints
    }

    pub fn agent_factory(&self) -> &Arc<AgentFactory> {
        &self.agents
    }

    /// Resolves the account and its proxy agents. Fails with
    /// `AccountNotFound` before any network traffic.
    pub async fn open_session(&self, account_id: AccountId) -> Result<AccountSession, CoreError> {
        let credentials = self
            .resolver
            .resolve(account_id)
            .await?
            .ok_or(RedditApiError::AccountNotFound { account_id })?;

        let agents = self.agents.agents_for(&credentials)?;
        debug!(
            "Opened session for account {} ({})",
            account_id,
            match credentials.proxy.as_ref() {
                Some(proxy) => format!("via {} proxy {}", proxy.kind, proxy.endpoint()),
                None => "direct".to_string(),
            }
        );

        Ok(AccountSession {
            credentials,
            agents,
            direct: self.agents.direct().clone(),
        })
    }

    /// Checks the account exists without touching the network.
    pub async fn verify_account(&self, account_id: AccountId) -> Result<(), CoreError> {
        match self.resolver.resolve(account_id).await? {
            Some(_) => Ok(()),
            None => Err(RedditApiError::AccountNotFound { account_id }.into()),
        }
    }
}
