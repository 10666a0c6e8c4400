use redpost_core::{
    AccountId, CoreError, CredentialRecord, ProxyDescriptor, ProxyKind, RedditApiError,
};
use reqwest::{Client, ClientBuilder, Proxy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const TCP_KEEPALIVE: Duration = Duration::from_secs(60);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AgentKey {
    account_id: AccountId,
    kind: ProxyKind,
    host: String,
    port: u16,
}

impl AgentKey {
    fn new(account_id: AccountId, proxy: &ProxyDescriptor) -> Self {
        Self {
            account_id,
            kind: proxy.kind,
            host: proxy.host.clone(),
            port: proxy.port,
        }
    }
}

/// Transport clients routed through one account's proxy.
///
/// HTTP proxies need separate clients for plain and TLS upstreams; a SOCKS5
/// tunnel serves both, so `plain` and `secure` point at the same client.
#[derive(Debug, Clone)]
pub struct ProxyAgents {
    plain: Arc<Client>,
    secure: Arc<Client>,
    proxy: ProxyDescriptor,
}

impl ProxyAgents {
    pub fn plain(&self) -> &Arc<Client> {
        &self.plain
    }

    pub fn secure(&self) -> &Arc<Client> {
        &self.secure
    }

    pub fn proxy(&self) -> &ProxyDescriptor {
        &self.proxy
    }

    pub fn for_url(&self, url: &Url) -> &Client {
        if url.scheme() == "https" {
            &self.secure
        } else {
            &self.plain
        }
    }

    /// True when both handles are the very same cached instances.
    pub fn same_instances(&self, other: &ProxyAgents) -> bool {
        Arc::ptr_eq(&self.plain, &other.plain) && Arc::ptr_eq(&self.secure, &other.secure)
    }

    pub fn shares_single_agent(&self) -> bool {
        Arc::ptr_eq(&self.plain, &self.secure)
    }
}

/// Builds and caches per-account proxy clients for the process lifetime.
///
/// Entries are keyed by (account, proxy kind, host, port) and never evicted.
/// Changed proxy credentials under an unchanged key keep using the cached
/// clients until restart.
#[derive(Debug)]
pub struct AgentFactory {
    cache: Mutex<HashMap<AgentKey, ProxyAgents>>,
    direct: Client,
    user_agent: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl AgentFactory {
    pub fn new(
        user_agent: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, CoreError> {
        let user_agent = user_agent.into();
        let direct = base_builder(&user_agent, connect_timeout, request_timeout).build()?;

        Ok(Self {
            cache: Mutex::new(HashMap::new()),
            direct,
            user_agent,
            connect_timeout,
            request_timeout,
        })
    }

    /// Client used when an account has no proxy.
    pub fn direct(&self) -> &Client {
        &self.direct
    }

    pub fn agents_for(
        &self,
        credentials: &CredentialRecord,
    ) -> Result<Option<ProxyAgents>, CoreError> {
        let Some(proxy) = &credentials.proxy else {
            return Ok(None);
        };

        let key = AgentKey::new(credentials.account_id, proxy);
        let mut cache = self.cache.lock().map_err(|_| CoreError::Internal {
            message: "proxy agent cache lock poisoned".to_string(),
        })?;

        if let Some(agents) = cache.get(&key) {
            debug!(
                "Reusing {} proxy agents for account {} via {}",
                proxy.kind,
                credentials.account_id,
                proxy.endpoint()
            );
            return Ok(Some(agents.clone()));
        }

        let agents = self.build_agents(proxy)?;
        info!(
            "Created {} proxy agents for account {} via {}",
            proxy.kind,
            credentials.account_id,
            proxy.endpoint()
        );
        cache.insert(key, agents.clone());
        Ok(Some(agents))
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    fn build_agents(&self, proxy: &ProxyDescriptor) -> Result<ProxyAgents, CoreError> {
        let proxy_url = proxy.proxy_url()?;

        let (plain, secure) = match proxy.kind {
            ProxyKind::Socks5 => {
                let client = Arc::new(
                    self.builder()
                        .proxy(Proxy::all(proxy_url.as_str())?)
                        .build()?,
                );
                (client.clone(), client)
            }
            ProxyKind::Http => {
                let plain = self
                    .builder()
                    .proxy(Proxy::http(proxy_url.as_str())?)
                    .build()?;
                let secure = self
                    .builder()
                    .proxy(Proxy::https(proxy_url.as_str())?)
                    .build()?;
                (Arc::new(plain), Arc::new(secure))
            }
        };

        Ok(ProxyAgents {
            plain,
            secure,
            proxy: proxy.clone(),
        })
    }

    fn builder(&self) -> ClientBuilder {
        base_builder(&self.user_agent, self.connect_timeout, self.request_timeout)
    }
}

fn base_builder(
    user_agent: &str,
    connect_timeout: Duration,
    request_timeout: Duration,
) -> ClientBuilder {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .tcp_keepalive(Some(TCP_KEEPALIVE))
        .pool_idle_timeout(Some(POOL_IDLE_TIMEOUT))
}

/// Maps a transport failure onto the pipeline taxonomy. Connection and
/// timeout failures with a proxy configured are blamed on the proxy.
pub(crate) fn transport_error(
    error: reqwest::Error,
    proxy: Option<&ProxyDescriptor>,
) -> RedditApiError {
    match proxy {
        Some(proxy) if error.is_connect() || error.is_timeout() => {
            warn!("Proxy {} failed: {}", proxy.endpoint(), error);
            RedditApiError::ProxyConnectionFailed {
                endpoint: proxy.endpoint(),
                reason: error.to_string(),
            }
        }
        _ if error.is_timeout() => RedditApiError::RequestTimeout,
        _ => {
            warn!("Network error: {}", error);
            RedditApiError::Network {
                reason: error.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redpost_core::RefreshToken;

    fn factory() -> AgentFactory {
        AgentFactory::new("redpost-test/1.0", Duration::from_secs(30), Duration::from_secs(30))
            .unwrap()
    }

    fn credentials(account_id: AccountId, proxy: Option<ProxyDescriptor>) -> CredentialRecord {
        CredentialRecord {
            account_id,
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: RefreshToken::Issued("refresh".to_string()),
            proxy,
        }
    }

    #[test]
    fn test_no_proxy_yields_no_agents() {
        let factory = factory();
        let agents = factory.agents_for(&credentials(1, None)).unwrap();
        assert!(agents.is_none());
        assert_eq!(factory.cached_entries(), 0);
    }

    #[test]
    fn test_cache_hit_returns_same_instances() {
        let factory = factory();
        let proxy = ProxyDescriptor::new(ProxyKind::Http, "10.0.0.5", 8080);

        let first = factory
            .agents_for(&credentials(1, Some(proxy.clone())))
            .unwrap()
            .unwrap();
        let second = factory
            .agents_for(&credentials(1, Some(proxy)))
            .unwrap()
            .unwrap();

        assert!(first.same_instances(&second));
        assert_eq!(factory.cached_entries(), 1);
    }

    #[test]
    fn test_different_port_builds_new_agents() {
        let factory = factory();
        let a = factory
            .agents_for(&credentials(
                1,
                Some(ProxyDescriptor::new(ProxyKind::Http, "10.0.0.5", 8080)),
            ))
            .unwrap()
            .unwrap();
        let b = factory
            .agents_for(&credentials(
                1,
                Some(ProxyDescriptor::new(ProxyKind::Http, "10.0.0.5", 8081)),
            ))
            .unwrap()
            .unwrap();

        assert!(!a.same_instances(&b));
        assert_eq!(factory.cached_entries(), 2);
    }

    #[test]
    fn test_cache_is_per_account() {
        let factory = factory();
        let proxy = ProxyDescriptor::new(ProxyKind::Http, "10.0.0.5", 8080);
        let a = factory
            .agents_for(&credentials(1, Some(proxy.clone())))
            .unwrap()
            .unwrap();
        let b = factory
            .agents_for(&credentials(2, Some(proxy)))
            .unwrap()
            .unwrap();
        assert!(!a.same_instances(&b));
    }

    #[test]
    fn test_http_proxy_uses_two_agents() {
        let factory = factory();
        let agents = factory
            .agents_for(&credentials(
                1,
                Some(ProxyDescriptor::new(ProxyKind::Http, "10.0.0.5", 8080).with_auth("u", "p")),
            ))
            .unwrap()
            .unwrap();
        assert!(!agents.shares_single_agent());
    }

    #[test]
    fn test_socks5_proxy_shares_one_agent() {
        let factory = factory();
        let agents = factory
            .agents_for(&credentials(
                1,
                Some(ProxyDescriptor::new(ProxyKind::Socks5, "10.0.0.6", 1080)),
            ))
            .unwrap()
            .unwrap();
        assert!(agents.shares_single_agent());

        let https = Url::parse("https://oauth.reddit.com/api/submit").unwrap();
        let http = Url::parse("http://oauth.reddit.com/api/submit").unwrap();
        assert!(std::ptr::eq(agents.for_url(&https), agents.for_url(&http)));
    }

    #[test]
    fn test_agent_selection_by_scheme() {
        let factory = factory();
        let agents = factory
            .agents_for(&credentials(
                3,
                Some(ProxyDescriptor::new(ProxyKind::Http, "10.0.0.5", 8080)),
            ))
            .unwrap()
            .unwrap();

        let https = Url::parse("https://www.reddit.com/api/v1/access_token").unwrap();
        let http = Url::parse("http://127.0.0.1:9000/api/v1/access_token").unwrap();
        assert!(std::ptr::eq(agents.for_url(&https), agents.secure().as_ref()));
        assert!(std::ptr::eq(agents.for_url(&http), agents.plain().as_ref()));
    }
}
