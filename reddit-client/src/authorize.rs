//! OAuth2 authorization-code flow used to obtain an account's refresh token.

use crate::proxy::transport_error;
use crate::RedditClient;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, HttpRequest, HttpResponse,
    RedirectUrl, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use redpost_core::{
    AccountId, ConfigError, CoreError, ProxyDescriptor, RedditApiError, RedditConfig,
};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

pub const REQUIRED_SCOPES: &[&str] = &["identity", "submit", "flair", "read"];

pub struct AuthorizationFlow {
    oauth_client: BasicClient,
    http_client: Client,
    proxy: Option<ProxyDescriptor>,
}

impl AuthorizationFlow {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        config: &RedditConfig,
        http_client: Client,
    ) -> Result<Self, ConfigError> {
        let invalid = |field: &str, value: &str| ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        };

        let auth_url = AuthUrl::new(config.authorize_url.clone())
            .map_err(|_| invalid("reddit.authorize_url", &config.authorize_url))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|_| invalid("reddit.token_url", &config.token_url))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|_| invalid("reddit.redirect_uri", &config.redirect_uri))?;

        let oauth_client = BasicClient::new(
            ClientId::new(client_id.into()),
            Some(ClientSecret::new(client_secret.into())),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect_url);

        Ok(Self {
            oauth_client,
            http_client,
            proxy: None,
        })
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyDescriptor>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Authorize URL requesting a permanent grant, plus the CSRF state to
    /// check on callback.
    pub fn authorize_url(&self) -> (String, CsrfToken) {
        let (url, csrf_token) = self
            .oauth_client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(REQUIRED_SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .add_extra_param("duration", "permanent")
            .url();

        debug!("Generated authorization URL");
        (url.to_string(), csrf_token)
    }

    /// Pulls the authorization code out of a callback URL after checking
    /// the provider error parameter and the CSRF state.
    pub fn extract_code(
        callback_url: &str,
        expected_state: &CsrfToken,
    ) -> Result<String, RedditApiError> {
        let url = Url::parse(callback_url).map_err(|_| RedditApiError::InvalidUrl {
            url: callback_url.to_string(),
        })?;

        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        if let Some(error) = param("error") {
            warn!("Authorization was declined: {}", error);
            return Err(RedditApiError::AuthenticationFailed { reason: error });
        }

        let state = param("state").ok_or_else(|| RedditApiError::AuthenticationFailed {
            reason: "Missing state parameter".to_string(),
        })?;
        if state != *expected_state.secret() {
            warn!("Authorization callback state did not match");
            return Err(RedditApiError::AuthenticationFailed {
                reason: "CSRF token mismatch".to_string(),
            });
        }

        param("code")
            .filter(|code| !code.is_empty())
            .ok_or_else(|| RedditApiError::AuthenticationFailed {
                reason: "Missing authorization code".to_string(),
            })
    }

    /// Exchanges an authorization code for the long-lived refresh token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, CoreError> {
        let http_client = self.http_client.clone();
        let token = self
            .oauth_client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(|request| send_oauth_request(http_client, request))
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(response) => {
                    RedditApiError::AuthenticationFailed {
                        reason: response.to_string(),
                    }
                }
                RequestTokenError::Request(e) => transport_error(e, self.proxy.as_ref()),
                RequestTokenError::Parse(_, body) => RedditApiError::UnexpectedResponseFormat {
                    raw: String::from_utf8_lossy(&body).into_owned(),
                },
                RequestTokenError::Other(reason) => RedditApiError::AuthenticationFailed { reason },
            })?;

        match token.refresh_token() {
            Some(refresh_token) => {
                info!("Authorization code exchanged for a refresh token");
                Ok(refresh_token.secret().clone())
            }
            None => Err(RedditApiError::AuthenticationFailed {
                reason: "Reddit did not return a refresh token; request a permanent grant"
                    .to_string(),
            }
            .into()),
        }
    }
}

/// Sends oauth2's token request through our own client so the configured
/// User-Agent and proxy apply.
async fn send_oauth_request(
    client: Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

impl RedditClient {
    /// Authorization flow for an account, using its app credentials and proxy.
    pub async fn authorization_flow(
        &self,
        account_id: AccountId,
    ) -> Result<AuthorizationFlow, CoreError> {
        let session = self.open_session(account_id).await?;
        let credentials = &session.credentials;
        if credentials.client_id.trim().is_empty() || credentials.client_secret.trim().is_empty() {
            return Err(RedditApiError::InvalidCredentials {
                account_id,
                reason: "client id and secret are required to authorize".to_string(),
            }
            .into());
        }

        let http_client = session.client_for(&self.endpoints.token_url).clone();
        let flow = AuthorizationFlow::new(
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
            &self.config,
            http_client,
        )?
        .with_proxy(credentials.proxy.clone());
        Ok(flow)
    }
}
