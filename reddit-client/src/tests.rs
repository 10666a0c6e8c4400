#[cfg(test)]
mod tests {
    use crate::{AuthorizationFlow, RedditClient};
    use oauth2::CsrfToken;
    use redpost_core::{
        CoreError, CredentialRecord, FlairTemplate, InMemoryCredentials, PostRecord,
        ProxyDescriptor, ProxyKind, RedditApiError, RedditConfig, RefreshToken,
    };
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{basic_auth, bearer_token, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN_PATH: &str = "/api/v1/access_token";

    fn create_test_config(server: &MockServer) -> RedditConfig {
        RedditConfig {
            user_agent: "redpost-test/1.0".to_string(),
            token_url: format!("{}{}", server.uri(), TOKEN_PATH),
            api_base: server.uri(),
            authorize_url: "https://www.reddit.com/api/v1/authorize".to_string(),
            redirect_uri: "http://localhost:8080/auth/callback".to_string(),
            ..RedditConfig::default()
        }
    }

    fn record(account_id: i64) -> CredentialRecord {
        CredentialRecord {
            account_id,
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            refresh_token: RefreshToken::Issued("refresh-abc".to_string()),
            proxy: None,
        }
    }

    fn create_client(server: &MockServer, records: Vec<CredentialRecord>) -> RedditClient {
        let resolver = records
            .into_iter()
            .fold(InMemoryCredentials::new(), |acc, r| acc.with_record(r));
        RedditClient::new(Arc::new(resolver), &create_test_config(server)).unwrap()
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-123",
                "token_type": "bearer",
                "expires_in": 3600,
                "scope": "submit"
            })))
            .mount(server)
            .await;
    }

    async fn mount_submit(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/api/submit"))
            .and(bearer_token("access-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn post(url: Option<&str>) -> PostRecord {
        PostRecord::new(1, "rust", "Hello world", url.map(str::to_string), None, None)
    }

    async fn request_count(server: &MockServer) -> usize {
        server.received_requests().await.map(|r| r.len()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_access_token_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(basic_auth("test_client_id", "test_client_secret"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-abc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "access-123", "token_type": "bearer" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = create_client(&server, vec![record(1)]);
        let token = client.get_access_token(1).await.unwrap();
        assert_eq!(token, "access-123");
    }

    #[tokio::test]
    async fn test_token_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"message":"Unauthorized"}"#),
            )
            .mount(&server)
            .await;

        let client = create_client(&server, vec![record(1)]);
        match client.get_access_token(1).await {
            Err(CoreError::RedditApi(error @ RedditApiError::Unauthorized { .. })) => {
                assert!(error.to_string().contains("refresh token"));
            }
            other => panic!("Expected Unauthorized, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_invalid_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "error": "invalid_grant" })),
            )
            .mount(&server)
            .await;

        let client = create_client(&server, vec![record(1)]);
        assert!(matches!(
            client.get_access_token(1).await,
            Err(CoreError::RedditApi(RedditApiError::Unauthorized { .. }))
        ));
    }

    #[tokio::test]
    async fn test_token_provider_error_keeps_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = create_client(&server, vec![record(1)]);
        match client.get_access_token(1).await {
            Err(CoreError::RedditApi(RedditApiError::ProviderError { status, raw })) => {
                assert_eq!(status, 503);
                assert_eq!(raw, "upstream down");
            }
            other => panic!("Expected ProviderError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_credentials_checked_before_network() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        let mut unconfigured = record(1);
        unconfigured.refresh_token =
            RefreshToken::from_stored(Some("YOUR_REFRESH_TOKEN".to_string()));
        let mut no_secret = record(2);
        no_secret.client_secret = String::new();

        let client = create_client(&server, vec![unconfigured, no_secret]);
        for account_id in [1, 2] {
            assert!(matches!(
                client.get_access_token(account_id).await,
                Err(CoreError::RedditApi(RedditApiError::InvalidCredentials { .. }))
            ));
        }
        assert!(matches!(
            client.get_access_token(99).await,
            Err(CoreError::RedditApi(RedditApiError::AccountNotFound { account_id: 99 }))
        ));
        assert_eq!(request_count(&server).await, 0);
    }

    #[tokio::test]
    async fn test_submit_structured_success() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/submit"))
            .and(bearer_token("access-123"))
            .and(body_string_contains("sr=rust"))
            .and(body_string_contains("kind=link"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "json": {
                    "errors": [],
                    "data": { "id": "abc", "name": "t3_abc", "permalink": "/r/x/comments/abc/y/" }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_client(&server, vec![record(1)]);
        let submitted = client
            .submit(&post(Some("https://example.com/x")), 1)
            .await
            .unwrap();
        assert_eq!(submitted.post_id, "abc");
        assert_eq!(submitted.fullname, "t3_abc");
        assert!(submitted.url.ends_with("/comments/abc/y/"));
    }

    #[tokio::test]
    async fn test_submit_legacy_success() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_submit(
            &server,
            json!({
                "jquery": [
                    [0, 1, "call", ["body"]],
                    [1, 2, "attr", "redirect"],
                    [2, 3, "call", ["https://www.reddit.com/r/x/comments/xyz/hello_world/"]]
                ],
                "success": true
            }),
        )
        .await;

        let client = create_client(&server, vec![record(1)]);
        let submitted = client.submit(&post(None), 1).await.unwrap();
        assert_eq!(submitted.post_id, "xyz");
        assert_eq!(submitted.fullname, "t3_xyz");
    }

    #[tokio::test]
    async fn test_submit_ratelimit_error() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_submit(
            &server,
            json!({ "json": { "errors": [[
                "RATELIMIT",
                "you are doing that too much. try again in 5 minutes.",
                "ratelimit"
            ]] } }),
        )
        .await;

        let client = create_client(&server, vec![record(1)]);
        match client.submit(&post(None), 1).await {
            Err(CoreError::RedditApi(RedditApiError::RateLimited {
                retry_after,
                message,
                raw,
            })) => {
                assert_eq!(retry_after, Some(300));
                assert!(message.contains("rate limit"));
                assert!(raw.unwrap().contains("RATELIMIT"));
            }
            other => panic!("Expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_http_429_uses_retry_after_header() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/submit"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "120"))
            .mount(&server)
            .await;

        let client = create_client(&server, vec![record(1)]);
        assert!(matches!(
            client.submit(&post(None), 1).await,
            Err(CoreError::RedditApi(RedditApiError::RateLimited {
                retry_after: Some(120),
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_submit_unrecognized_shape() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_submit(&server, json!({ "kind": "Listing", "data": {} })).await;

        let client = create_client(&server, vec![record(1)]);
        match client.submit(&post(None), 1).await {
            Err(CoreError::RedditApi(RedditApiError::UnexpectedResponseFormat { raw })) => {
                assert!(raw.contains("Listing"));
            }
            other => panic!("Expected UnexpectedResponseFormat, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_network() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        let client = create_client(&server, vec![record(1)]);

        let mut empty_url = post(None);
        empty_url.url = Some(String::new());

        for candidate in [post(Some("not-a-url")), empty_url] {
            let expected = candidate.url.clone().unwrap_or_default();
            match client.submit(&candidate, 1).await {
                Err(CoreError::RedditApi(RedditApiError::InvalidUrl { url })) => {
                    assert_eq!(url, expected)
                }
                other => panic!("Expected InvalidUrl, got {:?}", other),
            }
        }
        assert_eq!(request_count(&server).await, 0);
    }

    #[tokio::test]
    async fn test_proxy_connection_failure_names_endpoint() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        let mut proxied = record(1);
        proxied.proxy = Some(ProxyDescriptor::new(ProxyKind::Http, "127.0.0.1", 1));
        let client = create_client(&server, vec![proxied]);

        match client.get_access_token(1).await {
            Err(CoreError::RedditApi(error @ RedditApiError::ProxyConnectionFailed { .. })) => {
                assert!(error.to_string().contains("127.0.0.1:1"));
            }
            other => panic!("Expected ProxyConnectionFailed, got {:?}", other),
        }
        assert_eq!(request_count(&server).await, 0);
    }

    #[tokio::test]
    async fn test_sessions_share_cached_agents() {
        let server = MockServer::start().await;
        let mut proxied = record(1);
        proxied.proxy = Some(ProxyDescriptor::new(ProxyKind::Socks5, "127.0.0.1", 1080));
        let client = create_client(&server, vec![proxied, record(2)]);

        let first = client.open_session(1).await.unwrap();
        let second = client.open_session(1).await.unwrap();
        let (a, b) = (first.agents().unwrap(), second.agents().unwrap());
        assert!(a.same_instances(b));
        assert!(a.shares_single_agent());

        let direct = client.open_session(2).await.unwrap();
        assert!(direct.agents().is_none());
        assert_eq!(client.agent_factory().cached_entries(), 1);
    }

    #[tokio::test]
    async fn test_flairs_from_each_source() {
        let expected = vec![FlairTemplate::new("Funny", "t1")];

        // Direct flair list
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/r/funny/api/link_flair_v2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "text": "Funny", "id": "t1" }])),
            )
            .mount(&server)
            .await;
        let client = create_client(&server, vec![record(1)]);
        assert_eq!(client.list_flairs("funny", 1).await.unwrap(), expected);

        // Empty list falls through to subreddit metadata
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/r/funny/api/link_flair_v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/funny/about"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "t5",
                "data": { "link_flair_templates": [{ "text": "Funny", "id": "t1" }] }
            })))
            .mount(&server)
            .await;
        let client = create_client(&server, vec![record(1)]);
        assert_eq!(client.list_flairs("r/funny", 1).await.unwrap(), expected);

        // Legacy flair selector form post
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/r/funny/api/link_flair_v2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/funny/about"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/r/funny/api/flairselector"))
            .and(body_string_contains("is_newlink=true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current": {},
                "choices": [{ "flair_text": "Funny", "flair_template_id": "t1" }]
            })))
            .mount(&server)
            .await;
        let client = create_client(&server, vec![record(1)]);
        assert_eq!(client.list_flairs("funny", 1).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_flairs_all_forbidden_propagates() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(path("/r/private/api/link_flair_v2"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(path("/r/private/about"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(path("/r/private/api/flairselector"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = create_client(&server, vec![record(1)]);
        assert!(matches!(
            client.list_flairs("private", 1).await,
            Err(CoreError::RedditApi(RedditApiError::ProviderError { status: 403, .. }))
        ));
    }

    #[tokio::test]
    async fn test_flairs_empty_is_not_an_error() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(path("/r/plain/api/link_flair_v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(path("/r/plain/about"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(path("/r/plain/api/flairselector"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = create_client(&server, vec![record(1)]);
        assert!(client.list_flairs("plain", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auth_url_generation() {
        let server = MockServer::start().await;
        let client = create_client(&server, vec![record(1)]);
        let flow = client.authorization_flow(1).await.unwrap();

        let (auth_url, csrf_token) = flow.authorize_url();
        assert!(auth_url.contains("https://www.reddit.com/api/v1/authorize"));
        assert!(auth_url.contains("client_id=test_client_id"));
        assert!(auth_url.contains("redirect_uri="));
        assert!(auth_url.contains("submit"));
        assert!(auth_url.contains("duration=permanent"));
        assert!(!csrf_token.secret().is_empty());
    }

    #[test]
    fn test_callback_validation() {
        let csrf_token = CsrfToken::new("expected_state".to_string());

        assert!(AuthorizationFlow::extract_code("not_a_url", &csrf_token).is_err());

        let error_callback =
            "http://localhost:8080/auth/callback?error=access_denied&state=expected_state";
        match AuthorizationFlow::extract_code(error_callback, &csrf_token) {
            Err(RedditApiError::AuthenticationFailed { reason }) => {
                assert_eq!(reason, "access_denied")
            }
            other => panic!("Expected AuthenticationFailed error, got {:?}", other),
        }

        let no_state_callback = "http://localhost:8080/auth/callback?code=test_code";
        assert!(AuthorizationFlow::extract_code(no_state_callback, &csrf_token).is_err());

        let wrong_state_callback =
            "http://localhost:8080/auth/callback?code=test_code&state=wrong_state";
        match AuthorizationFlow::extract_code(wrong_state_callback, &csrf_token) {
            Err(RedditApiError::AuthenticationFailed { reason }) => {
                assert_eq!(reason, "CSRF token mismatch")
            }
            other => panic!("Expected AuthenticationFailed error, got {:?}", other),
        }

        let good_callback =
            "http://localhost:8080/auth/callback?state=expected_state&code=test_code";
        assert_eq!(
            AuthorizationFlow::extract_code(good_callback, &csrf_token).unwrap(),
            "test_code"
        );
    }

    #[tokio::test]
    async fn test_code_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=test_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "refresh-new",
                "scope": "identity submit flair read"
            })))
            .mount(&server)
            .await;

        let client = create_client(&server, vec![record(1)]);
        let flow = client.authorization_flow(1).await.unwrap();
        assert_eq!(flow.exchange_code("test_code").await.unwrap(), "refresh-new");
    }

    #[tokio::test]
    async fn test_code_exchange_without_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "token_type": "bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let client = create_client(&server, vec![record(1)]);
        let flow = client.authorization_flow(1).await.unwrap();
        assert!(matches!(
            flow.exchange_code("test_code").await,
            Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. }))
        ));
    }
}
