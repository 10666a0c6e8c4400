#[cfg(test)]
mod tests {
    use crate::{AccountUpdate, Database, NewAccount};
    use redpost_core::{
        ConfigError, CoreError, CredentialResolver, DatabaseError, ProxyDescriptor, ProxyKind,
        RefreshToken,
    };

    async fn setup_test_db() -> Database {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to test database");
        db.run_migrations().await.expect("Failed to run migrations");
        db
    }

    fn new_account(username: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            refresh_token: None,
            proxy: None,
        }
    }

    #[tokio::test]
    async fn test_database_connection_and_migrations() {
        let db = setup_test_db().await;
        // Migrations are idempotent
        db.run_migrations().await.unwrap();
        assert!(db.list_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_and_resolve_account() {
        let db = setup_test_db().await;
        let mut input = new_account("poster_one");
        input.refresh_token = Some("refresh-1".to_string());
        input.proxy = Some(
            ProxyDescriptor::new(ProxyKind::Socks5, "10.0.0.9", 1080)
                .with_auth("proxyuser", "hunter2"),
        );

        let account = db.create_account(input).await.unwrap();
        assert_eq!(account.username, "poster_one");

        let record = db.resolve(account.id).await.unwrap().unwrap();
        assert_eq!(record.account_id, account.id);
        assert_eq!(record.refresh_token.as_issued(), Some("refresh-1"));
        let proxy = record.proxy.unwrap();
        assert_eq!(proxy.kind, ProxyKind::Socks5);
        assert_eq!(proxy.port, 1080);
        assert_eq!(proxy.password.as_deref(), Some("hunter2"));

        assert!(db.resolve(account.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_is_redacted() {
        let db = setup_test_db().await;
        let mut input = new_account("poster_two");
        input.proxy = Some(
            ProxyDescriptor::new(ProxyKind::Http, "10.0.0.1", 3128).with_auth("u", "secret-pw"),
        );
        db.create_account(input).await.unwrap();

        let listed = db.list_accounts().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].authorized);
        let proxy = listed[0].proxy.as_ref().unwrap();
        assert!(proxy.has_password);

        let json = serde_json::to_string(&listed).unwrap();
        assert!(!json.contains("secret-pw"));
        assert!(!json.contains("client-secret"));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_constraint_violation() {
        let db = setup_test_db().await;
        db.create_account(new_account("dup")).await.unwrap();
        let result = db.create_account(new_account("dup")).await;
        assert!(matches!(
            result,
            Err(CoreError::Database(DatabaseError::ConstraintViolation { .. }))
        ));
    }

    #[tokio::test]
    async fn test_blank_fields_rejected() {
        let db = setup_test_db().await;
        let mut input = new_account("blank");
        input.client_secret = "   ".to_string();
        assert!(matches!(
            db.create_account(input).await,
            Err(CoreError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_and_clear_proxy() {
        let db = setup_test_db().await;
        let account = db.create_account(new_account("updatable")).await.unwrap();

        let updated = db
            .update_account(
                account.id,
                AccountUpdate {
                    client_id: Some("new-client".to_string()),
                    proxy: Some(ProxyDescriptor::new(ProxyKind::Http, "proxy.local", 8080)),
                    ..AccountUpdate::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.client_id, "new-client");
        assert_eq!(updated.client_secret, "client-secret");
        assert_eq!(updated.proxy.as_ref().map(|p| p.port), Some(8080));

        let cleared = db
            .update_account(
                account.id,
                AccountUpdate {
                    clear_proxy: true,
                    ..AccountUpdate::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(cleared.proxy.is_none());

        assert!(db
            .update_account(9999, AccountUpdate::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_refresh_token_states() {
        let db = setup_test_db().await;
        let mut input = new_account("placeholder");
        input.refresh_token = Some("YOUR_REFRESH_TOKEN".to_string());
        let account = db.create_account(input).await.unwrap();
        assert_eq!(account.refresh_token, RefreshToken::Unconfigured);

        assert!(db.set_refresh_token(account.id, "fresh-token").await.unwrap());
        let record = db.resolve(account.id).await.unwrap().unwrap();
        assert_eq!(record.refresh_token.as_issued(), Some("fresh-token"));
        assert!(db.get_account_summary(account.id).await.unwrap().unwrap().authorized);

        assert!(!db.set_refresh_token(4242, "fresh-token").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_proxy_type_fails_eagerly() {
        let db = setup_test_db().await;
        let account = db.create_account(new_account("legacy_row")).await.unwrap();

        sqlx::query(
            "UPDATE accounts SET proxy_type = 'https', proxy_host = 'h', proxy_port = 1 \
             WHERE id = ?",
        )
        .bind(account.id)
        .execute(db.pool())
        .await
        .unwrap();

        assert!(matches!(
            db.resolve(account.id).await,
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));
        // Listing still works so the operator can fix the row
        assert_eq!(db.list_accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_account() {
        let db = setup_test_db().await;
        let account = db.create_account(new_account("gone")).await.unwrap();
        assert!(db.delete_account(account.id).await.unwrap());
        assert!(!db.delete_account(account.id).await.unwrap());
        assert!(db.get_account(account.id).await.unwrap().is_none());
    }
}
