use crate::{query_error, Database};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redpost_core::{
    AccountId, ConfigError, CoreError, CredentialRecord, CredentialResolver, ProxyDescriptor,
    ProxyKind, RefreshToken,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    username: String,
    client_id: String,
    client_secret: String,
    refresh_token: Option<String>,
    proxy_type: Option<String>,
    proxy_host: Option<String>,
    proxy_port: Option<i64>,
    proxy_username: Option<String>,
    proxy_password: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    /// Proxy columns as a typed descriptor. Unknown proxy types and
    /// unusable ports are configuration errors, never a silent fallback.
    fn proxy(&self) -> Result<Option<ProxyDescriptor>, ConfigError> {
        let Some(kind) = self.proxy_type.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };
        let kind: ProxyKind = kind.parse()?;

        let host = self
            .proxy_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: format!("accounts[{}].proxy_host", self.id),
            })?;
        let port = self
            .proxy_port
            .ok_or_else(|| ConfigError::MissingField {
                field: format!("accounts[{}].proxy_port", self.id),
            })
            .and_then(|port| {
                u16::try_from(port)
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or_else(|| ConfigError::InvalidValue {
                        field: format!("accounts[{}].proxy_port", self.id),
                        value: port.to_string(),
                    })
            })?;

        let mut proxy = ProxyDescriptor::new(kind, host, port);
        proxy.username = self.proxy_username.clone().filter(|u| !u.is_empty());
        proxy.password = self.proxy_password.clone().filter(|p| !p.is_empty());
        Ok(Some(proxy))
    }

    fn summary(&self) -> AccountSummary {
        let proxy = self
            .proxy_type
            .as_ref()
            .filter(|t| !t.trim().is_empty())
            .map(|proxy_type| ProxySummary {
                proxy_type: proxy_type.clone(),
                host: self.proxy_host.clone().unwrap_or_default(),
                port: self.proxy_port,
                username: self.proxy_username.clone(),
                has_password: self.proxy_password.as_deref().is_some_and(|p| !p.is_empty()),
            });

        AccountSummary {
            id: self.id,
            username: self.username.clone(),
            client_id: self.client_id.clone(),
            authorized: RefreshToken::from_stored(self.refresh_token.clone()).is_configured(),
            proxy,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A stored account with its secrets.
#[derive(Clone)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: RefreshToken,
    pub proxy: Option<ProxyDescriptor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn credentials(&self) -> CredentialRecord {
        CredentialRecord {
            account_id: self.id,
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
            proxy: self.proxy.clone(),
        }
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = ConfigError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let proxy = row.proxy()?;
        Ok(Self {
            id: row.id,
            username: row.username,
            client_id: row.client_id,
            client_secret: row.client_secret,
            refresh_token: RefreshToken::from_stored(row.refresh_token),
            proxy,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("refresh_token", &self.refresh_token)
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// Account view safe to hand to the UI: no secrets, no tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub username: String,
    pub client_id: String,
    pub authorized: bool,
    pub proxy: Option<ProxySummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySummary {
    pub proxy_type: String,
    pub host: String,
    pub port: Option<i64>,
    pub username: Option<String>,
    pub has_password: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub proxy: Option<ProxyDescriptor>,
}

/// Partial update. `None` leaves a column untouched; `clear_proxy` removes
/// the proxy even when `proxy` is absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub proxy: Option<ProxyDescriptor>,
    #[serde(default)]
    pub clear_proxy: bool,
}

fn require(field: &str, value: &str) -> Result<String, CoreError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::InvalidInput {
            message: format!("{} must not be empty", field),
        });
    }
    Ok(value.to_string())
}

fn check_proxy(proxy: &ProxyDescriptor) -> Result<(), CoreError> {
    if proxy.host.trim().is_empty() || proxy.port == 0 {
        return Err(CoreError::InvalidInput {
            message: "proxy host and a non-zero port are required".to_string(),
        });
    }
    Ok(())
}

impl Database {
    pub async fn create_account(&self, account: NewAccount) -> Result<Account, CoreError> {
        let username = require("username", &account.username)?;
        let client_id = require("client_id", &account.client_id)?;
        let client_secret = require("client_secret", &account.client_secret)?;
        if let Some(proxy) = &account.proxy {
            check_proxy(proxy)?;
        }

        let now = Utc::now();
        let proxy = account.proxy.as_ref();
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (
                username, client_id, client_secret, refresh_token,
                proxy_type, proxy_host, proxy_port, proxy_username, proxy_password,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&username)
        .bind(&client_id)
        .bind(&client_secret)
        .bind(account.refresh_token.as_deref().map(str::trim).filter(|t| !t.is_empty()))
        .bind(proxy.map(|p| p.kind.scheme()))
        .bind(proxy.map(|p| p.host.trim().to_string()))
        .bind(proxy.map(|p| i64::from(p.port)))
        .bind(proxy.and_then(|p| p.username.clone()))
        .bind(proxy.and_then(|p| p.password.clone()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        let id = result.last_insert_rowid();
        info!("Created account {} ({})", id, username);

        self.get_account(id).await?.ok_or_else(|| CoreError::Internal {
            message: format!("account {} vanished after insert", id),
        })
    }

    /// Redacted listing ordered by id.
    pub async fn list_accounts(&self) -> Result<Vec<AccountSummary>, CoreError> {
        let rows: Vec<AccountRow> = sqlx::query_as("SELECT * FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        debug!("Listed {} accounts", rows.len());
        Ok(rows.iter().map(AccountRow::summary).collect())
    }

    pub async fn get_account_summary(
        &self,
        id: AccountId,
    ) -> Result<Option<AccountSummary>, CoreError> {
        Ok(self.fetch_row(id).await?.map(|row| row.summary()))
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>, CoreError> {
        match self.fetch_row(id).await? {
            Some(row) => Ok(Some(Account::try_from(row)?)),
            None => Ok(None),
        }
    }

    pub async fn update_account(
        &self,
        id: AccountId,
        update: AccountUpdate,
    ) -> Result<Option<Account>, CoreError> {
        let Some(row) = self.fetch_row(id).await? else {
            return Ok(None);
        };

        let username = match &update.username {
            Some(value) => require("username", value)?,
            None => row.username.clone(),
        };
        let client_id = match &update.client_id {
            Some(value) => require("client_id", value)?,
            None => row.client_id.clone(),
        };
        let client_secret = match &update.client_secret {
            Some(value) => require("client_secret", value)?,
            None => row.client_secret.clone(),
        };

        let proxy = if update.clear_proxy {
            None
        } else if let Some(proxy) = update.proxy {
            check_proxy(&proxy)?;
            Some(proxy)
        } else {
            row.proxy()?
        };

        sqlx::query(
            r#"
            UPDATE accounts SET
                username = ?, client_id = ?, client_secret = ?,
                proxy_type = ?, proxy_host = ?, proxy_port = ?,
                proxy_username = ?, proxy_password = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&username)
        .bind(&client_id)
        .bind(&client_secret)
        .bind(proxy.as_ref().map(|p| p.kind.scheme()))
        .bind(proxy.as_ref().map(|p| p.host.trim().to_string()))
        .bind(proxy.as_ref().map(|p| i64::from(p.port)))
        .bind(proxy.as_ref().and_then(|p| p.username.clone()))
        .bind(proxy.as_ref().and_then(|p| p.password.clone()))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        info!("Updated account {}", id);
        self.get_account(id).await
    }

    /// Stores a refresh token obtained from the authorization flow.
    pub async fn set_refresh_token(
        &self,
        id: AccountId,
        refresh_token: &str,
    ) -> Result<bool, CoreError> {
        let refresh_token = require("refresh_token", refresh_token)?;
        let result =
            sqlx::query("UPDATE accounts SET refresh_token = ?, updated_at = ? WHERE id = ?")
                .bind(refresh_token)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(query_error)?;

        let updated = result.rows_affected() > 0;
        if updated {
            info!("Stored refresh token for account {}", id);
        } else {
            warn!("Refresh token not stored: account {} does not exist", id);
        }
        Ok(updated)
    }

    pub async fn delete_account(&self, id: AccountId) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!("Deleted account {}", id);
        }
        Ok(deleted)
    }

    async fn fetch_row(&self, id: AccountId) -> Result<Option<AccountRow>, CoreError> {
        let row: Option<AccountRow> = sqlx::query_as("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(row)
    }
}

#[async_trait]
impl CredentialResolver for Database {
    async fn resolve(&self, account_id: AccountId) -> Result<Option<CredentialRecord>, CoreError> {
        Ok(self
            .get_account(account_id)
            .await?
            .map(|account| account.credentials()))
    }
}
