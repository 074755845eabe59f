use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::config::{env_string, env_u64, normalize_endpoint};

const DEFAULT_API_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub api_endpoint: String,
    pub timeout: Duration,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let api_key = env_string("AUTH_API_KEY");
        let api_endpoint = normalize_endpoint(
            env_string("AUTH_API_ENDPOINT").unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
        );
        let timeout = Duration::from_millis(env_u64("AUTH_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        Self { api_key, api_endpoint, timeout }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: reqwest::StatusCode, body: String },
}

/// The identity the rest of the core treats as opaque. Tokens never leave the
/// auth client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResetRequest<'a> {
    request_type: &'static str,
    email: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: String,
    id_token: String,
}

/// Client for the external authentication collaborator. Publishes identity
/// changes on a watch channel; receivers drop to unsubscribe.
pub struct AuthClient {
    config: AuthConfig,
    client: reqwest::Client,
    identity_tx: watch::Sender<Option<AuthUser>>,
    id_token: Option<String>,
}

impl AuthClient {
    pub fn new(config: AuthConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let (identity_tx, _) = watch::channel(None);

        Self { config, client, identity_tx, id_token: None }
    }

    pub fn from_env() -> Self {
        Self::new(AuthConfig::from_env())
    }

    /// Identity-changed notifications. The receiver sees the current value
    /// immediately and every change after it.
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.identity_tx.subscribe()
    }

    /// Same notifications as [`subscribe`], exposed as a stream for shells
    /// that drive an event loop.
    ///
    /// [`subscribe`]: AuthClient::subscribe
    pub fn identity_stream(&self) -> WatchStream<Option<AuthUser>> {
        WatchStream::new(self.subscribe())
    }

    pub fn current_identity(&self) -> Option<AuthUser> {
        self.identity_tx.borrow().clone()
    }

    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    fn api_key(&self) -> Result<&str, AuthError> {
        self.config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(AuthError::NotConfigured("AUTH_API_KEY"))
    }

    fn account_url(&self, operation: &str) -> Result<String, AuthError> {
        Ok(format!(
            "{}/accounts:{}?key={}",
            self.config.api_endpoint,
            operation,
            urlencoding::encode(self.api_key()?)
        ))
    }

    async fn account_request(
        &mut self,
        operation: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, AuthError> {
        let url = self.account_url(operation)?;
        let request = CredentialsRequest { email, password, return_secure_token: true };

        let resp = self.client.post(&url).json(&request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::HttpStatus { status, body });
        }

        let account: AccountResponse = resp.json().await?;
        let user = AuthUser { uid: account.local_id, email: account.email };
        self.id_token = Some(account.id_token);
        let _ = self.identity_tx.send(Some(user.clone()));
        Ok(user)
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        self.account_request("signInWithPassword", email, password).await
    }

    pub async fn sign_up(&mut self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        self.account_request("signUp", email, password).await
    }

    /// Local invalidation only; the collaborator holds no session to revoke.
    pub fn sign_out(&mut self) {
        self.id_token = None;
        let _ = self.identity_tx.send(None);
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let url = self.account_url("sendOobCode")?;
        let request = PasswordResetRequest { request_type: "PASSWORD_RESET", email };

        let resp = self.client.post(&url).json(&request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::HttpStatus { status, body });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> AuthClient {
        AuthClient::new(AuthConfig {
            api_key: Some("test-key".to_string()),
            api_endpoint: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_millis(100),
        })
    }

    #[test]
    fn subscribe_sees_identity_changes() {
        let mut client = offline_client();
        let rx = client.subscribe();
        assert!(rx.borrow().is_none());

        let user = AuthUser { uid: "u1".into(), email: "a@b.c".into() };
        let _ = client.identity_tx.send(Some(user.clone()));
        assert_eq!(rx.borrow().as_ref(), Some(&user));

        client.sign_out();
        assert!(rx.borrow().is_none());
        assert!(client.id_token().is_none());
    }

    #[test]
    fn missing_api_key_is_reported_before_any_request() {
        let client = AuthClient::new(AuthConfig {
            api_key: None,
            api_endpoint: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_millis(100),
        });
        assert!(matches!(
            client.account_url("signUp"),
            Err(AuthError::NotConfigured(_))
        ));
    }

    #[test]
    fn account_response_uses_wire_field_names() {
        let account: AccountResponse = serde_json::from_value(serde_json::json!({
            "localId": "u1",
            "email": "a@b.c",
            "idToken": "tok"
        }))
        .unwrap();
        assert_eq!(account.local_id, "u1");
        assert_eq!(account.id_token, "tok");
    }
}
