use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;
use wayfare_shared::{AppUser, Masked};
use wayfare_store::app_config::AuthConfig;

use crate::{SessionError, SessionResult};

/// User as the identity provider describes it
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

impl ProviderUser {
    pub fn to_app_user(&self) -> AppUser {
        let meta = |key: &str| {
            self.user_metadata
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        AppUser {
            id: self.id.clone(),
            email: self.email.clone().unwrap_or_default(),
            first_name: meta("first_name"),
            last_name: meta("last_name"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSession {
    pub access_token: Masked<String>,
    pub refresh_token: Masked<String>,
    pub user: ProviderUser,
}

/// External identity provider. Implementations must not retry; the session
/// manager owns the refresh policy.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> SessionResult<ProviderSession>;

    /// `None` when the provider requires email confirmation before issuing a session.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> SessionResult<Option<ProviderSession>>;

    async fn refresh(&self, refresh_token: &str) -> SessionResult<ProviderSession>;

    async fn get_user(&self, access_token: &str) -> SessionResult<ProviderUser>;

    async fn update_user(&self, access_token: &str, metadata: Value) -> SessionResult<ProviderUser>;

    async fn sign_out(&self, access_token: &str) -> SessionResult<()>;
}

// ============================================================================
// GoTrue REST implementation
// ============================================================================

pub struct GoTrueProvider {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
}

impl GoTrueProvider {
    pub fn new(config: &AuthConfig) -> SessionResult<Self> {
        let mut base_url = Url::parse(&config.url)
            .map_err(|e| SessionError::Config(format!("auth.url: {}", e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            anon_key: config.anon_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> SessionResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| SessionError::Config(format!("auth endpoint {}: {}", path, e)))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http.request(method, url).header("apikey", &self.anon_key)
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> SessionResult<ProviderSession> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        debug!(grant_type, "requesting provider token");
        let response = self.request(reqwest::Method::POST, url).json(&body).send().await?;
        Ok(read_json(response).await?)
    }
}

/// Decodes a 2xx body, or turns the provider's error payload into a
/// `SessionError::Provider`.
async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> SessionResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .unwrap_or("request failed")
        .to_string();
    warn!(status = status.as_u16(), %message, "auth provider rejected request");
    Err(SessionError::Provider { status: status.as_u16(), message })
}

#[async_trait]
impl AuthProvider for GoTrueProvider {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> SessionResult<ProviderSession> {
        self.token_grant("password", json!({ "email": email, "password": password })).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> SessionResult<Option<ProviderSession>> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "first_name": first_name, "last_name": last_name },
        });
        let response = self
            .request(reqwest::Method::POST, self.endpoint("auth/v1/signup")?)
            .json(&body)
            .send()
            .await?;
        let payload: Value = read_json(response).await?;

        // With autoconfirm on the provider answers with a full session,
        // otherwise only with the pending user.
        if payload.get("access_token").is_some() {
            Ok(Some(serde_json::from_value(payload)?))
        } else {
            Ok(None)
        }
    }

    async fn refresh(&self, refresh_token: &str) -> SessionResult<ProviderSession> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token })).await
    }

    async fn get_user(&self, access_token: &str) -> SessionResult<ProviderUser> {
        let response = self
            .request(reqwest::Method::GET, self.endpoint("auth/v1/user")?)
            .bearer_auth(access_token)
            .send()
            .await?;
        read_json(response).await
    }

    async fn update_user(&self, access_token: &str, metadata: Value) -> SessionResult<ProviderUser> {
        let response = self
            .request(reqwest::Method::PUT, self.endpoint("auth/v1/user")?)
            .bearer_auth(access_token)
            .json(&json!({ "data": metadata }))
            .send()
            .await?;
        read_json(response).await
    }

    async fn sign_out(&self, access_token: &str) -> SessionResult<()> {
        let response = self
            .request(reqwest::Method::POST, self.endpoint("auth/v1/logout")?)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SessionError::Provider { status: status.as_u16(), message: "sign-out rejected".into() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_maps_to_app_user() {
        let user: ProviderUser = serde_json::from_value(json!({
            "id": "u1",
            "email": "ada@example.com",
            "user_metadata": { "first_name": "Ada", "last_name": "Lovelace" }
        }))
        .unwrap();
        let app_user = user.to_app_user();
        assert_eq!(app_user.display_name(), "Ada Lovelace");

        let bare: ProviderUser = serde_json::from_value(json!({ "id": "u2" })).unwrap();
        assert_eq!(bare.to_app_user().email, "");
    }

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let provider = GoTrueProvider::new(&AuthConfig {
            url: "https://example.com/identity".to_string(),
            anon_key: "anon".to_string(),
        })
        .unwrap();
        assert_eq!(
            provider.endpoint("auth/v1/user").unwrap().as_str(),
            "https://example.com/identity/auth/v1/user"
        );
    }

    #[test]
    fn test_rejects_bad_url() {
        let result = GoTrueProvider::new(&AuthConfig { url: "not a url".into(), anon_key: "k".into() });
        assert!(matches!(result, Err(SessionError::Config(_))));
    }
}
