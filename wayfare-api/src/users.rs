use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;
use wayfare_session::{IdentitySync, SessionError, SessionResult};
use wayfare_shared::{AppUser, UserProfile};

use crate::client::{ApiClient, ApiRequest};
use crate::error::{ApiError, ApiResult};

pub async fn update_profile(client: &ApiClient, profile: &UserProfile) -> ApiResult<UserProfile> {
    if profile.first_name.trim().is_empty() || profile.last_name.trim().is_empty() {
        return Err(ApiError::Validation("first and last name are required".into()));
    }
    client
        .execute(&ApiRequest::patch("/users/profile").json(profile)?)
        .await
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncRequest<'a> {
    auth_id: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
}

/// Tells the backend about a newly signed-in identity (`POST /auth/sync`).
///
/// Holds a client without a session manager: the token is passed in by the
/// manager itself.
pub struct BackendIdentitySync {
    client: ApiClient,
}

impl BackendIdentitySync {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentitySync for BackendIdentitySync {
    async fn sync_identity(&self, access_token: &str, user: &AppUser) -> SessionResult<()> {
        let body = SyncRequest {
            auth_id: &user.id,
            email: &user.email,
            first_name: &user.first_name,
            last_name: &user.last_name,
        };
        let request = ApiRequest::post("/auth/sync")
            .json(&body)
            .map_err(|e| SessionError::Sync(e.to_string()))?;
        self.client
            .send_with_token(&request, access_token)
            .await
            .map_err(|e| SessionError::Sync(e.to_string()))?;
        debug!(user_id = %user.id, "Identity synced with backend");
        Ok(())
    }
}
