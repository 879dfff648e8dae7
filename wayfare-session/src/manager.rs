use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;
use wayfare_shared::{AppUser, Masked};
use wayfare_store::app_config::SessionConfig;
use wayfare_store::{LocalStores, PersistedAuth};

use crate::provider::{AuthProvider, ProviderSession};
use crate::token;
use crate::{SessionError, SessionResult};

/// Session state as observers see it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(AppUser),
    Refreshing(AppUser),
}

impl AuthState {
    pub fn user(&self) -> Option<&AppUser> {
        match self {
            AuthState::Unauthenticated => None,
            AuthState::Authenticated(user) | AuthState::Refreshing(user) => Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthState::Unauthenticated)
    }
}

/// Reconciles the signed-in identity with the backend's user record.
#[async_trait]
pub trait IdentitySync: Send + Sync {
    async fn sync_identity(&self, access_token: &str, user: &AppUser) -> SessionResult<()>;
}

#[derive(Clone)]
struct ActiveSession {
    user: AppUser,
    access_token: Masked<String>,
    refresh_token: Masked<String>,
    expires_at: DateTime<Utc>,
}

impl ActiveSession {
    fn new(user: AppUser, access_token: Masked<String>, refresh_token: Masked<String>) -> SessionResult<Self> {
        let expires_at = token::expires_at(access_token.expose())?;
        Ok(Self { user, access_token, refresh_token, expires_at })
    }

    fn from_provider(session: ProviderSession) -> SessionResult<Self> {
        Self::new(session.user.to_app_user(), session.access_token, session.refresh_token)
    }

    fn remaining(&self) -> Duration {
        token::remaining(self.expires_at, Utc::now())
    }

    fn persisted(&self) -> PersistedAuth {
        PersistedAuth {
            user: Some(self.user.clone()),
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

enum SessionState {
    Unauthenticated,
    Authenticated(ActiveSession),
    Refreshing(ActiveSession),
}

impl SessionState {
    fn public(&self) -> AuthState {
        match self {
            SessionState::Unauthenticated => AuthState::Unauthenticated,
            SessionState::Authenticated(s) => AuthState::Authenticated(s.user.clone()),
            SessionState::Refreshing(s) => AuthState::Refreshing(s.user.clone()),
        }
    }
}

/// Owns the signed-in session and is the only source of access tokens.
pub struct SessionManager {
    provider: Arc<dyn AuthProvider>,
    stores: LocalStores,
    identity: Option<Arc<dyn IdentitySync>>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    refresh_lock: Mutex<()>,
    state_tx: watch::Sender<AuthState>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn AuthProvider>, stores: LocalStores, config: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            provider,
            stores,
            identity: None,
            config,
            state: RwLock::new(SessionState::Unauthenticated),
            refresh_lock: Mutex::new(()),
            state_tx,
        }
    }

    pub fn with_identity_sync(mut self, identity: Arc<dyn IdentitySync>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    pub async fn current_user(&self) -> Option<AppUser> {
        self.state.read().await.public().user().cloned()
    }

    async fn set_state(&self, next: SessionState) {
        let public = next.public();
        *self.state.write().await = next;
        self.state_tx.send_replace(public);
    }

    async fn has_session(&self) -> bool {
        !matches!(*self.state.read().await, SessionState::Unauthenticated)
    }

    // ========================================================================
    // Entering a session
    // ========================================================================

    /// Startup: provider redirect tokens win over a persisted session.
    pub async fn initialize(&self, redirect: Option<&Url>) -> SessionResult<AuthState> {
        if let Some((access, refresh)) = redirect.and_then(redirect_tokens) {
            info!("Found provider redirect tokens");
            let user = self.provider.get_user(&access).await?.to_app_user();
            self.establish(ActiveSession::new(user, access.into(), refresh.into())?).await?;
            return Ok(self.state());
        }

        let Some(persisted) = self.stores.auth.load().await? else {
            debug!("No persisted session");
            return Ok(AuthState::Unauthenticated);
        };

        let claims = match token::read_claims(persisted.access_token.expose()) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable persisted session");
                self.stores.auth.clear().await?;
                return Ok(AuthState::Unauthenticated);
            }
        };
        let expires_at = claims.expires_at()?;
        if expires_at <= Utc::now() {
            info!("Persisted session has expired, discarding");
            self.stores.auth.clear().await?;
            return Ok(AuthState::Unauthenticated);
        }

        let user = persisted.user.unwrap_or_else(|| AppUser {
            id: claims.sub.clone().unwrap_or_default(),
            email: claims.email.clone().unwrap_or_default(),
            ..Default::default()
        });
        info!(user_id = %user.id, "Restored persisted session");
        self.set_state(SessionState::Authenticated(ActiveSession {
            user,
            access_token: persisted.access_token,
            refresh_token: persisted.refresh_token,
            expires_at,
        }))
        .await;

        if let Err(e) = self.refresh_if_needed(self.config.proactive_threshold()).await {
            warn!(error = %e, "Startup refresh failed");
        }
        Ok(self.state())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> SessionResult<AppUser> {
        let session = self.provider.sign_in_with_password(email, password).await?;
        self.establish(ActiveSession::from_provider(session)?).await
    }

    /// Returns `None` when the account awaits email confirmation.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> SessionResult<Option<AppUser>> {
        match self.provider.sign_up(email, password, first_name, last_name).await? {
            Some(session) => Ok(Some(self.establish(ActiveSession::from_provider(session)?).await?)),
            None => {
                info!(email, "Sign-up pending confirmation");
                Ok(None)
            }
        }
    }

    async fn establish(&self, session: ActiveSession) -> SessionResult<AppUser> {
        {
            // An in-flight refresh of the previous session must not land on top
            let _guard = self.refresh_lock.lock().await;
            self.stores.auth.save(&session.persisted()).await?;
            self.set_state(SessionState::Authenticated(session.clone())).await;
        }
        info!(user_id = %session.user.id, "Signed in");

        if let Some(identity) = &self.identity {
            if let Err(e) = identity.sync_identity(session.access_token.expose(), &session.user).await {
                warn!(error = %e, "Identity sync with backend failed");
            }
        }
        Ok(session.user)
    }

    pub async fn update_user(&self, first_name: &str, last_name: &str) -> SessionResult<AppUser> {
        let access = self.access_token().await.ok_or(SessionError::NotAuthenticated)?;
        let updated = self
            .provider
            .update_user(&access, json!({ "first_name": first_name, "last_name": last_name }))
            .await?
            .to_app_user();

        let persisted = {
            let mut state = self.state.write().await;
            let SessionState::Authenticated(session) = &mut *state else {
                return Err(SessionError::NotAuthenticated);
            };
            session.user = updated.clone();
            session.persisted()
        };
        self.stores.auth.save(&persisted).await?;
        self.state_tx.send_replace(AuthState::Authenticated(updated.clone()));
        Ok(updated)
    }

    // ========================================================================
    // Tokens and refresh
    // ========================================================================

    /// A bearer token with at least the on-demand threshold of life left,
    /// refreshing first if needed. `None` when signed out or the refresh
    /// failed (which also signs out).
    pub async fn access_token(&self) -> Option<String> {
        let threshold = self.config.on_demand_threshold();
        if let Some(token) = self.token_with_lifetime(threshold).await {
            return Some(token);
        }
        if !self.has_session().await {
            return None;
        }
        match self.refresh_if_needed(threshold).await {
            Ok(()) => self.token_with_lifetime(threshold).await,
            Err(e) => {
                warn!(error = %e, "No usable access token");
                None
            }
        }
    }

    async fn token_with_lifetime(&self, min: Duration) -> Option<String> {
        match &*self.state.read().await {
            SessionState::Authenticated(s) if s.remaining() >= min => Some(s.access_token.expose().clone()),
            _ => None,
        }
    }

    /// The backend answered 401 for `rejected_token`. Refreshes once unless a
    /// newer token already replaced it. Returns whether a retry makes sense.
    pub async fn handle_unauthorized(&self, rejected_token: Option<&str>) -> bool {
        let _guard = self.refresh_lock.lock().await;
        let session = match &*self.state.read().await {
            SessionState::Authenticated(s) => match rejected_token {
                Some(rejected) if rejected == s.access_token.expose().as_str() => s.clone(),
                _ => return true,
            },
            _ => return false,
        };
        warn!("Backend rejected the access token, forcing refresh");
        self.refresh_locked(session).await.is_ok()
    }

    async fn refresh_if_needed(&self, threshold: Duration) -> SessionResult<()> {
        let _guard = self.refresh_lock.lock().await;
        let session = match &*self.state.read().await {
            SessionState::Authenticated(s) if s.remaining() >= threshold => return Ok(()),
            SessionState::Authenticated(s) => s.clone(),
            _ => return Err(SessionError::NotAuthenticated),
        };
        self.refresh_locked(session).await
    }

    // Caller holds `refresh_lock`.
    async fn refresh_locked(&self, session: ActiveSession) -> SessionResult<()> {
        debug!(remaining_secs = session.remaining().num_seconds(), "Refreshing session");
        self.set_state(SessionState::Refreshing(session.clone())).await;

        let refreshed = self
            .provider
            .refresh(session.refresh_token.expose())
            .await
            .and_then(ActiveSession::from_provider);

        match refreshed {
            Ok(next) => {
                if let Err(e) = self.stores.auth.save(&next.persisted()).await {
                    warn!(error = %e, "Failed to persist refreshed session");
                }
                info!(user_id = %next.user.id, "Session refreshed");
                self.set_state(SessionState::Authenticated(next)).await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Session refresh failed, signing out");
                self.clear_local_session().await;
                Err(SessionError::RefreshFailed(e.to_string()))
            }
        }
    }

    // ========================================================================
    // Leaving a session
    // ========================================================================

    /// Waits for an in-flight refresh, so a refresh that completes late can
    /// never restore or re-persist the session being signed out.
    pub async fn sign_out(&self) {
        let _guard = self.refresh_lock.lock().await;
        let access = match &*self.state.read().await {
            SessionState::Authenticated(s) | SessionState::Refreshing(s) => Some(s.access_token.expose().clone()),
            SessionState::Unauthenticated => None,
        };
        if let Some(access) = access {
            if let Err(e) = self.provider.sign_out(&access).await {
                warn!(error = %e, "Provider sign-out failed");
            }
        }
        self.clear_local_session().await;
        info!("Signed out");
    }

    async fn clear_local_session(&self) {
        self.set_state(SessionState::Unauthenticated).await;
        if let Err(e) = self.stores.clear_all().await {
            error!(error = %e, "Failed to wipe local stores");
        }
    }

    // ========================================================================
    // Background refresh
    // ========================================================================

    /// Periodically refreshes a session nearing expiry. Stops when the
    /// returned guard is dropped or the manager goes away.
    pub fn start_refresh_timer(self: &Arc<Self>) -> RefreshTimer {
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = self.config.refresh_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if !manager.has_session().await {
                    continue;
                }
                if let Err(e) = manager.refresh_if_needed(manager.config.proactive_threshold()).await {
                    warn!(error = %e, "Scheduled refresh failed");
                }
            }
            debug!("Refresh timer stopped");
        });

        info!(period_secs = period.as_secs(), "Refresh timer started");
        RefreshTimer { handle }
    }
}

pub struct RefreshTimer {
    handle: JoinHandle<()>,
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn redirect_tokens(url: &Url) -> Option<(String, String)> {
    let mut access = None;
    let mut refresh = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "access_token" => access = Some(value.into_owned()),
            "refresh_token" => refresh = Some(value.into_owned()),
            _ => {}
        }
    }
    Some((access?, refresh?))
}
