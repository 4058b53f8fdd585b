//! Supabase client: GoTrue for identity, PostgREST for profile records.
//!
//! Every request carries the project's anon key as `apikey` and a bearer
//! token, either the signed-in user's access token or the anon key itself.
//! The session is persisted to a JSON file so that separate CLI invocations
//! share it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, instrument, warn};
use url::Url;

use skilltrack_core::{Email, UserId};

use super::{BackendError, IdentityService, ProfileLookup, ProfileStore};
use crate::config::LabsConfig;
use crate::models::{
    AuthEvent, AuthStateChange, AuthUser, NewProfile, Profile, ProfileChanges, Session,
};

const TOKEN_PATH: &str = "auth/v1/token";
const SIGNUP_PATH: &str = "auth/v1/signup";
const USER_PATH: &str = "auth/v1/user";
const LOGOUT_PATH: &str = "auth/v1/logout";
const PROFILES_PATH: &str = "rest/v1/profiles";

/// Ask PostgREST for a single object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
/// PostgREST's "zero rows for a single-object request" error code.
const NO_ROWS_CODE: &str = "PGRST116";
/// Postgres unique-violation error code.
const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Renew the access token this many seconds before it expires.
const EXPIRY_LEEWAY_SECS: i64 = 30;
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Client for the hosted identity service and `profiles` collection.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    client: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthStateChange>,
    session_file: PathBuf,
}

impl SupabaseClient {
    /// Build a client and restore any session persisted by a previous run.
    ///
    /// A corrupt session file is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` if the HTTP client cannot be built, or
    /// `BackendError::Storage` if the session file exists but cannot be read.
    pub async fn connect(config: &LabsConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        let session = load_session(&config.session_file).await?;
        if let Some(session) = &session {
            debug!(user_id = %session.user_id(), "Restored persisted session");
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                client,
                base_url: config.supabase.url.clone(),
                anon_key: config.supabase.anon_key.clone(),
                session: RwLock::new(session),
                events,
                session_file: config.session_file.clone(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.inner.base_url.join(path)?)
    }

    fn profile_url(&self, id: UserId) -> Result<Url, BackendError> {
        let mut url = self.endpoint(PROFILES_PATH)?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"))
            .append_pair("select", "*");
        Ok(url)
    }

    fn token_url(&self, grant_type: &str) -> Result<Url, BackendError> {
        let mut url = self.endpoint(TOKEN_PATH)?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        Ok(url)
    }

    /// Start a request with the project key and a bearer token.
    ///
    /// Uses the anon key as bearer when `token` is `None`.
    fn request(
        &self,
        method: Method,
        url: Url,
        token: Option<&SecretString>,
    ) -> reqwest::RequestBuilder {
        let bearer = token.unwrap_or(&self.inner.anon_key);
        self.inner
            .client
            .request(method, url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(bearer.expose_secret())
    }

    /// Access token of the cached session, without renewing it.
    async fn access_token(&self) -> Option<SecretString> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let err = api_error(status, &body);
        match &err {
            BackendError::NotFound => debug!(status = %status, "Record not found"),
            BackendError::Unauthorized(_) | BackendError::Conflict(_) => {
                warn!(status = %status, error = %err, "Backend rejected request");
            }
            _ => {
                tracing::error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "Backend returned non-success status"
                );
            }
        }
        Err(err)
    }

    /// Cache a new session, persist it and tell subscribers.
    async fn store_session(
        &self,
        session: Session,
        event: AuthEvent,
    ) -> Result<Session, BackendError> {
        save_session(&self.inner.session_file, &session).await?;
        *self.inner.session.write().await = Some(session.clone());
        // No subscribers is fine.
        let _ = self
            .inner
            .events
            .send(AuthStateChange::new(event, Some(session.clone())));
        Ok(session)
    }

    /// Drop the cached and persisted session and tell subscribers.
    ///
    /// Returns the session that was cleared, along with the outcome of
    /// deleting the session file. The cached session is gone either way.
    async fn clear_session(&self) -> (Option<Session>, Result<(), BackendError>) {
        let previous = self.inner.session.write().await.take();
        let removed = remove_session(&self.inner.session_file).await;
        if let Err(err) = &removed {
            tracing::error!(
                path = %self.inner.session_file.display(),
                error = %err,
                "Failed to delete session file"
            );
        }
        if previous.is_some() {
            let _ = self.inner.events.send(AuthStateChange::signed_out());
        }
        (previous, removed)
    }

    /// End `session` on the identity service.
    async fn revoke(&self, session: &Session) -> Result<(), BackendError> {
        let request = self.request(
            Method::POST,
            self.endpoint(LOGOUT_PATH)?,
            Some(&session.access_token),
        );
        match self.send(request).await {
            // An already-invalid token means the session is gone remotely too.
            Ok(_)
            | Err(BackendError::Unauthorized(_) | BackendError::Api { status: 404, .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl IdentityService for SupabaseClient {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        let cached = self.inner.session.read().await.clone();
        match cached {
            Some(session) if session.is_expired(Utc::now(), EXPIRY_LEEWAY_SECS) => {
                debug!(user_id = %session.user_id(), "Access token expired, refreshing");
                self.refresh_session().await.map(Some)
            }
            other => Ok(other),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.inner.events.subscribe()
    }

    #[instrument(skip(self))]
    async fn current_user(&self) -> Result<Option<AuthUser>, BackendError> {
        let Some(token) = self.access_token().await else {
            return Ok(None);
        };

        let request = self.request(Method::GET, self.endpoint(USER_PATH)?, Some(&token));
        let body = self.send(request).await?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, BackendError> {
        let request = self
            .request(Method::POST, self.token_url("password")?, None)
            .json(&serde_json::json!({
                "email": email.as_str(),
                "password": password.expose_secret(),
            }));

        let body = self.send(request).await?;
        let token: TokenResponse = serde_json::from_str(&body)?;
        self.store_session(token.into_session(Utc::now()), AuthEvent::SignedIn)
            .await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: Option<&str>,
    ) -> Result<Option<Session>, BackendError> {
        let request = self
            .request(Method::POST, self.endpoint(SIGNUP_PATH)?, None)
            .json(&serde_json::json!({
                "email": email.as_str(),
                "password": password.expose_secret(),
                "data": { "full_name": full_name.unwrap_or_default() },
            }));

        let body = self.send(request).await?;
        match serde_json::from_str(&body)? {
            SignUpResponse::Session(token) => self
                .store_session(token.into_session(Utc::now()), AuthEvent::SignedIn)
                .await
                .map(Some),
            SignUpResponse::PendingConfirmation(user) => {
                debug!(user_id = %user.id, "Sign-up awaiting email confirmation");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    async fn refresh_session(&self) -> Result<Session, BackendError> {
        let refresh_token = self
            .inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or_else(|| BackendError::Unauthorized("no session to refresh".to_owned()))?;

        let request = self
            .request(Method::POST, self.token_url("refresh_token")?, None)
            .json(&serde_json::json!({ "refresh_token": refresh_token.expose_secret() }));

        match self.send(request).await {
            Ok(body) => {
                let token: TokenResponse = serde_json::from_str(&body)?;
                self.store_session(token.into_session(Utc::now()), AuthEvent::TokenRefreshed)
                    .await
            }
            Err(err @ (BackendError::Unauthorized(_) | BackendError::Api { status: 400, .. })) => {
                // The refresh token is spent or revoked; the session cannot
                // come back.
                warn!(error = %err, "Session refresh rejected, signing out locally");
                self.clear_session().await.1?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), BackendError> {
        let (previous, removed) = self.clear_session().await;
        // Revoke the token even if the file is stuck on disk, so a restored
        // copy is useless.
        let revoked = match previous {
            Some(previous) => self.revoke(&previous).await,
            None => Ok(()),
        };
        revoked.and(removed)
    }
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    #[instrument(skip(self), fields(user_id = %id))]
    async fn select_by_id(&self, id: UserId) -> ProfileLookup {
        let url = match self.profile_url(id) {
            Ok(url) => url,
            Err(err) => return ProfileLookup::Failed(err),
        };
        let token = self.access_token().await;
        let request = self
            .request(Method::GET, url, token.as_ref())
            .header("Accept", SINGLE_OBJECT);

        match self.send(request).await {
            Ok(body) => match serde_json::from_str(&body) {
                Ok(profile) => ProfileLookup::Found(profile),
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        body = %body.chars().take(500).collect::<String>(),
                        "Failed to parse profile record"
                    );
                    ProfileLookup::Failed(err.into())
                }
            },
            Err(BackendError::NotFound) => ProfileLookup::NotFound,
            Err(err) => ProfileLookup::Failed(err),
        }
    }

    #[instrument(skip(self, profile), fields(user_id = %profile.id))]
    async fn insert(&self, profile: &NewProfile) -> Result<Profile, BackendError> {
        let token = self.access_token().await;
        let request = self
            .request(Method::POST, self.endpoint(PROFILES_PATH)?, token.as_ref())
            .header("Accept", SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .json(profile);

        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    #[instrument(skip(self, changes), fields(user_id = %id))]
    async fn update(
        &self,
        id: UserId,
        changes: &ProfileChanges,
    ) -> Result<Profile, BackendError> {
        let mut url = self.endpoint(PROFILES_PATH)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));

        let token = self.access_token().await;
        let request = self
            .request(Method::PATCH, url, token.as_ref())
            .header("Accept", SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .json(changes);

        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// Token grant response from the identity service.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    /// Lifetime in seconds.
    #[serde(default)]
    expires_in: Option<i64>,
    /// Expiry as a Unix timestamp.
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| now + chrono::Duration::seconds(secs))
            });

        Session {
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            token_type: self.token_type,
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up answers with a session, or with just the user while email
/// confirmation is pending.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    PendingConfirmation(AuthUser),
}

/// Error payload. GoTrue and PostgREST spell their fields differently.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiErrorBody {
    fn code(&self) -> Option<String> {
        self.error_code.clone().or_else(|| {
            self.code.as_ref().map(|code| match code {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
    }

    fn message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

/// Map a non-success response to a `BackendError`.
fn api_error(status: StatusCode, body: &str) -> BackendError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code();
    let message = parsed
        .message()
        .unwrap_or_else(|| body.chars().take(200).collect());

    match (status, code.as_deref()) {
        // Only the single-object "no rows" answer means the record is missing.
        // Any other 404 (unknown table, wrong base path) is a real failure.
        (StatusCode::NOT_ACCEPTABLE, Some(NO_ROWS_CODE)) => BackendError::NotFound,
        (StatusCode::UNAUTHORIZED, _) => BackendError::Unauthorized(message),
        (StatusCode::CONFLICT, _) | (_, Some(UNIQUE_VIOLATION_CODE)) => {
            BackendError::Conflict(message)
        }
        _ => BackendError::Api {
            status: status.as_u16(),
            code,
            message,
        },
    }
}

// =============================================================================
// Session persistence
// =============================================================================

/// On-disk form of a session. Tokens are exposed here and nowhere else.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    refresh_token: String,
    token_type: String,
    expires_at: Option<DateTime<Utc>>,
    user: AuthUser,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.expose_secret().to_owned(),
            refresh_token: session.refresh_token.expose_secret().to_owned(),
            token_type: session.token_type.clone(),
            expires_at: session.expires_at,
            user: session.user.clone(),
        }
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            access_token: SecretString::from(stored.access_token),
            refresh_token: SecretString::from(stored.refresh_token),
            token_type: stored.token_type,
            expires_at: stored.expires_at,
            user: stored.user,
        }
    }
}

async fn load_session(path: &Path) -> Result<Option<Session>, BackendError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    match serde_json::from_str::<StoredSession>(&contents) {
        Ok(stored) => Ok(Some(stored.into())),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Ignoring unreadable session file");
            Ok(None)
        }
    }
}

async fn save_session(path: &Path, session: &Session) -> Result<(), BackendError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = serde_json::to_vec_pretty(&StoredSession::from(session))?;
    tokio::fs::write(path, contents).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    Ok(())
}

async fn remove_session(path: &Path) -> Result<(), BackendError> {
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}
