//! Session store: who is logged in, and the credential that proves it.
//!
//! A [`Session`] is an explicitly owned handle (cheap to clone) that is
//! passed to the route guard and to task controllers. It keeps the
//! authenticated [`User`] in memory and the token in a [`TokenStore`],
//! which the HTTP adapter reads on every request.
//!
//! State changes are published through `futures-signals` so views and the
//! route guard re-evaluate as soon as the user logs in or out.

use crate::error::{ClientError, ClientResult};
use crate::http::{ApiClient, RequestFailure};
use futures_signals::signal::{Mutable, Signal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const LOGIN_FAILED: &str = "Failed to login";
const SIGNUP_FAILED: &str = "Failed to create account";

/// Authenticated identity as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UserRecord")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

/// Wire shape of a user; the backend may send `_id`, `id` or both
#[derive(Deserialize)]
struct UserRecord {
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    email: String,
    #[serde(default)]
    age: Option<u32>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.object_id.or(record.id),
            name: record.name.unwrap_or_default(),
            email: record.email,
            age: record.age,
        }
    }
}

impl User {
    /// Single-letter avatar: first letter of the email, upper-cased
    pub fn initial(&self) -> char {
        self.email
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('U')
    }
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Registration payload sent to `POST /users`
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

/// Whether the signup form asked for, and got, agreement to the terms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermsAgreement {
    NotRequired,
    Accepted,
    Declined,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    user: Option<User>,
    token: String,
}

/// Turn a failed login/signup call into an authentication error
///
/// The backend's message is passed through when it sent one; otherwise the
/// operation-specific fallback is used. Local failures are returned as-is.
fn auth_failure(failure: RequestFailure, fallback: &str) -> ClientError {
    let RequestFailure {
        error,
        backend_message,
    } = failure;

    if matches!(
        error,
        ClientError::Validation(_) | ClientError::Storage(_) | ClientError::Configuration(_)
    ) {
        return error;
    }

    warn!("Authentication request failed: {}", error);
    ClientError::authentication(backend_message.unwrap_or_else(|| fallback.to_string()))
}

struct SessionInner {
    api: ApiClient,
    user: Mutable<Option<User>>,
    loading: Mutable<bool>,
    bootstrapped: AtomicBool,
    // Bumped by login/signup/logout so a slow bootstrap cannot overwrite them
    epoch: AtomicU64,
}

/// Client-side session state machine
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session that has not been bootstrapped yet (`loading` is true)
    pub fn new(api: ApiClient) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                api,
                user: Mutable::new(None),
                loading: Mutable::new(true),
                bootstrapped: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn user(&self) -> Option<User> {
        self.inner.user.get_cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.loading.get()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.user.lock_ref().is_some()
    }

    pub fn user_signal(&self) -> impl Signal<Item = Option<User>> + use<> {
        self.inner.user.signal_cloned()
    }

    pub fn loading_signal(&self) -> impl Signal<Item = bool> + use<> {
        self.inner.loading.signal()
    }

    /// Currently persisted token, if any
    pub async fn token(&self) -> ClientResult<Option<String>> {
        self.inner.api.token_store().load().await
    }

    /// Restore the session from a persisted token
    ///
    /// Runs once per session; later calls return the current user. Any
    /// failure to fetch the profile (rejected token or network) clears the
    /// stored token. No retry.
    pub async fn bootstrap(&self) -> Option<User> {
        if self.inner.bootstrapped.swap(true, Ordering::SeqCst) {
            return self.user();
        }

        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        self.inner.loading.set_neq(true);

        let tokens = self.inner.api.token_store();
        let token = tokens.load().await.unwrap_or_else(|e| {
            warn!("Failed to read persisted token: {}", e);
            None
        });

        let restored = match token {
            None => {
                debug!("No persisted token, starting logged out");
                None
            }
            Some(token) => match self.inner.api.get_with_token::<User>("/users/me", &token).await {
                Ok(user) => {
                    info!("Restored session for {}", user.email);
                    Some(user)
                }
                Err(e) => {
                    warn!("Discarding persisted token: {}", e);
                    // Only clear the token this attempt validated
                    let still_current = matches!(tokens.load().await, Ok(Some(ref t)) if *t == token);
                    if still_current {
                        if let Err(e) = tokens.clear().await {
                            warn!("Failed to clear stale token: {}", e);
                        }
                    }
                    None
                }
            },
        };

        if self.inner.epoch.load(Ordering::SeqCst) == epoch {
            self.inner.user.set(restored);
        } else {
            debug!("Session changed during bootstrap, keeping newer state");
        }

        self.inner.loading.set_neq(false);
        self.user()
    }

    /// Log in with email and password
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<User> {
        info!("Logging in as {}", email);
        let credentials = Credentials { email, password };

        let response: AuthResponse = self
            .inner
            .api
            .post_detailed("/users/login", &credentials)
            .await
            .map_err(|e| auth_failure(e, LOGIN_FAILED))?;

        self.establish(response, LOGIN_FAILED).await
    }

    /// Register a new account and log in as it
    pub async fn signup(&self, profile: &SignupRequest, terms: TermsAgreement) -> ClientResult<User> {
        if terms == TermsAgreement::Declined {
            return Err(ClientError::validation(
                "You must agree to the terms and conditions",
            ));
        }

        info!("Signing up {}", profile.email);

        let response: AuthResponse = self
            .inner
            .api
            .post_detailed("/users", profile)
            .await
            .map_err(|e| auth_failure(e, SIGNUP_FAILED))?;

        self.establish(response, SIGNUP_FAILED).await
    }

    /// Forget the current user and token
    ///
    /// Completes client-side without waiting for the backend. When a token
    /// was held, `POST /users/logout` is sent in the background with it and
    /// the handle of that task is returned; dropping it does not cancel it.
    pub async fn logout(&self) -> ClientResult<Option<JoinHandle<()>>> {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.user.set(None);
        self.inner.bootstrapped.store(true, Ordering::SeqCst);
        self.inner.loading.set_neq(false);

        let tokens = self.inner.api.token_store();
        let token = tokens.load().await.unwrap_or_else(|e| {
            warn!("Failed to read token during logout: {}", e);
            None
        });
        tokens.clear().await?;

        let remote = token.map(|token| {
            let api = self.inner.api.clone();
            tokio::spawn(async move {
                if let Err(e) = api.post_with_token("/users/logout", &token).await {
                    debug!("Remote logout failed: {}", e);
                }
            })
        });

        info!("Logged out");
        Ok(remote)
    }

    async fn establish(&self, response: AuthResponse, fallback: &str) -> ClientResult<User> {
        let AuthResponse { user, token } = response;

        let user = match user {
            Some(user) => user,
            None => self
                .inner
                .api
                .get_with_token_detailed::<User>("/users/me", &token)
                .await
                .map_err(|e| auth_failure(e, fallback))?,
        };

        self.inner.api.token_store().save(&token).await?;

        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.user.set(Some(user.clone()));
        self.inner.bootstrapped.store(true, Ordering::SeqCst);
        self.inner.loading.set_neq(false);

        info!("Session established for {}", user.email);
        Ok(user)
    }
}
