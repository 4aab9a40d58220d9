use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use tracing::{debug, error, info, warn};

use crate::api::AuthBackend;
use crate::models::{AuthPayload, MessageResponse, Session, SignUpRequest, User};
use crate::router::{Navigator, Route};
use crate::storage::{PersistedAuthState, StateStorage};

use super::{AuthError, OAuthCallback, Operation};

/// Upper bound on the remote sign-out call; local state is cleared regardless.
const SIGN_OUT_TIMEOUT: Duration = Duration::from_secs(10);

type PendingRefresh = Shared<BoxFuture<'static, bool>>;

/// The slot only holds a weak handle; the refresh is owned by its waiters.
type PendingSlot = Option<(String, WeakShared<BoxFuture<'static, bool>>)>;

/// Single source of truth for the signed-in user and their tokens.
///
/// Clone is cheap and clones share state: hand one to the request
/// interceptor and one to the route guard. Created once at startup with
/// [`SessionStore::new`], which restores the persisted snapshot.
pub struct SessionStore<B: AuthBackend> {
    inner: Arc<StoreInner<B>>,
}

impl<B: AuthBackend> Clone for SessionStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct StoreInner<B> {
    backend: B,
    storage: Box<dyn StateStorage>,
    navigator: Box<dyn Navigator>,
    state: Mutex<PersistedAuthState>,
    /// Bumped by every commit, always while `state` is locked
    generation: AtomicU64,
    /// Bearer token attached to outgoing requests
    authorization: RwLock<Option<String>>,
    /// In-flight refresh, keyed by the access token it replaces
    pending_refresh: Mutex<PendingSlot>,
}

/// Resets the store when dropped, so logout clears local state even if the
/// remote call fails or the logout future is cancelled.
struct ResetOnDrop<'a, B: AuthBackend>(&'a SessionStore<B>);

impl<B: AuthBackend> Drop for ResetOnDrop<'_, B> {
    fn drop(&mut self) {
        self.0.reset();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // State is replaced wholesale, so a poisoned value is still consistent
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<B: AuthBackend> SessionStore<B> {
    /// Build the store and seed it from `storage`.
    pub fn new(backend: B, storage: Box<dyn StateStorage>, navigator: Box<dyn Navigator>) -> Self {
        let blob = match storage.load() {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted auth state");
                None
            }
        };
        let state = PersistedAuthState::restore(blob.as_deref());
        debug!(
            has_session = state.session.is_some(),
            authenticated = state.is_authenticated,
            "Auth state restored"
        );

        let authorization = state.session.as_ref().map(|s| s.access_token.clone());

        Self {
            inner: Arc::new(StoreInner {
                backend,
                storage,
                navigator,
                state: Mutex::new(state),
                generation: AtomicU64::new(0),
                authorization: RwLock::new(authorization),
                pending_refresh: Mutex::new(None),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn is_authenticated(&self) -> bool {
        let state = lock(&self.inner.state);
        state.is_authenticated && state.session.is_some() && state.user.is_some()
    }

    pub fn user(&self) -> Option<User> {
        lock(&self.inner.state).user.clone()
    }

    pub fn session(&self) -> Option<Session> {
        lock(&self.inner.state).session.clone()
    }

    /// Token the request interceptor attaches to the next outgoing call.
    pub fn bearer_token(&self) -> Option<String> {
        self.inner
            .authorization
            .read()
            .map(|token| (*token).clone())
            .unwrap_or_else(|poisoned| (*poisoned.into_inner()).clone())
    }

    fn refresh_token_value(&self) -> Option<String> {
        lock(&self.inner.state)
            .session
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
    }

    /// Held refresh token together with the generation it belongs to.
    fn refresh_token_at(&self) -> Option<(String, u64)> {
        let state = lock(&self.inner.state);
        let token = state.session.as_ref()?.refresh_token.clone()?;
        Some((token, self.inner.generation.load(Ordering::SeqCst)))
    }

    /// Replace the whole state, then update the default authorization and
    /// persist before returning.
    fn commit(&self, next: PersistedAuthState) {
        let state = lock(&self.inner.state);
        self.write_locked(state, next);
    }

    /// Like [`commit`](Self::commit), but only if nothing was committed since
    /// `generation` was read. Returns whether `next` was written.
    fn commit_if_current(&self, generation: u64, next: PersistedAuthState) -> bool {
        let state = lock(&self.inner.state);
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        self.write_locked(state, next);
        true
    }

    fn write_locked(&self, mut state: MutexGuard<'_, PersistedAuthState>, next: PersistedAuthState) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        *state = next;

        let token = state.session.as_ref().map(|s| s.access_token.clone());
        match self.inner.authorization.write() {
            Ok(mut authorization) => *authorization = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }

        let saved = state
            .to_blob()
            .map_err(anyhow::Error::from)
            .and_then(|blob| self.inner.storage.save(&blob));
        if let Err(e) = saved {
            error!(error = %e, "Failed to persist auth state");
        }
    }

    /// Drop session and user.
    pub fn reset(&self) {
        self.commit(PersistedAuthState::default());
    }

    fn navigate(&self, route: Route) {
        debug!(path = route.path(), "Navigating");
        self.inner.navigator.navigate(route);
    }

    /// Sign in with email and password. The account must have confirmed its
    /// email; otherwise no session is established. Any failure leaves the
    /// store signed out.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, AuthError> {
        match self.try_login(email, password).await {
            Ok(payload) => {
                info!("Signed in");
                Ok(payload)
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<AuthPayload, AuthError> {
        let payload = self
            .inner
            .backend
            .sign_in(email, password)
            .await
            .map_err(|e| Operation::Login.normalize(e))?;

        let user = payload
            .user
            .clone()
            .ok_or_else(|| AuthError::UpstreamUnavailable(Operation::Login.fallback_message().to_string()))?;
        if !user.is_email_confirmed() {
            return Err(AuthError::unverified());
        }
        let session = payload
            .session
            .clone()
            .ok_or_else(|| AuthError::UpstreamUnavailable(Operation::Login.fallback_message().to_string()))?;

        self.commit(PersistedAuthState::authenticated(session, user));
        Ok(payload)
    }

    /// Create an account. The account has to confirm its email before it can
    /// sign in, so local state is not touched.
    pub async fn register(&self, email: &str, password: &str, name: Option<&str>) -> Result<AuthPayload, AuthError> {
        let request = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.map(str::to_string),
        };
        self.inner
            .backend
            .sign_up(&request)
            .await
            .map_err(|e| Operation::Register.normalize(e))
    }

    /// Sign out. The backend is told on a best-effort basis; local state is
    /// always cleared and the user is sent to the login view.
    pub async fn logout(&self) {
        {
            let _reset = ResetOnDrop(self);
            if let Some(token) = self.bearer_token() {
                match tokio::time::timeout(SIGN_OUT_TIMEOUT, self.inner.backend.sign_out(&token)).await {
                    Ok(Ok(())) => debug!("Remote sign-out complete"),
                    Ok(Err(e)) => warn!(error = %e, "Remote sign-out failed"),
                    Err(_) => warn!("Remote sign-out timed out"),
                }
            }
        }
        info!("Signed out");
        self.navigate(Route::login());
    }

    /// Exchange the refresh token for a new session. Returns whether it
    /// worked; a failed exchange leaves the store signed out. Without a
    /// refresh token this is a no-op that returns `false`.
    ///
    /// The outcome only applies to the state the refresh started from. If a
    /// logout or login lands while the exchange is in flight, the result is
    /// discarded and `false` is returned.
    pub async fn refresh_token(&self) -> bool {
        let Some((refresh_token, generation)) = self.refresh_token_at() else {
            debug!("No refresh token held");
            return false;
        };

        match self.try_refresh(&refresh_token).await {
            Ok((session, user)) => {
                if self.commit_if_current(generation, PersistedAuthState::authenticated(session, user)) {
                    debug!("Session refreshed");
                    true
                } else {
                    debug!("Auth state changed during refresh, discarding new session");
                    false
                }
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                if !self.commit_if_current(generation, PersistedAuthState::default()) {
                    debug!("Auth state changed during refresh, keeping it");
                }
                false
            }
        }
    }

    async fn try_refresh(&self, refresh_token: &str) -> Result<(Session, User), AuthError> {
        let payload = self
            .inner
            .backend
            .refresh(refresh_token)
            .await
            .map_err(|e| Operation::Refresh.normalize(e))?;

        let mut session = payload
            .session
            .ok_or_else(|| AuthError::RefreshFailed(Operation::Refresh.fallback_message().to_string()))?;
        // Providers that don't rotate refresh tokens omit it
        if session.refresh_token.is_none() {
            session.refresh_token = Some(refresh_token.to_string());
        }

        let user = match payload.user.or_else(|| self.user()) {
            Some(user) => user,
            None => self
                .inner
                .backend
                .session_user(&session.access_token)
                .await
                .map_err(|e| Operation::Refresh.normalize(e))?,
        };

        Ok((session, user))
    }

    /// Recover from an unauthorized response to a request sent with
    /// `failed_token`. Concurrent callers for the same token share one
    /// refresh; a caller whose token was already replaced just retries.
    /// Returns whether the request should be retried.
    pub async fn recover_unauthorized(&self, failed_token: Option<&str>) -> bool {
        let pending = {
            let mut slot = lock(&self.inner.pending_refresh);
            let current = match self.bearer_token() {
                Some(current) => current,
                None => return false,
            };
            if failed_token != Some(current.as_str()) {
                debug!("Token already rotated, retrying");
                return true;
            }

            let joined = match slot.as_ref() {
                Some((token, pending)) if *token == current => pending.upgrade(),
                _ => None,
            };
            match joined {
                Some(pending) => pending,
                None => {
                    let pending = self.start_refresh(current.clone());
                    *slot = pending.downgrade().map(|weak| (current, weak));
                    pending
                }
            }
        };

        pending.await
    }

    /// Refresh shared by every caller that failed with `token`. It clears its
    /// own slot once done.
    fn start_refresh(&self, token: String) -> PendingRefresh {
        let store = self.clone();
        async move {
            let refreshed = store.refresh_token().await;
            let mut slot = lock(&store.inner.pending_refresh);
            if slot.as_ref().is_some_and(|(t, _)| *t == token) {
                *slot = None;
            }
            refreshed
        }
        .boxed()
        .shared()
    }

    /// Restore the session at startup. Tries the held access token first,
    /// then the refresh token, and otherwise signs out. Must finish before
    /// the first navigation decision.
    pub async fn initialize_auth(&self) -> bool {
        if let Some(session) = self.session() {
            match self.inner.backend.session_user(&session.access_token).await {
                Ok(user) => {
                    debug!("Stored access token accepted");
                    self.commit(PersistedAuthState::authenticated(session, user));
                    return true;
                }
                Err(e) => debug!(error = %e, "Stored access token rejected"),
            }
        }

        if self.refresh_token_value().is_some() && self.refresh_token().await {
            return true;
        }

        self.reset();
        false
    }

    /// Start a Google sign-in; returns the provider URL to open.
    pub async fn google_sign_in_url(&self) -> Result<String, AuthError> {
        self.inner
            .backend
            .google_sign_in_url()
            .await
            .map_err(|e| Operation::GoogleSignIn.normalize(e))
    }

    /// Complete a Google sign-in from the raw callback parameters.
    /// Parameters with neither a code nor a token fail with
    /// `InvalidCallback` without touching the current session.
    pub async fn handle_google_callback<I, K, V>(&self, params: I) -> Result<AuthPayload, AuthError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.finish_callback(OAuthCallback::from_params(params)).await
    }

    /// Complete a Google sign-in from the redirect URL, or just its
    /// `?query` / `#fragment` part. Same rules as
    /// [`handle_google_callback`](Self::handle_google_callback).
    pub async fn handle_google_callback_url(&self, url: &str) -> Result<AuthPayload, AuthError> {
        self.finish_callback(OAuthCallback::from_url(url)).await
    }

    async fn finish_callback(&self, parsed: Result<OAuthCallback, AuthError>) -> Result<AuthPayload, AuthError> {
        match parsed {
            Ok(callback) => self.complete_google_callback(callback).await,
            Err(e) => {
                warn!(error = %e, "Rejected OAuth callback");
                self.navigate(Route::login_with_error(e.message()));
                Err(e)
            }
        }
    }

    /// Establish a session from an already-parsed callback, then go home.
    pub async fn complete_google_callback(&self, callback: OAuthCallback) -> Result<AuthPayload, AuthError> {
        match self.try_google_callback(callback).await {
            Ok(payload) => {
                info!("Signed in with Google");
                self.navigate(Route::Home);
                Ok(payload)
            }
            Err(e) => {
                warn!(error = %e, "Google sign-in failed");
                self.reset();
                self.navigate(Route::login_with_error(e.message()));
                Err(e)
            }
        }
    }

    async fn try_google_callback(&self, callback: OAuthCallback) -> Result<AuthPayload, AuthError> {
        let backend = &self.inner.backend;
        let normalize = |e| Operation::GoogleCallback.normalize(e);

        let (session, user, message) = match callback {
            OAuthCallback::TokenFragment {
                access_token,
                refresh_token,
            } => {
                let user = backend.google_user(&access_token).await.map_err(normalize)?;
                (Session::new(access_token, refresh_token, None), user, None)
            }
            OAuthCallback::Code(code) => {
                let payload = backend.exchange_code(&code).await.map_err(normalize)?;
                let fallback = || AuthError::UpstreamUnavailable(Operation::GoogleCallback.fallback_message().to_string());
                let session = payload.session.ok_or_else(fallback)?;
                let user = payload.user.ok_or_else(fallback)?;
                (session, user, payload.message)
            }
        };

        self.commit(PersistedAuthState::authenticated(session.clone(), user.clone()));
        Ok(AuthPayload {
            user: Some(user),
            session: Some(session),
            message,
        })
    }

    /// Send password reset instructions to `email`.
    pub async fn request_password_reset(&self, email: &str) -> Result<MessageResponse, AuthError> {
        self.inner
            .backend
            .request_password_reset(email)
            .await
            .map_err(|e| Operation::RequestPasswordReset.normalize(e))
    }

    pub async fn verify_reset_code(&self, email: &str, code: &str) -> Result<MessageResponse, AuthError> {
        self.inner
            .backend
            .verify_reset_code(email, code)
            .await
            .map_err(|e| Operation::VerifyResetCode.normalize(e))
    }

    /// Set a new password, authorized by the recovery token from the reset
    /// email. The backend resolves the user from that token.
    pub async fn reset_password(&self, password: &str, recovery_token: &str) -> Result<MessageResponse, AuthError> {
        self.inner
            .backend
            .reset_password(password, recovery_token)
            .await
            .map_err(|e| Operation::ResetPassword.normalize(e))
    }
}
