//! Client-side routes and the navigation guard.
//!
//! The guard restores the persisted session before its first decision, so
//! no navigation is ever judged against a half-restored store.

use tokio::sync::OnceCell;
use tracing::debug;

use crate::api::AuthBackend;
use crate::auth::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login { error: Option<String> },
    Register,
    Callback,
    ForgotPassword,
    ResetPassword,
}

impl Route {
    pub fn login() -> Self {
        Route::Login { error: None }
    }

    pub fn login_with_error(error: impl Into<String>) -> Self {
        Route::Login {
            error: Some(error.into()),
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Route::Home)
    }

    /// Sign-in flow views; a signed-in user is sent home from these.
    pub fn is_auth_route(&self) -> bool {
        !matches!(self, Route::Home)
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login { .. } => "/auth/login",
            Route::Register => "/auth/register",
            Route::Callback => "/auth/callback",
            Route::ForgotPassword => "/auth/forgot-password",
            Route::ResetPassword => "/auth/reset-password",
        }
    }
}

/// Receives the redirects the session store triggers (after logout,
/// after an OAuth callback).
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Decides where a navigation actually lands.
pub struct RouteGuard<B: AuthBackend> {
    store: SessionStore<B>,
    initialized: OnceCell<bool>,
}

impl<B: AuthBackend> RouteGuard<B> {
    pub fn new(store: SessionStore<B>) -> Self {
        Self {
            store,
            initialized: OnceCell::new(),
        }
    }

    /// Resolve a navigation to `to`. The first call awaits session
    /// restoration; concurrent first calls share that one restoration.
    pub async fn resolve(&self, to: Route) -> Route {
        let restored = self
            .initialized
            .get_or_init(|| async { self.store.initialize_auth().await })
            .await;
        debug!(restored, ?to, "Resolving navigation");

        let authenticated = self.store.is_authenticated();
        if to.requires_auth() && !authenticated {
            Route::login()
        } else if to.is_auth_route() && authenticated {
            Route::Home
        } else {
            to
        }
    }
}
