//! Request interceptor chain.
//!
//! Every protected call goes through [`AuthorizedClient::execute`]:
//!
//! 1. the store's current bearer token is attached (or none, when signed out);
//! 2. an unauthorized answer joins the store's single in-flight refresh for
//!    that token instead of starting its own;
//! 3. the call is retried once with the refreshed token, or the original
//!    failure is returned (a failed refresh has already signed the store out).

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::auth::{AuthError, Operation, SessionStore};
use crate::models::UserProfile;

use super::{ApiClient, ApiError, AuthBackend};

/// HTTP client for protected application endpoints.
/// Clone is cheap - both halves are reference counted.
pub struct AuthorizedClient<B: AuthBackend> {
    store: SessionStore<B>,
    api: ApiClient,
}

impl<B: AuthBackend> Clone for AuthorizedClient<B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            api: self.api.clone(),
        }
    }
}

impl<B: AuthBackend> AuthorizedClient<B> {
    pub fn new(store: SessionStore<B>, api: ApiClient) -> Self {
        Self { store, api }
    }

    pub fn store(&self) -> &SessionStore<B> {
        &self.store
    }

    /// Run `call` with the current credentials, recovering once from an
    /// expired token. `call` receives the bearer token to attach.
    pub async fn execute<T, F, Fut>(&self, operation: Operation, call: F) -> Result<T, AuthError>
    where
        F: Fn(Option<String>) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let token = self.store.bearer_token();

        let err = match call(token.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_unauthorized() || token.is_none() {
            return Err(operation.normalize(err));
        }

        debug!(?operation, "Request unauthorized, joining token refresh");
        if !self.store.recover_unauthorized(token.as_deref()).await {
            return Err(operation.normalize(err));
        }

        call(self.store.bearer_token())
            .await
            .map_err(|e| operation.normalize(e))
    }

    /// GET a protected JSON endpoint.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        self.execute(Operation::Request, |token| async move {
            self.api.get_json(path, token.as_deref()).await
        })
        .await
    }

    /// POST a JSON body to a protected endpoint.
    pub async fn post<T: DeserializeOwned, Body: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &Body,
    ) -> Result<T, AuthError> {
        self.execute(Operation::Request, |token| async move {
            self.api.post_json(path, token.as_deref(), body).await
        })
        .await
    }

    /// Fetch the signed-in user's profile row.
    pub async fn profile(&self) -> Result<UserProfile, AuthError> {
        let backend = self.store.backend();
        self.execute(Operation::Profile, |token| async move {
            match token {
                Some(token) => backend.profile(&token).await,
                None => Err(ApiError::Unauthorized(None)),
            }
        })
        .await
    }
}
