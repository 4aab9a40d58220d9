//! OAuth callback parameters, decided once at the boundary.

use reqwest::Url;

use super::AuthError;

/// How the provider completed the OAuth round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthCallback {
    /// Authorization code that still needs a server-side exchange
    Code(String),
    /// Tokens delivered directly in the redirect fragment
    TokenFragment {
        access_token: String,
        refresh_token: Option<String>,
    },
}

impl OAuthCallback {
    /// Decide the callback shape from its key/value parameters.
    /// Exactly one of `code` or `access_token` must be present.
    pub fn from_params<I, K, V>(params: I) -> Result<Self, AuthError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut code = None;
        let mut access_token = None;
        let mut refresh_token = None;
        let mut error = None;

        for (key, value) in params {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "code" => code = Some(value.to_string()),
                "access_token" => access_token = Some(value.to_string()),
                "refresh_token" => refresh_token = Some(value.to_string()),
                "error_description" => error = Some(value.to_string()),
                "error" => {
                    error.get_or_insert_with(|| value.to_string());
                }
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(AuthError::InvalidCallback(error));
        }

        match (code, access_token) {
            (Some(code), None) => Ok(OAuthCallback::Code(code)),
            (None, Some(access_token)) => Ok(OAuthCallback::TokenFragment {
                access_token,
                refresh_token,
            }),
            _ => Err(AuthError::invalid_callback()),
        }
    }

    /// Parse a full redirect URL, or just its `?query` / `#fragment` part.
    /// Query and fragment parameters are both consulted.
    pub fn from_url(input: &str) -> Result<Self, AuthError> {
        let input = input.trim();
        let mut params = Vec::new();

        if let Ok(url) = Url::parse(input) {
            params.extend(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())));
            if let Some(fragment) = url.fragment() {
                params.extend(parse_pairs(fragment));
            }
        } else {
            params.extend(parse_pairs(input.trim_start_matches(['?', '#'])));
        }

        Self::from_params(params)
    }
}

/// Decode an `application/x-www-form-urlencoded` string.
fn parse_pairs(encoded: &str) -> Vec<(String, String)> {
    Url::parse(&format!("http://callback.invalid/?{}", encoded))
        .map(|url| {
            url.query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}
