//! Builds the authorization URL the user opens on the forum.

use std::fmt;

use url::Url;

use crate::{
    AUTHORIZATION_PATH,
    common::{errors::BuildRequestError, scope::ScopeSet},
};

use super::Handshake;

/// Authorization request, ready to be opened in the user's browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationUrl {
    url: String,
    scopes: ScopeSet,
}

impl AuthorizationUrl {
    /// Returns the URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Returns the scopes that were requested.
    #[must_use]
    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }
}

impl fmt::Display for AuthorizationUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl From<AuthorizationUrl> for String {
    fn from(url: AuthorizationUrl) -> Self {
        url.url
    }
}

/// Serializes a handshake into an authorization request.
///
/// Parameters are emitted in a fixed order:
///
/// ```text
/// application_name, client_id, scopes, public_key, nonce[, auth_redirect][, push_url]
/// ```
#[derive(Debug, Clone, Default)]
pub struct AuthorizationRequestBuilder {
    auth_redirect: Option<String>,
    push_url: Option<String>,
}

impl AuthorizationRequestBuilder {
    /// Creates a builder without optional parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the forum to redirect to `url` with the encrypted payload instead
    /// of displaying it.
    #[must_use]
    pub fn auth_redirect(mut self, url: impl Into<String>) -> Self {
        self.auth_redirect = Some(url.into());
        self
    }

    /// Sets the URL the forum pushes notifications to.
    #[must_use]
    pub fn push_url(mut self, url: impl Into<String>) -> Self {
        self.push_url = Some(url.into());
        self
    }

    /// Builds the authorization URL for `handshake`.
    ///
    /// An empty `scopes` list requests the default scope set.
    ///
    /// # Errors
    /// Returns an error if a scope is not permitted or `base_url` is not an
    /// absolute http(s) URL.
    pub fn build<I, S>(
        &self,
        base_url: &str,
        app_name: &str,
        handshake: &Handshake,
        scopes: I,
    ) -> Result<AuthorizationUrl, BuildRequestError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let scopes = ScopeSet::parse(scopes)?;
        self.build_with_scopes(base_url, app_name, handshake, scopes)
    }

    /// Builds the authorization URL for `handshake` from validated scopes.
    ///
    /// # Errors
    /// Returns an error if `base_url` is not an absolute http(s) URL.
    pub fn build_with_scopes(
        &self,
        base_url: &str,
        app_name: &str,
        handshake: &Handshake,
        scopes: ScopeSet,
    ) -> Result<AuthorizationUrl, BuildRequestError> {
        let base_url = validate_base_url(base_url)?;

        let scope_param = scopes.to_param();
        let mut params = vec![
            ("application_name", app_name),
            ("client_id", handshake.client_id()),
            ("scopes", scope_param.as_str()),
            ("public_key", handshake.public_key_pem()),
            ("nonce", handshake.nonce()),
        ];
        if let Some(auth_redirect) = &self.auth_redirect {
            params.push(("auth_redirect", auth_redirect.as_str()));
        }
        if let Some(push_url) = &self.push_url {
            params.push(("push_url", push_url.as_str()));
        }

        let query = params
            .iter()
            .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{base_url}{AUTHORIZATION_PATH}?{query}");

        tracing::debug!(
            client_id = %handshake.client_id(),
            key_id = %handshake.key_id(),
            scopes = %scope_param,
            "built authorization request"
        );
        Ok(AuthorizationUrl { url, scopes })
    }
}

/// Checks that `base_url` is an absolute http(s) URL the authorization path
/// can be appended to, and strips trailing slashes.
pub(crate) fn validate_base_url(base_url: &str) -> Result<&str, BuildRequestError> {
    let parsed = Url::parse(base_url).map_err(|_| BuildRequestError::InvalidBaseUrl)?;
    if !matches!(parsed.scheme(), "http" | "https")
        || parsed.cannot_be_a_base()
        || parsed.query().is_some()
        || parsed.fragment().is_some()
    {
        return Err(BuildRequestError::InvalidBaseUrl);
    }
    Ok(base_url.trim_end_matches('/'))
}
