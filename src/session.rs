//! Drives a handshake across the user's visit to the forum.
//!
//! [`HandshakeSession::begin`] issues a handshake, builds the authorization
//! URL and stores the key material under the session key.
//! [`HandshakeSession::complete`] restores it, decrypts the payload the user
//! brings back and discards the key material.

use zeroize::Zeroizing;

use crate::{
    common::{
        config::{ConsumePolicy, HandshakeConfig},
        errors::{
            BeginHandshakeError, CompleteHandshakeError, DecryptPayloadError, IssueHandshakeError,
        },
        scope::ScopeSet,
        store::{HandshakeField, HandshakeStore, SessionKey},
    },
    handshake::{
        Handshake, HandshakeResult,
        issuer::KeyPairIssuer,
        request::{AuthorizationRequestBuilder, AuthorizationUrl, validate_base_url},
        response::PayloadDecryptor,
    },
};

/// What the application asks the forum for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Base URL of the forum, e.g. `https://forum.example`.
    pub base_url: String,
    /// Application name shown to the user on the authorization page.
    pub application_name: String,
    /// Client id; a random one is generated when `None` or empty.
    pub client_id: Option<String>,
    /// Requested scope names; empty means the default set.
    pub scopes: Vec<String>,
    /// Optional redirect target for the encrypted payload.
    pub auth_redirect: Option<String>,
    /// Optional push notification endpoint.
    pub push_url: Option<String>,
}

impl HandshakeRequest {
    /// Creates a request for the default scope set.
    pub fn new(base_url: impl Into<String>, application_name: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            application_name: application_name.into(),
            client_id: None,
            scopes: Vec::new(),
            auth_redirect: None,
            push_url: None,
        }
    }

    /// Sets the client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the requested scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

/// Whether a session can currently accept a payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// No handshake is pending. Either none was started, or the last one was
    /// consumed.
    Idle,
    /// A handshake was started and waits for the forum's payload.
    AwaitingPayload,
}

/// One user's handshake, backed by a [`HandshakeStore`].
#[derive(Debug)]
pub struct HandshakeSession<'a, S: HandshakeStore> {
    store: &'a S,
    session_key: SessionKey,
    config: HandshakeConfig,
    issuer: Option<KeyPairIssuer>,
}

impl<'a, S: HandshakeStore> HandshakeSession<'a, S> {
    /// Creates a session with the default configuration.
    pub fn new(store: &'a S, session_key: SessionKey) -> Self {
        Self::with_config(store, session_key, HandshakeConfig::default())
    }

    /// Creates a session with a custom configuration.
    pub fn with_config(store: &'a S, session_key: SessionKey, config: HandshakeConfig) -> Self {
        Self {
            store,
            session_key,
            config,
            issuer: None,
        }
    }

    /// Uses `issuer` instead of one built from the configured key size.
    #[must_use]
    pub fn with_issuer(mut self, issuer: KeyPairIssuer) -> Self {
        self.issuer = Some(issuer);
        self
    }

    /// Returns the key the session's state is stored under.
    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    /// Starts a handshake and returns the URL the user has to open.
    ///
    /// Input is validated before any key is generated, and nothing is stored
    /// unless the URL could be built. A pending handshake of the same session
    /// is replaced.
    ///
    /// # Errors
    /// Returns an error if a scope or the base URL is invalid, or if key
    /// generation fails.
    pub async fn begin(
        &self,
        request: &HandshakeRequest,
    ) -> Result<AuthorizationUrl, BeginHandshakeError> {
        let scopes = ScopeSet::parse(&request.scopes)?;
        validate_base_url(&request.base_url)?;
        let issuer = match self.issuer {
            Some(issuer) => issuer,
            None => KeyPairIssuer::with_key_bits(self.config.key_bits)?,
        };

        let handshake = issuer.issue_async(request.client_id.clone()).await?;

        let mut builder = AuthorizationRequestBuilder::new();
        if let Some(auth_redirect) = &request.auth_redirect {
            builder = builder.auth_redirect(auth_redirect);
        }
        if let Some(push_url) = &request.push_url {
            builder = builder.push_url(push_url);
        }
        let url = builder.build_with_scopes(
            &request.base_url,
            &request.application_name,
            &handshake,
            scopes,
        )?;

        self.persist(&handshake).await?;
        tracing::debug!(
            client_id = %handshake.client_id(),
            key_id = %handshake.key_id(),
            "handshake awaiting payload"
        );
        Ok(url)
    }

    /// Redeems the encrypted payload returned by the forum.
    ///
    /// On success the private key and nonce are removed from the store. On
    /// failure they are kept for another attempt, unless the session uses
    /// [`ConsumePolicy::OnAttempt`] and the payload was valid base64.
    ///
    /// A handshake is redeemed at most once: when the same payload is
    /// submitted concurrently, only the call that takes the stored nonce
    /// succeeds and the others get [`CompleteHandshakeError::HandshakeNotFound`].
    ///
    /// # Errors
    /// Returns an error if no handshake is pending or the payload is rejected.
    pub async fn complete(
        &self,
        ciphertext_b64: &str,
    ) -> Result<HandshakeResult, CompleteHandshakeError> {
        let handshake = self.restore().await?;

        match PayloadDecryptor::new().decrypt(ciphertext_b64, &handshake) {
            Ok(result) => {
                if !self.claim(&handshake).await {
                    tracing::warn!(
                        client_id = %handshake.client_id(),
                        key_id = %handshake.key_id(),
                        "handshake already redeemed"
                    );
                    return Err(CompleteHandshakeError::HandshakeNotFound);
                }
                tracing::info!(
                    client_id = %result.client_id(),
                    api = result.payload().api,
                    "handshake completed"
                );
                Ok(result)
            }
            Err(DecryptPayloadError::Encoding) => {
                tracing::debug!(client_id = %handshake.client_id(), "payload is not base64");
                Err(DecryptPayloadError::Encoding.into())
            }
            Err(err) => {
                tracing::warn!(
                    client_id = %handshake.client_id(),
                    key_id = %handshake.key_id(),
                    error = %err,
                    "payload rejected"
                );
                if self.config.consume_policy == ConsumePolicy::OnAttempt {
                    self.consume().await;
                }
                Err(err.into())
            }
        }
    }

    /// Reports whether a payload can currently be redeemed.
    pub async fn status(&self) -> HandshakeStatus {
        for field in [
            HandshakeField::PrivateKeyPem,
            HandshakeField::ClientId,
            HandshakeField::Nonce,
        ] {
            let value = self.store.get(&self.session_key, field).await;
            if value.map(Zeroizing::new).is_none() {
                return HandshakeStatus::Idle;
            }
        }
        HandshakeStatus::AwaitingPayload
    }

    async fn persist(&self, handshake: &Handshake) -> Result<(), BeginHandshakeError> {
        let private_key_pem = handshake
            .private_key_pem()
            .ok_or(IssueHandshakeError::KeyGeneration)?;
        self.store
            .put(
                &self.session_key,
                HandshakeField::PrivateKeyPem,
                private_key_pem.to_string(),
            )
            .await;
        self.store
            .put(
                &self.session_key,
                HandshakeField::ClientId,
                handshake.client_id().to_string(),
            )
            .await;
        self.store
            .put(
                &self.session_key,
                HandshakeField::Nonce,
                handshake.nonce().to_string(),
            )
            .await;
        Ok(())
    }

    async fn restore(&self) -> Result<Handshake, CompleteHandshakeError> {
        let private_key_pem = Zeroizing::new(
            self.store
                .get(&self.session_key, HandshakeField::PrivateKeyPem)
                .await
                .ok_or(CompleteHandshakeError::HandshakeNotFound)?,
        );
        let client_id = self
            .store
            .get(&self.session_key, HandshakeField::ClientId)
            .await
            .ok_or(CompleteHandshakeError::HandshakeNotFound)?;
        let nonce = self
            .store
            .get(&self.session_key, HandshakeField::Nonce)
            .await
            .ok_or(CompleteHandshakeError::HandshakeNotFound)?;

        Handshake::restore(client_id, nonce, &private_key_pem)
            .ok_or(CompleteHandshakeError::CorruptedState)
    }

    /// Takes the nonce `handshake` was restored with and discards the private
    /// key. Returns false if another call got there first.
    async fn claim(&self, handshake: &Handshake) -> bool {
        let taken = self
            .store
            .take(&self.session_key, HandshakeField::Nonce)
            .await
            .map(Zeroizing::new);
        match taken {
            Some(nonce) if nonce.as_str() == handshake.nonce() => {
                self.store
                    .delete(&self.session_key, HandshakeField::PrivateKeyPem)
                    .await;
                true
            }
            // A newer handshake replaced this one; leave it in place.
            Some(nonce) => {
                self.store
                    .put(&self.session_key, HandshakeField::Nonce, nonce.to_string())
                    .await;
                false
            }
            None => false,
        }
    }

    /// Discards the key material. The client id stays for display.
    async fn consume(&self) {
        self.store
            .delete(&self.session_key, HandshakeField::PrivateKeyPem)
            .await;
        self.store
            .delete(&self.session_key, HandshakeField::Nonce)
            .await;
    }
}
