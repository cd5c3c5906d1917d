//! Audience and token issuing on top of a [`TokenStore`].

use std::{fmt, sync::Arc};

use chrono::Utc;
use parking_lot::RwLock;
use tokenauth_store::{
    Audience, DEFAULT_TOKEN_PERIOD, ManagedStore, StoreError, Token, TokenStore,
};
use zeroize::Zeroizing;

use crate::{
    error::{AuthError, Result},
    object_id::ObjectId,
    provider::{SecretProvider, TokenProvider},
};

/// Issues audiences and tokens and validates presented tokens.
///
/// Holds the store explicitly; several independent instances may coexist in
/// one process. The store can be swapped at runtime with
/// [`replace_store`](Self::replace_store).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tokenauth::{DefaultProvider, TokenAuth};
/// use tokenauth_store::MemoryTokenStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tokenauth::AuthError> {
/// let auth = TokenAuth::builder().store(Arc::new(MemoryTokenStore::new())).build();
/// let provider = DefaultProvider::default();
///
/// let client = auth.new_audience("billing", &provider).await?;
/// let token = auth.new_token(&client, &provider).await?;
///
/// let checked = auth.validate_token(&token.value).await?;
/// assert_eq!(checked, token);
/// # Ok(())
/// # }
/// ```
pub struct TokenAuth {
    store: RwLock<Arc<dyn TokenStore>>,
    replacing: tokio::sync::Mutex<()>,
    token_period: u64,
}

#[bon::bon]
impl TokenAuth {
    /// Creates an issuer over `store`.
    ///
    /// `token_period` is the lifetime, in seconds, given to audiences this
    /// issuer creates; zero makes their tokens never expire.
    #[builder]
    pub fn new(
        store: Arc<dyn TokenStore>,
        #[builder(default = DEFAULT_TOKEN_PERIOD)] token_period: u64,
    ) -> Self {
        Self { store: RwLock::new(store), replacing: tokio::sync::Mutex::new(()), token_period }
    }
}

impl TokenAuth {
    /// Returns the current store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.store.read())
    }

    /// Token lifetime given to new audiences.
    #[must_use]
    pub fn token_period(&self) -> u64 {
        self.token_period
    }

    /// Closes the current store and switches to `store`.
    ///
    /// Audiences and tokens created afterwards go to the new store.
    ///
    /// Only the store is closed. If it came from
    /// [`ManagedStore::store`], its janitor keeps running until that
    /// [`ManagedStore`] is closed; use
    /// [`replace_managed_store`](Self::replace_managed_store) instead.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if closing the current store fails; the
    /// current store is kept in that case.
    #[tracing::instrument(skip_all)]
    pub async fn replace_store(&self, store: Arc<dyn TokenStore>) -> Result<()> {
        let _replacing = self.replacing.lock().await;
        let previous = self.store();
        previous.close().await?;
        *self.store.write() = store;
        tracing::info!("token store replaced");
        Ok(())
    }

    /// Shuts down `previous` (janitor first, then its store) and switches
    /// to `store`.
    ///
    /// `previous` is expected to be the managed store this instance
    /// currently issues into.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if closing `previous` fails; the
    /// current store is kept in that case.
    #[tracing::instrument(skip_all)]
    pub async fn replace_managed_store(
        &self,
        previous: ManagedStore,
        store: Arc<dyn TokenStore>,
    ) -> Result<()> {
        let _replacing = self.replacing.lock().await;
        previous.close().await?;
        *self.store.write() = store;
        tracing::info!("managed token store replaced");
        Ok(())
    }

    /// Builds a new audience without persisting it.
    ///
    /// The ID is a fresh [`ObjectId`]; the secret comes from `secrets`.
    #[must_use]
    pub fn new_audience_not_store(
        &self,
        name: impl Into<String>,
        secrets: &impl SecretProvider,
    ) -> Audience {
        let id = ObjectId::new().hex();
        let secret = Zeroizing::new(secrets.generate_secret(&id));
        Audience { name: name.into(), id, secret, token_period: self.token_period }
    }

    /// Builds a new audience and saves it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the save fails.
    #[tracing::instrument(skip_all)]
    pub async fn new_audience(
        &self,
        name: impl Into<String>,
        secrets: &impl SecretProvider,
    ) -> Result<Audience> {
        let audience = self.new_audience_not_store(name, secrets);
        self.store().save_audience(&audience).await?;
        tracing::debug!(audience = %audience.id, "audience created");
        Ok(audience)
    }

    /// Replaces the audience's secret and saves it.
    ///
    /// Saving an audience again discards every token issued under it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the save fails. The new secret is
    /// already set on `audience` in that case.
    #[tracing::instrument(skip_all, fields(audience = %audience.id))]
    pub async fn rotate_secret(
        &self,
        audience: &mut Audience,
        secrets: &impl SecretProvider,
    ) -> Result<()> {
        audience.secret = Zeroizing::new(secrets.generate_secret(&audience.id));
        self.store().save_audience(audience).await?;
        Ok(())
    }

    /// Issues and saves a token under `audience`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the audience is not saved, the
    /// provider returns an empty value, or the save fails.
    #[tracing::instrument(skip_all, fields(audience = %audience.id))]
    pub async fn new_token(
        &self,
        audience: &Audience,
        tokens: &impl TokenProvider,
    ) -> Result<Token> {
        let token = Token::for_audience(audience, tokens.generate_token(audience), now());
        self.store().save_token(&token).await?;
        Ok(token)
    }

    /// Issues and saves the token occupying `single_id`'s slot, replacing
    /// whichever token held it.
    ///
    /// The lifetime and value come from `audience`, which need not be saved.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the save fails.
    #[tracing::instrument(skip_all, fields(single_id = %single_id))]
    pub async fn new_single_token(
        &self,
        single_id: &str,
        audience: &Audience,
        tokens: &impl TokenProvider,
    ) -> Result<Token> {
        let token = Token::single(single_id, audience, tokens.generate_token(audience), now());
        self.store().save_token(&token).await?;
        Ok(token)
    }

    /// Looks up a presented token and checks its deadline.
    ///
    /// An expired token is deleted before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`AuthError::TokenEmpty`] if `value` is empty
    /// - [`AuthError::InvalidToken`] if no token has this value
    /// - [`AuthError::TokenExpired`] carrying the deleted record if the deadline has passed
    /// - [`AuthError::Store`] if the store fails
    #[tracing::instrument(skip_all)]
    pub async fn validate_token(&self, value: &str) -> Result<Token> {
        if value.is_empty() {
            return Err(AuthError::TokenEmpty);
        }
        let store = self.store();
        let token = match store.get_token(value).await? {
            Some(token) if !token.value.is_empty() => token,
            _ => return Err(AuthError::InvalidToken),
        };

        if token.is_expired() {
            match store.delete_token(&token.value).await {
                // A concurrent sweep may have removed it first.
                Ok(()) | Err(StoreError::TokenNotFound { .. }) => {},
                Err(e) => return Err(e.into()),
            }
            tracing::debug!(dead_line = token.dead_line, "expired token deleted");
            return Err(AuthError::TokenExpired { token: Box::new(token) });
        }
        Ok(token)
    }
}

impl fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuth")
            .field("token_period", &self.token_period)
            .finish_non_exhaustive()
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use tokenauth_store::MemoryTokenStore;

    use super::*;
    use crate::provider::DefaultProvider;

    fn fixed_secret(_client_id: &str) -> String {
        "TestForSecretString".to_owned()
    }

    fn fixed_token(_audience: &Audience) -> String {
        "TestForNewTokenString".to_owned()
    }

    fn memory_auth(token_period: u64) -> (TokenAuth, MemoryTokenStore) {
        let store = MemoryTokenStore::new();
        let auth =
            TokenAuth::builder().store(Arc::new(store.clone())).token_period(token_period).build();
        (auth, store)
    }

    #[tokio::test]
    async fn test_new_audience_is_saved() {
        let (auth, store) = memory_auth(DEFAULT_TOKEN_PERIOD);
        let audience = auth.new_audience("forTest", &fixed_secret).await.unwrap();
        assert_eq!(audience.name, "forTest");
        assert_eq!(audience.secret.as_str(), "TestForSecretString");
        assert_eq!(audience.token_period, DEFAULT_TOKEN_PERIOD);
        assert_eq!(audience.id.len(), 24);

        let loaded = store.get_audience(&audience.id).await.unwrap();
        assert_eq!(loaded, Some(audience));
    }

    #[tokio::test]
    async fn test_new_audience_not_store() {
        let (auth, store) = memory_auth(10);
        let audience = auth.new_audience_not_store("ghost", &fixed_secret);
        assert_eq!(audience.token_period, 10);
        assert!(store.get_audience(&audience.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_new_token_is_saved() {
        let (auth, store) = memory_auth(10);
        let audience = auth.new_audience("forTest", &fixed_secret).await.unwrap();
        let token = auth.new_token(&audience, &fixed_token).await.unwrap();
        assert_eq!(token.client_id, audience.id);
        assert_eq!(token.value, "TestForNewTokenString");
        assert!(token.dead_line > 0);
        assert_eq!(store.get_token(&token.value).await.unwrap(), Some(token));
    }

    #[tokio::test]
    async fn test_new_token_for_unsaved_audience_fails() {
        let (auth, _store) = memory_auth(10);
        let audience = auth.new_audience_not_store("ghost", &fixed_secret);
        let err = auth.new_token(&audience, &fixed_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Store(StoreError::AudienceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_single_token_for_unsaved_audience() {
        let (auth, store) = memory_auth(10);
        let provider = DefaultProvider::default();
        let global = auth.new_audience_not_store("globalClient", &provider);
        let first = auth.new_single_token("user-1", &global, &provider).await.unwrap();
        let second = auth.new_single_token("user-1", &global, &provider).await.unwrap();

        assert!(first.is_single());
        assert_ne!(first.value, second.value);
        assert!(matches!(auth.validate_token(&first.value).await, Err(AuthError::InvalidToken)));
        assert_eq!(auth.validate_token(&second.value).await.unwrap(), second);
        assert_eq!(store.single_slot("user-1"), Some(second.value));
    }

    #[tokio::test]
    async fn test_validate_rejects_empty_and_unknown() {
        let (auth, _store) = memory_auth(10);
        assert!(matches!(auth.validate_token("").await, Err(AuthError::TokenEmpty)));
        assert!(matches!(auth.validate_token(" ").await, Err(AuthError::InvalidToken)));
        assert!(matches!(auth.validate_token("empty").await, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_validate_deletes_expired_token() {
        let (auth, store) = memory_auth(1);
        let audience = auth.new_audience("forTest", &fixed_secret).await.unwrap();
        let token = auth.new_token(&audience, &fixed_token).await.unwrap();
        assert_eq!(auth.validate_token(&token.value).await.unwrap(), token);

        tokio::time::sleep(Duration::from_millis(2_100)).await;

        let err = auth.validate_token(&token.value).await.unwrap_err();
        let stale = err.expired_token().expect("expired error carries the token");
        assert_eq!(stale, &token);
        assert!(stale.is_expired());
        assert!(store.get_token(&token.value).await.unwrap().is_none());
        assert!(matches!(auth.validate_token(&token.value).await, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_zero_period_never_expires() {
        let (auth, _store) = memory_auth(0);
        let audience = auth.new_audience("forever", &fixed_secret).await.unwrap();
        let token = auth.new_token(&audience, &DefaultProvider::default()).await.unwrap();
        assert_eq!(token.dead_line, 0);
        let single =
            auth.new_single_token("slot", &audience, &DefaultProvider::default()).await.unwrap();
        assert_eq!(single.dead_line, 0);
        assert!(auth.validate_token(&single.value).await.is_ok());
    }

    #[tokio::test]
    async fn test_rotate_secret_discards_tokens() {
        let (auth, store) = memory_auth(60);
        let provider = DefaultProvider::default();
        let mut audience = auth.new_audience("rotating", &provider).await.unwrap();
        let before = auth.new_token(&audience, &provider).await.unwrap();
        let old_secret = audience.secret.clone();

        auth.rotate_secret(&mut audience, &provider).await.unwrap();
        assert_ne!(audience.secret, old_secret);
        assert_eq!(store.get_audience(&audience.id).await.unwrap(), Some(audience.clone()));
        assert!(matches!(auth.validate_token(&before.value).await, Err(AuthError::InvalidToken)));

        let after = auth.new_token(&audience, &provider).await.unwrap();
        assert_ne!(after.value, before.value);
        assert!(auth.validate_token(&after.value).await.is_ok());
    }

    #[tokio::test]
    async fn test_tokens_unique_across_rotation() {
        let (auth, _store) = memory_auth(60);
        let provider = DefaultProvider::default();
        let mut audience = auth.new_audience("uniq", &provider).await.unwrap();

        let mut values = HashSet::new();
        for round in 0..3 {
            for _ in 0..20 {
                let token = auth.new_token(&audience, &provider).await.unwrap();
                assert!(values.insert(token.value), "duplicate token in round {round}");
            }
            auth.rotate_secret(&mut audience, &provider).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_replace_store_closes_previous() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = MemoryTokenStore::new();
        let config = tokenauth_store::StoreConfig::builder()
            .path(dir.path().join("first"))
            .build()
            .unwrap();
        first.open(&config).await.unwrap();
        assert!(first.location().is_some());

        let auth = TokenAuth::builder().store(Arc::new(first.clone())).build();
        let second = MemoryTokenStore::new();
        auth.replace_store(Arc::new(second.clone())).await.unwrap();

        assert!(first.location().is_none());
        let audience = auth.new_audience("moved", &fixed_secret).await.unwrap();
        assert!(second.get_audience(&audience.id).await.unwrap().is_some());
        assert!(first.get_audience(&audience.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_managed_store_stops_janitor() {
        let registry = crate::defaults::default_registry().unwrap();
        let config = tokenauth_store::StoreConfig::builder().path("managed").build().unwrap();
        let managed = registry.open(crate::MEMORY_BACKEND, &config).await.unwrap();
        assert!(managed.janitor().is_some_and(|j| j.is_running()));

        let previous = managed.store();
        let auth = TokenAuth::builder().store(managed.store()).build();
        let next = MemoryTokenStore::new();
        auth.replace_managed_store(managed, Arc::new(next.clone())).await.unwrap();

        // The janitor task and the issuer both let go of the old store.
        assert_eq!(Arc::strong_count(&previous), 1);
        let audience = auth.new_audience("moved", &fixed_secret).await.unwrap();
        assert!(next.get_audience(&audience.id).await.unwrap().is_some());
    }

    #[test]
    fn test_debug_hides_store() {
        let (auth, _store) = memory_auth(5);
        assert_eq!(format!("{auth:?}"), "TokenAuth { token_period: 5, .. }");
    }
}
