//! The token ledger: issue, resolve and revoke scoped bearer tokens.
//!
//! A plaintext is 16 random bytes encoded as unpadded base32 (26 characters).
//! Only its SHA-256 digest is stored. Resolution recomputes the digest, looks
//! it up by scope and checks the expiry, so wrong-scope, expired and unknown
//! tokens all come back as `None`.

use crate::error::AuthError;
use chrono::{DateTime, TimeDelta, Utc};
use data_encoding::BASE32_NOPAD;
use marquee_core::model::{Scope, TokenHash, TokenRecord, User};
use marquee_core::store::{TokenStore, UserStore};
use marquee_core::validation::TOKEN_PLAINTEXT_LEN;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const TOKEN_ENTROPY_BYTES: usize = 16;

/// A freshly minted token. The only place the plaintext ever exists.
#[derive(Clone)]
pub struct IssuedToken {
    plaintext: String,
    pub hash: TokenHash,
    pub user_id: i64,
    pub scope: Scope,
    pub expiry: DateTime<Utc>,
}

impl IssuedToken {
    pub fn plaintext(&self) -> &str {
        &self.plaintext
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("plaintext", &"<redacted>")
            .field("hash", &self.hash)
            .field("user_id", &self.user_id)
            .field("scope", &self.scope)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// SHA-256 of the plaintext bytes.
pub fn hash_plaintext(plaintext: &str) -> TokenHash {
    let digest = Sha256::digest(plaintext.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    TokenHash::from_bytes(bytes)
}

fn generate_plaintext() -> String {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    BASE32_NOPAD.encode(&bytes)
}

/// Right length and decodes as base32. Anything else cannot have been issued.
fn is_well_formed(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_PLAINTEXT_LEN && BASE32_NOPAD.decode(plaintext.as_bytes()).is_ok()
}

/// Issues and resolves scoped tokens against the token and user stores.
#[derive(Clone)]
pub struct TokenLedger {
    tokens: Arc<dyn TokenStore>,
    users: Arc<dyn UserStore>,
}

impl TokenLedger {
    pub fn new(tokens: Arc<dyn TokenStore>, users: Arc<dyn UserStore>) -> Self {
        Self { tokens, users }
    }

    /// Mint a token for `user_id` valid for `ttl` from now.
    pub async fn issue(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: Scope,
    ) -> Result<IssuedToken, AuthError> {
        self.issue_at(user_id, ttl, scope, Utc::now()).await
    }

    pub async fn issue_at(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let ttl_delta = TimeDelta::from_std(ttl).map_err(|_| AuthError::InvalidTtl(ttl))?;
        let expiry = now
            .checked_add_signed(ttl_delta)
            .ok_or(AuthError::InvalidTtl(ttl))?;

        let plaintext = generate_plaintext();
        let record = TokenRecord {
            hash: hash_plaintext(&plaintext),
            user_id,
            scope,
            expiry,
        };
        self.tokens.insert_token(&record).await?;

        tracing::debug!(user_id, scope = %scope, %expiry, "issued token");

        Ok(IssuedToken {
            plaintext,
            hash: record.hash,
            user_id,
            scope,
            expiry,
        })
    }

    /// The owner of `plaintext` if it is a live token of `scope`.
    ///
    /// `None` covers unknown, wrong-scope, expired and malformed plaintexts
    /// alike, as well as tokens whose owner no longer exists. Only store
    /// failures are errors.
    pub async fn resolve(&self, scope: Scope, plaintext: &str) -> Result<Option<User>, AuthError> {
        self.resolve_at(scope, plaintext, Utc::now()).await
    }

    pub async fn resolve_at(
        &self,
        scope: Scope,
        plaintext: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AuthError> {
        if !is_well_formed(plaintext) {
            return Ok(None);
        }

        let hash = hash_plaintext(plaintext);
        let Some(record) = self.tokens.find_token(&hash, scope).await? else {
            return Ok(None);
        };
        if !record.is_live_at(now) {
            return Ok(None);
        }

        Ok(self.users.get(record.user_id).await?)
    }

    /// Delete every outstanding token of `scope` for `user_id`.
    pub async fn revoke_all(&self, scope: Scope, user_id: i64) -> Result<u64, AuthError> {
        let removed = self.tokens.delete_tokens_for_user(scope, user_id).await?;
        tracing::debug!(user_id, scope = %scope, removed, "revoked tokens");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use marquee_core::MemoryStore;
    use marquee_core::model::{NewUser, PasswordHash};

    async fn ledger_with_user() -> (TokenLedger, Arc<MemoryStore>, User) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .insert_user(&NewUser {
                name: "Faith".to_string(),
                email: "faith@example.com".to_string(),
                password_hash: PasswordHash::new("hash"),
                activated: true,
            })
            .await
            .unwrap();
        let ledger = TokenLedger::new(store.clone(), store.clone());
        (ledger, store, user)
    }

    #[test]
    fn test_plaintext_shape() {
        let plaintext = generate_plaintext();
        assert_eq!(plaintext.len(), 26);
        assert!(is_well_formed(&plaintext));
        assert_ne!(plaintext, generate_plaintext());
    }

    #[test]
    fn test_hash_is_sha256_of_plaintext() {
        let hash = hash_plaintext("Y3QMGX3PJ3WLRL2YRTQGQ6KRHU");
        assert_eq!(hash, hash_plaintext("Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"));
        assert_ne!(hash, hash_plaintext("Y3QMGX3PJ3WLRL2YRTQGQ6KRHV"));
    }

    #[test]
    fn test_malformed_plaintexts() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("short"));
        // '1' is outside the base32 alphabet
        assert!(!is_well_formed("1111111111111111111111111A"));
    }

    #[tokio::test]
    async fn test_issue_then_resolve() {
        let (ledger, store, user) = ledger_with_user().await;
        let token = ledger
            .issue(user.id, Duration::from_secs(3600), Scope::Authentication)
            .await
            .unwrap();
        assert_eq!(store.token_count(), 1);

        let resolved = ledger
            .resolve(Scope::Authentication, token.plaintext())
            .await
            .unwrap();
        assert_eq!(resolved.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_wrong_scope_expired_and_unknown_are_all_none() {
        let (ledger, _store, user) = ledger_with_user().await;
        let now = Utc::now();
        let token = ledger
            .issue_at(user.id, Duration::from_secs(60), Scope::Activation, now)
            .await
            .unwrap();

        let wrong_scope = ledger
            .resolve_at(Scope::Authentication, token.plaintext(), now)
            .await
            .unwrap();
        let expired = ledger
            .resolve_at(
                Scope::Activation,
                token.plaintext(),
                now + ChronoDuration::seconds(60),
            )
            .await
            .unwrap();
        let unknown = ledger
            .resolve_at(Scope::Activation, &generate_plaintext(), now)
            .await
            .unwrap();
        let malformed = ledger
            .resolve_at(Scope::Activation, "not-a-token", now)
            .await
            .unwrap();

        assert!(wrong_scope.is_none());
        assert!(expired.is_none());
        assert!(unknown.is_none());
        assert!(malformed.is_none());

        let live = ledger
            .resolve_at(
                Scope::Activation,
                token.plaintext(),
                now + ChronoDuration::seconds(59),
            )
            .await
            .unwrap();
        assert!(live.is_some());
    }

    #[tokio::test]
    async fn test_revoke_all_only_touches_scope() {
        let (ledger, _store, user) = ledger_with_user().await;
        let ttl = Duration::from_secs(600);
        let auth = ledger.issue(user.id, ttl, Scope::Authentication).await.unwrap();
        let reset = ledger.issue(user.id, ttl, Scope::PasswordReset).await.unwrap();

        let removed = ledger.revoke_all(Scope::PasswordReset, user.id).await.unwrap();
        assert_eq!(removed, 1);

        assert!(ledger
            .resolve(Scope::PasswordReset, reset.plaintext())
            .await
            .unwrap()
            .is_none());
        assert!(ledger
            .resolve(Scope::Authentication, auth.plaintext())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_store_failure_is_an_error() {
        let (ledger, store, user) = ledger_with_user().await;
        let token = ledger
            .issue(user.id, Duration::from_secs(60), Scope::Authentication)
            .await
            .unwrap();
        store.set_unavailable(true);
        let err = ledger
            .resolve(Scope::Authentication, token.plaintext())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
    }

    #[tokio::test]
    async fn test_debug_redacts_plaintext() {
        let (ledger, _store, user) = ledger_with_user().await;
        let token = ledger
            .issue(user.id, Duration::from_secs(60), Scope::Authentication)
            .await
            .unwrap();
        let rendered = format!("{token:?}");
        assert!(!rendered.contains(token.plaintext()));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_absurd_ttl_is_rejected() {
        let (ledger, _store, user) = ledger_with_user().await;
        let err = ledger
            .issue(user.id, Duration::MAX, Scope::Authentication)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidTtl(_)));
    }
}
