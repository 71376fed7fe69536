//! Bearer credential lifecycle: on-disk record, in-memory cache, refresh, account claim.

mod credentials;
mod identity;
mod manager;
mod refresh;
mod token_cache;

pub use credentials::{CredentialRecord, CredentialStore};
pub use manager::AuthManager;
pub use refresh::{OauthRefresher, RefreshedToken, TokenRefresher};
pub use token_cache::{TokenCache, TokenCacheEntry};

/// What every backend call needs: the bearer token and the account it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub access_token: String,
    pub account_id: String,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("access_token", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}
