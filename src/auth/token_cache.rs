use arc_swap::ArcSwapOption;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::AuthContext;

/// One usable access token with its account id and expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenCacheEntry {
    pub token: String,
    pub account_id: String,
    pub expiry: DateTime<Utc>,
}

impl std::fmt::Debug for TokenCacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCacheEntry")
            .field("token", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl TokenCacheEntry {
    /// Usable iff `now < expiry - buffer`.
    pub fn is_usable(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now < self.expiry - buffer
    }

    pub fn context(&self) -> AuthContext {
        AuthContext {
            access_token: self.token.clone(),
            account_id: self.account_id.clone(),
        }
    }
}

/// Process-wide token slot. Readers never block; writers swap the whole entry.
#[derive(Debug, Default)]
pub struct TokenCache {
    current: ArcSwapOption<TokenCacheEntry>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last stored entry, usable or not.
    pub fn peek(&self) -> Option<Arc<TokenCacheEntry>> {
        self.current.load_full()
    }

    pub fn get_usable(&self, now: DateTime<Utc>, buffer: Duration) -> Option<Arc<TokenCacheEntry>> {
        self.peek().filter(|entry| entry.is_usable(now, buffer))
    }

    pub fn store(&self, entry: TokenCacheEntry) {
        self.current.store(Some(Arc::new(entry)));
    }
}
