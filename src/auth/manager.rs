use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::identity::account_id_from_access_token;
use super::{
    AuthContext, CredentialRecord, CredentialStore, RefreshedToken, TokenCache, TokenCacheEntry,
    TokenRefresher,
};
use crate::config::CodexConfig;
use crate::error::{BridgeError, OauthError};
use crate::utils::jwt::jwt_expiry;

/// Resolves a usable [`AuthContext`] for every backend call.
///
/// Order: in-memory entry, then the on-disk record, then one refresh against the issuer.
/// Concurrent callers may refresh at the same time; the last writer wins on disk and in memory.
pub struct AuthManager {
    store: CredentialStore,
    cache: TokenCache,
    refresher: Arc<dyn TokenRefresher>,
    default_client_id: String,
    refresh_buffer: Duration,
    default_expiry: Duration,
}

impl AuthManager {
    pub fn new(
        store: CredentialStore,
        refresher: Arc<dyn TokenRefresher>,
        config: &CodexConfig,
    ) -> Self {
        Self {
            store,
            cache: TokenCache::new(),
            refresher,
            default_client_id: config.client_id.clone(),
            refresh_buffer: secs(config.token_refresh_buffer_secs),
            default_expiry: secs(config.token_default_expiry_secs),
        }
    }

    pub async fn get_auth_context(&self) -> Result<AuthContext, BridgeError> {
        let now = Utc::now();
        if let Some(entry) = self.cache.get_usable(now, self.refresh_buffer) {
            return Ok(entry.context());
        }

        let record = self.store.load().await?;
        let token = record
            .access_token()
            .ok_or_else(|| {
                BridgeError::AuthToken("no access_token in credential record".to_string())
            })?
            .to_string();
        let expiry = self.record_expiry(&record, &token, now);

        if now < expiry - self.refresh_buffer {
            let entry = TokenCacheEntry {
                account_id: self.account_id_for(&token)?,
                token,
                expiry,
            };
            debug!(account_id = %entry.account_id, expiry = %entry.expiry, "Loaded access token from disk");
            let context = entry.context();
            self.cache.store(entry);
            return Ok(context);
        }

        debug!(expiry = %expiry, "Access token expired or inside refresh buffer");
        self.refresh(record, now).await
    }

    async fn refresh(
        &self,
        mut record: CredentialRecord,
        now: DateTime<Utc>,
    ) -> Result<AuthContext, BridgeError> {
        let refresh_token = record
            .refresh_token()
            .ok_or(BridgeError::AuthRefresh(OauthError::MissingRefreshToken))?
            .to_string();
        let client_id = record
            .client_id()
            .unwrap_or(&self.default_client_id)
            .to_string();

        let refreshed = self.refresher.refresh(&refresh_token, &client_id).await?;
        let expiry = self.refreshed_expiry(&refreshed, now);
        let account_id = self.account_id_for(&refreshed.access_token)?;

        record.apply_refresh(&refreshed, expiry);
        if let Err(e) = self.store.save(&record).await {
            warn!(
                path = %self.store.path().display(),
                error = %e,
                "Refreshed token could not be persisted; continuing with the in-memory copy"
            );
        }

        let entry = TokenCacheEntry {
            token: refreshed.access_token,
            account_id,
            expiry,
        };
        info!(account_id = %entry.account_id, expiry = %entry.expiry, "Access token refreshed");
        let context = entry.context();
        self.cache.store(entry);
        Ok(context)
    }

    /// Account id is decoded once per distinct token; an unchanged token reuses the cached one.
    fn account_id_for(&self, token: &str) -> Result<String, BridgeError> {
        if let Some(entry) = self.cache.peek().filter(|e| e.token == token) {
            return Ok(entry.account_id.clone());
        }
        account_id_from_access_token(token)
    }

    fn record_expiry(
        &self,
        record: &CredentialRecord,
        token: &str,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        record
            .expires_at()
            .or_else(|| jwt_expiry(token).and_then(|exp| DateTime::from_timestamp(exp, 0)))
            .unwrap_or(now + self.default_expiry)
    }

    fn refreshed_expiry(&self, refreshed: &RefreshedToken, now: DateTime<Utc>) -> DateTime<Utc> {
        refreshed
            .expires_in
            .map(|s| now + secs(s))
            .or_else(|| {
                jwt_expiry(&refreshed.access_token).and_then(|exp| DateTime::from_timestamp(exp, 0))
            })
            .unwrap_or(now + self.default_expiry)
    }
}

fn secs(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::jwt::test_support::make_jwt;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRefresher {
        calls: AtomicUsize,
        token: String,
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(
            &self,
            refresh_token: &str,
            client_id: &str,
        ) -> Result<RefreshedToken, OauthError> {
            assert_eq!(refresh_token, "refresh-1");
            assert_eq!(client_id, "app_EMoamEEZ73f0CkXaXp7hrann");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RefreshedToken {
                access_token: self.token.clone(),
                refresh_token: Some("refresh-2".to_string()),
                id_token: None,
                expires_in: Some(3600),
            })
        }
    }

    struct FailingRefresher;

    #[async_trait]
    impl TokenRefresher for FailingRefresher {
        async fn refresh(&self, _: &str, _: &str) -> Result<RefreshedToken, OauthError> {
            Err(OauthError::ServerResponse {
                error: "invalid_grant".to_string(),
                description: None,
            })
        }
    }

    fn token_for(account: &str) -> String {
        make_jwt(&json!({ "https://api.openai.com/auth": { "chatgpt_account_id": account } }))
    }

    async fn write_record(dir: &tempfile::TempDir, record: serde_json::Value) -> CredentialStore {
        let path = dir.path().join("auth.json");
        tokio::fs::write(&path, serde_json::to_vec(&record).expect("encode"))
            .await
            .expect("write record");
        CredentialStore::new(path)
    }

    fn manager(store: CredentialStore, refresher: Arc<dyn TokenRefresher>) -> AuthManager {
        AuthManager::new(store, refresher, &CodexConfig::default())
    }

    #[tokio::test]
    async fn fresh_token_is_loaded_once_then_served_from_memory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let expires_at = Utc::now().timestamp() + 3600;
        let store = write_record(
            &dir,
            json!({ "tokens": { "access_token": token_for("acct-1"), "expires_at": expires_at } }),
        )
        .await;
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            token: token_for("unused"),
        });
        let auth = manager(store.clone(), refresher.clone());

        let first = auth.get_auth_context().await.expect("context");
        assert_eq!(first.account_id, "acct-1");

        // The file going away proves the second call never touches disk.
        tokio::fs::remove_file(store.path()).await.expect("remove");
        let second = auth.get_auth_context().await.expect("cached context");
        assert_eq!(second, first);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn token_inside_buffer_is_refreshed_and_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let expires_at = Utc::now().timestamp() + 120;
        let store = write_record(
            &dir,
            json!({ "chatgpt": {
                "access_token": token_for("acct-old"),
                "refresh_token": "refresh-1",
                "expires_at": expires_at
            } }),
        )
        .await;
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            token: token_for("acct-new"),
        });
        let auth = manager(store.clone(), refresher.clone());

        let ctx = auth.get_auth_context().await.expect("context");
        assert_eq!(ctx.account_id, "acct-new");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);

        let saved = store.load().await.expect("reload");
        assert_eq!(saved.access_token(), Some(ctx.access_token.as_str()));
        assert_eq!(saved.refresh_token(), Some("refresh-2"));
        assert!(saved.expires_at().expect("expiry") > Utc::now() + Duration::minutes(50));

        auth.get_auth_context().await.expect("cached");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expiry_falls_back_to_jwt_exp_claim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let expired = make_jwt(&json!({
            "exp": Utc::now().timestamp() - 10,
            "https://api.openai.com/auth": { "chatgpt_account_id": "acct" }
        }));
        let store = write_record(&dir, json!({ "access_token": expired })).await;

        let err = manager(store, Arc::new(FailingRefresher))
            .get_auth_context()
            .await
            .expect_err("expired without refresh token");
        assert!(matches!(
            err,
            BridgeError::AuthRefresh(OauthError::MissingRefreshToken)
        ));
    }

    #[tokio::test]
    async fn issuer_rejection_surfaces_as_refresh_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = write_record(
            &dir,
            json!({ "access_token": token_for("a"), "refresh_token": "r", "expires_at": 0 }),
        )
        .await;

        let err = manager(store, Arc::new(FailingRefresher))
            .get_auth_context()
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, BridgeError::AuthRefresh(_)));
    }

    #[tokio::test]
    async fn undecodable_account_claim_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = write_record(
            &dir,
            json!({ "access_token": "opaque-token", "expires_at": Utc::now().timestamp() + 3600 }),
        )
        .await;

        let err = manager(store, Arc::new(FailingRefresher))
            .get_auth_context()
            .await
            .expect_err("no account id");
        assert!(matches!(err, BridgeError::AuthToken(_)));
    }

    #[tokio::test]
    async fn missing_file_is_reported_with_its_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CredentialStore::new(dir.path().join("absent.json"));
        let err = manager(store, Arc::new(FailingRefresher))
            .get_auth_context()
            .await
            .expect_err("missing file");
        assert!(matches!(err, BridgeError::AuthFileNotFound { ref path } if path.ends_with("absent.json")));
    }
}
