//! Per-family system instructions, cached on disk with TTL and ETag revalidation.
//!
//! A usable answer is always produced: fresh cache, revalidated cache, newly fetched text,
//! stale cache when the source is unreachable, or the bundled default as a last resort.

mod source;

pub use source::{FetchOutcome, GithubInstructionSource, InstructionSource};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::models::ModelFamily;
use crate::utils::fs::write_atomic;

/// Used whenever no better instruction text is available.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant.";

const META_SUFFIX: &str = "-meta.json";

/// After a failed check, a family is served from what it has for this long (capped by the
/// TTL) before the source is tried again.
const FAILED_CHECK_BACKOFF: Duration = Duration::from_secs(60);

/// Revalidation state stored next to each cached body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub etag: Option<String>,
    pub tag: Option<String>,
    /// Unix seconds of the last successful check against the source.
    #[serde(rename = "lastChecked")]
    pub last_checked: Option<f64>,
    pub url: Option<String>,
}

impl CacheMetadata {
    fn is_fresh(&self, now: f64, ttl: Duration) -> bool {
        self.last_checked
            .is_some_and(|checked| now - checked < ttl.as_secs_f64())
    }
}

struct CachePaths {
    instructions: PathBuf,
    metadata: PathBuf,
}

fn prompt_file(family: ModelFamily) -> &'static str {
    match family {
        ModelFamily::CodexMax => "gpt-5.1-codex-max_prompt.md",
        ModelFamily::Base => "gpt_5_1_prompt.md",
        ModelFamily::Codex | ModelFamily::CodexMini | ModelFamily::Other => "gpt_5_codex_prompt.md",
    }
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

pub struct InstructionCache {
    source: Arc<dyn InstructionSource>,
    cache_dir: PathBuf,
    ttl: Duration,
    /// Unix seconds of the last failed check per family. Memory only, so a restart retries.
    failed_checks: Mutex<HashMap<ModelFamily, f64>>,
}

impl InstructionCache {
    pub fn new(source: Arc<dyn InstructionSource>, cache_dir: PathBuf, ttl: Duration) -> Self {
        Self {
            source,
            cache_dir,
            ttl,
            failed_checks: Mutex::new(HashMap::new()),
        }
    }

    fn paths(&self, family: ModelFamily) -> CachePaths {
        let stem = format!("{}-instructions", family.as_str());
        CachePaths {
            instructions: self.cache_dir.join(format!("{stem}.md")),
            metadata: self.cache_dir.join(format!("{stem}{META_SUFFIX}")),
        }
    }

    /// Instruction text for `family`. Never fails.
    pub async fn get_instructions(&self, family: ModelFamily) -> String {
        let paths = self.paths(family);
        let metadata = load_metadata(&paths.metadata).await;
        let cached = tokio::fs::read_to_string(&paths.instructions).await.ok();
        let now = now_secs();

        if let Some(body) = cached.as_ref().filter(|_| metadata.is_fresh(now, self.ttl)) {
            debug!(family = %family, "Instruction cache hit");
            return body.clone();
        }

        if self.recently_failed(family, now) {
            debug!(family = %family, stale = cached.is_some(), "Source check failed recently; not retrying yet");
            return cached.unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string());
        }

        match self
            .revalidate(family, &paths, &metadata, cached.as_deref(), now)
            .await
        {
            Ok(text) => {
                self.failed_checks().remove(&family);
                text
            }
            Err(e) => {
                warn!(family = %family, error = %e, stale = cached.is_some(), "Instruction fetch failed");
                self.failed_checks().insert(family, now);
                cached.unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string())
            }
        }
    }

    fn failed_checks(&self) -> MutexGuard<'_, HashMap<ModelFamily, f64>> {
        self.failed_checks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn recently_failed(&self, family: ModelFamily, now: f64) -> bool {
        let window = FAILED_CHECK_BACKOFF.min(self.ttl).as_secs_f64();
        self.failed_checks()
            .get(&family)
            .is_some_and(|failed| now - failed < window)
    }

    async fn revalidate(
        &self,
        family: ModelFamily,
        paths: &CachePaths,
        metadata: &CacheMetadata,
        cached: Option<&str>,
        now: f64,
    ) -> Result<String, BridgeError> {
        let tag = self.source.latest_tag().await?;
        let url = self.source.prompt_url(&tag, prompt_file(family));

        // An ETag only identifies the body for the release it was fetched from.
        let etag = metadata
            .etag
            .as_deref()
            .filter(|_| cached.is_some() && metadata.tag.as_deref() == Some(tag.as_str()));

        let last_checked = Some(metadata.last_checked.map_or(now, |prev| prev.max(now)));
        match self.source.fetch(&url, etag).await? {
            FetchOutcome::NotModified => {
                let body = cached.ok_or_else(|| {
                    BridgeError::response_parse("304 Not Modified without a cached body", "")
                })?;
                let updated = CacheMetadata {
                    etag: metadata.etag.clone(),
                    tag: Some(tag),
                    last_checked,
                    url: Some(url),
                };
                write_metadata(&paths.metadata, &updated).await;
                debug!(family = %family, "Instructions not modified");
                Ok(body.to_string())
            }
            FetchOutcome::Body { text, etag } => {
                if let Err(e) = write_atomic(&paths.instructions, text.as_bytes()).await {
                    warn!(path = %paths.instructions.display(), error = %e, "Failed to cache instructions");
                } else {
                    let updated = CacheMetadata {
                        etag,
                        tag: Some(tag),
                        last_checked,
                        url: Some(url),
                    };
                    write_metadata(&paths.metadata, &updated).await;
                }
                info!(family = %family, bytes = text.len(), "Fetched fresh instructions");
                Ok(text)
            }
        }
    }
}

async fn load_metadata(path: &Path) -> CacheMetadata {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable cache metadata");
            CacheMetadata::default()
        }),
        Err(_) => CacheMetadata::default(),
    }
}

async fn write_metadata(path: &Path, metadata: &CacheMetadata) {
    let result = match serde_json::to_vec(metadata) {
        Ok(bytes) => write_atomic(path, &bytes).await,
        Err(e) => Err(std::io::Error::other(e)),
    };
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Failed to write cache metadata");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted source that records every call.
    struct ScriptedSource {
        tag: Result<String, ()>,
        outcome: Mutex<Option<FetchOutcome>>,
        tag_calls: AtomicUsize,
        sent_etags: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(tag: &str, outcome: Option<FetchOutcome>) -> Arc<Self> {
            Arc::new(Self {
                tag: Ok(tag.to_string()),
                outcome: Mutex::new(outcome),
                tag_calls: AtomicUsize::new(0),
                sent_etags: Mutex::new(Vec::new()),
            })
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(Self {
                tag: Err(()),
                outcome: Mutex::new(None),
                tag_calls: AtomicUsize::new(0),
                sent_etags: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl InstructionSource for ScriptedSource {
        async fn latest_tag(&self) -> Result<String, BridgeError> {
            self.tag_calls.fetch_add(1, Ordering::SeqCst);
            self.tag
                .clone()
                .map_err(|()| BridgeError::BackendStream("offline".to_string()))
        }

        fn prompt_url(&self, tag: &str, prompt_file: &str) -> String {
            format!("mem://{tag}/{prompt_file}")
        }

        async fn fetch(&self, _url: &str, etag: Option<&str>) -> Result<FetchOutcome, BridgeError> {
            self.sent_etags
                .lock()
                .expect("lock")
                .push(etag.map(str::to_string));
            self.outcome
                .lock()
                .expect("lock")
                .take()
                .ok_or_else(|| BridgeError::BackendStream("no scripted outcome".to_string()))
        }
    }

    async fn seed(dir: &Path, family: &str, body: &str, meta: &CacheMetadata) {
        tokio::fs::write(dir.join(format!("{family}-instructions.md")), body)
            .await
            .expect("seed body");
        tokio::fs::write(
            dir.join(format!("{family}-instructions-meta.json")),
            serde_json::to_vec(meta).expect("encode meta"),
        )
        .await
        .expect("seed meta");
    }

    async fn read_meta(dir: &Path, family: &str) -> CacheMetadata {
        load_metadata(&dir.join(format!("{family}-instructions-meta.json"))).await
    }

    #[tokio::test]
    async fn fresh_cache_makes_no_calls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let meta = CacheMetadata {
            last_checked: Some(now_secs() - 10.0),
            ..Default::default()
        };
        seed(dir.path(), "codex", "cached text", &meta).await;

        let source = ScriptedSource::new("v1", None);
        let cache = InstructionCache::new(source.clone(), dir.path().to_path_buf(), Duration::from_secs(900));

        assert_eq!(cache.get_instructions(ModelFamily::Codex).await, "cached text");
        assert_eq!(source.tag_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn not_modified_only_bumps_last_checked() {
        let dir = tempfile::tempdir().expect("tempdir");
        let old = now_secs() - 10_000.0;
        let meta = CacheMetadata {
            etag: Some("\"e1\"".to_string()),
            tag: Some("v1".to_string()),
            last_checked: Some(old),
            url: None,
        };
        seed(dir.path(), "codex-max", "max text", &meta).await;

        let source = ScriptedSource::new("v1", Some(FetchOutcome::NotModified));
        let cache = InstructionCache::new(source.clone(), dir.path().to_path_buf(), Duration::from_secs(900));

        assert_eq!(cache.get_instructions(ModelFamily::CodexMax).await, "max text");
        assert_eq!(
            source.sent_etags.lock().expect("lock").as_slice(),
            &[Some("\"e1\"".to_string())]
        );

        let updated = read_meta(dir.path(), "codex-max").await;
        assert_eq!(updated.etag.as_deref(), Some("\"e1\""));
        assert!(updated.last_checked.expect("checked") > old);
        assert_eq!(
            updated.url.as_deref(),
            Some("mem://v1/gpt-5.1-codex-max_prompt.md")
        );
    }

    #[tokio::test]
    async fn new_release_skips_conditional_header_and_replaces_body() {
        let dir = tempfile::tempdir().expect("tempdir");
        let meta = CacheMetadata {
            etag: Some("\"e1\"".to_string()),
            tag: Some("v1".to_string()),
            last_checked: Some(0.0),
            url: None,
        };
        seed(dir.path(), "gpt-5.1", "old", &meta).await;

        let source = ScriptedSource::new(
            "v2",
            Some(FetchOutcome::Body {
                text: "new".to_string(),
                etag: Some("\"e2\"".to_string()),
            }),
        );
        let cache = InstructionCache::new(source.clone(), dir.path().to_path_buf(), Duration::from_secs(900));

        assert_eq!(cache.get_instructions(ModelFamily::Base).await, "new");
        assert_eq!(source.sent_etags.lock().expect("lock").as_slice(), &[None]);

        let updated = read_meta(dir.path(), "gpt-5.1").await;
        assert_eq!(updated.etag.as_deref(), Some("\"e2\""));
        assert_eq!(updated.tag.as_deref(), Some("v2"));
        let body = tokio::fs::read_to_string(dir.path().join("gpt-5.1-instructions.md"))
            .await
            .expect("body");
        assert_eq!(body, "new");
    }

    #[tokio::test]
    async fn unreachable_source_serves_stale_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let meta = CacheMetadata {
            last_checked: Some(0.0),
            ..Default::default()
        };
        seed(dir.path(), "codex", "stale text", &meta).await;

        let cache = InstructionCache::new(
            ScriptedSource::unreachable(),
            dir.path().to_path_buf(),
            Duration::from_secs(900),
        );
        assert_eq!(cache.get_instructions(ModelFamily::Codex).await, "stale text");
    }

    #[tokio::test]
    async fn failed_check_is_not_retried_within_backoff() {
        let dir = tempfile::tempdir().expect("tempdir");
        let meta = CacheMetadata {
            last_checked: Some(0.0),
            ..Default::default()
        };
        seed(dir.path(), "codex", "stale text", &meta).await;

        let source = ScriptedSource::unreachable();
        let cache = InstructionCache::new(source.clone(), dir.path().to_path_buf(), Duration::from_secs(900));

        assert_eq!(cache.get_instructions(ModelFamily::Codex).await, "stale text");
        assert_eq!(cache.get_instructions(ModelFamily::Codex).await, "stale text");
        assert_eq!(source.tag_calls.load(Ordering::SeqCst), 1);

        // Backoff is per family.
        assert_eq!(
            cache.get_instructions(ModelFamily::Base).await,
            DEFAULT_INSTRUCTIONS
        );
        assert_eq!(source.tag_calls.load(Ordering::SeqCst), 2);

        // Once the window has passed the source is asked again.
        cache
            .failed_checks()
            .insert(ModelFamily::Codex, now_secs() - FAILED_CHECK_BACKOFF.as_secs_f64());
        assert_eq!(cache.get_instructions(ModelFamily::Codex).await, "stale text");
        assert_eq!(source.tag_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn nothing_anywhere_yields_default_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = InstructionCache::new(
            ScriptedSource::unreachable(),
            dir.path().join("missing"),
            Duration::from_secs(900),
        );
        assert_eq!(
            cache.get_instructions(ModelFamily::Other).await,
            DEFAULT_INSTRUCTIONS
        );
    }

    #[tokio::test]
    async fn corrupt_metadata_forces_refetch() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("codex-instructions.md"), "cached")
            .await
            .expect("seed body");
        tokio::fs::write(dir.path().join("codex-instructions-meta.json"), "{{{")
            .await
            .expect("seed meta");

        let source = ScriptedSource::new(
            "v1",
            Some(FetchOutcome::Body {
                text: "fetched".to_string(),
                etag: None,
            }),
        );
        let cache = InstructionCache::new(source, dir.path().to_path_buf(), Duration::from_secs(900));
        assert_eq!(cache.get_instructions(ModelFamily::Codex).await, "fetched");
    }
}
