//! Word resolution with cached fallback.

use std::sync::Mutex;
use std::time::Instant;

use crate::secret::flagd::FlagdClient;

#[derive(Debug, Default)]
struct CachedWord {
    word: String,
    updated_at: Option<Instant>,
}

enum WordSource {
    Fixed,
    Flagd(FlagdClient),
}

/// Resolves the current crypto word for a request side.
///
/// In fixed mode the configured default word is the answer. In flagd mode the
/// flag is evaluated per call; provider failures fall back to the last
/// non-empty value seen, which may still be "" before the first success.
pub struct SecretResolver {
    source: WordSource,
    flag_key: String,
    default_word: String,
    cache: Mutex<CachedWord>,
}

impl SecretResolver {
    /// A resolver that always returns `default_word`.
    pub fn fixed(default_word: impl Into<String>) -> Self {
        Self {
            source: WordSource::Fixed,
            flag_key: String::new(),
            default_word: default_word.into(),
            cache: Mutex::new(CachedWord::default()),
        }
    }

    /// A resolver backed by a flagd client.
    pub fn with_flagd(
        client: FlagdClient,
        flag_key: impl Into<String>,
        default_word: impl Into<String>,
    ) -> Self {
        Self {
            source: WordSource::Flagd(client),
            flag_key: flag_key.into(),
            default_word: default_word.into(),
            cache: Mutex::new(CachedWord::default()),
        }
    }

    /// The word to use for this request side. An empty (or blank) result
    /// means transparent mode.
    pub async fn current_word(&self) -> String {
        match &self.source {
            WordSource::Fixed => {
                if !self.default_word.trim().is_empty() {
                    self.remember(&self.default_word);
                }
                self.default_word.clone()
            }
            WordSource::Flagd(client) => match client.resolve_string(&self.flag_key).await {
                Ok(value) => {
                    if !value.trim().is_empty() {
                        self.remember(&value);
                    }
                    value
                }
                Err(err) => {
                    let cache = self.cache.lock().expect("word cache poisoned");
                    match cache.updated_at {
                        Some(at) => tracing::debug!(
                            error = %err,
                            cached_age_secs = at.elapsed().as_secs(),
                            "flag lookup failed, using cached word"
                        ),
                        None => tracing::debug!(
                            error = %err,
                            "flag lookup failed with no cached word"
                        ),
                    }
                    cache.word.clone()
                }
            },
        }
    }

    fn remember(&self, word: &str) {
        let mut cache = self.cache.lock().expect("word cache poisoned");
        cache.word = word.to_owned();
        cache.updated_at = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;

    // 0 = return "alpha", 1 = fail, 2 = return ""
    async fn programmable_flagd(behavior: Arc<AtomicU8>) -> std::net::SocketAddr {
        let app = Router::new().route(
            "/flagd.evaluation.v1.Service/ResolveString",
            post(move || {
                let behavior = behavior.clone();
                async move {
                    match behavior.load(Ordering::SeqCst) {
                        0 => (
                            axum::http::StatusCode::OK,
                            Json(serde_json::json!({"value": "alpha"})),
                        ),
                        1 => (
                            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                            Json(serde_json::json!({"code": "general"})),
                        ),
                        _ => (
                            axum::http::StatusCode::OK,
                            Json(serde_json::json!({"value": ""})),
                        ),
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn fixed_mode_returns_configured_word() {
        let resolver = SecretResolver::fixed("swordfish");
        assert_eq!(resolver.current_word().await, "swordfish");
    }

    #[tokio::test]
    async fn fixed_mode_empty_word_means_transparent() {
        let resolver = SecretResolver::fixed("");
        assert_eq!(resolver.current_word().await, "");
    }

    #[tokio::test]
    async fn provider_outage_falls_back_to_cached_word() {
        let behavior = Arc::new(AtomicU8::new(0));
        let addr = programmable_flagd(behavior.clone()).await;
        let client = FlagdClient::new("127.0.0.1", addr.port()).unwrap();
        let resolver = SecretResolver::with_flagd(client, "cryptoWord", "");

        assert_eq!(resolver.current_word().await, "alpha");

        behavior.store(1, Ordering::SeqCst);
        assert_eq!(resolver.current_word().await, "alpha");

        behavior.store(2, Ordering::SeqCst);
        assert_eq!(resolver.current_word().await, "");
        // the empty result did not clobber the cache
        behavior.store(1, Ordering::SeqCst);
        assert_eq!(resolver.current_word().await, "alpha");
    }

    #[tokio::test]
    async fn outage_before_any_success_yields_empty_word() {
        let behavior = Arc::new(AtomicU8::new(1));
        let addr = programmable_flagd(behavior).await;
        let client = FlagdClient::new("127.0.0.1", addr.port()).unwrap();
        let resolver = SecretResolver::with_flagd(client, "cryptoWord", "");
        assert_eq!(resolver.current_word().await, "");
    }
}
