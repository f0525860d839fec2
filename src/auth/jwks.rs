use std::time::{Duration, Instant};

use anyhow::Context;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use super::error::AuthError;

/// Minimum gap between two fetches triggered by an unknown `kid`.
const REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

/// Public keys trusted to sign tokens.
pub enum KeySet {
    /// Fixed set, e.g. loaded from a file or built in tests.
    Static(JwkSet),
    /// Published by the identity provider, fetched lazily and cached.
    Remote(RemoteJwks),
}

pub struct RemoteJwks {
    url: String,
    client: reqwest::Client,
    max_age: Duration,
    cache: RwLock<Option<Cached>>,
    /// Held for the duration of a fetch so concurrent misses share one request.
    refresh: Mutex<()>,
}

struct Cached {
    set: JwkSet,
    fetched_at: Instant,
}

enum Lookup {
    Hit(Jwk),
    Miss,
    Refresh,
}

impl KeySet {
    /// Remote set at `url`. Each fetch is bounded by `timeout` and a fetched
    /// set is trusted for at most `max_age`.
    pub fn remote(
        url: impl Into<String>,
        timeout: Duration,
        max_age: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .context("build jwks http client")?;
        Ok(KeySet::Remote(RemoteJwks {
            url: url.into(),
            client,
            max_age,
            cache: RwLock::new(None),
            refresh: Mutex::new(()),
        }))
    }

    /// Load a fixed set from a JWKS document on disk.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
        let set: JwkSet = serde_json::from_str(&raw).with_context(|| format!("parse {path}"))?;
        info!(%path, keys = set.keys.len(), "jwks loaded from file");
        Ok(KeySet::Static(set))
    }

    /// Find the key for `kid`. A remote set is refetched when it is older than
    /// its max age, or once per cooldown when the key is missing.
    pub async fn find(&self, kid: &str) -> Result<Jwk, AuthError> {
        match self {
            KeySet::Static(set) => set.find(kid).cloned().ok_or(AuthError::UnknownKey),
            KeySet::Remote(remote) => remote.find(kid).await,
        }
    }
}

impl RemoteJwks {
    async fn find(&self, kid: &str) -> Result<Jwk, AuthError> {
        match self.lookup(kid).await {
            Lookup::Hit(jwk) => return Ok(jwk),
            Lookup::Miss => return Err(AuthError::UnknownKey),
            Lookup::Refresh => {}
        }

        let _refresh = self.refresh.lock().await;
        // another request may have refreshed while we waited
        match self.lookup(kid).await {
            Lookup::Hit(jwk) => return Ok(jwk),
            Lookup::Miss => return Err(AuthError::UnknownKey),
            Lookup::Refresh => {}
        }

        let set = self.fetch().await.map_err(|e| {
            error!(error = %e, url = %self.url, "jwks fetch failed");
            AuthError::KeySetUnavailable
        })?;
        info!(url = %self.url, keys = set.keys.len(), "jwks loaded");

        let found = set.find(kid).cloned();
        *self.cache.write().await = Some(Cached {
            set,
            fetched_at: Instant::now(),
        });
        found.ok_or(AuthError::UnknownKey)
    }

    async fn lookup(&self, kid: &str) -> Lookup {
        let cache = self.cache.read().await;
        let Some(cached) = cache.as_ref() else {
            return Lookup::Refresh;
        };
        let age = cached.fetched_at.elapsed();
        if age >= self.max_age {
            debug!(age_secs = age.as_secs(), "cached jwks expired");
            return Lookup::Refresh;
        }
        match cached.set.find(kid) {
            Some(jwk) => Lookup::Hit(jwk.clone()),
            None if age >= REFRESH_COOLDOWN => Lookup::Refresh,
            None => {
                debug!(%kid, "kid not in recently fetched jwks");
                Lookup::Miss
            }
        }
    }

    async fn fetch(&self) -> reqwest::Result<JwkSet> {
        self.client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, routing::get, Json, Router};
    use tokio::net::TcpListener;

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(300);
    const HOUR: Duration = Duration::from_secs(3600);

    fn test_set() -> JwkSet {
        serde_json::from_str(include_str!("testdata/jwks.json")).expect("valid jwks fixture")
    }

    /// What the fake provider currently publishes and how often it was asked.
    #[derive(Clone)]
    struct Provider {
        published: Arc<std::sync::Mutex<JwkSet>>,
        hits: Arc<AtomicUsize>,
    }

    async fn serve_jwks(provider: Provider) -> String {
        async fn jwks(State(p): State<Provider>) -> Json<JwkSet> {
            p.hits.fetch_add(1, Ordering::SeqCst);
            let set = p.published.lock().expect("provider lock").clone();
            Json(set)
        }
        let app = Router::new()
            .route("/.well-known/jwks.json", get(jwks))
            .with_state(provider);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}/.well-known/jwks.json")
    }

    fn provider() -> Provider {
        Provider {
            published: Arc::new(std::sync::Mutex::new(test_set())),
            hits: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[tokio::test]
    async fn static_set_finds_known_kid() {
        let keys = KeySet::Static(test_set());
        let jwk = keys.find("test-key-1").await.expect("key present");
        assert_eq!(jwk.common.key_id.as_deref(), Some("test-key-1"));
    }

    #[tokio::test]
    async fn static_set_rejects_unknown_kid() {
        let keys = KeySet::Static(test_set());
        assert_eq!(keys.find("rotated-away").await.unwrap_err(), AuthError::UnknownKey);
    }

    #[tokio::test]
    async fn file_set_is_static() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/src/auth/testdata/jwks.json");
        let keys = KeySet::from_file(path).expect("fixture loads");
        assert!(matches!(keys, KeySet::Static(_)));
        assert!(keys.find("test-key-1").await.is_ok());
        assert!(KeySet::from_file("/nonexistent/jwks.json").is_err());
    }

    #[tokio::test]
    async fn unreachable_remote_is_reported() {
        let keys = KeySet::remote("http://127.0.0.1:9/.well-known/jwks.json", TIMEOUT, HOUR)
            .expect("client builds");
        assert_eq!(
            keys.find("test-key-1").await.unwrap_err(),
            AuthError::KeySetUnavailable
        );
    }

    #[tokio::test]
    async fn silent_provider_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let keys = KeySet::remote(format!("http://{addr}/jwks.json"), TIMEOUT, HOUR)
            .expect("client builds");
        let result = tokio::time::timeout(Duration::from_secs(5), keys.find("test-key-1"))
            .await
            .expect("fetch is bounded by the client timeout");
        assert_eq!(result.unwrap_err(), AuthError::KeySetUnavailable);
    }

    #[tokio::test]
    async fn fresh_cache_is_reused() {
        let provider = provider();
        let url = serve_jwks(provider.clone()).await;
        let keys = KeySet::remote(url, TIMEOUT, HOUR).expect("client builds");

        assert!(keys.find("test-key-1").await.is_ok());
        assert!(keys.find("test-key-1").await.is_ok());
        assert_eq!(provider.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_cache_is_refetched() {
        let provider = provider();
        let url = serve_jwks(provider.clone()).await;
        let keys = KeySet::remote(url, TIMEOUT, Duration::ZERO).expect("client builds");

        assert!(keys.find("test-key-1").await.is_ok());

        // provider withdraws the key; the cached copy must not outlive max age
        provider.published.lock().expect("provider lock").keys.clear();
        assert_eq!(keys.find("test-key-1").await.unwrap_err(), AuthError::UnknownKey);
        assert_eq!(provider.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_kid_waits_for_cooldown() {
        let provider = provider();
        let url = serve_jwks(provider.clone()).await;
        let keys = KeySet::remote(url, TIMEOUT, HOUR).expect("client builds");

        assert_eq!(keys.find("rotated-in").await.unwrap_err(), AuthError::UnknownKey);
        assert_eq!(keys.find("rotated-in").await.unwrap_err(), AuthError::UnknownKey);
        assert_eq!(provider.hits.load(Ordering::SeqCst), 1);
    }
}
