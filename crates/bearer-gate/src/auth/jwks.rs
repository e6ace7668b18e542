//! JWKS cache for fetching and memoizing the identity provider's public keys.
//!
//! The cache holds one key set at a time behind a single mutex. The mutex is
//! held across the freshness check and, on a miss, across the network fetch,
//! so concurrent callers that all find the entry expired queue up behind the
//! first one: it refreshes, and the rest see the fresh entry and return
//! without touching the network.
//!
//! # Failure behavior
//!
//! - A failed fetch (transport error, non-2xx, bad JSON) fails the current
//!   caller and leaves the previous entry in place
//! - Nothing is retried here; the next caller to miss tries again
//!
//! # Cancellation
//!
//! Each lookup runs in its own task. A request that is dropped mid-fetch
//! only stops waiting; the fetch completes and fills the cache for whoever
//! is queued behind it.

use crate::config::JwksUriProvider;
use crate::errors::AuthError;
use crate::observability::metrics;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{instrument, Instrument};

/// Default cache TTL (4 hours).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Longest TTL the cache will honor (7 days).
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default timeout for one JWKS request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on the connect phase of a JWKS request.
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON Web Key from the JWKS endpoint.
///
/// Only the members needed for RS256 verification are modelled; anything
/// else the provider publishes is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for keys this service can use).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Algorithm the key is intended for.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,
}

/// JWKS document: `{"keys": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

impl JwksResponse {
    /// First key whose `kid` equals `kid`.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid.as_deref() == Some(kid))
    }
}

/// Cached key set with fetch and expiry times.
struct CachedJwks {
    jwks: Arc<JwksResponse>,
    fetched_at: Instant,
    expires_at: Instant,
}

struct CacheState {
    uri_provider: Arc<dyn JwksUriProvider>,
    http_client: reqwest::Client,
    /// The one guard for the one entry.
    entry: Mutex<Option<CachedJwks>>,
    cache_ttl: Duration,
}

/// Process-wide JWKS cache.
///
/// Construct one per process (or per test) and share it behind an `Arc`.
pub struct JwksCache {
    state: Arc<CacheState>,
}

impl JwksCache {
    /// Create a JWKS cache with the default 4 hour TTL and 10 second fetch timeout.
    ///
    /// # Arguments
    ///
    /// * `uri_provider` - Where to read the JWKS endpoint URL on each refresh
    pub fn new(uri_provider: Arc<dyn JwksUriProvider>) -> Self {
        Self::with_ttl(uri_provider, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a JWKS cache with custom TTL and fetch timeout.
    ///
    /// # Arguments
    ///
    /// * `uri_provider` - Where to read the JWKS endpoint URL on each refresh
    /// * `cache_ttl` - How long a fetched key set is served
    /// * `fetch_timeout` - Total timeout for one JWKS request
    ///
    /// TTLs above [`MAX_CACHE_TTL`] are clamped to it.
    pub fn with_ttl(
        uri_provider: Arc<dyn JwksUriProvider>,
        cache_ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        if cache_ttl > MAX_CACHE_TTL {
            tracing::warn!(
                target: "gate.auth.jwks",
                requested_secs = cache_ttl.as_secs(),
                max_secs = MAX_CACHE_TTL.as_secs(),
                "JWKS cache TTL clamped"
            );
        }
        let cache_ttl = cache_ttl.min(MAX_CACHE_TTL);

        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .connect_timeout(fetch_timeout.min(MAX_CONNECT_TIMEOUT))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gate.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            state: Arc::new(CacheState {
                uri_provider,
                http_client,
                entry: Mutex::new(None),
                cache_ttl,
            }),
        }
    }

    /// Configured TTL.
    pub fn cache_ttl(&self) -> Duration {
        self.state.cache_ttl
    }

    /// Return the cached key set, fetching it first if absent or expired.
    ///
    /// Repeated calls inside one TTL window return the same `Arc`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the JWKS URL is not configured.
    /// Returns `AuthError::JwksFetch` if the endpoint cannot be reached, answers
    /// with a non-success status, or returns something that is not a JWKS.
    #[instrument(skip_all, name = "gate.auth.jwks.fetch")]
    pub async fn fetch_jwks(&self) -> Result<Arc<JwksResponse>, AuthError> {
        self.run_detached(false).await
    }

    /// Fetch a fresh key set regardless of the current entry's age.
    ///
    /// Serialized with [`fetch_jwks`](Self::fetch_jwks) on the same guard. On
    /// failure the previous entry is kept.
    #[instrument(skip_all, name = "gate.auth.jwks.force_refresh")]
    pub async fn force_refresh(&self) -> Result<Arc<JwksResponse>, AuthError> {
        self.run_detached(true).await
    }

    /// Whether a non-expired entry is present.
    pub async fn is_cached(&self) -> bool {
        let entry = self.state.entry.lock().await;
        entry
            .as_ref()
            .is_some_and(|cached| Instant::now() < cached.expires_at)
    }

    /// Drop the cached entry.
    pub async fn clear_cache(&self) {
        let mut entry = self.state.entry.lock().await;
        *entry = None;
    }

    async fn run_detached(&self, force: bool) -> Result<Arc<JwksResponse>, AuthError> {
        let state = Arc::clone(&self.state);
        let lookup = async move { state.get_or_refresh(force).await }.in_current_span();

        tokio::spawn(lookup).await.map_err(|e| {
            tracing::error!(target: "gate.auth.jwks", error = %e, "JWKS refresh task failed");
            AuthError::JwksFetch("refresh task failed".to_string())
        })?
    }
}

impl CacheState {
    async fn get_or_refresh(&self, force: bool) -> Result<Arc<JwksResponse>, AuthError> {
        let mut entry = self.entry.lock().await;

        if !force {
            if let Some(cached) = entry.as_ref() {
                let now = Instant::now();
                if now < cached.expires_at {
                    tracing::debug!(
                        target: "gate.auth.jwks",
                        age_secs = now.duration_since(cached.fetched_at).as_secs(),
                        "JWKS cache hit"
                    );
                    metrics::record_jwks_cache("hit");
                    return Ok(Arc::clone(&cached.jwks));
                }
            }
            metrics::record_jwks_cache("miss");
        }

        // Still holding the guard: concurrent callers wait here for us
        let jwks = Arc::new(self.download().await?);

        let fetched_at = Instant::now();
        // Unrepresentable expiry: serve this result, refetch on the next lookup
        let expires_at = fetched_at.checked_add(self.cache_ttl).unwrap_or(fetched_at);
        *entry = Some(CachedJwks {
            jwks: Arc::clone(&jwks),
            fetched_at,
            expires_at,
        });

        tracing::info!(
            target: "gate.auth.jwks",
            key_count = jwks.keys.len(),
            ttl_secs = self.cache_ttl.as_secs(),
            "JWKS cache refreshed"
        );

        Ok(jwks)
    }

    async fn download(&self) -> Result<JwksResponse, AuthError> {
        let url = self.uri_provider.jwks_uri().map_err(|e| {
            tracing::error!(target: "gate.auth.jwks", error = %e, "JWKS endpoint not configured");
            AuthError::Configuration(e)
        })?;

        let start = Instant::now();
        let result = self.request(&url).await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_jwks_refresh(status, start.elapsed());

        result
    }

    async fn request(&self, url: &str) -> Result<JwksResponse, AuthError> {
        tracing::debug!(target: "gate.auth.jwks", "Fetching JWKS");

        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to fetch JWKS");
            AuthError::JwksFetch(format!("request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "gate.auth.jwks",
                status = %status,
                "JWKS endpoint returned error"
            );
            return Err(AuthError::JwksFetch(format!(
                "HTTP {} from JWKS endpoint",
                status
            )));
        }

        response.json::<JwksResponse>().await.map_err(|e| {
            tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthError::JwksFetch(format!("invalid JWKS document: {}", e))
        })
    }
}
