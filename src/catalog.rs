//! Cached model discovery.
//!
//! The [`ModelCatalog`] answers "which models can I pick from?" for an endpoint.  It never fails:
//! when the service cannot be asked, it logs a warning and answers with [`DEFAULT_MODELS`].  Answers
//! are cached per endpoint identity (address and credential) for a time-to-live; the whole list
//! for an endpoint expires at once.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Result;
use crate::observability::{CATALOG_FALLBACKS, CATALOG_FETCHES, CATALOG_HITS};
use crate::transport::Endpoint;

/// Models offered when the service cannot be asked.
pub const DEFAULT_MODELS: &[&str] = &["llama3.1", "llama3", "qwen2.5", "phi4"];

/// Default time-to-live of a cached model list.
pub const DEFAULT_TTL: Duration = Duration::from_secs(120);

/// Something that can list the models available at an endpoint.
#[async_trait::async_trait]
pub trait ModelSource: Send + Sync {
    /// The endpoint the listing comes from; this is the cache key.
    fn endpoint(&self) -> &Endpoint;

    /// Fetch the model identifiers, in service order.
    async fn fetch_models(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
struct CachedModels {
    models: Vec<String>,
    fetched_at: Instant,
}

/// A time-bounded cache of model lists, keyed by endpoint identity.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    entries: HashMap<Endpoint, CachedModels>,
    ttl: Duration,
}

impl ModelCatalog {
    /// Creates an empty catalog with [`DEFAULT_TTL`].
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Creates an empty catalog with a custom time-to-live.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// The configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The models available from `source`.
    ///
    /// Returns the cached list when one younger than the time-to-live exists for the source's
    /// endpoint.  Otherwise fetches once.  A failed fetch is reported as a warning and replaced
    /// by [`DEFAULT_MODELS`]; that substitute is cached like a real answer, so an unreachable
    /// service is asked again only after the time-to-live or an [`invalidate`](Self::invalidate).
    pub async fn get<S: ModelSource + ?Sized>(&mut self, source: &S) -> Vec<String> {
        let endpoint = source.endpoint();
        if let Some(cached) = self.entries.get(endpoint)
            && cached.fetched_at.elapsed() < self.ttl
        {
            CATALOG_HITS.click();
            tracing::debug!(%endpoint, "model list served from cache");
            return cached.models.clone();
        }

        CATALOG_FETCHES.click();
        let models = match source.fetch_models().await {
            Ok(models) => models,
            Err(err) => {
                CATALOG_FALLBACKS.click();
                tracing::warn!(%endpoint, error = %err, "could not fetch models; using defaults");
                default_models()
            }
        };
        self.entries.insert(
            endpoint.clone(),
            CachedModels {
                models: models.clone(),
                fetched_at: Instant::now(),
            },
        );
        models
    }

    /// Drops every cached list so the next [`get`](Self::get) fetches again.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    /// The cached list for `endpoint`, if one exists and has not expired.
    pub fn cached(&self, endpoint: &Endpoint) -> Option<&[String]> {
        self.entries
            .get(endpoint)
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.models.as_slice())
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// [`DEFAULT_MODELS`] as owned strings.
pub fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
}
