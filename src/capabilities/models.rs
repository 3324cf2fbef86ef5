//! Model-listing aggregation across providers.
//!
//! Each provider's own `list_models` already hits its vendor endpoint;
//! this module's job is the cross-provider fan-out and a short-lived
//! cache: concurrent fetch via `FuturesUnordered`, a per-provider failure
//! logged and skipped rather than failing the whole call, and a TTL cache
//! guarded by a double-checked write lock so concurrent callers don't
//! thunder the herd.

use std::time::{Duration, Instant};

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use itertools::Itertools;
use tokio::sync::RwLock;

use crate::provider::{ModelInfo, Provider};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct CachedModels {
    models: Vec<(&'static str, ModelInfo)>,
    cached_at: Instant,
}

/// Caches the union of every registered provider's model list for `ttl`,
/// refreshing on first access after expiry.
pub struct ModelDirectory {
    ttl: Duration,
    cache: RwLock<Option<CachedModels>>,
}

impl Default for ModelDirectory {
    fn default() -> Self {
        ModelDirectory::new(DEFAULT_CACHE_TTL)
    }
}

impl ModelDirectory {
    pub fn new(ttl: Duration) -> Self {
        ModelDirectory {
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// Every `(provider_id, ModelInfo)` pair across `providers`, fetched
    /// concurrently; a provider whose `list_models` call fails is logged
    /// and omitted rather than failing the whole directory: model listing
    /// is advisory, never a hard gate on chat.
    pub async fn list_all(&self, providers: &[(&'static str, &dyn Provider)]) -> Vec<(&'static str, ModelInfo)> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.cached_at.elapsed() < self.ttl {
                    return cached.models.clone();
                }
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref() {
            if cached.cached_at.elapsed() < self.ttl {
                return cached.models.clone();
            }
        }

        let mut futures: FuturesUnordered<_> = providers
            .iter()
            .map(|(id, provider)| async move { (*id, provider.list_models().await) })
            .collect();

        let mut all_models = Vec::new();
        while let Some((id, result)) = futures.next().await {
            match result {
                Ok(models) => all_models.extend(models.into_iter().map(|m| (id, m))),
                Err(e) => log::warn!("failed to list models for provider '{id}': {e}"),
            }
        }

        // Stable, deterministic ordering for callers building a picker UI;
        // `FuturesUnordered` completion order is otherwise arbitrary.
        let all_models = all_models
            .into_iter()
            .sorted_by(|(id_a, a), (id_b, b)| id_a.cmp(id_b).then_with(|| a.id.cmp(&b.id)))
            .collect::<Vec<_>>();

        *cache = Some(CachedModels {
            models: all_models.clone(),
            cached_at: Instant::now(),
        });

        all_models
    }

    /// Test/operator hook: drop the cache so the next call refetches.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}
