use std::sync::Arc;
use std::time::Duration;

use common::ShardAssigner;
use common::storage::BlobStore;

use crate::auth::KeyAuthenticator;
use crate::auth::cache::TtlCache;
use crate::config::AppConfig;
use crate::rate_limit::FixedWindowLimiter;
use crate::records::RecordStore;
use crate::utils::clock::Clock;

/// The three independent request quotas.
#[derive(Clone)]
pub struct RateLimiters {
    pub global: Arc<FixedWindowLimiter>,
    pub upload: Arc<FixedWindowLimiter>,
    pub bulk: Arc<FixedWindowLimiter>,
}

impl RateLimiters {
    pub fn all(&self) -> [&Arc<FixedWindowLimiter>; 3] {
        [&self.global, &self.upload, &self.bulk]
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub records: Arc<dyn RecordStore>,
    pub blob_store: Arc<dyn BlobStore>,
    pub authenticator: Arc<KeyAuthenticator>,
    pub credential_cache: Arc<TtlCache>,
    pub shards: ShardAssigner,
    pub limiters: RateLimiters,
}

impl AppState {
    /// Wire the pipeline's components from configuration and the two external stores.
    pub fn new(
        config: AppConfig,
        records: Arc<dyn RecordStore>,
        blob_store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let credential_cache = Arc::new(TtlCache::new(
            Duration::from_secs(config.auth.cache_ttl_secs),
            clock.clone(),
        ));
        let authenticator = Arc::new(KeyAuthenticator::new(
            records.clone(),
            credential_cache.clone(),
        ));

        let limits = &config.rate_limit;
        let limiters = RateLimiters {
            global: Arc::new(FixedWindowLimiter::new("global", &limits.global, clock.clone())),
            upload: Arc::new(FixedWindowLimiter::new("upload", &limits.upload, clock.clone())),
            bulk: Arc::new(FixedWindowLimiter::new("bulk", &limits.bulk, clock)),
        };

        Self {
            shards: ShardAssigner::new(config.shard.salt.clone()),
            config,
            records,
            blob_store,
            authenticator,
            credential_cache,
            limiters,
        }
    }
}
