//! Best-effort cache and notification queue over Redis.
//!
//! Every operation silently no-ops when no backend is configured, and
//! swallows backend errors after logging them: the cache memoizes reads
//! and the queue carries fire-and-forget notifications, so neither is
//! ever allowed to fail a request.

use crate::config::CacheConfig;
use redis::aio::ConnectionManager;
use secrecy::ExposeSecret;

/// Cache key layout. Donation settlement invalidates all three groups.
pub mod keys {
    pub const STATS_GLOBAL: &str = "stats:global";
    pub const CAMPAIGNS_FEATURED: &str = "campaigns:featured";
    pub const CAMPAIGNS_LIST_PREFIX: &str = "campaigns:list:";

    pub fn campaign_list(page: u64, limit: i64, category: Option<&str>) -> String {
        format!(
            "{}{}:{}:{}",
            CAMPAIGNS_LIST_PREFIX,
            page,
            limit,
            category.unwrap_or("all")
        )
    }
}

#[derive(Clone)]
pub struct CampaignCache {
    manager: Option<ConnectionManager>,
    queue: Option<String>,
    ttl_seconds: i64,
}

impl CampaignCache {
    /// Connect to the configured backend. A missing URL or a failed
    /// connection both produce a disabled cache; the service runs the
    /// same either way.
    pub async fn connect(config: &CacheConfig) -> Self {
        let manager = match &config.url {
            Some(url) => match redis::Client::open(url.expose_secret().as_str()) {
                Ok(client) => match client.get_connection_manager().await {
                    Ok(manager) => {
                        tracing::info!("Connected to cache backend");
                        Some(manager)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Cache backend unreachable, running without cache");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid cache URL, running without cache");
                    None
                }
            },
            None => {
                tracing::info!("No cache backend configured");
                None
            }
        };

        Self {
            manager,
            queue: config.queue.clone(),
            ttl_seconds: config.ttl_seconds,
        }
    }

    /// A cache that is permanently disabled.
    pub fn disabled() -> Self {
        Self {
            manager: None,
            queue: None,
            ttl_seconds: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.manager.is_some()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.manager.clone()?;
        match redis::cmd("GET").arg(key).query_async(&mut conn).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(key, error = %e, "Cache read failed");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str) {
        let Some(mut conn) = self.manager.clone() else {
            return;
        };
        let result: Result<(), _> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut conn)
            .await;
        if let Err(e) = result {
            tracing::debug!(key, error = %e, "Cache write failed");
        }
    }

    pub async fn del(&self, key: &str) {
        let Some(mut conn) = self.manager.clone() else {
            return;
        };
        let result: Result<(), _> = redis::cmd("DEL").arg(key).query_async(&mut conn).await;
        if let Err(e) = result {
            tracing::debug!(key, error = %e, "Cache delete failed");
        }
    }

    /// Remove every key under a prefix.
    ///
    /// SCAN-based and not atomic; entries also expire by TTL, so eventual
    /// removal is all that is required here.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let Some(mut conn) = self.manager.clone() else {
            return;
        };

        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;

        loop {
            let reply: Result<(u64, Vec<String>), _> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await;

            let (next, batch) = match reply {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::debug!(prefix, error = %e, "Cache scan failed");
                    return;
                }
            };

            if !batch.is_empty() {
                let mut del = redis::cmd("DEL");
                for key in &batch {
                    del.arg(key);
                }
                let result: Result<(), _> = del.query_async(&mut conn).await;
                if let Err(e) = result {
                    tracing::debug!(prefix, error = %e, "Cache prefix delete failed");
                }
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }
    }

    /// Drop every aggregate a settled donation can invalidate.
    pub async fn invalidate_donation_caches(&self) {
        self.del(keys::STATS_GLOBAL).await;
        self.del(keys::CAMPAIGNS_FEATURED).await;
        self.invalidate_prefix(keys::CAMPAIGNS_LIST_PREFIX).await;
    }

    /// Drop caches that serve public campaign reads.
    pub async fn invalidate_campaign_caches(&self) {
        self.del(keys::CAMPAIGNS_FEATURED).await;
        self.invalidate_prefix(keys::CAMPAIGNS_LIST_PREFIX).await;
    }

    /// Push a notification event onto the background queue, if one is
    /// configured. Never blocks donation success.
    pub async fn publish_event(&self, event: &serde_json::Value) {
        let (Some(mut conn), Some(queue)) = (self.manager.clone(), self.queue.as_ref()) else {
            return;
        };
        let payload = event.to_string();
        let result: Result<(), _> = redis::cmd("LPUSH")
            .arg(queue)
            .arg(payload)
            .query_async(&mut conn)
            .await;
        if let Err(e) = result {
            tracing::warn!(queue, error = %e, "Failed to publish notification event");
        }
    }
}
