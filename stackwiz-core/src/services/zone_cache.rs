//! Zone ID cache keyed by apex domain

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::traits::Clock;
use crate::types::Zone;

/// How long a resolved zone is trusted before it must be looked up again
pub const ZONE_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct ZoneCacheEntry {
    zone: Zone,
    fetched_at: Instant,
}

/// Read-mostly cache of resolved zones.
///
/// Entries are replaced whole under the write lock, so readers never see a zone paired with
/// another zone's timestamp. Expired entries read as absent.
pub struct ZoneCache {
    entries: RwLock<HashMap<String, ZoneCacheEntry>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ZoneCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, ZONE_CACHE_TTL)
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    pub async fn get(&self, apex: &str) -> Option<Zone> {
        let entries = self.entries.read().await;
        let entry = entries.get(apex)?;
        let age = self.clock.now().saturating_duration_since(entry.fetched_at);
        (age < self.ttl).then(|| entry.zone.clone())
    }

    pub async fn insert(&self, zone: Zone) {
        let entry = ZoneCacheEntry {
            fetched_at: self.clock.now(),
            zone,
        };
        self.entries
            .write()
            .await
            .insert(entry.zone.name.clone(), entry);
    }
}
