//! Conversation lane serialization
//!
//! Every read-modify-persist cycle against a conversation's notes runs while
//! holding that conversation's lane, so positions computed at the start of a
//! request still hold when the write lands. Operations spanning every
//! conversation (backup restore) take the global lane, which waits for all
//! conversation lanes to drain.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{
    OwnedRwLockReadGuard, OwnedRwLockWriteGuard, OwnedSemaphorePermit, RwLock, Semaphore,
};

/// Held longer than this and the guard logs a warning on release
const LANE_HOLD_WARNING_SECS: u64 = 10;

/// Idle lanes older than this are dropped by `prune_idle`
pub const LANE_IDLE_TIMEOUT_SECS: u64 = 3600;

struct LaneMetadata {
    last_used: Instant,
    total_uses: u64,
}

/// Releases the conversation lane when dropped
pub struct ConversationLaneGuard {
    conv_id: String,
    _permit: OwnedSemaphorePermit,
    _global: OwnedRwLockReadGuard<()>,
    acquired_at: Instant,
    lanes: Arc<ConversationLanes>,
}

impl Drop for ConversationLaneGuard {
    fn drop(&mut self) {
        let held = self.acquired_at.elapsed();
        if held.as_secs() > LANE_HOLD_WARNING_SECS {
            log::warn!(
                "Conversation {} lane held for {} seconds",
                self.conv_id,
                held.as_secs()
            );
        }

        if let Some(mut entry) = self.lanes.metadata.get_mut(&self.conv_id) {
            entry.last_used = Instant::now();
        }
    }
}

pub struct ConversationLanes {
    /// One single-permit semaphore per conversation
    lanes: DashMap<String, Arc<Semaphore>>,
    metadata: DashMap<String, LaneMetadata>,
    /// Read-held by every conversation lane, write-held by global operations
    global: Arc<RwLock<()>>,
}

impl ConversationLanes {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait for exclusive access to a conversation.
    pub async fn acquire(self: &Arc<Self>, conv_id: &str) -> ConversationLaneGuard {
        if let Some(guard) = self.try_acquire(conv_id) {
            return guard;
        }
        log::debug!("Conversation {} busy, waiting for lane", conv_id);

        let global = self.global.clone().read_owned().await;
        let semaphore = self.get_or_create_lane(conv_id);
        let permit = semaphore
            .acquire_owned()
            .await
            .expect("lane semaphores are never closed");

        self.record_use(conv_id);
        ConversationLaneGuard {
            conv_id: conv_id.to_string(),
            _permit: permit,
            _global: global,
            acquired_at: Instant::now(),
            lanes: Arc::clone(self),
        }
    }

    /// Take the conversation lane only if it is free right now.
    pub fn try_acquire(self: &Arc<Self>, conv_id: &str) -> Option<ConversationLaneGuard> {
        let global = self.global.clone().try_read_owned().ok()?;
        let permit = self.get_or_create_lane(conv_id).try_acquire_owned().ok()?;

        self.record_use(conv_id);
        Some(ConversationLaneGuard {
            conv_id: conv_id.to_string(),
            _permit: permit,
            _global: global,
            acquired_at: Instant::now(),
            lanes: Arc::clone(self),
        })
    }

    /// Exclusive access across every conversation.
    pub async fn acquire_global(&self) -> OwnedRwLockWriteGuard<()> {
        self.global.clone().write_owned().await
    }

    #[cfg(test)]
    pub fn is_busy(&self, conv_id: &str) -> bool {
        self.lanes
            .get(conv_id)
            .map(|s| s.available_permits() == 0)
            .unwrap_or(false)
    }

    pub fn stats(&self) -> LaneStats {
        LaneStats {
            total_lanes: self.lanes.len(),
            active_lanes: self
                .lanes
                .iter()
                .filter(|l| l.available_permits() == 0)
                .count(),
            total_requests_processed: self.metadata.iter().map(|m| m.total_uses).sum(),
        }
    }

    /// Drop lanes idle for longer than `idle`. A lane is only removed while
    /// the map holds its sole reference: a holder or a waiter keeps it alive.
    pub fn prune_idle(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<String> = self
            .metadata
            .iter()
            .filter(|m| now.duration_since(m.last_used) > idle)
            .map(|m| m.key().clone())
            .collect();

        let mut pruned = 0;
        for key in &stale {
            let removed = self
                .lanes
                .remove_if(key, |_, lane| Arc::strong_count(lane) == 1)
                .is_some();
            if removed || !self.lanes.contains_key(key) {
                self.metadata.remove(key);
            }
            if removed {
                pruned += 1;
            }
        }
        pruned
    }

    fn record_use(&self, conv_id: &str) {
        self.metadata
            .entry(conv_id.to_string())
            .and_modify(|m| {
                m.last_used = Instant::now();
                m.total_uses += 1;
            })
            .or_insert_with(|| LaneMetadata {
                last_used: Instant::now(),
                total_uses: 1,
            });
    }

    fn get_or_create_lane(&self, conv_id: &str) -> Arc<Semaphore> {
        self.lanes
            .entry(conv_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }
}

impl Default for ConversationLanes {
    fn default() -> Self {
        Self {
            lanes: DashMap::new(),
            metadata: DashMap::new(),
            global: Arc::new(RwLock::new(())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaneStats {
    pub total_lanes: usize,
    pub active_lanes: usize,
    pub total_requests_processed: u64,
}
