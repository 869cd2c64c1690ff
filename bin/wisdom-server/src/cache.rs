//! Process-wide conversation cache keyed by session.
//!
//! Each session owns an async mutex; holding its guard makes a
//! fetch → decide → persist sequence atomic for that session while other
//! sessions proceed independently. Entries expire after a period of
//! inactivity and least recently used idle entries are dropped when the
//! cache is full. Entries held by a request are never dropped, so the
//! capacity is a soft bound: the cache may grow past it while every entry is
//! in use and shrinks back on the next insert once they are released. An
//! expired session is rebuilt from the persisted store on
//! its next request, so eviction never resets its question count.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::session::{ConversationState, SessionId};

type Slot = Arc<tokio::sync::Mutex<ConversationState>>;

struct Entry {
    state: Slot,
    touched: Instant,
}

pub struct SessionCache {
    entries: Mutex<HashMap<SessionId, Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionCache({} sessions, ttl {:?})", self.len(), self.ttl)
    }
}

impl SessionCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<SessionId, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lock the state of `id`, creating an empty one on a miss.
    ///
    /// The guard must be held for the whole read-modify-write sequence.
    pub async fn acquire(&self, id: SessionId) -> OwnedMutexGuard<ConversationState> {
        let slot = {
            let mut map = self.map();
            let now = Instant::now();
            if !map.contains_key(&id) {
                while map.len() >= self.capacity && evict_least_recent(&mut map) {}
            }
            let entry = map.entry(id).or_insert_with(|| Entry {
                state: Arc::new(tokio::sync::Mutex::new(ConversationState::default())),
                touched: now,
            });
            entry.touched = now;
            Arc::clone(&entry.state)
        };
        slot.lock_owned().await
    }

    /// Snapshot of the state for `id`, if cached.
    #[cfg(test)]
    pub async fn get(&self, id: SessionId) -> Option<ConversationState> {
        let slot = self.map().get(&id).map(|e| Arc::clone(&e.state))?;
        let state = slot.lock().await;
        Some(state.clone())
    }

    /// Apply `patch` to the state of `id`, creating it if needed.
    pub async fn upsert<F>(&self, id: SessionId, patch: F)
    where
        F: FnOnce(&mut ConversationState),
    {
        let mut state = self.acquire(id).await;
        patch(&mut state);
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    /// Drop idle entries older than the TTL. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    fn evict_expired_at(&self, now: Instant) -> usize {
        let mut map = self.map();
        let before = map.len();
        map.retain(|_, e| in_use(e) || now.saturating_duration_since(e.touched) < self.ttl);
        before - map.len()
    }

    /// Periodically evict expired sessions until the runtime shuts down.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.evict_expired();
                if removed > 0 {
                    debug!(removed, remaining = self.len(), "evicted idle sessions");
                }
            }
        })
    }
}

/// A slot is in use while any request holds a clone of it.
fn in_use(entry: &Entry) -> bool {
    Arc::strong_count(&entry.state) > 1
}

/// Drop the least recently used idle entry. `false` if every entry is in use.
fn evict_least_recent(map: &mut HashMap<SessionId, Entry>) -> bool {
    let victim = map
        .iter()
        .filter(|(_, e)| !in_use(e))
        .min_by_key(|(_, e)| e.touched)
        .map(|(id, _)| *id);
    match victim {
        Some(id) => {
            map.remove(&id);
            debug!(session_id = %id, "session cache full; evicted least recently used");
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn upsert_then_get() {
        let cache = SessionCache::new(Duration::from_secs(60), 10);
        let id = SessionId::new_random();
        assert!(cache.get(id).await.is_none());
        cache.upsert(id, |s| s.question_count = 2).await;
        assert_eq!(cache.get(id).await.map(|s| s.question_count), Some(2));
    }

    #[tokio::test]
    async fn expired_idle_sessions_are_evicted() {
        let cache = SessionCache::new(Duration::from_secs(60), 10);
        let id = SessionId::new_random();
        cache.upsert(id, |_| {}).await;
        assert_eq!(cache.evict_expired_at(Instant::now()), 0);
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(cache.evict_expired_at(later), 1);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn locked_sessions_survive_expiry() {
        let cache = SessionCache::new(Duration::from_secs(1), 10);
        let id = SessionId::new_random();
        let _guard = cache.acquire(id).await;
        let later = Instant::now() + Duration::from_secs(10);
        assert_eq!(cache.evict_expired_at(later), 0);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let cache = SessionCache::new(Duration::from_secs(60), 2);
        let (a, b, c) = (SessionId::new_random(), SessionId::new_random(), SessionId::new_random());
        cache.upsert(a, |s| s.question_count = 1).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.upsert(b, |_| {}).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.upsert(c, |_| {}).await;
        assert_eq!(cache.len(), 2);
        assert!(cache.get(a).await.is_none());
        assert!(cache.get(c).await.is_some());
    }

    #[tokio::test]
    async fn busy_cache_overflows_then_shrinks_back() {
        let cache = SessionCache::new(Duration::from_secs(60), 2);
        let (a, b) = (SessionId::new_random(), SessionId::new_random());
        let guard_a = cache.acquire(a).await;
        let guard_b = cache.acquire(b).await;

        // Nothing idle to evict, so the new session is admitted over capacity.
        drop(cache.acquire(SessionId::new_random()).await);
        assert_eq!(cache.len(), 3);

        drop((guard_a, guard_b));
        let _d = cache.acquire(SessionId::new_random()).await;
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn acquire_serialises_same_session() {
        let cache = Arc::new(SessionCache::new(Duration::from_secs(60), 10));
        let id = SessionId::new_random();
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move {
                let mut state = cache.acquire(id).await;
                let seen = state.question_count;
                tokio::task::yield_now().await;
                state.question_count = seen + 1;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(cache.get(id).await.map(|s| s.question_count), Some(16));
    }
}
