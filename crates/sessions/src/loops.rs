//! Per-session entries used by the QA race.
//!
//! Each session gets a gate that serializes its own turns, plus activity
//! timestamps so idle sessions can be dropped.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use {
    dashmap::DashMap,
    tokio::{sync::Mutex, task::JoinHandle, time::Instant},
    tracing::debug,
};

#[cfg(feature = "metrics")]
use bpi_metrics::{counter, gauge, race as race_metrics};

#[derive(Debug)]
struct SessionLoop {
    gate: Arc<Mutex<()>>,
    created: Instant,
    last_activity: Instant,
}

/// Session id to session entry, evicted after `timeout` without a turn.
#[derive(Debug)]
pub struct SessionLoops {
    entries: DashMap<String, SessionLoop>,
    timeout: Duration,
}

impl SessionLoops {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            timeout,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a turn for `session`, creating its entry on first use, and
    /// return the session's gate.
    pub fn touch(&self, session: &str) -> Arc<Mutex<()>> {
        self.touch_at(session, Instant::now())
    }

    pub fn touch_at(&self, session: &str, now: Instant) -> Arc<Mutex<()>> {
        let mut entry = self.entries.entry(session.to_string()).or_insert_with(|| {
            debug!(session_id = session, "new session loop");
            SessionLoop {
                gate: Arc::new(Mutex::new(())),
                created: now,
                last_activity: now,
            }
        });
        entry.last_activity = now;
        let gate = Arc::clone(&entry.gate);
        drop(entry);

        #[cfg(feature = "metrics")]
        gauge!(race_metrics::SESSIONS_ACTIVE).set(self.entries.len() as f64);
        gate
    }

    /// Drop every session idle for longer than the timeout. Sessions with a
    /// turn in flight are kept.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|session, entry| {
            let idle = now.saturating_duration_since(entry.last_activity);
            let busy = Arc::strong_count(&entry.gate) > 1;
            let keep = busy || idle <= self.timeout;
            if !keep {
                debug!(
                    session_id = %session,
                    age_secs = now.saturating_duration_since(entry.created).as_secs(),
                    "evicting idle session loop"
                );
            }
            keep
        });
        let evicted = before.saturating_sub(self.entries.len());

        #[cfg(feature = "metrics")]
        {
            counter!(race_metrics::SESSIONS_EVICTED_TOTAL).increment(evicted as u64);
            gauge!(race_metrics::SESSIONS_ACTIVE).set(self.entries.len() as f64);
        }
        evicted
    }

    #[must_use]
    pub fn contains(&self, session: &str) -> bool {
        self.entries.contains_key(session)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict idle sessions every `interval` until the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(loops) = weak.upgrade() else {
                    break;
                };
                let evicted = loops.evict_idle();
                if evicted > 0 {
                    debug!(evicted, remaining = loops.len(), "session sweep");
                }
            }
        })
    }
}
