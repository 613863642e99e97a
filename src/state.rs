// src/state.rs

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::FromRef;
use sqlx::SqlitePool;
use tokio::{task::JoinHandle, time::Instant};
use uuid::Uuid;

use crate::config::Config;
use crate::services::player::{AttemptPlayer, PlayerDeps};

struct Entry {
    player: Arc<AttemptPlayer>,
    last_seen: Instant,
}

/// Live sessions keyed by the id handed to the front-end.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionRegistry {
    pub fn insert(&self, player: Arc<AttemptPlayer>) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().unwrap_or_else(|e| e.into_inner()).insert(
            id,
            Entry {
                player,
                last_seen: Instant::now(),
            },
        );
        id
    }

    /// Looks a session up and marks it as seen.
    pub fn get(&self, id: &Uuid) -> Option<Arc<AttemptPlayer>> {
        let mut sessions = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let entry = sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(entry.player.clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<AttemptPlayer>> {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .map(|entry| entry.player)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops finished sessions unseen for `retention` and any session unseen
    /// for `idle`. Evicted sessions are torn down. Returns how many went.
    pub fn sweep(&self, retention: Duration, idle: Duration) -> usize {
        let now = Instant::now();
        let evicted: Vec<(Uuid, Arc<AttemptPlayer>)> = {
            let mut sessions = self.inner.write().unwrap_or_else(|e| e.into_inner());
            let expired: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, entry)| {
                    let unseen = now.saturating_duration_since(entry.last_seen);
                    unseen >= idle || (unseen >= retention && entry.player.is_finished())
                })
                .map(|(id, _)| *id)
                .collect();
            expired
                .into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry.player)))
                .collect()
        };

        for (id, player) in &evicted {
            player.teardown();
            tracing::info!("Session {} evicted", id);
        }
        evicted.len()
    }

    /// Runs [`SessionRegistry::sweep`] periodically until the runtime stops.
    pub fn spawn_sweeper(&self, retention: Duration, idle: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        let period = (retention / 2).clamp(Duration::from_secs(1), Duration::from_secs(60));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let evicted = registry.sweep(retention, idle);
                if evicted > 0 {
                    tracing::debug!("Swept {} sessions, {} left", evicted, registry.len());
                }
            }
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub sessions: SessionRegistry,
    pub deps: PlayerDeps,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for PlayerDeps {
    fn from_ref(state: &AppState) -> Self {
        state.deps.clone()
    }
}
