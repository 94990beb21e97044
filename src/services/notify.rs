//! Change-notification hub: fan-out of register and media-store changes
//!
//! One broadcast channel per topic ("active media for controller C",
//! "media library"), each with a per-topic sequence counter and a cached
//! last event. Sequence assignment, cache update, and send happen under
//! the topic lock, so within a topic events are strictly seq-ascending
//! and a `subscribe` call atomically yields a snapshot consistent with
//! the receiver it returns: a new subscriber always has a synthetic
//! current-state event to render before the first live update.
//!
//! Delivery is at-least-once. A slow subscriber that lags the channel
//! re-reads the cached state and continues from there instead of dying
//! or replaying stale history.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::constants::SYNC_CHANNEL_CAPACITY;
use crate::domain::{active, media};
use crate::models::MediaItem;

/// What is live for one controller, resolved at publish time.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveMediaState {
    pub controller_id: Uuid,
    pub media: Option<MediaItem>,
    pub activated_at: Option<DateTime<Utc>>,
}

/// Full media list, as the library topic delivers it.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryState {
    pub media: Vec<MediaItem>,
}

/// A topic event stamped with its per-topic sequence number.
#[derive(Debug, Clone, Serialize)]
pub struct Versioned<T> {
    pub seq: u64,
    #[serde(flatten)]
    pub state: T,
}

struct TopicChannel<T> {
    tx: broadcast::Sender<Versioned<T>>,
    seq: u64,
    last: Option<Versioned<T>>,
}

impl<T: Clone> TopicChannel<T> {
    fn new() -> Self {
        let (tx, _rx) = broadcast::channel(SYNC_CHANNEL_CAPACITY);
        Self { tx, seq: 0, last: None }
    }

    fn publish(&mut self, state: T) {
        self.seq += 1;
        let event = Versioned {
            seq: self.seq,
            state,
        };
        self.last = Some(event.clone());
        // If there are no receivers, broadcast::Sender::send returns an
        // error; that's fine.
        let _ = self.tx.send(event);
    }

    fn subscribe(&self) -> (Option<Versioned<T>>, broadcast::Receiver<Versioned<T>>) {
        (self.last.clone(), self.tx.subscribe())
    }

    /// Install a snapshot on a cold topic without broadcasting it. When
    /// another publisher (or primer) got there first, theirs wins.
    fn prime(&mut self, state: T) -> Versioned<T> {
        if let Some(last) = &self.last {
            return last.clone();
        }
        self.seq += 1;
        let event = Versioned {
            seq: self.seq,
            state,
        };
        self.last = Some(event.clone());
        event
    }

    fn cached(&self) -> Option<Versioned<T>> {
        self.last.clone()
    }
}

/// The in-process hub shared through `AppState`.
pub struct SyncHub {
    active: Mutex<HashMap<Uuid, TopicChannel<ActiveMediaState>>>,
    library: Mutex<TopicChannel<LibraryState>>,
}

impl SyncHub {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            library: Mutex::new(TopicChannel::new()),
        }
    }

    pub fn publish_active(&self, state: ActiveMediaState) {
        let mut map = self.active.lock().unwrap();
        map.entry(state.controller_id)
            .or_insert_with(TopicChannel::new)
            .publish(state);
    }

    pub fn subscribe_active(
        &self,
        controller_id: Uuid,
    ) -> (
        Option<Versioned<ActiveMediaState>>,
        broadcast::Receiver<Versioned<ActiveMediaState>>,
    ) {
        let mut map = self.active.lock().unwrap();
        map.entry(controller_id)
            .or_insert_with(TopicChannel::new)
            .subscribe()
    }

    pub fn prime_active(&self, state: ActiveMediaState) -> Versioned<ActiveMediaState> {
        let mut map = self.active.lock().unwrap();
        map.entry(state.controller_id)
            .or_insert_with(TopicChannel::new)
            .prime(state)
    }

    pub fn cached_active(&self, controller_id: Uuid) -> Option<Versioned<ActiveMediaState>> {
        let map = self.active.lock().unwrap();
        map.get(&controller_id).and_then(|c| c.cached())
    }

    pub fn publish_library(&self, state: LibraryState) {
        self.library.lock().unwrap().publish(state);
    }

    pub fn subscribe_library(
        &self,
    ) -> (
        Option<Versioned<LibraryState>>,
        broadcast::Receiver<Versioned<LibraryState>>,
    ) {
        self.library.lock().unwrap().subscribe()
    }

    pub fn prime_library(&self, state: LibraryState) -> Versioned<LibraryState> {
        self.library.lock().unwrap().prime(state)
    }

    pub fn cached_library(&self) -> Option<Versioned<LibraryState>> {
        self.library.lock().unwrap().cached()
    }
}

impl Default for SyncHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a controller's pointer and resolve it into the state shape the
/// sync channel carries. A missing row, a null pointer, and a dangling
/// pointer all come back with `media: None`.
pub async fn resolve_active_state(
    db: &PgPool,
    controller_id: Uuid,
) -> Result<ActiveMediaState, sqlx::Error> {
    let pointer = active::get_pointer(db, controller_id).await?;
    let media = match pointer.as_ref().and_then(|p| p.media_id) {
        Some(_) => active::get_active(db, controller_id).await?,
        None => None,
    };

    Ok(ActiveMediaState {
        controller_id,
        media,
        activated_at: pointer.map(|p| p.activated_at),
    })
}

/// Re-read the media list and push it to library subscribers. Called
/// after every store mutation (upload, delete, interaction increment).
/// Best-effort: callers log a failure and finish their request anyway.
pub async fn broadcast_library(db: &PgPool, hub: &SyncHub) -> Result<(), sqlx::Error> {
    let items = media::list_media(db, None).await?;
    hub.publish_library(LibraryState { media: items });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_for(controller_id: Uuid) -> ActiveMediaState {
        ActiveMediaState {
            controller_id,
            media: None,
            activated_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_cold_subscribe_has_no_snapshot_until_primed() {
        let hub = SyncHub::new();
        let controller = Uuid::new_v4();

        let (cached, _rx) = hub.subscribe_active(controller);
        assert!(cached.is_none());

        let primed = hub.prime_active(state_for(controller));
        assert_eq!(primed.seq, 1);

        // Priming twice keeps the first snapshot
        let again = hub.prime_active(state_for(controller));
        assert_eq!(again.seq, 1);

        let (cached, _rx) = hub.subscribe_active(controller);
        assert_eq!(cached.unwrap().seq, 1);
    }

    #[tokio::test]
    async fn test_publish_is_seq_ascending_per_topic() {
        let hub = SyncHub::new();
        let controller = Uuid::new_v4();

        let (_, mut rx) = hub.subscribe_active(controller);
        hub.publish_active(state_for(controller));
        hub.publish_active(state_for(controller));
        hub.publish_active(state_for(controller));

        let mut last = 0;
        for _ in 0..3 {
            let event = rx.recv().await.unwrap();
            assert!(event.seq > last);
            last = event.seq;
        }
    }

    #[tokio::test]
    async fn test_subscribe_snapshot_is_consistent_with_stream() {
        let hub = SyncHub::new();
        let controller = Uuid::new_v4();

        hub.publish_active(state_for(controller));
        hub.publish_active(state_for(controller));

        // The snapshot reflects everything sent so far; the receiver only
        // yields events published after this call.
        let (cached, mut rx) = hub.subscribe_active(controller);
        assert_eq!(cached.unwrap().seq, 2);

        hub.publish_active(state_for(controller));
        assert_eq!(rx.recv().await.unwrap().seq, 3);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_self_heals_from_cache() {
        let hub = SyncHub::new();
        let controller = Uuid::new_v4();

        let (_, mut rx) = hub.subscribe_active(controller);
        for _ in 0..(SYNC_CHANNEL_CAPACITY + 8) {
            hub.publish_active(state_for(controller));
        }

        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(_)) => {
                let latest = hub.cached_active(controller).unwrap();
                assert_eq!(latest.seq, (SYNC_CHANNEL_CAPACITY + 8) as u64);
            }
            other => panic!("expected lag, got {:?}", other.map(|v| v.seq)),
        }
    }

    #[tokio::test]
    async fn test_topics_are_independent() {
        let hub = SyncHub::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        hub.publish_active(state_for(a));
        assert!(hub.cached_active(b).is_none());
        assert_eq!(hub.cached_active(a).unwrap().seq, 1);

        hub.publish_library(LibraryState { media: vec![] });
        assert_eq!(hub.cached_library().unwrap().seq, 1);
    }
}
