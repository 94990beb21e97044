//! Viewer-session core: what one connected client keeps in memory
//!
//! Owns the currently rendered media, the countdown clock for it, and
//! the per-session interaction guard. Active-media events from the sync
//! channel funnel through `apply`: an id change tears the old clock
//! down, starts one against the new item's fixed `slot_ends_at`, and
//! re-arms the guard; a re-announcement of the same item (interaction
//! count bump, idempotent re-activation) refreshes the record without
//! touching either.

#![allow(dead_code)] // client-side core: consumed by the viewer frontends, not by the api binary

use std::time::Duration;
use uuid::Uuid;

use crate::clock::SlotClock;
use crate::models::MediaItem;

#[derive(Default)]
pub struct ViewerSession {
    active: Option<MediaItem>,
    clock: Option<SlotClock>,
    interacted: bool,
}

impl ViewerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an active-media update from the sync channel.
    pub fn apply(&mut self, update: Option<MediaItem>) {
        let new_id = update.as_ref().map(|m| m.id);
        let old_id = self.active.as_ref().map(|m| m.id);

        if new_id != old_id {
            // Dropping the old clock aborts its timer before the new one
            // starts; the same edge re-arms the one-interaction guard.
            self.clock = update.as_ref().map(|m| SlotClock::start(m.slot_ends_at));
            self.interacted = false;
        }
        self.active = update;
    }

    pub fn active(&self) -> Option<&MediaItem> {
        self.active.as_ref()
    }

    /// Remaining display time for the rendered item, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.clock.as_ref().map(|c| c.remaining())
    }

    /// Claim the one interaction this session may report for the current
    /// item. Returns the media id to send on the first call, then `None`
    /// until a different item becomes active. This is client-side policy
    /// only: the counter itself accepts every increment it is sent.
    pub fn begin_interaction(&mut self) -> Option<Uuid> {
        match &self.active {
            Some(media) if !self.interacted => {
                self.interacted = true;
                Some(media.id)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;
    use chrono::{Duration as ChronoDuration, Utc};

    fn item_with_slot(slot_duration_ms: i64, age_secs: i64) -> MediaItem {
        let created_at = Utc::now() - ChronoDuration::seconds(age_secs);
        MediaItem {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "banner.png".into(),
            kind: MediaKind::Image,
            url: "image/user/banner.png".into(),
            interaction_count: 0,
            slot_duration_ms,
            slot_ends_at: created_at + ChronoDuration::milliseconds(slot_duration_ms),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_joining_mid_slot_sees_elapsed_time() {
        // Uploaded 10s ago with a 1-minute slot: whoever joins now has
        // about 50s left, not a fresh 60.
        let media = item_with_slot(60_000, 10);
        let mut session = ViewerSession::new();
        session.apply(Some(media));

        let left = session.remaining().unwrap();
        assert!(left <= Duration::from_secs(50));
        assert!(left > Duration::from_secs(48));
    }

    #[tokio::test]
    async fn test_interaction_counted_once_per_item() {
        let media = item_with_slot(60_000, 0);
        let id = media.id;
        let mut session = ViewerSession::new();
        session.apply(Some(media.clone()));

        assert_eq!(session.begin_interaction(), Some(id));
        // Play, pause, click: still just the one report.
        assert_eq!(session.begin_interaction(), None);
        assert_eq!(session.begin_interaction(), None);
    }

    #[tokio::test]
    async fn test_guard_survives_same_item_reannouncement() {
        let media = item_with_slot(60_000, 0);
        let mut session = ViewerSession::new();
        session.apply(Some(media.clone()));
        session.begin_interaction();

        // Same id re-delivered (e.g. its count was bumped elsewhere).
        let mut refreshed = media.clone();
        refreshed.interaction_count = 7;
        session.apply(Some(refreshed));

        assert_eq!(session.begin_interaction(), None);
        assert_eq!(session.active().unwrap().interaction_count, 7);
    }

    #[tokio::test]
    async fn test_guard_and_clock_reset_on_item_change() {
        let first = item_with_slot(60_000, 30);
        let second = item_with_slot(120_000, 0);
        let second_id = second.id;

        let mut session = ViewerSession::new();
        session.apply(Some(first));
        session.begin_interaction();
        let first_left = session.remaining().unwrap();

        session.apply(Some(second));
        assert_eq!(session.begin_interaction(), Some(second_id));
        // Fresh clock keyed to the new item's slot end.
        assert!(session.remaining().unwrap() > first_left);
    }

    #[tokio::test]
    async fn test_deactivation_clears_view() {
        let media = item_with_slot(60_000, 0);
        let mut session = ViewerSession::new();
        session.apply(Some(media));

        session.apply(None);
        assert!(session.active().is_none());
        assert!(session.remaining().is_none());
        assert_eq!(session.begin_interaction(), None);
    }

    #[tokio::test]
    async fn test_no_interaction_without_active_media() {
        let mut session = ViewerSession::new();
        assert_eq!(session.begin_interaction(), None);
    }
}
