//! Controller-side presentation queue for back-to-back video playback
//!
//! Ephemeral, in-memory, and local to one controller dashboard: the
//! queue orders activated videos so each one's end signal activates the
//! next. `Idle -> Playing -> Playing -> ... -> Idle` once exhausted.
//! Manually activating anything outside the queue abandons it: queued
//! and manual activation are never merged.

#![allow(dead_code)] // client-side core: consumed by the controller dashboard, not by the api binary

use uuid::Uuid;

use crate::models::{MediaItem, MediaKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing(Uuid),
}

/// What the controller should do after an end-of-playback signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Activate this item next.
    Next(Uuid),
    /// Nothing left: deactivate and return to idle.
    Exhausted,
}

#[derive(Debug, Default)]
pub struct PresentationQueue {
    items: Vec<Uuid>,
    state: PlaybackState,
}

impl PresentationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a video to the queue. Non-videos and duplicates are
    /// ignored; returns whether the item was added.
    pub fn enqueue(&mut self, item: &MediaItem) -> bool {
        if item.kind != MediaKind::Video || self.items.contains(&item.id) {
            return false;
        }
        self.items.push(item.id);
        true
    }

    /// Reconcile with the register after an activation was observed.
    /// An activation outside the queue abandons the in-flight queue;
    /// deactivation returns to idle.
    pub fn note_activated(&mut self, media: Option<&MediaItem>) {
        match media {
            Some(item) if self.items.contains(&item.id) => {
                self.state = PlaybackState::Playing(item.id);
            }
            Some(item) => {
                self.items.clear();
                self.state = PlaybackState::Playing(item.id);
            }
            None => {
                self.items.clear();
                self.state = PlaybackState::Idle;
            }
        }
    }

    /// Playback-end signal: yields the item queued immediately after the
    /// one that just finished, or `Exhausted` when none remains: in
    /// which case the queue is cleared and the controller deactivates.
    pub fn on_ended(&mut self) -> Advance {
        let current = match self.state {
            PlaybackState::Playing(id) => id,
            PlaybackState::Idle => {
                self.items.clear();
                return Advance::Exhausted;
            }
        };

        let next = self
            .items
            .iter()
            .position(|id| *id == current)
            .and_then(|pos| self.items.get(pos + 1))
            .copied();

        match next {
            Some(id) => {
                self.state = PlaybackState::Playing(id);
                Advance::Next(id)
            }
            None => {
                self.items.clear();
                self.state = PlaybackState::Idle;
                Advance::Exhausted
            }
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_queued(&self, media_id: Uuid) -> bool {
        self.items.contains(&media_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn item(kind: MediaKind) -> MediaItem {
        let created_at = Utc::now();
        MediaItem {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "clip.mp4".into(),
            kind,
            url: "video/user/clip.mp4".into(),
            interaction_count: 0,
            slot_duration_ms: 60_000,
            slot_ends_at: created_at + Duration::milliseconds(60_000),
            created_at,
        }
    }

    #[test]
    fn test_only_videos_enqueue_once() {
        let mut queue = PresentationQueue::new();
        let video = item(MediaKind::Video);
        let image = item(MediaKind::Image);

        assert!(queue.enqueue(&video));
        assert!(!queue.enqueue(&video));
        assert!(!queue.enqueue(&image));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_three_videos_chain_then_deactivate() {
        let mut queue = PresentationQueue::new();
        let v1 = item(MediaKind::Video);
        let v2 = item(MediaKind::Video);
        let v3 = item(MediaKind::Video);

        queue.enqueue(&v1);
        queue.enqueue(&v2);
        queue.enqueue(&v3);
        queue.note_activated(Some(&v1));

        assert_eq!(queue.on_ended(), Advance::Next(v2.id));
        assert_eq!(queue.state(), PlaybackState::Playing(v2.id));
        assert_eq!(queue.on_ended(), Advance::Next(v3.id));
        assert_eq!(queue.on_ended(), Advance::Exhausted);
        assert_eq!(queue.state(), PlaybackState::Idle);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_manual_activation_abandons_queue() {
        let mut queue = PresentationQueue::new();
        let v1 = item(MediaKind::Video);
        let v2 = item(MediaKind::Video);
        let outside = item(MediaKind::Image);

        queue.enqueue(&v1);
        queue.enqueue(&v2);
        queue.note_activated(Some(&v1));

        queue.note_activated(Some(&outside));
        assert!(queue.is_empty());
        assert_eq!(queue.state(), PlaybackState::Playing(outside.id));

        // End of a non-queued item deactivates rather than resuming
        // the abandoned chain.
        assert_eq!(queue.on_ended(), Advance::Exhausted);
    }

    #[test]
    fn test_deactivation_returns_to_idle() {
        let mut queue = PresentationQueue::new();
        let v1 = item(MediaKind::Video);

        queue.enqueue(&v1);
        queue.note_activated(Some(&v1));
        queue.note_activated(None);

        assert_eq!(queue.state(), PlaybackState::Idle);
        assert!(queue.is_empty());
        assert_eq!(queue.on_ended(), Advance::Exhausted);
    }
}
