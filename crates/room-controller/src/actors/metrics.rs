//! Actor metrics and mailbox monitoring.
//!
//! Every actor owns a [`MailboxMonitor`] that tracks queue depth and flags
//! backpressure before a mailbox overflows. The singleton registry additionally
//! shares a [`RegistryMetrics`] across all room actors for process-wide counts.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

use crate::observability::metrics::set_actor_mailbox_depth;

/// Actor type, used for metrics labels and mailbox thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// The singleton room registry.
    Registry,
    /// One per live room.
    Room,
}

impl ActorType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::Registry => "registry",
            ActorType::Room => "room",
        }
    }

    /// Depth at which the mailbox is considered elevated.
    #[must_use]
    pub fn normal_threshold(&self) -> usize {
        match self {
            ActorType::Registry | ActorType::Room => 100,
        }
    }

    /// Depth at which the mailbox is considered critical.
    #[must_use]
    pub fn warning_threshold(&self) -> usize {
        match self {
            ActorType::Registry | ActorType::Room => 500,
        }
    }
}

/// Mailbox depth classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Elevated,
    Critical,
}

/// Tracks mailbox depth and throughput for a single actor.
///
/// Depth is recorded around message handling in the actor loop, so it reflects
/// processing lag rather than the raw channel length. Threshold crossings are
/// logged once at the crossing point to avoid flooding.
pub struct MailboxMonitor {
    actor_type: ActorType,
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
    messages_dropped: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: &str) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.to_string(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }

    /// Record a message entering the mailbox.
    pub fn record_enqueue(&self) {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;

        let mut peak = self.peak_depth.load(Ordering::SeqCst);
        while depth > peak {
            match self.peak_depth.compare_exchange_weak(
                peak,
                depth,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(current) => peak = current,
            }
        }

        set_actor_mailbox_depth(self.actor_type.as_str(), depth);

        if depth == self.actor_type.warning_threshold() {
            error!(
                target: "rc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth,
                "Mailbox depth critical"
            );
        } else if depth == self.actor_type.normal_threshold() {
            warn!(
                target: "rc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth,
                "Mailbox depth elevated"
            );
        }
    }

    /// Record a message leaving the mailbox after processing.
    pub fn record_dequeue(&self) {
        let depth = self.depth.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        self.messages_processed.fetch_add(1, Ordering::SeqCst);
        set_actor_mailbox_depth(self.actor_type.as_str(), depth);
    }

    /// Record a message dropped because the mailbox was full.
    pub fn record_drop(&self) {
        let dropped = self.messages_dropped.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(
            target: "rc.actor.mailbox",
            actor_type = self.actor_type.as_str(),
            actor_id = %self.actor_id,
            total_dropped = dropped,
            "Message dropped, mailbox full"
        );
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        let depth = self.current_depth();
        if depth >= self.actor_type.warning_threshold() {
            MailboxLevel::Critical
        } else if depth >= self.actor_type.normal_threshold() {
            MailboxLevel::Elevated
        } else {
            MailboxLevel::Normal
        }
    }

    /// Reset the peak depth watermark (after scraping).
    pub fn reset_peak(&self) {
        self.peak_depth
            .store(self.depth.load(Ordering::SeqCst), Ordering::SeqCst);
    }
}

/// Process-wide counters shared between the registry and its room actors.
pub struct RegistryMetrics {
    rooms_active: AtomicUsize,
    connections_active: AtomicUsize,
    actor_panics: AtomicU64,
    messages_processed: AtomicU64,
}

impl RegistryMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rooms_active: AtomicUsize::new(0),
            connections_active: AtomicUsize::new(0),
            actor_panics: AtomicU64::new(0),
            messages_processed: AtomicU64::new(0),
        })
    }

    pub fn room_created(&self) {
        self.rooms_active.fetch_add(1, Ordering::SeqCst);
    }

    pub fn room_removed(&self) {
        self.rooms_active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::SeqCst);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Record an actor panic detected by the supervisor.
    pub fn record_panic(&self, actor_type: ActorType) {
        self.actor_panics.fetch_add(1, Ordering::SeqCst);
        error!(
            target: "rc.actor.panic",
            actor_type = actor_type.as_str(),
            "Actor panic detected"
        );
    }

    pub fn record_message_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::SeqCst);
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms_active.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections_active.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rooms_active: self.rooms_active.load(Ordering::SeqCst),
            connections_active: self.connections_active.load(Ordering::SeqCst),
            actor_panics: self.actor_panics.load(Ordering::SeqCst),
            messages_processed: self.messages_processed.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time view of [`RegistryMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rooms_active: usize,
    pub connections_active: usize,
    pub actor_panics: u64,
    pub messages_processed: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_monitor_depth_tracking() {
        let monitor = MailboxMonitor::new(ActorType::Room, "room-1");

        monitor.record_enqueue();
        monitor.record_enqueue();
        assert_eq!(monitor.current_depth(), 2);
        assert_eq!(monitor.peak_depth(), 2);

        monitor.record_dequeue();
        assert_eq!(monitor.current_depth(), 1);
        assert_eq!(monitor.peak_depth(), 2);
        assert_eq!(monitor.messages_processed(), 1);
    }

    #[test]
    fn test_mailbox_monitor_levels() {
        let monitor = MailboxMonitor::new(ActorType::Registry, "registry");
        assert_eq!(monitor.current_level(), MailboxLevel::Normal);

        for _ in 0..100 {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Elevated);

        for _ in 0..400 {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Critical);
    }

    #[test]
    fn test_mailbox_monitor_drop_counting() {
        let monitor = MailboxMonitor::new(ActorType::Room, "room-2");
        monitor.record_drop();
        monitor.record_drop();
        assert_eq!(monitor.messages_dropped(), 2);
        assert_eq!(monitor.current_depth(), 0);
    }

    #[test]
    fn test_mailbox_monitor_reset_peak() {
        let monitor = MailboxMonitor::new(ActorType::Room, "room-3");
        monitor.record_enqueue();
        monitor.record_enqueue();
        monitor.record_dequeue();
        assert_eq!(monitor.peak_depth(), 2);

        monitor.reset_peak();
        assert_eq!(monitor.peak_depth(), 1);
    }

    #[test]
    fn test_registry_metrics_counts() {
        let metrics = RegistryMetrics::new();
        metrics.room_created();
        metrics.room_created();
        metrics.room_removed();
        metrics.connection_opened();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rooms_active, 1);
        assert_eq!(snapshot.connections_active, 1);
        assert_eq!(snapshot.actor_panics, 0);
    }

    #[test]
    fn test_registry_metrics_panic_count() {
        let metrics = RegistryMetrics::new();
        metrics.record_panic(ActorType::Room);
        assert_eq!(metrics.snapshot().actor_panics, 1);
    }

    #[test]
    fn test_actor_type_labels() {
        assert_eq!(ActorType::Registry.as_str(), "registry");
        assert_eq!(ActorType::Room.as_str(), "room");
    }
}
