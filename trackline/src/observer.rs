//! Outbound tracker events.
//!
//! The state machine reports what happened through an [`EventSink`]:
//!
//! - [`ChannelEventSink`] - forwards onto an unbounded channel (push API)
//! - [`NullEventSink`] - drops everything, for trackers nobody observes
//!
//! Delivery through a channel is asynchronous with respect to the command
//! that caused the event.

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::TrackerError;
use crate::fix::Fix;
use crate::ports::AuthorizationStatus;

/// Something the tracker wants its observer to know.
#[derive(Debug)]
pub enum TrackerEvent {
    /// Tracking started (a new start cycle began).
    Started,
    /// Tracking stopped.
    Stopped,
    /// The platform paused location updates.
    Paused,
    /// The platform resumed location updates.
    Resumed,
    /// Authorization is insufficient; the tracker is parked.
    AuthorizationRefused(AuthorizationStatus),
    /// A failure surfaced by the tracker.
    Error(TrackerError),
    /// Newly accepted significant fixes, oldest first. Never empty.
    LocationsUpdated(Vec<Fix>),
}

impl TrackerEvent {
    /// Short name of the event kind, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
            Self::AuthorizationRefused(_) => "authorization_refused",
            Self::Error(_) => "error",
            Self::LocationsUpdated(_) => "locations_updated",
        }
    }
}

impl std::fmt::Display for TrackerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "Started"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Paused => write!(f, "Paused"),
            Self::Resumed => write!(f, "Resumed"),
            Self::AuthorizationRefused(status) => write!(f, "Authorization refused ({status})"),
            Self::Error(e) => write!(f, "Error: {e}"),
            Self::LocationsUpdated(fixes) => {
                write!(f, "{} location(s) updated", fixes.len())
            }
        }
    }
}

/// Receiver of tracker events.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block.
    fn emit(&self, event: TrackerEvent);
}

/// Event sink that forwards events onto an unbounded channel.
///
/// Events emitted after the receiver has been dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<TrackerEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TrackerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: TrackerEvent) {
        if let Err(e) = self.tx.send(event) {
            trace!(event = e.0.name(), "Event receiver gone, dropping event");
        }
    }
}

/// Event sink used when no observer is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, event: TrackerEvent) {
        trace!(event = event.name(), "No observer attached, dropping event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelEventSink::new();
        sink.emit(TrackerEvent::Started);
        sink.emit(TrackerEvent::Paused);

        assert!(matches!(rx.try_recv(), Ok(TrackerEvent::Started)));
        assert!(matches!(rx.try_recv(), Ok(TrackerEvent::Paused)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_drops_after_receiver_gone() {
        let (sink, rx) = ChannelEventSink::new();
        drop(rx);
        // Must not panic
        sink.emit(TrackerEvent::Stopped);
    }

    #[test]
    fn test_null_sink_accepts_events() {
        NullEventSink.emit(TrackerEvent::Started);
        NullEventSink.emit(TrackerEvent::Error(TrackerError::Closed));
    }

    #[test]
    fn test_event_display() {
        assert_eq!(
            TrackerEvent::AuthorizationRefused(AuthorizationStatus::Denied).to_string(),
            "Authorization refused (denied)"
        );
        assert_eq!(
            TrackerEvent::LocationsUpdated(Vec::new()).to_string(),
            "0 location(s) updated"
        );
    }
}
