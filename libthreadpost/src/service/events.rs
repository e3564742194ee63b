//! Progress events for thread publishing
//!
//! The publisher emits one `ThreadStarted`, then a `PostProgress` before and
//! a `PostPublished` after each post, and finally exactly one of
//! `ThreadCompleted` or `ThreadFailed`. Front ends subscribe to render
//! progress; the publisher never waits on them.
//!
//! ```no_run
//! use libthreadpost::service::events::{Event, EventBus};
//!
//! # async fn render() {
//! let bus = EventBus::default();
//! let mut events = bus.subscribe();
//!
//! while let Ok(event) = events.recv().await {
//!     eprintln!("{:?}", event);
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub type EventReceiver = broadcast::Receiver<Event>;

/// Fan-out of publishing events over `tokio::sync::broadcast`
///
/// Cloning shares the channel. A slow subscriber sees
/// `RecvError::Lagged` and loses the oldest events rather than slowing the
/// publisher.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// `capacity` is the number of events buffered per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Receive events emitted after this call
    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }

    /// Send to every current subscriber; returns how many received it
    pub fn emit(&self, event: Event) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(dropped)) => {
                tracing::trace!("No subscribers for {} event", dropped.job_id());
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Events emitted while publishing a thread
///
/// Durations are in milliseconds so events serialize cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Validation passed and the first post is about to be sent
    ThreadStarted {
        job_id: String,
        total: usize,
        /// Precomputed whole-thread estimate
        estimated_ms: u64,
    },

    /// A post is about to be sent
    PostProgress {
        job_id: String,
        /// 1-based position of the post being sent
        index: usize,
        total: usize,
        /// First 100 characters of the body
        preview: String,
        elapsed_ms: u64,
        /// `None` until at least one post has completed
        remaining_ms: Option<u64>,
    },

    /// A post was created
    PostPublished {
        job_id: String,
        /// 1-based position
        index: usize,
        uri: String,
        cid: String,
    },

    /// Every post was created
    ThreadCompleted { job_id: String, posted: usize },

    /// The thread stopped early
    ThreadFailed {
        job_id: String,
        posted: usize,
        total: usize,
        error: String,
    },
}

impl Event {
    pub fn job_id(&self) -> &str {
        match self {
            Event::ThreadStarted { job_id, .. }
            | Event::PostProgress { job_id, .. }
            | Event::PostPublished { job_id, .. }
            | Event::ThreadCompleted { job_id, .. }
            | Event::ThreadFailed { job_id, .. } => job_id,
        }
    }

    /// True for `ThreadCompleted` and `ThreadFailed`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::ThreadCompleted { .. } | Event::ThreadFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    fn started(job_id: &str) -> Event {
        Event::ThreadStarted {
            job_id: job_id.to_string(),
            total: 3,
            estimated_ms: 3500,
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_each_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let published = Event::PostPublished {
            job_id: "job2".to_string(),
            index: 1,
            uri: "at://did:plc:x/app.bsky.feed.post/1".to_string(),
            cid: "bafy1".to_string(),
        };
        assert_eq!(bus.emit(started("job2")), 2);
        assert_eq!(bus.emit(published.clone()), 2);

        for receiver in [&mut first, &mut second] {
            assert_eq!(receiver.recv().await.unwrap(), started("job2"));
            assert_eq!(receiver.recv().await.unwrap(), published);
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::default();
        assert_eq!(bus.emit(started("early")), 0);

        let mut late = bus.subscribe();
        bus.emit(started("later"));
        assert_eq!(late.recv().await.unwrap().job_id(), "later");
    }

    #[tokio::test]
    async fn test_lagging_subscriber_does_not_block_emitter() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe();

        for i in 0..5 {
            bus.emit(started(&format!("job{}", i)));
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(slow.recv().await.unwrap().job_id(), "job3");
    }

    #[test]
    fn test_wire_format_is_tagged() {
        let event = Event::ThreadFailed {
            job_id: "job4".to_string(),
            posted: 1,
            total: 3,
            error: "Network timeout".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "thread_failed");
        assert_eq!(json["posted"], 1);

        let parsed: Event = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_terminal_events() {
        let progress = Event::PostProgress {
            job_id: "j".to_string(),
            index: 1,
            total: 2,
            preview: "hi".to_string(),
            elapsed_ms: 0,
            remaining_ms: None,
        };
        assert!(!progress.is_terminal());
        assert!(!started("j").is_terminal());

        let done = Event::ThreadCompleted {
            job_id: "j".to_string(),
            posted: 2,
        };
        assert!(done.is_terminal());
        assert_eq!(done.job_id(), "j");
    }
}
