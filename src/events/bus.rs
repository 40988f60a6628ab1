use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::models::StateEvent;

/// A bus subscriber. Errors are recorded but never stop dispatch to the
/// remaining subscribers.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, event: &StateEvent) -> Result<()>;
}

/// In-process pub/sub for state-transition events. Subscribers receive
/// events synchronously in registration order; the subscriber table is
/// snapshotted before dispatch so subscribe/unsubscribe during an in-flight
/// publish does not affect it. Events are not durable.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Arc<dyn EventSubscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        let mut subscribers = self.subscribers.write().expect("subscriber table poisoned");
        subscribers.push(subscriber);
    }

    pub fn unsubscribe(&self, name: &str) {
        let mut subscribers = self.subscribers.write().expect("subscriber table poisoned");
        subscribers.retain(|s| s.name() != name);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("subscriber table poisoned").len()
    }

    fn snapshot(&self) -> Vec<Arc<dyn EventSubscriber>> {
        self.subscribers
            .read()
            .expect("subscriber table poisoned")
            .clone()
    }

    /// Dispatch one event to every subscriber in registration order. The
    /// first error is returned after all subscribers have run.
    pub async fn publish(&self, event: &StateEvent) -> Result<()> {
        let mut first_error = None;
        for subscriber in self.snapshot() {
            debug!(event = %event.event_type, subscriber = subscriber.name(), "dispatching event");
            if let Err(err) = subscriber.handle(event).await {
                warn!(
                    event = %event.event_type,
                    subscriber = subscriber.name(),
                    error = %err,
                    "subscriber failed"
                );
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Dispatch a batch in order; each subscriber sees events in publish
    /// order. Returns the first error seen across the whole batch.
    pub async fn publish_all(&self, events: &[StateEvent]) -> Result<()> {
        let mut first_error = None;
        for event in events {
            if let Err(err) = self.publish(event).await {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Best-effort fire-and-forget dispatch on a background task.
    pub fn publish_detached(&self, events: Vec<StateEvent>) {
        let bus = self.clone();
        tokio::spawn(async move {
            if let Err(err) = bus.publish_all(&events).await {
                warn!(error = %err, "detached event dispatch failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use anyhow::anyhow;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct Recorder {
        name: String,
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl EventSubscriber for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, event: &StateEvent) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, event.event_type));
            if self.fail {
                Err(anyhow!("{} failed", self.name))
            } else {
                Ok(())
            }
        }
    }

    fn event(event_type: EventType) -> StateEvent {
        StateEvent::new(event_type, Uuid::new_v4(), Uuid::new_v4(), &())
    }

    #[tokio::test]
    async fn subscribers_run_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            bus.subscribe(Arc::new(Recorder {
                name: name.to_string(),
                seen: seen.clone(),
                fail: false,
            }));
        }

        bus.publish(&event(EventType::WeekCompleted)).await.unwrap();

        assert_eq!(
            seen.lock().unwrap().clone(),
            vec![
                "first:WEEK_COMPLETED",
                "second:WEEK_COMPLETED",
                "third:WEEK_COMPLETED"
            ]
        );
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_stop_later_ones() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Arc::new(Recorder {
            name: "fails".to_string(),
            seen: seen.clone(),
            fail: true,
        }));
        bus.subscribe(Arc::new(Recorder {
            name: "runs".to_string(),
            seen: seen.clone(),
            fail: false,
        }));

        let result = bus.publish(&event(EventType::SetLogged)).await;

        assert!(result.is_err());
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unsubscribe_removes_by_name() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Arc::new(Recorder {
            name: "gone".to_string(),
            seen: seen.clone(),
            fail: false,
        }));
        bus.unsubscribe("gone");

        bus.publish(&event(EventType::Enrolled)).await.unwrap();

        assert_eq!(bus.subscriber_count(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_preserves_publish_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Arc::new(Recorder {
            name: "sub".to_string(),
            seen: seen.clone(),
            fail: false,
        }));

        let events = vec![
            event(EventType::WorkoutCompleted),
            event(EventType::WeekCompleted),
            event(EventType::CycleCompleted),
            event(EventType::CycleBoundaryReached),
        ];
        bus.publish_all(&events).await.unwrap();

        assert_eq!(
            seen.lock().unwrap().clone(),
            vec![
                "sub:WORKOUT_COMPLETED",
                "sub:WEEK_COMPLETED",
                "sub:CYCLE_COMPLETED",
                "sub:CYCLE_BOUNDARY_REACHED"
            ]
        );
    }
}
