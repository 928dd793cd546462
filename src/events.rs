//! Course lifecycle events and the observers reacting to them.
//!
//! The host LMS may deliver the same event more than once, so observers must
//! be idempotent.

use std::sync::Arc;
use futures::future::BoxFuture;

use crate::{model::CourseId, prelude::*};


#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CourseEvent {
    /// The course was deleted in the host LMS.
    Deleted { course: CourseId },
}

/// Something that wants to be notified about course events.
pub(crate) trait Observer: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &'static str;

    fn notify<'a>(&'a self, event: &'a CourseEvent) -> BoxFuture<'a, ()>;
}

/// Dispatches events to all subscribed observers, one after another in
/// subscription order.
#[derive(Default, Clone)]
pub(crate) struct EventBus {
    observers: Vec<Arc<dyn Observer>>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(&mut self, observer: Arc<dyn Observer>) {
        debug!("Observer '{}' subscribed to course events", observer.name());
        self.observers.push(observer);
    }

    pub(crate) async fn publish(&self, event: &CourseEvent) {
        debug!("Publishing {event:?} to {} observers", self.observers.len());
        for observer in &self.observers {
            trace!("Notifying '{}' about {event:?}", observer.name());
            observer.notify(event).await;
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use futures::future::BoxFuture;

    use crate::{model::CourseId, prelude::*};
    use super::{CourseEvent, EventBus, Observer};

    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<(&'static str, CourseEvent)>>>,
    }

    impl Observer for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn notify<'a>(&'a self, event: &'a CourseEvent) -> BoxFuture<'a, ()> {
            async move {
                self.seen.lock().unwrap().push((self.name, event.clone()));
            }.boxed()
        }
    }

    #[tokio::test]
    async fn observers_are_notified_in_order() {
        let seen = Arc::new(Mutex::new(vec![]));
        let mut bus = EventBus::new();
        bus.subscribe(Arc::new(Recorder { name: "first", seen: seen.clone() }));
        bus.subscribe(Arc::new(Recorder { name: "second", seen: seen.clone() }));

        let event = CourseEvent::Deleted { course: CourseId(7) };
        bus.publish(&event).await;
        bus.publish(&event).await;

        assert_eq!(*seen.lock().unwrap(), vec![
            ("first", event.clone()),
            ("second", event.clone()),
            ("first", event.clone()),
            ("second", event),
        ]);
    }

    #[tokio::test]
    async fn publishing_without_observers_is_fine() {
        EventBus::new().publish(&CourseEvent::Deleted { course: CourseId(1) }).await;
    }
}
