//! # Event Bus
//!
//! In-process notifications that tell views to refresh after the store
//! changes. Events carry no payload; subscribers re-read whatever they show.
//!
//! Handlers run synchronously on the publishing task, in registration order.
//! `publish` iterates a snapshot of the handler list, so a handler may
//! subscribe or unsubscribe (itself included) without affecting the current
//! round. A panicking handler is logged and the remaining handlers still run.

use log::{debug, error};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

/// Change notifications published by the data access layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreEvent {
    OnboardingUpdated,
    ConceptsUpdated,
    JournalUpdated,
    AllDataCleared,
}

impl StoreEvent {
    pub const ALL: [StoreEvent; 4] = [
        StoreEvent::OnboardingUpdated,
        StoreEvent::ConceptsUpdated,
        StoreEvent::JournalUpdated,
        StoreEvent::AllDataCleared,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreEvent::OnboardingUpdated => "onboarding_updated",
            StoreEvent::ConceptsUpdated => "concepts_updated",
            StoreEvent::JournalUpdated => "journal_updated",
            StoreEvent::AllDataCleared => "all_data_cleared",
        }
    }
}

impl fmt::Display for StoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscriber; identity is the `Arc` allocation
pub type EventHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<StoreEvent, Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<StoreEvent, Vec<EventHandler>>> {
        // Handlers never run under the lock, so a poisoned registry is still consistent
        self.handlers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `handler` for `event`; the same handler may be registered twice
    pub fn subscribe(&self, event: StoreEvent, handler: EventHandler) {
        let mut registry = self.registry();
        let handlers = registry.entry(event).or_default();
        handlers.push(handler);
        debug!("Subscribed to {} ({} handlers)", event, handlers.len());
    }

    /// Remove one registration of `handler`; returns whether one was found
    pub fn unsubscribe(&self, event: StoreEvent, handler: &EventHandler) -> bool {
        let mut registry = self.registry();
        let Some(handlers) = registry.get_mut(&event) else {
            return false;
        };

        match handlers.iter().position(|h| Arc::ptr_eq(h, handler)) {
            Some(index) => {
                handlers.remove(index);
                debug!("Unsubscribed from {} ({} handlers left)", event, handlers.len());
                true
            }
            None => false,
        }
    }

    pub fn handler_count(&self, event: StoreEvent) -> usize {
        self.registry().get(&event).map_or(0, Vec::len)
    }

    /// Invoke every handler registered for `event`
    pub fn publish(&self, event: StoreEvent) {
        let snapshot: Vec<EventHandler> = self.registry().get(&event).cloned().unwrap_or_default();
        debug!("Publishing {} to {} handlers", event, snapshot.len());

        for (index, handler) in snapshot.iter().enumerate() {
            if panic::catch_unwind(AssertUnwindSafe(|| handler())).is_err() {
                error!("Handler {} for {} panicked", index, event);
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry();
        let mut map = f.debug_map();
        for event in StoreEvent::ALL {
            if let Some(handlers) = registry.get(&event) {
                map.entry(&event.as_str(), &handlers.len());
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> EventHandler {
        let log = Arc::clone(log);
        Arc::new(move || log.lock().unwrap().push(name))
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(StoreEvent::ConceptsUpdated, recorder(&log, "first"));
        bus.subscribe(StoreEvent::ConceptsUpdated, recorder(&log, "second"));
        bus.subscribe(StoreEvent::JournalUpdated, recorder(&log, "other"));

        bus.publish(StoreEvent::ConceptsUpdated);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);

        bus.publish(StoreEvent::AllDataCleared);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_registration_and_identity_removal() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler: EventHandler = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.subscribe(StoreEvent::OnboardingUpdated, Arc::clone(&handler));
        bus.subscribe(StoreEvent::OnboardingUpdated, Arc::clone(&handler));
        bus.publish(StoreEvent::OnboardingUpdated);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // A lookalike closure is a different handler
        let lookalike: EventHandler = Arc::new(|| {});
        assert!(!bus.unsubscribe(StoreEvent::OnboardingUpdated, &lookalike));
        assert!(!bus.unsubscribe(StoreEvent::AllDataCleared, &handler));

        assert!(bus.unsubscribe(StoreEvent::OnboardingUpdated, &handler));
        assert_eq!(bus.handler_count(StoreEvent::OnboardingUpdated), 1);
        bus.publish(StoreEvent::OnboardingUpdated);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(StoreEvent::AllDataCleared, recorder(&log, "before"));
        bus.subscribe(StoreEvent::AllDataCleared, Arc::new(|| panic!("handler failure")));
        bus.subscribe(StoreEvent::AllDataCleared, recorder(&log, "after"));

        bus.publish(StoreEvent::AllDataCleared);
        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
    }

    #[test]
    fn test_handler_may_change_subscriptions_while_publishing() {
        let bus = Arc::new(EventBus::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let slot: Arc<Mutex<Option<EventHandler>>> = Arc::new(Mutex::new(None));
        let once: EventHandler = {
            let bus = Arc::clone(&bus);
            let calls = Arc::clone(&calls);
            let slot = Arc::clone(&slot);
            Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = slot.lock().unwrap().take() {
                    bus.unsubscribe(StoreEvent::JournalUpdated, &me);
                }
                bus.subscribe(StoreEvent::ConceptsUpdated, Arc::new(|| {}));
            })
        };
        *slot.lock().unwrap() = Some(Arc::clone(&once));
        bus.subscribe(StoreEvent::JournalUpdated, once);

        bus.publish(StoreEvent::JournalUpdated);
        bus.publish(StoreEvent::JournalUpdated);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count(StoreEvent::JournalUpdated), 0);
        assert_eq!(bus.handler_count(StoreEvent::ConceptsUpdated), 1);
    }
}
