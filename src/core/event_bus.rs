//! Pub/Sub event bus for cache and decode notifications.
//!
//! - Subscribers register callbacks per event type (invoked immediately on emit)
//! - emit() invokes callbacks AND queues the event
//! - poll() hands queued events to a consumer loop (the CLI, a player, tests)
//!
//! Callback order: FIFO within the same event type. Cross-type order follows
//! emission order in the queue only.
//!
//! Callbacks run on the emitting thread, which for decode results is a worker
//! thread. They must not subscribe from inside a callback.

use log::warn;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Maximum events in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Boxed event for queue storage
pub type BoxedEvent = Box<dyn Event>;

/// Event bus shared by clones
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<TypeId, Vec<Callback>>>>,
    queue: Arc<Mutex<Vec<BoxedEvent>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_types", &self.subscribers.read().map(|s| s.len()).unwrap_or(0))
            .field("queue_len", &self.queue_len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            queue: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe to events of type E.
    ///
    /// # Example
    /// ```ignore
    /// bus.subscribe::<FrameCached, _>(move |e| {
    ///     log::info!("frame {} ready", e.frame);
    /// });
    /// ```
    pub fn subscribe<E, F>(&self, callback: F)
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(TypeId::of::<E>())
            .or_default()
            .push(wrapped);
    }

    /// Invoke callbacks for E, then queue the event for poll()
    pub fn emit<E: Event>(&self, event: E) {
        if let Some(cbs) = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
        {
            for cb in cbs {
                cb(&event);
            }
        }
        self.enqueue(Box::new(event));
    }

    fn enqueue(&self, event: BoxedEvent) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            let evict_count = queue.len() / 2;
            warn!("EventBus queue full ({} events), evicting oldest {}", queue.len(), evict_count);
            queue.drain(0..evict_count);
        }
        queue.push(event);
    }

    /// All events emitted since the last poll
    pub fn poll(&self) -> Vec<BoxedEvent> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Poll and keep only events of type E (others are dropped)
    pub fn poll_of<E: Event + Clone>(&self) -> Vec<E> {
        self.poll()
            .iter()
            .filter_map(|ev| downcast_event::<E>(ev).cloned())
            .collect()
    }

    /// Clear subscribers for type E
    pub fn unsubscribe_all<E: Event>(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&TypeId::of::<E>());
    }

    /// Clear all subscribers and queue
    pub fn clear(&self) {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .is_some_and(|v| !v.is_empty())
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Helper: downcast BoxedEvent to concrete type
///
/// Must deref to `dyn Event` before `as_any()`; otherwise the blanket impl for
/// `Box<dyn Event>` answers and the downcast always fails.
#[inline]
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[derive(Clone, Debug)]
    struct TestEvent {
        value: i32,
    }

    #[derive(Clone, Debug)]
    struct OtherEvent;

    #[test]
    fn test_subscribe_emit_immediate() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);
        bus.subscribe::<TestEvent, _>(move |e| {
            c.fetch_add(e.value, Ordering::SeqCst);
        });

        bus.emit(TestEvent { value: 10 });
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        bus.emit(OtherEvent);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert!(bus.has_subscribers::<TestEvent>());
        assert!(!bus.has_subscribers::<OtherEvent>());
    }

    #[test]
    fn test_poll_and_poll_of() {
        let bus = EventBus::new();
        bus.emit(TestEvent { value: 1 });
        bus.emit(OtherEvent);
        bus.emit(TestEvent { value: 2 });
        assert_eq!(bus.queue_len(), 3);

        let values: Vec<i32> = bus.poll_of::<TestEvent>().iter().map(|e| e.value).collect();
        assert_eq!(values, vec![1, 2]);
        assert_eq!(bus.poll().len(), 0);
    }

    #[test]
    fn test_clone_shares_queue_and_subscribers() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);
        bus.subscribe::<TestEvent, _>(move |e| {
            c.fetch_add(e.value, Ordering::SeqCst);
        });

        let handle = bus.clone();
        handle.emit(TestEvent { value: 42 });
        assert_eq!(counter.load(Ordering::SeqCst), 42);
        assert_eq!(bus.poll().len(), 1);
    }

    #[test]
    fn test_unsubscribe_keeps_queueing() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);
        bus.subscribe::<TestEvent, _>(move |e| {
            c.fetch_add(e.value, Ordering::SeqCst);
        });
        bus.unsubscribe_all::<TestEvent>();
        bus.emit(TestEvent { value: 10 });
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(bus.poll().len(), 1);
    }

    #[test]
    fn test_queue_eviction() {
        let bus = EventBus::new();
        for i in 0..(MAX_QUEUE_SIZE as i32 + 1) {
            bus.emit(TestEvent { value: i });
        }
        let events = bus.poll_of::<TestEvent>();
        assert_eq!(events.len(), MAX_QUEUE_SIZE / 2 + 1);
        assert_eq!(events.last().map(|e| e.value), Some(MAX_QUEUE_SIZE as i32));
    }
}
