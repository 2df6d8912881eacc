//! Domain events and the post-commit dispatch boundary.
//!
//! # Responsibility
//! - Define the marker contract for recorded domain events.
//! - Define the collaborator that receives events after a successful commit.
//!
//! # Invariants
//! - Events are dispatched only after the save transaction committed.

use std::any::{type_name, Any};
use std::fmt::Debug;

/// Fact recorded by an aggregate mutation.
///
/// Implement it as an empty marker: `impl DomainEvent for OrderCreated {}`.
pub trait DomainEvent: EventMeta + Debug + Send + 'static {}

/// Type-level event facts reachable through `dyn DomainEvent`.
///
/// Implemented for every [`DomainEvent`]; never implement it by hand.
pub trait EventMeta {
    fn event_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

impl<T: DomainEvent> EventMeta for T {
    fn event_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn DomainEvent {
    pub fn is<E: DomainEvent>(&self) -> bool {
        self.as_any().is::<E>()
    }

    pub fn downcast_ref<E: DomainEvent>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }
}

/// Receives the events released by a saved aggregate.
pub trait EventDispatcher {
    /// Called once per successful save, after commit. `events` may be empty.
    fn dispatch(&mut self, events: Vec<Box<dyn DomainEvent>>);
}

impl<F> EventDispatcher for F
where
    F: FnMut(Vec<Box<dyn DomainEvent>>),
{
    fn dispatch(&mut self, events: Vec<Box<dyn DomainEvent>>) {
        self(events)
    }
}

/// Dispatcher for callers that do not consume domain events.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardEvents;

impl EventDispatcher for DiscardEvents {
    fn dispatch(&mut self, _events: Vec<Box<dyn DomainEvent>>) {}
}

#[cfg(test)]
mod tests {
    use super::{DomainEvent, EventDispatcher};

    #[derive(Debug)]
    struct OrderPlaced;

    impl DomainEvent for OrderPlaced {}

    #[derive(Debug)]
    struct OrderCancelled;

    impl DomainEvent for OrderCancelled {}

    #[test]
    fn boxed_events_report_concrete_type() {
        let event: Box<dyn DomainEvent> = Box::new(OrderPlaced);
        assert!(event.is::<OrderPlaced>());
        assert!(!event.is::<OrderCancelled>());
        assert!(event.event_name().ends_with("OrderPlaced"));
    }

    #[test]
    fn closures_act_as_dispatchers() {
        let mut seen = Vec::new();
        {
            let mut dispatcher = |events: Vec<Box<dyn DomainEvent>>| {
                seen.extend(events.iter().map(|event| event.event_name()));
            };
            let events: Vec<Box<dyn DomainEvent>> =
                vec![Box::new(OrderPlaced), Box::new(OrderCancelled)];
            dispatcher.dispatch(events);
        }
        assert_eq!(seen.len(), 2);
        assert!(seen[1].ends_with("OrderCancelled"));
    }
}
