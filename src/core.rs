use std::{
    any::{Any, TypeId},
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
};

use crate::{Event, EventBus, Subscription};

#[cfg(test)]
mod tests;

type Handler = Rc<dyn Fn(&dyn Event)>;
type HandlerMap = Rc<RefCell<HashMap<TypeId, Handler>>>;

/// Routes events delivered by an [`EventBus`] to at most one handler per
/// event type.
///
/// A core built with [`Core::new`] has no bus: dispatching through it is a
/// silent no-op, which keeps stores usable in isolation (tests, tools)
/// without a live dispatcher.
#[derive(Clone)]
pub struct Core {
    handlers: HandlerMap,
    bus: Option<EventBus>,
    _bus_subscription: Option<Rc<Subscription>>,
}

impl Core {
    pub fn new() -> Self {
        Core {
            handlers: Rc::new(RefCell::new(HashMap::new())),
            bus: None,
            _bus_subscription: None,
        }
    }

    /// Subscribes to `bus` once and routes every delivered event through
    /// the handler table.
    pub fn with_bus(bus: &EventBus) -> Self {
        let handlers: HandlerMap = Rc::new(RefCell::new(HashMap::new()));
        let subscription = {
            let handlers = Rc::downgrade(&handlers);
            bus.subscribe(move |event| {
                if let Some(handlers) = handlers.upgrade() {
                    handle_event(&handlers, event);
                }
            })
        };
        Core {
            handlers,
            bus: Some(bus.clone()),
            _bus_subscription: Some(Rc::new(subscription)),
        }
    }

    /// Registers the handler for events of type `E`, replacing any previous
    /// registration for that exact type. Only exact type identity matches.
    pub fn on<E: Event>(&self, handler: impl Fn(&E) + 'static) {
        let handler: Handler = Rc::new(move |event: &dyn Event| {
            let event: &dyn Any = event;
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });
        self.handlers.borrow_mut().insert(TypeId::of::<E>(), handler);
    }

    /// Forwards the event to the bus; a no-op when the core has none.
    pub fn dispatch_event(&self, event: impl Event) {
        self.dispatch_event_rc(Rc::new(event));
    }

    pub fn dispatch_event_rc(&self, event: Rc<dyn Event>) {
        if let Some(bus) = &self.bus {
            bus.dispatch_rc(event);
        }
    }

    pub fn bus(&self) -> Option<&EventBus> {
        self.bus.as_ref()
    }
}

impl Default for Core {
    fn default() -> Self {
        Core::new()
    }
}

fn handle_event(handlers: &RefCell<HashMap<TypeId, Handler>>, event: &Rc<dyn Event>) {
    let type_id = {
        let event: &dyn Any = &**event;
        event.type_id()
    };
    // Lookup and call are separated so a handler can re-register handlers.
    let handler = handlers.borrow().get(&type_id).cloned();
    if let Some(handler) = handler {
        handler(&**event);
    }
}
