use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::VecDeque,
    panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
    rc::Rc,
};

use futures::{channel::mpsc, Stream};
use tracing::trace;

use crate::{
    utils::{Slots, SubscriberStream},
    Subscription,
};


/// Marker for values dispatched through an [`EventBus`].
///
/// Events carry no required shape; their identity is the concrete type
/// itself, which is what [`Core::on`](crate::Core::on) keys handlers by.
/// Once dispatched an event travels as `Rc<dyn Event>`, shared across all
/// observers and immutable from then on.
pub trait Event: Any {}

type Observer = Rc<RefCell<dyn FnMut(&Rc<dyn Event>)>>;

/// A synchronous publish/subscribe hub.
///
/// Observers are notified in subscription order. A dispatch issued from
/// inside an observer of the same bus is queued and delivered after the
/// in-progress delivery has reached every observer, oldest queued event
/// first.
#[derive(Clone, Default)]
pub struct EventBus(Rc<BusNode>);

#[derive(Default)]
struct BusNode {
    observers: RefCell<Slots<Observer>>,
    dispatching: Cell<bool>,
    queued: RefCell<VecDeque<Rc<dyn Event>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every currently registered observer.
    ///
    /// A panicking observer does not prevent the remaining observers from
    /// receiving the same event; the panic resumes once delivery of the
    /// in-flight event completes, and any queued events are discarded.
    pub fn dispatch(&self, event: impl Event) {
        self.dispatch_rc(Rc::new(event));
    }

    /// Like [`dispatch`](Self::dispatch) for an already shared event.
    pub fn dispatch_rc(&self, event: Rc<dyn Event>) {
        let node = &*self.0;
        if node.dispatching.get() {
            trace!("queueing reentrant dispatch");
            node.queued.borrow_mut().push_back(event);
            return;
        }
        node.dispatching.set(true);
        let mut panic_payload = None;
        let mut next = Some(event);
        while let Some(event) = next {
            trace!("dispatching event");
            let observers = node.observers.borrow().snapshot();
            for observer in observers {
                let delivered = catch_unwind(AssertUnwindSafe(|| {
                    let mut observer = observer.borrow_mut();
                    (&mut *observer)(&event)
                }));
                if let Err(payload) = delivered {
                    panic_payload.get_or_insert(payload);
                }
            }
            if panic_payload.is_some() {
                node.queued.borrow_mut().clear();
            }
            next = node.queued.borrow_mut().pop_front();
        }
        node.dispatching.set(false);
        if let Some(payload) = panic_payload {
            resume_unwind(payload);
        }
    }

    /// Registers an observer; only events dispatched afterwards are
    /// observed.
    pub fn subscribe(&self, observer: impl FnMut(&Rc<dyn Event>) + 'static) -> Subscription {
        let key = self
            .0
            .observers
            .borrow_mut()
            .insert(Rc::new(RefCell::new(observer)));
        let node = Rc::downgrade(&self.0);
        Subscription::from_fn(move || {
            if let Some(node) = node.upgrade() {
                node.observers.borrow_mut().remove(key);
            }
        })
    }

    /// Bridges the bus into a stream of events.
    pub fn to_stream(&self) -> impl Stream<Item = Rc<dyn Event>> + Unpin {
        let (sender, receiver) = mpsc::unbounded();
        let subscription = self.subscribe(move |event| {
            let _ = sender.unbounded_send(event.clone());
        });
        SubscriberStream::new(receiver, subscription)
    }
}
