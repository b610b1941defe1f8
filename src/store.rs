use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

use derive_ex::derive_ex;
use futures::{channel::mpsc, pin_mut, Stream, StreamExt};
use tracing::trace;

use crate::{
    update::apply,
    utils::{Slots, SubscriberStream},
    value::shallow_eq,
    Core, Diff, Event, EventBus, Patch, Subscription, Value,
};


type Observer = Rc<RefCell<dyn FnMut(&Value)>>;
type Updater = Box<dyn FnOnce(&Value) -> Patch>;

struct Transition {
    updater: Updater,
    event: Option<Rc<dyn Event>>,
}

/// Pairs an optional state change with an optional event, applied as one
/// step: state observers see the transition before event observers see the
/// event.
#[derive(Default)]
pub struct OperationResult {
    pub update: Option<Diff>,
    pub event: Option<Rc<dyn Event>>,
}

impl OperationResult {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn update(mut self, diff: Diff) -> Self {
        self.update = Some(diff);
        self
    }
    pub fn event(mut self, event: impl Event) -> Self {
        self.event = Some(Rc::new(event));
        self
    }
}

/// An immutable state container over an optional [`EventBus`].
///
/// The store owns exactly one current [`Value`]; every update funnels
/// through one serialized reducer, so transitions are strictly ordered even
/// when an update is issued from inside a state observer (it is queued, not
/// interleaved). Observers only ever see finished, immutable states.
///
/// Cloning a `Store` clones a handle to the same state and handler table.
#[derive(Clone)]
pub struct Store {
    node: Rc<StoreNode>,
    core: Core,
    initial: Value,
}

struct StoreNode {
    state: RefCell<Value>,
    observers: RefCell<Slots<Observer>>,
    reducing: Cell<bool>,
    queued: RefCell<VecDeque<Transition>>,
}

impl Store {
    /// A store without a bus; events dispatched through it are silently
    /// dropped.
    pub fn new(initial: impl Into<Value>) -> Self {
        Self::build(initial.into(), Core::new())
    }

    /// A store whose events go out on `bus` and whose [`on`](Store::on)
    /// handlers receive every event delivered by `bus`.
    pub fn with_bus(initial: impl Into<Value>, bus: &EventBus) -> Self {
        Self::build(initial.into(), Core::with_bus(bus))
    }

    fn build(initial: Value, core: Core) -> Self {
        Store {
            node: Rc::new(StoreNode {
                state: RefCell::new(initial.clone()),
                observers: RefCell::new(Slots::new()),
                reducing: Cell::new(false),
                queued: RefCell::new(VecDeque::new()),
            }),
            core,
            initial,
        }
    }

    /// The most recently published state.
    pub fn state(&self) -> Value {
        self.node.state.borrow().clone()
    }

    /// Registers the handler for events of type `E` delivered by the bus;
    /// last registration wins.
    pub fn on<E: Event>(&self, handler: impl Fn(&E) + 'static) {
        self.core.on(handler);
    }

    /// Forwards an event to the bus; a no-op for a store built without one.
    pub fn dispatch_event(&self, event: impl Event) {
        self.core.dispatch_event(event);
    }

    /// Enqueues one diff provider on the update channel.
    ///
    /// The provider runs against the state current at application time. A
    /// provider returning a patch identical to the current state is a
    /// no-op: no new state, no notification.
    ///
    /// # Panics
    ///
    /// Panics with [`InvalidDiffError`](crate::InvalidDiffError) if the
    /// provider yields a bare transform as the whole diff.
    pub fn update<P>(&self, updater: impl FnOnce(&Value) -> P + 'static)
    where
        P: Into<Patch>,
    {
        self.push_update(Box::new(move |state| updater(state).into()));
    }

    /// Applies a literal diff, ignoring the current state.
    pub fn update_state(&self, diff: Diff) {
        self.push_update(Box::new(move |_| Patch::Diff(diff)));
    }

    /// Registers an update source: every diff provider the stream yields is
    /// applied in arrival order. The returned future drives the source;
    /// drop it to detach.
    pub async fn update_many<S, F, P>(&self, source: S)
    where
        S: Stream<Item = F>,
        F: FnOnce(&Value) -> P + 'static,
        P: Into<Patch>,
    {
        pin_mut!(source);
        while let Some(updater) = source.next().await {
            self.update(updater);
        }
    }

    /// Applies only the first diff provider the source yields, then
    /// detaches; later values are never applied.
    pub async fn update_once<S, F, P>(&self, source: S)
    where
        S: Stream<Item = F>,
        F: FnOnce(&Value) -> P + 'static,
        P: Into<Patch>,
    {
        pin_mut!(source);
        if let Some(updater) = source.next().await {
            self.update(updater);
        }
    }

    /// [`update_many`](Self::update_many) over a stream of raw diffs.
    pub async fn update_state_many<S>(&self, source: S)
    where
        S: Stream<Item = Diff>,
    {
        pin_mut!(source);
        while let Some(diff) = source.next().await {
            self.update_state(diff);
        }
    }

    /// [`update_once`](Self::update_once) over a stream of raw diffs.
    pub async fn update_state_once<S>(&self, source: S)
    where
        S: Stream<Item = Diff>,
    {
        pin_mut!(source);
        if let Some(diff) = source.next().await {
            self.update_state(diff);
        }
    }

    /// Computes an event from the current state and forwards it to the bus.
    pub fn dispatch<E: Event>(&self, event_provider: impl FnOnce(&Value) -> E) {
        let event = {
            let state = self.node.state.borrow();
            event_provider(&state)
        };
        self.core.dispatch_event(event);
    }

    /// Runs an operation against the current state and applies its result
    /// via [`apply_result`](Self::apply_result).
    pub fn execute(&self, operation: impl FnOnce(&Value) -> OperationResult) {
        let result = {
            let state = self.node.state.borrow();
            operation(&state)
        };
        self.apply_result(result);
    }

    /// Applies the state change, then dispatches the event. State observers
    /// see the transition before event observers see the event; a result
    /// produced from inside a state observer keeps that ordering, since the
    /// event rides the queue with its state change.
    pub fn apply_result(&self, result: OperationResult) {
        match (result.update, result.event) {
            (Some(diff), event) => self.push(Transition {
                updater: Box::new(move |_| Patch::Diff(diff)),
                event,
            }),
            (None, Some(event)) => self.core.dispatch_event_rc(event),
            (None, None) => {}
        }
    }

    /// Replaces the state with the construction-time initial value. Just
    /// another transition, not a distinct mode.
    pub fn reset_state(&self) {
        let initial = self.initial.clone();
        self.push_update(Box::new(move |_| Patch::Value(initial)));
    }

    /// Observes every published state, starting immediately with the
    /// current one.
    pub fn subscribe(&self, observer: impl FnMut(&Value) + 'static) -> Subscription {
        let observer: Observer = Rc::new(RefCell::new(observer));
        {
            let state = self.state();
            let mut observer = observer.borrow_mut();
            (&mut *observer)(&state);
        }
        let key = self.node.observers.borrow_mut().insert(observer);
        let node = Rc::downgrade(&self.node);
        Subscription::from_fn(move || {
            if let Some(node) = node.upgrade() {
                node.observers.borrow_mut().remove(key);
            }
        })
    }

    /// A projection of the state, deduplicated by `PartialEq` on the
    /// projected value.
    pub fn map<T>(&self, project: impl Fn(&Value) -> T + 'static) -> Derived<T>
    where
        T: PartialEq + 'static,
    {
        Derived {
            store: self.clone(),
            project: Rc::new(move |state| Some(project(state))),
            dedup: Rc::new(T::eq),
        }
    }

    /// The value of one top-level field (`Value::Null` when absent),
    /// deduplicated by identity.
    pub fn select(&self, key: impl Into<String>) -> Derived<Value> {
        let key = key.into();
        Derived {
            store: self.clone(),
            project: Rc::new(move |state| {
                Some(state.get(&key).cloned().unwrap_or(Value::Null))
            }),
            dedup: Rc::new(Value::same),
        }
    }

    /// The sub-record of the given fields, deduplicated field-wise by
    /// [`shallow_eq`]: changes to unpicked fields notify nobody.
    pub fn pick(&self, keys: &[&str]) -> Derived<Value> {
        let keys: Vec<String> = keys.iter().map(|key| (*key).to_owned()).collect();
        Derived {
            store: self.clone(),
            project: Rc::new(move |state| {
                Some(Value::record(keys.iter().map(|key| {
                    (key.clone(), state.get(key).cloned().unwrap_or(Value::Null))
                })))
            }),
            dedup: Rc::new(shallow_eq),
        }
    }

    /// States satisfying the predicate, deduplicated by identity. States
    /// failing the predicate are skipped without resetting deduplication.
    pub fn filter(&self, predicate: impl Fn(&Value) -> bool + 'static) -> Derived<Value> {
        Derived {
            store: self.clone(),
            project: Rc::new(move |state| predicate(state).then(|| state.clone())),
            dedup: Rc::new(Value::same),
        }
    }

    fn push_update(&self, updater: Updater) {
        self.push(Transition {
            updater,
            event: None,
        });
    }

    fn push(&self, transition: Transition) {
        let node = &*self.node;
        if node.reducing.get() {
            node.queued.borrow_mut().push_back(transition);
            return;
        }
        node.reducing.set(true);
        // Resets the flag and drops queued updates if a provider or an
        // observer panics, so the store stays usable.
        let _guard = ReduceGuard(node);
        let mut next = Some(transition);
        while let Some(transition) = next {
            self.reduce(transition);
            next = node.queued.borrow_mut().pop_front();
        }
    }

    fn reduce(&self, transition: Transition) {
        let node = &*self.node;
        let current = node.state.borrow().clone();
        let patch = (transition.updater)(&current);
        let next = match apply(&current, &patch) {
            Ok(next) => next,
            Err(err) => panic!("{err}"),
        };
        if !next.same(&current) {
            trace!("publishing state transition");
            *node.state.borrow_mut() = next.clone();
            let observers = node.observers.borrow().snapshot();
            for observer in observers {
                let mut observer = observer.borrow_mut();
                (&mut *observer)(&next);
            }
        }
        if let Some(event) = transition.event {
            self.core.dispatch_event_rc(event);
        }
    }
}

struct ReduceGuard<'a>(&'a StoreNode);

impl Drop for ReduceGuard<'_> {
    fn drop(&mut self) {
        self.0.reducing.set(false);
        self.0.queued.borrow_mut().clear();
    }
}

/// A read-only projection of a store's state.
///
/// Each subscription deduplicates independently: an observer is notified
/// only when the projected value differs from the last one it saw.
#[derive_ex(Clone, bound())]
pub struct Derived<T: 'static> {
    store: Store,
    project: Rc<dyn Fn(&Value) -> Option<T>>,
    dedup: Rc<dyn Fn(&T, &T) -> bool>,
}

impl<T: 'static> Derived<T> {
    /// Observes each distinct projected value, starting with the current
    /// one. A filtered projection stays silent until a state passes the
    /// filter.
    pub fn subscribe(&self, mut observer: impl FnMut(&T) + 'static) -> Subscription {
        let project = self.project.clone();
        let dedup = self.dedup.clone();
        let mut last: Option<T> = None;
        self.store.subscribe(move |state| {
            if let Some(value) = project(state) {
                let changed = match &last {
                    Some(previous) => !dedup(previous, &value),
                    None => true,
                };
                if changed {
                    observer(&value);
                    last = Some(value);
                }
            }
        })
    }

    /// The current projected value, if the projection yields one.
    pub fn get(&self) -> Option<T> {
        (self.project)(&self.store.state())
    }

    /// Bridges the projection into a stream of values.
    pub fn to_stream(&self) -> impl Stream<Item = T> + Unpin
    where
        T: Clone,
    {
        let (sender, receiver) = mpsc::unbounded();
        let subscription = self.subscribe(move |value| {
            let _ = sender.unbounded_send(value.clone());
        });
        SubscriberStream::new(receiver, subscription)
    }
}
