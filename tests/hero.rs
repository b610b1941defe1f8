use std::{any::Any, rc::Rc};

use assert_call::{call, CallRecorder};
use coreflux::{Diff, Event, EventBus, OperationResult, Store, Value};

struct MonsterDied;
impl Event for MonsterDied {}

struct HeroAttacked {
    damage: i64,
}
impl Event for HeroAttacked {}

struct HeroGainedLevel {
    new_level: i64,
}
impl Event for HeroGainedLevel {}

fn field(state: &Value, key: &str) -> i64 {
    state.get(key).and_then(Value::as_int).unwrap()
}

/// A component owning its state and reacting to events from the rest of the
/// application.
#[derive(Clone)]
struct Hero {
    store: Store,
}

impl Hero {
    fn new(bus: &EventBus) -> Hero {
        let initial = Value::record([
            ("level", Value::Int(1)),
            ("attack_count", Value::Int(0)),
            ("power", Value::Int(1)),
        ]);
        let hero = Hero {
            store: Store::with_bus(initial, bus),
        };
        let store = hero.store.clone();
        hero.store.on::<MonsterDied>(move |_| {
            store.execute(|state| {
                let new_level = field(state, "level") + 1;
                OperationResult::new()
                    .update(Diff::new().set("level", new_level))
                    .event(HeroGainedLevel { new_level })
            });
        });
        hero
    }

    fn attack(&self) {
        self.store
            .update(|_| Diff::new().with("attack_count", |n| (n.as_int().unwrap() + 1).into()));
        self.store
            .dispatch(|state| HeroAttacked { damage: field(state, "power") });
    }

    fn store(&self) -> &Store {
        &self.store
    }
}

fn on_event<E: Event>(event: &Rc<dyn Event>) -> Option<&E> {
    let event: &dyn Any = &**event;
    event.downcast_ref::<E>()
}

#[test]
fn attacking_updates_state_then_announces_the_attack() {
    let mut cr = CallRecorder::new();
    let bus = EventBus::new();
    let hero = Hero::new(&bus);

    let _attacks = hero
        .store()
        .select("attack_count")
        .subscribe(|n| call!("attacks:{}", n.as_int().unwrap()));
    let _events = bus.subscribe(|e| {
        if let Some(attack) = on_event::<HeroAttacked>(e) {
            call!("damage:{}", attack.damage);
        }
    });
    cr.verify("attacks:0");

    hero.attack();
    cr.verify(["attacks:1", "damage:1"]);

    hero.attack();
    cr.verify(["attacks:2", "damage:1"]);
}

#[test]
fn leveling_up_reacts_to_events_from_elsewhere() {
    let mut cr = CallRecorder::new();
    let bus = EventBus::new();
    let hero = Hero::new(&bus);

    let _levels = hero
        .store()
        .select("level")
        .subscribe(|l| call!("level:{}", l.as_int().unwrap()));
    let _events = bus.subscribe(|e| {
        if let Some(gained) = on_event::<HeroGainedLevel>(e) {
            call!("gained:{}", gained.new_level);
        }
    });
    cr.verify("level:1");

    // Some other component reports a kill; the hero levels up and announces
    // it, state first.
    bus.dispatch(MonsterDied);
    cr.verify(["level:2", "gained:2"]);

    bus.dispatch(MonsterDied);
    cr.verify(["level:3", "gained:3"]);
}

#[test]
fn snapshots_stay_untouched_by_later_transitions() {
    let bus = EventBus::new();
    let hero = Hero::new(&bus);
    let before = hero.store().state();

    hero.attack();
    assert_eq!(field(&before, "attack_count"), 0);
    assert_eq!(field(&hero.store().state(), "attack_count"), 1);
    // Fields the attack never touched are shared with the old snapshot.
    assert!(hero
        .store()
        .state()
        .get("power")
        .unwrap()
        .same(before.get("power").unwrap()));
}
