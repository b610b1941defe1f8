use assert_call::{call, CallRecorder};

use crate::{Core, Event, EventBus};

struct Ping;
impl Event for Ping {}

struct Pong;
impl Event for Pong {}

struct Num(u32);
impl Event for Num {}

#[test]
fn routes_by_exact_type() {
    let mut cr = CallRecorder::new();
    let bus = EventBus::new();
    let core = Core::with_bus(&bus);
    core.on::<Ping>(|_| call!("ping"));
    core.on::<Num>(|Num(n)| call!("num:{n}"));

    bus.dispatch(Ping);
    cr.verify("ping");

    bus.dispatch(Num(7));
    cr.verify("num:7");

    bus.dispatch(Pong);
    cr.verify(());
}

#[test]
fn last_registration_wins() {
    let mut cr = CallRecorder::new();
    let bus = EventBus::new();
    let core = Core::with_bus(&bus);
    core.on::<Ping>(|_| call!("first"));
    core.on::<Ping>(|_| call!("second"));

    bus.dispatch(Ping);
    cr.verify("second");
}

#[test]
fn dispatch_event_forwards_to_the_bus() {
    let mut cr = CallRecorder::new();
    let bus = EventBus::new();
    let core = Core::with_bus(&bus);
    let _s = bus.subscribe(|_| call!("observed"));

    core.dispatch_event(Ping);
    cr.verify("observed");
}

#[test]
fn detached_core_is_a_silent_no_op() {
    let core = Core::new();
    assert!(core.bus().is_none());
    core.dispatch_event(Ping);
}

#[test]
fn handlers_survive_cloning_the_core() {
    let mut cr = CallRecorder::new();
    let bus = EventBus::new();
    let core = Core::with_bus(&bus);
    core.clone().on::<Ping>(|_| call!("ping"));

    core.dispatch_event(Ping);
    cr.verify("ping");
}
