//! Disposal and handle-lifetime behavior.

use std::cell::Cell;
use std::rc::Rc;

use pulse_signals::{computed, effect, effect_scope, signal, watch};

#[test]
fn disposed_effect_never_fires_again() {
    let runs = Rc::new(Cell::new(0));
    let s = signal(0);

    let (src, counter) = (s.clone(), runs.clone());
    let dispose = effect(move || {
        let _ = src.get();
        counter.set(counter.get() + 1);
    });

    s.set(1);
    assert_eq!(runs.get(), 2);

    dispose();
    s.set(2);
    s.set(3);
    assert_eq!(runs.get(), 2);
}

#[test]
fn dropping_a_computed_handle_stops_its_recomputes() {
    let runs = Rc::new(Cell::new(0));
    let s = signal(0);

    let (src, counter) = (s.clone(), runs.clone());
    let c = computed(move |_| {
        counter.set(counter.get() + 1);
        src.get()
    });
    assert_eq!(c.get(), 0);

    drop(c);
    s.set(1);
    s.set(2);
    assert_eq!(runs.get(), 1, "no handle, no subscriber, no recompute");
    assert_eq!(s.get(), 2, "the source itself is unaffected");
}

#[test]
fn computed_kept_alive_by_a_subscriber_outlives_its_handle() {
    let s = signal(1);
    let src = s.clone();
    let c = computed(move |_| src.get() * 2);

    let seen = Rc::new(Cell::new(0));
    let (d, sink) = (c.clone(), seen.clone());
    let _dispose = effect(move || sink.set(d.get()));

    drop(c);
    s.set(5);
    assert_eq!(seen.get(), 10, "the effect's clone keeps the chain alive");
}

#[test]
fn orphaned_computed_resubscribes_on_next_read() {
    let s = signal(1);
    let src = s.clone();
    let c = computed(move |_| src.get() * 2);

    let (d, sink) = (c.clone(), Rc::new(Cell::new(0)));
    let seen = sink.clone();
    let dispose = effect(move || seen.set(d.get()));
    assert_eq!(sink.get(), 2);

    // Last subscriber leaves; the computed is reset and detached
    dispose();
    s.set(10);
    assert_eq!(sink.get(), 2, "no subscriber, no push");

    // A direct read revalidates from scratch
    assert_eq!(c.get(), 20);
}

#[test]
fn scope_disposal_cascades_through_nested_scopes_and_watches() {
    let s = signal(0);
    let effect_runs = Rc::new(Cell::new(0));
    let watch_fires = Rc::new(Cell::new(0));

    let (src, e_runs, w_fires) = (s.clone(), effect_runs.clone(), watch_fires.clone());
    let dispose = effect_scope(move || {
        let (src2, w_fires2) = (src.clone(), w_fires.clone());
        let _ = effect(move || {
            let _ = src.get();
            e_runs.set(e_runs.get() + 1);
        });
        let _ = effect_scope(move || {
            let _ = watch(&src2, move || w_fires2.set(w_fires2.get() + 1));
        });
    });

    s.set(1);
    assert_eq!(effect_runs.get(), 2);
    assert_eq!(watch_fires.get(), 1);

    dispose();
    s.set(2);
    assert_eq!(effect_runs.get(), 2);
    assert_eq!(watch_fires.get(), 1);
}

#[test]
fn disposing_from_inside_the_effect_itself() {
    let runs = Rc::new(Cell::new(0));
    let s = signal(0);

    let disposer: Rc<Cell<Option<Box<dyn FnOnce()>>>> = Rc::new(Cell::new(None));

    let (src, counter, slot) = (s.clone(), runs.clone(), disposer.clone());
    let dispose = effect(move || {
        counter.set(counter.get() + 1);
        if src.get() >= 2 {
            if let Some(d) = slot.take() {
                d();
            }
        }
    });
    disposer.set(Some(dispose));

    s.set(1);
    s.set(2); // effect tears itself down during this run
    s.set(3);
    assert_eq!(runs.get(), 3, "no run after self-disposal");
}

#[test]
fn dropped_signal_handles_leave_clones_working() {
    let a = signal(String::from("x"));
    let b = a.clone();
    drop(a);

    b.set(String::from("y"));
    assert_eq!(b.get(), "y");
}
