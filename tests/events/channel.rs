//! Integration tests for event channel delivery
//!
//! Tests ordering, once listeners, removal, re-entrancy, and closing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use usual_events::{ChannelConfig, Event, EventChannel, ListenerId};
use usual_foundation::Value;

fn log() -> Rc<RefCell<Vec<String>>> {
    Rc::new(RefCell::new(Vec::new()))
}

// =============================================================================
// Delivery
// =============================================================================

#[test]
fn listeners_fire_in_registration_order() {
    let channel = EventChannel::default();
    let seen = log();
    for label in ["first", "second", "third"] {
        let sink = Rc::clone(&seen);
        channel.on("tick", move |_| sink.borrow_mut().push(label.to_string()));
    }

    assert!(channel.emit("tick", &[]));
    assert_eq!(*seen.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn listener_sees_name_and_args() {
    let channel = EventChannel::default();
    let seen = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    channel.on("update", move |e: &Event<'_>| {
        *sink.borrow_mut() = Some((e.name().to_string(), e.args().to_vec()));
    });

    channel.emit("update", &[Value::Int(1), Value::Nil]);
    let (name, args) = seen.borrow().clone().unwrap();
    assert_eq!(name, "update");
    assert_eq!(args, vec![Value::Int(1), Value::Nil]);
}

#[test]
fn unmatched_emit_reports_false() {
    let channel = EventChannel::default();
    channel.on("a", |_| {});
    assert!(!channel.emit("b", &[]));
}

// =============================================================================
// Listener lifecycle
// =============================================================================

#[test]
fn once_listener_is_removed_before_it_runs() {
    let channel = Rc::new(EventChannel::default());
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    let inner = Rc::downgrade(&channel);
    channel.once("ping", move |_| {
        h.set(h.get() + 1);
        // Re-emitting from inside must not reach this listener again
        if let Some(channel) = inner.upgrade() {
            channel.emit("ping", &[]);
        }
    });

    channel.emit("ping", &[]);
    channel.emit("ping", &[]);
    assert_eq!(hits.get(), 1);
    assert!(channel.is_empty());
}

#[test]
fn off_removes_only_that_listener() {
    let channel = EventChannel::default();
    let hits = Rc::new(Cell::new(0));
    let (a, b) = (Rc::clone(&hits), Rc::clone(&hits));
    let first = channel.on("x", move |_| a.set(a.get() + 1));
    channel.on("x", move |_| b.set(b.get() + 10));

    assert!(channel.off(first));
    assert!(!channel.off(first));
    channel.emit("x", &[]);
    assert_eq!(hits.get(), 10);
}

#[test]
fn listener_can_remove_a_later_listener() {
    let channel = Rc::new(EventChannel::default());
    let victim: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
    let fired = Rc::new(Cell::new(false));

    let (weak, target) = (Rc::downgrade(&channel), Rc::clone(&victim));
    channel.on("go", move |_| {
        if let (Some(channel), Some(id)) = (weak.upgrade(), target.get()) {
            channel.off(id);
        }
    });
    let f = Rc::clone(&fired);
    victim.set(Some(channel.on("go", move |_| f.set(true))));

    channel.emit("go", &[]);
    assert!(!fired.get());
    assert_eq!(channel.len(), 1);
}

#[test]
fn listener_added_during_emit_waits_for_next() {
    let channel = Rc::new(EventChannel::default());
    let hits = Rc::new(Cell::new(0));
    let (weak, h) = (Rc::downgrade(&channel), Rc::clone(&hits));
    channel.once("go", move |_| {
        if let Some(channel) = weak.upgrade() {
            let h = Rc::clone(&h);
            channel.on("go", move |_| h.set(h.get() + 1));
        }
    });

    channel.emit("go", &[]);
    assert_eq!(hits.get(), 0);
    channel.emit("go", &[]);
    assert_eq!(hits.get(), 1);
}

#[test]
fn off_event_and_counts() {
    let channel = EventChannel::default();
    channel.on("a", |_| {});
    channel.on("a", |_| {});
    channel.on("b", |_| {});

    assert_eq!(channel.listener_count("a"), 2);
    assert_eq!(channel.off_event("a"), 2);
    assert_eq!(channel.len(), 1);
    channel.off_all();
    assert!(channel.is_empty());
}

#[test]
fn closed_channel_ignores_everything() {
    let channel = EventChannel::default();
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    channel.on("x", move |_| h.set(h.get() + 1));

    channel.close();
    let late = channel.on("x", |_| {});
    assert!(!channel.contains(late));
    assert!(!channel.emit("x", &[]));
    assert_eq!(hits.get(), 0);
}

#[test]
fn max_listeners_only_warns() {
    let channel = EventChannel::new(ChannelConfig::new().with_max_listeners(1));
    channel.on("x", |_| {});
    channel.on("x", |_| {});
    assert_eq!(channel.listener_count("x"), 2);
}
