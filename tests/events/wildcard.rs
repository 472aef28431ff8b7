//! Integration tests for wildcard event names
//!
//! Tests `*` and `**` matching, custom delimiters, and disabling wildcards.

use std::cell::RefCell;
use std::rc::Rc;

use usual_events::{ChannelConfig, EventChannel, pattern};

fn recording(channel: &EventChannel, patterns: &[&'static str]) -> Rc<RefCell<Vec<&'static str>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    for &p in patterns {
        let sink = Rc::clone(&seen);
        channel.on(p, move |_| sink.borrow_mut().push(p));
    }
    seen
}

#[test]
fn single_segment_wildcard() {
    let channel = EventChannel::default();
    let seen = recording(&channel, &["user.*", "user.name", "user.*.first"]);

    channel.emit("user.name", &[]);
    assert_eq!(*seen.borrow(), vec!["user.*", "user.name"]);
}

#[test]
fn multi_segment_wildcard() {
    let channel = EventChannel::default();
    let seen = recording(&channel, &["user.**", "**"]);

    channel.emit("user.name.first", &[]);
    channel.emit("user", &[]);
    assert_eq!(*seen.borrow(), vec!["user.**", "**", "user.**", "**"]);
}

#[test]
fn wildcard_emission_reaches_concrete_listeners() {
    let channel = EventChannel::default();
    let seen = recording(&channel, &["profile.123", "profile.456", "other"]);

    channel.emit("profile.*", &[]);
    assert_eq!(*seen.borrow(), vec!["profile.123", "profile.456"]);
}

#[test]
fn custom_delimiter() {
    let channel = EventChannel::new(ChannelConfig::new().with_delimiter(':'));
    let seen = recording(&channel, &["user:*", "user.*"]);

    channel.emit("user:name", &[]);
    assert_eq!(*seen.borrow(), vec!["user:*"]);
}

#[test]
fn disabled_wildcards_match_literally() {
    let channel = EventChannel::new(ChannelConfig::new().with_wildcard(false));
    let seen = recording(&channel, &["user.*", "user.name"]);

    channel.emit("user.name", &[]);
    channel.emit("user.*", &[]);
    assert_eq!(*seen.borrow(), vec!["user.name", "user.*"]);
}

#[test]
fn pattern_helpers() {
    assert!(pattern::has_wildcard("a.*.c", '.'));
    assert!(!pattern::has_wildcard("a.b*.c", '.'));
    assert!(!pattern::matches("a.b*.c", "a.bx.c", true, '.'));
    assert!(pattern::matches("a.**", "a", true, '.'));
    assert!(!pattern::matches("a.*", "a", true, '.'));
}
