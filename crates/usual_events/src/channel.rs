//! Named-event channel with ordered, synchronous delivery.
//!
//! Listeners are invoked in registration order. An emission snapshots the
//! matching listeners and releases the channel before calling any of them, so
//! a listener may freely register, remove, or emit on the same channel. A
//! listener removed during an emission (by itself or by an earlier listener)
//! does not fire afterwards.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, trace, warn};
use usual_foundation::Value;

use crate::config::ChannelConfig;
use crate::pattern;

/// Identifies one listener registration on one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// A shared listener callback.
pub type Listener = Rc<dyn Fn(&Event<'_>)>;

/// An event as seen by a listener.
#[derive(Clone, Copy, Debug)]
pub struct Event<'a> {
    name: &'a str,
    args: &'a [Value],
}

impl<'a> Event<'a> {
    /// Creates an event.
    #[must_use]
    pub fn new(name: &'a str, args: &'a [Value]) -> Self {
        Self { name, args }
    }

    /// The emitted name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// All arguments.
    #[must_use]
    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// The argument at `index`, if present.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&'a Value> {
        self.args.get(index)
    }
}

#[derive(Clone)]
struct Registration {
    id: ListenerId,
    pattern: Arc<str>,
    once: bool,
    callback: Listener,
}

#[derive(Default)]
struct ChannelState {
    listeners: Vec<Registration>,
    next_id: u64,
    closed: bool,
}

impl ChannelState {
    fn position(&self, id: ListenerId) -> Option<usize> {
        self.listeners.iter().position(|r| r.id == id)
    }
}

/// A synchronous event channel.
///
/// Once [closed](EventChannel::close) a channel drops every listener, ignores
/// new registrations, and delivers nothing.
pub struct EventChannel {
    config: ChannelConfig,
    state: RefCell<ChannelState>,
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new(ChannelConfig::default())
    }
}

impl EventChannel {
    /// Creates an open channel.
    #[must_use]
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            state: RefCell::new(ChannelState::default()),
        }
    }

    /// Returns the channel configuration.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Registers a listener for every emission matching `pattern`.
    pub fn on<F>(&self, pattern: &str, callback: F) -> ListenerId
    where
        F: Fn(&Event<'_>) + 'static,
    {
        self.register(pattern, false, Rc::new(callback))
    }

    /// Registers a listener that is removed before its first invocation.
    pub fn once<F>(&self, pattern: &str, callback: F) -> ListenerId
    where
        F: Fn(&Event<'_>) + 'static,
    {
        self.register(pattern, true, Rc::new(callback))
    }

    /// Registers a shared listener.
    pub fn add_listener(&self, pattern: &str, once: bool, callback: Listener) -> ListenerId {
        self.register(pattern, once, callback)
    }

    fn register(&self, pattern: &str, once: bool, callback: Listener) -> ListenerId {
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_id);
        state.next_id += 1;

        if state.closed {
            debug!(pattern, "ignoring listener on closed channel");
            return id;
        }

        state.listeners.push(Registration {
            id,
            pattern: pattern.into(),
            once,
            callback,
        });

        if self.config.max_listeners > 0 {
            let count = state
                .listeners
                .iter()
                .filter(|r| &*r.pattern == pattern)
                .count();
            if count == self.config.max_listeners + 1 {
                warn!(
                    pattern,
                    count,
                    max = self.config.max_listeners,
                    "possible listener leak: more listeners than configured maximum"
                );
            }
        }
        id
    }

    /// Removes one listener. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut state = self.state.borrow_mut();
        match state.position(id) {
            Some(idx) => {
                state.listeners.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Removes every listener registered with exactly `pattern`.
    ///
    /// Returns the number removed.
    pub fn off_event(&self, pattern: &str) -> usize {
        let mut state = self.state.borrow_mut();
        let before = state.listeners.len();
        state.listeners.retain(|r| &*r.pattern != pattern);
        before - state.listeners.len()
    }

    /// Removes every listener.
    pub fn off_all(&self) {
        self.state.borrow_mut().listeners.clear();
    }

    /// Returns true if the listener is still registered.
    #[must_use]
    pub fn contains(&self, id: ListenerId) -> bool {
        self.state.borrow().position(id).is_some()
    }

    /// Delivers an event to every matching listener in registration order.
    ///
    /// Returns true if at least one listener was invoked.
    pub fn emit(&self, name: &str, args: &[Value]) -> bool {
        let matching: Vec<Registration> = {
            let state = self.state.borrow();
            if state.closed {
                return false;
            }
            state
                .listeners
                .iter()
                .filter(|r| self.matches(&r.pattern, name))
                .cloned()
                .collect()
        };

        trace!(event = name, listeners = matching.len(), "emit");

        let event = Event::new(name, args);
        let mut delivered = false;
        for registration in matching {
            {
                let mut state = self.state.borrow_mut();
                if state.closed {
                    break;
                }
                let Some(idx) = state.position(registration.id) else {
                    continue;
                };
                if registration.once {
                    state.listeners.remove(idx);
                }
            }
            (registration.callback)(&event);
            delivered = true;
        }
        delivered
    }

    /// Returns the number of listeners an emission of `name` would reach.
    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.state
            .borrow()
            .listeners
            .iter()
            .filter(|r| self.matches(&r.pattern, name))
            .count()
    }

    /// Returns the total number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Returns true if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().listeners.is_empty()
    }

    /// Drops every listener and stops all further delivery and registration.
    pub fn close(&self) {
        let dropped = {
            let mut state = self.state.borrow_mut();
            state.closed = true;
            std::mem::take(&mut state.listeners)
        };
        // Callbacks may own entities whose drop touches this channel
        drop(dropped);
    }

    /// Returns true once the channel has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    fn matches(&self, pattern: &str, name: &str) -> bool {
        pattern::matches(pattern, name, self.config.wildcard, self.config.delimiter)
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventChannel")
            .field("config", &self.config)
            .field("listeners", &state.listeners.len())
            .field("closed", &state.closed)
            .finish()
    }
}
