// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Named-event subscriptions scoped by node id.
//!
//! A [`Channel`] maps a target node id and an event name to an ordered list
//! of subscriptions. Dispatching an event runs, in order:
//!
//! 1. every global middleware; any one returning `false` vetoes the whole
//!    dispatch,
//! 2. every subscription by descending priority (ties in registration
//!    order), each first passing its own gates; a failing gate skips only
//!    that subscription.
//!
//! Under [`PropagationPolicy::RunAll`] every admitted subscriber runs.
//! Under [`PropagationPolicy::StopOnConsume`] a callback returning
//! [`EventPropagation::Stop`] ends delivery.
//!
//! The channel is generic over the mutable context handed to callbacks
//! (`Cx`) and the payload type (`D`); the scene uses
//! [`NodeTree`](crate::NodeTree) and [`EventData`](crate::input::EventData).

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// What a callback asks of the remaining subscribers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EventPropagation {
    /// The event is consumed.
    Stop,
    /// Later subscribers may see the event.
    #[default]
    Continue,
}

impl EventPropagation {
    /// Returns whether this is [`Continue`](Self::Continue).
    #[must_use]
    pub fn is_continue(self) -> bool {
        matches!(self, Self::Continue)
    }

    /// Returns whether this is [`Stop`](Self::Stop).
    #[must_use]
    pub fn is_stop(self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Whether a consuming callback halts delivery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PropagationPolicy {
    /// Every admitted subscriber runs, whatever callbacks return.
    #[default]
    RunAll,
    /// Delivery stops after a callback returns [`EventPropagation::Stop`].
    StopOnConsume,
}

/// An event as seen by middlewares and callbacks.
#[derive(Debug)]
pub struct Event<'a, D> {
    /// Id of the node the event was emitted on.
    pub target: &'a str,
    /// Event name.
    pub name: &'a str,
    /// Payload.
    pub data: &'a D,
    /// Id of the subscribing node, when the subscription named one.
    pub listener: Option<&'a str>,
}

/// Event callback.
pub type Callback<Cx, D> = Box<dyn FnMut(&mut Cx, &Event<'_, D>) -> EventPropagation>;

/// Middleware predicate. Returning `false` vetoes (global) or skips (local).
pub type Middleware<Cx, D> = Box<dyn FnMut(&Cx, &Event<'_, D>) -> bool>;

/// Handle identifying one subscription, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// A subscription under construction.
///
/// ```rust,ignore
/// let sub = Listener::new(|tree, event| { /* ... */ })
///     .priority(10)
///     .listener("panel")
///     .gate(|_, event| event.data.is_pointer());
/// ```
pub struct Listener<Cx, D> {
    callback: Callback<Cx, D>,
    priority: i32,
    gates: Vec<Middleware<Cx, D>>,
    listener: Option<String>,
}

impl<Cx, D> Listener<Cx, D> {
    /// Wraps a callback that never consumes the event.
    pub fn new(mut f: impl FnMut(&mut Cx, &Event<'_, D>) + 'static) -> Self {
        Self::with_propagation(move |cx, event| {
            f(cx, event);
            EventPropagation::Continue
        })
    }

    /// Wraps a callback that decides whether the event is consumed.
    pub fn with_propagation(
        f: impl FnMut(&mut Cx, &Event<'_, D>) -> EventPropagation + 'static,
    ) -> Self {
        Self {
            callback: Box::new(f),
            priority: 0,
            gates: Vec::new(),
            listener: None,
        }
    }

    /// Sets the priority. Higher runs first; the default is 0.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a local middleware. A `false` skips this subscription only.
    #[must_use]
    pub fn gate(mut self, gate: impl FnMut(&Cx, &Event<'_, D>) -> bool + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    /// Records the id of the subscribing node.
    #[must_use]
    pub fn listener(mut self, node: impl Into<String>) -> Self {
        self.listener = Some(node.into());
        self
    }
}

impl<Cx, D> fmt::Debug for Listener<Cx, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("priority", &self.priority)
            .field("gates", &self.gates.len())
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

struct Subscription<Cx, D> {
    id: SubscriptionId,
    inner: Listener<Cx, D>,
}

/// Outcome of a [`Channel::dispatch`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// A global middleware rejected the event.
    pub vetoed: bool,
    /// Callbacks that ran.
    pub invoked: usize,
    /// Subscriptions skipped by their own gates.
    pub skipped: usize,
    /// Delivery ended early on a consuming callback.
    pub stopped: bool,
}

/// Per-node event subscriptions with priorities and middlewares.
pub struct Channel<Cx, D> {
    topics: BTreeMap<String, BTreeMap<String, Vec<Subscription<Cx, D>>>>,
    middlewares: Vec<Middleware<Cx, D>>,
    policy: PropagationPolicy,
    next_id: u64,
}

impl<Cx, D> Default for Channel<Cx, D> {
    fn default() -> Self {
        Self::new(PropagationPolicy::default())
    }
}

impl<Cx, D> fmt::Debug for Channel<Cx, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("targets", &self.topics.len())
            .field("middlewares", &self.middlewares.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<Cx, D> Channel<Cx, D> {
    /// Creates an empty channel.
    #[must_use]
    pub fn new(policy: PropagationPolicy) -> Self {
        Self {
            topics: BTreeMap::new(),
            middlewares: Vec::new(),
            policy,
            next_id: 0,
        }
    }

    /// Returns the propagation policy.
    #[must_use]
    pub fn policy(&self) -> PropagationPolicy {
        self.policy
    }

    /// Changes the propagation policy.
    pub fn set_policy(&mut self, policy: PropagationPolicy) {
        self.policy = policy;
    }

    /// Adds a global middleware, evaluated on every dispatch in the order
    /// middlewares were added.
    pub fn use_middleware(&mut self, middleware: impl FnMut(&Cx, &Event<'_, D>) -> bool + 'static) {
        self.middlewares.push(Box::new(middleware));
    }

    /// Subscribes to `event` on `target`.
    ///
    /// The subscription is placed after every existing one of greater or
    /// equal priority.
    pub fn subscribe(&mut self, target: &str, event: &str, listener: Listener<Cx, D>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let list = self
            .topics
            .entry(String::from(target))
            .or_default()
            .entry(String::from(event))
            .or_default();
        let at = list.partition_point(|s| s.inner.priority >= listener.priority);
        list.insert(at, Subscription {
            id,
            inner: listener,
        });
        id
    }

    /// Removes a subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, target: &str, event: &str, subscription: SubscriptionId) -> bool {
        let Some(events) = self.topics.get_mut(target) else {
            return false;
        };
        let Some(list) = events.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != subscription);
        let removed = list.len() != before;
        if list.is_empty() {
            events.remove(event);
            if events.is_empty() {
                self.topics.remove(target);
            }
        }
        removed
    }

    /// Returns the number of subscriptions to `event` on `target`.
    #[must_use]
    pub fn subscriber_count(&self, target: &str, event: &str) -> usize {
        self.topics
            .get(target)
            .and_then(|events| events.get(event))
            .map_or(0, Vec::len)
    }

    /// Delivers `event` with `data` to the subscribers of `target`.
    ///
    /// Global middlewares see every dispatch, including those nobody is
    /// subscribed to.
    pub fn dispatch(&mut self, target: &str, event: &str, data: &D, cx: &mut Cx) -> Dispatch {
        let mut outcome = Dispatch::default();
        let global = Event {
            target,
            name: event,
            data,
            listener: None,
        };
        if !self.middlewares.iter_mut().all(|m| m(&*cx, &global)) {
            tracing::debug!(node = target, event, "dispatch vetoed by middleware");
            outcome.vetoed = true;
            return outcome;
        }

        let Some(list) = self
            .topics
            .get_mut(target)
            .and_then(|events| events.get_mut(event))
        else {
            tracing::trace!(node = target, event, "no subscribers");
            return outcome;
        };

        for sub in list.iter_mut() {
            let ev = Event {
                listener: sub.inner.listener.as_deref(),
                ..global
            };
            if !sub.inner.gates.iter_mut().all(|g| g(&*cx, &ev)) {
                outcome.skipped += 1;
                continue;
            }
            let propagation = (sub.inner.callback)(cx, &ev);
            outcome.invoked += 1;
            if propagation.is_stop() && self.policy == PropagationPolicy::StopOnConsume {
                outcome.stopped = true;
                break;
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;

    use super::*;

    type Log = Vec<&'static str>;

    fn push(tag: &'static str) -> impl FnMut(&mut Log, &Event<'_, ()>) {
        move |log, _| log.push(tag)
    }

    #[test]
    fn higher_priority_runs_first() {
        let mut channel = Channel::<Log, ()>::default();
        channel.subscribe("btn1", "click", Listener::new(push("cb1")).priority(10));
        channel.subscribe("btn1", "click", Listener::new(push("cb2")).priority(20));

        let mut log = Log::new();
        let outcome = channel.dispatch("btn1", "click", &(), &mut log);
        assert_eq!(log, vec!["cb2", "cb1"]);
        assert_eq!(outcome.invoked, 2);
    }

    #[test]
    fn equal_priorities_keep_registration_order() {
        let mut channel = Channel::<Log, ()>::default();
        channel.subscribe("n", "e", Listener::new(push("a")).priority(5));
        channel.subscribe("n", "e", Listener::new(push("b")));
        channel.subscribe("n", "e", Listener::new(push("c")).priority(5));
        channel.subscribe("n", "e", Listener::new(push("d")));

        let mut log = Log::new();
        channel.dispatch("n", "e", &(), &mut log);
        assert_eq!(log, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn events_are_scoped_by_target_and_name() {
        let mut channel = Channel::<Log, ()>::default();
        channel.subscribe("a", "click", Listener::new(push("a-click")));
        channel.subscribe("b", "click", Listener::new(push("b-click")));
        channel.subscribe("a", "hover", Listener::new(push("a-hover")));

        let mut log = Log::new();
        channel.dispatch("a", "click", &(), &mut log);
        assert_eq!(log, vec!["a-click"]);
        assert_eq!(
            channel.dispatch("c", "click", &(), &mut log),
            Dispatch::default()
        );
    }

    #[test]
    fn global_veto_blocks_everyone() {
        let mut channel = Channel::<Log, ()>::default();
        channel.subscribe("n", "e", Listener::new(push("a")));
        channel.subscribe("n", "e", Listener::new(push("b")));
        channel.use_middleware(|_, _| true);
        channel.use_middleware(|_, event| event.name != "e");

        let mut log = Log::new();
        let outcome = channel.dispatch("n", "e", &(), &mut log);
        assert!(outcome.vetoed);
        assert!(log.is_empty());
    }

    #[test]
    fn middlewares_run_in_order_until_the_first_veto() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut channel = Channel::<Log, ()>::default();
        channel.subscribe("n", "e", Listener::new(push("cb")));
        for (tag, admit) in [("m1", true), ("m2", false), ("m3", true)] {
            let sink = Rc::clone(&seen);
            channel.use_middleware(move |_, _| {
                sink.borrow_mut().push(tag);
                admit
            });
        }

        let mut log = Log::new();
        let outcome = channel.dispatch("n", "e", &(), &mut log);
        assert!(outcome.vetoed);
        assert_eq!(*seen.borrow(), vec!["m1", "m2"]);
        assert!(log.is_empty());
    }

    #[test]
    fn middlewares_see_dispatches_without_subscribers() {
        let count = Rc::new(RefCell::new(0));
        let mut channel = Channel::<Log, ()>::default();
        let sink = Rc::clone(&count);
        channel.use_middleware(move |_, _| {
            *sink.borrow_mut() += 1;
            true
        });

        let mut log = Log::new();
        let outcome = channel.dispatch("nobody", "click", &(), &mut log);
        assert_eq!(outcome, Dispatch::default());
        assert_eq!(*count.borrow(), 1);

        channel.subscribe("n", "e", Listener::new(push("cb")));
        channel.dispatch("n", "other", &(), &mut log);
        assert_eq!(*count.borrow(), 2);
        assert!(log.is_empty());
    }

    #[test]
    fn local_gate_skips_only_its_subscription() {
        let mut channel = Channel::<Log, ()>::default();
        channel.subscribe("n", "e", Listener::new(push("a")).gate(|_, _| false));
        channel.subscribe("n", "e", Listener::new(push("b")));

        let mut log = Log::new();
        let outcome = channel.dispatch("n", "e", &(), &mut log);
        assert_eq!(log, vec!["b"]);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.invoked, 1);
    }

    #[test]
    fn consumption_is_ignored_by_default() {
        let mut channel = Channel::<Log, ()>::default();
        channel.subscribe(
            "n",
            "e",
            Listener::with_propagation(|log: &mut Log, _| {
                log.push("first");
                EventPropagation::Stop
            })
            .priority(1),
        );
        channel.subscribe("n", "e", Listener::new(push("second")));

        let mut log = Log::new();
        let outcome = channel.dispatch("n", "e", &(), &mut log);
        assert_eq!(log, vec!["first", "second"]);
        assert!(!outcome.stopped);

        channel.set_policy(PropagationPolicy::StopOnConsume);
        log.clear();
        let outcome = channel.dispatch("n", "e", &(), &mut log);
        assert_eq!(log, vec!["first"]);
        assert!(outcome.stopped);
    }

    #[test]
    fn unsubscribe_removes_one_subscription() {
        let mut channel = Channel::<Log, ()>::default();
        let a = channel.subscribe("n", "e", Listener::new(push("a")));
        channel.subscribe("n", "e", Listener::new(push("b")));

        assert!(channel.unsubscribe("n", "e", a));
        assert!(!channel.unsubscribe("n", "e", a));
        assert!(!channel.unsubscribe("x", "e", a));
        assert_eq!(channel.subscriber_count("n", "e"), 1);

        let mut log = Log::new();
        channel.dispatch("n", "e", &(), &mut log);
        assert_eq!(log, vec!["b"]);
    }

    #[test]
    fn callbacks_see_payload_and_listener() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut channel = Channel::<(), u32>::default();
        let sink = Rc::clone(&seen);
        channel.subscribe(
            "n",
            "e",
            Listener::new(move |_: &mut (), event: &Event<'_, u32>| {
                sink.borrow_mut()
                    .push((*event.data, event.listener.map(String::from)));
            })
            .listener("watcher"),
        );

        channel.dispatch("n", "e", &7, &mut ());
        assert_eq!(*seen.borrow(), vec![(7, Some(String::from("watcher")))]);
    }
}
