//! Tab event bus
//!
//! Registry of listeners keyed by event kind, plus a list of listeners that
//! want every kind. Publishing snapshots the relevant listeners and invokes
//! them without holding the registry lock, so listeners may subscribe or
//! unsubscribe while an event is being delivered.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::event::TabEvent;
use crate::kind::TabEventKind;

type AnyListener = Arc<dyn Fn(TabEventKind, &TabEvent) + Send + Sync>;
type KindListener = Arc<dyn Fn(&TabEvent) + Send + Sync>;

enum Listener {
    Any(AnyListener),
    Kind(TabEventKind, KindListener),
}

struct Registration {
    id: u64,
    active: AtomicBool,
    listener: Listener,
}

impl Registration {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    any: Vec<Arc<Registration>>,
    by_kind: HashMap<TabEventKind, Vec<Arc<Registration>>>,
}

impl Registry {
    fn insert(&mut self, listener: Listener) -> Arc<Registration> {
        self.next_id += 1;
        let registration = Arc::new(Registration {
            id: self.next_id,
            active: AtomicBool::new(true),
            listener,
        });

        match &registration.listener {
            Listener::Any(_) => self.any.push(Arc::clone(&registration)),
            Listener::Kind(kind, _) => self
                .by_kind
                .entry(*kind)
                .or_default()
                .push(Arc::clone(&registration)),
        }

        registration
    }

    fn remove(&mut self, registration: &Registration) {
        let list = match &registration.listener {
            Listener::Any(_) => Some(&mut self.any),
            Listener::Kind(kind, _) => self.by_kind.get_mut(kind),
        };

        if let Some(list) = list {
            list.retain(|r| r.id != registration.id);
        }
    }
}

static TAB_EVENTS: Lazy<TabEventBus> = Lazy::new(TabEventBus::new);

/// The application-wide tab event bus.
///
/// Created on first use and kept for the lifetime of the process.
pub fn tab_events() -> &'static TabEventBus {
    &TAB_EVENTS
}

pub struct TabEventBus {
    registry: Arc<RwLock<Registry>>,
}

impl TabEventBus {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
        }
    }

    /// Listen to every event kind.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(TabEventKind, &TabEvent) + Send + Sync + 'static,
    {
        self.register(Listener::Any(Arc::new(callback)))
    }

    /// Listen to a single event kind.
    pub fn subscribe_kind<F>(&self, kind: TabEventKind, callback: F) -> Subscription
    where
        F: Fn(&TabEvent) + Send + Sync + 'static,
    {
        self.register(Listener::Kind(kind, Arc::new(callback)))
    }

    /// Deliver `event` to every all-kinds listener, then to every listener of
    /// its kind, each group in registration order.
    pub fn publish(&self, event: TabEvent) {
        let kind = event.kind();

        tracing::debug!(kind = %kind, payload = ?event, "Dispatching tab event");

        let listeners: Vec<Arc<Registration>> = {
            let registry = self.registry.read();
            registry
                .any
                .iter()
                .chain(registry.by_kind.get(&kind).into_iter().flatten())
                .cloned()
                .collect()
        };

        for registration in &listeners {
            // Removed earlier in this same publish
            if !registration.is_active() {
                continue;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &registration.listener {
                Listener::Any(callback) => callback(kind, &event),
                Listener::Kind(_, callback) => callback(&event),
            }));

            if let Err(payload) = outcome {
                tracing::error!(
                    kind = %kind,
                    listener_id = registration.id,
                    reason = %panic_message(payload.as_ref()),
                    "Tab event listener panicked"
                );
            }
        }
    }

    /// Number of live listeners across all kinds.
    pub fn listener_count(&self) -> usize {
        let registry = self.registry.read();
        registry.any.len() + registry.by_kind.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.listener_count() == 0
    }

    fn register(&self, listener: Listener) -> Subscription {
        let registration = self.registry.write().insert(listener);

        Subscription {
            registry: Arc::downgrade(&self.registry),
            registration,
        }
    }
}

impl Default for TabEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TabEventBus {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl std::fmt::Debug for TabEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabEventBus")
            .field("listeners", &format!("<{} listeners>", self.listener_count()))
            .finish()
    }
}

/// Handle returned by every subscribe call.
///
/// Dropping it leaves the listener registered; call [`Subscription::unsubscribe`]
/// to remove it.
#[must_use = "the listener stays registered until `unsubscribe` is called"]
pub struct Subscription {
    registry: Weak<RwLock<Registry>>,
    registration: Arc<Registration>,
}

impl Subscription {
    /// Remove the listener. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if !self.registration.active.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(registry) = self.registry.upgrade() {
            registry.write().remove(&self.registration);
        }
    }

    pub fn is_active(&self) -> bool {
        self.registration.is_active()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.registration.id)
            .field("active", &self.is_active())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
