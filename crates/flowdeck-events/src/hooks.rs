//! Managed-lifetime subscriptions
//!
//! [`TabEventHooks`] ties a set of optional callbacks to a component's mount
//! and unmount. Everything subscribed in `mount` is removed again on
//! `unmount`, on `dispose`, or when the hooks are dropped.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::bus::{Subscription, TabEventBus};
use crate::event::TabEvent;
use crate::kind::TabEventKind;

type AnyCallback = Arc<dyn Fn(TabEventKind, &TabEvent) + Send + Sync>;
type KindCallback = Arc<dyn Fn(&TabEvent) + Send + Sync>;

/// Optional callbacks, one for any event and one per kind.
#[derive(Default, Clone)]
pub struct TabEventHandlers {
    on_any: Option<AnyCallback>,
    on_add: Option<KindCallback>,
    on_remove: Option<KindCallback>,
    on_select: Option<KindCallback>,
    on_reorder: Option<KindCallback>,
}

impl TabEventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_any<F>(mut self, callback: F) -> Self
    where
        F: Fn(TabEventKind, &TabEvent) + Send + Sync + 'static,
    {
        self.on_any = Some(Arc::new(callback));
        self
    }

    pub fn on_add<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TabEvent) + Send + Sync + 'static,
    {
        self.on_add = Some(Arc::new(callback));
        self
    }

    pub fn on_remove<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TabEvent) + Send + Sync + 'static,
    {
        self.on_remove = Some(Arc::new(callback));
        self
    }

    pub fn on_select<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TabEvent) + Send + Sync + 'static,
    {
        self.on_select = Some(Arc::new(callback));
        self
    }

    pub fn on_reorder<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TabEvent) + Send + Sync + 'static,
    {
        self.on_reorder = Some(Arc::new(callback));
        self
    }

    fn for_kind(&self, kind: TabEventKind) -> Option<&KindCallback> {
        match kind {
            TabEventKind::Add => self.on_add.as_ref(),
            TabEventKind::Remove => self.on_remove.as_ref(),
            TabEventKind::Select => self.on_select.as_ref(),
            TabEventKind::Reorder => self.on_reorder.as_ref(),
        }
    }
}

impl std::fmt::Debug for TabEventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabEventHandlers")
            .field("on_any", &self.on_any.is_some())
            .field("on_add", &self.on_add.is_some())
            .field("on_remove", &self.on_remove.is_some())
            .field("on_select", &self.on_select.is_some())
            .field("on_reorder", &self.on_reorder.is_some())
            .finish()
    }
}

pub struct TabEventHooks {
    bus: TabEventBus,
    handlers: TabEventHandlers,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl TabEventHooks {
    pub fn new(bus: TabEventBus, handlers: TabEventHandlers) -> Self {
        Self {
            bus,
            handlers,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe every provided callback. A second mount while still mounted
    /// does nothing.
    pub fn mount(&self) {
        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.is_empty() {
            return;
        }

        if let Some(callback) = &self.handlers.on_any {
            let callback = Arc::clone(callback);
            subscriptions.push(self.bus.subscribe(move |kind, event| callback(kind, event)));
        }

        for kind in TabEventKind::ALL {
            if let Some(callback) = self.handlers.for_kind(kind) {
                let callback = Arc::clone(callback);
                subscriptions.push(self.bus.subscribe_kind(kind, move |event| callback(event)));
            }
        }

        tracing::trace!(subscriptions = subscriptions.len(), "Mounted tab event hooks");
    }

    pub fn unmount(&self) {
        self.dispose();
    }

    /// Remove everything subscribed by `mount`. Safe to call repeatedly.
    pub fn dispose(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in &subscriptions {
            subscription.unsubscribe();
        }
    }

    pub fn is_mounted(&self) -> bool {
        !self.subscriptions.lock().is_empty()
    }
}

impl Drop for TabEventHooks {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for TabEventHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabEventHooks")
            .field("handlers", &self.handlers)
            .field("subscriptions", &self.subscriptions.lock().len())
            .finish()
    }
}

/// Mounted hooks that log every tab event.
pub fn tab_event_debugger(bus: &TabEventBus) -> TabEventHooks {
    let hooks = TabEventHooks::new(
        bus.clone(),
        TabEventHandlers::new().on_any(|kind, event| {
            tracing::info!(
                target: "flowdeck::tab_events",
                kind = %kind,
                payload = %event.to_json().unwrap_or_else(|_| format!("{:?}", event)),
                "Received tab event"
            );
        }),
    );
    hooks.mount();
    hooks
}
