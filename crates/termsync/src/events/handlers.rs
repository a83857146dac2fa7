//! Handler registries and unsubscribe handles.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use dashmap::DashMap;
use tracing::{debug, error, warn};

use super::types::{ConnectionChangeEvent, RuntimeStatusEvent, ScopedEvent};

/// Callback invoked for each delivered event.
///
/// Returning an error (or panicking) is logged and never prevents other
/// handlers from seeing the same event.
pub type Handler<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

struct Entry<E> {
    id: u64,
    handler: Handler<E>,
}

impl<E> Clone for Entry<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: Arc::clone(&self.handler),
        }
    }
}

type Snapshot<E> = Arc<Vec<Entry<E>>>;

/// Global and key-scoped handlers for one event type.
///
/// Both lists are copy-on-write: dispatch works on a snapshot taken when the
/// event arrives, so handlers may register or dispose handlers while running.
pub struct HandlerRegistry<E> {
    name: &'static str,
    next_id: AtomicU64,
    global: Mutex<Snapshot<E>>,
    scoped: DashMap<String, Snapshot<E>>,
}

impl<E: ScopedEvent + 'static> HandlerRegistry<E> {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            next_id: AtomicU64::new(1),
            global: Mutex::new(Arc::new(Vec::new())),
            scoped: DashMap::new(),
        })
    }

    /// Registers a handler for every event.
    pub fn subscribe<F>(self: &Arc<Self>, handler: F) -> UnsubscribeHandle
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            id,
            handler: Arc::new(handler),
        };

        let mut global = self.global.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = global.to_vec();
        next.push(entry);
        *global = Arc::new(next);
        drop(global);

        let registry = Arc::downgrade(self);
        UnsubscribeHandle::new(move || {
            if let Some(registry) = Weak::upgrade(&registry) {
                registry.remove_global(id);
            }
        })
    }

    /// Registers a handler for events whose scope key equals `key`.
    pub fn subscribe_scoped<F>(self: &Arc<Self>, key: &str, handler: F) -> UnsubscribeHandle
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            id,
            handler: Arc::new(handler),
        };

        {
            let mut slot = self
                .scoped
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Vec::new()));
            let mut next = slot.value().to_vec();
            next.push(entry);
            *slot.value_mut() = Arc::new(next);
        }

        let registry = Arc::downgrade(self);
        let key = key.to_string();
        UnsubscribeHandle::new(move || {
            if let Some(registry) = Weak::upgrade(&registry) {
                registry.remove_scoped(&key, id);
            }
        })
    }

    /// Delivers `event` to the global handlers, then to the handlers scoped
    /// to its key, each list in registration order. Returns the number of
    /// handlers invoked.
    pub fn dispatch(&self, event: &E) -> usize {
        let key = event.scope_key();
        let global = Arc::clone(&*self.global.lock().unwrap_or_else(PoisonError::into_inner));
        let scoped = self.scoped.get(key).map(|entry| Arc::clone(entry.value()));

        let mut invoked = 0;
        for entry in global.iter().chain(scoped.iter().flat_map(|list| list.iter())) {
            invoked += 1;
            self.invoke(key, entry, event);
        }
        invoked
    }

    /// Drops every handler scoped to `key`. Returns how many were removed.
    pub fn remove_scope(&self, key: &str) -> usize {
        self.scoped
            .remove(key)
            .map(|(_, list)| list.len())
            .unwrap_or(0)
    }

    /// Drops every handler.
    pub fn clear(&self) {
        *self.global.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(Vec::new());
        self.scoped.clear();
    }

    pub fn global_count(&self) -> usize {
        self.global.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn scoped_count(&self, key: &str) -> usize {
        self.scoped.get(key).map(|list| list.len()).unwrap_or(0)
    }

    fn invoke(&self, key: &str, entry: &Entry<E>, event: &E) {
        match catch_unwind(AssertUnwindSafe(|| (entry.handler)(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(
                    registry = self.name,
                    key = %key,
                    handler_id = entry.id,
                    error = %e,
                    "Event handler failed"
                );
            }
            Err(_) => {
                error!(
                    registry = self.name,
                    key = %key,
                    handler_id = entry.id,
                    "Event handler panicked"
                );
            }
        }
    }

    fn remove_global(&self, id: u64) {
        let mut global = self.global.lock().unwrap_or_else(PoisonError::into_inner);
        if global.iter().any(|entry| entry.id == id) {
            let next: Vec<_> = global.iter().filter(|entry| entry.id != id).cloned().collect();
            *global = Arc::new(next);
        }
    }

    fn remove_scoped(&self, key: &str, id: u64) {
        if let Some(mut slot) = self.scoped.get_mut(key) {
            let next: Vec<_> = slot.iter().filter(|entry| entry.id != id).cloned().collect();
            *slot.value_mut() = Arc::new(next);
        }
        self.scoped.remove_if(key, |_, list| list.is_empty());
    }
}

impl<E> fmt::Debug for HandlerRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("name", &self.name)
            .field("scopes", &self.scoped.len())
            .finish()
    }
}

struct HandleInner {
    disposed: AtomicBool,
    detach: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

/// Removes exactly one registered handler when disposed.
///
/// Clones share the same registration; disposing any of them more than once
/// is a no-op. Dropping a handle does not unsubscribe.
#[derive(Clone)]
pub struct UnsubscribeHandle {
    inner: Arc<HandleInner>,
}

impl UnsubscribeHandle {
    fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                disposed: AtomicBool::new(false),
                detach: Mutex::new(Some(Box::new(detach))),
            }),
        }
    }

    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let detach = self
            .inner
            .detach
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(detach) = detach {
            detach();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for UnsubscribeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsubscribeHandle")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// The dispatcher's handler registries, shared with the lifecycle manager.
#[derive(Debug)]
pub struct DispatcherHandlers {
    runtime: Arc<HandlerRegistry<RuntimeStatusEvent>>,
    connection: Arc<HandlerRegistry<ConnectionChangeEvent>>,
}

impl DispatcherHandlers {
    pub fn new() -> Self {
        Self {
            runtime: HandlerRegistry::new("runtime_status"),
            connection: HandlerRegistry::new("connection_change"),
        }
    }

    pub fn on_runtime_status<F>(&self, handler: F) -> UnsubscribeHandle
    where
        F: Fn(&RuntimeStatusEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.runtime.subscribe(handler)
    }

    pub fn on_session_runtime_status<F>(&self, session_key: &str, handler: F) -> UnsubscribeHandle
    where
        F: Fn(&RuntimeStatusEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.runtime.subscribe_scoped(session_key, handler)
    }

    pub fn on_connection_change<F>(&self, handler: F) -> UnsubscribeHandle
    where
        F: Fn(&ConnectionChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.connection.subscribe(handler)
    }

    pub fn on_connection_status<F>(&self, connection_name: &str, handler: F) -> UnsubscribeHandle
    where
        F: Fn(&ConnectionChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.connection.subscribe_scoped(connection_name, handler)
    }

    pub fn dispatch_runtime_status(&self, event: &RuntimeStatusEvent) -> usize {
        self.runtime.dispatch(event)
    }

    pub fn dispatch_connection_change(&self, event: &ConnectionChangeEvent) -> usize {
        self.connection.dispatch(event)
    }

    /// Drops the runtime-status handlers scoped to a session.
    pub fn remove_session_handlers(&self, session_key: &str) -> usize {
        let removed = self.runtime.remove_scope(session_key);
        if removed > 0 {
            debug!(session_key = %session_key, removed, "Removed session handlers");
        }
        removed
    }

    pub fn clear(&self) {
        self.runtime.clear();
        self.connection.clear();
    }

    pub fn runtime(&self) -> &Arc<HandlerRegistry<RuntimeStatusEvent>> {
        &self.runtime
    }

    pub fn connection(&self) -> &Arc<HandlerRegistry<ConnectionChangeEvent>> {
        &self.connection
    }
}

impl Default for DispatcherHandlers {
    fn default() -> Self {
        Self::new()
    }
}

/// Groups handles so they can be disposed together.
#[derive(Debug, Default)]
pub struct HandleSet {
    handles: Mutex<Vec<UnsubscribeHandle>>,
}

impl HandleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, handle: UnsubscribeHandle) {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Disposes and forgets every handle. Returns how many were held.
    pub fn dispose_all(&self) -> usize {
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in &handles {
            handle.dispose();
        }
        handles.len()
    }

    pub fn len(&self) -> usize {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
