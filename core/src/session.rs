//! Bearer-token storage and session lifecycle events.
//!
//! # Design
//! The token lives behind the `TokenStore` trait so the client never cares
//! whether it is held in memory or persisted to disk. Authorization expiry
//! detected inside the client is reported through `SessionEvents`, a typed
//! listener registry with explicit subscribe/unsubscribe; the client depends
//! only on `Session`, never on whatever reacts to the events.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};

/// Key under which the bearer token is persisted.
pub const TOKEN_KEY: &str = "token";

// ---------------------------------------------------------------------------
// Token storage
// ---------------------------------------------------------------------------

/// Persistent slot for the bearer token.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str) -> ApiResult<()>;
    fn clear(&self) -> ApiResult<()>;
}

/// Token held in process memory only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, token: &str) -> ApiResult<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> ApiResult<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Token persisted in a small JSON object file, the desktop analogue of
/// browser local storage. Other keys in the file are preserved; a file that
/// is not a JSON object is reported as `Storage` and never overwritten.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> ApiResult<Map<String, Value>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| ApiError::storage(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(ApiError::storage(format!("{}: {e}", self.path.display()))),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> ApiResult<()> {
        let raw = serde_json::to_string_pretty(map).map_err(ApiError::Serialization)?;
        fs::write(&self.path, raw).map_err(|e| ApiError::storage(format!("{}: {e}", self.path.display())))
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.read_map() {
            Ok(map) => map.get(TOKEN_KEY).and_then(Value::as_str).map(str::to_string),
            Err(e) => {
                warn!(error = %e, "unreadable token file, treating as signed out");
                None
            }
        }
    }

    fn set(&self, token: &str) -> ApiResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map()?;
        map.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        self.write_map(&map)
    }

    fn clear(&self) -> ApiResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map()?;
        if map.remove(TOKEN_KEY).is_none() {
            return Ok(());
        }
        self.write_map(&map)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Lifecycle events published by a `Session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    /// The backend rejected the token with `status` (401 or 403).
    ForceLogout { status: u16 },
}

/// Handle returned by `SessionEvents::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Listener registry. Clones share the same registry.
#[derive(Clone, Default)]
pub struct SessionEvents {
    next_id: Arc<AtomicU64>,
    listeners: Arc<Mutex<HashMap<SubscriptionId, Listener>>>,
}

impl SessionEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Deliver `event` to every listener, each exactly once. The registry
    /// lock is released before listeners run so they may (un)subscribe.
    pub fn publish(&self, event: SessionEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        debug!(?event, listeners = listeners.len(), "publishing session event");
        for listener in listeners {
            listener(event);
        }
    }
}

impl std::fmt::Debug for SessionEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEvents")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Token store plus event registry. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
    events: SessionEvents,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            events: SessionEvents::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    pub fn token(&self) -> Option<String> {
        self.store.get()
    }

    pub fn is_signed_in(&self) -> bool {
        self.token().is_some()
    }

    pub fn sign_in(&self, token: &str) -> ApiResult<()> {
        self.store.set(token)?;
        self.events.publish(SessionEvent::SignedIn);
        Ok(())
    }

    pub fn sign_out(&self) -> ApiResult<()> {
        self.store.clear()?;
        self.events.publish(SessionEvent::SignedOut);
        Ok(())
    }

    /// Drop the token after the backend rejected it, then notify listeners.
    /// A failing store is logged; listeners are notified regardless.
    pub fn force_logout(&self, status: u16) {
        warn!(status, "authorization rejected, clearing session");
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear stored token");
        }
        self.events.publish(SessionEvent::ForceLogout { status });
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("signed_in", &self.is_signed_in())
            .field("events", &self.events)
            .finish()
    }
}
