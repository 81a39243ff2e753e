//! Session bookkeeping: ids, preferences, and the map that holds sessions.
//!
//! Every session lives behind its own `tokio::sync::Mutex`. The map itself is
//! only touched to look a session up, insert or remove it; all per-session
//! mutation happens under the session's own lock so two requests on different
//! sessions never wait on each other.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Error;
use crate::store::UploadedFile;

/// Opaque session identifier.
///
/// Always a UUID; parsing anything else fails, which keeps ids safe to use as
/// directory names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mint a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Error::NotFound(format!("session {s}")))
    }
}

/// Per-session UI preferences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub dark_mode: bool,
}

/// Session data for an upload-and-merge session
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    /// Uploaded files in upload order
    pub files: Vec<UploadedFile>,
    pub preferences: Preferences,
    pub last_active: Instant,
    /// Set once a merge or reset has taken the session; no further writes
    pub closed: bool,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            files: Vec::new(),
            preferences: Preferences::default(),
            last_active: Instant::now(),
            closed: false,
        }
    }

    /// Id the next added file receives: max existing + 1, or 0.
    pub fn next_file_id(&self) -> u32 {
        self.files.iter().map(|f| f.id).max().map_or(0, |max| max + 1)
    }

    pub fn file(&self, id: u32) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

/// Storage for the session map.
///
/// The in-memory backend is enough for a single process; a distributed
/// deployment can supply its own.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn get(&self, id: &SessionId) -> Option<SharedSession>;

    async fn insert(&self, id: SessionId, session: SharedSession);

    async fn remove(&self, id: &SessionId) -> Option<SharedSession>;

    /// Ids of every stored session
    async fn ids(&self) -> Vec<SessionId>;
}

/// Process-local session map
#[derive(Default)]
pub struct MemoryBackend {
    sessions: RwLock<HashMap<SessionId, SharedSession>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn get(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn insert(&self, id: SessionId, session: SharedSession) {
        self.sessions.write().await.insert(id, session);
    }

    async fn remove(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.write().await.remove(id)
    }

    async fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().copied().collect()
    }
}

/// Maps session ids to sessions and owns their lifecycle.
pub struct SessionManager {
    backend: Arc<dyn SessionBackend>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Reuse the provided session when it exists, otherwise start a new one.
    pub async fn get_or_create(&self, provided: Option<&str>) -> SessionId {
        if let Some(raw) = provided
            && let Ok(id) = raw.parse::<SessionId>()
            && self.backend.get(&id).await.is_some()
        {
            debug!("Reusing session {}", id);
            return id;
        }

        let id = SessionId::new();
        self.backend
            .insert(id, Arc::new(Mutex::new(Session::new(id))))
            .await;
        info!("Created session {}", id);
        id
    }

    pub async fn get(&self, id: &SessionId) -> Option<SharedSession> {
        self.backend.get(id).await
    }

    /// Remove a session from the map and mark it closed.
    ///
    /// Waits for any request currently holding the session's lock, so the
    /// caller sees a file list no other request will extend.
    pub async fn take(&self, id: &SessionId) -> Option<SharedSession> {
        let session = self.backend.remove(id).await?;
        session.lock().await.closed = true;
        Some(session)
    }

    /// Preferences of a session, defaults when it does not exist.
    pub async fn get_preferences(&self, id: &SessionId) -> Preferences {
        match self.backend.get(id).await {
            Some(session) => {
                let session = session.lock().await;
                session.preferences
            }
            None => Preferences::default(),
        }
    }

    /// Store preferences on the provided session (created if needed).
    ///
    /// Returns the id actually used.
    pub async fn set_preferences(&self, provided: Option<&str>, preferences: Preferences) -> SessionId {
        loop {
            let id = self.get_or_create(provided).await;
            if let Some(session) = self.backend.get(&id).await {
                let mut session = session.lock().await;
                if !session.closed {
                    session.preferences = preferences;
                    session.touch();
                    return id;
                }
            }
            // Taken by a concurrent merge or reset between lookup and lock.
        }
    }

    /// Sessions idle for longer than `ttl`
    pub async fn expired(&self, ttl: Duration) -> Vec<SessionId> {
        let mut expired = Vec::new();
        for id in self.backend.ids().await {
            let Some(session) = self.backend.get(&id).await else {
                continue;
            };
            let idle = session.lock().await.last_active.elapsed();
            if idle > ttl {
                expired.push(id);
            }
        }
        expired
    }

    pub async fn len(&self) -> usize {
        self.backend.ids().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
