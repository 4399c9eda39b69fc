//! Per-client session state for the support agent.
//!
//! A session remembers the last ticket a client asked about (so follow-up
//! questions may omit the number) and the running conversation used by the
//! general support fallback.

use std::{collections::HashMap, ops::Deref, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::base::{
    config::Config,
    types::{ChatTurn, TicketId},
};

// Traits.

/// Generic session store trait that stores must implement.
///
/// Every method is atomic with respect to the others for a given client id.
pub trait GenericSessionStore: Send + Sync + 'static {
    /// The last ticket resolved for the client, if any.
    fn last_ticket(&self, client_id: &str) -> Option<TicketId>;

    /// Remember the last ticket resolved for the client (last write wins).
    fn set_last_ticket(&self, client_id: &str, ticket_id: TicketId);

    /// The client's conversation so far, oldest turn first.
    fn history(&self, client_id: &str) -> Vec<ChatTurn>;

    /// Append one question and its answer to the client's conversation.
    fn append_exchange(&self, client_id: &str, question: &str, answer: &str);

    /// Forget everything about the client. Returns whether a session existed.
    fn evict(&self, client_id: &str) -> bool;

    /// Number of live sessions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Structs.

/// Session store for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<dyn GenericSessionStore>,
}

impl Deref for SessionStore {
    type Target = dyn GenericSessionStore;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl SessionStore {
    pub fn new(inner: Arc<dyn GenericSessionStore>) -> Self {
        Self { inner }
    }

    /// In-memory store sized from the configuration.
    pub fn memory(config: &Config) -> Self {
        let limits = SessionLimits {
            ttl: config.session_ttl(),
            max_clients: config.session_max_clients,
            max_turns: config.session_max_turns,
        };

        Self::new(Arc::new(MemorySessionStore::new(limits)))
    }
}

/// Eviction limits of the in-memory store.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Idle time after which a session expires.
    pub ttl: Duration,
    /// Sessions kept before the least recently used one is dropped.
    pub max_clients: usize,
    /// Conversation turns (messages) kept per session; whole exchanges are dropped, oldest first.
    pub max_turns: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_clients: 10_000,
            max_turns: 20,
        }
    }
}

#[derive(Debug)]
struct Session {
    last_ticket: Option<TicketId>,
    history: Vec<ChatTurn>,
    touched: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            last_ticket: None,
            history: Vec::new(),
            touched: Instant::now(),
        }
    }
}

/// Sessions plus the time of the last full expiry sweep.
struct Sessions {
    by_client: HashMap<String, Session>,
    last_sweep: Instant,
}

/// In-memory session store guarded by a single mutex.
///
/// Expired sessions are dropped when touched, and the whole map is swept at
/// most once per TTL or when the client limit is reached.
pub struct MemorySessionStore {
    limits: SessionLimits,
    sessions: Mutex<Sessions>,
}

impl MemorySessionStore {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limits,
            sessions: Mutex::new(Sessions {
                by_client: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    fn is_expired(&self, session: &Session, now: Instant) -> bool {
        now.duration_since(session.touched) > self.limits.ttl
    }

    /// Drop every expired session; callers hold the lock.
    fn purge_expired(&self, sessions: &mut Sessions, now: Instant) {
        let before = sessions.by_client.len();

        sessions.by_client.retain(|_, s| !self.is_expired(s, now));
        sessions.last_sweep = now;

        if sessions.by_client.len() < before {
            debug!("Expired {} idle sessions.", before - sessions.len());
        }
    }

    fn sweep_if_due(&self, sessions: &mut Sessions, now: Instant) {
        if now.duration_since(sessions.last_sweep) >= self.limits.ttl {
            self.purge_expired(sessions, now);
        }
    }

    /// Drop the client's session if it has expired; callers hold the lock.
    fn expire_client(&self, sessions: &mut Sessions, client_id: &str, now: Instant) {
        if sessions.by_client.get(client_id).is_some_and(|s| self.is_expired(s, now)) {
            sessions.by_client.remove(client_id);
        }
    }

    /// Get or create the client's session, making room if needed; callers hold the lock.
    fn session_mut<'a>(&self, sessions: &'a mut Sessions, client_id: &str, now: Instant) -> &'a mut Session {
        self.sweep_if_due(sessions, now);
        self.expire_client(sessions, client_id, now);

        if !sessions.by_client.contains_key(client_id) && sessions.by_client.len() >= self.limits.max_clients {
            self.purge_expired(sessions, now);

            if sessions.by_client.len() >= self.limits.max_clients {
                let oldest = sessions.by_client.iter().min_by_key(|(_, s)| s.touched).map(|(id, _)| id.clone());

                if let Some(oldest) = oldest {
                    debug!("Session limit reached, evicting `{oldest}`.");
                    sessions.by_client.remove(&oldest);
                }
            }
        }

        let session = sessions.by_client.entry(client_id.to_string()).or_insert_with(Session::new);
        session.touched = now;
        session
    }

    /// Read a live session without creating one; callers hold the lock.
    fn session<'a>(&self, sessions: &'a mut Sessions, client_id: &str, now: Instant) -> Option<&'a mut Session> {
        self.sweep_if_due(sessions, now);
        self.expire_client(sessions, client_id, now);

        let session = sessions.by_client.get_mut(client_id)?;
        session.touched = now;
        Some(session)
    }
}

impl Sessions {
    fn len(&self) -> usize {
        self.by_client.len()
    }
}

impl GenericSessionStore for MemorySessionStore {
    fn last_ticket(&self, client_id: &str) -> Option<TicketId> {
        let mut sessions = self.sessions.lock();
        self.session(&mut sessions, client_id, Instant::now()).and_then(|s| s.last_ticket)
    }

    fn set_last_ticket(&self, client_id: &str, ticket_id: TicketId) {
        let mut sessions = self.sessions.lock();
        self.session_mut(&mut sessions, client_id, Instant::now()).last_ticket = Some(ticket_id);
    }

    fn history(&self, client_id: &str) -> Vec<ChatTurn> {
        let mut sessions = self.sessions.lock();
        self.session(&mut sessions, client_id, Instant::now()).map(|s| s.history.clone()).unwrap_or_default()
    }

    fn append_exchange(&self, client_id: &str, question: &str, answer: &str) {
        let mut sessions = self.sessions.lock();
        let session = self.session_mut(&mut sessions, client_id, Instant::now());

        session.history.push(ChatTurn::user(question));
        session.history.push(ChatTurn::assistant(answer));

        // Whole exchanges only, so the history always opens with a question.
        let excess = session.history.len().saturating_sub(self.limits.max_turns);
        let excess = excess + excess % 2;
        session.history.drain(..excess.min(session.history.len()));
    }

    fn evict(&self, client_id: &str) -> bool {
        self.sessions.lock().by_client.remove(client_id).is_some()
    }

    fn len(&self) -> usize {
        let mut sessions = self.sessions.lock();
        self.purge_expired(&mut sessions, Instant::now());
        sessions.len()
    }
}

// Tests.
