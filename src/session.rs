use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::ColumnSchema;
use crate::dashboard::Dashboard;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// A session's dashboard, locked for the duration of one user action.
pub type SharedDashboard = Arc<tokio::sync::Mutex<Dashboard>>;

struct SessionEntry {
    dashboard: SharedDashboard,
    last_seen: Instant,
}

/// Active user sessions, keyed by session id.
///
/// Each session gets its own [`Dashboard`]; nothing is shared between them.
/// Sessions idle for longer than the time-to-live are dropped on the next
/// access to the store.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    schema: ColumnSchema,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(schema: ColumnSchema, ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            schema,
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn prune(&self, sessions: &mut HashMap<String, SessionEntry>, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) <= self.ttl);
        let dropped = before - sessions.len();
        if dropped > 0 {
            log::info!("Dropped {} idle session(s)", dropped);
        }
    }

    /// Start a new session with an uninitialized dashboard.
    pub fn create(&self) -> (String, SharedDashboard) {
        let session_id = Uuid::new_v4().to_string();
        let dashboard = Arc::new(tokio::sync::Mutex::new(Dashboard::new(self.schema.clone())));

        let now = Instant::now();
        let mut sessions = self.lock();
        self.prune(&mut sessions, now);
        sessions.insert(
            session_id.clone(),
            SessionEntry {
                dashboard: dashboard.clone(),
                last_seen: now,
            },
        );
        log::info!("Started session ({} active)", sessions.len());

        (session_id, dashboard)
    }

    /// Look up a live session and mark it as seen.
    pub fn get(&self, session_id: &str) -> Option<SharedDashboard> {
        let now = Instant::now();
        let mut sessions = self.lock();
        self.prune(&mut sessions, now);
        sessions.get_mut(session_id).map(|entry| {
            entry.last_seen = now;
            entry.dashboard.clone()
        })
    }

    /// The session for `session_id` if it is live, otherwise a new one.
    /// Returns the id to hand back to the client and whether it is new.
    pub fn get_or_create(&self, session_id: Option<&str>) -> (String, SharedDashboard, bool) {
        if let Some(id) = session_id {
            if let Some(dashboard) = self.get(id) {
                return (id.to_string(), dashboard, false);
            }
        }
        let (id, dashboard) = self.create();
        (id, dashboard, true)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::DashboardState;
    use crate::table::Table;

    #[test]
    fn sessions_are_independent() {
        let store = SessionStore::new(ColumnSchema::default(), Duration::from_secs(60));
        let (first_id, first) = store.create();
        let (second_id, second) = store.create();
        assert_ne!(first_id, second_id);

        first.blocking_lock().replace(Table::empty(), "Student Data");
        assert_eq!(first.blocking_lock().state(), DashboardState::Loaded);
        assert_eq!(second.blocking_lock().state(), DashboardState::Uninitialized);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn get_or_create_reuses_live_session() {
        let store = SessionStore::new(ColumnSchema::default(), Duration::from_secs(60));
        let (id, _, created) = store.get_or_create(None);
        assert!(created);

        let (again, _, created) = store.get_or_create(Some(&id));
        assert_eq!(again, id);
        assert!(!created);

        let (other, _, created) = store.get_or_create(Some("not-a-session"));
        assert_ne!(other, "not-a-session");
        assert!(created);
    }

    #[test]
    fn idle_sessions_expire() {
        let store = SessionStore::new(ColumnSchema::default(), Duration::ZERO);
        let (id, _) = store.create();
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }
}
