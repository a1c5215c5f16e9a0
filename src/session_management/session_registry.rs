use crate::error_handling::types::SessionError;
use crate::session_management::active_session::{ActiveSession, SessionCommand};
use crate::session_management::session::Session;
use crate::session_management::SessionState;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Process-wide table of live sessions.
///
/// Shared by every client connection behind an `Arc`. Each operation takes the lock for
/// the duration of a single map access, so concurrent connections never observe a partial
/// update. A session is present from registration until its teardown removes it; entries
/// are never in the `Terminated` state.
///
/// # Fields Overview
///
/// - `sessions`: live sessions keyed by session id
/// - `max_sessions`: upper bound on concurrent sessions, `0` for unlimited
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, ActiveSession>>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, ActiveSession>> {
        // A panic while holding the lock leaves the map itself consistent.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn has_capacity(&self) -> bool {
        self.max_sessions == 0 || self.lock().len() < self.max_sessions
    }

    /// Inserts a freshly created session. Fails when the limit is reached or the id is taken.
    pub fn register(
        &self,
        session: Session,
        commands: UnboundedSender<SessionCommand>,
    ) -> Result<(), SessionError> {
        let mut sessions = self.lock();

        if self.max_sessions != 0 && sessions.len() >= self.max_sessions {
            warn!(
                "Refusing session for {}: limit of {} reached",
                session.container_target, self.max_sessions
            );
            return Err(SessionError::SessionLimitReached);
        }
        if sessions.contains_key(&session.id) || session.state.is_terminal() {
            return Err(SessionError::AlreadyRegistered);
        }

        debug!(
            "Registered session {} for {}",
            session.id, session.container_target
        );
        sessions.insert(session.id, ActiveSession { session, commands });
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> Option<Session> {
        self.lock().get(id).map(|active| active.session.clone())
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.lock().contains_key(id)
    }

    /// Moves a registered session to `state`. Reaching `Terminated` goes through [`remove`].
    ///
    /// [`remove`]: SessionRegistry::remove
    pub fn transition(&self, id: &Uuid, state: SessionState) -> bool {
        if state.is_terminal() {
            return self.remove(id).is_some();
        }
        match self.lock().get_mut(id) {
            Some(active) => active.session.transition(state),
            None => false,
        }
    }

    pub fn touch(&self, id: &Uuid) {
        if let Some(active) = self.lock().get_mut(id) {
            active.session.touch();
        }
    }

    /// Removes the session and returns its final record, marked `Terminated`.
    pub fn remove(&self, id: &Uuid) -> Option<Session> {
        let mut active = self.lock().remove(id)?;
        if active.session.state == SessionState::Connected {
            active.session.transition(SessionState::Closing);
        }
        active.session.transition(SessionState::Terminated);
        debug!("Removed session {}", id);
        Some(active.session)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of every live session, oldest first.
    pub fn sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .lock()
            .values()
            .map(|active| active.session.clone())
            .collect();
        sessions.sort_by_key(|session| session.created_at);
        sessions
    }

    /// Asks every live session to disconnect. Sessions remove themselves as they finish.
    pub fn shutdown_all_sessions(&self) -> usize {
        let sessions = self.lock();
        for active in sessions.values() {
            let _ = active.commands.send(SessionCommand::Disconnect);
        }
        if !sessions.is_empty() {
            info!("Requested shutdown of {} active sessions", sessions.len());
        }
        sessions.len()
    }
}
