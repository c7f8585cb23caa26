use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Active,
    Stopped,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid session transition from {from:?} to {to:?}")]
pub struct SessionTransitionError {
    pub from: SessionState,
    pub to: SessionState,
}

/// Lifecycle of one remote execution context. `Stopped` is terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    id: Option<SessionId>,
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self { id: None, state: SessionState::Uninitialized }
    }
}

impl Session {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self.state, next),
            (SessionState::Uninitialized, SessionState::Active)
                | (SessionState::Active, SessionState::Stopped)
        )
    }

    pub fn activate(&mut self, id: SessionId) -> Result<(), SessionTransitionError> {
        self.ensure_transition(SessionState::Active)?;
        self.id = Some(id);
        self.state = SessionState::Active;
        Ok(())
    }

    /// Marks the session stopped and hands back its id for release.
    pub fn stop(&mut self) -> Result<SessionId, SessionTransitionError> {
        self.ensure_transition(SessionState::Stopped)?;
        self.state = SessionState::Stopped;
        self.id.clone().ok_or(SessionTransitionError {
            from: SessionState::Active,
            to: SessionState::Stopped,
        })
    }

    fn ensure_transition(&self, next: SessionState) -> Result<(), SessionTransitionError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(SessionTransitionError { from: self.state, to: next })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, SessionId, SessionState};

    #[test]
    fn session_walks_uninitialized_active_stopped() {
        let mut session = Session::default();
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.activate(SessionId("ci-1".to_owned())).expect("activate");
        assert!(session.is_active());

        let released = session.stop().expect("stop");
        assert_eq!(released, SessionId("ci-1".to_owned()));
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn stopped_session_is_never_reactivated() {
        let mut session = Session::default();
        session.activate(SessionId("ci-2".to_owned())).expect("activate");
        session.stop().expect("stop");

        let error = session.activate(SessionId("ci-3".to_owned())).expect_err("terminal");
        assert_eq!(error.from, SessionState::Stopped);
        assert_eq!(error.to, SessionState::Active);
    }

    #[test]
    fn stop_before_start_is_rejected() {
        let mut session = Session::default();
        let error = session.stop().expect_err("nothing to stop");

        assert_eq!(error.from, SessionState::Uninitialized);
        assert_eq!(session.state(), SessionState::Uninitialized);
    }
}
