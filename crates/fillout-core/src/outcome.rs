use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The final outcome of one interview session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InterviewOutcome {
    /// The interview reached its completed page
    Completed {
        session: usize,
        submissions: usize,
        duration_secs: f64,
    },
    /// The run was interrupted before the interview finished
    Interrupted {
        session: usize,
        submissions: usize,
        duration_secs: f64,
    },
    /// Unrecoverable error
    Failed {
        session: usize,
        submissions: usize,
        error: String,
        duration_secs: f64,
    },
}

impl InterviewOutcome {
    pub fn completed(session: usize, submissions: usize, duration: Duration) -> Self {
        Self::Completed {
            session,
            submissions,
            duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn interrupted(session: usize, submissions: usize, duration: Duration) -> Self {
        Self::Interrupted {
            session,
            submissions,
            duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn failed(session: usize, submissions: usize, error: String, duration: Duration) -> Self {
        Self::Failed {
            session,
            submissions,
            error,
            duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn session(&self) -> usize {
        match self {
            Self::Completed { session, .. } => *session,
            Self::Interrupted { session, .. } => *session,
            Self::Failed { session, .. } => *session,
        }
    }

    /// Number of answers posted during the session
    pub fn submissions(&self) -> usize {
        match self {
            Self::Completed { submissions, .. } => *submissions,
            Self::Interrupted { submissions, .. } => *submissions,
            Self::Failed { submissions, .. } => *submissions,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

/// Totals of a whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub target: usize,
    /// Sessions that finished, successfully or not
    pub completed: usize,
    pub errored: usize,
    pub interrupted: bool,
    pub duration_secs: f64,
}

impl RunReport {
    pub fn successful(&self) -> usize {
        self.completed.saturating_sub(self.errored)
    }

    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            130
        } else if self.errored > 0 || self.completed < self.target {
            1
        } else {
            0
        }
    }
}
