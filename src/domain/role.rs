//! Role resolution at the authorization boundary

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The fixed set of roles a caller can act as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    TopAdmin,
    PaperSetter,
    Guardian,
    ExamCenter,
}

/// Operations gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ManageRoster,
    ViewRoster,
    ListAvailableGuardians,
    PublishQuestions,
    ScheduleExam,
    ManageExam,
    ViewExam,
    SubmitShare,
    CheckShareStatus,
    RequestPaper,
    ViewPaper,
    RunScheduler,
    /// Offline split/combine of raw keys
    HandleKeys,
}

impl Role {
    /// Whether this role may perform `action`
    #[must_use]
    pub fn permits(self, action: Action) -> bool {
        match self {
            Role::TopAdmin => matches!(
                action,
                Action::ManageRoster
                    | Action::ViewRoster
                    | Action::ScheduleExam
                    | Action::ManageExam
                    | Action::ViewExam
                    | Action::RunScheduler
                    | Action::HandleKeys
            ),
            Role::PaperSetter => matches!(
                action,
                Action::ListAvailableGuardians | Action::PublishQuestions
            ),
            Role::Guardian => matches!(action, Action::SubmitShare | Action::CheckShareStatus),
            Role::ExamCenter => matches!(action, Action::RequestPaper | Action::ViewPaper),
        }
    }

    /// # Errors
    /// Returns [`Error::Forbidden`] if the role may not perform `action`
    pub fn authorize(self, action: Action) -> Result<()> {
        if self.permits(action) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("{self} may not {action:?}")))
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::TopAdmin => "top-admin",
            Role::PaperSetter => "paper-setter",
            Role::Guardian => "guardian",
            Role::ExamCenter => "exam-center",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "top-admin" => Ok(Role::TopAdmin),
            "paper-setter" => Ok(Role::PaperSetter),
            "guardian" => Ok(Role::Guardian),
            "exam-center" => Ok(Role::ExamCenter),
            other => Err(Error::validation(format!("unknown role '{other}'"))),
        }
    }
}
