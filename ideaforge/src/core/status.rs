//! Stage, record and project status enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The outcome a stage reports for one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage finished its work.
    Completed,
    /// A gate stage found problems that a correction cycle should fix.
    RebuildRequired,
    /// Stage failed; the pipeline aborts.
    Failed,
    /// A pause stage is waiting for a human decision.
    Paused,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::RebuildRequired => write!(f, "rebuild_required"),
            Self::Failed => write!(f, "failed"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Status stored on an execution record.
///
/// A record is `Running` between creation and finalization; once finalized
/// it carries the status the stage returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// The stage is in flight.
    Running,
    /// Stage finished its work.
    Completed,
    /// Gate requested a correction cycle.
    RebuildRequired,
    /// Stage failed or raised.
    Failed,
    /// Stage paused the pipeline.
    Paused,
}

impl RecordStatus {
    /// Returns true once the record has been finalized.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl From<StageStatus> for RecordStatus {
    fn from(status: StageStatus) -> Self {
        match status {
            StageStatus::Completed => Self::Completed,
            StageStatus::RebuildRequired => Self::RebuildRequired,
            StageStatus::Failed => Self::Failed,
            StageStatus::Paused => Self::Paused,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::RebuildRequired => write!(f, "rebuild_required"),
            Self::Failed => write!(f, "failed"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Persisted status of a project's pipeline.
///
/// Serialized in the upper-case form the web UI polls for, e.g.
/// `UX_REVIEW_PENDING` or `CORRECTION_CYCLE_2_IN_PROGRESS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ProjectStatus {
    /// Project exists; no run has started.
    #[default]
    Created,
    /// Cycle zero is executing.
    Running,
    /// A pause stage is waiting for approval.
    UxReviewPending,
    /// The paused preview was approved; the next run restarts after it.
    MockupApproved,
    /// Correction cycle `n` (n >= 1) is executing or was interrupted.
    CorrectionCycleInProgress(u32),
    /// All stages finished.
    Completed,
    /// A stage failed or the correction budget ran out.
    Failed,
}

impl ProjectStatus {
    /// Returns true for `COMPLETED` and `FAILED`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the correction cycle if this is a correction status.
    #[must_use]
    pub fn correction_cycle(&self) -> Option<u32> {
        match self {
            Self::CorrectionCycleInProgress(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns true if the supervisor may move from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        use ProjectStatus::{
            Completed, CorrectionCycleInProgress, Created, Failed, MockupApproved, Running,
            UxReviewPending,
        };

        match (*self, next) {
            (Created | MockupApproved | Completed | Failed | Running, Running) => true,
            (Running, UxReviewPending | Completed | Failed) => true,
            (Running, CorrectionCycleInProgress(n)) => n >= 1,
            (CorrectionCycleInProgress(from), CorrectionCycleInProgress(to)) => to > from,
            (CorrectionCycleInProgress(_), UxReviewPending | Completed | Failed) => true,
            (UxReviewPending, MockupApproved) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Running => write!(f, "RUNNING"),
            Self::UxReviewPending => write!(f, "UX_REVIEW_PENDING"),
            Self::MockupApproved => write!(f, "MOCKUP_APPROVED"),
            Self::CorrectionCycleInProgress(n) => write!(f, "CORRECTION_CYCLE_{n}_IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(Self::Created),
            "RUNNING" => Ok(Self::Running),
            "UX_REVIEW_PENDING" => Ok(Self::UxReviewPending),
            "MOCKUP_APPROVED" => Ok(Self::MockupApproved),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => other
                .strip_prefix("CORRECTION_CYCLE_")
                .and_then(|rest| rest.strip_suffix("_IN_PROGRESS"))
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|n| *n >= 1)
                .map(Self::CorrectionCycleInProgress)
                .ok_or_else(|| format!("Invalid project status: {other}")),
        }
    }
}

impl From<ProjectStatus> for String {
    fn from(status: ProjectStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for ProjectStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
