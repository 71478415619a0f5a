//! Closed status vocabulary for requirements and applications, plus the
//! adjacency tables every transition is checked against.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Posting lifecycle of a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementStatus {
    Draft,
    Active,
    Expired,
}

impl RequirementStatus {
    pub const fn ordered() -> [Self; 3] {
        [Self::Draft, Self::Active, Self::Expired]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Active => "Active",
            Self::Expired => "Expired",
        }
    }

    /// Publish, close and renew. Nothing leads back to `Draft`.
    pub const fn allowed_targets(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Active],
            Self::Active => &[Self::Expired],
            Self::Expired => &[Self::Active],
        }
    }

    pub fn can_transition_to(self, target: Self) -> bool {
        self.allowed_targets().contains(&target)
    }
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Progression of a single application through review and onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Applied,
    UnderReview,
    Interviewing,
    Selected,
    Rejected,
    Joined,
    NoShow,
}

impl ApplicationStatus {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Applied,
            Self::UnderReview,
            Self::Interviewing,
            Self::Selected,
            Self::Rejected,
            Self::Joined,
            Self::NoShow,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Applied => "Applied",
            Self::UnderReview => "Under Review",
            Self::Interviewing => "Interviewing",
            Self::Selected => "Selected",
            Self::Rejected => "Rejected",
            Self::Joined => "Joined",
            Self::NoShow => "No Show",
        }
    }

    pub const fn allowed_targets(self) -> &'static [Self] {
        match self {
            Self::Applied => &[Self::UnderReview, Self::Rejected],
            Self::UnderReview => &[Self::Interviewing, Self::Selected, Self::Rejected],
            Self::Interviewing => &[Self::Selected, Self::Rejected, Self::NoShow],
            Self::Selected => &[Self::Joined, Self::Rejected],
            Self::Joined | Self::Rejected | Self::NoShow => &[],
        }
    }

    pub const fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    pub fn can_transition_to(self, target: Self) -> bool {
        self.allowed_targets().contains(&target)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a legal application transition affects the interview substructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationTransition {
    /// Plain edge from the adjacency table.
    Advance,
    /// Move into `Interviewing` and attach the interview.
    ScheduleInterview,
    /// Already `Interviewing`; the interview is replaced wholesale.
    Reschedule,
}

impl ApplicationTransition {
    pub const fn attaches_interview(self) -> bool {
        matches!(self, Self::ScheduleInterview | Self::Reschedule)
    }
}

/// Requested edge does not exist in the adjacency table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IllegalTransition {
    #[error("requirement cannot move from {from} to {to}")]
    Requirement {
        from: RequirementStatus,
        to: RequirementStatus,
    },
    #[error("application cannot move from {from} to {to}")]
    Application {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}

pub fn validate_requirement_transition(
    from: RequirementStatus,
    to: RequirementStatus,
) -> Result<(), IllegalTransition> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(IllegalTransition::Requirement { from, to })
    }
}

/// Checks an application edge. `with_interview` marks a request that carries
/// an interview payload. Entering `Interviewing` requires one, and
/// `Interviewing -> Interviewing` with one is a reschedule.
pub fn validate_application_transition(
    from: ApplicationStatus,
    to: ApplicationStatus,
    with_interview: bool,
) -> Result<ApplicationTransition, IllegalTransition> {
    use ApplicationStatus::{Applied, Interviewing, UnderReview};

    if to == Interviewing && with_interview {
        return match from {
            Applied | UnderReview => Ok(ApplicationTransition::ScheduleInterview),
            Interviewing => Ok(ApplicationTransition::Reschedule),
            _ => Err(IllegalTransition::Application { from, to }),
        };
    }
    if to == Interviewing {
        return Err(IllegalTransition::Application { from, to });
    }

    if from.can_transition_to(to) {
        Ok(ApplicationTransition::Advance)
    } else {
        Err(IllegalTransition::Application { from, to })
    }
}
