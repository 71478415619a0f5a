use std::fmt;
use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::{ApplicationStatus, RequirementStatus};

/// Identifier assigned by the gateway when a requirement is first created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementId(pub String);

/// Employer that owns a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

/// Worker applying to requirements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantId(pub String);

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_id!(RequirementId, OwnerId, ApplicantId);

/// Composite identity of an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationKey {
    pub requirement_id: RequirementId,
    pub applicant_id: ApplicantId,
}

impl ApplicationKey {
    pub fn new(requirement_id: &RequirementId, applicant_id: &ApplicantId) -> Self {
        Self {
            requirement_id: requirement_id.clone(),
            applicant_id: applicant_id.clone(),
        }
    }
}

impl fmt::Display for ApplicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.requirement_id, self.applicant_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewKind {
    InPerson,
    Video,
    Phone,
}

impl InterviewKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::InPerson => "In Person",
            Self::Video => "Video",
            Self::Phone => "Phone",
        }
    }
}

/// Scheduled interview. Rescheduling replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interview {
    pub time: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(rename = "type")]
    pub kind: InterviewKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub interviewer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A worker's application to one requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub requirement_id: RequirementId,
    pub applicant_id: ApplicantId,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview: Option<Interview>,
}

impl Application {
    pub fn key(&self) -> ApplicationKey {
        ApplicationKey::new(&self.requirement_id, &self.applicant_id)
    }
}

/// A posted job and its applications in arrival order.
///
/// `capacity` is advisory; nothing here caps `applications` at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    pub owner_id: OwnerId,
    pub title: String,
    pub status: RequirementStatus,
    pub capacity: NonZeroU32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub applications: Vec<Application>,
}

impl Requirement {
    /// Status for display and transition checks. An `Active` posting whose
    /// deadline has passed reads as `Expired` until the server catches up.
    pub fn effective_status(&self, now: DateTime<Utc>) -> RequirementStatus {
        match (self.status, self.deadline) {
            (RequirementStatus::Active, Some(deadline)) if deadline <= now => {
                RequirementStatus::Expired
            }
            (status, _) => status,
        }
    }

    pub fn accepts_applications(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == RequirementStatus::Active
    }

    pub fn application(&self, applicant_id: &ApplicantId) -> Option<&Application> {
        self.applications
            .iter()
            .find(|application| &application.applicant_id == applicant_id)
    }

    pub(crate) fn application_mut(&mut self, applicant_id: &ApplicantId) -> Option<&mut Application> {
        self.applications
            .iter_mut()
            .find(|application| &application.applicant_id == applicant_id)
    }
}

/// Employer input for a new requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementDraft {
    pub owner_id: OwnerId,
    pub title: String,
    pub capacity: NonZeroU32,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Create directly as `Active` instead of `Draft`.
    #[serde(default)]
    pub publish: bool,
}

/// Editable fields of an existing requirement. Ownership and status are
/// not editable here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementEdit {
    pub title: String,
    pub capacity: NonZeroU32,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

/// Body of the gateway's single create-or-update endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequirementId>,
    pub owner_id: OwnerId,
    pub title: String,
    pub status: RequirementStatus,
    pub capacity: NonZeroU32,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

impl RequirementPayload {
    pub fn create(draft: RequirementDraft) -> Self {
        let status = if draft.publish {
            RequirementStatus::Active
        } else {
            RequirementStatus::Draft
        };
        Self {
            id: None,
            owner_id: draft.owner_id,
            title: draft.title,
            status,
            capacity: draft.capacity,
            deadline: draft.deadline,
        }
    }

    pub fn update(current: &Requirement, edit: RequirementEdit) -> Self {
        Self {
            id: Some(current.id.clone()),
            owner_id: current.owner_id.clone(),
            title: edit.title,
            status: current.status,
            capacity: edit.capacity,
            deadline: edit.deadline,
        }
    }
}

/// Transition-specific payload sent along with a status change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview: Option<Interview>,
}

impl TransitionExtra {
    pub fn interview(interview: Interview) -> Self {
        Self {
            interview: Some(interview),
        }
    }
}
