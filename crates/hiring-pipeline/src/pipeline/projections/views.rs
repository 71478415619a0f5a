use chrono::{DateTime, Utc};
use serde::Serialize;

use super::super::domain::{ApplicantId, Interview, OwnerId, RequirementId};
use super::super::status::{ApplicationStatus, RequirementStatus};
use super::PipelineColumn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCountEntry {
    pub status: ApplicationStatus,
    pub status_label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementCountEntry {
    pub status: RequirementStatus,
    pub status_label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementSummaryView {
    pub id: RequirementId,
    pub title: String,
    /// Effective status: a lapsed deadline reads as expired.
    pub status: RequirementStatus,
    pub status_label: &'static str,
    pub capacity: u32,
    pub applications: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
}

/// Row of the requirement detail applicant list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicantRow {
    pub applicant_id: ApplicantId,
    pub status: ApplicationStatus,
    pub status_label: &'static str,
    pub applied_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<PipelineColumn>,
}

/// One of the worker's applications as shown on their assignment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentView {
    pub requirement_id: RequirementId,
    pub requirement_title: String,
    pub owner_id: OwnerId,
    pub status: ApplicationStatus,
    pub status_label: &'static str,
    pub applied_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview: Option<Interview>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineColumnEntry {
    pub column: PipelineColumn,
    pub column_label: &'static str,
    pub applicants: Vec<ApplicantRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnCountEntry {
    pub column: PipelineColumn,
    pub column_label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerDashboard {
    pub owner_id: OwnerId,
    pub requirements_by_status: Vec<RequirementCountEntry>,
    pub applications_by_status: Vec<StatusCountEntry>,
    pub total_applications: usize,
    pub expiring_soon: Vec<RequirementSummaryView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerDashboard {
    pub applicant_id: ApplicantId,
    pub columns: Vec<ColumnCountEntry>,
    /// Rejected or no-show applications.
    pub closed: usize,
    pub assignments: Vec<AssignmentView>,
}
