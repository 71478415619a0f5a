//! Read-only derivations over cached requirements. Nothing here talks to
//! the gateway or mutates the store.

mod live;
pub mod views;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::domain::{ApplicantId, OwnerId, Requirement};
use super::status::{ApplicationStatus, RequirementStatus};

pub use live::LiveProjection;
pub use views::{
    ApplicantRow, AssignmentView, ColumnCountEntry, OwnerDashboard, PipelineColumnEntry,
    RequirementCountEntry, RequirementSummaryView, StatusCountEntry, WorkerDashboard,
};

/// Window used by the dashboards' "expiring soon" list.
pub const EXPIRING_SOON_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineColumn {
    Saved,
    Interviewing,
    Hired,
}

impl PipelineColumn {
    pub const fn ordered() -> [Self; 3] {
        [Self::Saved, Self::Interviewing, Self::Hired]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Saved => "Saved",
            Self::Interviewing => "Interviewing",
            Self::Hired => "Hired",
        }
    }

    /// `None` for rejected and no-show applications.
    pub const fn for_status(status: ApplicationStatus) -> Option<Self> {
        match status {
            ApplicationStatus::Applied | ApplicationStatus::UnderReview => Some(Self::Saved),
            ApplicationStatus::Interviewing => Some(Self::Interviewing),
            ApplicationStatus::Selected | ApplicationStatus::Joined => Some(Self::Hired),
            ApplicationStatus::Rejected | ApplicationStatus::NoShow => None,
        }
    }
}

pub fn count_with_status<'a>(
    requirements: impl IntoIterator<Item = &'a Requirement>,
    status: ApplicationStatus,
) -> usize {
    requirements
        .into_iter()
        .flat_map(|requirement| &requirement.applications)
        .filter(|application| application.status == status)
        .count()
}

/// Application counts for every status, zeros included, in vocabulary order.
pub fn application_counts<'a>(
    requirements: impl IntoIterator<Item = &'a Requirement>,
) -> Vec<StatusCountEntry> {
    let mut counts = [0usize; 7];
    for application in requirements
        .into_iter()
        .flat_map(|requirement| &requirement.applications)
    {
        if let Some(index) = ApplicationStatus::ordered()
            .iter()
            .position(|status| *status == application.status)
        {
            counts[index] += 1;
        }
    }

    ApplicationStatus::ordered()
        .into_iter()
        .zip(counts)
        .map(|(status, count)| StatusCountEntry {
            status,
            status_label: status.label(),
            count,
        })
        .collect()
}

pub fn requirement_counts<'a>(
    requirements: impl IntoIterator<Item = &'a Requirement>,
    now: DateTime<Utc>,
) -> Vec<RequirementCountEntry> {
    let statuses: Vec<RequirementStatus> = requirements
        .into_iter()
        .map(|requirement| requirement.effective_status(now))
        .collect();

    RequirementStatus::ordered()
        .into_iter()
        .map(|status| RequirementCountEntry {
            status,
            status_label: status.label(),
            count: statuses.iter().filter(|candidate| **candidate == status).count(),
        })
        .collect()
}

pub fn summarize(requirement: &Requirement, now: DateTime<Utc>) -> RequirementSummaryView {
    let status = requirement.effective_status(now);
    let days_remaining = match (status, requirement.deadline) {
        (RequirementStatus::Active, Some(deadline)) => Some((deadline - now).num_days()),
        _ => None,
    };

    RequirementSummaryView {
        id: requirement.id.clone(),
        title: requirement.title.clone(),
        status,
        status_label: status.label(),
        capacity: requirement.capacity.get(),
        applications: requirement.applications.len(),
        deadline: requirement.deadline,
        days_remaining,
    }
}

/// Active postings whose deadline falls within the next `days`, soonest first.
pub fn expiring_within<'a>(
    requirements: impl IntoIterator<Item = &'a Requirement>,
    now: DateTime<Utc>,
    days: i64,
) -> Vec<RequirementSummaryView> {
    let horizon = now + Duration::days(days);
    let mut expiring: Vec<&Requirement> = requirements
        .into_iter()
        .filter(|requirement| requirement.effective_status(now) == RequirementStatus::Active)
        .filter(|requirement| matches!(requirement.deadline, Some(deadline) if deadline <= horizon))
        .collect();
    expiring.sort_by_key(|requirement| requirement.deadline);
    expiring
        .into_iter()
        .map(|requirement| summarize(requirement, now))
        .collect()
}

/// Postings a worker can still apply to.
pub fn open_requirements<'a>(
    requirements: impl IntoIterator<Item = &'a Requirement>,
    now: DateTime<Utc>,
) -> Vec<RequirementSummaryView> {
    requirements
        .into_iter()
        .filter(|requirement| requirement.accepts_applications(now))
        .map(|requirement| summarize(requirement, now))
        .collect()
}

/// Applicants in arrival order.
pub fn applicant_list(requirement: &Requirement) -> Vec<ApplicantRow> {
    requirement
        .applications
        .iter()
        .map(|application| ApplicantRow {
            applicant_id: application.applicant_id.clone(),
            status: application.status,
            status_label: application.status.label(),
            applied_at: application.applied_at,
            interview_time: application.interview.as_ref().map(|interview| interview.time),
            column: PipelineColumn::for_status(application.status),
        })
        .collect()
}

pub fn pipeline_board(requirement: &Requirement) -> Vec<PipelineColumnEntry> {
    let rows = applicant_list(requirement);
    PipelineColumn::ordered()
        .into_iter()
        .map(|column| PipelineColumnEntry {
            column,
            column_label: column.label(),
            applicants: rows
                .iter()
                .filter(|row| row.column == Some(column))
                .cloned()
                .collect(),
        })
        .collect()
}

/// The worker's applications, newest first.
pub fn assignments_for<'a>(
    requirements: impl IntoIterator<Item = &'a Requirement>,
    applicant_id: &ApplicantId,
) -> Vec<AssignmentView> {
    let mut assignments: Vec<AssignmentView> = requirements
        .into_iter()
        .filter_map(|requirement| {
            requirement
                .application(applicant_id)
                .map(|application| AssignmentView {
                    requirement_id: requirement.id.clone(),
                    requirement_title: requirement.title.clone(),
                    owner_id: requirement.owner_id.clone(),
                    status: application.status,
                    status_label: application.status.label(),
                    applied_at: application.applied_at,
                    interview: application.interview.clone(),
                })
        })
        .collect();
    assignments.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
    assignments
}

pub fn owner_dashboard<'a>(
    owner_id: &OwnerId,
    requirements: impl IntoIterator<Item = &'a Requirement>,
    now: DateTime<Utc>,
) -> OwnerDashboard {
    let owned: Vec<&Requirement> = requirements
        .into_iter()
        .filter(|requirement| &requirement.owner_id == owner_id)
        .collect();

    OwnerDashboard {
        owner_id: owner_id.clone(),
        requirements_by_status: requirement_counts(owned.iter().copied(), now),
        applications_by_status: application_counts(owned.iter().copied()),
        total_applications: owned
            .iter()
            .map(|requirement| requirement.applications.len())
            .sum(),
        expiring_soon: expiring_within(owned.iter().copied(), now, EXPIRING_SOON_DAYS),
    }
}

pub fn worker_dashboard<'a>(
    applicant_id: &ApplicantId,
    requirements: impl IntoIterator<Item = &'a Requirement>,
) -> WorkerDashboard {
    let assignments = assignments_for(requirements, applicant_id);
    let columns = PipelineColumn::ordered()
        .into_iter()
        .map(|column| ColumnCountEntry {
            column,
            column_label: column.label(),
            count: assignments
                .iter()
                .filter(|assignment| PipelineColumn::for_status(assignment.status) == Some(column))
                .count(),
        })
        .collect();
    let closed = assignments
        .iter()
        .filter(|assignment| PipelineColumn::for_status(assignment.status).is_none())
        .count();

    WorkerDashboard {
        applicant_id: applicant_id.clone(),
        columns,
        closed,
        assignments,
    }
}
