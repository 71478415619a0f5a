use crate::infra::InMemoryGateway;
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use hiring_pipeline::error::AppError;
use hiring_pipeline::pipeline::projections::{self, OwnerDashboard, WorkerDashboard};
use hiring_pipeline::pipeline::{
    ApplicantId, ApplicationAction, Interview, InterviewKind, LiveProjection, OwnerId,
    PipelineStore, RequirementAction, RequirementDraft, RequirementId, StoreConfig,
    TransitionController,
};
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Employer that posts the sample requirement
    #[arg(long, default_value = "employer-demo")]
    pub(crate) owner: String,
    /// First interview slot (RFC 3339). Defaults to tomorrow.
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) interview_at: Option<DateTime<Utc>>,
    /// Print the dashboards as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

type DemoController = TransitionController<InMemoryGateway>;

#[derive(Serialize)]
struct DemoReport<'a> {
    owner: &'a OwnerDashboard,
    worker: &'a WorkerDashboard,
    live_total_applications: usize,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        owner,
        interview_at,
        json,
    } = args;
    let owner_id = OwnerId(owner);
    let first_slot = interview_at.unwrap_or_else(|| Utc::now() + Duration::days(1));

    let store = PipelineStore::new(Arc::new(InMemoryGateway::default()), StoreConfig::default());
    let controller = TransitionController::new(store.clone());
    let live_owner = owner_id.clone();
    let live = LiveProjection::spawn(&store, move |snapshot| {
        projections::owner_dashboard(&live_owner, snapshot.owned_by(&live_owner), Utc::now())
    });

    println!("Hiring pipeline demo");
    let requirement = controller
        .create_requirement(RequirementDraft {
            owner_id: owner_id.clone(),
            title: "Warehouse picker".to_string(),
            capacity: NonZeroU32::MIN.saturating_add(1),
            deadline: Some(Utc::now() + Duration::days(6)),
            publish: false,
        })
        .await?;
    let id = requirement.id.clone();
    println!("- created {} '{}' as {}", id, requirement.title, requirement.status);

    let published = controller
        .request_requirement_transition(&id, RequirementAction::Publish)
        .await?;
    println!("- published {} -> {}", id, published.status);

    let rejected_worker = ApplicantId("worker-ana".to_string());
    let hired_worker = ApplicantId("worker-ben".to_string());
    for worker in [&rejected_worker, &hired_worker] {
        let application = controller.submit_application(&id, worker).await?;
        println!("- {} applied ({})", worker, application.status);
    }

    step(&controller, &id, &rejected_worker, ApplicationAction::Shortlist).await?;
    step(&controller, &id, &rejected_worker, ApplicationAction::Reject).await?;
    match controller
        .apply_action(&id, &rejected_worker, ApplicationAction::Select)
        .await
    {
        Ok(_) => println!("- unexpected: rejected applicant was selected"),
        Err(err) => println!("- refused: {err}"),
    }

    step(&controller, &id, &hired_worker, ApplicationAction::Shortlist).await?;
    for slot in [first_slot, first_slot + Duration::hours(28)] {
        step(
            &controller,
            &id,
            &hired_worker,
            ApplicationAction::ScheduleInterview {
                interview: sample_interview(slot),
            },
        )
        .await?;
        println!("  interview at {}", slot.to_rfc3339());
    }
    step(&controller, &id, &hired_worker, ApplicationAction::Select).await?;
    step(&controller, &id, &hired_worker, ApplicationAction::MarkJoined).await?;

    let closed = controller
        .request_requirement_transition(&id, RequirementAction::Close)
        .await?;
    println!("- closed {} -> {}", id, closed.status);
    let listed = store.list_by_owner(&owner_id).await?;
    for requirement in &listed {
        println!("  owner list: {} is {}", requirement.id, requirement.status);
    }

    let owner_view = projections::owner_dashboard(&owner_id, &listed, Utc::now());
    let worker_view = projections::worker_dashboard(&hired_worker, &listed);
    let live_view = live.current();
    if json {
        let report = DemoReport {
            owner: &owner_view,
            worker: &worker_view,
            live_total_applications: live_view.total_applications,
        };
        let rendered = serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?;
        println!("{rendered}");
    } else {
        render_owner_dashboard(&owner_view);
        render_worker_dashboard(&worker_view);
        println!(
            "\nLive projection saw {} applications for {}",
            live_view.total_applications, live_view.owner_id
        );
    }

    Ok(())
}

async fn step(
    controller: &DemoController,
    requirement_id: &RequirementId,
    applicant_id: &ApplicantId,
    action: ApplicationAction,
) -> Result<(), AppError> {
    let application = controller
        .apply_action(requirement_id, applicant_id, action)
        .await?;
    println!("- {} is now {}", applicant_id, application.status);
    Ok(())
}

fn sample_interview(time: DateTime<Utc>) -> Interview {
    Interview {
        time,
        duration_minutes: 30,
        kind: InterviewKind::InPerson,
        location: Some("North depot, gate 2".to_string()),
        interviewer_name: "Shift lead".to_string(),
        notes: None,
    }
}

fn render_owner_dashboard(dashboard: &OwnerDashboard) {
    println!("\nOwner dashboard for {}", dashboard.owner_id);
    for entry in &dashboard.requirements_by_status {
        println!("  {:<14} {}", entry.status_label, entry.count);
    }
    println!("Applications ({} total)", dashboard.total_applications);
    for entry in dashboard
        .applications_by_status
        .iter()
        .filter(|entry| entry.count > 0)
    {
        println!("  {:<14} {}", entry.status_label, entry.count);
    }
    if dashboard.expiring_soon.is_empty() {
        println!("Nothing expiring soon");
    }
    for view in &dashboard.expiring_soon {
        println!(
            "  expiring: {} '{}' in {} days",
            view.id,
            view.title,
            view.days_remaining.unwrap_or_default()
        );
    }
}

fn render_worker_dashboard(dashboard: &WorkerDashboard) {
    println!("\nWorker dashboard for {}", dashboard.applicant_id);
    for entry in &dashboard.columns {
        println!("  {:<14} {}", entry.column_label, entry.count);
    }
    println!("  {:<14} {}", "Closed", dashboard.closed);
    for assignment in &dashboard.assignments {
        println!(
            "  - {} ({}) {}",
            assignment.requirement_title, assignment.requirement_id, assignment.status_label
        );
    }
}
