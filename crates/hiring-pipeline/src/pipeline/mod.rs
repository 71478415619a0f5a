//! Hiring pipeline state: requirements, applications, the cache that holds
//! them, and the controller that moves them through their lifecycles.
//!
//! Reads go through [`PipelineStore`]; every write goes through
//! [`TransitionController`], which validates against the status tables,
//! applies optimistically, calls the [`JobGateway`], then commits or rolls
//! back.

pub mod controller;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod projections;
pub mod router;
pub mod status;
pub mod store;

#[cfg(test)]
mod tests;

pub use controller::{ApplicationAction, RequirementAction, TransitionController};
pub use domain::{
    ApplicantId, Application, ApplicationKey, Interview, InterviewKind, OwnerId, Requirement,
    RequirementDraft, RequirementEdit, RequirementId, RequirementPayload, TransitionExtra,
};
pub use error::{NotFound, PipelineError, WriteTarget};
pub use gateway::{GatewayError, JobGateway};
pub use projections::{LiveProjection, OwnerDashboard, PipelineColumn, WorkerDashboard};
pub use router::pipeline_router;
pub use status::{
    validate_application_transition, validate_requirement_transition, ApplicationStatus,
    ApplicationTransition, IllegalTransition, RequirementStatus,
};
pub use store::{
    Invalidation, ListKey, PipelineStore, StoreConfig, StoreEvent, StoreSnapshot, Subscription,
    DEFAULT_FRESH_SECS,
};
