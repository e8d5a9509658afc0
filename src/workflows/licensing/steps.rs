//! The ordered workflow step map: the single authority on which stages
//! exist, what order they run in, and which visible status each one
//! produces. Every lookup here derives from the one `WORKFLOW_STEPS` array;
//! there is deliberately no second copy of the mapping.

use super::domain::{ApplicationStatus, StepCode};

/// Workflow stages in execution order, paired with the application status
/// each stage leaves behind.
pub const WORKFLOW_STEPS: [(StepCode, ApplicationStatus); 11] = [
    (StepCode::Draft, ApplicationStatus::Draft),
    (StepCode::Submit, ApplicationStatus::Submitted),
    (StepCode::LicensingReview, ApplicationStatus::UnderReview),
    (StepCode::BlueprintReview, ApplicationStatus::BlueprintReview),
    (
        StepCode::InspectionScheduling,
        ApplicationStatus::InspectionScheduled,
    ),
    (
        StepCode::InspectionReport,
        ApplicationStatus::InspectionCompleted,
    ),
    (
        StepCode::CommitteeApproval,
        ApplicationStatus::CommitteeApproved,
    ),
    (StepCode::PaymentOrder, ApplicationStatus::PaymentPending),
    (
        StepCode::ElectronicPayment,
        ApplicationStatus::PaymentCompleted,
    ),
    (StepCode::LicenseIssuance, ApplicationStatus::LicenseIssued),
    (StepCode::Archive, ApplicationStatus::Archived),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepMapError {
    #[error("status {} has no workflow step", .0.as_str())]
    UnknownStatus(ApplicationStatus),
    #[error("status {} is the final workflow stage", .0.as_str())]
    TerminalState(ApplicationStatus),
}

/// Zero-based position of the step that produced `status`. REJECTED never
/// appears in the map and reports `UnknownStatus`.
pub fn index_of(status: ApplicationStatus) -> Result<usize, StepMapError> {
    WORKFLOW_STEPS
        .iter()
        .position(|&(_, mapped)| mapped == status)
        .ok_or(StepMapError::UnknownStatus(status))
}

/// The step that follows the one which produced `status`.
pub fn next_step(status: ApplicationStatus) -> Result<StepCode, StepMapError> {
    let index = index_of(status)?;
    match WORKFLOW_STEPS.get(index + 1) {
        Some(&(step, _)) => Ok(step),
        None => Err(StepMapError::TerminalState(status)),
    }
}

/// The visible status a step leaves behind. Total: every step is in the map.
pub fn status_for(step: StepCode) -> ApplicationStatus {
    WORKFLOW_STEPS
        .iter()
        .find(|&&(code, _)| code == step)
        .map(|&(_, status)| status)
        .expect("every step code appears in WORKFLOW_STEPS")
}

/// Reverse direction of `status_for`, for statuses that map to a step.
pub fn step_for(status: ApplicationStatus) -> Result<StepCode, StepMapError> {
    index_of(status).map(|index| WORKFLOW_STEPS[index].0)
}

/// Ledger step order for a step at the given map index (1-based).
pub const fn step_order(index: usize) -> u32 {
    index as u32 + 1
}
