//! Health facility operating-permit licensing workflow.
//!
//! An application walks a fixed eleven-step path from draft to license.
//! The step map is the single authority for ordering; the state machine
//! owns every status mutation and appends a ledger entry per step taken.
//! Issuance, proximity checks, and facility registration hang off the
//! same trait seams so stores and notification transports stay swappable.

pub mod domain;
pub mod facilities;
pub mod geo;
pub mod issuer;
pub mod machine;
pub mod repository;
pub mod router;
pub mod steps;

#[cfg(test)]
mod tests;

pub use domain::{
    Actor, AdminId, Application, ApplicationId, ApplicationStatus, Coordinates, DraftRequest,
    Facility, FacilityId, FacilityKind, FacilityRegistration, FacilityUserId, License, LicenseId,
    LicenseStatus, LicenseType, NotificationMessage, OperationalStatus, PriorLicense, StepCode,
    StepEntry, StepState, SupervisorDetails,
};
pub use facilities::{FacilityError, FacilityService};
pub use geo::{haversine_distance, GeoError, GeoValidator, DEFAULT_MIN_DISTANCE_METERS};
pub use issuer::{LicenseError, LicenseIssuer};
pub use machine::{LicensingService, WorkflowError};
pub use repository::{
    ApplicationView, AuditEntry, AuditSink, FacilityDirectory, FacilityView, LicenseVerification,
    LicenseView, NotificationSink, NotifyError, StepView, StoreError, TransitionCommit,
    WorkflowStore,
};
pub use router::{licensing_router, LicensingState};
pub use steps::{StepMapError, WORKFLOW_STEPS};
