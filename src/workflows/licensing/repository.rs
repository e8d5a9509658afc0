use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Actor, Application, ApplicationId, ApplicationStatus, Coordinates, Facility, FacilityId,
    FacilityKind, License, LicenseId, LicenseStatus, LicenseType, NotificationMessage, StepCode,
    StepEntry, StepState,
};

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("stale application version: read {read}, stored {stored}")]
    VersionConflict { read: u64, stored: u64 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The atomic unit of a workflow transition: the mutated application, the
/// ledger entry it produced (absent only for rejection, which has no step
/// code), and (for issuance only) the new license. The store must persist
/// all parts or none. `application.version` is the post-commit version;
/// the store compares the stored record against `version - 1`.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    pub application: Application,
    pub step: Option<StepEntry>,
    pub license: Option<License>,
}

/// Persistence seam for applications, their step ledger, and licenses.
/// Implementations must serialize commits per application id so that two
/// racing transitions cannot both observe the same version.
pub trait WorkflowStore: Send + Sync {
    /// Persist a fresh draft together with its DRAFT ledger entry. The
    /// workflow service allocates the id and application number up front;
    /// the store only rejects duplicates.
    fn insert_application(
        &self,
        application: Application,
        first_step: StepEntry,
    ) -> Result<Application, StoreError>;

    fn fetch_application(&self, id: ApplicationId) -> Result<Option<Application>, StoreError>;

    /// Apply a transition atomically. Fails with `VersionConflict` when the
    /// stored application version no longer matches the one in the commit.
    fn commit_transition(&self, commit: TransitionCommit) -> Result<(), StoreError>;

    /// Ledger entries for an application, ordered by step order.
    fn steps(&self, id: ApplicationId) -> Result<Vec<StepEntry>, StoreError>;

    fn applications_by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<Application>, StoreError>;

    fn applications_by_facility(
        &self,
        facility: FacilityId,
    ) -> Result<Vec<Application>, StoreError>;

    fn insert_license(&self, license: License) -> Result<License, StoreError>;

    fn fetch_license(&self, id: LicenseId) -> Result<Option<License>, StoreError>;

    fn license_by_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<License>, StoreError>;

    fn license_by_number(&self, number: &str) -> Result<Option<License>, StoreError>;

    fn update_license(&self, license: License) -> Result<(), StoreError>;
}

/// Registry of facilities; the proximity gate scans it per kind.
pub trait FacilityDirectory: Send + Sync {
    fn insert(&self, facility: Facility) -> Result<Facility, StoreError>;
    fn fetch(&self, id: FacilityId) -> Result<Option<Facility>, StoreError>;
    fn update(&self, facility: Facility) -> Result<(), StoreError>;
    fn find_by_kind(&self, kind: FacilityKind) -> Result<Vec<Facility>, StoreError>;
}

/// Notification dispatch error. Delivery failures never fail a transition;
/// the engine logs them and moves on.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound notification hook (in production an SMS/portal adapter).
pub trait NotificationSink: Send + Sync {
    fn notify(
        &self,
        recipient: super::domain::FacilityUserId,
        message: NotificationMessage,
    ) -> Result<(), NotifyError>;
}

/// One audit trail row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: Actor,
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub detail: String,
}

/// Append-only audit trail hook. Sinks are expected not to fail; a lossy
/// sink drops entries on its own account.
pub trait AuditSink: Send + Sync {
    fn log(&self, entry: AuditEntry);
}

/// Serialized view of one ledger entry for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub step_order: u32,
    pub step_code: StepCode,
    pub state: StepState,
    pub performed_by: Actor,
    pub performed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl From<&StepEntry> for StepView {
    fn from(entry: &StepEntry) -> Self {
        Self {
            step_order: entry.step_order,
            step_code: entry.step_code,
            state: entry.state,
            performed_by: entry.performed_by,
            performed_at: entry.performed_at,
            notes: entry.notes.clone(),
        }
    }
}

/// Serialized license view for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseView {
    pub id: LicenseId,
    pub application_id: ApplicationId,
    pub license_number: String,
    pub issue_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub document_ref: String,
    pub status: LicenseStatus,
}

impl From<&License> for LicenseView {
    fn from(license: &License) -> Self {
        Self {
            id: license.id,
            application_id: license.application_id,
            license_number: license.license_number.clone(),
            issue_date: license.issue_date,
            expiry_date: license.expiry_date,
            document_ref: license.document_ref.clone(),
            status: license.status,
        }
    }
}

/// Full application view: the record plus its ledger and license, if any.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub id: ApplicationId,
    pub application_number: String,
    pub facility_id: FacilityId,
    pub status: ApplicationStatus,
    pub license_type: LicenseType,
    pub facility_kind: FacilityKind,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub steps: Vec<StepView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseView>,
}

impl ApplicationView {
    pub fn assemble(
        application: &Application,
        steps: &[StepEntry],
        license: Option<&License>,
    ) -> Self {
        Self {
            id: application.id,
            application_number: application.application_number.clone(),
            facility_id: application.facility_id,
            status: application.status,
            license_type: application.license_type,
            facility_kind: application.facility_kind,
            created_at: application.created_at,
            submitted_at: application.submitted_at,
            approved_at: application.approved_at,
            rejected_at: application.rejected_at,
            rejection_reason: application.rejection_reason.clone(),
            steps: steps.iter().map(StepView::from).collect(),
            license: license.map(LicenseView::from),
        }
    }
}

/// Public license verification payload, served without authentication.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseVerification {
    pub license_number: String,
    pub application_number: String,
    pub facility_kind: FacilityKind,
    pub status: LicenseStatus,
    pub issue_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_name: Option<String>,
}

/// Facility view returned by registration endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct FacilityView {
    pub id: FacilityId,
    pub facility_code: String,
    pub name_ar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    pub kind: FacilityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub operational_status: super::domain::OperationalStatus,
}

impl From<&Facility> for FacilityView {
    fn from(facility: &Facility) -> Self {
        Self {
            id: facility.id,
            facility_code: facility.facility_code.clone(),
            name_ar: facility.name_ar.clone(),
            name_en: facility.name_en.clone(),
            kind: facility.kind,
            coordinates: facility.coordinates,
            operational_status: facility.operational_status,
        }
    }
}
