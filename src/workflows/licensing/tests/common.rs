use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::workflows::licensing::domain::{
    AdminId, Application, ApplicationId, ApplicationStatus, Coordinates, DraftRequest,
    Facility, FacilityId, FacilityKind, FacilityRegistration, FacilityUserId, License, LicenseId,
    LicenseType, NotificationMessage, OperationalStatus, StepEntry, SupervisorDetails,
};
use crate::workflows::licensing::facilities::FacilityService;
use crate::workflows::licensing::geo::DEFAULT_MIN_DISTANCE_METERS;
use crate::workflows::licensing::issuer::LicenseIssuer;
use crate::workflows::licensing::machine::LicensingService;
use crate::workflows::licensing::repository::{
    ApplicationView, AuditEntry, AuditSink, FacilityDirectory, NotificationSink, NotifyError,
    StoreError, TransitionCommit, WorkflowStore,
};
use crate::workflows::licensing::router::{licensing_router, LicensingState};

pub(super) fn admin() -> AdminId {
    AdminId(11)
}

pub(super) fn applicant() -> FacilityUserId {
    FacilityUserId(77)
}

pub(super) fn draft_request() -> DraftRequest {
    DraftRequest {
        license_type: LicenseType::New,
        facility_kind: FacilityKind::Clinic,
        supervisor: SupervisorDetails {
            name: Some("Dr. Samira Al-Qadasi".to_string()),
            qualification: Some("MBBS".to_string()),
            ..SupervisorDetails::default()
        },
        prior_license: None,
    }
}

pub(super) fn registration(
    name: &str,
    kind: FacilityKind,
    coordinates: Option<Coordinates>,
) -> FacilityRegistration {
    FacilityRegistration {
        name_ar: format!("منشأة {name}"),
        name_en: Some(name.to_string()),
        kind,
        district: Some("Al-Tahrir".to_string()),
        area: None,
        street: None,
        coordinates,
        rooms_count: Some(4),
    }
}

pub(super) fn facility_at(
    id: i64,
    kind: FacilityKind,
    coordinates: Option<Coordinates>,
) -> Facility {
    Facility {
        id: FacilityId(id),
        facility_code: format!("FAC-{id:08}"),
        name_ar: format!("منشأة {id}"),
        name_en: None,
        kind,
        district: None,
        area: None,
        street: None,
        coordinates,
        rooms_count: None,
        operational_status: OperationalStatus::Active,
        created_at: Utc::now(),
    }
}

/// Full engine over shared in-memory collaborators.
pub(super) struct Harness {
    pub(super) workflow: LicensingService<MemoryStore, MemoryNotifier, MemoryAudit>,
    pub(super) issuer: LicenseIssuer<MemoryStore, MemoryNotifier, MemoryAudit>,
    pub(super) store: Arc<MemoryStore>,
    pub(super) notifier: Arc<MemoryNotifier>,
    pub(super) audit: Arc<MemoryAudit>,
}

pub(super) fn harness() -> Harness {
    let store = Arc::new(MemoryStore::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let audit = Arc::new(MemoryAudit::default());
    Harness {
        workflow: LicensingService::new(store.clone(), notifier.clone(), audit.clone()),
        issuer: LicenseIssuer::new(store.clone(), notifier.clone(), audit.clone()),
        store,
        notifier,
        audit,
    }
}

pub(super) fn submitted_application(harness: &Harness) -> ApplicationView {
    let draft = harness
        .workflow
        .create_draft(FacilityId(1), applicant(), draft_request())
        .expect("draft creation succeeds");
    harness
        .workflow
        .submit(draft.id, applicant())
        .expect("submission succeeds")
}

/// Drives a submitted application through review, inspection, committee,
/// and payment, leaving it at PAYMENT_COMPLETED.
pub(super) fn paid_application(harness: &Harness) -> ApplicationView {
    let view = submitted_application(harness);
    let id = view.id;
    harness
        .workflow
        .advance(id, admin(), None)
        .expect("advance to review");
    harness
        .workflow
        .advance(id, admin(), None)
        .expect("advance to blueprint review");
    harness
        .workflow
        .advance(id, admin(), None)
        .expect("advance to inspection scheduling");
    harness
        .workflow
        .record_inspection_report(id, admin(), None)
        .expect("inspection report recorded");
    harness
        .workflow
        .advance(id, admin(), None)
        .expect("advance to committee approval");
    harness
        .workflow
        .record_payment_order(id, admin(), "PO-TEST-01")
        .expect("payment order recorded");
    harness
        .workflow
        .record_payment_confirmation(id, "PO-TEST-01", "gateway")
        .expect("payment confirmed")
}

pub(super) fn issued_application(harness: &Harness) -> ApplicationView {
    let view = paid_application(harness);
    harness
        .workflow
        .advance(view.id, admin(), None)
        .expect("advance to issuance")
}

pub(super) fn router_with_memory() -> axum::Router {
    let store = Arc::new(MemoryStore::default());
    let directory = Arc::new(MemoryDirectory::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let audit = Arc::new(MemoryAudit::default());
    licensing_router(Arc::new(LicensingState {
        workflow: LicensingService::new(store.clone(), notifier.clone(), audit.clone()),
        issuer: LicenseIssuer::new(store, notifier, audit.clone()),
        facilities: FacilityService::new(directory, audit, DEFAULT_MIN_DISTANCE_METERS),
    }))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default)]
pub(super) struct MemoryStore {
    applications: Mutex<HashMap<i64, Application>>,
    steps: Mutex<Vec<StepEntry>>,
    licenses: Mutex<HashMap<i64, License>>,
}

impl MemoryStore {
    pub(super) fn license_count(&self) -> usize {
        self.licenses.lock().expect("store mutex poisoned").len()
    }
}

impl WorkflowStore for MemoryStore {
    fn insert_application(
        &self,
        application: Application,
        first_step: StepEntry,
    ) -> Result<Application, StoreError> {
        let mut applications = self.applications.lock().expect("store mutex poisoned");
        if applications.contains_key(&application.id.0) {
            return Err(StoreError::Conflict);
        }
        applications.insert(application.id.0, application.clone());
        self.steps
            .lock()
            .expect("store mutex poisoned")
            .push(first_step);
        Ok(application)
    }

    fn fetch_application(&self, id: ApplicationId) -> Result<Option<Application>, StoreError> {
        let applications = self.applications.lock().expect("store mutex poisoned");
        Ok(applications.get(&id.0).cloned())
    }

    fn commit_transition(&self, commit: TransitionCommit) -> Result<(), StoreError> {
        let mut applications = self.applications.lock().expect("store mutex poisoned");
        let stored = applications
            .get(&commit.application.id.0)
            .ok_or_else(|| StoreError::Unavailable("application record missing".to_string()))?;

        let read = commit.application.version.saturating_sub(1);
        if stored.version != read {
            return Err(StoreError::VersionConflict {
                read,
                stored: stored.version,
            });
        }

        applications.insert(commit.application.id.0, commit.application);
        if let Some(step) = commit.step {
            self.steps.lock().expect("store mutex poisoned").push(step);
        }
        if let Some(license) = commit.license {
            self.licenses
                .lock()
                .expect("store mutex poisoned")
                .insert(license.id.0, license);
        }
        Ok(())
    }

    fn steps(&self, id: ApplicationId) -> Result<Vec<StepEntry>, StoreError> {
        let steps = self.steps.lock().expect("store mutex poisoned");
        let mut entries: Vec<StepEntry> = steps
            .iter()
            .filter(|entry| entry.application_id == id)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.step_order);
        Ok(entries)
    }

    fn applications_by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<Application>, StoreError> {
        let applications = self.applications.lock().expect("store mutex poisoned");
        let mut found: Vec<Application> = applications
            .values()
            .filter(|application| application.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|application| application.id);
        Ok(found)
    }

    fn applications_by_facility(
        &self,
        facility: FacilityId,
    ) -> Result<Vec<Application>, StoreError> {
        let applications = self.applications.lock().expect("store mutex poisoned");
        let mut found: Vec<Application> = applications
            .values()
            .filter(|application| application.facility_id == facility)
            .cloned()
            .collect();
        found.sort_by_key(|application| application.id);
        Ok(found)
    }

    fn insert_license(&self, license: License) -> Result<License, StoreError> {
        let mut licenses = self.licenses.lock().expect("store mutex poisoned");
        if licenses.contains_key(&license.id.0) {
            return Err(StoreError::Conflict);
        }
        licenses.insert(license.id.0, license.clone());
        Ok(license)
    }

    fn fetch_license(&self, id: LicenseId) -> Result<Option<License>, StoreError> {
        let licenses = self.licenses.lock().expect("store mutex poisoned");
        Ok(licenses.get(&id.0).cloned())
    }

    fn license_by_application(&self, id: ApplicationId) -> Result<Option<License>, StoreError> {
        let licenses = self.licenses.lock().expect("store mutex poisoned");
        Ok(licenses
            .values()
            .find(|license| license.application_id == id)
            .cloned())
    }

    fn license_by_number(&self, number: &str) -> Result<Option<License>, StoreError> {
        let licenses = self.licenses.lock().expect("store mutex poisoned");
        Ok(licenses
            .values()
            .find(|license| license.license_number == number)
            .cloned())
    }

    fn update_license(&self, license: License) -> Result<(), StoreError> {
        let mut licenses = self.licenses.lock().expect("store mutex poisoned");
        licenses.insert(license.id.0, license);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    facilities: Mutex<HashMap<i64, Facility>>,
}

impl MemoryDirectory {
    pub(super) fn seed(&self, facility: Facility) {
        self.facilities
            .lock()
            .expect("directory mutex poisoned")
            .insert(facility.id.0, facility);
    }
}

impl FacilityDirectory for MemoryDirectory {
    fn insert(&self, facility: Facility) -> Result<Facility, StoreError> {
        let mut facilities = self.facilities.lock().expect("directory mutex poisoned");
        if facilities.contains_key(&facility.id.0) {
            return Err(StoreError::Conflict);
        }
        facilities.insert(facility.id.0, facility.clone());
        Ok(facility)
    }

    fn fetch(&self, id: FacilityId) -> Result<Option<Facility>, StoreError> {
        let facilities = self.facilities.lock().expect("directory mutex poisoned");
        Ok(facilities.get(&id.0).cloned())
    }

    fn update(&self, facility: Facility) -> Result<(), StoreError> {
        let mut facilities = self.facilities.lock().expect("directory mutex poisoned");
        facilities.insert(facility.id.0, facility);
        Ok(())
    }

    fn find_by_kind(&self, kind: FacilityKind) -> Result<Vec<Facility>, StoreError> {
        let facilities = self.facilities.lock().expect("directory mutex poisoned");
        let mut found: Vec<Facility> = facilities
            .values()
            .filter(|facility| facility.kind == kind)
            .cloned()
            .collect();
        found.sort_by_key(|facility| facility.id);
        Ok(found)
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    sent: Mutex<Vec<(FacilityUserId, NotificationMessage)>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<(FacilityUserId, NotificationMessage)> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationSink for MemoryNotifier {
    fn notify(
        &self,
        recipient: FacilityUserId,
        message: NotificationMessage,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push((recipient, message));
        Ok(())
    }
}

/// Drops every message; transitions must still succeed.
pub(super) struct FailingNotifier;

impl NotificationSink for FailingNotifier {
    fn notify(
        &self,
        _recipient: FacilityUserId,
        _message: NotificationMessage,
    ) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("sms gateway offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }

    pub(super) fn actions(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|entry| entry.action)
            .collect()
    }
}

impl AuditSink for MemoryAudit {
    fn log(&self, entry: AuditEntry) {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
    }
}
