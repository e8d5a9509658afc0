//! The application state machine. All status mutations run through this
//! service: forward motion follows the step map, rejection is the single
//! absorbing jump, and the three side-effect-gated statuses can only be
//! left through their gate-release operations. Each transition commits the
//! status change, its ledger entry, and any issued license as one atomic
//! unit; notification dispatch is fire-and-forget.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{Local, Utc};
use tracing::warn;

use super::domain::{
    Actor, AdminId, Application, ApplicationId, ApplicationStatus, DraftRequest, FacilityId,
    FacilityUserId, License, NotificationMessage, StepCode, StepEntry, StepState,
};
use super::issuer::{self, Issued, LicenseError};
use super::repository::{
    ApplicationView, AuditEntry, AuditSink, NotificationSink, StepView, StoreError,
    TransitionCommit, WorkflowStore,
};
use super::steps::{self, StepMapError};

static APPLICATION_SEQUENCE: AtomicI64 = AtomicI64::new(1);

fn next_application_id() -> ApplicationId {
    ApplicationId(APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("application {} not found", .0 .0)]
    NotFound(ApplicationId),
    #[error("cannot {action} from status {}", .from.as_str())]
    InvalidTransition {
        from: ApplicationStatus,
        action: &'static str,
    },
    #[error(
        "cannot manually advance from {}: {required_action} first",
        .status.as_str()
    )]
    ManualAdvanceForbidden {
        status: ApplicationStatus,
        required_action: &'static str,
    },
    #[error("a rejection reason is required")]
    MissingReason,
    #[error(transparent)]
    StepMap(#[from] StepMapError),
    #[error(transparent)]
    License(#[from] LicenseError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The external action that must happen before a gated status can move on.
fn gate_release(status: ApplicationStatus) -> Option<&'static str> {
    match status {
        ApplicationStatus::InspectionScheduled => Some("complete the scheduled inspection"),
        ApplicationStatus::CommitteeApproved => Some("generate a payment order"),
        ApplicationStatus::PaymentPending => Some("confirm the electronic payment"),
        _ => None,
    }
}

/// Workflow service over a store, a notification sink, and an audit sink.
pub struct LicensingService<S, N, A> {
    store: Arc<S>,
    notifier: Arc<N>,
    audit: Arc<A>,
}

impl<S, N, A> LicensingService<S, N, A>
where
    S: WorkflowStore,
    N: NotificationSink,
    A: AuditSink,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, audit: Arc<A>) -> Self {
        Self {
            store,
            notifier,
            audit,
        }
    }

    /// Create an application in DRAFT with its first ledger entry.
    pub fn create_draft(
        &self,
        facility_id: FacilityId,
        user_id: FacilityUserId,
        request: DraftRequest,
    ) -> Result<ApplicationView, WorkflowError> {
        let id = next_application_id();
        let application = Application {
            id,
            application_number: format!("APP-{:08}", id.0),
            facility_id,
            submitted_by: user_id,
            status: ApplicationStatus::Draft,
            license_type: request.license_type,
            facility_kind: request.facility_kind,
            supervisor: request.supervisor,
            prior_license: request.prior_license,
            created_at: Utc::now(),
            submitted_at: None,
            approved_at: None,
            rejected_at: None,
            rejection_reason: None,
            version: 0,
        };

        let first_step = StepEntry {
            application_id: id,
            step_order: 1,
            step_code: StepCode::Draft,
            state: StepState::Completed,
            performed_by: Actor::FacilityUser(user_id),
            performed_at: Utc::now(),
            notes: Some("Application created as draft".to_string()),
        };

        let stored = self.store.insert_application(application, first_step)?;

        self.audit.log(AuditEntry {
            actor: Actor::FacilityUser(user_id),
            action: "CREATE_APPLICATION".to_string(),
            entity_type: "APPLICATION".to_string(),
            entity_id: stored.id.0,
            detail: format!("Draft application created: {}", stored.application_number),
        });

        self.view(&stored)
    }

    /// Submit a draft for review. Legal only from DRAFT.
    pub fn submit(
        &self,
        application_id: ApplicationId,
        user_id: FacilityUserId,
    ) -> Result<ApplicationView, WorkflowError> {
        let mut application = self.load(application_id)?;

        if application.status != ApplicationStatus::Draft {
            return Err(WorkflowError::InvalidTransition {
                from: application.status,
                action: "submit",
            });
        }

        application.status = ApplicationStatus::Submitted;
        application.submitted_at = Some(Utc::now());
        application.version += 1;

        let step = self.step_for_status(
            &application,
            Actor::FacilityUser(user_id),
            Some("Application submitted for review".to_string()),
        )?;

        self.store.commit_transition(TransitionCommit {
            application: application.clone(),
            step: Some(step),
            license: None,
        })?;

        self.audit.log(AuditEntry {
            actor: Actor::FacilityUser(user_id),
            action: "SUBMIT_APPLICATION".to_string(),
            entity_type: "APPLICATION".to_string(),
            entity_id: application.id.0,
            detail: format!("Application submitted: {}", application.application_number),
        });

        self.dispatch(
            &application,
            NotificationMessage::submitted(&application.application_number),
        );

        self.view(&application)
    }

    /// Advance one stage along the step map. Refused from the three
    /// side-effect-gated statuses and from terminal ones. Reaching
    /// LICENSE_ISSUED triggers license issuance within the same commit.
    pub fn advance(
        &self,
        application_id: ApplicationId,
        admin_id: AdminId,
        notes: Option<String>,
    ) -> Result<ApplicationView, WorkflowError> {
        let mut application = self.load(application_id)?;
        let current = application.status;

        if current.is_terminal() {
            return Err(WorkflowError::InvalidTransition {
                from: current,
                action: "advance",
            });
        }

        if let Some(required_action) = gate_release(current) {
            return Err(WorkflowError::ManualAdvanceForbidden {
                status: current,
                required_action,
            });
        }

        let next = steps::next_step(current)?;
        application.status = steps::status_for(next);
        application.version += 1;

        let license = if application.status == ApplicationStatus::LicenseIssued {
            application.approved_at = Some(Utc::now());
            self.issuance_payload(&application)?
        } else {
            None
        };

        let step = self.step_for_status(&application, Actor::Admin(admin_id), notes)?;

        self.store.commit_transition(TransitionCommit {
            application: application.clone(),
            step: Some(step),
            license,
        })?;

        self.audit.log(AuditEntry {
            actor: Actor::Admin(admin_id),
            action: "ADVANCE_WORKFLOW".to_string(),
            entity_type: "APPLICATION".to_string(),
            entity_id: application.id.0,
            detail: format!("Advanced to: {}", next.as_str()),
        });

        match application.status {
            ApplicationStatus::CommitteeApproved => {
                self.dispatch(&application, NotificationMessage::committee_approved());
            }
            ApplicationStatus::LicenseIssued => {
                self.dispatch(&application, NotificationMessage::license_issued());
            }
            _ => {}
        }

        self.view(&application)
    }

    /// Reject from any non-terminal status. Absorbing; no step code exists
    /// for rejection, so the ledger keeps only the path walked so far.
    pub fn reject(
        &self,
        application_id: ApplicationId,
        admin_id: AdminId,
        reason: &str,
    ) -> Result<ApplicationView, WorkflowError> {
        if reason.trim().is_empty() {
            return Err(WorkflowError::MissingReason);
        }

        let mut application = self.load(application_id)?;

        if application.status.is_terminal() {
            return Err(WorkflowError::InvalidTransition {
                from: application.status,
                action: "reject",
            });
        }

        application.status = ApplicationStatus::Rejected;
        application.rejected_at = Some(Utc::now());
        application.rejection_reason = Some(reason.to_string());
        application.version += 1;

        self.store.commit_transition(TransitionCommit {
            application: application.clone(),
            step: None,
            license: None,
        })?;

        self.audit.log(AuditEntry {
            actor: Actor::Admin(admin_id),
            action: "REJECT_APPLICATION".to_string(),
            entity_type: "APPLICATION".to_string(),
            entity_id: application.id.0,
            detail: format!("Rejected: {reason}"),
        });

        self.dispatch(&application, NotificationMessage::rejected(reason));

        self.view(&application)
    }

    /// Gate release: the inspection subsystem filed its report.
    pub fn record_inspection_report(
        &self,
        application_id: ApplicationId,
        admin_id: AdminId,
        notes: Option<String>,
    ) -> Result<ApplicationView, WorkflowError> {
        self.gate_transition(
            application_id,
            ApplicationStatus::InspectionScheduled,
            ApplicationStatus::InspectionCompleted,
            Actor::Admin(admin_id),
            notes,
            "record an inspection report",
            "RECORD_INSPECTION",
            None,
        )
    }

    /// Gate release: a payment order was generated for the applicant.
    pub fn record_payment_order(
        &self,
        application_id: ApplicationId,
        admin_id: AdminId,
        reference: &str,
    ) -> Result<ApplicationView, WorkflowError> {
        self.gate_transition(
            application_id,
            ApplicationStatus::CommitteeApproved,
            ApplicationStatus::PaymentPending,
            Actor::Admin(admin_id),
            Some(format!("Payment order {reference}")),
            "create a payment order",
            "CREATE_PAYMENT",
            Some(NotificationMessage::payment_order(reference)),
        )
    }

    /// Gate release: the payment gateway confirmed settlement.
    pub fn record_payment_confirmation(
        &self,
        application_id: ApplicationId,
        reference: &str,
        channel: &str,
    ) -> Result<ApplicationView, WorkflowError> {
        self.gate_transition(
            application_id,
            ApplicationStatus::PaymentPending,
            ApplicationStatus::PaymentCompleted,
            Actor::System,
            Some(format!("Payment {reference} confirmed via {channel}")),
            "confirm a payment",
            "CONFIRM_PAYMENT",
            Some(NotificationMessage::payment_confirmed()),
        )
    }

    /// Application view with ledger and license for API responses.
    pub fn get(&self, application_id: ApplicationId) -> Result<ApplicationView, WorkflowError> {
        let application = self.load(application_id)?;
        self.view(&application)
    }

    pub fn steps(&self, application_id: ApplicationId) -> Result<Vec<StepView>, WorkflowError> {
        let entries = self.store.steps(application_id)?;
        Ok(entries.iter().map(StepView::from).collect())
    }

    pub fn list_by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationView>, WorkflowError> {
        let applications = self.store.applications_by_status(status)?;
        applications
            .iter()
            .map(|application| self.view(application))
            .collect()
    }

    pub fn list_by_facility(
        &self,
        facility_id: FacilityId,
    ) -> Result<Vec<ApplicationView>, WorkflowError> {
        let applications = self.store.applications_by_facility(facility_id)?;
        applications
            .iter()
            .map(|application| self.view(application))
            .collect()
    }

    fn load(&self, application_id: ApplicationId) -> Result<Application, WorkflowError> {
        self.store
            .fetch_application(application_id)?
            .ok_or(WorkflowError::NotFound(application_id))
    }

    /// Ledger entry for the step that produced the application's current
    /// status; order = map index + 1, so orders stay strictly increasing.
    fn step_for_status(
        &self,
        application: &Application,
        actor: Actor,
        notes: Option<String>,
    ) -> Result<StepEntry, WorkflowError> {
        let index = steps::index_of(application.status)?;
        Ok(StepEntry {
            application_id: application.id,
            step_order: steps::step_order(index),
            step_code: steps::step_for(application.status)?,
            state: StepState::Completed,
            performed_by: actor,
            performed_at: Utc::now(),
            notes,
        })
    }

    fn issuance_payload(
        &self,
        application: &Application,
    ) -> Result<Option<License>, WorkflowError> {
        let today = Local::now().date_naive();
        match issuer::prepare(self.store.as_ref(), application, today)? {
            Issued::New(license) => Ok(Some(license)),
            Issued::Existing(_) => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn gate_transition(
        &self,
        application_id: ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
        actor: Actor,
        notes: Option<String>,
        action: &'static str,
        audit_action: &str,
        notification: Option<NotificationMessage>,
    ) -> Result<ApplicationView, WorkflowError> {
        let mut application = self.load(application_id)?;

        if application.status != expected {
            return Err(WorkflowError::InvalidTransition {
                from: application.status,
                action,
            });
        }

        application.status = next;
        application.version += 1;

        let step = self.step_for_status(&application, actor, notes)?;

        self.store.commit_transition(TransitionCommit {
            application: application.clone(),
            step: Some(step),
            license: None,
        })?;

        self.audit.log(AuditEntry {
            actor,
            action: audit_action.to_string(),
            entity_type: "APPLICATION".to_string(),
            entity_id: application.id.0,
            detail: format!("Status changed to: {}", next.as_str()),
        });

        if let Some(message) = notification {
            self.dispatch(&application, message);
        }

        self.view(&application)
    }

    fn view(&self, application: &Application) -> Result<ApplicationView, WorkflowError> {
        let entries = self.store.steps(application.id)?;
        let license = self.store.license_by_application(application.id)?;
        Ok(ApplicationView::assemble(
            application,
            &entries,
            license.as_ref(),
        ))
    }

    fn dispatch(&self, application: &Application, message: NotificationMessage) {
        if let Err(err) = self.notifier.notify(application.submitted_by, message) {
            warn!(
                application = application.id.0,
                error = %err,
                "workflow notification dropped"
            );
        }
    }
}
