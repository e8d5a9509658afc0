//! License issuance and lifecycle. Issuance proper is triggered by the
//! workflow reaching LICENSE_ISSUED and is idempotent: replays of the
//! trigger return the license already on file. The remaining operations
//! (reprint, invalidate, date updates, public verification) live outside
//! the state machine but share the same invariants.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{Datelike, Local, Months, NaiveDate, Utc};
use tracing::warn;

use super::domain::{
    Actor, AdminId, Application, ApplicationId, ApplicationStatus, License, LicenseId,
    LicenseStatus, NotificationMessage,
};
use super::repository::{
    AuditEntry, AuditSink, LicenseVerification, LicenseView, NotificationSink, StoreError,
    WorkflowStore,
};

static LICENSE_SEQUENCE: AtomicI64 = AtomicI64::new(1);

fn next_license_id() -> LicenseId {
    LicenseId(LICENSE_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, thiserror::Error)]
pub enum LicenseError {
    #[error("license not found")]
    NotFound,
    #[error("application {} not found", .0 .0)]
    ApplicationNotFound(ApplicationId),
    #[error(
        "license can only be generated after payment completion or issuance, current status {}",
        .0.as_str()
    )]
    NotIssuable(ApplicationStatus),
    #[error("a reason is required")]
    MissingReason,
    #[error("expiry date {expiry} must be after issue date {issue}")]
    InvalidDateRange { issue: NaiveDate, expiry: NaiveDate },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// License number format: `LIC-<year>-<application id zero-padded to 5>`.
pub fn license_number(application: ApplicationId, year: i32) -> String {
    format!("LIC-{year}-{:05}", application.0)
}

/// Reference under which the printable license artifact is filed.
pub fn document_ref(license_number: &str) -> String {
    format!("LICENSE_{}.html", license_number.replace('-', "_"))
}

/// Outcome of an issuance trigger.
#[derive(Debug, Clone)]
pub enum Issued {
    /// An active license was already on file; returned unchanged.
    Existing(License),
    /// A freshly built license, not yet persisted. The caller commits it
    /// inside the same atomic unit as the triggering transition.
    New(License),
}

/// Find-or-build for the issuance trigger. Never persists; the workflow
/// commit owns that so a failed transition cannot strand a license row.
pub(crate) fn prepare<S>(
    store: &S,
    application: &Application,
    today: NaiveDate,
) -> Result<Issued, LicenseError>
where
    S: WorkflowStore,
{
    if let Some(existing) = store.license_by_application(application.id)? {
        return Ok(Issued::Existing(existing));
    }

    let number = license_number(application.id, today.year());
    let expiry = today
        .checked_add_months(Months::new(12))
        .ok_or(LicenseError::InvalidDateRange {
            issue: today,
            expiry: today,
        })?;

    Ok(Issued::New(License {
        id: next_license_id(),
        application_id: application.id,
        license_number: number.clone(),
        issue_date: today,
        expiry_date: expiry,
        document_ref: document_ref(&number),
        status: LicenseStatus::Active,
        created_at: Utc::now(),
    }))
}

/// Service wrapping the out-of-band license operations.
pub struct LicenseIssuer<S, N, A> {
    store: Arc<S>,
    notifier: Arc<N>,
    audit: Arc<A>,
}

impl<S, N, A> LicenseIssuer<S, N, A>
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

    /// Issue (or re-fetch) the license for an application that has cleared
    /// payment. Idempotent on replays of the issuance trigger.
    pub fn issue(
        &self,
        application_id: ApplicationId,
        admin: AdminId,
    ) -> Result<LicenseView, LicenseError> {
        let application = self
            .store
            .fetch_application(application_id)?
            .ok_or(LicenseError::ApplicationNotFound(application_id))?;

        if !matches!(
            application.status,
            ApplicationStatus::LicenseIssued | ApplicationStatus::PaymentCompleted
        ) {
            return Err(LicenseError::NotIssuable(application.status));
        }

        let today = Local::now().date_naive();
        let license = match prepare(self.store.as_ref(), &application, today)? {
            Issued::Existing(license) => license,
            Issued::New(license) => {
                let license = self.store.insert_license(license)?;
                self.audit.log(AuditEntry {
                    actor: Actor::Admin(admin),
                    action: "ISSUE_LICENSE".to_string(),
                    entity_type: "LICENSE".to_string(),
                    entity_id: license.id.0,
                    detail: format!("License issued: {}", license.license_number),
                });
                self.dispatch(&application, NotificationMessage::license_issued());
                license
            }
        };

        Ok(LicenseView::from(&license))
    }

    /// Regenerate the printable artifact. Dates and status are untouched.
    pub fn reprint(&self, license_id: LicenseId, admin: AdminId) -> Result<LicenseView, LicenseError> {
        let mut license = self
            .store
            .fetch_license(license_id)?
            .ok_or(LicenseError::NotFound)?;

        license.document_ref = document_ref(&license.license_number);
        self.store.update_license(license.clone())?;

        self.audit.log(AuditEntry {
            actor: Actor::Admin(admin),
            action: "REPRINT_LICENSE".to_string(),
            entity_type: "LICENSE".to_string(),
            entity_id: license.id.0,
            detail: format!("License reprinted: {}", license.license_number),
        });

        Ok(LicenseView::from(&license))
    }

    /// Revoke a license. Irreversible; requires a stated reason.
    pub fn invalidate(
        &self,
        license_id: LicenseId,
        admin: AdminId,
        reason: &str,
    ) -> Result<LicenseView, LicenseError> {
        if reason.trim().is_empty() {
            return Err(LicenseError::MissingReason);
        }

        let mut license = self
            .store
            .fetch_license(license_id)?
            .ok_or(LicenseError::NotFound)?;

        license.status = LicenseStatus::Revoked;
        self.store.update_license(license.clone())?;

        self.audit.log(AuditEntry {
            actor: Actor::Admin(admin),
            action: "INVALIDATE_LICENSE".to_string(),
            entity_type: "LICENSE".to_string(),
            entity_id: license.id.0,
            detail: format!(
                "License revoked: {}. Reason: {reason}",
                license.license_number
            ),
        });

        if let Some(application) = self.store.fetch_application(license.application_id)? {
            self.dispatch(
                &application,
                NotificationMessage::license_revoked(&license.license_number, reason),
            );
        }

        Ok(LicenseView::from(&license))
    }

    /// Renewal/extension: replace both dates and reactivate the license.
    pub fn update_dates(
        &self,
        license_id: LicenseId,
        admin: AdminId,
        new_issue: NaiveDate,
        new_expiry: NaiveDate,
    ) -> Result<LicenseView, LicenseError> {
        if new_expiry <= new_issue {
            return Err(LicenseError::InvalidDateRange {
                issue: new_issue,
                expiry: new_expiry,
            });
        }

        let mut license = self
            .store
            .fetch_license(license_id)?
            .ok_or(LicenseError::NotFound)?;

        let previous_expiry = license.expiry_date;
        license.issue_date = new_issue;
        license.expiry_date = new_expiry;
        license.status = LicenseStatus::Active;
        license.document_ref = document_ref(&license.license_number);
        self.store.update_license(license.clone())?;

        self.audit.log(AuditEntry {
            actor: Actor::Admin(admin),
            action: "UPDATE_LICENSE".to_string(),
            entity_type: "LICENSE".to_string(),
            entity_id: license.id.0,
            detail: format!(
                "License updated: {} expiry {previous_expiry} -> {new_expiry}",
                license.license_number
            ),
        });

        Ok(LicenseView::from(&license))
    }

    /// Public verification lookup by license number.
    pub fn verify(&self, license_number: &str) -> Result<LicenseVerification, LicenseError> {
        let license = self
            .store
            .license_by_number(license_number)?
            .ok_or(LicenseError::NotFound)?;

        let application = self
            .store
            .fetch_application(license.application_id)?
            .ok_or(LicenseError::ApplicationNotFound(license.application_id))?;

        let today = Local::now().date_naive();
        Ok(LicenseVerification {
            license_number: license.license_number.clone(),
            application_number: application.application_number.clone(),
            facility_kind: application.facility_kind,
            status: license.status,
            issue_date: license.issue_date,
            expiry_date: license.expiry_date,
            is_valid: license.is_valid_on(today),
            supervisor_name: application.supervisor.name.clone(),
        })
    }

    fn dispatch(&self, application: &Application, message: NotificationMessage) {
        if let Err(err) = self.notifier.notify(application.submitted_by, message) {
            warn!(
                application = application.id.0,
                error = %err,
                "license notification dropped"
            );
        }
    }
}
