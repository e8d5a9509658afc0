use std::sync::Arc;

use chrono::{Datelike, Local, Months};

use super::common::{
    admin, applicant, draft_request, harness, issued_application, paid_application,
    submitted_application, FailingNotifier, MemoryAudit, MemoryStore,
};
use crate::workflows::licensing::domain::{
    Actor, ApplicationId, ApplicationStatus, FacilityId, StepCode, StepState,
};
use crate::workflows::licensing::machine::{LicensingService, WorkflowError};

#[test]
fn draft_opens_the_ledger_with_one_completed_entry() {
    let harness = harness();
    let view = harness
        .workflow
        .create_draft(FacilityId(1), applicant(), draft_request())
        .expect("draft creation succeeds");

    assert_eq!(view.status, ApplicationStatus::Draft);
    assert!(view.application_number.starts_with("APP-"));
    assert_eq!(view.steps.len(), 1);
    assert_eq!(view.steps[0].step_order, 1);
    assert_eq!(view.steps[0].step_code, StepCode::Draft);
    assert_eq!(view.steps[0].state, StepState::Completed);
    assert_eq!(view.steps[0].performed_by, Actor::FacilityUser(applicant()));
}

#[test]
fn submit_is_legal_only_from_draft() {
    let harness = harness();
    let view = submitted_application(&harness);
    assert_eq!(view.status, ApplicationStatus::Submitted);
    assert_eq!(view.steps.len(), 2);
    assert_eq!(view.steps[1].step_code, StepCode::Submit);

    match harness.workflow.submit(view.id, applicant()) {
        Err(WorkflowError::InvalidTransition {
            from: ApplicationStatus::Submitted,
            action: "submit",
        }) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn advance_walks_the_map_one_stage_at_a_time() {
    let harness = harness();
    let view = submitted_application(&harness);

    let view = harness
        .workflow
        .advance(view.id, admin(), Some("Documents verified".to_string()))
        .expect("advance succeeds");

    assert_eq!(view.status, ApplicationStatus::UnderReview);
    assert_eq!(view.steps.len(), 3);
    let last = view.steps.last().expect("ledger entry appended");
    assert_eq!(last.step_order, 3);
    assert_eq!(last.step_code, StepCode::LicensingReview);
    assert_eq!(last.performed_by, Actor::Admin(admin()));
    assert_eq!(last.notes.as_deref(), Some("Documents verified"));
}

#[test]
fn gated_statuses_refuse_manual_advance() {
    let harness = harness();
    let view = submitted_application(&harness);
    let id = view.id;

    for _ in 0..3 {
        harness.workflow.advance(id, admin(), None).expect("advance");
    }
    // Now at INSPECTION_SCHEDULED, the first gate.
    match harness.workflow.advance(id, admin(), None) {
        Err(WorkflowError::ManualAdvanceForbidden {
            status: ApplicationStatus::InspectionScheduled,
            ..
        }) => {}
        other => panic!("expected gate refusal, got {other:?}"),
    }

    harness
        .workflow
        .record_inspection_report(id, admin(), None)
        .expect("gate releases");
    harness.workflow.advance(id, admin(), None).expect("advance");

    // COMMITTEE_APPROVED gates on the payment order.
    match harness.workflow.advance(id, admin(), None) {
        Err(WorkflowError::ManualAdvanceForbidden {
            status: ApplicationStatus::CommitteeApproved,
            ..
        }) => {}
        other => panic!("expected gate refusal, got {other:?}"),
    }

    harness
        .workflow
        .record_payment_order(id, admin(), "PO-1")
        .expect("gate releases");

    // PAYMENT_PENDING gates on the gateway confirmation.
    match harness.workflow.advance(id, admin(), None) {
        Err(WorkflowError::ManualAdvanceForbidden {
            status: ApplicationStatus::PaymentPending,
            ..
        }) => {}
        other => panic!("expected gate refusal, got {other:?}"),
    }
}

#[test]
fn gate_releases_record_their_actors() {
    let harness = harness();
    let view = paid_application(&harness);

    let inspection = view
        .steps
        .iter()
        .find(|step| step.step_code == StepCode::InspectionReport)
        .expect("inspection entry present");
    assert_eq!(inspection.performed_by, Actor::Admin(admin()));

    let payment = view
        .steps
        .iter()
        .find(|step| step.step_code == StepCode::ElectronicPayment)
        .expect("payment entry present");
    assert_eq!(payment.performed_by, Actor::System);
    assert!(payment
        .notes
        .as_deref()
        .is_some_and(|notes| notes.contains("PO-TEST-01")));
}

#[test]
fn gate_release_from_wrong_status_is_refused() {
    let harness = harness();
    let view = submitted_application(&harness);

    match harness
        .workflow
        .record_payment_confirmation(view.id, "PO-9", "gateway")
    {
        Err(WorkflowError::InvalidTransition {
            from: ApplicationStatus::Submitted,
            ..
        }) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn rejection_requires_a_reason_and_appends_no_step() {
    let harness = harness();
    let view = submitted_application(&harness);

    match harness.workflow.reject(view.id, admin(), "   ") {
        Err(WorkflowError::MissingReason) => {}
        other => panic!("expected missing reason, got {other:?}"),
    }

    let rejected = harness
        .workflow
        .reject(view.id, admin(), "Incomplete documents")
        .expect("rejection succeeds");
    assert_eq!(rejected.status, ApplicationStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Incomplete documents"));
    assert!(rejected.rejected_at.is_some());
    // The ledger keeps only the path walked so far.
    assert_eq!(rejected.steps.len(), view.steps.len());
}

#[test]
fn terminal_applications_accept_nothing_further() {
    let harness = harness();
    let view = submitted_application(&harness);
    harness
        .workflow
        .reject(view.id, admin(), "Withdrawn by applicant")
        .expect("rejection succeeds");

    match harness.workflow.advance(view.id, admin(), None) {
        Err(WorkflowError::InvalidTransition {
            from: ApplicationStatus::Rejected,
            ..
        }) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
    match harness.workflow.reject(view.id, admin(), "again") {
        Err(WorkflowError::InvalidTransition { .. }) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn reaching_issuance_creates_the_license_in_the_same_commit() {
    let harness = harness();
    let view = issued_application(&harness);

    assert_eq!(view.status, ApplicationStatus::LicenseIssued);
    let license = view.license.expect("license attached");
    assert_eq!(
        license.license_number,
        format!("LIC-{}-{:05}", Local::now().year(), view.id.0)
    );
    assert_eq!(
        license.expiry_date,
        license
            .issue_date
            .checked_add_months(Months::new(12))
            .expect("expiry computes")
    );
    assert_eq!(harness.store.license_count(), 1);

    // Ten entries: draft through issuance, orders strictly increasing.
    assert_eq!(view.steps.len(), 10);
    assert!(view
        .steps
        .windows(2)
        .all(|pair| pair[0].step_order < pair[1].step_order));
}

#[test]
fn archiving_closes_the_full_path_with_eleven_entries() {
    let harness = harness();
    let view = issued_application(&harness);

    let archived = harness
        .workflow
        .advance(view.id, admin(), None)
        .expect("advance to archive");

    assert_eq!(archived.status, ApplicationStatus::Archived);
    assert_eq!(archived.steps.len(), 11);
    for (index, step) in archived.steps.iter().enumerate() {
        assert_eq!(step.step_order, index as u32 + 1);
    }
    assert_eq!(
        archived.steps.last().expect("archive entry").step_code,
        StepCode::Archive
    );
    assert_eq!(harness.store.license_count(), 1);

    match harness.workflow.advance(archived.id, admin(), None) {
        Err(WorkflowError::InvalidTransition {
            from: ApplicationStatus::Archived,
            ..
        }) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
    match harness.workflow.reject(archived.id, admin(), "too late") {
        Err(WorkflowError::InvalidTransition { .. }) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn full_run_notifies_the_applicant_at_each_milestone() {
    let harness = harness();
    issued_application(&harness);

    let sent = harness.notifier.sent();
    let titles: Vec<&str> = sent
        .iter()
        .map(|(_, message)| message.title_en.as_str())
        .collect();
    assert_eq!(
        titles,
        vec![
            "Application Submitted Successfully",
            "Committee Approved",
            "Payment Order Created",
            "Payment Confirmed",
            "License Issued",
        ]
    );
    assert!(sent.iter().all(|(recipient, _)| *recipient == applicant()));
}

#[test]
fn notification_failures_never_fail_the_transition() {
    let store = Arc::new(MemoryStore::default());
    let audit = Arc::new(MemoryAudit::default());
    let workflow = LicensingService::new(store, Arc::new(FailingNotifier), audit);

    let draft = workflow
        .create_draft(FacilityId(1), applicant(), draft_request())
        .expect("draft creation succeeds");
    let view = workflow
        .submit(draft.id, applicant())
        .expect("submission survives a dead notifier");
    assert_eq!(view.status, ApplicationStatus::Submitted);
}

#[test]
fn every_mutation_is_audited() {
    let harness = harness();
    issued_application(&harness);

    let actions = harness.audit.actions();
    assert_eq!(actions[0], "CREATE_APPLICATION");
    assert_eq!(actions[1], "SUBMIT_APPLICATION");
    assert!(actions.contains(&"RECORD_INSPECTION".to_string()));
    assert!(actions.contains(&"CREATE_PAYMENT".to_string()));
    assert!(actions.contains(&"CONFIRM_PAYMENT".to_string()));
    assert_eq!(
        actions
            .iter()
            .filter(|action| *action == "ADVANCE_WORKFLOW")
            .count(),
        5
    );
}

#[test]
fn unknown_applications_report_not_found() {
    let harness = harness();
    match harness.workflow.advance(ApplicationId(999_999), admin(), None) {
        Err(WorkflowError::NotFound(ApplicationId(999_999))) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn listings_filter_by_status_and_facility() {
    let harness = harness();
    let first = submitted_application(&harness);
    let second = harness
        .workflow
        .create_draft(FacilityId(2), applicant(), draft_request())
        .expect("second draft");

    let submitted = harness
        .workflow
        .list_by_status(ApplicationStatus::Submitted)
        .expect("listing loads");
    assert!(submitted.iter().any(|view| view.id == first.id));
    assert!(submitted.iter().all(|view| view.id != second.id));

    let by_facility = harness
        .workflow
        .list_by_facility(FacilityId(2))
        .expect("listing loads");
    assert_eq!(by_facility.len(), 1);
    assert_eq!(by_facility[0].id, second.id);
}
