use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    AdminId, ApplicationId, Coordinates, DraftRequest, FacilityId, FacilityRegistration,
    FacilityUserId, LicenseId, OperationalStatus,
};
use super::facilities::{FacilityError, FacilityService};
use super::geo::GeoError;
use super::issuer::{LicenseError, LicenseIssuer};
use super::machine::{LicensingService, WorkflowError};
use super::repository::{AuditSink, FacilityDirectory, NotificationSink, StoreError, WorkflowStore};

/// Shared handler state bundling the three engine services.
pub struct LicensingState<S, N, A, F> {
    pub workflow: LicensingService<S, N, A>,
    pub issuer: LicenseIssuer<S, N, A>,
    pub facilities: FacilityService<F, A>,
}

/// Router builder exposing the engine operations over HTTP.
pub fn licensing_router<S, N, A, F>(state: Arc<LicensingState<S, N, A, F>>) -> Router
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    Router::new()
        .route(
            "/api/v1/licensing/facilities",
            post(create_facility::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/facilities/:facility_id/location",
            put(update_location::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/facilities/:facility_id/status",
            put(update_operational_status::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/applications",
            post(create_draft::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/applications/:application_id",
            get(get_application::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/applications/:application_id/submit",
            post(submit::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/applications/:application_id/advance",
            post(advance::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/applications/:application_id/reject",
            post(reject::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/applications/:application_id/inspection-report",
            post(record_inspection_report::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/applications/:application_id/payment-order",
            post(record_payment_order::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/applications/:application_id/payment-confirmation",
            post(record_payment_confirmation::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/applications/:application_id/license",
            post(issue_license::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/licenses/:license_id/reprint",
            post(reprint_license::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/licenses/:license_id/invalidate",
            post(invalidate_license::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/licenses/:license_id/dates",
            put(update_license_dates::<S, N, A, F>),
        )
        .route(
            "/api/v1/licensing/licenses/verify/:license_number",
            get(verify_license::<S, N, A, F>),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CreateFacilityRequest {
    admin_id: AdminId,
    #[serde(flatten)]
    registration: FacilityRegistration,
}

#[derive(Debug, Deserialize)]
struct LocationRequest {
    admin_id: AdminId,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct OperationalStatusRequest {
    admin_id: AdminId,
    status: OperationalStatus,
}

#[derive(Debug, Deserialize)]
struct CreateDraftRequest {
    facility_id: FacilityId,
    user_id: FacilityUserId,
    #[serde(flatten)]
    draft: DraftRequest,
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    user_id: FacilityUserId,
}

#[derive(Debug, Deserialize)]
struct AdvanceRequest {
    admin_id: AdminId,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReasonRequest {
    admin_id: AdminId,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct InspectionReportRequest {
    admin_id: AdminId,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentOrderRequest {
    admin_id: AdminId,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct PaymentConfirmationRequest {
    reference: String,
    channel: String,
}

#[derive(Debug, Deserialize)]
struct AdminOnlyRequest {
    admin_id: AdminId,
}

#[derive(Debug, Deserialize)]
struct LicenseDatesRequest {
    admin_id: AdminId,
    issue_date: NaiveDate,
    expiry_date: NaiveDate,
}

type SharedState<S, N, A, F> = State<Arc<LicensingState<S, N, A, F>>>;

async fn create_facility<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Json(payload): Json<CreateFacilityRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state
        .facilities
        .create(payload.registration, payload.admin_id)
    {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(err) => facility_error(err),
    }
}

async fn update_location<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(facility_id): Path<i64>,
    Json(payload): Json<LocationRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    let coordinates = Coordinates {
        latitude: payload.latitude,
        longitude: payload.longitude,
    };
    match state
        .facilities
        .update_location(FacilityId(facility_id), coordinates, payload.admin_id)
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => facility_error(err),
    }
}

async fn update_operational_status<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(facility_id): Path<i64>,
    Json(payload): Json<OperationalStatusRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state.facilities.update_operational_status(
        FacilityId(facility_id),
        payload.status,
        payload.admin_id,
    ) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => facility_error(err),
    }
}

async fn create_draft<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Json(payload): Json<CreateDraftRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state
        .workflow
        .create_draft(payload.facility_id, payload.user_id, payload.draft)
    {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(err) => workflow_error(err),
    }
}

async fn get_application<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(application_id): Path<i64>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state.workflow.get(ApplicationId(application_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => workflow_error(err),
    }
}

async fn submit<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(application_id): Path<i64>,
    Json(payload): Json<SubmitRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state
        .workflow
        .submit(ApplicationId(application_id), payload.user_id)
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => workflow_error(err),
    }
}

async fn advance<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(application_id): Path<i64>,
    Json(payload): Json<AdvanceRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state.workflow.advance(
        ApplicationId(application_id),
        payload.admin_id,
        payload.notes,
    ) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => workflow_error(err),
    }
}

async fn reject<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(application_id): Path<i64>,
    Json(payload): Json<ReasonRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state.workflow.reject(
        ApplicationId(application_id),
        payload.admin_id,
        &payload.reason,
    ) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => workflow_error(err),
    }
}

async fn record_inspection_report<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(application_id): Path<i64>,
    Json(payload): Json<InspectionReportRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state.workflow.record_inspection_report(
        ApplicationId(application_id),
        payload.admin_id,
        payload.notes,
    ) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => workflow_error(err),
    }
}

async fn record_payment_order<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(application_id): Path<i64>,
    Json(payload): Json<PaymentOrderRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state.workflow.record_payment_order(
        ApplicationId(application_id),
        payload.admin_id,
        &payload.reference,
    ) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => workflow_error(err),
    }
}

async fn record_payment_confirmation<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(application_id): Path<i64>,
    Json(payload): Json<PaymentConfirmationRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state.workflow.record_payment_confirmation(
        ApplicationId(application_id),
        &payload.reference,
        &payload.channel,
    ) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => workflow_error(err),
    }
}

async fn issue_license<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(application_id): Path<i64>,
    Json(payload): Json<AdminOnlyRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state
        .issuer
        .issue(ApplicationId(application_id), payload.admin_id)
    {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(err) => license_error(err),
    }
}

async fn reprint_license<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(license_id): Path<i64>,
    Json(payload): Json<AdminOnlyRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state
        .issuer
        .reprint(LicenseId(license_id), payload.admin_id)
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => license_error(err),
    }
}

async fn invalidate_license<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(license_id): Path<i64>,
    Json(payload): Json<ReasonRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state
        .issuer
        .invalidate(LicenseId(license_id), payload.admin_id, &payload.reason)
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => license_error(err),
    }
}

async fn update_license_dates<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(license_id): Path<i64>,
    Json(payload): Json<LicenseDatesRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state.issuer.update_dates(
        LicenseId(license_id),
        payload.admin_id,
        payload.issue_date,
        payload.expiry_date,
    ) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => license_error(err),
    }
}

async fn verify_license<S, N, A, F>(
    State(state): SharedState<S, N, A, F>,
    Path(license_number): Path<String>,
) -> Response
where
    S: WorkflowStore + 'static,
    N: NotificationSink + 'static,
    A: AuditSink + 'static,
    F: FacilityDirectory + 'static,
{
    match state.issuer.verify(&license_number) {
        Ok(verification) => (StatusCode::OK, Json(verification)).into_response(),
        Err(err) => license_error(err),
    }
}

fn error_body(status: StatusCode, err: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn workflow_error(err: WorkflowError) -> Response {
    let status = match &err {
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::MissingReason => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::InvalidTransition { .. }
        | WorkflowError::ManualAdvanceForbidden { .. }
        | WorkflowError::StepMap(_) => StatusCode::CONFLICT,
        WorkflowError::License(inner) => return license_error_ref(inner, err.to_string()),
        WorkflowError::Store(StoreError::VersionConflict { .. }) => StatusCode::CONFLICT,
        WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_body(status, err)
}

fn license_error(err: LicenseError) -> Response {
    let message = err.to_string();
    license_error_ref(&err, message)
}

fn license_error_ref(err: &LicenseError, message: String) -> Response {
    let status = match err {
        LicenseError::NotFound | LicenseError::ApplicationNotFound(_) => StatusCode::NOT_FOUND,
        LicenseError::MissingReason | LicenseError::InvalidDateRange { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LicenseError::NotIssuable(_) => StatusCode::CONFLICT,
        LicenseError::Store(StoreError::VersionConflict { .. }) => StatusCode::CONFLICT,
        LicenseError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": message }))).into_response()
}

fn facility_error(err: FacilityError) -> Response {
    let status = match &err {
        FacilityError::NotFound(_) => StatusCode::NOT_FOUND,
        FacilityError::Location(GeoError::LocationTooClose { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        FacilityError::Location(GeoError::Store(_)) | FacilityError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_body(status, err)
}
