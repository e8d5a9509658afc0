use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use facility_licensing::config::AppConfig;
use facility_licensing::error::AppError;
use facility_licensing::telemetry;
use facility_licensing::workflows::licensing::{
    licensing_router, Actor, AdminId, Application, ApplicationId, ApplicationStatus, AuditEntry,
    AuditSink, Coordinates, DraftRequest, Facility, FacilityDirectory, FacilityId, FacilityKind,
    FacilityRegistration, FacilityService, FacilityUserId, License, LicenseId, LicenseIssuer,
    LicenseType, LicensingService, LicensingState, NotificationMessage, NotificationSink,
    NotifyError, StepEntry, StoreError, SupervisorDetails, TransitionCommit, WorkflowStore,
    DEFAULT_MIN_DISTANCE_METERS, WORKFLOW_STEPS,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: Arc<PrometheusHandle>,
}

#[derive(Parser, Debug)]
#[command(
    name = "Facility Licensing Service",
    about = "Run and demonstrate the health facility licensing workflow service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect and exercise the licensing workflow from the command line
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum WorkflowCommand {
    /// Walk a sample application end to end against in-memory infrastructure
    Demo(DemoArgs),
    /// Print the fixed step map in workflow order
    Steps,
}

#[derive(Args, Debug, Default)]
struct DemoArgs {
    /// Reject the application at licensing review instead of issuing
    #[arg(long)]
    reject: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Workflow {
            command: WorkflowCommand::Demo(args),
        } => run_demo(args),
        Command::Workflow {
            command: WorkflowCommand::Steps,
        } => {
            render_steps();
            Ok(())
        }
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(MemoryWorkflowStore::default());
    let directory = Arc::new(MemoryFacilityDirectory::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let audit = Arc::new(MemoryAudit::default());

    let state = Arc::new(LicensingState {
        workflow: LicensingService::new(store.clone(), notifier.clone(), audit.clone()),
        issuer: LicenseIssuer::new(store, notifier, audit.clone()),
        facilities: FacilityService::new(
            directory,
            audit,
            config.licensing.min_facility_distance_meters,
        ),
    });

    let app = licensing_router(state)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "facility licensing service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn render_steps() {
    println!("Licensing workflow step map");
    for (index, (step, status)) in WORKFLOW_STEPS.iter().enumerate() {
        println!(
            "{:>2}. {:<22} -> {}",
            index + 1,
            step.as_str(),
            status.as_str()
        );
    }
}

fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(MemoryWorkflowStore::default());
    let directory = Arc::new(MemoryFacilityDirectory::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let audit = Arc::new(MemoryAudit::default());

    let facilities = FacilityService::new(directory, audit.clone(), DEFAULT_MIN_DISTANCE_METERS);
    let workflow = LicensingService::new(store.clone(), notifier.clone(), audit.clone());
    let issuer = LicenseIssuer::new(store, notifier.clone(), audit.clone());

    let admin = AdminId(7);
    let applicant = FacilityUserId(501);

    println!("Facility licensing workflow demo");

    let facility = facilities.create(
        FacilityRegistration {
            name_ar: "مركز الشفاء الطبي".to_string(),
            name_en: Some("Al-Shifa Medical Center".to_string()),
            kind: FacilityKind::Center,
            district: Some("Al-Tahrir".to_string()),
            area: Some("Downtown".to_string()),
            street: Some("26 September St".to_string()),
            coordinates: Some(Coordinates {
                latitude: 15.3694,
                longitude: 44.1910,
            }),
            rooms_count: Some(12),
        },
        admin,
    )?;
    println!(
        "\nRegistered facility {} ({})",
        facility.facility_code, facility.name_ar
    );

    // A second center roughly 50 meters north must be refused.
    let crowded = facilities.create(
        FacilityRegistration {
            name_ar: "مركز منافس".to_string(),
            name_en: Some("Rival Center".to_string()),
            kind: FacilityKind::Center,
            district: None,
            area: None,
            street: None,
            coordinates: Some(Coordinates {
                latitude: 15.36985,
                longitude: 44.1910,
            }),
            rooms_count: None,
        },
        admin,
    );
    match crowded {
        Err(err) => println!("Proximity gate refused a rival center: {err}"),
        Ok(view) => println!("Unexpectedly registered {}", view.facility_code),
    }

    let draft = workflow.create_draft(
        facility.id,
        applicant,
        DraftRequest {
            license_type: LicenseType::New,
            facility_kind: FacilityKind::Center,
            supervisor: SupervisorDetails {
                name: Some("Dr. Ahmed Al-Hamdani".to_string()),
                qualification: Some("MBBS".to_string()),
                ..SupervisorDetails::default()
            },
            prior_license: None,
        },
    )?;
    println!(
        "\nDraft application {} created for facility {}",
        draft.application_number, facility.facility_code
    );

    let id = draft.id;
    let mut view = workflow.submit(id, applicant)?;
    println!("Submitted; status {}", view.status.as_str());

    if args.reject {
        view = workflow.advance(id, admin, None)?;
        println!("Advanced to {}", view.status.as_str());
        view = workflow.reject(id, admin, "Missing supervisor practice license")?;
        println!("Rejected; status {}", view.status.as_str());
    } else {
        view = workflow.advance(id, admin, Some("Documents verified".to_string()))?;
        println!("Advanced to {}", view.status.as_str());
        view = workflow.advance(id, admin, None)?;
        println!("Advanced to {}", view.status.as_str());
        view = workflow.advance(id, admin, Some("Inspection visit booked".to_string()))?;
        println!("Advanced to {}", view.status.as_str());

        view = workflow.record_inspection_report(
            id,
            admin,
            Some("Premises conform to clinical standards".to_string()),
        )?;
        println!("Inspection report recorded; status {}", view.status.as_str());

        view = workflow.advance(id, admin, Some("Committee session 2026-31".to_string()))?;
        println!("Advanced to {}", view.status.as_str());

        view = workflow.record_payment_order(id, admin, "PO-2026-0019")?;
        println!("Payment order created; status {}", view.status.as_str());

        view = workflow.record_payment_confirmation(id, "PO-2026-0019", "e-rial")?;
        println!("Payment confirmed; status {}", view.status.as_str());

        view = workflow.advance(id, admin, None)?;
        println!("Advanced to {}", view.status.as_str());

        if let Some(license) = &view.license {
            println!(
                "\nLicense {} issued {} expires {} document {}",
                license.license_number,
                license.issue_date,
                license.expiry_date,
                license.document_ref
            );
            let verification = issuer.verify(&license.license_number)?;
            println!(
                "Public verification: {} valid={} supervisor={}",
                verification.license_number,
                verification.is_valid,
                verification.supervisor_name.as_deref().unwrap_or("-")
            );
        }
    }

    println!("\nStep ledger");
    for step in &view.steps {
        let notes = step.notes.as_deref().unwrap_or("-");
        println!(
            "{:>2}. {:<22} {:<12} by {:<18} {}",
            step.step_order,
            step.step_code.as_str(),
            format!("{:?}", step.state),
            actor_label(step.performed_by),
            notes
        );
    }

    let notifications = notifier.messages();
    println!("\nApplicant notifications ({})", notifications.len());
    for (recipient, message) in &notifications {
        println!(
            "- to user {}: {} / {}",
            recipient.0, message.title_en, message.title_ar
        );
    }

    let trail = audit.entries();
    println!("\nAudit trail ({})", trail.len());
    for entry in &trail {
        println!(
            "- {:<28} {:<11} #{:<4} by {:<18} {}",
            entry.action,
            entry.entity_type,
            entry.entity_id,
            actor_label(entry.actor),
            entry.detail
        );
    }

    Ok(())
}

fn actor_label(actor: Actor) -> String {
    match actor {
        Actor::Admin(id) => format!("admin #{}", id.0),
        Actor::FacilityUser(id) => format!("facility user #{}", id.0),
        Actor::System => "system".to_string(),
    }
}

#[derive(Default)]
struct MemoryWorkflowStore {
    applications: Mutex<HashMap<i64, Application>>,
    steps: Mutex<Vec<StepEntry>>,
    licenses: Mutex<HashMap<i64, License>>,
}

impl WorkflowStore for MemoryWorkflowStore {
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
struct MemoryFacilityDirectory {
    facilities: Mutex<HashMap<i64, Facility>>,
}

impl FacilityDirectory for MemoryFacilityDirectory {
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
struct MemoryNotifier {
    messages: Mutex<Vec<(FacilityUserId, NotificationMessage)>>,
}

impl MemoryNotifier {
    fn messages(&self) -> Vec<(FacilityUserId, NotificationMessage)> {
        self.messages
            .lock()
            .expect("notifier mutex poisoned")
            .clone()
    }
}

impl NotificationSink for MemoryNotifier {
    fn notify(
        &self,
        recipient: FacilityUserId,
        message: NotificationMessage,
    ) -> Result<(), NotifyError> {
        info!(recipient = recipient.0, title = %message.title_en, "notification queued");
        self.messages
            .lock()
            .expect("notifier mutex poisoned")
            .push((recipient, message));
        Ok(())
    }
}

#[derive(Default)]
struct MemoryAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAudit {
    fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for MemoryAudit {
    fn log(&self, entry: AuditEntry) {
        info!(
            action = entry.action,
            entity = entry.entity_type,
            entity_id = entry.entity_id,
            detail = entry.detail,
            "audit"
        );
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
    }
}
