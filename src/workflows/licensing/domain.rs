use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for license applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub i64);

/// Identifier wrapper for registered facilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FacilityId(pub i64);

/// Identifier wrapper for issued licenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LicenseId(pub i64);

/// Identifier wrapper for health-office administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdminId(pub i64);

/// Identifier wrapper for facility-side user accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FacilityUserId(pub i64);

/// The party performing a workflow mutation. Ledger entries and audit rows
/// record exactly one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    Admin(AdminId),
    FacilityUser(FacilityUserId),
    /// External subsystem callbacks (e.g. a payment gateway confirmation)
    /// that no person performed.
    System,
}

/// Externally visible application status. The wire strings are contractual;
/// downstream dashboards filter on them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    BlueprintReview,
    InspectionScheduled,
    InspectionCompleted,
    CommitteeApproved,
    PaymentPending,
    PaymentCompleted,
    LicenseIssued,
    Rejected,
    Archived,
}

impl ApplicationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "DRAFT",
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::UnderReview => "UNDER_REVIEW",
            ApplicationStatus::BlueprintReview => "BLUEPRINT_REVIEW",
            ApplicationStatus::InspectionScheduled => "INSPECTION_SCHEDULED",
            ApplicationStatus::InspectionCompleted => "INSPECTION_COMPLETED",
            ApplicationStatus::CommitteeApproved => "COMMITTEE_APPROVED",
            ApplicationStatus::PaymentPending => "PAYMENT_PENDING",
            ApplicationStatus::PaymentCompleted => "PAYMENT_COMPLETED",
            ApplicationStatus::LicenseIssued => "LICENSE_ISSUED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Archived => "ARCHIVED",
        }
    }

    /// Terminal statuses accept no further transitions, not even rejection.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rejected | ApplicationStatus::Archived
        )
    }
}

/// Internal workflow stage identifier recorded on ledger entries. Distinct
/// from, but bijectively mapped to, the visible status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepCode {
    Draft,
    Submit,
    LicensingReview,
    BlueprintReview,
    InspectionScheduling,
    InspectionReport,
    CommitteeApproval,
    PaymentOrder,
    ElectronicPayment,
    LicenseIssuance,
    Archive,
}

impl StepCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            StepCode::Draft => "DRAFT",
            StepCode::Submit => "SUBMIT",
            StepCode::LicensingReview => "LICENSING_REVIEW",
            StepCode::BlueprintReview => "BLUEPRINT_REVIEW",
            StepCode::InspectionScheduling => "INSPECTION_SCHEDULING",
            StepCode::InspectionReport => "INSPECTION_REPORT",
            StepCode::CommitteeApproval => "COMMITTEE_APPROVAL",
            StepCode::PaymentOrder => "PAYMENT_ORDER",
            StepCode::ElectronicPayment => "ELECTRONIC_PAYMENT",
            StepCode::LicenseIssuance => "LICENSE_ISSUANCE",
            StepCode::Archive => "ARCHIVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseType {
    New,
    Renewal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseStatus {
    Active,
    Suspended,
    Expired,
    Revoked,
}

impl LicenseStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            LicenseStatus::Active => "ACTIVE",
            LicenseStatus::Suspended => "SUSPENDED",
            LicenseStatus::Expired => "EXPIRED",
            LicenseStatus::Revoked => "REVOKED",
        }
    }
}

/// Categories of health facility the office licenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FacilityKind {
    Hospital,
    Center,
    Clinic,
    DentalClinic,
    EmergencyClinic,
    Laboratory,
    RadiologyLab,
    Pharmacy,
}

impl FacilityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            FacilityKind::Hospital => "HOSPITAL",
            FacilityKind::Center => "CENTER",
            FacilityKind::Clinic => "CLINIC",
            FacilityKind::DentalClinic => "DENTAL_CLINIC",
            FacilityKind::EmergencyClinic => "EMERGENCY_CLINIC",
            FacilityKind::Laboratory => "LABORATORY",
            FacilityKind::RadiologyLab => "RADIOLOGY_LAB",
            FacilityKind::Pharmacy => "PHARMACY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationalStatus {
    Active,
    Closed,
    Suspended,
    UnderReview,
}

impl OperationalStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            OperationalStatus::Active => "ACTIVE",
            OperationalStatus::Closed => "CLOSED",
            OperationalStatus::Suspended => "SUSPENDED",
            OperationalStatus::UnderReview => "UNDER_REVIEW",
        }
    }
}

/// Decimal-degree coordinate pair. Facilities without a surveyed location
/// carry `None` and pass the proximity gate trivially.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Section B of the paper form: the technical supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorDetails {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub national_id: Option<String>,
    pub id_issuer: Option<String>,
    pub id_issue_date: Option<NaiveDate>,
    pub qualification: Option<String>,
    pub university: Option<String>,
    pub qualification_issuer: Option<String>,
    pub qualification_date: Option<NaiveDate>,
    pub practice_license: Option<String>,
    pub practice_license_expiry: Option<NaiveDate>,
}

/// Section C of the paper form: the prior license, filled for renewals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorLicense {
    pub issuing_authority: Option<String>,
    pub license_number: Option<String>,
    pub license_date: Option<NaiveDate>,
    pub validity_period: Option<String>,
}

/// A license application. Mutated exclusively through the workflow service;
/// `version` backs the optimistic concurrency check on every commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub application_number: String,
    pub facility_id: FacilityId,
    pub submitted_by: FacilityUserId,
    pub status: ApplicationStatus,
    pub license_type: LicenseType,
    pub facility_kind: FacilityKind,
    pub supervisor: SupervisorDetails,
    pub prior_license: Option<PriorLicense>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub version: u64,
}

/// Caller-supplied fields for a new draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRequest {
    pub license_type: LicenseType,
    pub facility_kind: FacilityKind,
    #[serde(default)]
    pub supervisor: SupervisorDetails,
    #[serde(default)]
    pub prior_license: Option<PriorLicense>,
}

/// Recorded state of a ledger entry. The engine only ever writes
/// `Completed`; the wider vocabulary is kept for schema compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    Pending,
    InProgress,
    Completed,
    Rejected,
}

/// One entry in the append-only transition ledger of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEntry {
    pub application_id: ApplicationId,
    pub step_order: u32,
    pub step_code: StepCode,
    pub state: StepState,
    pub performed_by: Actor,
    pub performed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// An operating license. Created only by workflow issuance; revised in
/// place afterwards, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub application_id: ApplicationId,
    pub license_number: String,
    pub issue_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub document_ref: String,
    pub status: LicenseStatus,
    pub created_at: DateTime<Utc>,
}

impl License {
    /// A license is honored while active and not past its expiry date.
    pub fn is_valid_on(&self, today: NaiveDate) -> bool {
        self.status == LicenseStatus::Active && self.expiry_date >= today
    }
}

/// A registered health facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub facility_code: String,
    pub name_ar: String,
    pub name_en: Option<String>,
    pub kind: FacilityKind,
    pub district: Option<String>,
    pub area: Option<String>,
    pub street: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub rooms_count: Option<u32>,
    pub operational_status: OperationalStatus,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for registering a facility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityRegistration {
    pub name_ar: String,
    #[serde(default)]
    pub name_en: Option<String>,
    pub kind: FacilityKind,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub rooms_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Bilingual notification payload handed to the delivery collaborator.
/// Titles and bodies come in fixed pairs keyed by the triggering event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title_ar: String,
    pub title_en: String,
    pub body_ar: String,
    pub body_en: String,
    pub kind: NotificationKind,
}

impl NotificationMessage {
    pub fn submitted(application_number: &str) -> Self {
        Self {
            title_ar: "تم تقديم الطلب بنجاح".to_string(),
            title_en: "Application Submitted Successfully".to_string(),
            body_ar: format!("رقم الطلب: {application_number}"),
            body_en: format!("App No: {application_number}"),
            kind: NotificationKind::Info,
        }
    }

    pub fn committee_approved() -> Self {
        Self {
            title_ar: "تمت موافقة اللجنة".to_string(),
            title_en: "Committee Approved".to_string(),
            body_ar: "يرجى استكمال إجراءات الدفع".to_string(),
            body_en: "Please proceed to payment".to_string(),
            kind: NotificationKind::Success,
        }
    }

    pub fn payment_order(reference: &str) -> Self {
        Self {
            title_ar: "إصدار أمر الدفع".to_string(),
            title_en: "Payment Order Created".to_string(),
            body_ar: format!("المرجع: {reference}"),
            body_en: format!("Ref: {reference}"),
            kind: NotificationKind::Info,
        }
    }

    pub fn payment_confirmed() -> Self {
        Self {
            title_ar: "تأكيد الدفع".to_string(),
            title_en: "Payment Confirmed".to_string(),
            body_ar: "تم استلام الدفع بنجاح".to_string(),
            body_en: "Payment received successfully".to_string(),
            kind: NotificationKind::Success,
        }
    }

    pub fn license_issued() -> Self {
        Self {
            title_ar: "تم إصدار الترخيص".to_string(),
            title_en: "License Issued".to_string(),
            body_ar: "يمكنك استلام الترخيص الآن".to_string(),
            body_en: "You can collect your license now".to_string(),
            kind: NotificationKind::Success,
        }
    }

    pub fn rejected(reason: &str) -> Self {
        Self {
            title_ar: "تم رفض الطلب".to_string(),
            title_en: "Application Rejected".to_string(),
            body_ar: format!("السبب: {reason}"),
            body_en: format!("Reason: {reason}"),
            kind: NotificationKind::Error,
        }
    }

    pub fn license_revoked(license_number: &str, reason: &str) -> Self {
        Self {
            title_ar: format!("تم إلغاء الترخيص رقم: {license_number}"),
            title_en: "License Revoked".to_string(),
            body_ar: format!("السبب: {reason}"),
            body_en: format!("Your license #{license_number} has been revoked. Reason: {reason}"),
            kind: NotificationKind::Warning,
        }
    }
}
