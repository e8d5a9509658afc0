//! Facility registration and relocation, gated by the proximity validator.
//! Runs upstream of any application: a facility must exist (and sit far
//! enough from its same-kind neighbours) before a license can be sought
//! for it.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use super::domain::{Actor, AdminId, Coordinates, Facility, FacilityId, FacilityRegistration,
    OperationalStatus};
use super::geo::{GeoError, GeoValidator};
use super::repository::{AuditEntry, AuditSink, FacilityDirectory, FacilityView, StoreError};

static FACILITY_SEQUENCE: AtomicI64 = AtomicI64::new(1);

fn next_facility_id() -> FacilityId {
    FacilityId(FACILITY_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, thiserror::Error)]
pub enum FacilityError {
    #[error("facility {} not found", .0 .0)]
    NotFound(FacilityId),
    #[error(transparent)]
    Location(#[from] GeoError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct FacilityService<F, A> {
    directory: Arc<F>,
    validator: GeoValidator<F>,
    audit: Arc<A>,
}

impl<F, A> FacilityService<F, A>
where
    F: FacilityDirectory,
    A: AuditSink,
{
    pub fn new(directory: Arc<F>, audit: Arc<A>, min_distance_meters: f64) -> Self {
        let validator = GeoValidator::new(directory.clone(), min_distance_meters);
        Self {
            directory,
            validator,
            audit,
        }
    }

    /// Register a facility. Placement is rejected outright when another
    /// facility of the same kind sits inside the minimum radius.
    pub fn create(
        &self,
        registration: FacilityRegistration,
        admin_id: AdminId,
    ) -> Result<FacilityView, FacilityError> {
        self.validator
            .check(registration.coordinates, registration.kind, None)?;

        let id = next_facility_id();
        let facility = Facility {
            id,
            facility_code: format!("FAC-{:08}", id.0),
            name_ar: registration.name_ar,
            name_en: registration.name_en,
            kind: registration.kind,
            district: registration.district,
            area: registration.area,
            street: registration.street,
            coordinates: registration.coordinates,
            rooms_count: registration.rooms_count,
            operational_status: OperationalStatus::Active,
            created_at: Utc::now(),
        };

        let stored = self.directory.insert(facility)?;

        self.audit.log(AuditEntry {
            actor: Actor::Admin(admin_id),
            action: "CREATE_FACILITY".to_string(),
            entity_type: "FACILITY".to_string(),
            entity_id: stored.id.0,
            detail: format!("Facility registered: {}", stored.facility_code),
        });

        Ok(FacilityView::from(&stored))
    }

    /// Re-survey a facility's location. The facility itself is excluded
    /// from the proximity scan so a small correction never self-collides.
    pub fn update_location(
        &self,
        facility_id: FacilityId,
        coordinates: Coordinates,
        admin_id: AdminId,
    ) -> Result<FacilityView, FacilityError> {
        let mut facility = self
            .directory
            .fetch(facility_id)?
            .ok_or(FacilityError::NotFound(facility_id))?;

        self.validator
            .check(Some(coordinates), facility.kind, Some(facility_id))?;

        facility.coordinates = Some(coordinates);
        self.directory.update(facility.clone())?;

        self.audit.log(AuditEntry {
            actor: Actor::Admin(admin_id),
            action: "UPDATE_FACILITY_LOCATION".to_string(),
            entity_type: "FACILITY".to_string(),
            entity_id: facility.id.0,
            detail: format!(
                "Location set to {:.6}, {:.6}",
                coordinates.latitude, coordinates.longitude
            ),
        });

        Ok(FacilityView::from(&facility))
    }

    pub fn update_operational_status(
        &self,
        facility_id: FacilityId,
        status: OperationalStatus,
        admin_id: AdminId,
    ) -> Result<FacilityView, FacilityError> {
        let mut facility = self
            .directory
            .fetch(facility_id)?
            .ok_or(FacilityError::NotFound(facility_id))?;

        let previous = facility.operational_status;
        facility.operational_status = status;
        self.directory.update(facility.clone())?;

        self.audit.log(AuditEntry {
            actor: Actor::Admin(admin_id),
            action: "FACILITY_OPERATIONAL_STATUS".to_string(),
            entity_type: "FACILITY".to_string(),
            entity_id: facility.id.0,
            detail: format!("Changed from {} to {}", previous.as_str(), status.as_str()),
        });

        Ok(FacilityView::from(&facility))
    }

    pub fn get(&self, facility_id: FacilityId) -> Result<FacilityView, FacilityError> {
        let facility = self
            .directory
            .fetch(facility_id)?
            .ok_or(FacilityError::NotFound(facility_id))?;
        Ok(FacilityView::from(&facility))
    }
}
