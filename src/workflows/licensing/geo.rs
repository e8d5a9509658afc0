//! Proximity gate for facility placement. A candidate location is rejected
//! when another facility of the same kind already sits within the minimum
//! spacing radius. The scan is O(N) over the directory per check, which is
//! acceptable at this registry's scale; no spatial index is maintained.

use std::sync::Arc;

use super::domain::{Coordinates, FacilityId, FacilityKind};
use super::repository::{FacilityDirectory, StoreError};

/// Mean Earth radius in meters, per the haversine convention.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Default minimum spacing between same-kind facilities.
pub const DEFAULT_MIN_DISTANCE_METERS: f64 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error(
        "a {} facility is {distance_meters:.1} m away, closer than the {minimum_meters:.0} m minimum",
        .kind.as_str()
    )]
    LocationTooClose {
        kind: FacilityKind,
        distance_meters: f64,
        minimum_meters: f64,
        nearest: FacilityId,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Great-circle distance in meters between two decimal-degree points.
pub fn haversine_distance(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Validates candidate coordinates against every same-kind facility in the
/// directory.
pub struct GeoValidator<F> {
    directory: Arc<F>,
    min_distance_meters: f64,
}

impl<F> GeoValidator<F>
where
    F: FacilityDirectory,
{
    pub fn new(directory: Arc<F>, min_distance_meters: f64) -> Self {
        Self {
            directory,
            min_distance_meters,
        }
    }

    /// Checks a candidate placement. A missing location passes trivially
    /// (the facility is "not yet located"). `exclude` skips the facility
    /// being relocated so it is never measured against itself.
    pub fn check(
        &self,
        candidate: Option<Coordinates>,
        kind: FacilityKind,
        exclude: Option<FacilityId>,
    ) -> Result<(), GeoError> {
        let Some(candidate) = candidate else {
            return Ok(());
        };

        for facility in self.directory.find_by_kind(kind)? {
            if exclude == Some(facility.id) {
                continue;
            }
            let Some(existing) = facility.coordinates else {
                continue;
            };
            let distance = haversine_distance(candidate, existing);
            if distance < self.min_distance_meters {
                return Err(GeoError::LocationTooClose {
                    kind,
                    distance_meters: distance,
                    minimum_meters: self.min_distance_meters,
                    nearest: facility.id,
                });
            }
        }

        Ok(())
    }

    /// Boolean form of `check`, mirroring the upstream contract. Directory
    /// failures still surface as errors.
    pub fn is_location_valid(
        &self,
        candidate: Option<Coordinates>,
        kind: FacilityKind,
    ) -> Result<bool, StoreError> {
        match self.check(candidate, kind, None) {
            Ok(()) => Ok(true),
            Err(GeoError::LocationTooClose { .. }) => Ok(false),
            Err(GeoError::Store(err)) => Err(err),
        }
    }
}
