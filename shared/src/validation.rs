//! Validation utilities for geographic coordinates

// ============================================================================
// Coordinate Validations
// ============================================================================

/// Validate latitude is a finite value in [-90, 90]
pub fn validate_latitude(latitude: f64) -> Result<(), &'static str> {
    if !latitude.is_finite() {
        return Err("Latitude must be a finite number");
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err("Latitude must be between -90 and 90 degrees");
    }
    Ok(())
}

/// Validate longitude is a finite value in [-180, 180]
pub fn validate_longitude(longitude: f64) -> Result<(), &'static str> {
    if !longitude.is_finite() {
        return Err("Longitude must be a finite number");
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err("Longitude must be between -180 and 180 degrees");
    }
    Ok(())
}

/// Validate a latitude/longitude pair
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), &'static str> {
    validate_latitude(latitude)?;
    validate_longitude(longitude)
}
