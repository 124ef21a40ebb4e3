//! Validation helpers for relay payloads.

use validator::ValidationError;

use crate::dto::common::CabinetId;

/// Largest absolute world coordinate accepted for avatar positions.
pub const MAX_WORLD_COORD: f32 = 100.0;
/// Side length of the square Pong screen space.
pub const PONG_FIELD_SIZE: f32 = 512.0;
/// Longest cabinet identifier accepted on the wire.
pub const MAX_CABINET_ID_LEN: usize = 64;

/// Validates that a world coordinate is a finite number inside the playable volume.
pub fn validate_world_coord(value: f32) -> Result<(), ValidationError> {
    validate_finite(value)?;
    if value.abs() >= MAX_WORLD_COORD {
        let mut err = ValidationError::new("world_coord_range");
        err.message = Some(format!("coordinate {value} is outside ±{MAX_WORLD_COORD}").into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a float is neither NaN nor infinite.
pub fn validate_finite(value: f32) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        let mut err = ValidationError::new("not_finite");
        err.message = Some("value must be a finite number".into());
        Err(err)
    }
}

/// Validates a coordinate in Pong screen space.
///
/// The ball legitimately travels slightly past the edges before a point is
/// scored, so one field length of slack is allowed on each side.
pub fn validate_field_coord(value: f32) -> Result<(), ValidationError> {
    validate_finite(value)?;
    if !(-PONG_FIELD_SIZE..=2.0 * PONG_FIELD_SIZE).contains(&value) {
        let mut err = ValidationError::new("field_coord_range");
        err.message = Some(format!("coordinate {value} is outside the Pong field").into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a cabinet identifier is non-empty, short, and printable.
pub fn validate_cabinet_id(id: &CabinetId) -> Result<(), ValidationError> {
    let raw = id.as_str();
    if raw.is_empty() || raw.len() > MAX_CABINET_ID_LEN {
        let mut err = ValidationError::new("cabinet_id_length");
        err.message = Some(
            format!(
                "Cabinet ID must be 1 to {MAX_CABINET_ID_LEN} bytes (got {})",
                raw.len()
            )
            .into(),
        );
        return Err(err);
    }

    if raw.chars().any(char::is_control) {
        let mut err = ValidationError::new("cabinet_id_format");
        err.message = Some("Cabinet ID must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a paddle owner slot number is 1 or 2.
pub fn validate_player_number(number: u8) -> Result<(), ValidationError> {
    if matches!(number, 1 | 2) {
        Ok(())
    } else {
        let mut err = ValidationError::new("player_number");
        err.message = Some(format!("player number must be 1 or 2 (got {number})").into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_world_coord() {
        assert!(validate_world_coord(-5.0).is_ok());
        assert!(validate_world_coord(99.9).is_ok());
        assert!(validate_world_coord(100.0).is_err());
        assert!(validate_world_coord(f32::NAN).is_err());
        assert!(validate_world_coord(f32::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_validate_field_coord() {
        assert!(validate_field_coord(256.0).is_ok());
        assert!(validate_field_coord(-3.0).is_ok());
        assert!(validate_field_coord(515.0).is_ok());
        assert!(validate_field_coord(5000.0).is_err());
        assert!(validate_field_coord(f32::INFINITY).is_err());
    }

    #[test]
    fn test_validate_cabinet_id() {
        assert!(validate_cabinet_id(&"12".into()).is_ok());
        assert!(validate_cabinet_id(&"pong".into()).is_ok());
        assert!(validate_cabinet_id(&"".into()).is_err());
        assert!(validate_cabinet_id(&"a\nb".into()).is_err());
        assert!(validate_cabinet_id(&"x".repeat(65).as_str().into()).is_err());
    }

    #[test]
    fn test_validate_player_number() {
        assert!(validate_player_number(1).is_ok());
        assert!(validate_player_number(2).is_ok());
        assert!(validate_player_number(0).is_err());
        assert!(validate_player_number(3).is_err());
    }
}
