//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::dao::models::{League, iso_date};

/// Validates that a league code is one of the supported leagues.
///
/// # Examples
///
/// ```ignore
/// validate_league("LVBP") // Ok
/// validate_league("lvbp") // Err - codes are upper case
/// ```
pub fn validate_league(code: &str) -> Result<(), ValidationError> {
    if League::parse(code).is_some() {
        return Ok(());
    }
    let mut err = ValidationError::new("league");
    err.message = Some(format!("League must be LVBP or LMBP (got `{code}`)").into());
    Err(err)
}

/// Validates a `YYYY-MM-DD` calendar date.
pub fn validate_iso_date(text: &str) -> Result<(), ValidationError> {
    let well_formed = text.len() == 10
        && text
            .char_indices()
            .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });
    if !well_formed {
        let mut err = ValidationError::new("iso_date_format");
        err.message = Some("Date must use the YYYY-MM-DD format".into());
        return Err(err);
    }

    if iso_date::parse(text).is_err() {
        let mut err = ValidationError::new("iso_date_range");
        err.message = Some(format!("`{text}` is not a calendar date").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_league() {
        assert!(validate_league("LVBP").is_ok());
        assert!(validate_league("LMBP").is_ok());
        assert!(validate_league("lvbp").is_err());
        assert!(validate_league("MLB").is_err());
        assert!(validate_league("").is_err());
    }

    #[test]
    fn test_validate_iso_date_valid() {
        assert!(validate_iso_date("2025-10-14").is_ok());
        assert!(validate_iso_date("2024-02-29").is_ok());
    }

    #[test]
    fn test_validate_iso_date_invalid() {
        assert!(validate_iso_date("2025-1-14").is_err()); // unpadded
        assert!(validate_iso_date("14/10/2025").is_err()); // wrong layout
        assert!(validate_iso_date("2025-02-30").is_err()); // not a day
        assert!(validate_iso_date("2025-10-14T00:00").is_err()); // trailing time
    }
}
