//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_GAME_ID_LEN: usize = 32;

/// Validates that a game ID is 1 to 32 ASCII letters, digits, `-` or `_`.
///
/// # Examples
///
/// ```ignore
/// validate_game_id("2024020001") // Ok
/// validate_game_id("")           // Err - empty
/// validate_game_id("2024 0001")  // Err - whitespace
/// ```
pub fn validate_game_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_GAME_ID_LEN {
        let mut err = ValidationError::new("game_id_length");
        err.message = Some(
            format!(
                "Game ID must be between 1 and {MAX_GAME_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("game_id_format");
        err.message = Some("Game ID must contain only letters, digits, '-' or '_'".into());
        return Err(err);
    }

    Ok(())
}
