//! Validation helpers for inbound WebSocket payloads.

use validator::ValidationError;

/// Longest accepted display name, in characters after trimming.
pub const NAME_MAX_CHARS: usize = 24;
/// Narrow and wide game code widths accepted on join.
pub const CODE_LENGTHS: [usize; 2] = [4, 6];

/// Validates a host or player display name: non-empty after trimming and at
/// most [`NAME_MAX_CHARS`] characters.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("name_empty");
        err.message = Some("display name must not be empty".into());
        return Err(err);
    }

    if trimmed.chars().count() > NAME_MAX_CHARS {
        let mut err = ValidationError::new("name_length");
        err.message =
            Some(format!("display name must be at most {NAME_MAX_CHARS} characters").into());
        return Err(err);
    }

    Ok(())
}

/// Validates a game code: one of the generated widths, ASCII alphanumeric.
/// Case is normalized later, so lowercase input is accepted here.
pub fn validate_game_code(code: &str) -> Result<(), ValidationError> {
    if !CODE_LENGTHS.contains(&code.len()) {
        let mut err = ValidationError::new("code_length");
        err.message = Some("game codes are 4 or 6 characters".into());
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("code_format");
        err.message = Some("game codes contain only letters and digits".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_accepts_reasonable_input() {
        assert!(validate_display_name("Alice").is_ok());
        assert!(validate_display_name("  DJ Ñandú  ").is_ok());
    }

    #[test]
    fn display_name_rejects_empty_and_oversized() {
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(NAME_MAX_CHARS + 1)).is_err());
    }

    #[test]
    fn game_code_accepts_both_widths() {
        assert!(validate_game_code("AB12").is_ok());
        assert!(validate_game_code("ab12cd").is_ok());
    }

    #[test]
    fn game_code_rejects_bad_shapes() {
        assert!(validate_game_code("ABC").is_err()); // too short
        assert!(validate_game_code("ABCDE").is_err()); // between widths
        assert!(validate_game_code("AB-2").is_err()); // punctuation
        assert!(validate_game_code("").is_err());
    }
}
