//! Inbound frame validation.

use teamhub_core::error::AppError;

/// Checks an inbound text frame before it is parsed.
pub fn validate_inbound(raw: &str, max_size: usize) -> Result<(), AppError> {
    if raw.len() > max_size {
        return Err(AppError::validation(format!(
            "Message exceeds maximum size of {max_size} bytes"
        )));
    }

    if raw.trim().is_empty() {
        return Err(AppError::validation("Empty message"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_inbound() {
        assert!(validate_inbound(r#"{"type":"leave"}"#, 64).is_ok());
        assert!(validate_inbound("   ", 64).is_err());
        assert!(validate_inbound(&"x".repeat(65), 64).is_err());
    }
}
