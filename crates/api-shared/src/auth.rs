use std::env;

/// Errors produced by API-key validation.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The server has no expected key configured
    #[error("API_KEY not set in environment")]
    KeyNotConfigured,
    /// The provided key did not match the expected key
    #[error("Invalid API key")]
    InvalidKey,
}

/// Validates the provided API key against the expected API key from environment.
///
/// Returns `Ok(())` if the key is valid, or an error if invalid or missing.
pub fn validate_api_key(provided_key: &str) -> Result<(), AuthError> {
    let expected_key = env::var("API_KEY").map_err(|_| AuthError::KeyNotConfigured)?;

    if provided_key == expected_key {
        Ok(())
    } else {
        Err(AuthError::InvalidKey)
    }
}
