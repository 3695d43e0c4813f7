//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.provider.model.trim().is_empty() {
        errors.push("provider.model must not be empty".to_string());
    }
    if config.provider.api_base.trim().is_empty() {
        errors.push("provider.api_base must not be empty".to_string());
    }
    if !(0.0..=2.0).contains(&config.provider.temperature) {
        errors.push("provider.temperature must be in [0.0, 2.0]".to_string());
    }
    if config.provider.top_p <= 0.0 || config.provider.top_p > 1.0 {
        errors.push("provider.top_p must be in (0.0, 1.0]".to_string());
    }
    if config.provider.top_k == 0 {
        errors.push("provider.top_k must be > 0".to_string());
    }
    if config.provider.max_output_tokens == 0 {
        errors.push("provider.max_output_tokens must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
