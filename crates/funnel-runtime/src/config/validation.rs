//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{FunnelConfig, LogOutput, LoggingConfig, PipelineConfig, ServerConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &FunnelConfig) -> ConfigResult<()> {
    validate_server_config(&config.server)?;
    validate_pipeline_config(&config.pipeline)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_server_config(server: &ServerConfig) -> ConfigResult<()> {
    if server.host.trim().is_empty() {
        return Err(ConfigError::validation("server.host must not be empty"));
    }

    if server.port == 0 {
        return Err(ConfigError::InvalidPort(server.port));
    }

    if server.max_body_bytes == 0 {
        return Err(ConfigError::validation(
            "server.max_body_bytes must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_pipeline_config(pipeline: &PipelineConfig) -> ConfigResult<()> {
    // Every deferred await must be bounded.
    if pipeline.default_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "pipeline.default_timeout_ms must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter target: {module:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&FunnelConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero() {
        let mut config = FunnelConfig::default();
        config.server.port = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPort(0))
        ));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = FunnelConfig::default();
        config.pipeline.default_timeout_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_body_limit() {
        let mut config = FunnelConfig::default();
        config.server.max_body_bytes = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_host() {
        let mut config = FunnelConfig::default();
        config.server.host = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = FunnelConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("funnel.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
