//! Loading, generating and saving configuration files

use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GatewayConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());
    parse_config(&content)
}

/// Parse a configuration document after environment substitution
pub fn parse_config(content: &str) -> Result<GatewayConfig> {
    let substituted = substitution::substitute_env_vars(content)?;

    let config: GatewayConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!(
        backend = %config.storage.backend,
        symbols = config.symbols.len(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Configuration written by `stockgate init`
#[instrument]
pub fn generate_default_config() -> GatewayConfig {
    GatewayConfig {
        symbols: defaults::default_symbols(),
        ..GatewayConfig::default()
    }
}

#[instrument(skip(config))]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &GatewayConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_is_valid() {
        let config = generate_default_config();
        assert_eq!(config.symbols.len(), 4);

        let report = validate_config(&config);
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("stockgate-config-{}", std::process::id()));
        let path = dir.join("stockgate.yaml");

        let config = generate_default_config();
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.symbols, config.symbols);
        assert_eq!(loaded.server.http_port, config.server.http_port);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_parse_rejects_unknown_asset_type() {
        let yaml = "symbols:\n  - ticker: GOLD\n    name: Gold\n    asset_type: COMMODITY\n";
        assert!(parse_config(yaml).is_err());
    }
}
