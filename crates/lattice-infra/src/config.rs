//! Configuration loader for Lattice.
//!
//! Reads `config.toml` from the given directory and deserializes it into
//! [`LatticeConfig`]. Falls back to defaults when the file is missing or
//! malformed, so a bare installation comes up on the container backend with
//! local-engine settings.

use std::path::Path;

use lattice_types::config::LatticeConfig;

/// Load configuration from `{config_dir}/config.toml`.
///
/// - Missing file: returns [`LatticeConfig::default()`].
/// - Unparseable file: logs a warning and returns the default.
/// - Partial file: unspecified fields take their defaults.
pub async fn load_config(config_dir: &Path) -> LatticeConfig {
    let config_path = config_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return LatticeConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return LatticeConfig::default();
        }
    };

    match toml::from_str::<LatticeConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            LatticeConfig::default()
        }
    }
}
