use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::schema::CONFIG_SCHEMA;
use super::settings::Settings;
use super::types::KostyConfig;
use super::validation::validate_settings;
use crate::errors::KostyError;

const MAX_CONFIG_BYTES: u64 = 1_048_576;
const LOCAL_CANDIDATES: &[&str] = &["kosty.yaml", "kosty.yml", ".kosty.yaml", ".kosty.yml"];

/// Configuration file to use: the explicit one (which must exist), else the
/// first local candidate, else `~/.kosty/config.yaml`.
pub fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, KostyError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(KostyError::Config(format!("Config file not found: {}", path.display())));
    }

    if let Some(local) = LOCAL_CANDIDATES.iter().map(PathBuf::from).find(|p| p.exists()) {
        return Ok(Some(local));
    }

    Ok(dirs::home_dir()
        .map(|home| home.join(".kosty").join("config.yaml"))
        .filter(|p| p.exists()))
}

pub async fn parse_config(path: &Path) -> Result<KostyConfig, KostyError> {
    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(KostyError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
        .map_err(|e| KostyError::Config(format!("Invalid configuration in {}: {}", path.display(), e)))
}

pub fn parse_config_str(content: &str) -> Result<KostyConfig, KostyError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    if yaml.is_null() {
        return Ok(KostyConfig::default());
    }

    validate_schema(&yaml)?;

    Ok(serde_yaml::from_value(yaml)?)
}

/// Locate, parse, layer and validate. No file at all yields built-in defaults.
pub async fn load_settings(explicit: Option<&Path>, profile: &str) -> Result<(Settings, Option<PathBuf>), KostyError> {
    let path = find_config_file(explicit)?;
    let config = match &path {
        Some(p) => {
            debug!(path = %p.display(), "Loading configuration");
            parse_config(p).await?
        }
        None => KostyConfig::default(),
    };

    let settings = Settings::resolve(&config, profile);
    validate_settings(&settings)?;
    Ok((settings, path))
}

/// Structural check against the JSON schema. Advisory: violations are
/// logged, semantic validation decides.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), KostyError> {
    let json_value: serde_json::Value = serde_json::to_value(yaml)
        .map_err(|e| KostyError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| KostyError::Config(format!("Schema compilation error: {}", e)))?;

    if let Err(errors) = compiled.validate(&json_value) {
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}
