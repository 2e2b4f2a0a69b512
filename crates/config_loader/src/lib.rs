//! # Config Loader
//!
//! 读取 Siddi 配置 (TOML / JSON)，校验后连同非致命警告一起返回。
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! let loaded = config_loader::load_from_path(Path::new("siddi.toml")).unwrap();
//! for warning in &loaded.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! println!("Rules: {}", loaded.blueprint.rules.len());
//! ```

mod validator;

use std::path::Path;

use contracts::{ContractError, EventBlueprint};

/// Config file format, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// `.toml` / `.json`, case-insensitive
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        match ext.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(ContractError::config_parse(format!(
                "unsupported config format: .{ext}"
            ))),
        }
    }

    /// Deserialize a blueprint without validating it
    pub fn parse(self, content: &str) -> Result<EventBlueprint, ContractError> {
        let parsed = match self {
            Self::Toml => toml::from_str(content).map_err(|e| ("TOML", Box::new(e) as _)),
            Self::Json => serde_json::from_str(content).map_err(|e| ("JSON", Box::new(e) as _)),
        };
        parsed.map_err(
            |(label, source): (&str, Box<dyn std::error::Error + Send + Sync>)| {
                ContractError::ConfigParse {
                    message: format!("{label} parse error: {source}"),
                    source: Some(source),
                }
            },
        )
    }
}

/// A validated blueprint and the non-fatal problems found in it
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub blueprint: EventBlueprint,
    /// Rules naming unknown consumers, unused consumers and similar
    pub warnings: Vec<String>,
}

/// Read, parse and validate a config file
///
/// # Errors
/// Unknown extension, unreadable file, parse failure or the first
/// validation error.
pub fn load_from_path(path: &Path) -> Result<LoadedConfig, ContractError> {
    let format = ConfigFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content, format)
}

/// Parse and validate config content
pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<LoadedConfig, ContractError> {
    let blueprint = format.parse(content)?;
    validator::validate(&blueprint)?;
    let warnings = validator::warnings(&blueprint);
    Ok(LoadedConfig {
        blueprint,
        warnings,
    })
}
