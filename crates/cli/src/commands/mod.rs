//! Command implementations.

mod info;
mod replay;
mod track;
mod validate;

pub use info::run_info;
pub use replay::run_replay;
pub use track::run_track;
pub use validate::run_validate;

use anyhow::{Context, Result};
use contracts::EventBlueprint;
use std::path::Path;
use tracing::{info, warn};

/// Load a blueprint and log its non-fatal warnings
fn load_blueprint(path: &Path) -> Result<EventBlueprint> {
    info!(config = %path.display(), "Loading configuration");

    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }

    let loaded = config_loader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    for warning in &loaded.warnings {
        warn!(config = %path.display(), "{warning}");
    }

    let blueprint = loaded.blueprint;

    info!(
        consumers = blueprint.consumers.len(),
        rules = blueprint.rules.len(),
        reidentify = ?blueprint.dispatch.reidentify,
        "Configuration loaded"
    );
    Ok(blueprint)
}
