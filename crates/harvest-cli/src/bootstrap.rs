use std::path::PathBuf;

use anyhow::Context;
use harvest_config::HarvestConfig;

/// Environment variable naming an explicit dotenv file.
const ENV_FILE_VAR: &str = "HARVEST_ENV_FILE";

pub fn load_config() -> anyhow::Result<HarvestConfig> {
    load_dotenv()?;
    HarvestConfig::load().context("failed to load harvest configuration")
}

fn load_dotenv() -> anyhow::Result<()> {
    if let Some(path) = std::env::var_os(ENV_FILE_VAR).map(PathBuf::from) {
        dotenvy::from_path(&path)
            .with_context(|| format!("failed to load dotenv file at {}", path.display()))?;
        return Ok(());
    }

    dotenvy::dotenv().ok();
    Ok(())
}
