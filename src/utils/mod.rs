use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use std::path::Path;
use tracing::info;

use crate::models::common::Config;

/// Load the YAML config file, letting `SUPPLY_LEDGER_*` environment variables
/// override individual keys (nested keys use `__`, e.g. `SUPPLY_LEDGER_STORE__PATH`).
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<Config> {
    let config_path = config_path.as_ref();
    info!("Config path: {}", config_path.to_string_lossy());

    let settings = config::Config::builder()
        .add_source(File::from(config_path).format(FileFormat::Yaml))
        .add_source(
            Environment::with_prefix("SUPPLY_LEDGER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to read config file")?;

    let mut config: Config = settings
        .try_deserialize()
        .context("failed to parse config YAML")?;

    // Chain names are used as metric labels, which read better with underscores
    config.chain_name = config.chain_name.replace('-', "_");

    Ok(config)
}
