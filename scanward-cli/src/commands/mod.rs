//! Command handlers -- one module per subcommand

pub mod config;
pub mod engine;
pub mod scan;

use std::path::Path;

use scanward_core::config::ScanwardConfig;

use crate::error::CliError;

/// Effective configuration plus where it came from.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: ScanwardConfig,
    /// `false` when the file was missing and built-in defaults were used.
    pub from_file: bool,
}

/// Load the configuration file, falling back to defaults when it does not exist.
///
/// Environment overrides and validation apply in both cases.
pub async fn load_config(path: &Path) -> Result<LoadedConfig, CliError> {
    if tokio::fs::try_exists(path).await? {
        let config = ScanwardConfig::load(path).await?;
        return Ok(LoadedConfig {
            config,
            from_file: true,
        });
    }

    let mut config = ScanwardConfig::default();
    config.apply_env_overrides();
    config.validate()?;
    Ok(LoadedConfig {
        config,
        from_file: false,
    })
}
