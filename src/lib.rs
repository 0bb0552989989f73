pub mod cli;
pub mod core;
pub mod providers;

use crate::core::RunReport;
use crate::core::config::{AppConfig, ConfigOverrides};
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Update(ConfigOverrides),
}

/// Loads configuration (file, then environment, then `overrides`) and runs `command`.
pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<RunReport> {
    info!("Firefly III rate updater starting...");

    let mut config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    config.apply_env(|name| std::env::var(name).ok());

    match command {
        AppCommand::Update(overrides) => {
            config.apply_overrides(&overrides);
            debug!("Effective config: {:#?}", redacted(&config));

            let settings = config.into_settings()?;
            cli::update::run(&settings).await
        }
    }
}

fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if !config.firefly.api_key.is_empty() {
        config.firefly.api_key = "***".to_string();
    }
    config
}
