use anyhow::Context;
use coord_config::load_config;
use coord_config::shared::PlaygroundConfig;

/// Loads and validates the playground configuration.
pub fn load_playground_config() -> anyhow::Result<PlaygroundConfig> {
    let config =
        load_config::<PlaygroundConfig>().context("loading playground configuration")?;
    config
        .validate()
        .context("validating playground configuration")?;

    Ok(config)
}
