use anyhow::Context;
use fanout_config::load_config;
use fanout_config::shared::ReplicatorConfig;

/// Loads the configuration of the current environment and validates it.
pub fn load_replicator_config() -> anyhow::Result<ReplicatorConfig> {
    let config =
        load_config::<ReplicatorConfig>().context("failed to load the replicator configuration")?;
    config
        .validate()
        .context("invalid replicator configuration")?;

    Ok(config)
}
