use graphiti_maint::MaintConfig;

use crate::cli::Cli;

/// Load [`MaintConfig`] from the environment and apply the global flags.
///
/// # Errors
/// Returns an error if a variable fails to parse or validate, or if a
/// database command runs without `NEO4J_PASSWORD`.
pub fn load(cli: &Cli) -> anyhow::Result<MaintConfig> {
    let config = MaintConfig::from_env()?;
    apply_overrides(config, cli)
}

pub fn apply_overrides(mut config: MaintConfig, cli: &Cli) -> anyhow::Result<MaintConfig> {
    if let Some(uri) = &cli.neo4j_uri {
        config.neo4j_uri = uri.clone();
    }
    if let Some(database) = &cli.database {
        config.neo4j_database = database.clone();
    }
    if cli.command.needs_database() {
        // Fail before connecting rather than with an auth error.
        config.neo4j_password()?;
    }
    Ok(config)
}
