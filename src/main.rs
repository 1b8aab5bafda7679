//! rowset - runs statement scripts against an in-memory server.

use anyhow::Context;
use db_rowset::cli::Cli;
use db_rowset::config::Config;
use db_rowset::script::{self, RunOptions, Script};
use db_rowset::{logging, RowsetError};
use tracing::{debug, error, info};

fn main() {
    // Load .env before reading ROWSET_* overrides
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    let target = logging::init(logging::LogTarget::from_flag(cli.log_file));
    debug!(%target, "Logging initialized");

    if let Err(e) = run(&cli) {
        match e.downcast_ref::<RowsetError>() {
            Some(rowset) => error!("{}: {:#}", rowset.category(), e),
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.fetch.apply_env_overrides()?;
    config.fetch.validate()?;

    let script = Script::load(&cli.script)?;
    info!(steps = script.steps.len(), "Loaded script {}", cli.script.display());

    let options = RunOptions {
        batch_size: cli.batch_size,
        columns: cli.columns,
    };
    let outputs = script::run(&script, config.fetch, options)
        .with_context(|| format!("Failed to run {}", cli.script.display()))?;

    print!("{}", script::render(&outputs, cli.format));
    Ok(())
}
