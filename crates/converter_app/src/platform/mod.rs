mod app;
mod config;
mod effects;
mod render;

use anyhow::Context;
use engine_logging::{engine_info, engine_warn, LogDestination};
use log::LevelFilter;

use crate::cli::{CliArgs, Command};

pub fn run_app(args: CliArgs) -> anyhow::Result<()> {
    let (mut config, config_error) = match config::load_config(&args.config) {
        Ok(loaded) => (loaded.unwrap_or_default(), None),
        Err(err) => (config::AppConfig::default(), Some(err)),
    };

    let (destination, level) = if args.verbose {
        (LogDestination::Both, LevelFilter::Debug)
    } else {
        (LogDestination::File, LevelFilter::Info)
    };
    engine_logging::initialize(destination, level, &config.log_file);
    if let Some(err) = config_error {
        engine_warn!("{}; using defaults", err);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;

    match args.command {
        Command::Convert(convert) => {
            config.apply_convert(&convert);
            engine_info!(
                "Converting {} files to {} via {}",
                convert.files.len(),
                convert.format,
                config.server_url
            );
            runtime.block_on(app::run_convert(config, convert))
        }
        Command::Jobs(server) => {
            config.apply_server(&server);
            runtime.block_on(app::run_jobs(config))
        }
    }
}
