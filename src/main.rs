pub mod config;
pub mod error;
pub mod io;
pub mod jobs;
pub mod model;
pub mod rendering;
pub mod server;
pub mod state;
pub mod utils;

use anyhow::Context;
use config::Config;
use state::{AppState, Viewer};
use std::path::PathBuf;
use std::process::ExitCode;
use utils::logger;

fn main() -> ExitCode {
    // Optional single argument: path to a JSON config file
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);

    let (config, config_msg) = match &config_path {
        Some(path) => match Config::load_from(path) {
            Ok(cfg) => (cfg, format!("Config loaded from {:?}", path)),
            Err(e) => {
                eprintln!("FATAL: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::load(),
    };

    if let Err(e) = logger::init(logger::parse_level(&config.log_level)) {
        eprintln!("Logger already initialized: {}", e);
    }
    log::info!("{}", config_msg);

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> anyhow::Result<()> {
    log::info!("Loading embedding and structure index...");
    let viewer = Viewer::open(&config).context("cannot open data files")?;

    log::info!("Pre-rendering structure for point {}...", config.initial_point);
    let state = AppState::new(viewer, config).context("initial render failed")?;

    server::run(state)
}
