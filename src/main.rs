use clap::Parser;
use serena_bridge::bridge::BridgeRunner;
use serena_bridge::cli::CliArgs;
use serena_bridge::config::{BridgeConfig, BridgeSettings, ConfigRepairer};
use serena_bridge::logging;
use std::process;
use tracing::{info, warn};

// Single-threaded like the rest of the bridge; the process exits explicitly
// so a pending stdin read cannot hold the runtime open.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = CliArgs::parse();

    // Load settings; a missing or broken default file falls back to defaults
    let mut settings = match &args.config {
        Some(path) => match BridgeSettings::load_from_path(path).await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Failed to load settings from {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => match BridgeSettings::load().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Warning: Failed to load bridge settings, using defaults: {e}");
                BridgeSettings::default()
            }
        },
    };

    if args.verbose {
        settings.logging.level = "debug".to_string();
    }

    let log_dir = settings.get_log_dir();
    if let Err(e) = logging::init_bridge_logging(&settings.logging, log_dir) {
        eprintln!("Warning: Failed to initialize logging: {e}");
    }

    let config = match BridgeConfig::resolve(&settings, &args.overrides(), |key| {
        std::env::var(key).ok()
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid bridge configuration: {e}");
            process::exit(1);
        }
    };

    info!("Serena bridge starting for {}", config.base_url());

    let mut runner = match BridgeRunner::new(config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Failed to initialize bridge: {e}");
            process::exit(e.exit_code());
        }
    };

    if settings.repair.enabled && !args.no_repair {
        match ConfigRepairer::for_home(settings.repair.default_languages.clone()) {
            Ok(repairer) => runner = runner.with_repair(repairer),
            Err(e) => warn!("Skipping Serena config repair: {}", e),
        }
    }

    let code = runner.run().await;
    info!("Serena bridge exiting with status {}", code);
    process::exit(code);
}
