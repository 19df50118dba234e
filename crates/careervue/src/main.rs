use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use careervue::config::{default_config_path, LogFormat, LoggingConfig};
use careervue::{
    load_config, CareervueError, ChatCompletionClassifier, Config, ConfigError, Database,
    FileCheckpoint, ImapClient, IngestionLedger, IngestionPipeline, PipelineSettings, Poller,
    PollerSettings,
};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let config_path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => match default_config_path() {
            Some(path) => path,
            None => {
                eprintln!("careervue: {}", ConfigError::NoDefaultPath);
                return ExitCode::FAILURE;
            }
        },
    };

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("careervue: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("careervue: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        "Starting careervue v{} with {}",
        env!("CARGO_PKG_VERSION"),
        config_path.display()
    );

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over `logging.filter`. `log` records from dependencies and
/// library modules are forwarded into tracing.
fn init_logging(config: &LoggingConfig) -> Result<(), CareervueError> {
    tracing_log::LogTracer::init().map_err(|e| CareervueError::Logging(e.to_string()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| CareervueError::Logging(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().with_target(false)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().json()),
        ),
    };
    installed.map_err(|e| CareervueError::Logging(e.to_string()))
}

fn run(config: Config) -> Result<(), CareervueError> {
    let db_path = config
        .storage
        .database_path()
        .ok_or_else(|| missing_path("storage.databasePath"))?;
    let checkpoint_path = config
        .storage
        .checkpoint_path()
        .ok_or_else(|| missing_path("storage.checkpointPath"))?;

    let db = Database::open(&db_path)?;
    info!("Database ready at {}", db_path.display());

    let classifier = ChatCompletionClassifier::from_config(&config.classifier)?;
    let pipeline = IngestionPipeline::new(
        Box::new(ImapClient::new(config.mailbox.clone())),
        Arc::new(classifier),
        IngestionLedger::new(db),
        Arc::new(FileCheckpoint::new(checkpoint_path)),
        PipelineSettings::from_config(&config),
    );

    let mut poller = Poller::new(pipeline, PollerSettings::from_config(&config.poller));

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })?;

    poller.start()?;
    info!(
        "Watching {} on {} (Ctrl-C to stop)",
        config.mailbox.folder, config.mailbox.host
    );

    let _ = shutdown_rx.recv();
    info!("Shutting down");

    if let Err(e) = poller.stop() {
        warn!("{}", e);
        return Err(e.into());
    }
    Ok(())
}

fn missing_path(field: &str) -> ConfigError {
    ConfigError::Validation {
        message: format!("{} is not set and no home directory is available", field),
    }
}
