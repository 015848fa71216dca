use repost_bot::bluesky::{XrpcClient, XrpcError};
use repost_bot::config::{BotConfig, ConfigError, Credentials};
use repost_bot::cycle::{CycleLimits, CycleRunner};
use repost_bot::ledger::{LedgerError, SqliteLedger};
use repost_bot::logging::{self, LoggingError};
use repost_bot::schedule::{ScheduleConfig, run_schedule};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Failures that prevent the bot from starting.
#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("login failed: {0}")]
    Login(#[from] XrpcError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        // The subscriber may not be installed yet.
        eprintln!("repost-bot: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = BotConfig::load_default()?;
    logging::init(&config.logging)?;
    info!("Bluesky Repost Bot starting...");

    let credentials = Credentials::from_env()?;
    let triggers = config.trigger_config().map_err(ConfigError::from)?;
    let client = XrpcClient::login(&credentials).await?;
    let ledger = SqliteLedger::open(&config.database.path)?;
    info!(path = %config.database.path.display(), "Ledger opened");

    let mut runner = CycleRunner::new(&client, &ledger, triggers, client.session().handle.clone())
        .with_limits(CycleLimits::from_config(&config));

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        info!("Bot stopped by user");
        on_signal.cancel();
    });

    run_schedule(&mut runner, &ScheduleConfig::from_config(&config), shutdown).await;
    Ok(())
}
