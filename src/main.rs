//! FileKeeper - background file lifecycle agent
//!
//! Main entry point for the agent binary.
//!
//! # Execution Flow
//!
//! 1. Load `~/.filekeeper/config.yaml` (defaults when missing or malformed,
//!    `FILEKEEPER_*` environment overrides on top)
//! 2. Initialize logging into the configured log file, rotated at 10 MiB
//! 3. Create the tokio runtime
//! 4. Create the directory tree (fatal on failure)
//! 5. Start the agent: startup catch-up, FILES watcher, periodic sweeps
//! 6. Wait for Ctrl-C, then shut down gracefully and log metrics

use anyhow::{Context, Result};
use filekeeper::{APP_NAME, Agent, ConfigManager, ConfigStore, Organizer, VERSION};

fn main() -> Result<()> {
    let config_manager = ConfigManager::user_default()?;
    let config = config_manager.load_config()?;

    // Held until exit so buffered lines are flushed
    let _log_guard = filekeeper::logging::setup_logging_with_console(
        &config.base_dirs.log,
        config.debug_mode,
        true,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!("Settings: {}", config_manager.config_path());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("filekeeper-worker")
        .build()?;

    let organizer = Organizer::new(ConfigStore::new(config));
    organizer
        .create_directories()
        .context("Failed to create the managed directory tree")?;
    tracing::info!("Directory tree ready");

    runtime.block_on(async {
        let handle = Agent::new(organizer.clone())
            .start()
            .await
            .context("Failed to start the agent")?;

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        tracing::info!("Interrupt received");

        handle.shutdown().await;
        Ok::<(), anyhow::Error>(())
    })?;

    organizer.metrics().log_summary();
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));

    tracing::info!("Shutdown complete");
    Ok(())
}
