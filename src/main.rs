use anyhow::Context;
use clap::Parser;
use seo_batch::utils::{logger, validation::Validate};
use seo_batch::{BatchEngine, CliConfig, LocalStorage, ScoringPipeline, Settings, TokioSleeper};
use std::sync::Arc;

async fn run(config: CliConfig) -> seo_batch::Result<String> {
    config.validate()?;

    let settings = Settings::load(config.config.as_deref())?;
    settings.validate()?;
    tracing::debug!(
        base_url = %settings.api.base_url,
        quality = %settings.api.quality,
        max_attempts = settings.retry.max_attempts,
        "settings loaded"
    );

    let storage = LocalStorage::default();
    let pipeline = ScoringPipeline::new(storage, config, settings, Arc::new(TokioSleeper))?;
    BatchEngine::new(pipeline).run().await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    dotenv::dotenv().ok();

    let log_guard = logger::init_cli_logger(config.verbose, &config.log_file, config.json_log)
        .with_context(|| format!("cannot open log file {}", config.log_file.display()))?;

    tracing::info!("Starting seo-batch on {}", config.file.display());
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    let exit_code = match run(config).await {
        Ok(output_path) => {
            tracing::info!("✅ Processing finished. Output file: {}", output_path);
            println!("✅ Processing finished. Output file: {}", output_path);
            0
        }
        Err(e) => {
            tracing::error!("❌ Batch failed: {}", e);
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            e.exit_code()
        }
    };

    // Flush the log file before leaving.
    drop(log_guard);

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
