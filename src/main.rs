use clap::Parser;
use numbers_aggregator::app;
use numbers_aggregator::core::ConfigProvider;
use numbers_aggregator::utils::{logger, validation::Validate};
use numbers_aggregator::{CliArgs, HttpFetcher, ServiceError};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    if let Err(e) = run(args).await {
        tracing::error!("❌ Server failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<(), ServiceError> {
    let config = args.resolve()?;
    // 記錄器依設定初始化，所以格式錯誤要先回報
    let log_format = config.log_format()?;
    logger::init_logger(log_format, args.verbose, config.log_level.as_deref());

    tracing::info!("Starting numbers-aggregator");
    tracing::debug!("Resolved config: {:?}", config);

    config.validate()?;

    let fetcher = HttpFetcher::from_config(&config)?;
    tracing::info!(
        "🔧 Query key '{}', deadline {:?} with {:?} reserved for the response",
        config.query_key(),
        config.deadline(),
        config.overhead()
    );

    app::serve(&config, Arc::new(fetcher)).await
}
