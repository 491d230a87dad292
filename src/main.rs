use clap::Parser;
use pp_processor::{
    args::{Args, Command},
    config::Config,
    error::ProcessorError,
    processor::Processor,
    utils::metrics_utils
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level.as_str())).init();

    if let Err(e) = run(args).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), ProcessorError> {
    let config = Config::from_file(&args.config)?;

    if let Some(statsd) = &config.statsd {
        metrics_utils::install(statsd)?;
    }

    let processor = Processor::new(args.mode, config).await?;

    {
        let processor = Arc::clone(&processor);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                processor.request_shutdown();
            }
        });
    }

    match args.command {
        Command::MonitorNewScores => processor.monitor_new_scores().await?,
        Command::ProcessAllUsers { reprocess, threads } => processor.process_all_users(reprocess, threads).await?,
        Command::ProcessUsers { users } => {
            processor.process_users(&users).await?;
        }
    }

    log::info!("Shutting down.");

    Ok(())
}
