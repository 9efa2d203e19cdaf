use clap::Parser;
use poly_snap::cli::{Cli, Commands};
use poly_snap::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(&cli.config);

    poly_snap::telemetry::init_telemetry(&config.telemetry, cli.verbose)?;

    match cli.command {
        Commands::Record(args) => {
            tracing::info!("Starting snapshot recording");
            args.execute(&config).await?;
        }
        Commands::Stream(args) => {
            tracing::info!("Starting snapshot recording with market stream");
            args.execute(&config).await?;
        }
        Commands::Book(args) => {
            args.execute(&config).await?;
        }
        Commands::Query(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Gamma API: {}", config.gamma.base_url);
            println!("  CLOB API: {}", config.clob.base_url);
            println!("  Stream: {}", config.clob.ws_url);
            println!("  Database: {}", config.recorder.db_path.display());
            println!("  Interval: {}s", config.recorder.interval_secs);
            println!(
                "  Filters: volume >= {}, liquidity >= {}",
                config.recorder.min_volume, config.recorder.min_liquidity
            );
            println!("  Book depth: {}", config.recorder.book_depth);
        }
    }

    Ok(())
}
