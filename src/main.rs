use clap::{Parser, Subcommand};
use esg_alerts::cmd::{FeedArgs, ResetArgs, RunArgs, feed, reset, run};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the alert pipeline once over an events file.
    Run(RunArgs),
    /// Deletes the persisted suppression state (clean slate).
    ResetState(ResetArgs),
    /// Prints the newest alerts of the persisted feed.
    Feed(FeedArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let report = run::execute(args).await?;
            println!("{}", serde_json::to_string_pretty(&report.metrics)?);
        }
        Commands::ResetState(args) => reset::execute(args).await?,
        Commands::Feed(args) => {
            let items = feed::execute(args).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }

    Ok(())
}
