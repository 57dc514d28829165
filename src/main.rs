mod collector;
mod config;
mod error;
mod extract;
mod fetch;
mod normalize;
mod session;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use collector::Collector;
use config::Settings;
use session::AuthSession;
use store::Store;

#[derive(Parser)]
#[command(name = "lesson_collector", about = "Collect lesson schedules into SQLite")]
struct Cli {
    /// Configuration file (default: collector.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create tables and seed modules and cities
    Init,
    /// Log in, collect every module and save new lessons
    Collect,
    /// Show row counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let store = Store::open(&settings.db_path)
        .with_context(|| format!("failed to open database {:?}", settings.db_path))?;
    store.init_schema()?;

    match cli.command {
        Commands::Init => {
            let modules = store.seed_modules(&settings.modules)?;
            let cities = store.seed_cities(&settings.seed_cities)?;
            println!("Database ready: {} modules, {} cities added.", modules, cities);
        }
        Commands::Collect => {
            if !settings.has_credentials() {
                bail!("no login configured; set COLLECTOR__LOGIN or `login` in the config file");
            }
            store.seed_modules(&settings.modules)?;

            info!("Starting data collection");
            let session = AuthSession::login(&settings)
                .await
                .context("login failed, nothing collected")?;
            let collector = Collector::new(session, &settings);
            let (counts, report) = collector
                .run(&store)
                .await
                .context("saving lessons failed")?;

            for (name, outcome) in &report.modules {
                println!("  {:<12} {}", name, outcome);
            }
            println!(
                "Added {} new lessons, {} already existed ({} dropped without a city).",
                counts.new, counts.existing, report.dropped
            );
        }
        Commands::Stats => {
            let s = store.stats()?;
            println!("Modules:  {}", s.modules);
            println!("Cities:   {}", s.cities);
            println!("Teachers: {}", s.teachers);
            println!("Topics:   {}", s.topics);
            println!("Lessons:  {}", s.lessons);
        }
    }

    info!("Done in {:.1}s", t0.elapsed().as_secs_f64());
    Ok(())
}
