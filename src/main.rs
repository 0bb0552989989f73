use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use ffiii_rate_updater::core::SubmitMode;
use ffiii_rate_updater::core::config::ConfigOverrides;
use ffiii_rate_updater::core::log::init_logging;

#[derive(Parser)]
#[command(version, about, long_about = LONG_ABOUT)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

const LONG_ABOUT: &str = "Fetches exchange rates for the configured currencies and stores them \
in Firefly III through its API.\n\nExample: ffiii-rate-updater update --currencies USD,EUR,GBP --date 2025-01-01";

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    InitConfig,
    /// Fetch exchange rates and update them in Firefly III
    Update {
        /// Firefly III API key
        #[arg(short = 'k', long)]
        api_key: Option<String>,
        /// Firefly III API URL, e.g. https://firefly.example.com/api/v1
        #[arg(short = 'u', long)]
        api_url: Option<String>,
        /// Currencies to fetch exchange rates for (e.g. USD,EUR,GBP)
        #[arg(short, long, value_delimiter = ',')]
        currencies: Option<Vec<String>>,
        /// Date to fetch exchange rates for (YYYY-MM-DD or 'latest')
        #[arg(short, long)]
        date: Option<String>,
        /// How rates are sent to Firefly III
        #[arg(short, long, value_enum)]
        mode: Option<SubmitMode>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::InitConfig) => {
            ffiii_rate_updater::cli::setup::setup_in(cli.config_path.as_deref())
        }
        Some(Commands::Update {
            api_key,
            api_url,
            currencies,
            date,
            mode,
        }) => {
            let overrides = ConfigOverrides {
                api_key,
                api_url,
                currencies,
                date,
                mode,
            };
            ffiii_rate_updater::run_command(
                ffiii_rate_updater::AppCommand::Update(overrides),
                cli.config_path.as_deref(),
            )
            .await
            .map(|_| ())
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
