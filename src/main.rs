mod cli;
mod color;
mod config;
mod providers;
mod registry;
mod utils {
    pub(crate) mod errors;
}

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cli::{
    generate::generate_cmd,
    list::list_cmd,
    status::{health_cmd, resolve_cmd},
    ColorMode,
};
use providers::providers::ProviderIdentifier;
use tracing_subscriber::EnvFilter;

#[derive(
    Parser, Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(
    about = "A provider registry and model router for chat models",
    version = "0.0.1"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Read the configuration from the specified file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
}

#[derive(Subcommand)]
enum Commands {
    /// List available models or providers
    List(ListArgs),
    /// Show which provider serves a model
    Resolve(ResolveArgs),
    /// Probe every registered provider
    Health(HealthArgs),
    /// Generate a completion for a single prompt
    Generate(GenerateArgs),
}

/// Possible listings
#[derive(Subcommand)]
pub(crate) enum ListObject {
    /// Models in the merged catalog
    Models(ListModelArgs),
    /// Providers
    Providers,
}

/// Output formats
#[derive(
    Parser, ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeaderlessTable,
}

#[derive(Parser)]
pub(crate) struct ListArgs {
    /// Output the listing with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
    /// List the specified object
    #[command(subcommand)]
    object: ListObject,
}

#[derive(Parser, Default)]
pub(crate) struct ListModelArgs {
    /// Limit listing to the specified provider
    #[arg(short, long)]
    provider: Option<ProviderIdentifier>,
}

#[derive(Parser)]
pub(crate) struct ResolveArgs {
    /// A model id, optionally qualified as "provider/model"
    model: String,
}

#[derive(Parser)]
pub(crate) struct HealthArgs {
    /// Output the report with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

#[derive(Parser, Default)]
pub(crate) struct GenerateArgs {
    /// Specifies the model, defaults to the catalog's default model
    #[arg(short, long)]
    model: Option<String>,
    /// A system prompt
    #[arg(short, long)]
    system: Option<String>,
    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,
    /// Upper bound on the number of generated tokens
    #[arg(long)]
    max_tokens: Option<u32>,
    /// The prompt, read from standard input when absent
    prompt: Option<String>,
}

/// Logs go to standard error, filtered by RUST_LOG. Only warnings are shown by default.
fn init_tracing(color: ColorMode) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(matches!(color, ColorMode::On))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let color = ColorMode::resolve_auto(cli.color);

    color::configure_color(color);
    init_tracing(color);

    let config = match config::read_config(cli.config) {
        Ok(config) => config,
        Err(err) => die!("{}", err),
    };

    match &cli.command {
        Commands::List(args) => list_cmd(&config, args).await,
        Commands::Resolve(args) => resolve_cmd(&config, args).await,
        Commands::Health(args) => health_cmd(&config, args).await,
        Commands::Generate(args) => generate_cmd(&config, args).await,
    }
}
