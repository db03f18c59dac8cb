//! CLI command definitions, routing, and tracing setup.

use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::Section;
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use vcscout_core::{EnrichmentPipeline, ProgressReporter};
use vcscout_llm::GeminiModel;
use vcscout_shared::{
    AppConfig, ScoutError, config_file_path, init_config, load_config, resolve_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// VC Scout: enrich company profiles from their websites.
#[derive(Parser)]
#[command(
    name = "vcscout",
    version,
    about = "Turn a company website into a structured investment profile.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enrich a single company website and print the result as JSON.
    Enrich {
        /// Company website URL.
        url: String,

        /// Identifier echoed back in the result.
        #[arg(long, default_value = "")]
        company_id: String,
    },

    /// Serve the enrichment HTTP API.
    Serve {
        /// Socket address to bind (overrides `[server].bind`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "vcscout=info,tower_http=info",
        1 => "vcscout=debug,tower_http=debug",
        _ => "vcscout=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Enrich { url, company_id } => cmd_enrich(&url, &company_id).await,
        Command::Serve { bind } => cmd_serve(bind).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

fn build_pipeline(config: &AppConfig) -> Result<EnrichmentPipeline<GeminiModel>> {
    let model = GeminiModel::new(&config.gemini).wrap_err("failed to build Gemini client")?;
    let pipeline = EnrichmentPipeline::from_config(config, resolve_api_key(config), model)?;
    Ok(pipeline)
}

async fn cmd_enrich(url: &str, company_id: &str) -> Result<()> {
    let config = load_config()?;
    let pipeline = build_pipeline(&config)?;

    info!(url, company_id, model = %config.gemini.model, "enriching company");

    let reporter = CliProgress::new();
    let outcome = pipeline
        .enrich_with_progress(company_id, url, &reporter)
        .await;
    reporter.finish();

    let result = match outcome {
        Ok(result) => result,
        Err(e @ ScoutError::QuotaExceeded { retry_after_secs }) => {
            return Err(e).suggestion(format!("wait {retry_after_secs}s and try again"));
        }
        Err(e @ ScoutError::Config { .. }) => {
            return Err(e).suggestion(format!(
                "export {} or change `api_key_env` in {}",
                config.gemini.api_key_env,
                config_file_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "the config file".into())
            ));
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_serve(bind: Option<String>) -> Result<()> {
    let config = load_config()?;
    let addr = bind.unwrap_or_else(|| config.server.bind.clone());

    if resolve_api_key(&config).is_none() {
        tracing::warn!(
            var = %config.gemini.api_key_env,
            "model credential not set; enrichment requests will fail"
        );
    }

    let pipeline = build_pipeline(&config)?;
    info!(
        addr = %addr,
        environment = ?config.server.environment,
        "starting enrichment server"
    );
    vcscout_server::serve(&addr, pipeline)
        .await
        .wrap_err_with(|| format!("server on {addr} failed"))
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    let key_state = if resolve_api_key(&config).is_some() {
        "set"
    } else {
        "not set"
    };
    println!("# {} is {key_state}", config.gemini.api_key_env);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }
}
