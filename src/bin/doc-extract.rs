//! CLI binary for edgequake-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_extract::{
    extract, extract_to_file, load_schema, pipeline::input, suggest_image, upload, CredentialResolver,
    ExtractError, ExtractionConfig, ExtractionProgressCallback, ProgressCallback, SuggestedSchema,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that reports endpoint attempts, failures and backoff waits.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(prefix: &str) -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix(prefix.to_string());
        bar.set_message("Preparing…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        self.bar
            .set_message(format!("calling endpoint (attempt {attempt}/{max_attempts})"));
    }

    fn on_attempt_failed(&self, attempt: u32, max_attempts: u32, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} attempt {}/{}  {}",
            red("✗"),
            attempt,
            max_attempts,
            red(&msg)
        ));
    }

    fn on_backoff(&self, next_attempt: u32, delay: Duration) {
        self.bar.set_message(format!(
            "waiting {:.1}s before attempt {next_attempt}",
            delay.as_secs_f64()
        ));
    }

    fn on_success(&self, attempt: u32) {
        self.bar.set_message(format!("response received (attempt {attempt})"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract fields described in schema.json (stdout)
  doc-extract extract invoice.png --schema schema.json

  # Write the result to a file
  doc-extract extract invoice.png --schema schema.json -o result.json

  # Let the model propose a schema
  doc-extract suggest invoice.png > schema.json

  # Publish an image on the image host
  doc-extract upload scan.jpg

  # Show which credentials and endpoint would be used
  doc-extract check

SCHEMA FILE:
  [{"key_name": "InvoiceNumber", "description": "Invoice id", "data_type": "String", "is_array": false},
   {"key_name": "Total", "data_type": "Number"}]

ENVIRONMENT VARIABLES:
  HUGGINGFACE_API_KEY            Bearer token for the extraction endpoint
  HUGGINGFACE_API_ENDPOINT_URL   Extraction endpoint URL
  IMAGE_HOST_API_KEY             Image host key (enables the upload relay)
  EXTRACT_SECRETS_FILE           Secrets TOML (default .secrets/secrets.toml)
  RUST_LOG                       Log filter, overrides -v / -q

SECRETS FILE:
  [huggingface]
  api_key = "hf_..."
  endpoint_url = "https://xyz.endpoints.huggingface.cloud"

  [image_host]
  api_key = "..."
"#;

/// Extract structured fields from document images using a hosted VLM.
#[derive(Parser, Debug)]
#[command(
    name = "doc-extract",
    version,
    about = "Extract structured fields from document images using a hosted vision model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the fields of a schema file from an image.
    Extract {
        /// Local image path or HTTP/HTTPS URL.
        input: String,

        /// JSON schema file: a list of {key_name, description, data_type, is_array}.
        #[arg(short, long, env = "EXTRACT_SCHEMA")]
        schema: PathBuf,

        /// Write the JSON result to this file instead of stdout.
        #[arg(short, long, env = "EXTRACT_OUTPUT")]
        output: Option<PathBuf>,

        /// Print single-line JSON.
        #[arg(long)]
        json_compact: bool,
    },

    /// Ask the model to propose a schema for an image.
    Suggest {
        /// Local image path or HTTP/HTTPS URL.
        input: String,

        /// Always send local images inline instead of via the image host.
        #[arg(long, env = "EXTRACT_NO_RELAY")]
        no_relay: bool,
    },

    /// Publish an image on the image host and print its URL.
    Upload {
        /// Local image path or HTTP/HTTPS URL.
        input: String,
    },

    /// Report which credentials and endpoint would be used.
    Check,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Extraction endpoint URL (overrides environment and secrets file).
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Secrets TOML file.
    #[arg(long, global = true, env = "EXTRACT_SECRETS_FILE")]
    secrets: Option<PathBuf>,

    /// Total attempts per endpoint call.
    #[arg(long, global = true, env = "EXTRACT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Base backoff in milliseconds (doubles after each failed attempt).
    #[arg(long, global = true, env = "EXTRACT_RETRY_BACKOFF_MS", default_value_t = 1000)]
    retry_backoff_ms: u64,

    /// Per-attempt extraction timeout in seconds.
    #[arg(long, global = true, env = "EXTRACT_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Per-attempt schema-suggestion timeout in seconds.
    #[arg(long, global = true, env = "EXTRACT_SUGGEST_TIMEOUT", default_value_t = 60)]
    suggest_timeout: u64,

    /// Token budget for schema suggestion replies.
    #[arg(long, global = true, env = "EXTRACT_SUGGEST_MAX_TOKENS", default_value_t = 256)]
    suggest_max_tokens: usize,

    /// Model name sent with schema-suggestion requests.
    #[arg(long, global = true, env = "EXTRACT_SUGGEST_MODEL")]
    suggest_model: Option<String>,

    /// Image host upload URL.
    #[arg(long, global = true, env = "EXTRACT_RELAY_URL")]
    relay_url: Option<String>,

    /// HTTP download timeout for URL inputs in seconds.
    #[arg(long, global = true, env = "EXTRACT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "EXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs and full error chains.
    #[arg(short, long, global = true, env = "EXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "EXTRACT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback that matters; keep library INFO
    // logs out of its way unless --verbose asks for everything.
    let common = &cli.common;
    let show_progress = shows_progress(&cli);
    let filter = if common.verbose {
        "debug"
    } else if common.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err, common.verbose);
            ExitCode::FAILURE
        }
    }
}

fn shows_progress(cli: &Cli) -> bool {
    let common = &cli.common;
    !common.quiet
        && !common.no_progress
        && matches!(cli.command, Command::Extract { .. } | Command::Suggest { .. })
}

/// Short message by default; the full chain under `--verbose`.
fn report_error(err: &anyhow::Error, verbose: bool) {
    if verbose {
        eprintln!("{} {:#}", red("✘"), err);
        return;
    }
    match err.chain().find_map(|e| e.downcast_ref::<ExtractError>()) {
        Some(e) => eprintln!("{} {}", red("✘"), e.user_message()),
        None => eprintln!("{} {:#}", red("✘"), err),
    }
    eprintln!("{}", dim("Run with --verbose for details."));
}

async fn run(cli: &Cli, show_progress: bool) -> Result<ExitCode> {
    let common = &cli.common;
    let spinner = show_progress.then(|| {
        let prefix = match cli.command {
            Command::Suggest { .. } => "Suggesting",
            _ => "Extracting",
        };
        CliProgressCallback::new(prefix)
    });
    let progress = spinner
        .clone()
        .map(|cb| cb as Arc<dyn ExtractionProgressCallback>);
    let config = build_config(common, progress)?;

    let result = match &cli.command {
        Command::Extract {
            input,
            schema,
            output,
            json_compact,
        } => run_extract(&config, input, schema, output.as_ref(), *json_compact, common.quiet).await,
        Command::Suggest { input, no_relay } => run_suggest(&config, input, !no_relay).await,
        Command::Upload { input } => run_upload(&config, input).await,
        Command::Check => run_check(&config),
    };

    if let Some(cb) = spinner {
        cb.finish();
    }
    result
}

async fn run_extract(
    config: &ExtractionConfig,
    input: &str,
    schema_path: &Path,
    output: Option<&PathBuf>,
    compact: bool,
    quiet: bool,
) -> Result<ExitCode> {
    let schema = load_schema(schema_path)
        .with_context(|| format!("Failed to load schema from {}", schema_path.display()))?;

    if let Some(path) = output {
        let stats = extract_to_file(input, &schema, path, config)
            .await
            .context("Extraction failed")?;
        if !quiet {
            eprintln!(
                "{}  {} fields  {} attempt(s)  {}ms  →  {}",
                green("✔"),
                stats.schema_fields,
                stats.attempts,
                stats.duration_ms,
                bold(&path.display().to_string()),
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let output = extract(input, &schema, config)
        .await
        .context("Extraction failed")?;
    let json = if compact {
        serde_json::to_string(&output.fields)
    } else {
        serde_json::to_string_pretty(&output.fields)
    }
    .context("Failed to serialise result")?;
    println!("{json}");

    if !quiet {
        eprintln!(
            "{}",
            dim(&format!(
                "{} attempt(s), strategy {}, {}ms",
                output.stats.attempts, output.stats.strategy, output.stats.duration_ms
            ))
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_suggest(config: &ExtractionConfig, input: &str, use_relay: bool) -> Result<ExitCode> {
    let suggested = match input::resolve_input(input).await {
        Ok(image) => suggest_image(&image, config, use_relay).await,
        Err(e) => SuggestedSchema::failed(e.user_message(), e.to_string()),
    };

    let json = serde_json::to_string_pretty(&suggested).context("Failed to serialise schema")?;
    println!("{json}");

    Ok(if suggested.is_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn run_upload(config: &ExtractionConfig, input: &str) -> Result<ExitCode> {
    match upload(input, config).await.context("Upload failed")? {
        Some(url) => {
            println!("{url}");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!(
                "{} Upload failed. Is IMAGE_HOST_API_KEY set? See --verbose for the host's reply.",
                red("✘")
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_check(config: &ExtractionConfig) -> Result<ExitCode> {
    let resolver = CredentialResolver::from_config(config);
    let mut ok = true;

    match resolver.resolve_api_key() {
        Ok(key) => println!("{} API key       {}", green("✓"), redact(&key)),
        Err(e) => {
            ok = false;
            println!("{} API key       {}", red("✗"), e.user_message());
        }
    }
    match resolver.resolve_endpoint_url() {
        Ok(url) => println!("{} Endpoint      {}", green("✓"), url),
        Err(e) => {
            ok = false;
            println!("{} Endpoint      {}", red("✗"), e.user_message());
        }
    }
    match resolver.resolve_relay_api_key() {
        Some(key) => println!("{} Image host    {} ({})", green("✓"), redact(&key), config.relay_url),
        None => println!("{} Image host    {}", dim("-"), dim("disabled (no IMAGE_HOST_API_KEY)")),
    }

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Keep the first four characters of a secret.
fn redact(secret: &str) -> String {
    let head: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{head}****")
    }
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(common: &CommonArgs, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .max_retries(common.max_retries)
        .retry_backoff_ms(common.retry_backoff_ms)
        .api_timeout_secs(common.api_timeout)
        .suggest_timeout_secs(common.suggest_timeout)
        .suggest_max_tokens(common.suggest_max_tokens)
        .download_timeout_secs(common.download_timeout);

    if let Some(ref url) = common.endpoint {
        builder = builder.endpoint_url(url);
    }
    if let Some(ref path) = common.secrets {
        builder = builder.secrets_path(path.clone());
    }
    if let Some(ref model) = common.suggest_model {
        builder = builder.suggest_model(model);
    }
    if let Some(ref url) = common.relay_url {
        builder = builder.relay_url(url);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
