//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use leadcascade_core::{BatchProgress, BatchReport, Engine, read_contacts, write_json};
use leadcascade_shared::{
    AppConfig, EnrichmentResult, EnrichmentStatus, config_file_path, init_config, load_config,
    load_config_from,
};
use leadcascade_verify::{EmailVerifier, PhoneVerifier};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LeadCascade: find and verify emails and phones for partial contacts.
#[derive(Parser)]
#[command(
    name = "leadcascade",
    version,
    about = "Cascade contact enrichment across data providers, with email and phone verification.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.leadcascade/leadcascade.toml).
    #[arg(long, env = "LEADCASCADE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

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
    /// Enrich a JSON array of contacts.
    Enrich {
        /// Contacts file (JSON array).
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the batch report. Printed to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Contacts processed concurrently (overrides [batch].concurrency).
        #[arg(short, long, env = "LEADCASCADE_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Skip the SMTP mailbox probe (DNS and MX checks still run).
        #[arg(long)]
        no_smtp: bool,
    },

    /// Verify a single email address.
    VerifyEmail {
        email: String,

        /// Skip the SMTP mailbox probe.
        #[arg(long)]
        no_smtp: bool,
    },

    /// Parse and classify a single phone number.
    VerifyPhone {
        number: String,

        /// ISO-3166 alpha-2 region for national-format numbers.
        #[arg(long)]
        country: Option<String>,
    },

    /// Show the provider cascade order, costs and API key status.
    Providers,

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
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
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
        0 => "leadcascade=info",
        1 => "leadcascade=debug",
        _ => "leadcascade=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

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
    let config_path = cli.config;
    match cli.command {
        Command::Enrich {
            input,
            output,
            concurrency,
            no_smtp,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            if no_smtp {
                config.verification.email.smtp_enabled = false;
            }
            cmd_enrich(&config, &input, output.as_deref(), concurrency).await
        }
        Command::VerifyEmail { email, no_smtp } => {
            let mut config = resolve_config(config_path.as_deref())?;
            if no_smtp {
                config.verification.email.smtp_enabled = false;
            }
            cmd_verify_email(&config, &email).await
        }
        Command::VerifyPhone { number, country } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_verify_phone(&config, &number, country.as_deref())
        }
        Command::Providers => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_providers(&config)
        }
        Command::Config { action } => match action {
            ConfigAction::Init { force } => cmd_config_init(force),
            ConfigAction::Show => {
                let config = resolve_config(config_path.as_deref())?;
                cmd_config_show(&config)
            }
        },
    }
}

/// Explicit `--config` path, else the default location (or defaults).
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_enrich(
    config: &AppConfig,
    input: &Path,
    output: Option<&Path>,
    concurrency: Option<usize>,
) -> Result<()> {
    let contacts = read_contacts(input)?;

    let mut engine = Engine::from_config(config)?;
    if let Some(n) = concurrency {
        engine = engine.with_concurrency(n)?;
    }

    let enabled = config.providers.iter().filter(|p| p.enabled).count();
    if enabled == 0 {
        return Err(eyre!("no providers enabled in the config"));
    }
    let missing = config.missing_api_keys();
    if missing.len() == enabled {
        return Err(eyre!(
            "no provider has an API key set (missing: {}). Export the key env vars listed by `leadcascade providers`.",
            missing.join(", ")
        ));
    }
    if !missing.is_empty() {
        warn!(providers = ?missing, "providers without API keys will be skipped");
    }

    info!(
        input = %input.display(),
        contacts = contacts.len(),
        concurrency = engine.concurrency(),
        "enriching contacts"
    );

    // First ctrl-c stops scheduling; in-flight contacts still finish
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight contacts");
            on_signal.cancel();
        }
    });

    let reporter = CliProgress::new();
    let report = engine.run_batch(contacts, cancel, &reporter).await?;

    match output {
        Some(path) => write_json(path, &report)?,
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    print_summary(&report, output);
    Ok(())
}

fn print_summary(report: &BatchReport, output: Option<&Path>) {
    let stats = &report.stats;
    eprintln!();
    if report.cancelled {
        eprintln!("  Batch cancelled ({} contacts not started)", report.unscheduled.len());
    } else {
        eprintln!("  Batch complete!");
    }
    eprintln!("  Run:       {}", report.run_id);
    eprintln!("  Processed: {}/{}", stats.processed, stats.total);
    eprintln!(
        "  Matched:   {} ({:.1}%)",
        stats.matched,
        stats.success_rate * 100.0
    );
    eprintln!("  No match:  {}", stats.no_match);
    eprintln!("  Failed:    {}", stats.failed);
    eprintln!("  Cost:      ${:.4}", stats.total_cost);
    eprintln!("  Avg time:  {:.0}ms", stats.average_processing_time_ms);
    for (name, usage) in &stats.providers {
        eprintln!(
            "    {name:<16} calls={:<5} matches={:<5} errors={:<4} cost=${:.4}",
            usage.calls, usage.matches, usage.errors, usage.cost
        );
    }
    if let Some(path) = output {
        eprintln!("  Output:    {}", path.display());
    }
    eprintln!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg} ({elapsed})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        Self { bar }
    }
}

impl BatchProgress for CliProgress {
    fn started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.enable_steady_tick(std::time::Duration::from_millis(80));
    }

    fn contact_done(&self, _index: usize, result: &EnrichmentResult, completed: usize, _total: usize) {
        self.bar.set_position(completed as u64);
        let label = match result.status {
            EnrichmentStatus::Matched => result
                .source_provider
                .as_deref()
                .map(|p| format!("matched via {p}"))
                .unwrap_or_else(|| "matched".to_string()),
            EnrichmentStatus::NoMatch => "no match".to_string(),
            EnrichmentStatus::Failed => "failed".to_string(),
        };
        self.bar.set_message(label);
    }

    fn finished(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }
}

async fn cmd_verify_email(config: &AppConfig, email: &str) -> Result<()> {
    let verifier = EmailVerifier::from_config(&config.verification.email);
    let verification = verifier.verify(email).await;
    let verified = verifier.is_verified(&verification);

    info!(email, score = verification.score, verified, "email verified");
    let out = serde_json::json!({
        "email": email,
        "verified": verified,
        "verification": verification,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_verify_phone(config: &AppConfig, number: &str, country: Option<&str>) -> Result<()> {
    let verifier = PhoneVerifier::new(&config.verification.phone);
    let verification = verifier.verify(number, country);
    let verified = verifier.is_verified(&verification);

    let out = serde_json::json!({
        "phone": number,
        "verified": verified,
        "verification": verification,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_providers(config: &AppConfig) -> Result<()> {
    let ordered = config.ordered_providers();
    if ordered.is_empty() {
        println!("No providers enabled. Add [[providers]] entries to the config file.");
        return Ok(());
    }

    println!();
    println!(
        "  {:<4} {:<16} {:<15} {:>9} {:>14}  API key",
        "#", "Name", "Kind", "Cost", "Rate limit"
    );
    for (i, p) in ordered.iter().enumerate() {
        let key_status = if p.api_key().is_some() { "set" } else { "missing" };
        println!(
            "  {:<4} {:<16} {:<15} {:>9} {:>14}  {} ({key_status})",
            i + 1,
            p.name,
            p.kind.as_str(),
            format!("${:.4}", p.cost_per_request),
            format!("{}/{}ms", p.rate_limit.requests, p.rate_limit.window_ms),
            p.api_key_var(),
        );
    }

    let disabled: Vec<&str> = config
        .providers
        .iter()
        .filter(|p| !p.enabled)
        .map(|p| p.name.as_str())
        .collect();
    if !disabled.is_empty() {
        println!();
        println!("  Disabled in config: {}", disabled.join(", "));
    }
    println!(
        "  Max providers per contact: {}",
        config.cascade.max_providers_per_contact
    );
    println!();
    Ok(())
}

fn cmd_config_init(force: bool) -> Result<()> {
    let path = config_file_path()?;
    if path.exists() && !force {
        return Err(eyre!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
