use clap::{Parser, Subcommand};
use colored::Colorize;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use tablerecon_core::{Config, DirectionPolicy, RunSummary, StreamKind, WarehouseConfig};
use tablerecon_catalog::{Principal, SessionProvider, SnowflakeProvider};
use tablerecon_engine::{ReconcileRequest, Reconciler};

const DEFAULT_CONFIG: &str = "tablerecon.toml";

/// tablerecon - Reconcile tables and views between two warehouse databases
#[derive(Parser)]
#[command(name = "tablerecon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: tablerecon.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the catalogs and row contents of two databases
    Reconcile {
        /// Left (source) database
        #[arg(long)]
        left: String,

        /// Right (target) database
        #[arg(long)]
        right: String,

        /// User the warehouse sessions are opened for
        #[arg(long, env = "TABLERECON_PRINCIPAL")]
        principal: String,

        /// Directory receiving the CSV artifacts and run report
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Number of sessions comparing objects in parallel
        #[arg(long)]
        concurrency: Option<usize>,

        /// Stop starting new comparisons after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Skip the right-minus-left query when left-minus-right fails
        #[arg(long)]
        legacy_skip_reverse: bool,

        /// Exit with status 1 unless the databases reconcile cleanly
        #[arg(long)]
        fail_on_diff: bool,

        /// Print the run summary as JSON instead of the colored report
        #[arg(long)]
        json: bool,
    },

    /// Check that a session can be opened and queried
    Ping {
        /// User the warehouse session is opened for
        #[arg(long, env = "TABLERECON_PRINCIPAL")]
        principal: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets such as SNOWFLAKE_PASSWORD may live in .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load config if specified
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if Path::new(DEFAULT_CONFIG).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };
    tracing::debug!(
        output = %config.output.directory.display(),
        concurrency = config.diff.concurrency,
        ignored_namespaces = ?config.catalog.ignored_namespaces,
        "Loaded configuration"
    );

    match cli.command {
        Commands::Reconcile {
            left,
            right,
            principal,
            output_dir,
            concurrency,
            timeout_secs,
            legacy_skip_reverse,
            fail_on_diff,
            json,
        } => {
            let mut config = config;
            if let Some(dir) = output_dir {
                config.output.directory = dir;
            }
            if let Some(concurrency) = concurrency {
                config.diff.concurrency = concurrency;
            }
            if timeout_secs.is_some() {
                config.diff.timeout_secs = timeout_secs;
            }
            if legacy_skip_reverse {
                config.diff.direction_policy = DirectionPolicy::SkipReverseOnError;
            }
            config.validate()?;

            let request = ReconcileRequest::new(left, right, Principal::new(principal));
            reconcile_command(config, &request, fail_on_diff, json, cli.verbose).await
        }
        Commands::Ping { principal } => ping_command(config, &Principal::new(principal), cli.verbose).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Reconcile command - compare two databases and write the artifacts
async fn reconcile_command(
    config: Config,
    request: &ReconcileRequest,
    fail_on_diff: bool,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let provider = build_provider(&config, verbose)?;
    let output = config.output.clone();

    if verbose {
        eprintln!(
            "{} {} {} {} ({} via {})",
            "Reconciling".cyan(),
            request.left,
            "against".cyan(),
            request.right,
            request.principal,
            provider.name()
        );
    }

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let result = Reconciler::new(provider, config).reconcile(request, cancel).await;
    ctrl_c.abort();

    let summary = result.map_err(|e| anyhow::Error::new(e).context("Reconciliation failed"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if verbose {
        for stream in StreamKind::ALL {
            eprintln!("{} {}", "Wrote".green(), output.path_for(stream).display());
        }
        if let Some(path) = output.run_report_path() {
            eprintln!("{} {}", "Wrote".green(), path.display());
        }
    }

    if fail_on_diff && !summary.is_clean() {
        std::process::exit(1);
    }

    Ok(())
}

/// Ping command - open a session and run a trivial query
async fn ping_command(config: Config, principal: &Principal, verbose: bool) -> Result<()> {
    let provider = build_provider(&config, verbose)?;
    let name = provider.name();

    if verbose {
        eprintln!("{} {} as {}...", "Connecting to".cyan(), name, principal);
    }

    Reconciler::new(provider, config)
        .ping(principal)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to warehouse: {}", e))?;

    println!("{} {} session opened for {}", "✓".green(), name, principal);
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!(
            "{}",
            "Interrupted, finishing in-flight comparisons and writing artifacts...".yellow()
        );
        cancel.cancel();
    }
}

/// Build the session provider from the [warehouse] section
fn build_provider(config: &Config, verbose: bool) -> Result<Box<dyn SessionProvider>> {
    let warehouse_config = config.warehouse.clone().unwrap_or_else(|| {
        if verbose {
            eprintln!("{}", "No [warehouse] section, using Snowflake with environment settings".yellow());
        }
        WarehouseConfig::default()
    });

    match warehouse_config.warehouse_type.to_lowercase().as_str() {
        "snowflake" => Ok(Box::new(snowflake_provider(&warehouse_config)?)),
        _ => Err(anyhow::anyhow!(
            "Unsupported warehouse type '{}'. Supported: snowflake",
            warehouse_config.warehouse_type
        )),
    }
}

fn snowflake_provider(warehouse_config: &WarehouseConfig) -> Result<SnowflakeProvider> {
    let account = warehouse_config
        .setting_or_env("account", "SNOWFLAKE_ACCOUNT")
        .ok_or_else(|| anyhow::anyhow!(
            "Snowflake requires 'account' in warehouse settings or SNOWFLAKE_ACCOUNT"
        ))?;

    let mut provider = if let Some(key_path) =
        warehouse_config.setting_or_env("private_key_path", "SNOWFLAKE_PRIVATE_KEY_PATH")
    {
        let pem = std::fs::read_to_string(&key_path)
            .map_err(|e| anyhow::anyhow!("Failed to read private key {}: {}", key_path, e))?;
        SnowflakeProvider::with_key_pair(account, pem)
    } else {
        let password = warehouse_config
            .setting_or_env("password", "SNOWFLAKE_PASSWORD")
            .ok_or_else(|| anyhow::anyhow!(
                "Snowflake requires 'password' or 'private_key_path' in warehouse settings \
                 (or SNOWFLAKE_PASSWORD / SNOWFLAKE_PRIVATE_KEY_PATH)"
            ))?;
        SnowflakeProvider::with_password(account, password)
    };

    if let Some(warehouse) = warehouse_config.setting_or_env("warehouse", "SNOWFLAKE_WAREHOUSE") {
        provider = provider.with_warehouse(warehouse);
    }
    if let Some(role) = warehouse_config.setting_or_env("role", "SNOWFLAKE_ROLE") {
        provider = provider.with_role(role);
    }

    Ok(provider)
}

/// Print reconciliation summary
fn print_summary(summary: &RunSummary) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!(
        "{}",
        format!("Reconciliation Report: {} vs {}", summary.left, summary.right)
            .bold()
            .bright_blue()
    );
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{}", "Catalog:".bold());
    println!("  Only in {}: {}", summary.left, count(summary.only_left, Level::Warn));
    println!("  Only in {}: {}", summary.right, count(summary.only_right, Level::Warn));
    println!("  In both:    {}", summary.common);
    println!();

    println!("{}", "Content:".bold());
    println!("  Matched:    {}", format!("{}", summary.matched).green());
    println!("  Mismatched: {}", count(summary.mismatched, Level::Warn));
    println!("  Errored:    {}", count(summary.errored, Level::Error));
    if summary.skipped > 0 {
        println!("  Skipped:    {}", count(summary.skipped, Level::Warn));
    }
    println!();

    if summary.is_clean() {
        println!("{}", "✓ Databases reconcile".green().bold());
    } else if summary.cancelled {
        println!("{}", "⚠ Run cancelled before every object was compared".yellow().bold());
    } else if summary.errored > 0 {
        println!("{}", "✗ Some objects could not be compared".red().bold());
    } else {
        println!("{}", "⚠ Differences found".yellow().bold());
    }
}

enum Level {
    Warn,
    Error,
}

fn count(value: usize, level: Level) -> colored::ColoredString {
    let text = format!("{}", value);
    match (value, level) {
        (0, _) => text.green(),
        (_, Level::Warn) => text.yellow(),
        (_, Level::Error) => text.red().bold(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_reconcile_flags() {
        let cli = Cli::try_parse_from([
            "tablerecon",
            "reconcile",
            "--left",
            "PROD",
            "--right",
            "DEV",
            "--principal",
            "analyst@example.com",
            "--concurrency",
            "4",
            "--legacy-skip-reverse",
        ])
        .unwrap();

        match cli.command {
            Commands::Reconcile { left, right, concurrency, legacy_skip_reverse, fail_on_diff, .. } => {
                assert_eq!(left, "PROD");
                assert_eq!(right, "DEV");
                assert_eq!(concurrency, Some(4));
                assert!(legacy_skip_reverse);
                assert!(!fail_on_diff);
            }
            Commands::Ping { .. } => panic!("expected reconcile"),
        }
    }

    #[test]
    fn unsupported_warehouse_type() {
        let config = Config {
            warehouse: Some(WarehouseConfig {
                warehouse_type: "oracle".to_string(),
                settings: HashMap::new(),
            }),
            ..Config::default()
        };
        assert!(build_provider(&config, false).is_err());
    }

    #[test]
    fn snowflake_provider_from_settings() {
        let settings = HashMap::from([
            ("account".to_string(), "xy12345".to_string()),
            ("password".to_string(), "secret".to_string()),
            ("warehouse".to_string(), "COMPUTE_WH".to_string()),
        ]);
        let provider = snowflake_provider(&WarehouseConfig {
            warehouse_type: "snowflake".to_string(),
            settings,
        })
        .unwrap();
        assert_eq!(provider.account(), "xy12345");
    }
}
