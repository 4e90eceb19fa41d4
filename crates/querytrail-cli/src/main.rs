use clap::{Parser, Subcommand};
use colored::Colorize;
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use querytrail_core::{TimeWindow, WorkflowConfig};
use querytrail_connect::{resolve, Connection, ConnectionAcquirer, DriverAcquirer};
use querytrail_usage::{dialect_for, UsageSource};

/// querytrail - connection resolution and query usage extraction
#[derive(Parser)]
#[command(name = "querytrail")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to workflow file (default: querytrail.toml)
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
    /// Print the resolved connection URL and driver arguments
    Url {
        /// Print the password instead of masking it
        #[arg(long)]
        show_secrets: bool,
    },

    /// Open a connection and run a trivial statement
    TestConnection,

    /// Extract query usage and write it as JSON lines
    Usage {
        /// Output file for usage records
        #[arg(short, long, default_value = "usage.jsonl")]
        output: PathBuf,

        /// First day to extract (YYYY-MM-DD); defaults to queryLogDuration days ago
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Day after the last day to extract (YYYY-MM-DD); defaults to today
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from("querytrail.toml"));
    let config = load_config(&config_path)?;

    if cli.verbose {
        eprintln!(
            "{} {} ({})",
            "Using source".cyan(),
            config.source.service_name,
            config.source.service_connection.service_type()
        );
    }

    match cli.command {
        Commands::Url { show_secrets } => url_command(&config, show_secrets),
        Commands::TestConnection => test_connection_command(&config, cli.verbose).await,
        Commands::Usage { output, start, end } => {
            usage_command(config, &output, start, end, cli.verbose).await
        }
    }
}

fn load_config(path: &Path) -> Result<WorkflowConfig> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "Workflow file not found at {}. Pass --config or create querytrail.toml.",
            path.display()
        ));
    }

    let config = WorkflowConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path.display(), e))?;
    tracing::debug!("Loaded workflow from {}", path.display());
    Ok(config)
}

/// Url command - show what a driver would be handed
fn url_command(config: &WorkflowConfig, show_secrets: bool) -> Result<()> {
    let resolved = resolve(&config.source.service_connection)?;

    let uri = if show_secrets {
        resolved.uri.clone()
    } else {
        resolved.redacted_uri()
    };

    println!("{} {}", "URL:".bold(), uri.green());
    println!("{} {}", "Dialect:".bold(), resolved.dialect());
    println!("{}", "Arguments:".bold());
    println!("{}", serde_json::to_string_pretty(&resolved.args)?);

    Ok(())
}

/// Test-connection command - acquire a connection and run `SELECT 1`
async fn test_connection_command(config: &WorkflowConfig, verbose: bool) -> Result<()> {
    let resolved = resolve(&config.source.service_connection)?;

    if verbose {
        eprintln!("{} {}...", "Connecting to".cyan(), resolved.redacted_uri());
    }

    let acquirer = DriverAcquirer::new();
    let mut connection = acquirer
        .acquire(&resolved)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect: {}", e))?;

    connection
        .test_connection()
        .await
        .map_err(|e| anyhow::anyhow!("Connection test failed: {}", e))?;

    println!("{} {}", "✓ Connection successful:".green(), connection.backend());
    Ok(())
}

/// Usage command - extract query history into JSON lines
async fn usage_command(
    config: WorkflowConfig,
    output: &Path,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    verbose: bool,
) -> Result<()> {
    let source_config = config.source;
    let duration = i64::from(source_config.source_config.query_log_duration);

    let source = if start.is_none() && end.is_none() {
        UsageSource::from_config(source_config)?
    } else {
        let end = match end {
            Some(day) => midnight(day)?,
            None => TimeWindow::for_duration(0, Utc::now()).end,
        };
        let start = match start {
            Some(day) => midnight(day)?,
            None => end - Duration::days(duration),
        };
        if start >= end {
            return Err(anyhow::anyhow!("--start must be before --end"));
        }

        let dialect = dialect_for(&source_config.source_type)?;
        UsageSource::with_window(source_config, dialect, TimeWindow::new(start, end))?
    };

    if verbose {
        eprintln!(
            "{} {} over {}",
            "Extracting".cyan(),
            source.dialect().source_type(),
            source.window()
        );
    }

    let acquirer = DriverAcquirer::new();
    let mut extract = source.extract(&acquirer).await?;

    let mut writer = BufWriter::new(std::fs::File::create(output)?);
    let mut written = 0usize;
    let mut aborted = 0usize;

    while let Some(record) = extract.next_record().await? {
        if record.aborted {
            aborted += 1;
        }
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Usage Extraction Summary".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
    println!("{} {}", "Service:".bold(), source.config().service_name);
    println!("{} {}", "Window:".bold(), source.window());
    println!("{} {}", "Queries:".bold(), written.to_string().green());
    if aborted > 0 {
        println!("{} {}", "Aborted:".bold(), aborted.to_string().yellow());
    }
    println!("{} {}", "Output:".bold(), output.display());
    println!();
    println!("{}", "=".repeat(60).bright_blue());

    Ok(())
}

fn midnight(day: NaiveDate) -> Result<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow::anyhow!("Invalid date {}", day))
}
