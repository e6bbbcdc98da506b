// nepse - NEPSE live board: scrape, reconcile, render, publish

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};

use nepse_cli::exit_codes::{EXIT_REFRESH_BUSY, EXIT_REFRESH_DEGRADED, EXIT_REFRESH_EMPTY, EXIT_SUCCESS};
use nepse_cli::export;
use nepse_cli::health::HealthServer;
use nepse_cli::publish;
use nepse_cli::refresh::{RefreshCycle, RefreshOutcome, RefreshReport, StaleReason};
use nepse_cli::render::render_page;
use nepse_cli::scheduler::Scheduler;
use nepse_cli::scrape::{FetchClient, HttpScraper};
use nepse_cli::signals;
use nepse_cli::snapshot::SnapshotCell;
use nepse_cli::CliError;
use nepse_config::{AppConfig, PageSettings};
use nepse_recon::source::load_csv_records;
use nepse_recon::{ReconConfig, ReconInput};

#[derive(Parser)]
#[command(name = "nepse")]
#[command(about = "NEPSE live board: scrape, reconcile, render and publish")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single refresh pass and exit
    #[command(after_help = "\
Exit codes:
  0   page rendered (and published, unless --no-publish)
  10  primary source unreachable, 11 HTTP error, 12 table not found
  20  FTP connect failed, 21 login rejected, 22 upload failed
  30  primary table empty, 31 too many N/A cells, 32 pass already running

Examples:
  nepse once
  nepse once --no-publish --csv board.csv
  NEPSE_CONFIG=/etc/nepse/nepse.toml nepse once")]
    Once {
        /// Service config (default: ./nepse.toml, then the user config dir)
        #[arg(long, env = "NEPSE_CONFIG")]
        config: Option<PathBuf>,

        /// Render but skip the publish step
        #[arg(long)]
        no_publish: bool,

        /// Also write the merged table as CSV
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
    },

    /// Serve the health endpoint and refresh on a schedule until SIGINT/SIGTERM
    Serve {
        /// Service config (default: ./nepse.toml, then the user config dir)
        #[arg(long, env = "NEPSE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Reconcile pre-scraped CSV tables offline
    #[command(after_help = "\
Each --input names a source from the recon config and a headed CSV file.
The primary source is required; a missing secondary reads as empty.

Examples:
  nepse reconcile --recon nepse.recon.toml --input live=live.csv --input today=today.csv
  nepse reconcile --recon nepse.recon.toml --input live=live.csv --format csv -o board.csv")]
    Reconcile {
        /// Reconciliation config (TOML)
        #[arg(long)]
        recon: PathBuf,

        /// Source table as NAME=FILE.csv (repeatable)
        #[arg(long = "input", value_name = "NAME=FILE", required = true)]
        inputs: Vec<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "html")]
        format: OutputFormat,

        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Load and validate both configs, then print the output columns
    CheckConfig {
        /// Service config (default: ./nepse.toml, then the user config dir)
        #[arg(long, env = "NEPSE_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Html,
    Csv,
    Json,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Once { config, no_publish, csv } => cmd_once(config, no_publish, csv),
        Commands::Serve { config } => cmd_serve(config),
        Commands::Reconcile { recon, inputs, format, output } => {
            cmd_reconcile(recon, inputs, format, output)
        }
        Commands::CheckConfig { config } => cmd_check_config(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

fn load_app_config(explicit: Option<&Path>) -> Result<AppConfig, CliError> {
    let cwd = std::env::current_dir().map_err(|e| CliError::io(format!("current directory: {e}")))?;
    let (config, source) = nepse_config::resolve(explicit, &cwd)?;
    log::info!("config: {source}");
    Ok(config)
}

fn load_recon(path: &Path) -> Result<ReconConfig, CliError> {
    let text = fs::read_to_string(path).map_err(|e| {
        CliError::config(format!("cannot read {}: {e}", path.display()))
            .with_hint("point `recon = \"...\"` in nepse.toml at the reconciliation config")
    })?;
    ReconConfig::from_toml(&text)
        .map_err(|e| CliError::config(format!("{}: {e}", path.display())))
}

fn build_cycle(config: &AppConfig, recon: ReconConfig, publish: bool) -> Result<RefreshCycle, CliError> {
    let client = FetchClient::new(&config.fetch)
        .map_err(|e| CliError::general(format!("cannot build HTTP client: {e}")))?;
    let publisher = if publish { publish::from_config(config)? } else { None };
    match &publisher {
        Some(p) => log::info!("publishing to {}", p.describe()),
        None => log::info!("publishing disabled"),
    }

    let (writer, _reader) = SnapshotCell::new().split();
    Ok(RefreshCycle::new(
        recon,
        config.page.clone(),
        Box::new(HttpScraper::new(client)),
        publisher,
        writer,
    )
    .with_max_unavailable_ratio(config.publish.max_unavailable_ratio))
}

// ============================================================================
// once
// ============================================================================

fn cmd_once(config: Option<PathBuf>, no_publish: bool, csv: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_app_config(config.as_deref())?;
    let recon = load_recon(&config.recon_path())?;
    let primary = recon.primary.clone();
    let cycle = build_cycle(&config, recon, !no_publish)?;

    let report = cycle.run_once();

    // The CSV mirrors whatever snapshot this pass swapped in
    if let (Some(path), Some(snapshot)) = (&csv, cycle.reader().latest()) {
        let file = fs::File::create(path)
            .map_err(|e| CliError::io(format!("cannot create {}: {e}", path.display())))?;
        export::write_csv(file, &snapshot.schema, &snapshot.records, &snapshot.schema.sentinel)
            .map_err(|e| CliError::io(format!("{}: {e}", path.display())))?;
        log::info!("wrote {}", path.display());
    }

    outcome_result(report, &primary)
}

/// Exit status for one pass.
fn outcome_result(report: RefreshReport, primary: &str) -> Result<(), CliError> {
    let RefreshReport { outcome, scrape_errors } = report;
    match outcome {
        RefreshOutcome::Refreshed { .. } => Ok(()),
        RefreshOutcome::PublishFailed { error, .. } => Err(CliError::publish(&error)),
        RefreshOutcome::Stale(StaleReason::EmptyPrimary) => {
            match scrape_errors.iter().find(|e| e.source_name() == primary) {
                Some(err) => Err(CliError::scrape(err)),
                None => Err(CliError::new(
                    EXIT_REFRESH_EMPTY,
                    format!("primary source '{primary}' returned no rows"),
                )),
            }
        }
        RefreshOutcome::Stale(reason @ StaleReason::Degraded { .. }) => {
            Err(CliError::new(EXIT_REFRESH_DEGRADED, format!("pass discarded: {reason}"))
                .with_hint("raise publish.max_unavailable_ratio or check the secondary sources"))
        }
        RefreshOutcome::Failed(err) => Err(err.into()),
        RefreshOutcome::Skipped => Err(CliError::new(EXIT_REFRESH_BUSY, "a refresh pass is already running")),
    }
}

// ============================================================================
// serve
// ============================================================================

fn cmd_serve(config: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_app_config(config.as_deref())?;
    let recon = load_recon(&config.recon_path())?;
    let cycle = build_cycle(&config, recon, true)?;

    signals::install();

    let mut health = if config.health.enabled {
        let port = std::env::var("PORT").ok();
        let addr = config.health.socket_addr(port.as_deref())?;
        let server = HealthServer::start(addr, cycle.reader())
            .map_err(|e| CliError::io(format!("cannot bind {addr}: {e}")))?;
        Some(server)
    } else {
        log::info!("health endpoint disabled");
        None
    };

    let interval = Duration::from_secs(config.schedule.interval_secs);
    log::info!("refreshing every {}s", interval.as_secs());

    Scheduler::new(interval).run(signals::shutdown_flag(), || {
        cycle.run_once();
    });

    if let Some(server) = health.as_mut() {
        server.stop();
    }
    Ok(())
}

// ============================================================================
// reconcile
// ============================================================================

fn parse_input_arg(arg: &str) -> Result<(&str, &Path), CliError> {
    match arg.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim(), Path::new(path.trim())))
        }
        _ => Err(CliError::args(format!("--input {arg:?}: expected NAME=FILE.csv"))
            .with_hint("e.g. --input live=live.csv")),
    }
}

fn cmd_reconcile(
    recon_path: PathBuf,
    inputs: Vec<String>,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let recon = load_recon(&recon_path)?;

    let mut input = ReconInput::default();
    for arg in &inputs {
        let (name, path) = parse_input_arg(arg)?;
        let source = recon.sources.get(name).ok_or_else(|| {
            CliError::args(format!("--input {name}: no such source in {}", recon_path.display()))
        })?;
        let text = fs::read_to_string(path)
            .map_err(|e| CliError::args(format!("cannot read {}: {e}", path.display())))?;
        let rows = load_csv_records(name, &text, source)?;
        log::info!("loaded {} rows for '{name}' from {}", rows.len(), path.display());
        input.records.insert(name.to_string(), rows);
    }

    let result = nepse_recon::run(&recon, &input)?;
    log::info!(
        "reconciled {} rows, {} of {} cells unavailable",
        result.summary.rows,
        result.summary.unavailable_cells,
        result.summary.total_cells,
    );

    let body = match format {
        OutputFormat::Html => render_page(
            &PageSettings::default(),
            &result.schema,
            &result.records,
            Utc::now(),
            &result.schema.sentinel,
        )
        .into_bytes(),
        OutputFormat::Csv => {
            let mut buf = Vec::new();
            export::write_csv(&mut buf, &result.schema, &result.records, &result.schema.sentinel)
                .map_err(|e| CliError::io(e.to_string()))?;
            buf
        }
        OutputFormat::Json => {
            let mut buf = serde_json::to_vec_pretty(&export::to_json(&result))
                .map_err(|e| CliError::general(e.to_string()))?;
            buf.push(b'\n');
            buf
        }
    };

    write_output(output.as_deref(), &body)
}

fn write_output(path: Option<&Path>, body: &[u8]) -> Result<(), CliError> {
    match path {
        Some(path) => fs::write(path, body)
            .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display()))),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(body)
                .and_then(|()| handle.flush())
                .map_err(|e| CliError::io(e.to_string()))
        }
    }
}

// ============================================================================
// check-config
// ============================================================================

fn cmd_check_config(config: Option<PathBuf>) -> Result<(), CliError> {
    let cwd = std::env::current_dir().map_err(|e| CliError::io(format!("current directory: {e}")))?;
    let (config, source) = nepse_config::resolve(config.as_deref(), &cwd)?;
    let recon_path = config.recon_path();
    let recon = load_recon(&recon_path)?;

    // Fails on missing credentials for kind = "ftp"
    let publisher = publish::from_config(&config)?;

    let schema = recon.schema();
    let columns: Vec<&str> = ["SN", "Symbol"].into_iter().chain(schema.columns()).collect();

    println!("config:      {source}");
    println!("recon:       {} ({})", recon_path.display(), recon.name);
    println!("primary:     {}", recon.primary);
    println!("secondaries: {}", recon.secondaries.join(", "));
    println!("interval:    {}s", config.schedule.interval_secs);
    match publisher {
        Some(p) => println!("publish:     {} → {}", config.publish.kind.as_str(), p.describe()),
        None => println!("publish:     {}", config.publish.kind.as_str()),
    }
    if config.health.enabled {
        println!("health:      {}", config.health.bind);
    }
    println!("columns:     {}", columns.join(", "));
    Ok(())
}
