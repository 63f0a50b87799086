//! Scancard control - command line client for laser marking scancards.

use std::path::PathBuf;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use scancard_control as app;
use tokio_util::sync::CancellationToken;

use app::automation::{JobProgress, LayerAutomation, run_job};
use app::config::{AppConfig, ConfigLoadResult, LoggingConfig};
use app::console::Console;
use app::job::{self, JobScan};
use app::logging;
use app::AppError;
use app::scancard::{self, Response, ScancardClient, ScancardError};

/// Control client for a laser marking scancard.
#[derive(Parser)]
#[command(name = "scancard-control", version)]
struct Cli {
    /// Use config.toml from current directory (dev mode)
    #[arg(long, global = true)]
    dev: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, conflicts_with = "dev")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query the working status (0 = ready)
    Status,
    /// Read or write mark parameters
    #[command(subcommand)]
    Params(ParamsCommand),
    /// Open a job file on the scancard
    Open { path: PathBuf },
    /// Close the open job file
    Close,
    /// Start marking
    Start,
    /// Stop marking
    Stop,
    /// Download updated parameters to the scancard
    Download,
    /// Count layer job files in a directory
    Scan { dir: Option<PathBuf> },
    /// Mark every layer of a job
    Run {
        /// Job directory (defaults to the configured one)
        dir: Option<PathBuf>,
        /// First-layer job file, instead of scanning a directory
        #[arg(long, conflicts_with = "dir")]
        file: Option<PathBuf>,
        /// Number of layers when using --file
        #[arg(long, requires = "file")]
        layers: Option<u32>,
    },
    /// Check that the scancard is reachable and answering
    Diagnose,
    /// Write a config file with default values
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ParamsCommand {
    /// Fetch the active parameter set
    Get {
        #[arg(long, value_enum, default_value_t = Addressing::Layer)]
        by: Addressing,
    },
    /// Send the configured parameters
    Set {
        /// Outer parameter index
        #[arg(long, conflicts_with = "layer")]
        index: Option<i32>,
        /// Inner parameter index
        #[arg(long, requires = "index", allow_hyphen_values = true)]
        in_index: Option<i32>,
        /// Parameter layer (defaults to automation.parameter_layer)
        #[arg(long)]
        layer: Option<i32>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Addressing {
    Index,
    Layer,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Determine config path based on mode
    let config_path = match (&cli.config, cli.dev) {
        (Some(path), _) => path.clone(),
        (None, true) => PathBuf::from("config.toml"),
        (None, false) => AppConfig::default_path(),
    };

    if let Command::InitConfig { force } = cli.command {
        if config_path.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", config_path.display());
        }
        AppConfig::default().save(&config_path)?;
        println!("Wrote default config to {}", config_path.display());
        return Ok(());
    }

    let loaded = AppConfig::try_load(&config_path);
    let logging_config = match &loaded {
        ConfigLoadResult::Loaded(config) => config.logging.clone(),
        _ => LoggingConfig::default(),
    };
    let _log_guard = logging::init(&logging_config)?;

    tracing::info!("Scancard control starting...");
    tracing::info!("Config path: {:?}", config_path);

    let config = match loaded {
        ConfigLoadResult::Loaded(config) => {
            tracing::info!("Config loaded successfully");
            config
        }
        ConfigLoadResult::Missing => {
            tracing::info!("Config missing, using defaults");
            AppConfig::default()
        }
        ConfigLoadResult::Invalid(e) => {
            tracing::error!("Config invalid: {}", e);
            return Err(e).with_context(|| format!("Invalid config at {}", config_path.display()));
        }
    };

    let (console, mut rx) = Console::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if event.is_error() {
                eprintln!("{event}");
            } else {
                println!("{event}");
            }
        }
    });

    // Every console handle lives inside `execute`; the printer ends once it returns.
    let result = execute(cli.command, &config, console).await;
    let _ = printer.await;

    if let Err(e) = &result
        && (e.is::<ScancardError>() || e.downcast_ref::<AppError>().is_some_and(AppError::is_transaction_failure))
    {
        eprintln!("Run `scancard-control diagnose` to check the scancard connection");
    }
    result
}

async fn execute(command: Command, config: &AppConfig, console: Console) -> anyhow::Result<()> {
    match command {
        Command::Status => report(client(config, console)?.get_working_status().await),
        Command::Params(ParamsCommand::Get { by }) => {
            let client = client(config, console)?;
            let outcome = match by {
                Addressing::Index => client.get_markparameters_by_index().await,
                Addressing::Layer => client.get_markparameters_by_layer().await,
            };
            report(outcome)
        }
        Command::Params(ParamsCommand::Set { index, in_index, layer }) => {
            let client = client(config, console.clone())?;
            let outcome = match index {
                Some(index) => {
                    client
                        .set_markparameters_by_index(index, in_index.unwrap_or(0), &config.parameters)
                        .await
                }
                None => {
                    let layer = layer.unwrap_or(config.automation.parameter_layer);
                    client.set_markparameters_by_layer(layer, &config.parameters).await
                }
            };
            report(outcome)?;
            console.info("Run `download` to apply the new parameters");
            Ok(())
        }
        Command::Open { path } => {
            job::validate_job_file(&path, &config.job.marker)?;
            report(client(config, console)?.open_file(&path).await)
        }
        Command::Close => report(client(config, console)?.close_file().await),
        Command::Start => report(client(config, console)?.start_mark().await),
        Command::Stop => report(client(config, console)?.stop_mark().await),
        Command::Download => report(client(config, console)?.download_parameters().await),
        Command::Scan { dir } => {
            let dir = job_dir(dir, config)?;
            let scan = job::scan(&dir, &config.job.marker, &console)?;
            println!("Layers: {}", scan.layer_count);
            match &scan.first_layer {
                Some(path) => println!("First layer: {}", path.display()),
                None => println!("First layer: not found"),
            }
            if !scan.rejected.is_empty() {
                println!("Skipped: {} files without the .{} marker", scan.rejected.len(), config.job.marker);
            }
            Ok(())
        }
        Command::Run { dir, file, layers } => {
            let scan = match file {
                Some(file) => {
                    job::validate_job_file(&file, &config.job.marker)?;
                    JobScan {
                        layer_count: layers.unwrap_or(1),
                        first_layer: Some(file),
                        rejected: Vec::new(),
                    }
                }
                None => job::scan(&job_dir(dir, config)?, &config.job.marker, &console)?,
            };
            run(config, console, scan).await
        }
        Command::Diagnose => {
            let diagnosis = client(config, console)?.diagnose().await;
            println!("{diagnosis}");
            Ok(())
        }
        Command::InitConfig { .. } => unreachable!("handled before config load"),
    }
}

async fn run(config: &AppConfig, console: Console, scan: JobScan) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling job");
            trigger.cancel();
        }
    });

    let client = client(config, console.clone())?;
    let mut automation = LayerAutomation::new(client, config.parameters, &config.automation, cancel);

    let report = run_job(&mut automation, &scan, |event| match event {
        JobProgress::LayerStarted { layer, total } => console.info(format!("Layer {layer}/{total} started")),
        JobProgress::LayerCompleted {
            layer,
            total,
            poll_attempts,
        } => console.info(format!(
            "Layer {layer}/{total} done after {poll_attempts} status polls"
        )),
        JobProgress::Completed { layers, timestamp } => console.info(format!(
            "All {layers} layers marked at {}",
            timestamp.format("%H:%M:%S")
        )),
        JobProgress::Failed { layer, error } => console.error(format!("Job stopped at layer {layer}: {error}")),
    })
    .await?;

    println!("{}", report.summary());
    Ok(())
}

fn client(config: &AppConfig, console: Console) -> anyhow::Result<ScancardClient> {
    Ok(ScancardClient::new(&config.scancard, console)?)
}

fn job_dir(dir: Option<PathBuf>, config: &AppConfig) -> anyhow::Result<PathBuf> {
    dir.or_else(|| config.job.directory.clone())
        .ok_or_else(|| anyhow!("No job directory given and none configured in [job]"))
}

fn report(outcome: scancard::Result<Response>) -> anyhow::Result<()> {
    let response = outcome?;
    let state = if response.is_ready() { "ready" } else { "busy" };
    println!("Result code: {} ({state})", response.result_code());
    println!("{}", response.pretty());
    Ok(())
}
