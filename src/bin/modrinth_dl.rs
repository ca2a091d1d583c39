use std::fs::{self, File};
use std::process::ExitCode;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use modrinth_downloader::app::{App, EntryAction, Job, RunOptions, RunReport};
use modrinth_downloader::cache::{JsonFileCache, MemoryCache, VersionCache};
use modrinth_downloader::catalog::{Catalog, ModrinthHttpClient};
use modrinth_downloader::config::{CacheSetting, ConfigLoader, ConfigOverrides, ResolvedConfig};
use modrinth_downloader::console::ConsoleProgress;
use modrinth_downloader::download::Downloader;
use modrinth_downloader::error::DownloaderError;
use modrinth_downloader::output::{JsonOutput, OutputMode};
use modrinth_downloader::progress::ProgressSink;

#[derive(Parser)]
#[command(name = "modrinth-dl")]
#[command(about = "Download a Modrinth collection or mod list together with every required dependency")]
#[command(version, author)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    #[arg(short, long, global = true, help = "personal access token")]
    token: Option<String>,

    #[arg(short, long = "game", global = true, help = "game version")]
    game_version: Option<String>,

    #[arg(short, long, global = true, help = "mod loader")]
    loader: Option<String>,

    #[arg(short, long, global = true, alias = "game-path", help = "path to game directory")]
    destination: Option<String>,

    #[arg(long, global = true, help = "path to config file (default: ./modrinth-dl.json)")]
    config: Option<String>,

    #[arg(long, global = true)]
    cache_file: Option<String>,

    #[arg(long, global = true, help = "keep version metadata in memory only")]
    no_cache: bool,

    #[arg(long, global = true, help = "version ids per batch request")]
    chunk_size: Option<usize>,

    #[arg(long, global = true)]
    api_url: Option<String>,

    #[arg(long, global = true, help = "resolve only, do not download")]
    dry_run: bool,

    #[arg(long, global = true, help = "print the run report as JSON")]
    json: bool,

    #[arg(long, global = true, help = "write a debug log file per run into this directory")]
    log_dir: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download every project of a collection (URL or ID)")]
    Collection { reference: String },
    #[command(about = "Download the mods listed in a CSV file (id_or_slug[,version_id])")]
    List { csv: String },
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<DownloaderError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DownloaderError) -> u8 {
    if error.is_configuration() {
        2
    } else if error.is_catalog() {
        3
    } else {
        1
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.log_dir.as_deref())?;

    let global = cli.global;
    let overrides = ConfigOverrides {
        token: global.token,
        game_version: global.game_version,
        loader: global.loader,
        destination: global.destination,
        cache_file: global.cache_file,
        chunk_size: global.chunk_size,
        api_url: global.api_url,
        no_cache: global.no_cache,
    };
    let config = ConfigLoader::resolve(global.config.as_deref(), overrides)?;
    tracing::debug!(
        game_version = %config.compatibility.game_version,
        loader = %config.compatibility.loader,
        destination = %config.destination,
        cache = ?config.cache,
        chunk_size = config.chunk_size,
        "configuration resolved"
    );

    let output_mode = if global.json {
        OutputMode::Json
    } else {
        OutputMode::Interactive
    };
    let options = RunOptions {
        dry_run: global.dry_run,
    };
    let job = match cli.command {
        Commands::Collection { reference } => Job::collection(&reference)?,
        Commands::List { csv } => Job::mod_list(&Utf8PathBuf::from(csv))?,
    };

    match config.cache.clone() {
        CacheSetting::File(path) => run_with_cache(
            JsonFileCache::new(path),
            &config,
            &job,
            &options,
            output_mode,
        ),
        CacheSetting::Memory => {
            run_with_cache(MemoryCache::new(), &config, &job, &options, output_mode)
        }
    }
}

fn run_with_cache<C: VersionCache>(
    cache: C,
    config: &ResolvedConfig,
    job: &Job,
    options: &RunOptions,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let api = ModrinthHttpClient::new(&config.token, &config.api_url)?;
    let catalog = Catalog::connect(api, cache, config.compatibility.clone(), config.chunk_size)?;
    fs::create_dir_all(config.destination.as_std_path())
        .map_err(|err| DownloaderError::Filesystem(format!("create {}: {err}", config.destination)))?;
    let mut app = App::new(catalog, Downloader::new(config.destination.clone()));

    let console = ConsoleProgress::new();
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Interactive => {
            println!("{}\nModrinth Downloader\n{}", "-".repeat(64), "-".repeat(64));
            println!(
                "Game version: {}\nLoader: {}\n",
                config.compatibility.game_version, config.compatibility.loader
            );
            &console
        }
    };

    let report = app.run(job, options, sink)?;
    console.finish_phase();

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Interactive => print_summary(&report),
    }
    Ok(())
}

fn init_logging(log_dir: Option<&str>) -> miette::Result<()> {
    let Some(log_dir) = log_dir else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    };

    fs::create_dir_all(log_dir)
        .map_err(|err| DownloaderError::Filesystem(format!("create {log_dir}: {err}")))?;
    let file_name = format!("{}.log", chrono::Local::now().format("%y%m%d.%H%M%S.%f"));
    let path = Utf8PathBuf::from(log_dir).join(file_name);
    let file = File::create(path.as_std_path())
        .map_err(|err| DownloaderError::Filesystem(format!("create {path}: {err}")))?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("debug,reqwest=warn,hyper=warn,hyper_util=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn print_summary(report: &RunReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!();
    if let Some(collection) = &report.collection {
        println!("{cyan}Collection: {collection}{reset}");
    }
    println!(
        "{green}downloaded {}{reset}  {yellow}already present {}{reset}  planned {}  without primary file {}",
        report.count(EntryAction::Downloaded),
        report.count(EntryAction::AlreadyPresent),
        report.count(EntryAction::Planned),
        report.count(EntryAction::NoPrimaryFile),
    );
    if !report.failures.is_empty() {
        println!("{red}failed {}{reset}", report.failures.len());
        for failure in &report.failures {
            println!("{red}  - {}: {}{reset}", failure.item, failure.message);
        }
    }
}
