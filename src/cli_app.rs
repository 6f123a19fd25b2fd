//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::thread::JoinHandle;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use telemetry_disk_manager::core::config::{Config, SharedBufferingConfig};
use telemetry_disk_manager::core::errors::TdmError;
use telemetry_disk_manager::core::paths::SignalType;
use telemetry_disk_manager::disk::cleanup::ensure_dir;
use telemetry_disk_manager::disk::manager::{DiskSpaceManager, MAX_FOLDER_SIZE_KEY};
use telemetry_disk_manager::logger::activity::{
    ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger,
};

/// Telemetry disk manager: buffer layout, temp hygiene, and folder budgets.
#[derive(Debug, Parser)]
#[command(
    name = "tdm",
    author,
    version,
    about = "Telemetry Disk Manager - buffer directories and size budgets",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Ensure and print the buffer directory layout.
    Layout,
    /// Show the per-signal folder budget, computing it if needed.
    Budget(BudgetArgs),
    /// Empty the temp directory and recreate it.
    PurgeTemp,
    /// View configuration state.
    Config(ConfigArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct BudgetArgs {
    /// Clear the persisted budget so the next resolution recomputes it.
    #[arg(long)]
    reset: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args, Default)]
struct VersionArgs {
    /// Include additional build metadata fields.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<TdmError> for CliError {
    fn from(err: TdmError) -> Self {
        match err {
            TdmError::InvalidConfig { .. }
            | TdmError::MissingConfig { .. }
            | TdmError::ConfigParse { .. } => Self::User(err.to_string()),
            TdmError::Serialization { .. } => Self::Internal(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Layout => run_layout(cli),
        Command::Budget(args) => run_budget(cli, args),
        Command::PurgeTemp => run_purge_temp(cli),
        Command::Config(args) => run_config(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

/// A manager plus the logger thread feeding the activity log.
struct Session {
    manager: DiskSpaceManager,
    logger: Option<(ActivityLoggerHandle, JoinHandle<()>)>,
}

impl Session {
    fn open(config: &Config) -> Self {
        let logger = match spawn_logger(ActivityLoggerConfig::from_config(config)) {
            Ok(pair) => Some(pair),
            Err(e) => {
                eprintln!("tdm: activity log disabled: {e}");
                None
            }
        };
        let handle = logger.as_ref().map(|(handle, _)| handle.clone());
        Self {
            manager: DiskSpaceManager::from_config(
                config,
                SharedBufferingConfig::new(config.buffering),
                handle,
            ),
            logger,
        }
    }

    fn close(self) {
        drop(self.manager);
        if let Some((handle, join)) = self.logger {
            handle.shutdown();
            let _ = join.join();
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

/// Print that disk buffering is switched off. Returns true when `command`
/// must not touch the cache root or the store.
fn buffering_disabled(cli: &Cli, config: &Config, command: &str) -> Result<bool, CliError> {
    if config.buffering.enabled {
        return Ok(false);
    }
    match output_mode(cli) {
        OutputMode::Human => println!(
            "{} disk buffering is disabled (buffering.enabled = false); {command} skipped",
            "note:".yellow().bold()
        ),
        OutputMode::Json => write_json_line(&json!({
            "command": command,
            "buffering_enabled": false,
        }))?,
    }
    Ok(true)
}

fn run_layout(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli)?;
    if buffering_disabled(cli, &config, "layout")? {
        return Ok(());
    }
    let session = Session::open(&config);
    let result = emit_layout(cli, &session.manager);
    session.close();
    result
}

fn emit_layout(cli: &Cli, manager: &DiskSpaceManager) -> Result<(), CliError> {
    let signals = manager.signals_buffer_dir()?;
    // Ensured without the purge; `purge-temp` is the explicit way to empty it.
    let temp = manager.temporary_path();
    ensure_dir(&temp)?;

    let layout = manager.layout();
    let cache_root = layout.root();
    let capacity = manager.capacity();
    let folders: Vec<(SignalType, PathBuf)> = SignalType::ALL
        .iter()
        .map(|kind| (*kind, manager.signal_dir(*kind)))
        .collect();

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", "Buffer layout".bold());
            println!("  cache root:  {}", cache_root.display());
            println!("  signals:     {}", signals.display());
            println!("  temp:        {}", temp.display());
            for (kind, path) in &folders {
                let state = if path.is_dir() {
                    "present".green()
                } else {
                    "absent".dimmed()
                };
                println!("  {:<12} {} ({state})", format!("{}:", kind.dir_name()), path.display());
            }
            match &capacity {
                Ok(cap) => println!(
                    "  capacity:    {} free of {} ({:.1}%)",
                    format_bytes(cap.available_bytes),
                    format_bytes(cap.total_bytes),
                    cap.available_pct()
                ),
                Err(e) => println!("  capacity:    {}", format!("unavailable ({e})").yellow()),
            }
        }
        OutputMode::Json => {
            let signal_dirs: serde_json::Map<String, Value> = folders
                .iter()
                .map(|(kind, path)| {
                    (
                        kind.dir_name().to_string(),
                        json!({ "path": path.to_string_lossy(), "exists": path.is_dir() }),
                    )
                })
                .collect();
            let payload = json!({
                "command": "layout",
                "cache_root": cache_root.to_string_lossy(),
                "signals_dir": signals.to_string_lossy(),
                "temp_dir": temp.to_string_lossy(),
                "signal_dirs": signal_dirs,
                "capacity": capacity.as_ref().ok(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_budget(cli: &Cli, args: &BudgetArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let command = if args.reset { "budget reset" } else { "budget" };
    if buffering_disabled(cli, &config, command)? {
        return Ok(());
    }
    let session = Session::open(&config);
    let result = if args.reset {
        emit_budget_reset(cli, &config, &session.manager)
    } else {
        emit_budget(cli, &session.manager)
    };
    session.close();
    result
}

fn emit_budget(cli: &Cli, manager: &DiskSpaceManager) -> Result<(), CliError> {
    let was_persisted = manager.persisted_folder_size()?.is_some();
    let (folder_size, persist_error) = match manager.max_folder_size() {
        Ok(size) => (size, None),
        Err(e) => match e.computed_budget() {
            Some(size) => (size, Some(e)),
            None => return Err(e.into()),
        },
    };
    let file_size = manager.max_cache_file_size();
    let source = if was_persisted { "persisted" } else { "computed" };

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", "Folder budget".bold());
            println!(
                "  max folder size:     {} ({folder_size} bytes, {source})",
                format_bytes(folder_size)
            );
            println!(
                "  max cache file size: {} ({file_size} bytes)",
                format_bytes(file_size)
            );
            if let Some(e) = &persist_error {
                eprintln!("{} {e}", "warning:".yellow().bold());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "budget",
                "key": MAX_FOLDER_SIZE_KEY,
                "max_folder_size": folder_size,
                "max_cache_file_size": file_size,
                "source": source,
                "persisted": persist_error.is_none(),
                "error": persist_error.as_ref().map(ToString::to_string),
            });
            write_json_line(&payload)?;
        }
    }

    match persist_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn emit_budget_reset(
    cli: &Cli,
    config: &Config,
    manager: &DiskSpaceManager,
) -> Result<(), CliError> {
    let previous = manager.persisted_folder_size()?;
    manager.reset_folder_size()?;

    match output_mode(cli) {
        OutputMode::Human => {
            match previous {
                Some(bytes) => println!("Cleared persisted folder budget ({bytes} bytes)."),
                None => println!("No persisted folder budget to clear."),
            }
            println!("  store: {}", config.paths.preferences_file.display());
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "budget reset",
                "key": MAX_FOLDER_SIZE_KEY,
                "previous": previous,
                "store": config.paths.preferences_file.to_string_lossy(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_purge_temp(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli)?;
    if buffering_disabled(cli, &config, "purge-temp")? {
        return Ok(());
    }
    let session = Session::open(&config);
    let result = session
        .manager
        .temporary_dir()
        .map_err(CliError::from)
        .and_then(|path| {
            match output_mode(cli) {
                OutputMode::Human => println!("Temp directory purged: {}", path.display()),
                OutputMode::Json => write_json_line(&json!({
                    "command": "purge-temp",
                    "temp_dir": path.to_string_lossy(),
                    "purged": true,
                }))?,
            }
            Ok(())
        });
    session.close();
    result
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error_code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(e.into())
            }
        },
    }
}

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let git_sha = option_env!("GIT_SHA").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("tdm {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
                println!("git_sha: {git_sha}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "tdm",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                    "git_sha": git_sha,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("TDM_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
