//! image-sort - copy photos and videos into a Year/Month/Day tree
//!
//! Command line front end: loads configuration, sets up logging, drains a
//! sorting run and prints a summary.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use image_sort::{
    Cli, Config, CopyOutcome, Error, ErrorLog, ExtensionRegistry, Processor, ProgressEvent,
    extract,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli_output {
    //! Colored terminal output for the command line

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::io::stdout;

    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const WARNING: Color = Color::Yellow;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
        pub const ACCENT: Color = Color::Cyan;
    }

    pub fn print_separator() {
        let _ = stdout().execute(Print(format!("{}\n", "─".repeat(60))));
    }

    pub fn print_title(title: &str) {
        let padding = 60usize.saturating_sub(title.len()) / 2;
        let _ = stdout().execute(Print(" ".repeat(padding)));
        let _ = stdout().execute(Print(style(title).bold()));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_hint(msg: &str) {
        let _ = stdout().execute(Print(style("→ ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_stat(key: &str, value: usize, color: Color) {
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(key).with(CliTheme::HINT)));
        let _ = stdout().execute(Print(": "));
        let _ = stdout().execute(Print(style(value.to_string()).with(color).bold()));
        let _ = stdout().execute(Print("\n"));
    }

    /// One line per file in verbose mode
    pub fn print_result(icon: &str, color: Color, source: &str, detail: &str) {
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(icon).with(color).bold()));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(style(source).italic()));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(style(detail).with(CliTheme::HINT)));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_path(label: &str, path: &str) {
        let _ = stdout().execute(Print(style(format!("  {}: ", label)).with(CliTheme::ACCENT)));
        let _ = stdout().execute(Print(format!("{}\n", path)));
    }

    pub fn print_blank() {
        let _ = stdout().execute(Print("\n"));
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // A single record dump or a starter config needs no logging or output tree
    if let Some(ref file) = cli.show {
        show_record(&cli, file)?;
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(ref path) = cli.init {
        Config::write_sample(path)?;
        cli_output::print_hint(&format!("Sample configuration written to {}", path.display()));
        return Ok(ExitCode::SUCCESS);
    }

    let exe_dir = get_executable_dir()?;
    let log_path = get_log_path(&exe_dir, &cli);
    let _guard = setup_logging(&cli, &log_path)?;

    info!(version = env!("CARGO_PKG_VERSION"), "image-sort starting");

    let config = load_config(&cli, &exe_dir)?;
    if config.verbose {
        info!(?config, "Configuration loaded");
    }
    info!(log_file = %log_path.display(), "Log file location");

    if let Some(ref path) = cli.save_config {
        config.save_to_file(path)?;
        info!(config_file = %path.display(), "Configuration saved");
    }

    let error_log_path = config
        .error_log
        .clone()
        .unwrap_or_else(|| default_error_log_path(&exe_dir));
    let verbose = config.verbose;

    let registry = ExtensionRegistry::from_config(&config)?;
    if registry.is_empty() {
        warn!("No media extensions configured; nothing will be copied");
    }

    // Fatal errors return instead of exiting so the log guard flushes
    let processor = match Processor::new(config, registry) {
        Ok(processor) => processor,
        Err(e) => {
            error!(error = %e, "Invalid directories");
            cli_output::print_error(&e.to_string());
            return Ok(ExitCode::from(exit_status(&e)));
        }
    };

    let mut run = match processor.run() {
        Ok(run) => run,
        Err(e) => {
            error!(error = %e, "Scanning failed");
            cli_output::print_error(&e.to_string());
            return Ok(ExitCode::from(exit_status(&e)));
        }
    };

    use cli_output::*;

    let mut error_log = ErrorLog::new(&error_log_path);
    let mut failures = Vec::new();

    for event in run.by_ref() {
        match event {
            ProgressEvent::Total(total) => {
                print_hint(&format!("Found {} media files", total));
            }
            ProgressEvent::Extracted(_) => {}
            ProgressEvent::Outcome(outcome) => {
                if verbose {
                    print_outcome(&outcome);
                }
                if let CopyOutcome::Failed { source, reason } = outcome {
                    if let Err(e) = error_log.record(&source, &reason) {
                        warn!(error = %e, path = ?error_log.path(), "Could not write error log");
                    }
                    failures.push((source, reason));
                }
            }
        }
    }

    let stats = run.stats();

    print_separator();
    print_title("Sorting complete");
    print_separator();
    print_blank();
    print_stat("Total", stats.total_files, CliTheme::ACCENT);
    print_stat("Copied", stats.copied, CliTheme::SUCCESS);
    print_stat("Uncertain date", stats.uncertain, CliTheme::WARNING);
    print_stat("No date", stats.undated, CliTheme::WARNING);
    print_stat("Failed", stats.failed, CliTheme::ERROR);
    print_blank();

    if !failures.is_empty() {
        print_separator();
        print_error(&format!("{} files could not be copied", failures.len()));
        for (source, reason) in &failures {
            print_result("✗", CliTheme::ERROR, &source.display().to_string(), reason);
        }
        if error_log.written() > 0 {
            print_path("Error log", &error_log.path().display().to_string());
        }
    }

    print_separator();
    print_path("Log file", &log_path.display().to_string());

    info!(log_file = %log_path.display(), "Processing complete. Log saved to");

    Ok(ExitCode::SUCCESS)
}

/// Process exit status for an error that stops the run: 2 for unusable
/// directories, 1 otherwise
fn exit_status(e: &Error) -> u8 {
    match e {
        Error::InvalidRoot { .. } => 2,
        _ => 1,
    }
}

fn print_outcome(outcome: &CopyOutcome) {
    use cli_output::{CliTheme, print_result};

    match outcome {
        CopyOutcome::Copied {
            source,
            destination,
            uncertain,
        } => {
            let (icon, color) = if *uncertain {
                ("?", CliTheme::WARNING)
            } else {
                ("✓", CliTheme::SUCCESS)
            };
            print_result(
                icon,
                color,
                &source.display().to_string(),
                &format!("→ {}", destination.display()),
            );
        }
        CopyOutcome::Failed { source, reason } => {
            print_result("✗", CliTheme::ERROR, &source.display().to_string(), reason);
        }
    }
}

/// Print the record of one file as pretty JSON
fn show_record(cli: &Cli, file: &Path) -> Result<()> {
    let config = match cli.config {
        Some(ref config_path) => {
            let resolved = resolve_config_path(&get_executable_dir()?, config_path);
            cli.merge_with_config(Config::load_from_file(&resolved)?)
        }
        None => cli.to_config(),
    };

    let registry = ExtensionRegistry::from_config(&config)?;
    let record = extract(file, &registry, config.only_keep_time)
        .with_context(|| format!("Could not read {}", file.display()))?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Determine the log file path based on config file or timestamp
fn get_log_path(exe_dir: &Path, cli: &Cli) -> PathBuf {
    let log_dir = exe_dir.join("Log");
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    if let Some(config_name) = cli.config_name() {
        log_dir
            .join(&config_name)
            .join(format!("{}_{}.log", config_name, timestamp))
    } else {
        log_dir.join(format!("Run_{}.log", timestamp))
    }
}

fn default_error_log_path(exe_dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    exe_dir.join("Log").join(format!("Errors_{}.txt", timestamp))
}

/// Resolve config path: `name`, `name.toml`, then `Config/name.toml` beside
/// the executable
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    if config_path.exists() {
        return config_path.to_path_buf();
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.to_path_buf()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let filename = config_path.file_name().unwrap_or(config_path.as_os_str());
    let mut in_config_dir = exe_dir.join("Config").join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path.to_path_buf()
}

/// Load configuration from file or CLI arguments
fn load_config(cli: &Cli, exe_dir: &Path) -> Result<Config> {
    let config = if let Some(ref config_path) = cli.config {
        let resolved_path = resolve_config_path(exe_dir, config_path);
        info!(config_file = %resolved_path.display(), "Loading configuration from file");
        let file_config = Config::load_from_file(&resolved_path)?;
        cli.merge_with_config(file_config)
    } else {
        cli.to_config()
    };

    if config.input_dir.as_os_str().is_empty() {
        anyhow::bail!("No input directory given; use --input or set input_dir in the config file");
    }

    Ok(config)
}

/// Setup logging (file + console)
fn setup_logging(cli: &Cli, log_path: &Path) -> Result<WorkerGuard> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if cli.json_log {
        subscriber
            .with(fmt::layer().json().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status() {
        let invalid = Error::InvalidRoot {
            path: PathBuf::from("/missing"),
            message: "does not exist".to_string(),
        };
        assert_eq!(exit_status(&invalid), 2);

        let io = Error::Io(std::io::Error::other("unreadable directory"));
        assert_eq!(exit_status(&io), 1);
    }

    #[test]
    fn test_log_path_follows_config_name() {
        let exe_dir = Path::new("/opt/image-sort");

        let cli = Cli::try_parse_from(["image-sort", "-i", "/camera"]).unwrap();
        let path = get_log_path(exe_dir, &cli);
        assert_eq!(path.parent(), Some(exe_dir.join("Log").as_path()));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("Run_"));

        let cli = Cli::try_parse_from(["image-sort", "-C", "holiday"]).unwrap();
        let path = get_log_path(exe_dir, &cli);
        assert_eq!(path.parent(), Some(exe_dir.join("Log").join("holiday").as_path()));
    }
}
