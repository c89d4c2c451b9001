use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use elocute::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    history::load_attempts,
    report::{render_json, render_text, write_sessions_csv},
    ElocuteError, Rollup,
};
use std::{error::Error, io, path::PathBuf};
use tracing::{debug, info};

/// pronunciation practice rollups: trouble sounds, score trends and session history
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Reads a history of scored pronunciation attempts and reports the sounds and words worth drilling, daily score trends per metric, and recent practice sessions."
)]
pub struct Cli {
    /// attempt history: a JSON array, {"attempts": [...]}, or JSON lines
    #[clap(short = 'a', long)]
    attempts: Option<PathBuf>,

    /// days covered by every trend series
    #[clap(short = 'd', long)]
    window_days: Option<usize>,

    /// occurrences a word needs before it is listed
    #[clap(long)]
    min_word_count: Option<u64>,

    /// occurrences a sound needs before it is listed
    #[clap(long)]
    min_phon_count: Option<u64>,

    /// rows per trouble table in the text report
    #[clap(short = 'n', long)]
    top: Option<usize>,

    /// output format
    #[clap(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// config file to read (and write with --save-config)
    #[clap(long)]
    config: Option<PathBuf>,

    /// persist the effective settings as the new defaults
    #[clap(long)]
    save_config: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl Cli {
    /// Flags win over stored values.
    fn apply(&self, cfg: Config) -> Config {
        Config {
            window_days: self.window_days.unwrap_or(cfg.window_days),
            min_word_count: self.min_word_count.unwrap_or(cfg.min_word_count),
            min_phon_count: self.min_phon_count.unwrap_or(cfg.min_phon_count),
            top: self.top.unwrap_or(cfg.top),
            history_path: self.attempts.clone().or(cfg.history_path),
        }
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }
}

fn init_logging() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .try_init();
}

fn load_history(cfg: &Config) -> elocute::Result<Vec<serde_json::Value>> {
    if let Some(path) = &cfg.history_path {
        return load_attempts(path);
    }
    match AppDirs::history_path() {
        Some(path) if path.exists() => load_attempts(path),
        default => {
            info!(path = ?default, "no attempt history yet");
            Ok(Vec::new())
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cli = Cli::parse();

    let store = cli.config_store();
    let cfg = cli.apply(store.load());
    debug!(?cfg, format = %cli.format, "effective settings");

    let rollup = match Rollup::new(cfg.rollup_options()) {
        Ok(rollup) => rollup,
        Err(ElocuteError::InvalidOptions(msg)) => {
            Cli::command().error(ErrorKind::ValueValidation, msg).exit()
        }
        Err(err) => return Err(err.into()),
    };

    if cli.save_config {
        store.save(&cfg)?;
        info!(path = %store.path().display(), "saved config");
    }

    let attempts = load_history(&cfg)?;
    let result = rollup.run(&attempts);

    match cli.format {
        OutputFormat::Text => print!("{}", render_text(&result, cfg.top)),
        OutputFormat::Json => println!("{}", render_json(&result)?),
        OutputFormat::Csv => write_sessions_csv(&result.sessions, io::stdout().lock())?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["elocute"]);

        assert_eq!(cli.attempts, None);
        assert_eq!(cli.window_days, None);
        assert_eq!(cli.top, None);
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.save_config);
    }

    #[test]
    fn test_cli_window_days() {
        let cli = Cli::parse_from(["elocute", "-d", "14"]);
        assert_eq!(cli.window_days, Some(14));

        let cli = Cli::parse_from(["elocute", "--window-days", "90"]);
        assert_eq!(cli.window_days, Some(90));
    }

    #[test]
    fn test_cli_format() {
        let cli = Cli::parse_from(["elocute", "-f", "json"]);
        assert_eq!(cli.format, OutputFormat::Json);

        let cli = Cli::parse_from(["elocute", "--format", "csv"]);
        assert_eq!(cli.format, OutputFormat::Csv);
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["elocute", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Text.to_string(), "Text");
        assert_eq!(OutputFormat::Csv.to_string(), "Csv");
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "elocute",
            "--min-word-count",
            "1",
            "--attempts",
            "/tmp/a.jsonl",
        ]);
        let stored = Config {
            window_days: 10,
            top: 4,
            history_path: Some(PathBuf::from("/tmp/old.jsonl")),
            ..Config::default()
        };
        let cfg = cli.apply(stored);
        assert_eq!(cfg.window_days, 10);
        assert_eq!(cfg.top, 4);
        assert_eq!(cfg.min_word_count, 1);
        assert_eq!(cfg.history_path, Some(PathBuf::from("/tmp/a.jsonl")));
    }

    #[test]
    fn test_config_defaults_survive_without_flags() {
        let cli = Cli::parse_from(["elocute"]);
        assert_eq!(cli.apply(Config::default()), Config::default());
    }
}
