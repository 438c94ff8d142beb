use crate::backends::{MemoryBackend, SqliteBackend};
use crate::database::Database;
use crate::Result;

use clap::{Parser, Subcommand, ValueEnum};
use log::{LevelFilter, info};

#[derive(Parser, Debug)]
#[command(version, about, long_about)]
pub struct Args {
    /// Default log level, `RUST_LOG` takes precedence
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
    #[command(subcommand)]
    pub backend: Backend,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Keep notes in memory for this session only
    Memory,
    /// Keep notes in an `SQLite` database file
    Sqlite {
        #[arg(short, long, env = "NOTEBOARD_DB")]
        path: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

/// Loads `.env` (if any) and parses command-line arguments.
#[must_use]
pub fn parse_args() -> Args {
    // A missing .env file is fine
    let _ = dotenv::dotenv();
    Args::parse()
}

/// Opens the `Database` selected by the backend subcommand.
///
/// # Errors
///
/// Forwards errors from opening the `SQLite` database
pub fn open_database(backend: &Backend) -> Result<Database> {
    let database = match backend {
        Backend::Memory => Database::new(MemoryBackend::new()),
        Backend::Sqlite { path } => Database::new(SqliteBackend::open(path)?),
    };
    info!("Using {backend:?} backend");
    Ok(database)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_backend_and_log_level() {
        let args = Args::try_parse_from([
            "noteboard",
            "--log-level",
            "debug",
            "sqlite",
            "--path",
            "notes.db",
        ])
        .unwrap();

        assert_eq!(args.log_level, LogLevel::Debug);
        assert_eq!(
            args.backend,
            Backend::Sqlite {
                path: "notes.db".to_string()
            }
        );
    }

    #[test]
    fn defaults_to_info_logging() {
        let args = Args::try_parse_from(["noteboard", "memory"]).unwrap();
        assert_eq!(args.log_level, LogLevel::Info);
        assert_eq!(LevelFilter::from(args.log_level), LevelFilter::Info);
    }
}
