use std::path::PathBuf;
use std::time::Duration;

use crate::config::env_u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbMode {
    /// `DATABASE_URL=postgres://...`
    ServerPostgres { url: String },
    /// `DATABASE_URL=sqlite:...`, or the platform data dir when unset
    DesktopSqlite { path: PathBuf },
    /// `DATABASE_URL=memory` (or empty): process-local, not durable
    InMemory,
}

impl DbMode {
    pub fn detect() -> Self {
        match std::env::var("DATABASE_URL") {
            Ok(url) => Self::parse(&url),
            Err(_) => DbMode::DesktopSqlite {
                path: default_sqlite_path(),
            },
        }
    }

    pub fn parse(raw: &str) -> Self {
        let url = raw.trim();
        if url.is_empty() || url.eq_ignore_ascii_case("memory") {
            return DbMode::InMemory;
        }
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return DbMode::ServerPostgres {
                url: url.to_string(),
            };
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        let path = path.split('?').next().unwrap_or(path);
        DbMode::DesktopSqlite {
            path: PathBuf::from(path),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DbMode::ServerPostgres { .. } => "postgres",
            DbMode::DesktopSqlite { .. } => "sqlite",
            DbMode::InMemory => "memory",
        }
    }
}

pub fn default_sqlite_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mastery-backend")
        .join("mastery.db")
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub mode: DbMode,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub sqlite_busy_timeout: Duration,
}

impl DbConfig {
    pub fn from_env() -> Self {
        Self {
            mode: DbMode::detect(),
            max_connections: env_u64("DB_MAX_CONNECTIONS")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(10),
            acquire_timeout: Duration::from_millis(
                env_u64("DB_ACQUIRE_TIMEOUT_MS").unwrap_or(5000),
            ),
            sqlite_busy_timeout: Duration::from_millis(
                env_u64("SQLITE_BUSY_TIMEOUT_MS").unwrap_or(30_000),
            ),
        }
    }

    pub fn with_mode(mode: DbMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn redacted_target(&self) -> String {
        match &self.mode {
            DbMode::ServerPostgres { url } => {
                url.rsplit('@').next().unwrap_or("postgres").to_string()
            }
            DbMode::DesktopSqlite { path } => path.display().to_string(),
            DbMode::InMemory => "memory".to_string(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            mode: DbMode::InMemory,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            sqlite_busy_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!(DbMode::parse(""), DbMode::InMemory);
        assert_eq!(DbMode::parse("memory"), DbMode::InMemory);
        assert_eq!(
            DbMode::parse("postgres://u:p@db:5432/app"),
            DbMode::ServerPostgres {
                url: "postgres://u:p@db:5432/app".to_string()
            }
        );
        assert_eq!(
            DbMode::parse("sqlite:./data/mastery.db?mode=rwc"),
            DbMode::DesktopSqlite {
                path: PathBuf::from("./data/mastery.db")
            }
        );
    }

    #[test]
    fn test_redacted_target_hides_credentials() {
        let config = DbConfig::with_mode(DbMode::parse("postgres://user:secret@db:5432/app"));
        assert!(!config.redacted_target().contains("secret"));
    }
}
