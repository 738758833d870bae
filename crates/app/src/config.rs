use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::Duration;
use clap::Parser;
use services::{ChatProxyConfig, RetryPolicy, ServiceSettings};

const MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, Parser)]
#[command(name = "claimdesk")]
#[command(about = "Insurance-claim intake server")]
pub struct Cli {
    /// SQLite database URL or path
    #[arg(long = "db", env = "CLAIMDESK_DB_URL", default_value = "sqlite://claimdesk.sqlite3")]
    pub db_url: String,

    /// Address to listen on
    #[arg(long, env = "CLAIMDESK_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Session lifetime in seconds
    #[arg(
        long,
        env = "CLAIMDESK_SESSION_TTL_SECS",
        default_value_t = 1800,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub session_ttl_secs: u32,

    /// Mark the session cookie `Secure` (serve behind TLS)
    #[arg(long, env = "CLAIMDESK_SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Enable `POST /api/progress/reset` (development only)
    #[arg(long, env = "CLAIMDESK_ALLOW_PROGRESS_RESET")]
    pub allow_progress_reset: bool,

    /// Seconds between sweeps of expired sessions and their progress trackers
    #[arg(
        long,
        env = "CLAIMDESK_SESSION_SWEEP_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub session_sweep_secs: u64,
}

impl Cli {
    /// # Errors
    ///
    /// Fails if the chat webhook URL in the environment is invalid.
    pub fn service_settings(&self) -> anyhow::Result<ServiceSettings> {
        let chat = ChatProxyConfig::from_env().context("reading chat proxy configuration")?;
        Ok(ServiceSettings {
            session_ttl: Duration::seconds(i64::from(self.session_ttl_secs)),
            allow_progress_reset: self.allow_progress_reset,
            retry: RetryPolicy::default(),
            chat,
        })
    }
}

/// Turn a path or relative `sqlite:` URL into an absolute `sqlite://` URL.
///
/// In-memory URLs pass through untouched.
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == MEMORY_URL || trimmed.contains("mode=memory") {
        return trimmed.to_string();
    }

    let rest = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    let (path_str, query) = match rest.split_once('?') {
        Some((path, query)) => (path, format!("?{query}")),
        None => (rest, String::new()),
    };

    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}{query}", absolute.display())
}

/// Create the database file (and its directory) so the first connect succeeds.
///
/// # Errors
///
/// Fails for URLs without a file path or when the file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> anyhow::Result<()> {
    if db_url == MEMORY_URL || db_url.contains("mode=memory") {
        return Ok(());
    }

    let Some(path) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid database url: {db_url}");
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("database url has no file path: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
        tracing::info!(path = %path.display(), "created database file");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_urls_pass_through() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:file:db?mode=memory&cache=shared"),
            "sqlite:file:db?mode=memory&cache=shared"
        );
    }

    #[test]
    fn absolute_url_is_kept() {
        assert_eq!(
            normalize_sqlite_url("sqlite:///var/lib/claimdesk/db.sqlite3"),
            "sqlite:///var/lib/claimdesk/db.sqlite3"
        );
    }

    #[test]
    fn relative_paths_become_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let expected = format!("sqlite://{}", cwd.join("data/claims.db").display());
        assert_eq!(normalize_sqlite_url("data/claims.db"), expected);
        assert_eq!(normalize_sqlite_url("sqlite:data/claims.db"), expected);
        assert_eq!(normalize_sqlite_url("sqlite://data/claims.db"), expected);
    }

    #[test]
    fn query_string_survives_normalization() {
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/c.db?mode=rwc"),
            "sqlite:///tmp/c.db?mode=rwc"
        );
    }

    #[test]
    fn prepare_rejects_foreign_scheme() {
        assert!(prepare_sqlite_file("postgres://localhost/db").is_err());
        assert!(prepare_sqlite_file("sqlite://").is_err());
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["claimdesk"]).unwrap();
        assert_eq!(cli.bind.to_string(), "127.0.0.1:3000");
        assert_eq!(cli.session_ttl_secs, 1800);
        assert!(!cli.allow_progress_reset);
        assert_eq!(cli.session_sweep_secs, 60);
    }

    #[test]
    fn cli_rejects_zero_durations() {
        assert!(Cli::try_parse_from(["claimdesk", "--session-ttl-secs", "0"]).is_err());
        assert!(Cli::try_parse_from(["claimdesk", "--session-sweep-secs", "0"]).is_err());
    }
}
