//! Runtime configuration, read from command-line flags or the environment.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "wardline")]
#[command(about = "Role-based hospital administration service", long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "WARDLINE_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "hospital.db")]
    pub database: PathBuf,

    /// Directory report attachments are written to and served from
    #[arg(long, env = "WARDLINE_UPLOAD_DIR", default_value = "public/uploads")]
    pub upload_dir: PathBuf,

    /// Lifetime of a session, in days
    #[arg(long, env = "WARDLINE_SESSION_TTL_DAYS", default_value_t = 7)]
    pub session_ttl_days: u32,

    /// bcrypt work factor for new password hashes
    #[arg(long, env = "WARDLINE_BCRYPT_COST", default_value_t = 10,
          value_parser = clap::value_parser!(u32).range(4..=31))]
    pub bcrypt_cost: u32,

    /// Largest report upload accepted, in MiB
    #[arg(long, env = "WARDLINE_MAX_UPLOAD_MB", default_value_t = 50)]
    pub max_upload_mb: u32,

    /// Seconds a query may wait on a database lock before failing
    #[arg(long, env = "WARDLINE_DB_TIMEOUT_SECS", default_value_t = 10)]
    pub db_timeout_secs: u64,

    /// Mark the session cookie `Secure` (serve over HTTPS)
    #[arg(long, env = "WARDLINE_SECURE_COOKIES")]
    pub secure_cookies: bool,
}

impl Config {
    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }

    pub fn session_ttl(&self) -> time::Duration {
        time::Duration::days(i64::from(self.session_ttl_days))
    }

    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(u64::from(self.max_upload_mb) << 20).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_local_deployment() {
        let config = Config::parse_from(["wardline"]);
        assert_eq!(config.session_ttl(), time::Duration::days(7));
        assert_eq!(config.db_timeout(), Duration::from_secs(10));
        assert!(!config.secure_cookies);
        assert_eq!(config.max_upload_bytes(), 50 * 1024 * 1024);
    }

    #[test]
    fn low_bcrypt_cost_is_refused() {
        assert!(Config::try_parse_from(["wardline", "--bcrypt-cost", "2"]).is_err());
    }
}
