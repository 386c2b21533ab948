use std::path::PathBuf;
use std::time::Duration;

use horizon_support::SupportConfig;

const DEFAULT_ADDR: &str = "0.0.0.0:9001";
const DEFAULT_DB_PATH: &str = "horizon-support.db";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub db_path: PathBuf,
    /// Token a client must present to connect as an admin. Unset means no admins.
    pub admin_token: Option<String>,
    /// When set, logs are also written to daily rolling files here
    pub log_dir: Option<PathBuf>,
    pub support: SupportConfig,
}

impl ServerConfig {
    /// Load from the process environment, after reading a `.env` file if present
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut support = SupportConfig::default();

        if let Some(secs) = get("HORIZON_DELETE_DELAY_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| format!("HORIZON_DELETE_DELAY_SECS must be whole seconds: {}", e))?;
            support.deletion_delay = Duration::from_secs(secs);
        }

        if let Some(limit) = get("HORIZON_LOOKUP_CONCURRENCY") {
            let limit: usize = limit
                .trim()
                .parse()
                .map_err(|e| format!("HORIZON_LOOKUP_CONCURRENCY must be a number: {}", e))?;
            if limit == 0 {
                return Err("HORIZON_LOOKUP_CONCURRENCY must be at least 1".to_string());
            }
            support.lookup_concurrency = limit;
        }

        Ok(Self {
            addr: get("HORIZON_SERVER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            db_path: get("HORIZON_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            admin_token: get("HORIZON_ADMIN_TOKEN").filter(|t| !t.is_empty()),
            log_dir: get("HORIZON_LOG_DIR").filter(|d| !d.is_empty()).map(PathBuf::from),
            support,
        })
    }
}
