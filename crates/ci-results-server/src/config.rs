use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub listen: SocketAddr,
    pub cache_entries: u64,
    pub cache_ttl_secs: u64,
    /// Exit cleanly after this long so a supervisor restarts the server.
    pub max_uptime_secs: Option<u64>,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("results.db"),
            listen: SocketAddr::from(([127, 0, 0, 1], 8001)),
            cache_entries: 128,
            cache_ttl_secs: 60,
            max_uptime_secs: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("CI_RESULTS_DB") {
            cfg.db_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("CI_RESULTS_LISTEN") {
            if let Ok(addr) = v.parse() {
                cfg.listen = addr;
            }
        }
        if let Ok(v) = env::var("CI_RESULTS_CACHE_ENTRIES") {
            if let Ok(n) = v.parse() {
                cfg.cache_entries = n;
            }
        }
        if let Ok(v) = env::var("CI_RESULTS_CACHE_TTL_SECS") {
            if let Ok(n) = v.parse() {
                cfg.cache_ttl_secs = n;
            }
        }
        if let Ok(v) = env::var("CI_RESULTS_MAX_UPTIME_SECS") {
            if let Ok(n) = v.parse() {
                cfg.max_uptime_secs = Some(n);
            }
        }
        if let Ok(v) = env::var("CI_RESULTS_LOG") {
            cfg.log_level = v;
        }
        cfg
    }
}
