use crate::domain::value_objects::{region_list, Region, RegionCode};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub db_path: String,
    /// Region this instance runs in
    pub region: RegionCode,
    /// Region allowed to write to the database
    pub primary_region: RegionCode,
    /// Regions advertised by `/api/regions`
    pub regions: Vec<Region>,
    /// Poll file stamps at this interval instead of using notifications
    pub poll_interval: Option<Duration>,
    pub keep_alive_secs: u64,
    pub drain_timeout_secs: u64,
    pub debug: bool,
}

impl Config {
    /// Build the configuration from a variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("REPLICA_LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let db_path = lookup("REPLICA_DB_PATH").unwrap_or_else(|| "replica.db".to_string());

        let region = lookup("FLY_REGION")
            .and_then(|v| RegionCode::parse(&v))
            .unwrap_or_default();

        // No primary configured: this instance is the primary.
        let primary_region = lookup("PRIMARY_REGION")
            .and_then(|v| RegionCode::parse(&v))
            .unwrap_or_else(|| region.clone());

        let mut codes: Vec<RegionCode> = lookup("REPLICA_REGIONS")
            .map(|v| v.split(',').filter_map(RegionCode::parse).collect())
            .unwrap_or_default();
        if codes.is_empty() {
            codes.push(primary_region.clone());
            codes.push(region.clone());
        }
        let regions = region_list(&codes, &primary_region);

        let poll_interval = lookup("REPLICA_POLL_INTERVAL_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let keep_alive_secs = lookup("REPLICA_KEEP_ALIVE_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(15);

        let drain_timeout_secs = lookup("REPLICA_DRAIN_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let debug = lookup("DEBUG").is_some();

        Self {
            listen_addr,
            db_path,
            region,
            primary_region,
            regions,
            poll_interval,
            keep_alive_secs,
            drain_timeout_secs,
            debug,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.region == self.primary_region
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    Ok(Config::from_lookup(|key| std::env::var(key).ok()))
}
