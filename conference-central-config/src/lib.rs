use core::fmt::{Debug, Display};
use std::net::SocketAddr;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "conference-central.toml";
pub const ENV_PREFIX: &str = "CC_";

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    pub listen_address: SocketAddr,
    /// Without a database url everything is kept in memory.
    pub database_url: Option<String>,
    pub database_max_connections: usize,
    pub mail_sender: String,
    pub task_attempts: u32,
    pub task_retry_delay_ms: u64,
    /// Expected in `x-internal-token` on cron and task endpoints. Those endpoints
    /// refuse every request while it is unset.
    pub internal_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            database_max_connections: 16,
            mail_sender: "noreply@conference-central.local".to_owned(),
            task_attempts: 3,
            task_retry_delay_ms: 500,
            internal_token: None,
        }
    }
}

#[derive(thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Figment(#[from] figment::Error),
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

fn figment() -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(CONFIG_FILE))
        .merge(Env::prefixed(ENV_PREFIX))
}

pub fn get_config() -> Result<Config, ConfigError> {
    Ok(figment().extract()?)
}
