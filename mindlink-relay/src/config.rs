use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds a ready match may spend establishing its direct transport
    /// before the monitor ends it with `timeout`.
    #[serde(default = "default_establish_timeout_secs")]
    pub establish_timeout_secs: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
}

fn default_port() -> u16 { 5000 }
fn default_establish_timeout_secs() -> u64 { 15 }
fn default_history_limit() -> usize { 50 }
fn default_max_message_len() -> usize { 2000 }

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("MINDLINK_RELAY").separator("__"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_else(|_| Self {
            port: default_port(),
            establish_timeout_secs: default_establish_timeout_secs(),
            history_limit: default_history_limit(),
            max_message_len: default_max_message_len(),
        }))
    }
}
