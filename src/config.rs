use crate::error::ProcessorError;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Runtime configuration, loaded from a JSON file at startup. Every field
/// defaults so a partial file works.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Master connection; receives every write.
    pub database: DatabaseConfig,
    /// Replica used for the heavy reads.
    pub database_slave: DatabaseConfig,
    pub score_update_interval_ms: u64,
    pub difficulty_update_interval_ms: u64,
    /// Name of the user stats pp column; varies per deployment.
    pub user_pp_column_name: String,
    /// Inclusive `approved` window of beatmaps that count towards pp.
    /// Raising the maximum to 4 admits Loved maps.
    pub min_ranked_status: i32,
    pub max_ranked_status: i32,
    pub statsd: Option<StatsdConfig>
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsdConfig {
    pub host: String,
    pub port: u16
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig::default(),
            database_slave: DatabaseConfig::default(),
            score_update_interval_ms: 50,
            difficulty_update_interval_ms: 10_000,
            user_pp_column_name: "rank_score".to_string(),
            min_ranked_status: 1,
            max_ranked_status: 2,
            statsd: None
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            username: "osu".to_string(),
            password: String::new(),
            database: "osu".to_string()
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, ProcessorError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl DatabaseConfig {
    pub fn connection_str(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            self.host, self.port, self.username, self.password, self.database
        )
    }
}
