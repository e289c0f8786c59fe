use std::time::Duration;

use serde::Deserialize;

use crate::services::queue::QueueOptions;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Ollama inference endpoint
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Ollama model used for feature scoring
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,

    /// How many jobs may drain the queue at once
    #[serde(default = "default_queue_workers")]
    pub queue_workers: usize,

    /// Courtesy delay between inference calls within one job
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    /// How long terminal jobs stay visible before eviction
    #[serde(default = "default_job_retention_hours")]
    pub job_retention_hours: u64,

    /// How often the eviction sweep runs
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_queue_workers() -> usize {
    1
}

fn default_item_delay_ms() -> u64 {
    500
}

fn default_job_retention_hours() -> u64 {
    24
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            workers: self.queue_workers,
            item_delay: Duration::from_millis(self.item_delay_ms),
            retention: Duration::from_secs(self.job_retention_hours * 3600),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
        }
    }
}
