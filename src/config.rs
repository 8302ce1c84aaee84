use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::lead::{AlgorithmParams, ScoringWeights};
use crate::summary::{SummaryOptions, DEFAULT_TOP_N};

pub const DEFAULT_ENDPOINT_URL: &str =
    "https://us-central1-ecotech-5166a.cloudfunctions.net/assignSalespersonAndBook";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub algorithm: AlgorithmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_endpoint_url")]
    pub url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    #[serde(default = "default_max_travel_time_minutes")]
    pub max_travel_time_minutes: u32,
    #[serde(default = "default_max_appointments_per_day")]
    pub max_appointments_per_day: u32,
    #[serde(default = "default_max_new_assignments_per_day")]
    pub max_new_assignments_per_day: u32,
    #[serde(default = "default_min_time_gap_minutes")]
    pub min_time_gap_minutes: u32,
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_performance_weight")]
    pub performance: f64,
    #[serde(default = "default_proximity_weight")]
    pub proximity: f64,
    #[serde(default = "default_capacity_weight")]
    pub capacity: f64,
    #[serde(default = "default_route_efficiency_weight")]
    pub route_efficiency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint_url: Option<String>,
    pub top_n: Option<usize>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/assignment-tester/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        Self::from_toml(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.endpoint_url {
            self.endpoint.url = url;
        }
        if let Some(top_n) = overrides.top_n {
            self.summary.top_n = top_n;
        }
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint.connect_timeout_secs.max(1))
    }

    pub fn algorithm_params(&self) -> AlgorithmParams {
        let a = &self.algorithm;
        AlgorithmParams {
            max_travel_time_minutes: a.max_travel_time_minutes,
            max_appointments_per_day: a.max_appointments_per_day,
            max_new_assignments_per_day: a.max_new_assignments_per_day,
            min_time_gap_minutes: a.min_time_gap_minutes,
            weights: ScoringWeights {
                performance: a.weights.performance,
                proximity: a.weights.proximity,
                capacity: a.weights.capacity,
                route_efficiency: a.weights.route_efficiency,
            },
        }
    }

    pub fn summary_options(&self) -> SummaryOptions {
        SummaryOptions {
            top_n: self.summary.top_n.max(1),
            max_new_assignments_per_day: self.algorithm.max_new_assignments_per_day,
        }
    }

    pub fn default_template() -> String {
        let template = r#"# Assignment service endpoint
[endpoint]
url = "https://us-central1-ecotech-5166a.cloudfunctions.net/assignSalespersonAndBook"
connect_timeout_secs = 10

# Number of candidates shown in the ranking (3 for a compact view)
[summary]
top_n = 5

# Parameters sent with --with-params or any override flag.
# Weights should add up to 1.0; other sums are sent with a warning.
[algorithm]
max_travel_time_minutes = 120
max_appointments_per_day = 5
max_new_assignments_per_day = 4
min_time_gap_minutes = 30

[algorithm.weights]
performance = 0.35
proximity = 0.30
capacity = 0.20
route_efficiency = 0.15

[server]
host = "127.0.0.1"
port = 3001

[logging]
level = "info"
"#;
        template.to_string()
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            max_travel_time_minutes: default_max_travel_time_minutes(),
            max_appointments_per_day: default_max_appointments_per_day(),
            max_new_assignments_per_day: default_max_new_assignments_per_day(),
            min_time_gap_minutes: default_min_time_gap_minutes(),
            weights: WeightsConfig::default(),
        }
    }
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            performance: default_performance_weight(),
            proximity: default_proximity_weight(),
            capacity: default_capacity_weight(),
            route_efficiency: default_route_efficiency_weight(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_endpoint_url() -> String {
    DEFAULT_ENDPOINT_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_max_travel_time_minutes() -> u32 {
    AlgorithmParams::default().max_travel_time_minutes
}

fn default_max_appointments_per_day() -> u32 {
    AlgorithmParams::default().max_appointments_per_day
}

fn default_max_new_assignments_per_day() -> u32 {
    AlgorithmParams::default().max_new_assignments_per_day
}

fn default_min_time_gap_minutes() -> u32 {
    AlgorithmParams::default().min_time_gap_minutes
}

fn default_performance_weight() -> f64 {
    ScoringWeights::default().performance
}

fn default_proximity_weight() -> f64 {
    ScoringWeights::default().proximity
}

fn default_capacity_weight() -> f64 {
    ScoringWeights::default().capacity
}

fn default_route_efficiency_weight() -> f64 {
    ScoringWeights::default().route_efficiency
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let parsed = Config::from_toml(&Config::default_template()).expect("template parses");
        assert_eq!(parsed.endpoint.url, DEFAULT_ENDPOINT_URL);
        assert_eq!(parsed.summary.top_n, 5);
        assert_eq!(parsed.algorithm_params(), AlgorithmParams::default());
        assert_eq!(parsed.server.port, 3001);
    }

    #[test]
    fn partial_file_keeps_defaults_and_overrides_win() {
        let mut config = Config::from_toml(
            r#"
            [summary]
            top_n = 3

            [algorithm.weights]
            capacity = 0.5
            "#,
        )
        .expect("partial config");
        assert_eq!(config.summary_options().top_n, 3);
        assert_eq!(config.algorithm.max_travel_time_minutes, 120);
        assert!(!config.algorithm_params().weights.is_balanced());

        config.apply_overrides(ConfigOverrides {
            endpoint_url: Some("http://127.0.0.1:9000/assign".to_string()),
            top_n: Some(5),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.endpoint.url, "http://127.0.0.1:9000/assign");
        assert_eq!(config.summary_options().top_n, 5);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("assignment-tester-missing/config.toml");
        let config = Config::load(Some(path.as_path())).expect("defaults");
        assert_eq!(config.logging.level, "info");
    }
}
