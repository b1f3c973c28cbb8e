//! Pipeline configuration.
//!
//! Settings come from an optional YAML file and are then overridden by
//! command-line flags. Every field has a default, so an empty or partial
//! file is valid.
//!
//! # Example
//!
//! ```yaml
//! request_timeout_seconds: 6
//! max_concurrent_fetches: 4
//! default_source_timezone: America/New_York
//! display_timezone: Europe/London
//! ```

use crate::cli::Cli;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-request timeout for article fetches.
    pub request_timeout_seconds: f64,
    /// Upper bound on simultaneous outbound article fetches.
    pub max_concurrent_fetches: usize,
    /// IANA zone assumed for dates that carry no offset.
    pub default_source_timezone: String,
    /// IANA zone every resolved timestamp is converted to.
    pub display_timezone: String,
    /// How far past "now" a publication date may lie.
    pub plausibility_future_skew_seconds: i64,
    pub user_agent: String,
    /// Links kept per ticker during discovery.
    pub results_per_symbol: usize,
    /// Pause before each discovery query.
    pub discovery_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 8.0,
            max_concurrent_fetches: 8,
            default_source_timezone: "America/New_York".to_string(),
            display_timezone: "America/New_York".to_string(),
            plausibility_future_skew_seconds: 86_400,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            results_per_symbol: 10,
            discovery_delay_ms: 2_000,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, Box<dyn Error>> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply command-line overrides on top of file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(secs) = cli.timeout_secs {
            self.request_timeout_seconds = secs;
        }
        if let Some(n) = cli.max_concurrent {
            self.max_concurrent_fetches = n;
        }
        if let Some(tz) = &cli.source_tz {
            self.default_source_timezone = tz.clone();
        }
        if let Some(tz) = &cli.display_tz {
            self.display_timezone = tz.clone();
        }
    }

    /// Check everything that would otherwise fail later in the run.
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        self.source_tz()?;
        self.display_tz()?;
        self.request_timeout()?;
        if self.plausibility_future_skew_seconds < 0 {
            return Err("plausibility_future_skew_seconds must not be negative".into());
        }
        Ok(())
    }

    pub fn source_tz(&self) -> Result<Tz, Box<dyn Error>> {
        parse_tz("default_source_timezone", &self.default_source_timezone)
    }

    pub fn display_tz(&self) -> Result<Tz, Box<dyn Error>> {
        parse_tz("display_timezone", &self.display_timezone)
    }

    pub fn request_timeout(&self) -> Result<Duration, Box<dyn Error>> {
        Duration::try_from_secs_f64(self.request_timeout_seconds)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                format!(
                    "request_timeout_seconds must be a positive number, got {}",
                    self.request_timeout_seconds
                )
                .into()
            })
    }

    /// Never less than one.
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_fetches.max(1)
    }
}

fn parse_tz(field: &str, name: &str) -> Result<Tz, Box<dyn Error>> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| format!("{field}: unknown IANA timezone {name:?}: {e}").into())
}

/// Load configuration from a YAML file, or defaults when no path is given.
#[instrument(level = "info")]
pub async fn load_config(path: Option<&str>) -> Result<PipelineConfig, Box<dyn Error>> {
    let Some(path) = path else {
        info!("No config file given; using defaults");
        return Ok(PipelineConfig::default());
    };
    let yaml = tokio::fs::read_to_string(path).await?;
    let config = PipelineConfig::from_yaml_str(&yaml)?;
    info!(path, "Loaded configuration");
    Ok(config)
}
