use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::emissions::DEFAULT_POSITIVE_TONE_PROBABILITY;
use crate::fields::FieldPolicy;
use crate::projections::DEFAULT_MONTHLY_GOAL_KG;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Where the sensor bridge reads protocol lines from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum SensorSource {
    Stdin,
    Path(PathBuf),
}

#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub log_path: PathBuf,
    pub sensor_source: Option<SensorSource>,
    pub log_json: bool,
    pub monthly_goal_kg: f64,
    pub positive_tone_probability: f64,
    pub field_policy: FieldPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_path: PathBuf::from("data/activity.log"),
            sensor_source: None,
            log_json: false,
            monthly_goal_kg: DEFAULT_MONTHLY_GOAL_KG,
            positive_tone_probability: DEFAULT_POSITIVE_TONE_PROBABILITY,
            field_policy: FieldPolicy::Strict,
        }
    }
}

fn invalid(name: &'static str, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason,
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Ok(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Ok(false),
        _ => Err(invalid(name, value, "expected a boolean")),
    }
}

fn parse_f64(name: &'static str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(name, value, "expected a number"))
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("CARBON_BIND") {
            config.bind_addr = v
                .parse()
                .map_err(|_| invalid("CARBON_BIND", &v, "expected host:port"))?;
        }
        if let Some(v) = lookup("CARBON_LOG_PATH") {
            config.log_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("CARBON_SENSOR_SOURCE").filter(|v| !v.trim().is_empty()) {
            config.sensor_source = Some(match v.trim() {
                "-" => SensorSource::Stdin,
                path => SensorSource::Path(PathBuf::from(path)),
            });
        }
        if let Some(v) = lookup("CARBON_LOG_JSON") {
            config.log_json = parse_bool("CARBON_LOG_JSON", &v)?;
        }
        if let Some(v) = lookup("CARBON_MONTHLY_GOAL_KG") {
            let goal = parse_f64("CARBON_MONTHLY_GOAL_KG", &v)?;
            if goal <= 0.0 {
                return Err(invalid("CARBON_MONTHLY_GOAL_KG", &v, "must be positive"));
            }
            config.monthly_goal_kg = goal;
        }
        if let Some(v) = lookup("CARBON_POSITIVE_TONE_PROBABILITY") {
            let p = parse_f64("CARBON_POSITIVE_TONE_PROBABILITY", &v)?;
            if !(0.0..=1.0).contains(&p) {
                return Err(invalid(
                    "CARBON_POSITIVE_TONE_PROBABILITY",
                    &v,
                    "must be within [0, 1]",
                ));
            }
            config.positive_tone_probability = p;
        }
        if let Some(v) = lookup("CARBON_FIELD_POLICY") {
            config.field_policy = FieldPolicy::parse(&v)
                .ok_or_else(|| invalid("CARBON_FIELD_POLICY", &v, "expected strict or fallback"))?;
        }

        Ok(config)
    }
}
