//! Serial sensor bridge.
//!
//! A microcontroller prints lines such as `T:25.3,H:56.2,Air:312`. The
//! bridge keeps the last known value of each field and a short history, and
//! the HTTP layer serves both.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::RwLock;

pub const HISTORY_CAPACITY: usize = 20;

#[derive(Debug, Error, PartialEq)]
pub enum SensorLineError {
    #[error("no sensor fields in line {0:?}")]
    NoFields(String),
}

/// Latest known value of each sensor. `None` until first reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorReading {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub air: Option<i64>,
}

/// Fields successfully parsed from one line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineUpdate {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub air: Option<i64>,
}

fn parse_air(raw: &str) -> Option<i64> {
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
}

/// Parses one protocol line. Fields may appear in any order or not at all;
/// a field whose value does not parse is left out of the update.
///
/// A line with no recognizable field prefix is an error.
pub fn parse_line(line: &str) -> Result<LineUpdate, SensorLineError> {
    let mut update = LineUpdate::default();
    let mut recognized = false;

    for part in line.trim().split(',').map(str::trim) {
        if let Some(raw) = part.strip_prefix("T:") {
            recognized = true;
            update.temperature = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite());
        } else if let Some(raw) = part.strip_prefix("H:") {
            recognized = true;
            update.humidity = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite());
        } else if let Some(raw) = part.strip_prefix("Air:") {
            recognized = true;
            update.air = parse_air(raw.trim());
        }
    }

    if recognized {
        Ok(update)
    } else {
        Err(SensorLineError::NoFields(line.to_string()))
    }
}

impl SensorReading {
    pub fn apply(&mut self, update: LineUpdate) {
        self.temperature = update.temperature.or(self.temperature);
        self.humidity = update.humidity.or(self.humidity);
        self.air = update.air.or(self.air);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DemandLevel {
    Low,
    Medium,
    High,
}

impl DemandLevel {
    /// Threshold rule over the latest reading. Unknown values never trip a
    /// threshold.
    pub fn classify(reading: &SensorReading) -> Self {
        let temperature = reading.temperature.unwrap_or(f64::MIN);
        let humidity = reading.humidity.unwrap_or(f64::MIN);
        let air = reading.air.unwrap_or(i64::MIN);

        if temperature > 30.0 || air > 150 {
            Self::High
        } else if humidity > 60.0 || air > 100 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High Demand (More power needed)",
            Self::Medium => "Medium Demand",
            Self::Low => "Low Demand",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorSample {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub reading: SensorReading,
}

#[derive(Debug, Default)]
struct SensorState {
    latest: SensorReading,
    history: VecDeque<SensorSample>,
}

/// Shared handle to the bridge state.
#[derive(Debug, Clone, Default)]
pub struct SensorHub {
    state: Arc<RwLock<SensorState>>,
}

impl SensorHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn latest(&self) -> SensorReading {
        self.state.read().await.latest
    }

    pub async fn history(&self) -> Vec<SensorSample> {
        self.state.read().await.history.iter().cloned().collect()
    }

    /// Parses and applies one line, recording the merged reading in history.
    pub async fn ingest(&self, line: &str, at: DateTime<Utc>) -> Result<SensorReading, SensorLineError> {
        let update = parse_line(line)?;
        let mut state = self.state.write().await;
        state.latest.apply(update);
        let reading = state.latest;
        if state.history.len() == HISTORY_CAPACITY {
            state.history.pop_front();
        }
        state.history.push_back(SensorSample { at, reading });
        Ok(reading)
    }
}

/// Feeds every line of `reader` into `hub` until end of input.
pub async fn run_line_reader<R>(reader: R, hub: SensorHub) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match hub.ingest(&line, Utc::now()).await {
            Ok(reading) => tracing::info!(
                temperature = ?reading.temperature,
                humidity = ?reading.humidity,
                air = ?reading.air,
                "updated sensors"
            ),
            Err(err) => tracing::warn!(error = %err, "sensor parse error"),
        }
    }
    tracing::info!("sensor source closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_line_parses_every_field() {
        let update = parse_line("T:25.3,H:56.2,Air:312\r").unwrap();
        assert_eq!(
            update,
            LineUpdate { temperature: Some(25.3), humidity: Some(56.2), air: Some(312) }
        );
    }

    #[test]
    fn fields_are_independently_optional() {
        let update = parse_line("Air:90").unwrap();
        assert_eq!(update, LineUpdate { air: Some(90), ..Default::default() });
    }

    #[test]
    fn fractional_air_truncates() {
        assert_eq!(parse_line("Air:312.9").unwrap().air, Some(312));
    }

    #[test]
    fn malformed_line_is_rejected() {
        assert_eq!(
            parse_line("hello world"),
            Err(SensorLineError::NoFields("hello world".to_string()))
        );
    }

    #[test]
    fn unparseable_field_keeps_last_known_value() {
        let mut reading = SensorReading::default();
        reading.apply(parse_line("T:25.3,H:56.2,Air:312").unwrap());
        reading.apply(parse_line("T:oops,H:60.1").unwrap());
        assert_eq!(reading.temperature, Some(25.3));
        assert_eq!(reading.humidity, Some(60.1));
        assert_eq!(reading.air, Some(312));
    }

    #[test]
    fn demand_thresholds() {
        let hot = SensorReading { temperature: Some(31.0), humidity: Some(10.0), air: Some(10) };
        let humid = SensorReading { temperature: Some(20.0), humidity: Some(70.0), air: Some(10) };
        let smoggy = SensorReading { temperature: Some(20.0), humidity: Some(10.0), air: Some(120) };
        assert_eq!(DemandLevel::classify(&hot), DemandLevel::High);
        assert_eq!(DemandLevel::classify(&humid), DemandLevel::Medium);
        assert_eq!(DemandLevel::classify(&smoggy), DemandLevel::Medium);
        assert_eq!(DemandLevel::classify(&SensorReading::default()), DemandLevel::Low);
    }

    #[tokio::test]
    async fn history_is_capped() {
        let hub = SensorHub::new();
        for i in 0..(HISTORY_CAPACITY + 5) {
            hub.ingest(&format!("Air:{i}"), Utc::now()).await.unwrap();
        }
        let history = hub.history().await;
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history[0].reading.air, Some(5));
        assert_eq!(hub.latest().await.air, Some(24));
    }

    #[tokio::test]
    async fn reader_skips_bad_lines_and_stops_at_eof() {
        let hub = SensorHub::new();
        let input: &[u8] = b"T:21.0,H:40.0,Air:50\ngarbage\n\nH:45.5\n";
        run_line_reader(input, hub.clone()).await.unwrap();

        let latest = hub.latest().await;
        assert_eq!(latest, SensorReading { temperature: Some(21.0), humidity: Some(45.5), air: Some(50) });
        assert_eq!(hub.history().await.len(), 2);
    }
}
