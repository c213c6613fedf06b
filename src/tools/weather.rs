use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::error::{ToolError, ToolResult};

pub const DEFAULT_FORECAST_ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_FORECAST_DAYS: u8 = 7;
/// Open-Meteo serves at most 16 days of daily data.
pub const MAX_FORECAST_DAYS: u8 = 16;

const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum";

static TIMEZONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_+\-/]{1,64}$").expect("valid regex")
});

/// Validated arguments for one forecast lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub days: u8,
}

impl ForecastQuery {
    pub fn new(latitude: f64, longitude: f64, timezone: &str, days: u8) -> ToolResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ToolError::InvalidArguments(format!(
                "latitude {} is outside [-90, 90]",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ToolError::InvalidArguments(format!(
                "longitude {} is outside [-180, 180]",
                longitude
            )));
        }
        if !(1..=MAX_FORECAST_DAYS).contains(&days) {
            return Err(ToolError::InvalidArguments(format!(
                "days must be between 1 and {} (got {})",
                MAX_FORECAST_DAYS, days
            )));
        }
        if !TIMEZONE_RE.is_match(timezone) {
            return Err(ToolError::InvalidArguments(format!(
                "unrecognised timezone '{}'",
                timezone
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            timezone: timezone.to_string(),
            days,
        })
    }

    /// Builds a query from model-supplied arguments, applying defaults for
    /// `timezone` and `days`.
    pub fn from_arguments(args: &Map<String, Value>) -> ToolResult<Self> {
        let latitude = number_arg(args, "latitude")
            .ok_or_else(|| ToolError::InvalidArguments("'latitude' must be a number".into()))?;
        let longitude = number_arg(args, "longitude")
            .ok_or_else(|| ToolError::InvalidArguments("'longitude' must be a number".into()))?;
        let timezone = match args.get("timezone") {
            None | Some(Value::Null) => DEFAULT_TIMEZONE,
            Some(Value::String(tz)) if tz.trim().is_empty() => DEFAULT_TIMEZONE,
            Some(Value::String(tz)) => tz.trim(),
            Some(_) => {
                return Err(ToolError::InvalidArguments(
                    "'timezone' must be a string".into(),
                ));
            }
        };
        let days = match args.get("days") {
            None | Some(Value::Null) => DEFAULT_FORECAST_DAYS,
            Some(v) => v
                .as_f64()
                .filter(|d| d.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(d))
                .map(|d| d as u8)
                .ok_or_else(|| ToolError::InvalidArguments("'days' must be an integer".into()))?,
        };
        Self::new(latitude, longitude, timezone, days)
    }
}

/// Reads a numeric argument, tolerating numbers the model sent as strings.
pub(crate) fn number_arg(args: &Map<String, Value>, key: &str) -> Option<f64> {
    match args.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub precipitation_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub days: Vec<DailyForecast>,
}

impl Forecast {
    pub fn to_markdown(&self) -> String {
        let mut out = vec![format!("## {}-Day Weather Forecast\n", self.days.len())];
        out.push("| Date | Max Temp (°C) | Min Temp (°C) | Precipitation (mm) |".to_string());
        out.push("|------|--------------|--------------|-------------------|".to_string());
        for day in &self.days {
            out.push(format!(
                "| {} | {:.1} | {:.1} | {:.1} |",
                day.date, day.max_temp_c, day.min_temp_c, day.precipitation_mm
            ));
        }
        out.push("\nData source: Open-Meteo Weather API".to_string());
        out.join("\n")
    }
}

/// Anything that can answer a forecast query.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self, query: &ForecastQuery) -> ToolResult<Forecast>;
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    daily: Option<DailyBlock>,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Option<Vec<String>>,
    temperature_2m_max: Option<Vec<Option<f64>>>,
    temperature_2m_min: Option<Vec<Option<f64>>>,
    precipitation_sum: Option<Vec<Option<f64>>>,
}

impl DailyBlock {
    fn into_days(self) -> ToolResult<Vec<DailyForecast>> {
        fn field<T>(v: Option<Vec<T>>, name: &str) -> ToolResult<Vec<T>> {
            v.ok_or_else(|| ToolError::MalformedResponse(format!("missing daily.{}", name)))
        }
        let time = field(self.time, "time")?;
        let max = field(self.temperature_2m_max, "temperature_2m_max")?;
        let min = field(self.temperature_2m_min, "temperature_2m_min")?;
        let precip = field(self.precipitation_sum, "precipitation_sum")?;

        if max.len() != time.len() || min.len() != time.len() || precip.len() != time.len() {
            return Err(ToolError::MalformedResponse(format!(
                "daily arrays differ in length (time={}, max={}, min={}, precipitation={})",
                time.len(),
                max.len(),
                min.len(),
                precip.len()
            )));
        }

        time.iter()
            .enumerate()
            .map(|(i, date)| -> ToolResult<DailyForecast> {
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
                    ToolError::MalformedResponse(format!("bad date '{}': {}", date, e))
                })?;
                let value = |series: &[Option<f64>], name: &str| {
                    series[i].ok_or_else(|| {
                        ToolError::MalformedResponse(format!("null {} on {}", name, date))
                    })
                };
                Ok(DailyForecast {
                    date,
                    max_temp_c: value(&max[..], "temperature_2m_max")?,
                    min_temp_c: value(&min[..], "temperature_2m_min")?,
                    precipitation_mm: value(&precip[..], "precipitation_sum")?,
                })
            })
            .collect()
    }
}

/// Open-Meteo daily forecast client.
#[derive(Clone)]
pub struct OpenMeteoClient {
    endpoint: String,
    http: reqwest::Client,
}

impl OpenMeteoClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> ToolResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("weather-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }
}

#[async_trait]
impl ForecastSource for OpenMeteoClient {
    #[tracing::instrument(name = "forecast.fetch", skip(self), fields(lat = query.latitude, lon = query.longitude))]
    async fn fetch(&self, query: &ForecastQuery) -> ToolResult<Forecast> {
        debug!(target: "weather", timezone = %query.timezone, days = query.days, "Fetching forecast");

        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("latitude", query.latitude.to_string()),
                ("longitude", query.longitude.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("timezone", query.timezone.clone()),
                ("forecast_days", query.days.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ToolError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ToolError::Upstream(format!("{} {}", status, body.trim())));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ToolError::Request(e.to_string()))?;
        let data: OpenMeteoResponse = serde_json::from_str(&body)
            .map_err(|e| ToolError::MalformedResponse(e.to_string()))?;
        let daily = data
            .daily
            .ok_or_else(|| ToolError::MalformedResponse("missing 'daily' block".into()))?;

        let days = daily.into_days()?;
        debug!(target: "weather", count = days.len(), "Forecast received");

        Ok(Forecast {
            latitude: query.latitude,
            longitude: query.longitude,
            timezone: query.timezone.clone(),
            days,
        })
    }
}

/// Runs the `get_weather_forecast` function against `source`.
pub async fn get_weather_forecast(
    source: &dyn ForecastSource,
    args: &Map<String, Value>,
) -> ToolResult<Forecast> {
    let query = ForecastQuery::from_arguments(args)?;
    source.fetch(&query).await
}
