//! ThingSpeak channel client.
//!
//! Reads `GET {base_url}/channels/{id}/feeds/last.json[?api_key=..]`. Channel
//! fields arrive as strings (`"field1": "31.4"`) or null; the configured
//! [`FieldMap`] says which field carries which pollutant.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

use crate::config::{FieldMap, ThingSpeakConfig};

use super::{SensorError, SensorFeed, SensorSample};

pub struct ThingSpeakFeed {
    http: reqwest::Client,
    url: String,
    read_key: Option<String>,
    fields: FieldMap,
}

impl ThingSpeakFeed {
    pub fn new(config: &ThingSpeakConfig) -> Result<Self, SensorError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url: format!(
                "{}/channels/{}/feeds/last.json",
                config.base_url.trim_end_matches('/'),
                config.channel_id
            ),
            read_key: config.read_key.clone().filter(|k| !k.is_empty()),
            fields: config.fields.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SensorFeed for ThingSpeakFeed {
    async fn latest(&self) -> Result<SensorSample, SensorError> {
        let mut request = self.http.get(&self.url);
        if let Some(key) = &self.read_key {
            request = request.query(&[("api_key", key)]);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(SensorError::Status(resp.status()));
        }
        let body: Value = resp.json().await?;
        parse_entry(&body, &self.fields)
    }

    fn feed_name(&self) -> &str {
        "thingspeak"
    }
}

/// Extract a sample from a channel entry.
///
/// PM2.5 and PM10 are required. NO2 and CO default to 0 when the channel
/// leaves them empty; temperature is optional.
pub fn parse_entry(entry: &Value, fields: &FieldMap) -> Result<SensorSample, SensorError> {
    let timestamp = entry
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc));

    Ok(SensorSample {
        timestamp,
        pm25: field_value(entry, &fields.pm25, "pm25")?.ok_or(SensorError::MissingField("pm25"))?,
        pm10: field_value(entry, &fields.pm10, "pm10")?.ok_or(SensorError::MissingField("pm10"))?,
        no2: field_value(entry, &fields.no2, "no2")?.unwrap_or(0.0),
        co: field_value(entry, &fields.co, "co")?.unwrap_or(0.0),
        temperature: field_value(entry, &fields.temperature, "temperature")?,
    })
}

/// `Ok(None)` for a missing, null or empty field; an error for text that is
/// not a finite number.
fn field_value(entry: &Value, key: &str, field: &'static str) -> Result<Option<f64>, SensorError> {
    let value = match entry.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match value {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(SensorError::BadValue {
            field,
            raw: entry.get(key).map(Value::to_string).unwrap_or_default(),
        }),
    }
}
