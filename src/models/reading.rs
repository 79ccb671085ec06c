//! Sensor readings: the ingestion body and the record pushed on the realtime feed.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

/// The only `SensorData` type published on the realtime feed.
pub const TEMPERATURE_KIND: &str = "temperature";

/// Format used for the `time` field of feed records (`HH:MM:SS`).
pub const CLOCK_FORMAT: &str = "%H:%M:%S";

/// Format a wall-clock time the way feed records carry it.
pub fn clock_time(time: NaiveTime) -> String {
    time.format(CLOCK_FORMAT).to_string()
}

/// One point on the realtime feed, e.g. `{"time":"10:00:00","value":22.5,"deviceId":"temp-sensor-007"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureReading {
    pub time: String,
    pub value: f64,
    /// Historical seed points carry no device id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl TemperatureReading {
    pub fn new(time: NaiveTime, value: f64, device_id: impl Into<String>) -> Self {
        Self {
            time: clock_time(time),
            value,
            device_id: Some(device_id.into()),
        }
    }
}

/// Reading pushed by a device (or a broker bridge) through `POST /api/sensor-data`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SensorData {
    #[validate(length(min = 1, max = 64))]
    pub device_id: String,
    /// Reading type, e.g. `temperature`, `humidity`, `battery_percent`.
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 32))]
    pub kind: String,
    pub value: f64,
    #[serde(default)]
    #[validate(length(max = 16))]
    pub unit: String,
    #[serde(default)]
    pub location: Option<String>,
    /// Stamped with the receive time when absent.
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

impl SensorData {
    pub fn is_temperature(&self) -> bool {
        self.kind.trim().eq_ignore_ascii_case(TEMPERATURE_KIND)
    }

    /// The realtime feed carries degrees only; other reading types are refused.
    pub fn ensure_temperature(&self) -> Result<(), ValidationErrors> {
        if self.is_temperature() {
            return Ok(());
        }
        let mut error = ValidationError::new("unsupported_type");
        error.message = Some(
            format!("'{}' readings are not published on the temperature feed", self.kind).into(),
        );
        let mut errors = ValidationErrors::new();
        errors.add("type", error);
        Err(errors)
    }

    /// Convert to the feed record, using `now` when the device sent no timestamp.
    pub fn to_reading(&self, now: NaiveDateTime) -> TemperatureReading {
        let at = self.timestamp.unwrap_or(now);
        TemperatureReading {
            time: clock_time(at.time()),
            value: self.value,
            device_id: Some(self.device_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn reading_serializes_camel_case() {
        let reading = TemperatureReading::new(at(10, 0, 5).time(), 22.5, "temp-sensor-007");
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"time": "10:00:05", "value": 22.5, "deviceId": "temp-sensor-007"})
        );
    }

    #[test]
    fn reading_without_device_id_parses() {
        let reading: TemperatureReading =
            serde_json::from_str(r#"{"time":"10:00:00","value":22}"#).unwrap();
        assert_eq!(reading.time, "10:00:00");
        assert_eq!(reading.value, 22.0);
        assert_eq!(reading.device_id, None);
    }

    #[test]
    fn sensor_data_defaults_timestamp_to_now() {
        let data: SensorData = serde_json::from_str(
            r#"{"deviceId":"sensor-temp-001","type":"temperature","value":25.8,"unit":"C"}"#,
        )
        .unwrap();
        let reading = data.to_reading(at(14, 30, 0));
        assert_eq!(reading.time, "14:30:00");
        assert_eq!(reading.device_id.as_deref(), Some("sensor-temp-001"));
    }

    #[test]
    fn sensor_data_keeps_device_timestamp() {
        let data: SensorData = serde_json::from_str(
            r#"{"deviceId":"d1","type":"temperature","value":1.0,"timestamp":"2024-05-01T08:15:42"}"#,
        )
        .unwrap();
        assert_eq!(data.to_reading(at(14, 30, 0)).time, "08:15:42");
    }

    #[test]
    fn sensor_data_rejects_empty_device_id() {
        let data: SensorData =
            serde_json::from_str(r#"{"deviceId":"","type":"temperature","value":1.0}"#).unwrap();
        assert!(data.validate().is_err());
    }

    #[test]
    fn only_temperature_kind_is_accepted() {
        let parse = |kind: &str| -> SensorData {
            serde_json::from_value(serde_json::json!({
                "deviceId": "drone-alpha-001", "type": kind, "value": 15.0, "unit": "%"
            }))
            .unwrap()
        };
        assert!(parse("temperature").ensure_temperature().is_ok());
        assert!(parse("Temperature").ensure_temperature().is_ok());

        let errors = parse("battery_percent").ensure_temperature().unwrap_err();
        assert!(errors.field_errors().contains_key("type"));
        assert!(parse("humidity").ensure_temperature().is_err());
    }
}
