//! Rolling series of readings with threshold alerts, kept by a feed consumer.

use std::collections::VecDeque;

use serde::Serialize;

use crate::models::{NotificationKind, TemperatureReading};

/// Readings above this raise an `alert`.
pub const HIGH_TEMPERATURE: f64 = 27.0;
/// Readings below this raise an `info`.
pub const LOW_TEMPERATURE: f64 = 21.0;
/// Alerts kept, newest first.
pub const MAX_ALERTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub time: String,
}

/// Min / max / average over the retained points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

#[derive(Debug, Default)]
pub struct LiveSeries {
    points: VecDeque<TemperatureReading>,
    max_points: Option<usize>,
    alerts: VecDeque<Alert>,
    latest: Option<f64>,
}

impl LiveSeries {
    /// `max_points` caps the retained readings; `None` keeps all of them.
    pub fn new(max_points: Option<usize>) -> Self {
        Self {
            max_points: max_points.filter(|&n| n > 0),
            ..Self::default()
        }
    }

    /// Seed with historical points. History never raises alerts.
    pub fn with_history(history: Vec<TemperatureReading>, max_points: Option<usize>) -> Self {
        let mut series = Self::new(max_points);
        for reading in history {
            series.append(reading);
        }
        series
    }

    /// Append a live reading; returns the alert it raised, if any.
    pub fn push(&mut self, reading: TemperatureReading) -> Option<Alert> {
        let alert = threshold_alert(&reading);
        self.latest = Some(reading.value);
        self.append(reading);
        if let Some(alert) = &alert {
            self.alerts.push_front(alert.clone());
            self.alerts.truncate(MAX_ALERTS);
        }
        alert
    }

    fn append(&mut self, reading: TemperatureReading) {
        self.points.push_back(reading);
        if let Some(max) = self.max_points {
            while self.points.len() > max {
                self.points.pop_front();
            }
        }
    }

    pub fn points(&self) -> impl Iterator<Item = &TemperatureReading> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Recent alerts, newest first.
    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    /// Last live temperature with one decimal, or `N/A` before the first live reading.
    pub fn latest_temperature(&self) -> String {
        match self.latest {
            Some(value) => format!("{:.1}", value),
            None => "N/A".to_string(),
        }
    }

    pub fn stats(&self) -> Option<SeriesStats> {
        if self.points.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for p in &self.points {
            min = min.min(p.value);
            max = max.max(p.value);
            sum += p.value;
        }
        Some(SeriesStats {
            min,
            max,
            average: sum / self.points.len() as f64,
        })
    }
}

fn threshold_alert(reading: &TemperatureReading) -> Option<Alert> {
    let device = reading.device_id.as_deref().unwrap_or("N/A");
    if reading.value > HIGH_TEMPERATURE {
        Some(Alert {
            kind: NotificationKind::Alert,
            title: "High temperature".to_string(),
            message: format!("Device {} reports {}°C.", device, reading.value),
            time: reading.time.clone(),
        })
    } else if reading.value < LOW_TEMPERATURE {
        Some(Alert {
            kind: NotificationKind::Info,
            title: "Low temperature".to_string(),
            message: format!("Device {} reports {}°C (low).", device, reading.value),
            time: reading.time.clone(),
        })
    } else {
        None
    }
}
