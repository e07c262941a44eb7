//! Patient telemetry domain model

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Blood pressure reading in mmHg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pressure {
    pub systolic: u32,
    pub diastolic: u32,
}

/// One historical measurement tick.
///
/// Samples are immutable once appended and ordered by arrival. Fields the
/// feed did not report on this tick are recorded as `0` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalSample {
    /// Server-side arrival time of the measurement.
    pub timestamp: DateTime<Utc>,
    pub pressure: Pressure,
    pub blood_sugar: f64,
    pub pulse: u32,
}

/// Liveness of a patient feed.
///
/// `Active` → `Disconnecting` on a disconnect signal; back to `Active` when
/// fresh vitals arrive within the grace window. A record whose grace window
/// elapses is deleted outright, so there is no terminal variant to observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessState {
    Active,
    Disconnecting,
}

/// In-memory state for a single monitored patient.
///
/// The latest-vitals snapshot keeps `Option` fields: a vital that was never
/// reported stays `None` and is never synthesized as zero. The bounded
/// history holds concrete samples with placeholders instead.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub patient_id: String,
    pub ward_number: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<Pressure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_sugar: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse: Option<u32>,
    /// Server-side time of the last applied event.
    pub last_update: DateTime<Utc>,
    /// Device-declared timestamp of the last event, stored as-is for display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_at: Option<String>,
    pub liveness: LivenessState,
    pub history: VecDeque<VitalSample>,
}

impl PatientRecord {
    pub fn new(patient_id: impl Into<String>, ward_number: u16) -> Self {
        Self {
            patient_id: patient_id.into(),
            ward_number,
            first_name: None,
            last_name: None,
            diagnosis: None,
            pressure: None,
            blood_sugar: None,
            pulse: None,
            last_update: Utc::now(),
            reported_at: None,
            liveness: LivenessState::Active,
            history: VecDeque::new(),
        }
    }

    /// Append a sample, evicting the oldest once `capacity` is reached.
    pub fn push_sample(&mut self, sample: VitalSample, capacity: usize) {
        if capacity == 0 {
            return;
        }
        while self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(sample);
    }

    pub fn is_disconnecting(&self) -> bool {
        self.liveness == LivenessState::Disconnecting
    }
}
