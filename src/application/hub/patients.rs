//! Patient state table — latest vitals, bounded history, liveness

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::{LivenessState, PatientRecord, VitalSample};
use crate::protocol::MedicalDataFrame;

/// In-memory table of all monitored patients, keyed by canonical patient id.
///
/// Owned exclusively by the hub event loop; every mutation happens in event
/// arrival order, so no locking is needed.
pub struct PatientTable {
    records: HashMap<String, PatientRecord>,
    history_capacity: usize,
    default_ward: u16,
}

impl PatientTable {
    pub fn new(history_capacity: usize, default_ward: u16) -> Self {
        Self {
            records: HashMap::new(),
            history_capacity,
            default_ward,
        }
    }

    /// Apply one vitals tick.
    ///
    /// Creates the record on first sight of a patient id. Only fields present
    /// in the frame update the latest snapshot; an absent field never
    /// overwrites a known value. The history sample records `0` placeholders
    /// for fields absent on this tick. The record always comes out Active.
    pub fn apply_vitals(
        &mut self,
        patient_id: &str,
        frame: &MedicalDataFrame,
        now: DateTime<Utc>,
    ) -> &PatientRecord {
        let record = self
            .records
            .entry(patient_id.to_string())
            .or_insert_with(|| PatientRecord::new(patient_id, self.default_ward));

        if let Some(ward) = frame.ward_number {
            record.ward_number = ward;
        }
        if let Some(first_name) = &frame.first_name {
            record.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &frame.last_name {
            record.last_name = Some(last_name.clone());
        }
        if let Some(diagnosis) = &frame.diagnosis {
            record.diagnosis = Some(diagnosis.clone());
        }
        if let Some(pressure) = frame.pressure {
            record.pressure = Some(pressure);
        }
        if let Some(blood_sugar) = frame.blood_sugar {
            record.blood_sugar = Some(blood_sugar);
        }
        if let Some(pulse) = frame.pulse {
            record.pulse = Some(pulse);
        }
        if let Some(timestamp) = &frame.timestamp {
            record.reported_at = Some(timestamp.clone());
        }

        record.liveness = LivenessState::Active;
        record.last_update = now;
        record.push_sample(
            VitalSample {
                timestamp: now,
                pressure: frame.pressure.unwrap_or_default(),
                blood_sugar: frame.blood_sugar.unwrap_or(0.0),
                pulse: frame.pulse.unwrap_or(0),
            },
            self.history_capacity,
        );

        record
    }

    /// Flag a patient as disconnecting. `None` for an unknown id.
    pub fn mark_disconnecting(&mut self, patient_id: &str) -> Option<&PatientRecord> {
        let record = self.records.get_mut(patient_id)?;
        record.liveness = LivenessState::Disconnecting;
        Some(record)
    }

    /// Delete a record outright (no tombstone). Idempotent.
    pub fn remove(&mut self, patient_id: &str) -> Option<PatientRecord> {
        self.records.remove(patient_id)
    }

    pub fn get(&self, patient_id: &str) -> Option<&PatientRecord> {
        self.records.get(patient_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &PatientRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Pressure;

    fn table() -> PatientTable {
        PatientTable::new(20, 101)
    }

    #[test]
    fn partial_ticks_merge_into_snapshot() {
        let mut table = table();

        table.apply_vitals(
            "P1",
            &MedicalDataFrame {
                ward_number: Some(7),
                pulse: Some(72),
                ..Default::default()
            },
            Utc::now(),
        );
        let record = table.apply_vitals(
            "P1",
            &MedicalDataFrame {
                blood_sugar: Some(5.4),
                ..Default::default()
            },
            Utc::now(),
        );

        assert_eq!(record.pulse, Some(72));
        assert_eq!(record.blood_sugar, Some(5.4));
        assert_eq!(record.pressure, None);
        assert_eq!(record.ward_number, 7);
        assert_eq!(record.history.len(), 2);
    }

    #[test]
    fn history_samples_use_zero_placeholders() {
        let mut table = table();
        let record = table.apply_vitals(
            "P1",
            &MedicalDataFrame {
                pulse: Some(72),
                ..Default::default()
            },
            Utc::now(),
        );

        let sample = record.history.back().unwrap();
        assert_eq!(sample.pulse, 72);
        assert_eq!(sample.blood_sugar, 0.0);
        assert_eq!(sample.pressure, Pressure::default());
    }

    #[test]
    fn absent_fields_never_zero_the_snapshot() {
        let mut table = table();
        table.apply_vitals(
            "P1",
            &MedicalDataFrame {
                pressure: Some(Pressure {
                    systolic: 120,
                    diastolic: 80,
                }),
                ..Default::default()
            },
            Utc::now(),
        );
        let record = table.apply_vitals("P1", &MedicalDataFrame::default(), Utc::now());

        assert_eq!(
            record.pressure,
            Some(Pressure {
                systolic: 120,
                diastolic: 80
            })
        );
        assert_eq!(record.pulse, None);
    }

    #[test]
    fn first_sight_uses_default_ward() {
        let mut table = table();
        let record = table.apply_vitals("P1", &MedicalDataFrame::default(), Utc::now());
        assert_eq!(record.ward_number, 101);
    }

    #[test]
    fn history_capacity_is_enforced_fifo() {
        let mut table = PatientTable::new(3, 101);
        for pulse in 1..=5 {
            table.apply_vitals(
                "P1",
                &MedicalDataFrame {
                    pulse: Some(pulse),
                    ..Default::default()
                },
                Utc::now(),
            );
        }
        let record = table.get("P1").unwrap();
        let pulses: Vec<u32> = record.history.iter().map(|s| s.pulse).collect();
        assert_eq!(pulses, vec![3, 4, 5]);
    }

    #[test]
    fn fresh_vitals_reactivate_disconnecting_patient() {
        let mut table = table();
        table.apply_vitals("P1", &MedicalDataFrame::default(), Utc::now());
        assert!(table.mark_disconnecting("P1").is_some());
        assert!(table.get("P1").unwrap().is_disconnecting());

        let record = table.apply_vitals("P1", &MedicalDataFrame::default(), Utc::now());
        assert_eq!(record.liveness, LivenessState::Active);
    }

    #[test]
    fn mark_disconnecting_unknown_patient() {
        let mut table = table();
        assert!(table.mark_disconnecting("ghost").is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut table = table();
        table.apply_vitals("P1", &MedicalDataFrame::default(), Utc::now());
        assert!(table.remove("P1").is_some());
        assert!(table.remove("P1").is_none());
        assert!(table.is_empty());
    }
}
