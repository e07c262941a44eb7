//! Wire protocol framing
//!
//! Textual JSON frames over a persistent WebSocket, dispatched on the `type`
//! field:
//!
//! - **monitor_init**          `{"type":"monitor_init", "clientType"?}`
//! - **medical_data**          `{"type":"medical_data", "patientId"|"clientId", ...vitals}`
//! - **patient_disconnected**  `{"type":"patient_disconnected", "patientId"|"clientId"}`
//!
//! Two historical field names exist for the patient identifier (`patientId`
//! and the older `clientId`). They are resolved to one canonical identifier
//! here, at the protocol boundary (first non-empty one wins), and the
//! ambiguity is never carried further in.

use serde::{Deserialize, Serialize};

use crate::domain::{PatientRecord, Pressure};

// ── Inbound ────────────────────────────────────────────────────

/// A parsed inbound frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// Dashboard registering as an observer.
    #[serde(rename = "monitor_init")]
    MonitorInit(MonitorInitFrame),
    /// One vitals tick from a device feed.
    #[serde(rename = "medical_data")]
    MedicalData(MedicalDataFrame),
    /// Explicit end-of-feed signal for one patient.
    #[serde(rename = "patient_disconnected")]
    PatientDisconnected(DisconnectFrame),
    /// Any other `type` value. Ignored by the router.
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Parse a raw JSON text into an `InboundMessage`.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorInitFrame {
    pub client_type: Option<String>,
}

/// Inbound vitals tick. All measurement fields are optional: absence means
/// "unknown this tick", not zero.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MedicalDataFrame {
    pub patient_id: Option<String>,
    pub client_id: Option<String>,
    pub ward_number: Option<u16>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub diagnosis: Option<String>,
    pub pressure: Option<Pressure>,
    pub blood_sugar: Option<f64>,
    pub pulse: Option<u32>,
    /// Device-declared timestamp, passed through as-is.
    pub timestamp: Option<String>,
}

impl MedicalDataFrame {
    /// Canonical patient identifier (`patientId`, falling back to `clientId`).
    pub fn canonical_patient_id(&self) -> Option<&str> {
        first_non_empty(&self.patient_id, &self.client_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisconnectFrame {
    pub patient_id: Option<String>,
    pub client_id: Option<String>,
}

impl DisconnectFrame {
    /// Canonical patient identifier (`patientId`, falling back to `clientId`).
    pub fn canonical_patient_id(&self) -> Option<&str> {
        first_non_empty(&self.patient_id, &self.client_id)
    }
}

fn first_non_empty<'a>(primary: &'a Option<String>, alias: &'a Option<String>) -> Option<&'a str> {
    primary
        .as_deref()
        .filter(|id| !id.is_empty())
        .or_else(|| alias.as_deref().filter(|id| !id.is_empty()))
}

// ── Outbound ───────────────────────────────────────────────────

/// A frame sent to monitor connections.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "medical_data")]
    MedicalData(MedicalDataBroadcast),
    #[serde(rename = "patient_disconnected")]
    PatientDisconnected(DisconnectNotice),
}

impl OutboundMessage {
    /// Serialize this frame to a JSON string.
    pub fn serialize(&self) -> String {
        // to_string on these types never fails
        serde_json::to_string(self).unwrap()
    }
}

/// Outbound vitals event. Always carries the canonical `patientId` and an
/// effective `wardNumber` so every client revision can group by ward.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalDataBroadcast {
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl MedicalDataBroadcast {
    /// Echo an inbound tick, enriched with the canonical id and ward.
    pub fn from_frame(patient_id: &str, ward_number: u16, frame: &MedicalDataFrame) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            ward_number,
            first_name: frame.first_name.clone(),
            last_name: frame.last_name.clone(),
            diagnosis: frame.diagnosis.clone(),
            pressure: frame.pressure,
            blood_sugar: frame.blood_sugar,
            pulse: frame.pulse,
            timestamp: frame.timestamp.clone(),
        }
    }

    /// The latest known snapshot of a record, for replay to a new monitor.
    pub fn from_record(record: &PatientRecord) -> Self {
        Self {
            patient_id: record.patient_id.clone(),
            ward_number: record.ward_number,
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            diagnosis: record.diagnosis.clone(),
            pressure: record.pressure,
            blood_sugar: record.blood_sugar,
            pulse: record.pulse,
            timestamp: record.reported_at.clone(),
        }
    }
}

/// Sent both as the interim "disconnecting" notice and as the final removal
/// notice once the grace window elapses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectNotice {
    pub patient_id: String,
    pub ward_number: u16,
}

/// Acknowledgement sent to a monitor right after registration.
#[derive(Debug, Clone, Serialize)]
struct StatusFrame {
    status: &'static str,
}

pub fn connected_ack() -> String {
    serde_json::to_string(&StatusFrame {
        status: "connected",
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_monitor_init() {
        let msg = InboundMessage::parse(r#"{"type":"monitor_init","clientType":"dashboard"}"#)
            .unwrap();
        match msg {
            InboundMessage::MonitorInit(frame) => {
                assert_eq!(frame.client_type.as_deref(), Some("dashboard"));
            }
            _ => panic!("Expected MonitorInit"),
        }
    }

    #[test]
    fn parse_medical_data_with_partial_vitals() {
        let msg = InboundMessage::parse(
            r#"{"type":"medical_data","patientId":"P1","wardNumber":7,"pulse":72}"#,
        )
        .unwrap();
        match msg {
            InboundMessage::MedicalData(frame) => {
                assert_eq!(frame.canonical_patient_id(), Some("P1"));
                assert_eq!(frame.ward_number, Some(7));
                assert_eq!(frame.pulse, Some(72));
                assert!(frame.pressure.is_none());
                assert!(frame.blood_sugar.is_none());
            }
            _ => panic!("Expected MedicalData"),
        }
    }

    #[test]
    fn client_id_is_accepted_as_alias() {
        let msg =
            InboundMessage::parse(r#"{"type":"medical_data","clientId":"P2","bloodSugar":5.4}"#)
                .unwrap();
        match msg {
            InboundMessage::MedicalData(frame) => {
                assert_eq!(frame.canonical_patient_id(), Some("P2"));
            }
            _ => panic!("Expected MedicalData"),
        }
    }

    #[test]
    fn patient_id_wins_over_client_id() {
        let frame = MedicalDataFrame {
            patient_id: Some("P1".into()),
            client_id: Some("legacy".into()),
            ..Default::default()
        };
        assert_eq!(frame.canonical_patient_id(), Some("P1"));
    }

    #[test]
    fn empty_patient_id_falls_back_to_client_id() {
        let frame = DisconnectFrame {
            patient_id: Some(String::new()),
            client_id: Some("P3".into()),
        };
        assert_eq!(frame.canonical_patient_id(), Some("P3"));
    }

    #[test]
    fn missing_identifier_resolves_to_none() {
        let frame = MedicalDataFrame::default();
        assert!(frame.canonical_patient_id().is_none());
    }

    #[test]
    fn unknown_type_parses_to_unknown() {
        let msg = InboundMessage::parse(r#"{"type":"room_assignment","roomId":4}"#).unwrap();
        assert!(matches!(msg, InboundMessage::Unknown));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(InboundMessage::parse("{not json").is_err());
        assert!(InboundMessage::parse(r#"{"pulse":72}"#).is_err());
    }

    #[test]
    fn broadcast_always_carries_ward() {
        let frame = MedicalDataFrame {
            patient_id: Some("P1".into()),
            pulse: Some(80),
            ..Default::default()
        };
        let out = OutboundMessage::MedicalData(MedicalDataBroadcast::from_frame("P1", 101, &frame));
        let json: serde_json::Value = serde_json::from_str(&out.serialize()).unwrap();
        assert_eq!(json["type"], "medical_data");
        assert_eq!(json["patientId"], "P1");
        assert_eq!(json["wardNumber"], 101);
        assert_eq!(json["pulse"], 80);
        assert!(json.get("bloodSugar").is_none());
        assert!(json.get("clientId").is_none());
    }

    #[test]
    fn disconnect_notice_shape() {
        let out = OutboundMessage::PatientDisconnected(DisconnectNotice {
            patient_id: "P1".into(),
            ward_number: 7,
        });
        let json: serde_json::Value = serde_json::from_str(&out.serialize()).unwrap();
        assert_eq!(json["type"], "patient_disconnected");
        assert_eq!(json["patientId"], "P1");
        assert_eq!(json["wardNumber"], 7);
    }

    #[test]
    fn connected_ack_shape() {
        let json: serde_json::Value = serde_json::from_str(&connected_ack()).unwrap();
        assert_eq!(json["status"], "connected");
    }
}
