//! Fan-out router — the hub's message state machine
//!
//! Every validated inbound event lands here: the router updates the patient
//! table, drives the grace scheduler, and broadcasts the resulting event to
//! all monitor connections. It also remembers which patient ids each source
//! connection has been feeding, since one feed may multiplex several
//! patients; an abrupt transport close then counts as a disconnect signal
//! for each of them.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::session::{Connection, Role, SharedSessionRegistry};
use crate::domain::PatientRecord;
use crate::protocol::{
    connected_ack, DisconnectFrame, DisconnectNotice, InboundMessage, MedicalDataBroadcast,
    MedicalDataFrame, MonitorInitFrame, OutboundMessage,
};

use super::grace::GraceScheduler;
use super::patients::PatientTable;

pub struct Router {
    registry: SharedSessionRegistry,
    patients: PatientTable,
    grace: GraceScheduler,
    /// Patient ids each source connection has been actively feeding.
    feeds: HashMap<Uuid, HashSet<String>>,
}

impl Router {
    pub fn new(
        registry: SharedSessionRegistry,
        patients: PatientTable,
        grace: GraceScheduler,
    ) -> Self {
        Self {
            registry,
            patients,
            grace,
            feeds: HashMap::new(),
        }
    }

    pub fn handle_connected(&mut self, connection_id: Uuid, sender: mpsc::UnboundedSender<String>) {
        self.registry.register(Connection::new(connection_id, sender));
    }

    pub fn handle_inbound(&mut self, connection_id: Uuid, message: InboundMessage) {
        match message {
            InboundMessage::MonitorInit(frame) => self.on_monitor_init(connection_id, frame),
            InboundMessage::MedicalData(frame) => self.on_medical_data(connection_id, frame),
            InboundMessage::PatientDisconnected(frame) => self.on_patient_disconnected(frame),
            InboundMessage::Unknown => {
                debug!(%connection_id, "Ignoring message with unknown type");
                counter!("hub_dropped_frames_total").increment(1);
            }
        }
    }

    fn on_monitor_init(&mut self, connection_id: Uuid, frame: MonitorInitFrame) {
        if !self.registry.classify(connection_id, Role::Monitor) {
            return;
        }
        if let Some(client_type) = frame.client_type {
            debug!(%connection_id, client_type, "Monitor identified itself");
        }
        let _ = self.registry.send_to(connection_id, connected_ack());

        // Replay the latest known snapshot of every live patient so the new
        // dashboard starts populated instead of waiting for the next tick.
        let mut replayed = 0;
        for record in self.patients.records() {
            let frame = OutboundMessage::MedicalData(MedicalDataBroadcast::from_record(record));
            if self.registry.send_to(connection_id, frame.serialize()).is_err() {
                break;
            }
            replayed += 1;
        }
        if replayed > 0 {
            debug!(%connection_id, replayed, "Replayed patient snapshots to new monitor");
        }
    }

    fn on_medical_data(&mut self, connection_id: Uuid, frame: MedicalDataFrame) {
        let Some(patient_id) = frame.canonical_patient_id().map(str::to_string) else {
            debug!(%connection_id, "Dropping medical_data without patient identifier");
            counter!("hub_dropped_frames_total").increment(1);
            return;
        };

        if self.registry.role_of(connection_id) == Some(Role::Unclassified) {
            self.registry.classify(connection_id, Role::Source);
        }
        self.feeds
            .entry(connection_id)
            .or_default()
            .insert(patient_id.clone());

        // Fresh data beats a pending removal.
        if self.grace.cancel(&patient_id) {
            debug!(patient_id, "Fresh vitals cancelled pending removal");
        }

        let record = self.patients.apply_vitals(&patient_id, &frame, Utc::now());
        let ward_number = record.ward_number;

        counter!("hub_medical_data_total").increment(1);
        gauge!("hub_active_patients").set(self.patients.len() as f64);

        self.broadcast(OutboundMessage::MedicalData(
            MedicalDataBroadcast::from_frame(&patient_id, ward_number, &frame),
        ));
    }

    fn on_patient_disconnected(&mut self, frame: DisconnectFrame) {
        let Some(patient_id) = frame.canonical_patient_id() else {
            debug!("Dropping patient_disconnected without patient identifier");
            counter!("hub_dropped_frames_total").increment(1);
            return;
        };
        let patient_id = patient_id.to_string();
        self.signal_disconnect(&patient_id);
    }

    /// Start the grace window for a patient, if one is not already running.
    /// Broadcasts the interim "disconnecting" notice exactly once per window.
    fn signal_disconnect(&mut self, patient_id: &str) {
        if self.patients.get(patient_id).is_none() {
            debug!(patient_id, "Disconnect signal for unknown patient, ignoring");
            return;
        }
        if !self.grace.schedule(patient_id) {
            return;
        }

        if let Some(record) = self.patients.mark_disconnecting(patient_id) {
            info!(patient_id, "Patient disconnecting, grace timer started");
            let notice = DisconnectNotice {
                patient_id: patient_id.to_string(),
                ward_number: record.ward_number,
            };
            self.broadcast(OutboundMessage::PatientDisconnected(notice));
        }
    }

    /// Abrupt transport close. For a source feed this is a disconnect signal
    /// for every patient it was feeding.
    pub fn handle_transport_closed(&mut self, connection_id: Uuid) {
        if let Some(patient_ids) = self.feeds.remove(&connection_id) {
            for patient_id in patient_ids {
                self.signal_disconnect(&patient_id);
            }
        }
        self.registry.unregister(connection_id);
    }

    /// Drop connections that never sent a valid message within the idle
    /// window.
    pub fn handle_idle_probe(&mut self, connection_id: Uuid) {
        if self.registry.role_of(connection_id) == Some(Role::Unclassified) {
            info!(%connection_id, "Dropping connection that never classified itself");
            self.registry.unregister(connection_id);
        }
    }

    /// A grace timer firing, pulled off the event queue. Cancelled or
    /// superseded timers fail the confirm check and do nothing.
    pub fn handle_grace_elapsed(&mut self, patient_id: &str, generation: u64) {
        if !self.grace.confirm(patient_id, generation) {
            return;
        }
        if let Some(record) = self.patients.remove(patient_id) {
            info!(patient_id, "Grace period elapsed, patient removed");
            gauge!("hub_active_patients").set(self.patients.len() as f64);
            let notice = DisconnectNotice {
                patient_id: record.patient_id,
                ward_number: record.ward_number,
            };
            self.broadcast(OutboundMessage::PatientDisconnected(notice));
        }
    }

    pub fn snapshot(&self) -> Vec<PatientRecord> {
        self.patients.records().cloned().collect()
    }

    /// Stop everything: no timer fires after this, and dropping the senders
    /// closes every connection.
    pub fn shutdown(&mut self) {
        self.grace.cancel_all();
        self.registry.close_all();
    }

    fn broadcast(&self, message: OutboundMessage) {
        let delivered = self.registry.broadcast_to_monitors(&message.serialize());
        counter!("hub_broadcast_frames_total").increment(delivered as u64);
    }
}
