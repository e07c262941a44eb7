//! Disconnect grace scheduler — deferred patient removal
//!
//! A patient going dark is not purged immediately: a grace timer gives
//! observers a visible "disconnecting" window first. Each timer is a spawned
//! sleep task that re-enters the hub event queue, so a firing is processed
//! in arrival order with everything else and can never race fresh data.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::HubEvent;

struct PendingGrace {
    generation: u64,
    task: JoinHandle<()>,
}

/// At most one live timer per patient id. Generation stamps make firing and
/// cancellation mutually exclusive: a cancelled timer's queued event fails
/// the [`GraceScheduler::confirm`] check, and a confirmed firing can no
/// longer be cancelled.
pub struct GraceScheduler {
    grace_period: Duration,
    events: mpsc::UnboundedSender<HubEvent>,
    pending: HashMap<String, PendingGrace>,
    next_generation: u64,
}

impl GraceScheduler {
    pub fn new(grace_period: Duration, events: mpsc::UnboundedSender<HubEvent>) -> Self {
        Self {
            grace_period,
            events,
            pending: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Start a grace timer for a patient. Returns `false` without touching
    /// the existing timer if one is already pending: a repeated disconnect
    /// signal does not extend the window.
    pub fn schedule(&mut self, patient_id: &str) -> bool {
        if self.pending.contains_key(patient_id) {
            debug!(patient_id, "Grace timer already pending");
            return false;
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let events = self.events.clone();
        let grace_period = self.grace_period;
        let id = patient_id.to_string();

        let task = tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            let _ = events.send(HubEvent::GraceElapsed {
                patient_id: id,
                generation,
            });
        });

        self.pending
            .insert(patient_id.to_string(), PendingGrace { generation, task });
        true
    }

    /// Cancel the pending timer, if any. A cancelled timer never fires.
    pub fn cancel(&mut self, patient_id: &str) -> bool {
        match self.pending.remove(patient_id) {
            Some(pending) => {
                pending.task.abort();
                true
            }
            None => false,
        }
    }

    /// Resolve a timer firing pulled off the event queue. `true` only for a
    /// still-pending timer of the same generation; the entry is consumed, so
    /// a firing confirms at most once.
    pub fn confirm(&mut self, patient_id: &str, generation: u64) -> bool {
        match self.pending.get(patient_id) {
            Some(pending) if pending.generation == generation => {
                self.pending.remove(patient_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self, patient_id: &str) -> bool {
        self.pending.contains_key(patient_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Abort every outstanding timer. Nothing fires after this returns.
    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.task.abort();
        }
    }
}
