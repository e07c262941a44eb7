//! The telemetry hub — one event loop over all connections and timers
//!
//! Every inbound frame, transport close, idle probe and grace timer firing
//! is funneled into a single unbounded queue and processed in arrival order.
//! That serialization is what makes the hub deterministic: a timer firing
//! and fresh data for the same patient cannot race, and the patient table
//! needs no locks. Handlers must therefore stay short and non-blocking.

pub mod grace;
pub mod patients;
pub mod router;

use std::time::Duration;

use metrics::counter;
use tokio::sync::{mpsc, oneshot};
use tracing::info;
use uuid::Uuid;

use crate::application::session::SharedSessionRegistry;
use crate::config::HubConfig;
use crate::domain::{HubError, HubResult, PatientRecord};
use crate::protocol::InboundMessage;
use crate::shared::ShutdownSignal;

use grace::GraceScheduler;
use patients::PatientTable;
use router::Router;

/// Tuning knobs for one hub instance.
#[derive(Debug, Clone)]
pub struct HubOptions {
    /// Delay between a disconnect signal and actual removal.
    pub grace_period: Duration,
    /// Bounded per-patient history length.
    pub history_capacity: usize,
    /// Ward number assigned to patients whose feed never declares one.
    pub default_ward: u16,
    /// How long an unclassified connection may stay silent before it is
    /// dropped.
    pub unclassified_idle: Duration,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5),
            history_capacity: 20,
            default_ward: 101,
            unclassified_idle: Duration::from_secs(30),
        }
    }
}

impl From<&HubConfig> for HubOptions {
    fn from(cfg: &HubConfig) -> Self {
        Self {
            grace_period: Duration::from_secs(cfg.grace_period_secs),
            history_capacity: cfg.history_capacity,
            default_ward: cfg.default_ward,
            unclassified_idle: Duration::from_secs(cfg.unclassified_idle_secs),
        }
    }
}

/// One unit of work for the hub loop.
#[derive(Debug)]
pub enum HubEvent {
    /// A transport connection was accepted.
    Connected {
        connection_id: Uuid,
        sender: mpsc::UnboundedSender<String>,
    },
    /// A parsed frame arrived on a connection.
    Inbound {
        connection_id: Uuid,
        message: InboundMessage,
    },
    /// The transport closed, cleanly or not.
    TransportClosed { connection_id: Uuid },
    /// Check whether a connection classified itself in time.
    IdleProbe { connection_id: Uuid },
    /// A grace timer ran out.
    GraceElapsed { patient_id: String, generation: u64 },
    /// Read-only query of the patient table.
    Snapshot {
        reply: oneshot::Sender<Vec<PatientRecord>>,
    },
}

/// The hub instance. Owns the patient table, grace timers and feed tracking;
/// everything else talks to it through a [`HubHandle`].
///
/// No ambient singletons: several hubs can run in one process, each with its
/// own registry and state.
pub struct Hub {
    events_tx: mpsc::UnboundedSender<HubEvent>,
    events_rx: mpsc::UnboundedReceiver<HubEvent>,
    router: Router,
    registry: SharedSessionRegistry,
    unclassified_idle: Duration,
}

impl Hub {
    pub fn new(options: HubOptions, registry: SharedSessionRegistry) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let patients = PatientTable::new(options.history_capacity, options.default_ward);
        let grace = GraceScheduler::new(options.grace_period, events_tx.clone());
        let router = Router::new(registry.clone(), patients, grace);

        Self {
            events_tx,
            events_rx,
            router,
            registry,
            unclassified_idle: options.unclassified_idle,
        }
    }

    /// Handle for submitting events and querying state. Cloneable.
    pub fn handle(&self) -> HubHandle {
        HubHandle {
            events: self.events_tx.clone(),
            registry: self.registry.clone(),
        }
    }

    /// Run the event loop until shutdown. Consumes the hub.
    pub async fn run(mut self, shutdown: ShutdownSignal) {
        info!("Telemetry hub started");

        loop {
            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
                _ = shutdown.notified().wait() => {
                    info!("Telemetry hub received shutdown signal");
                    break;
                }
            }
        }

        self.router.shutdown();
        info!("Telemetry hub stopped");
    }

    fn dispatch(&mut self, event: HubEvent) {
        counter!("hub_events_total").increment(1);

        match event {
            HubEvent::Connected {
                connection_id,
                sender,
            } => {
                self.router.handle_connected(connection_id, sender);
                self.spawn_idle_probe(connection_id);
            }
            HubEvent::Inbound {
                connection_id,
                message,
            } => self.router.handle_inbound(connection_id, message),
            HubEvent::TransportClosed { connection_id } => {
                self.router.handle_transport_closed(connection_id)
            }
            HubEvent::IdleProbe { connection_id } => self.router.handle_idle_probe(connection_id),
            HubEvent::GraceElapsed {
                patient_id,
                generation,
            } => self.router.handle_grace_elapsed(&patient_id, generation),
            HubEvent::Snapshot { reply } => {
                let _ = reply.send(self.router.snapshot());
            }
        }
    }

    fn spawn_idle_probe(&self, connection_id: Uuid) {
        let events = self.events_tx.clone();
        let idle = self.unclassified_idle;
        tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            let _ = events.send(HubEvent::IdleProbe { connection_id });
        });
    }
}

/// Cloneable handle to a running hub.
#[derive(Clone)]
pub struct HubHandle {
    events: mpsc::UnboundedSender<HubEvent>,
    registry: SharedSessionRegistry,
}

impl HubHandle {
    /// Submit an event to the hub queue. Returns `false` once the hub has
    /// stopped.
    pub fn submit(&self, event: HubEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn connected(&self, connection_id: Uuid, sender: mpsc::UnboundedSender<String>) -> bool {
        self.submit(HubEvent::Connected {
            connection_id,
            sender,
        })
    }

    pub fn inbound(&self, connection_id: Uuid, message: InboundMessage) -> bool {
        self.submit(HubEvent::Inbound {
            connection_id,
            message,
        })
    }

    pub fn transport_closed(&self, connection_id: Uuid) -> bool {
        self.submit(HubEvent::TransportClosed { connection_id })
    }

    /// Snapshot of every live patient record, answered by the hub loop.
    pub async fn snapshot(&self) -> HubResult<Vec<PatientRecord>> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(HubEvent::Snapshot { reply })
            .map_err(|_| HubError::HubClosed)?;
        rx.await.map_err(|_| HubError::HubClosed)
    }

    pub fn registry(&self) -> &SharedSessionRegistry {
        &self.registry
    }
}
