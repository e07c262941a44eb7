//! Session registry — tracks live hub connections and their roles

use std::sync::Arc;

use dashmap::DashMap;
use metrics::gauge;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::connection::{Connection, Role};

/// Thread-safe registry of active connections.
///
/// Mutated only from the hub event loop; shared read-only with the HTTP
/// status surface.
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Connection>,
}

/// Shared, reference-counted session registry
pub type SharedSessionRegistry = Arc<SessionRegistry>;

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Wrap in `Arc` for shared ownership
    pub fn shared() -> SharedSessionRegistry {
        Arc::new(Self::new())
    }

    /// Register a new, not yet classified connection
    pub fn register(&self, connection: Connection) {
        info!(connection_id = %connection.connection_id, "Registering connection");
        self.sessions
            .insert(connection.connection_id, connection);
        self.refresh_gauges();
    }

    /// Classify a connection by its first valid message. Returns `false` if
    /// the connection is unknown or was already classified.
    pub fn classify(&self, connection_id: Uuid, role: Role) -> bool {
        let classified = match self.sessions.get_mut(&connection_id) {
            Some(mut conn) if conn.role == Role::Unclassified => {
                info!(%connection_id, %role, "Connection classified");
                conn.role = role;
                true
            }
            Some(_) => false,
            None => {
                warn!(%connection_id, "Attempted to classify unknown connection");
                false
            }
        };
        if classified {
            self.refresh_gauges();
        }
        classified
    }

    pub fn role_of(&self, connection_id: Uuid) -> Option<Role> {
        self.sessions.get(&connection_id).map(|conn| conn.role)
    }

    /// Unregister a connection. Dropping its sender ends the writer task,
    /// which closes the underlying transport.
    pub fn unregister(&self, connection_id: Uuid) -> bool {
        let removed = self.sessions.remove(&connection_id).is_some();
        if removed {
            info!(%connection_id, "Unregistered connection");
            self.refresh_gauges();
        } else {
            debug!(%connection_id, "Connection already unregistered");
        }
        removed
    }

    /// Send a frame to one specific connection
    pub fn send_to(&self, connection_id: Uuid, message: String) -> Result<(), String> {
        match self.sessions.get(&connection_id) {
            Some(conn) => conn.send(message),
            None => Err(format!("Connection {} not registered", connection_id)),
        }
    }

    /// Broadcast a frame to every monitor connection.
    ///
    /// A failed send never propagates to the caller: the dead connection is
    /// logged, unregistered, and delivery continues to the rest. Returns the
    /// number of monitors the frame was delivered to.
    pub fn broadcast_to_monitors(&self, message: &str) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        for entry in self.sessions.iter() {
            if entry.role != Role::Monitor {
                continue;
            }
            match entry.send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        connection_id = %entry.connection_id,
                        error = %e,
                        "Dropping monitor with failed delivery"
                    );
                    dead.push(entry.connection_id);
                }
            }
        }

        // Removal must happen after iteration; removing while holding the
        // iterator's shard lock would deadlock.
        for connection_id in dead {
            self.unregister(connection_id);
        }

        delivered
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn monitor_count(&self) -> usize {
        self.count_role(Role::Monitor)
    }

    pub fn source_count(&self) -> usize {
        self.count_role(Role::Source)
    }

    fn count_role(&self, role: Role) -> usize {
        self.sessions.iter().filter(|c| c.role == role).count()
    }

    /// Drop every connection. Writer tasks see their channels close and shut
    /// the transports down.
    pub fn close_all(&self) {
        let count = self.count();
        if count > 0 {
            info!(count, "Closing all connections");
        }
        self.sessions.clear();
        self.refresh_gauges();
    }

    fn refresh_gauges(&self) {
        gauge!("hub_connected_monitors").set(self.monitor_count() as f64);
        gauge!("hub_connected_sources").set(self.source_count() as f64);
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn connect(registry: &SessionRegistry) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(Connection::new(id, tx));
        (id, rx)
    }

    #[test]
    fn classify_only_once() {
        let registry = SessionRegistry::new();
        let (id, _rx) = connect(&registry);

        assert!(registry.classify(id, Role::Monitor));
        assert!(!registry.classify(id, Role::Source));
        assert_eq!(registry.role_of(id), Some(Role::Monitor));
    }

    #[test]
    fn classify_unknown_connection_is_rejected() {
        let registry = SessionRegistry::new();
        assert!(!registry.classify(Uuid::new_v4(), Role::Monitor));
    }

    #[test]
    fn broadcast_reaches_only_monitors() {
        let registry = SessionRegistry::new();
        let (monitor, mut monitor_rx) = connect(&registry);
        let (source, mut source_rx) = connect(&registry);
        registry.classify(monitor, Role::Monitor);
        registry.classify(source, Role::Source);

        let delivered = registry.broadcast_to_monitors("frame");
        assert_eq!(delivered, 1);
        assert_eq!(monitor_rx.try_recv().unwrap(), "frame");
        assert!(source_rx.try_recv().is_err());
    }

    #[test]
    fn broadcast_isolates_dead_monitor() {
        let registry = SessionRegistry::new();
        let (alive_a, mut rx_a) = connect(&registry);
        let (dead, dead_rx) = connect(&registry);
        let (alive_b, mut rx_b) = connect(&registry);
        for id in [alive_a, dead, alive_b] {
            registry.classify(id, Role::Monitor);
        }
        drop(dead_rx);

        let delivered = registry.broadcast_to_monitors("frame");

        assert_eq!(delivered, 2);
        assert_eq!(rx_a.try_recv().unwrap(), "frame");
        assert_eq!(rx_b.try_recv().unwrap(), "frame");
        // The dead monitor was unregistered, the others survive.
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.role_of(dead), None);
    }

    #[test]
    fn close_all_drops_senders() {
        let registry = SessionRegistry::new();
        let (_id, mut rx) = connect(&registry);

        registry.close_all();

        assert_eq!(registry.count(), 0);
        // Channel closed: recv side observes disconnect.
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
