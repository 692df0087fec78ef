use std::num::Wrapping;
use std::sync::Arc;

use tokio::sync::mpsc::{channel, Sender};

use system::ConnectionId;

use super::connection::{ConnectionCommand, ConnectionEvent};
use crate::connection_tx_storage::ConnectionTxStorage;
use crate::coordinator::SessionCoordinator;
use crate::session::MemberSession;
use crate::snapshot_file::SnapshotStore;

pub type ServerTx = Sender<ConnectionCommand>;

/// Commands a single connection may have queued before it is cut off.
const MEMBER_SESSION_BUFFER: usize = 16;

struct Server {
    coordinator: Arc<SessionCoordinator>,
    snapshots: SnapshotStore,
    connection_id_source: Wrapping<ConnectionId>,
    connections: ConnectionTxStorage,
}

impl Server {
    fn new(coordinator: Arc<SessionCoordinator>, snapshots: SnapshotStore) -> Self {
        Self {
            coordinator,
            snapshots,
            connection_id_source: Wrapping(0),
            connections: ConnectionTxStorage::new(),
        }
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        loop {
            self.connection_id_source += Wrapping(1);
            let connection_id = self.connection_id_source.0;
            if !self.connections.contains(&connection_id) {
                return connection_id;
            }
        }
    }

    async fn handle_connection_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Connect { tx, replica_tx } => {
                let connection_id = self.new_connection_id();
                let (session_tx, session_rx) = channel(MEMBER_SESSION_BUFFER);
                let member_session = MemberSession::new(
                    self.coordinator.clone(),
                    self.snapshots.clone(),
                    replica_tx,
                );
                tokio::spawn(member_session.run(session_rx, tx.clone()));
                self.connections.insert(connection_id, tx, session_tx);
                log::info!(
                    "Connection {} opened, {} open",
                    connection_id,
                    self.connections.len()
                );
                if !self
                    .connections
                    .send(&connection_id, ConnectionEvent::Connected { connection_id })
                    .await
                {
                    self.connections.remove(&connection_id);
                }
            }
            ConnectionCommand::Disconnect { from } => {
                if self.connections.remove(&from).is_some() {
                    log::info!("Connection {} closed", from);
                }
            }
            ConnectionCommand::IdentifiableCommand { from, command } => {
                if !self.connections.route(&from, command) {
                    log::warn!("Disconnecting connection {}: too many queued commands", from);
                    self.disconnect(&from).await;
                }
            }
        }
    }

    async fn disconnect(&mut self, connection_id: &ConnectionId) {
        self.connections
            .send(
                connection_id,
                ConnectionEvent::Disconnected {
                    connection_id: *connection_id,
                },
            )
            .await;
        self.connections.remove(connection_id);
    }
}

/// Accepts connections for `coordinator`. Each connection gets its own member session task.
pub fn spawn_server(coordinator: Arc<SessionCoordinator>, snapshots: SnapshotStore) -> ServerTx {
    let (srv_tx, mut srv_rx) = channel::<ConnectionCommand>(64);

    tokio::spawn(async move {
        let mut server = Box::new(Server::new(coordinator, snapshots));

        while let Some(command) = srv_rx.recv().await {
            server.handle_connection_command(command).await;
        }
    });

    srv_tx
}
