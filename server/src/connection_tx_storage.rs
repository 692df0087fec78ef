use std::collections::HashMap;

use system::{ConnectionId, IdentifiableCommand};
use tokio::sync::mpsc::Sender;

use crate::connection::ConnectionEvent;

pub type ConnectionTx = Sender<ConnectionEvent>;
pub type MemberSessionTx = Sender<IdentifiableCommand>;

/// Live connections: where to send their events and where their commands go.
pub struct ConnectionTxStorage {
    connection_txs: HashMap<ConnectionId, (ConnectionTx, MemberSessionTx)>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.connection_txs.len()
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connection_txs.contains_key(connection_id)
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx, session_tx: MemberSessionTx) {
        self.connection_txs.insert(connection_id, (tx, session_tx));
    }

    pub async fn send(&self, to: &ConnectionId, message: ConnectionEvent) -> bool {
        match self.connection_txs.get(to) {
            Some((tx, _)) => {
                let sent = tx.send(message).await.is_ok();
                if !sent {
                    log::warn!("Connection {} is gone", to);
                }
                sent
            }
            None => {
                log::warn!("No connection {}", to);
                false
            }
        }
    }

    /// Queues a command for the connection's member session.
    pub fn route(&self, from: &ConnectionId, command: IdentifiableCommand) -> bool {
        match self.connection_txs.get(from) {
            Some((_, session_tx)) => session_tx.try_send(command).is_ok(),
            None => false,
        }
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.remove(connection_id).map(|(tx, _)| tx)
    }
}
