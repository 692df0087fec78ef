use std::future::Future;

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::sync::mpsc::{Receiver, UnboundedReceiver};

use system::{bincode, ConnectionId, IdentifiableCommand, IdentifiableEvent, ReplicaEvent};

use crate::connection_tx_storage::ConnectionTx;
use crate::roster::ReplicaTx;
use crate::server::ServerTx;
use actix_web_actors::ws::{CloseCode, CloseReason};

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect {
        tx: ConnectionTx,
        /// Where the coordinator pushes this connection's replica events.
        replica_tx: ReplicaTx,
    },
    Disconnect {
        from: ConnectionId,
    },
    IdentifiableCommand {
        from: ConnectionId,
        command: IdentifiableCommand,
    },
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    IdentifiableEvent(IdentifiableEvent),
    Disconnected { connection_id: ConnectionId },
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    Idle,
    Connected(ConnectionId),
}

struct ConnectionActor {
    state: ConnectionState,
    srv_tx: ServerTx,
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, rx) = tokio::sync::mpsc::channel::<ConnectionEvent>(32);
        let (replica_tx, replica_rx) = tokio::sync::mpsc::unbounded_channel::<ReplicaEvent>();

        if self
            .srv_tx
            .try_send(ConnectionCommand::Connect { tx, replica_tx })
            .is_err()
        {
            log::warn!("Server is not accepting connections");
            ctx.stop();
            return;
        }

        let addr = ctx.address().recipient();

        tokio::spawn(forward(rx, replica_rx, move |event| {
            let addr = addr.clone();
            async move { addr.send(ConnectionActorMessage(event)).await.is_ok() }
        }));
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Connected(id) = self.state {
            self.state = ConnectionState::Idle;
            if self
                .srv_tx
                .try_send(ConnectionCommand::Disconnect { from: id })
                .is_err()
            {
                log::warn!("Could not report disconnection of {}", id);
            }
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Binary(bin)) => {
                log::debug!("Ingress size: {}", bin.len());
                if let ConnectionState::Connected(from) = self.state {
                    match bincode::deserialize::<IdentifiableCommand>(&bin) {
                        Ok(command) => {
                            log::debug!("Ingress {:?}", command);
                            if self
                                .srv_tx
                                .try_send(ConnectionCommand::IdentifiableCommand { from, command })
                                .is_err()
                            {
                                log::warn!("Server is busy, dropping connection {}", from);
                                ctx.stop();
                            }
                        }
                        Err(e) => {
                            log::warn!("Undecodable frame from {}: {}", from, e);
                            ctx.close(Some(CloseReason {
                                code: CloseCode::Invalid,
                                description: None,
                            }));
                            ctx.stop();
                        }
                    }
                }
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                log::warn!("WebSocket protocol error: {}", e);
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        let connection_event = msg.0;
        log::debug!("Egress {:?}", connection_event);
        match connection_event {
            ConnectionEvent::Connected { connection_id } => {
                self.state = ConnectionState::Connected(connection_id);
            }
            ConnectionEvent::Disconnected { .. } => {
                ctx.close(Some(CloseReason {
                    code: CloseCode::Policy,
                    description: None,
                }));
                ctx.stop();
            }
            ConnectionEvent::IdentifiableEvent(event) => match bincode::serialize(&event) {
                Ok(serialized) => ctx.binary(serialized),
                Err(e) => log::error!("Could not encode {:?}: {}", event, e),
            },
        }
    }
}

/// Feeds the actor's mailbox from both queues, one event at a time. Stops once both
/// queues are closed or `deliver` reports that the actor is gone.
async fn forward<F, Fut>(
    mut rx: Receiver<ConnectionEvent>,
    mut replica_rx: UnboundedReceiver<ReplicaEvent>,
    mut deliver: F,
) where
    F: FnMut(ConnectionEvent) -> Fut,
    Fut: Future<Output = bool>,
{
    log::debug!("connection forwarder - started");
    loop {
        let event = tokio::select! {
            Some(event) = rx.recv() => event,
            Some(replica_event) = replica_rx.recv() => {
                ConnectionEvent::IdentifiableEvent(IdentifiableEvent::BySystem { replica_event })
            }
            else => break,
        };
        if !deliver(event).await {
            log::debug!("connection actor is gone");
            break;
        }
    }
    log::debug!("connection forwarder - terminated");
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse, Error> {
    ws::start(
        ConnectionActor {
            srv_tx: srv_tx.get_ref().clone(),
            state: ConnectionState::Idle,
        },
        &req,
        stream,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::{channel, unbounded_channel};
    use tokio::time::timeout;

    #[tokio::test]
    async fn a_burst_waits_for_a_slow_actor_instead_of_stopping() {
        let (tx, rx) = channel::<ConnectionEvent>(32);
        let (replica_tx, replica_rx) = unbounded_channel();
        for n in 0..200 {
            replica_tx
                .send(ReplicaEvent::UserJoined(format!("guest-{}", n)))
                .expect("");
        }
        tx.send(ConnectionEvent::Connected { connection_id: 7 })
            .await
            .expect("");
        drop(tx);
        drop(replica_tx);

        let (mailbox_tx, mut mailbox_rx) = channel::<ConnectionEvent>(1);
        let forwarder = tokio::spawn(forward(rx, replica_rx, move |event| {
            let mailbox_tx = mailbox_tx.clone();
            async move { mailbox_tx.send(event).await.is_ok() }
        }));

        let mut joined = Vec::new();
        let mut connected = false;
        while let Some(event) = timeout(Duration::from_secs(1), mailbox_rx.recv())
            .await
            .expect("")
        {
            match event {
                ConnectionEvent::Connected { connection_id: 7 } => connected = true,
                ConnectionEvent::IdentifiableEvent(IdentifiableEvent::BySystem {
                    replica_event: ReplicaEvent::UserJoined(name),
                }) => joined.push(name),
                other => panic!("unexpected {:?}", other),
            }
            tokio::task::yield_now().await;
        }
        forwarder.await.expect("");

        assert!(connected);
        assert_eq!(
            joined,
            (0..200).map(|n| format!("guest-{}", n)).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn it_stops_once_the_actor_is_gone() {
        let (_tx, rx) = channel::<ConnectionEvent>(4);
        let (replica_tx, replica_rx) = unbounded_channel();
        replica_tx.send(ReplicaEvent::Clear).expect("");
        replica_tx.send(ReplicaEvent::Clear).expect("");

        let mut deliveries = 0;
        timeout(
            Duration::from_secs(1),
            forward(rx, replica_rx, |_| {
                deliveries += 1;
                async { false }
            }),
        )
        .await
        .expect("");
        assert_eq!(deliveries, 1);
        drop(replica_tx);
    }
}
