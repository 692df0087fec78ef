//! Serves the line protocol over plain TCP. Every connection gets its own member
//! session; the only push with a line form is an approval request to the admin.

use std::net::SocketAddr;
use std::sync::Arc;

use system::legacy::{
    approval_request_line, failure_reply, success_reply, LegacyMessageType, LegacyRequest,
};
use system::{MembershipError, ReplicaEvent, SessionCommand, SessionError, SessionReply};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{channel, unbounded_channel};

use crate::coordinator::SessionCoordinator;
use crate::session::MemberSession;
use crate::snapshot_file::SnapshotStore;

/// Replies queued for the socket before the reading side waits.
const LINE_BUFFER: usize = 16;

#[derive(Clone)]
pub struct LegacyServer {
    coordinator: Arc<SessionCoordinator>,
    snapshots: SnapshotStore,
}

impl LegacyServer {
    pub fn new(coordinator: Arc<SessionCoordinator>, snapshots: SnapshotStore) -> Self {
        Self {
            coordinator,
            snapshots,
        }
    }

    pub async fn run(self, listener: TcpListener) -> std::io::Result<()> {
        log::info!("Line protocol listening on {}", listener.local_addr()?);
        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New line protocol connection from {}", addr);
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, addr).await {
                    log::warn!("Line protocol connection {} failed: {}", addr, e);
                }
            });
        }
    }

    async fn handle_connection(self, stream: TcpStream, addr: SocketAddr) -> std::io::Result<()> {
        let (reader, mut writer) = stream.into_split();
        let (line_tx, mut line_rx) = channel::<String>(LINE_BUFFER);
        let (replica_tx, mut replica_rx) = unbounded_channel::<ReplicaEvent>();

        let egress = tokio::spawn(async move {
            loop {
                let line = tokio::select! {
                    Some(line) = line_rx.recv() => line,
                    Some(event) = replica_rx.recv() => match event {
                        ReplicaEvent::ApprovalRequested { ticket, candidate } => {
                            approval_request_line(&candidate, &ticket)
                        }
                        other => {
                            log::trace!("No line form for {:?}", other);
                            continue;
                        }
                    },
                    else => break,
                };
                log::debug!("Egress {}", line);
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut session = MemberSession::new(self.coordinator, self.snapshots, replica_tx);
        let mut lines = BufReader::new(reader).lines();
        let result = async {
            while let Some(line) = lines.next_line().await? {
                log::debug!("Ingress from {}: {}", addr, line);
                let reply = answer(&mut session, &line).await;
                if line_tx.send(reply).await.is_err() {
                    break;
                }
            }
            Ok::<_, std::io::Error>(())
        }
        .await;

        session.close().await;
        drop(line_tx);
        match egress.await {
            Ok(egress_result) => result.and(egress_result),
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
        }
    }
}

/// Runs one request line and renders its reply line.
pub async fn answer(session: &mut MemberSession, line: &str) -> String {
    let request = match LegacyRequest::parse(line) {
        Ok(request) => request,
        Err(e) => return failure_reply(&format!(":{}", e)),
    };
    let identity = request.identity.clone();
    let command = match request.kind {
        LegacyMessageType::JoinRequest => {
            let result = match session.execute(&identity, SessionCommand::BecomeAdmin).await {
                Err(SessionError::Membership(MembershipError::AdminAlreadyAssigned)) => {
                    session.execute(&identity, SessionCommand::Join).await
                }
                other => other,
            };
            return render(&request, result);
        }
        LegacyMessageType::ApproveJoinReply => match request.decision() {
            Ok((ticket, approve)) => SessionCommand::DecideAdmission { ticket, approve },
            Err(e) => return failure_reply(&format!(":{}", e)),
        },
        LegacyMessageType::KickRequest => SessionCommand::Kick {
            target: request.argument.clone(),
        },
        LegacyMessageType::ResetRequest => SessionCommand::Clear,
        LegacyMessageType::SaveRequest => SessionCommand::SaveSnapshot {
            name: request.argument.clone(),
        },
        LegacyMessageType::OpenRequest => SessionCommand::OpenSnapshot {
            name: request.argument.clone(),
        },
        LegacyMessageType::QuitRequest => SessionCommand::Leave,
        kind => return failure_reply(&format!(":{} is sent by the server only", kind)),
    };
    let result = session.execute(&identity, command).await;
    render(&request, result)
}

fn render(request: &LegacyRequest, result: Result<SessionReply, SessionError>) -> String {
    match result {
        Ok(_) => success_reply(&format!(":{}", request.identity.name)),
        Err(e) => {
            log::debug!("{} from {} failed: {}", request.kind, request.identity.name, e);
            failure_reply(&format!(":{}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn member_session(
        coordinator: &Arc<SessionCoordinator>,
    ) -> (MemberSession, UnboundedReceiver<ReplicaEvent>) {
        let (tx, rx) = unbounded_channel();
        (
            MemberSession::new(coordinator.clone(), SnapshotStore::new("."), tx),
            rx,
        )
    }

    #[tokio::test]
    async fn first_join_claims_the_admin_slot() {
        let coordinator = Arc::new(SessionCoordinator::default());
        let (mut session, _rx) = member_session(&coordinator);
        assert_eq!(
            answer(&mut session, "JOIN_REQUEST:alice:pw:").await,
            "SUCCESS_REPLY:alice"
        );
        assert!(coordinator.is_admin(&system::Identity::new("alice", "pw")).await);
        assert_eq!(
            answer(&mut session, "QUIT_REQUEST:alice:pw:").await,
            "SUCCESS_REPLY:alice"
        );
        assert_eq!(coordinator.member_count().await, 0);
    }

    #[tokio::test]
    async fn it_fails_bad_lines_without_touching_the_session() {
        let coordinator = Arc::new(SessionCoordinator::default());
        let (mut session, _rx) = member_session(&coordinator);
        assert!(answer(&mut session, "HELLO").await.starts_with("FAILURE_REPLY:"));
        assert!(answer(&mut session, "APPROVE_JOIN_REQUEST:bob::x")
            .await
            .starts_with("FAILURE_REPLY:"));
        assert!(answer(&mut session, "APPROVE_JOIN_REPLY:alice:pw:maybe")
            .await
            .starts_with("FAILURE_REPLY:"));
        assert!(answer(&mut session, "RESET_REQUEST:alice:pw:")
            .await
            .starts_with("FAILURE_REPLY:"));
        assert_eq!(coordinator.member_count().await, 0);
    }
}
