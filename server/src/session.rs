use std::sync::Arc;

use system::{
    AdminOperation, CanvasSnapshot, Identity, IdentifiableCommand, IdentifiableEvent,
    MembershipError, SessionCommand, SessionError, SessionReply,
};
use tokio::sync::mpsc::Receiver;

use crate::connection::ConnectionEvent;
use crate::connection_tx_storage::ConnectionTx;
use crate::coordinator::SessionCoordinator;
use crate::roster::ReplicaTx;
use crate::snapshot_file::SnapshotStore;

/// Runs one session command on behalf of `identity`.
pub async fn handle_session_command(
    coordinator: &SessionCoordinator,
    snapshots: &SnapshotStore,
    identity: &Identity,
    command: SessionCommand,
) -> Result<SessionReply, SessionError> {
    match command {
        SessionCommand::BecomeAdmin => coordinator.become_admin(identity).await?,
        SessionCommand::Join => coordinator.join(identity).await?,
        SessionCommand::Draw(command) => coordinator.draw(identity, command).await?,
        SessionCommand::DrawBatch(commands) => coordinator.draw_batch(identity, commands).await?,
        SessionCommand::Clear => coordinator.clear(identity).await?,
        SessionCommand::Leave => coordinator.leave(identity).await?,
        SessionCommand::Kick { target } => coordinator.kick(identity, &target).await?,
        SessionCommand::ListMembers => {
            return Ok(SessionReply::Members(coordinator.list_members(identity).await?))
        }
        SessionCommand::Snapshot => {
            return Ok(SessionReply::Snapshot(coordinator.export_snapshot(identity).await?))
        }
        SessionCommand::PostMessage { text } => coordinator.post_message(identity, &text).await?,
        SessionCommand::ImportSnapshot(commands) => {
            coordinator.import_snapshot(identity, commands).await?
        }
        SessionCommand::DecideAdmission { ticket, approve } => {
            coordinator
                .decide_admission(identity, &ticket, approve)
                .await?
        }
        SessionCommand::SaveSnapshot { name } => {
            let commands = coordinator.snapshot(identity).await?;
            snapshots.save(&name, &commands).await?
        }
        SessionCommand::OpenSnapshot { name } => {
            coordinator
                .authorize(identity, AdminOperation::OpenSnapshot)
                .await?;
            let commands = snapshots.open(&name).await?;
            coordinator
                .restore(identity, AdminOperation::OpenSnapshot, commands)
                .await?
        }
        SessionCommand::ListSnapshots => {
            coordinator.ensure_member(identity).await?;
            return Ok(SessionReply::SnapshotNames(snapshots.list().await?));
        }
        SessionCommand::ExportJson => {
            let commands = coordinator.export_snapshot(identity).await?;
            return Ok(SessionReply::SnapshotJson(CanvasSnapshot::to_json(&commands)?));
        }
        SessionCommand::ImportJson { json } => {
            coordinator
                .authorize(identity, AdminOperation::ImportSnapshot)
                .await?;
            let commands = CanvasSnapshot::from_json(&json)?;
            coordinator.import_snapshot(identity, commands).await?
        }
    }
    Ok(SessionReply::Accepted)
}

/// The member side of one transport connection. Commands run one at a time, in
/// arrival order.
pub struct MemberSession {
    coordinator: Arc<SessionCoordinator>,
    snapshots: SnapshotStore,
    replica_tx: ReplicaTx,
    bound: Option<Identity>,
}

impl MemberSession {
    pub fn new(
        coordinator: Arc<SessionCoordinator>,
        snapshots: SnapshotStore,
        replica_tx: ReplicaTx,
    ) -> Self {
        Self {
            coordinator,
            snapshots,
            replica_tx,
            bound: None,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.bound.as_ref()
    }

    pub async fn execute(
        &mut self,
        identity: &Identity,
        command: SessionCommand,
    ) -> Result<SessionReply, SessionError> {
        if !command.is_entry() {
            let leaving = matches!(command, SessionCommand::Leave);
            let result =
                handle_session_command(&self.coordinator, &self.snapshots, identity, command)
                    .await;
            if leaving && result.is_ok() && self.bound.as_ref() == Some(identity) {
                self.unbind().await;
            }
            return result;
        }

        let rebinding = self.bound.as_ref().map(|b| &b.name) != Some(&identity.name);
        if rebinding {
            if !self
                .coordinator
                .register_endpoint(&identity.name, self.replica_tx.clone())
                .await
            {
                return Err(MembershipError::DuplicateName(identity.name.clone()).into());
            }
        }
        let result =
            handle_session_command(&self.coordinator, &self.snapshots, identity, command).await;
        match (&result, rebinding) {
            (Ok(_), _) => {
                if let Some(previous) = self.bound.replace(identity.clone()) {
                    if previous.name != identity.name {
                        let _ = self.coordinator.leave(&previous).await;
                        self.coordinator
                            .unregister_endpoint(&previous.name, &self.replica_tx)
                            .await;
                    }
                }
            }
            (Err(_), true) => {
                self.coordinator
                    .unregister_endpoint(&identity.name, &self.replica_tx)
                    .await;
            }
            (Err(_), false) => {}
        }
        result
    }

    /// Leaves the session, if still in it, and gives the name back.
    pub async fn close(mut self) {
        if let Some(identity) = self.bound.clone() {
            if let Err(e) = self.coordinator.leave(&identity).await {
                log::debug!("{} was already gone: {}", identity.name, e);
            }
            self.unbind().await;
        }
    }

    async fn unbind(&mut self) {
        if let Some(identity) = self.bound.take() {
            self.coordinator
                .unregister_endpoint(&identity.name, &self.replica_tx)
                .await;
        }
    }

    /// Answers every command arriving on `command_rx` until the connection goes away.
    pub async fn run(mut self, mut command_rx: Receiver<IdentifiableCommand>, tx: ConnectionTx) {
        while let Some(IdentifiableCommand {
            command_id,
            identity,
            session_command,
        }) = command_rx.recv().await
        {
            let result = self.execute(&identity, session_command).await;
            if let Err(e) = &result {
                log::debug!("Command {} from {} failed: {}", command_id, identity.name, e);
            }
            let event = ConnectionEvent::IdentifiableEvent(IdentifiableEvent::ByMyself {
                command_id,
                result: result.into(),
            });
            if tx.send(event).await.is_err() {
                break;
            }
        }
        self.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use system::ReplicaEvent;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn member_session(coordinator: &Arc<SessionCoordinator>) -> (MemberSession, UnboundedReceiver<ReplicaEvent>) {
        let (tx, rx) = unbounded_channel();
        let session = MemberSession::new(coordinator.clone(), SnapshotStore::new("."), tx);
        (session, rx)
    }

    #[tokio::test]
    async fn closing_leaves_the_session() {
        let coordinator = Arc::new(SessionCoordinator::default());
        let (mut session, _rx) = member_session(&coordinator);
        let alice = Identity::new("alice", "pw");
        session
            .execute(&alice, SessionCommand::BecomeAdmin)
            .await
            .expect("");
        assert_eq!(session.identity(), Some(&alice));
        assert_eq!(coordinator.member_count().await, 1);

        session.close().await;
        assert_eq!(coordinator.member_count().await, 0);
    }

    #[tokio::test]
    async fn a_taken_name_is_refused_without_disturbing_its_owner() {
        let coordinator = Arc::new(SessionCoordinator::default());
        let (mut owner, mut owner_rx) = member_session(&coordinator);
        let (mut intruder, _intruder_rx) = member_session(&coordinator);
        let alice = Identity::new("alice", "pw");
        owner
            .execute(&alice, SessionCommand::BecomeAdmin)
            .await
            .expect("");

        assert_eq!(
            intruder
                .execute(&Identity::new("alice", "guess"), SessionCommand::Join)
                .await,
            Err(MembershipError::DuplicateName("alice".into()).into())
        );
        assert_eq!(intruder.identity(), None);

        owner
            .execute(&alice, SessionCommand::PostMessage { text: "hi".into() })
            .await
            .expect("");
        assert_eq!(owner_rx.recv().await, Some(ReplicaEvent::UserJoined("alice".into())));
        assert_eq!(
            owner_rx.recv().await,
            Some(ReplicaEvent::Chat {
                author: "alice".into(),
                text: "hi".into()
            })
        );
    }

    #[tokio::test]
    async fn opening_a_snapshot_needs_the_admin() {
        let coordinator = Arc::new(SessionCoordinator::default());
        let (mut session, _rx) = member_session(&coordinator);
        let alice = Identity::new("alice", "pw");
        assert_eq!(
            session
                .execute(&alice, SessionCommand::OpenSnapshot { name: "x".into() })
                .await,
            Err(SessionError::Authorization(AdminOperation::OpenSnapshot))
        );
    }

    #[tokio::test]
    async fn saved_canvases_are_listed_and_travel_as_json() {
        let dir = std::env::temp_dir().join(format!("whiteboard-list-{}", system::uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("");
        let snapshots = SnapshotStore::new(&dir);
        let coordinator = SessionCoordinator::default();
        let (tx, _rx) = unbounded_channel();
        let alice = Identity::new("alice", "pw");
        assert!(coordinator.register_endpoint("alice", tx).await);

        assert_eq!(
            handle_session_command(&coordinator, &snapshots, &alice, SessionCommand::ListSnapshots).await,
            Err(MembershipError::NotAMember.into())
        );
        coordinator.become_admin(&alice).await.expect("");
        let json = r#"[{"Text":{"meta":{"author":"alice","timestamp":1,"color":{"r":0,"g":0,"b":0}},"anchor":[2.0,3.0],"text":"hi"}}]"#;
        handle_session_command(
            &coordinator,
            &snapshots,
            &alice,
            SessionCommand::ImportJson { json: json.into() },
        )
        .await
        .expect("");
        assert_eq!(coordinator.snapshot(&alice).await.expect("").len(), 1);

        let exported = match handle_session_command(&coordinator, &snapshots, &alice, SessionCommand::ExportJson)
            .await
            .expect("")
        {
            SessionReply::SnapshotJson(exported) => exported,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            CanvasSnapshot::from_json(&exported).expect(""),
            coordinator.snapshot(&alice).await.expect("")
        );

        handle_session_command(
            &coordinator,
            &snapshots,
            &alice,
            SessionCommand::SaveSnapshot { name: "monday".into() },
        )
        .await
        .expect("");
        assert_eq!(
            handle_session_command(&coordinator, &snapshots, &alice, SessionCommand::ListSnapshots).await,
            Ok(SessionReply::SnapshotNames(vec!["monday".into()]))
        );
        assert!(matches!(
            handle_session_command(
                &coordinator,
                &snapshots,
                &alice,
                SessionCommand::ImportJson { json: "[{}]".into() },
            )
            .await,
            Err(SessionError::Serialization(_))
        ));
        std::fs::remove_dir_all(dir).expect("");
    }
}
