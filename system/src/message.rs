use crate::draw_command::DrawCommand;
use crate::error::SessionError;
use serde::{Deserialize, Serialize};

pub type ConnectionId = u16;
pub type CommandId = u16;
pub type AdmissionTicket = uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl std::default::Default for Color {
    fn default() -> Self {
        Self { r: 0, g: 0, b: 0 }
    }
}

/// Credentials a member presents with every call. Secrets are compared as plain values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub secret: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
        }
    }
}

/// Events pushed by the coordinator to a member's replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplicaEvent {
    Draw(DrawCommand),
    Clear,
    UserJoined(String),
    UserLeft(String),
    Chat {
        author: String,
        text: String,
    },
    /// The member has been dropped from the session and must return to idle.
    Reset,
    ApprovalRequested {
        ticket: AdmissionTicket,
        candidate: Identity,
    },
    ApprovalWithdrawn(AdmissionTicket),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionCommand {
    BecomeAdmin,
    Join,
    Draw(DrawCommand),
    DrawBatch(Vec<DrawCommand>),
    Clear,
    Leave,
    Kick { target: String },
    ListMembers,
    Snapshot,
    PostMessage { text: String },
    ImportSnapshot(Vec<DrawCommand>),
    DecideAdmission { ticket: AdmissionTicket, approve: bool },
    SaveSnapshot { name: String },
    OpenSnapshot { name: String },
    ListSnapshots,
    /// The canonical log as JSON, for tooling outside the session.
    ExportJson,
    ImportJson { json: String },
}

impl SessionCommand {
    /// Commands that bind the calling connection to the identity it presents.
    pub fn is_entry(&self) -> bool {
        matches!(self, Self::BecomeAdmin | Self::Join)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionReply {
    Accepted,
    Members(Vec<Identity>),
    Snapshot(Vec<DrawCommand>),
    SnapshotNames(Vec<String>),
    SnapshotJson(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandResult {
    Reply(SessionReply),
    Error(SessionError),
}

impl From<Result<SessionReply, SessionError>> for CommandResult {
    fn from(result: Result<SessionReply, SessionError>) -> Self {
        match result {
            Ok(reply) => Self::Reply(reply),
            Err(error) => Self::Error(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiableCommand {
    pub command_id: CommandId,
    pub identity: Identity,
    pub session_command: SessionCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IdentifiableEvent {
    ByMyself {
        command_id: CommandId,
        result: CommandResult,
    },
    BySystem {
        replica_event: ReplicaEvent,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_equality_compares_both_fields() {
        let alice = Identity::new("alice", "pw");
        assert_eq!(alice, Identity::new("alice", "pw"));
        assert_ne!(alice, Identity::new("alice", "other"));
        assert_ne!(alice, Identity::new("bob", "pw"));
    }

    #[test]
    fn command_frame_survives_bincode() {
        let command = IdentifiableCommand {
            command_id: 7,
            identity: Identity::new("alice", "pw"),
            session_command: SessionCommand::Kick {
                target: "bob".into(),
            },
        };
        let bytes = bincode::serialize(&command).expect("");
        let decoded = bincode::deserialize::<IdentifiableCommand>(&bytes).expect("");
        assert_eq!(decoded, command);
    }
}
