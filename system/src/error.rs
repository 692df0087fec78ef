use crate::draw_command::MalformedCommand;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipError {
    NotAMember,
    DuplicateName(String),
    AdminAlreadyAssigned,
    NoAdmin,
    AdmissionRejected,
    AdmissionTimedOut,
    AdmissionUnreachable,
    EndpointUnresolved(String),
    UnknownMember(String),
    UnknownAdmission,
}

impl fmt::Display for MembershipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAMember => write!(f, "caller is not an active member"),
            Self::DuplicateName(name) => write!(f, "name '{name}' is already taken"),
            Self::AdminAlreadyAssigned => write!(f, "session already has an admin"),
            Self::NoAdmin => write!(f, "session has no admin to approve the join"),
            Self::AdmissionRejected => write!(f, "admin rejected the join"),
            Self::AdmissionTimedOut => write!(f, "admin did not answer in time"),
            Self::AdmissionUnreachable => write!(f, "admin could not be asked"),
            Self::EndpointUnresolved(name) => write!(f, "no reachable endpoint for '{name}'"),
            Self::UnknownMember(name) => write!(f, "no member named '{name}'"),
            Self::UnknownAdmission => write!(f, "no such pending admission"),
        }
    }
}

/// Operations reserved to the admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminOperation {
    Clear,
    Kick,
    ImportSnapshot,
    DecideAdmission,
    OpenSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializationError {
    /// Position of the offending command, when the payload decoded at all.
    pub index: Option<usize>,
    pub reason: String,
}

impl SerializationError {
    pub fn new(reason: impl fmt::Display) -> Self {
        Self {
            index: None,
            reason: reason.to_string(),
        }
    }

    pub fn malformed(index: usize, malformed: MalformedCommand) -> Self {
        Self {
            index: Some(index),
            reason: malformed.to_string(),
        }
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "command #{index} is malformed: {}", self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

impl std::error::Error for SerializationError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionError {
    Membership(MembershipError),
    Authorization(AdminOperation),
    Serialization(SerializationError),
    Storage(String),
    Closed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Membership(e) => write!(f, "membership error: {e}"),
            Self::Authorization(op) => write!(f, "only the admin may perform {op:?}"),
            Self::Serialization(e) => write!(f, "serialization error: {e}"),
            Self::Storage(reason) => write!(f, "storage error: {reason}"),
            Self::Closed => write!(f, "session is closed"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<MembershipError> for SessionError {
    fn from(e: MembershipError) -> Self {
        Self::Membership(e)
    }
}

impl From<SerializationError> for SessionError {
    fn from(e: SerializationError) -> Self {
        Self::Serialization(e)
    }
}
