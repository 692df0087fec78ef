//! Line-oriented text protocol kept for simple clients.
//!
//! Requests are `TYPE:username:secret:argument`, replies are `TYPE` immediately
//! followed by the argument. Credentials travel in the clear.

use crate::message::{AdmissionTicket, Identity};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyMessageType {
    JoinRequest,
    ApproveJoinRequest,
    ApproveJoinReply,
    KickRequest,
    ResetRequest,
    SaveRequest,
    OpenRequest,
    QuitRequest,
    SuccessReply,
    FailureReply,
}

impl LegacyMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JoinRequest => "JOIN_REQUEST",
            Self::ApproveJoinRequest => "APPROVE_JOIN_REQUEST",
            Self::ApproveJoinReply => "APPROVE_JOIN_REPLY",
            Self::KickRequest => "KICK_REQUEST",
            Self::ResetRequest => "RESET_REQUEST",
            Self::SaveRequest => "SAVE_REQUEST",
            Self::OpenRequest => "OPEN_REQUEST",
            Self::QuitRequest => "QUIT_REQUEST",
            Self::SuccessReply => "SUCCESS_REPLY",
            Self::FailureReply => "FAILURE_REPLY",
        }
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, Self::SuccessReply | Self::FailureReply)
    }
}

impl fmt::Display for LegacyMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LegacyMessageType {
    type Err = LegacyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "JOIN_REQUEST" => Self::JoinRequest,
            "APPROVE_JOIN_REQUEST" => Self::ApproveJoinRequest,
            "APPROVE_JOIN_REPLY" => Self::ApproveJoinReply,
            "KICK_REQUEST" => Self::KickRequest,
            "RESET_REQUEST" => Self::ResetRequest,
            "SAVE_REQUEST" => Self::SaveRequest,
            "OPEN_REQUEST" => Self::OpenRequest,
            "QUIT_REQUEST" => Self::QuitRequest,
            "SUCCESS_REPLY" => Self::SuccessReply,
            "FAILURE_REPLY" => Self::FailureReply,
            other => return Err(LegacyParseError::UnknownType(other.to_owned())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyParseError {
    MissingFields,
    UnknownType(String),
    NotARequest(LegacyMessageType),
    InvalidDecision(String),
}

impl fmt::Display for LegacyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFields => write!(f, "expected TYPE:username:secret:argument"),
            Self::UnknownType(t) => write!(f, "unknown message type '{t}'"),
            Self::NotARequest(t) => write!(f, "{t} is not a request"),
            Self::InvalidDecision(arg) => write!(f, "expected <ticket>=yes|no, got '{arg}'"),
        }
    }
}

impl std::error::Error for LegacyParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRequest {
    pub kind: LegacyMessageType,
    pub identity: Identity,
    pub argument: String,
}

impl LegacyRequest {
    pub fn new(kind: LegacyMessageType, identity: Identity, argument: impl Into<String>) -> Self {
        Self {
            kind,
            identity,
            argument: argument.into(),
        }
    }

    pub fn parse(line: &str) -> Result<Self, LegacyParseError> {
        let mut fields = line.trim_end_matches(&['\r', '\n'][..]).splitn(4, ':');
        let kind = fields
            .next()
            .ok_or(LegacyParseError::MissingFields)?
            .parse::<LegacyMessageType>()?;
        if kind.is_reply() {
            return Err(LegacyParseError::NotARequest(kind));
        }
        match (fields.next(), fields.next(), fields.next()) {
            (Some(name), Some(secret), Some(argument)) => Ok(Self {
                kind,
                identity: Identity::new(name, secret),
                argument: argument.to_owned(),
            }),
            _ => Err(LegacyParseError::MissingFields),
        }
    }

    #[cfg(test)]
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.kind, self.identity.name, self.identity.secret, self.argument
        )
    }

    /// Reads an `APPROVE_JOIN_REPLY` argument of the form `<ticket>=yes|no`.
    pub fn decision(&self) -> Result<(AdmissionTicket, bool), LegacyParseError> {
        let invalid = || LegacyParseError::InvalidDecision(self.argument.clone());
        let (ticket, answer) = self.argument.split_once('=').ok_or_else(invalid)?;
        let ticket = ticket.parse::<AdmissionTicket>().map_err(|_| invalid())?;
        match answer {
            "yes" => Ok((ticket, true)),
            "no" => Ok((ticket, false)),
            _ => Err(invalid()),
        }
    }
}

/// Asks a legacy admin to approve `candidate`. The secret field is left blank.
pub fn approval_request_line(candidate: &Identity, ticket: &AdmissionTicket) -> String {
    format!(
        "{}:{}::{}",
        LegacyMessageType::ApproveJoinRequest,
        candidate.name,
        ticket
    )
}

pub fn success_reply(argument: &str) -> String {
    format!("{}{}", LegacyMessageType::SuccessReply, argument)
}

pub fn failure_reply(argument: &str) -> String {
    format!("{}{}", LegacyMessageType::FailureReply, argument)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_parses_requests_keeping_colons_in_the_argument() {
        let request = LegacyRequest::parse("SAVE_REQUEST:alice:pw:backup:monday\n").expect("");
        assert_eq!(request.kind, LegacyMessageType::SaveRequest);
        assert_eq!(request.identity, Identity::new("alice", "pw"));
        assert_eq!(request.argument, "backup:monday");
        assert_eq!(request.encode(), "SAVE_REQUEST:alice:pw:backup:monday");
    }

    #[test]
    fn it_rejects_bad_lines() {
        assert_eq!(
            LegacyRequest::parse("JOIN_REQUEST:alice"),
            Err(LegacyParseError::MissingFields)
        );
        assert_eq!(
            LegacyRequest::parse("HELLO:alice:pw:"),
            Err(LegacyParseError::UnknownType("HELLO".into()))
        );
        assert_eq!(
            LegacyRequest::parse("SUCCESS_REPLY:a:b:c"),
            Err(LegacyParseError::NotARequest(LegacyMessageType::SuccessReply))
        );
    }

    #[test]
    fn it_reads_admission_decisions() {
        let ticket = uuid::Uuid::new_v4();
        let request = LegacyRequest::new(
            LegacyMessageType::ApproveJoinReply,
            Identity::new("alice", "pw"),
            format!("{ticket}=yes"),
        );
        assert_eq!(request.decision(), Ok((ticket, true)));

        let request = LegacyRequest::new(
            LegacyMessageType::ApproveJoinReply,
            Identity::new("alice", "pw"),
            format!("{ticket}=maybe"),
        );
        assert!(request.decision().is_err());
    }

    #[test]
    fn it_formats_replies_without_separator() {
        assert_eq!(success_reply(":bob"), "SUCCESS_REPLY:bob");
        assert_eq!(failure_reply(""), "FAILURE_REPLY");
        let ticket = uuid::Uuid::nil();
        assert_eq!(
            approval_request_line(&Identity::new("bob", "secret"), &ticket),
            format!("APPROVE_JOIN_REQUEST:bob::{ticket}")
        );
    }
}
