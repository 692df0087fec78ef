use std::collections::VecDeque;

use crate::draw_command::{DrawCommand, DrawMeta, Point, ShapeKind};
use crate::message::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaState {
    Idle,
    Joined { is_admin: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub author: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingApproval {
    pub ticket: AdmissionTicket,
    pub candidate: Identity,
}

/// What a pushed event changed, so a frontend knows what to redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaChange {
    Canvas,
    Members,
    Chat,
    Approvals,
    Reset,
    Nothing,
}

/// A member's local copy of the shared canvas and roster.
///
/// Pushed events only ever touch the replicated log; the local user's in-progress
/// edit lives beside it and is untouched until it is finished and submitted.
pub struct ClientReplica {
    identity: Identity,
    state: ReplicaState,
    log: Vec<DrawCommand>,
    members: Vec<String>,
    chat: VecDeque<ChatLine>,
    pending_edit: Option<DrawCommand>,
    pending_approvals: Vec<PendingApproval>,
}

impl ClientReplica {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            state: ReplicaState::Idle,
            log: Vec::new(),
            members: Vec::new(),
            chat: VecDeque::new(),
            pending_edit: None,
            pending_approvals: Vec::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> ReplicaState {
        self.state
    }

    pub fn log(&self) -> &[DrawCommand] {
        &self.log
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn pending_edit(&self) -> Option<&DrawCommand> {
        self.pending_edit.as_ref()
    }

    pub fn pending_approvals(&self) -> &[PendingApproval] {
        &self.pending_approvals
    }

    /// Called once the coordinator accepted us, with the canvas fetched right after.
    pub fn enter_session(&mut self, is_admin: bool, snapshot: Vec<DrawCommand>) {
        log::debug!("{} entered the session, admin: {}", self.identity.name, is_admin);
        self.state = ReplicaState::Joined { is_admin };
        self.log = snapshot;
    }

    pub fn handle_event(&mut self, event: ReplicaEvent) -> ReplicaChange {
        log::trace!("{} handles {:?}", self.identity.name, event);
        match event {
            ReplicaEvent::Draw(command) => {
                self.log.push(command);
                ReplicaChange::Canvas
            }
            ReplicaEvent::Clear => {
                self.log.clear();
                ReplicaChange::Canvas
            }
            ReplicaEvent::UserJoined(name) => {
                if !self.members.contains(&name) {
                    self.members.push(name);
                }
                ReplicaChange::Members
            }
            ReplicaEvent::UserLeft(name) => {
                self.members.retain(|member| member != &name);
                ReplicaChange::Members
            }
            ReplicaEvent::Chat { author, text } => {
                self.chat.push_back(ChatLine { author, text });
                ReplicaChange::Chat
            }
            ReplicaEvent::Reset => {
                log::info!("{} was reset by the session", self.identity.name);
                self.leave();
                ReplicaChange::Reset
            }
            ReplicaEvent::ApprovalRequested { ticket, candidate } => {
                if self.is_admin() {
                    self.pending_approvals
                        .push(PendingApproval { ticket, candidate });
                    ReplicaChange::Approvals
                } else {
                    log::warn!("approval request delivered to a non-admin replica");
                    ReplicaChange::Nothing
                }
            }
            ReplicaEvent::ApprovalWithdrawn(ticket) => {
                self.pending_approvals.retain(|p| p.ticket != ticket);
                ReplicaChange::Approvals
            }
        }
    }

    /// Turns the local admin's decision into the command answering the coordinator.
    pub fn decide(&mut self, ticket: &AdmissionTicket, approve: bool) -> Option<SessionCommand> {
        let position = self
            .pending_approvals
            .iter()
            .position(|p| &p.ticket == ticket)?;
        let pending = self.pending_approvals.remove(position);
        log::info!(
            "{} {} {}",
            self.identity.name,
            if approve { "approves" } else { "rejects" },
            pending.candidate.name
        );
        Some(SessionCommand::DecideAdmission {
            ticket: pending.ticket,
            approve,
        })
    }

    pub fn consume_chat(&mut self) -> Vec<ChatLine> {
        self.chat.drain(..).collect()
    }

    /// Drops every piece of session state and returns to idle.
    pub fn leave(&mut self) {
        self.state = ReplicaState::Idle;
        self.log.clear();
        self.members.clear();
        self.chat.clear();
        self.pending_edit = None;
        self.pending_approvals.clear();
    }

    pub fn begin_stroke(&mut self, timestamp: Timestamp, color: Color, at: Point) {
        self.pending_edit = Some(DrawCommand::Stroke {
            meta: self.meta(timestamp, color),
            points: vec![at],
        });
    }

    pub fn extend_stroke(&mut self, to: Point) {
        if let Some(DrawCommand::Stroke { points, .. }) = &mut self.pending_edit {
            points.push(to);
        }
    }

    /// Completes the edit in progress; the result is ready to submit as a draw.
    pub fn finish_stroke(&mut self) -> Option<DrawCommand> {
        self.pending_edit.take()
    }

    pub fn cancel_edit(&mut self) {
        self.pending_edit = None;
    }

    pub fn shape(
        &self,
        timestamp: Timestamp,
        color: Color,
        kind: ShapeKind,
        start: Point,
        end: Point,
    ) -> DrawCommand {
        DrawCommand::shape(self.meta(timestamp, color), kind, start, end)
    }

    pub fn text(
        &self,
        timestamp: Timestamp,
        color: Color,
        anchor: Point,
        text: impl Into<String>,
    ) -> DrawCommand {
        DrawCommand::Text {
            meta: self.meta(timestamp, color),
            anchor,
            text: text.into(),
        }
    }

    fn is_admin(&self) -> bool {
        matches!(self.state, ReplicaState::Joined { is_admin: true })
    }

    fn meta(&self, timestamp: Timestamp, color: Color) -> DrawMeta {
        DrawMeta::new(self.identity.name.clone(), timestamp, color)
    }
}
