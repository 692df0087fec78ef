use std::collections::HashMap;

use system::{
    validate_commands, AdminOperation, DrawCommand, Identity, MembershipError, ReplicaEvent,
    SerializationError, SessionError,
};

use crate::roster::{push, ReplicaTx, Roster};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminSlot {
    Unclaimed,
    Held(Identity),
    /// The admin left. The role is never handed out again.
    Vacated,
}

/// Everything the coordinator guards with its lock. All pushes made from here are
/// non-blocking enqueues, so event order per member matches mutation order.
pub struct SessionState {
    pub admin: AdminSlot,
    pub roster: Roster,
    pub log: Vec<DrawCommand>,
    endpoints: HashMap<String, ReplicaTx>,
    closed: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            admin: AdminSlot::Unclaimed,
            roster: Roster::new(),
            log: Vec::new(),
            endpoints: HashMap::new(),
            closed: false,
        }
    }

    /// Refuses to take a name over from another endpoint that is still open.
    pub fn bind_endpoint(&mut self, name: &str, tx: ReplicaTx) -> bool {
        if let Some(bound) = self.endpoints.get(name) {
            if !bound.same_channel(&tx) && !bound.is_closed() {
                return false;
            }
        }
        self.endpoints.insert(name.to_owned(), tx);
        true
    }

    pub fn unbind_endpoint(&mut self, name: &str, tx: &ReplicaTx) {
        if self
            .endpoints
            .get(name)
            .map_or(false, |bound| bound.same_channel(tx))
        {
            self.endpoints.remove(name);
        }
    }

    fn resolve_endpoint(&self, name: &str) -> Result<ReplicaTx, MembershipError> {
        self.endpoints
            .get(name)
            .filter(|tx| !tx.is_closed())
            .cloned()
            .ok_or_else(|| MembershipError::EndpointUnresolved(name.to_owned()))
    }

    pub fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn require_member(&self, identity: &Identity) -> Result<(), SessionError> {
        self.ensure_open()?;
        if self.roster.is_member(identity) {
            Ok(())
        } else {
            Err(MembershipError::NotAMember.into())
        }
    }

    pub fn require_admin(
        &self,
        identity: &Identity,
        operation: AdminOperation,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        match &self.admin {
            AdminSlot::Held(admin) if admin == identity => Ok(()),
            _ => {
                log::warn!("{} attempted {:?} without being admin", identity.name, operation);
                Err(SessionError::Authorization(operation))
            }
        }
    }

    pub fn has_admin(&self) -> bool {
        matches!(self.admin, AdminSlot::Held(_))
    }

    pub fn is_admin(&self, identity: &Identity) -> bool {
        matches!(&self.admin, AdminSlot::Held(admin) if admin == identity)
    }

    pub fn become_admin(&mut self, identity: &Identity) -> Result<(), SessionError> {
        self.ensure_open()?;
        if self.admin != AdminSlot::Unclaimed {
            return Err(MembershipError::AdminAlreadyAssigned.into());
        }
        let tx = self.resolve_endpoint(&identity.name)?;
        self.admin = AdminSlot::Held(identity.clone());
        self.roster.insert(identity.clone(), tx);
        let _ = self
            .roster
            .push(&identity.name, ReplicaEvent::UserJoined(identity.name.clone()));
        log::info!("{} is now the admin", identity.name);
        Ok(())
    }

    /// First half of a join: returns the admin's name and handle to ask for approval.
    pub fn check_joinable(&self, identity: &Identity) -> Result<(String, ReplicaTx), SessionError> {
        self.ensure_open()?;
        if self.roster.contains_name(&identity.name) {
            return Err(MembershipError::DuplicateName(identity.name.clone()).into());
        }
        match &self.admin {
            AdminSlot::Held(admin) => self
                .roster
                .get(&admin.name)
                .map(|m| (m.identity.name.clone(), m.tx.clone()))
                .ok_or_else(|| MembershipError::NoAdmin.into()),
            _ => Err(MembershipError::NoAdmin.into()),
        }
    }

    /// Second half of a join, after approval: re-checks and commits.
    pub fn admit(&mut self, identity: &Identity) -> Result<(), SessionError> {
        self.ensure_open()?;
        if self.roster.contains_name(&identity.name) {
            return Err(MembershipError::DuplicateName(identity.name.clone()).into());
        }
        let tx = self.resolve_endpoint(&identity.name)?;
        for member in self.roster.ordered() {
            let _ = push(
                &member.identity.name,
                &member.tx,
                ReplicaEvent::UserJoined(identity.name.clone()),
            );
            let _ = push(
                &identity.name,
                &tx,
                ReplicaEvent::UserJoined(member.identity.name.clone()),
            );
        }
        let _ = push(
            &identity.name,
            &tx,
            ReplicaEvent::UserJoined(identity.name.clone()),
        );
        self.roster.insert(identity.clone(), tx);
        log::info!("{} joined, {} members", identity.name, self.roster.len());
        Ok(())
    }

    pub fn draw(&mut self, identity: &Identity, command: DrawCommand) -> Result<(), SessionError> {
        self.require_member(identity)?;
        command.validate().map_err(SerializationError::new)?;
        self.log.push(command.clone());
        self.roster.broadcast(&ReplicaEvent::Draw(command), None);
        Ok(())
    }

    /// Swaps the log for `commands` once all of them are known to be well formed.
    pub fn restore(
        &mut self,
        identity: &Identity,
        operation: AdminOperation,
        commands: Vec<DrawCommand>,
    ) -> Result<(), SessionError> {
        self.require_admin(identity, operation)?;
        validate_commands(&commands)?;
        self.log.clear();
        self.roster.broadcast(&ReplicaEvent::Clear, None);
        for command in commands {
            self.log.push(command.clone());
            self.roster.broadcast(&ReplicaEvent::Draw(command), None);
        }
        log::info!("{} restored {} commands", identity.name, self.log.len());
        Ok(())
    }

    pub fn clear(&mut self, identity: &Identity) -> Result<(), SessionError> {
        self.require_admin(identity, AdminOperation::Clear)?;
        self.log.clear();
        self.roster.broadcast(&ReplicaEvent::Clear, None);
        Ok(())
    }

    pub fn leave(&mut self, identity: &Identity) -> Result<(), SessionError> {
        self.require_member(identity)?;
        self.remove_member(&identity.name);
        Ok(())
    }

    pub fn kick(&mut self, identity: &Identity, target: &str) -> Result<(), SessionError> {
        self.require_admin(identity, AdminOperation::Kick)?;
        if !self.roster.contains_name(target) {
            return Err(MembershipError::UnknownMember(target.to_owned()).into());
        }
        let _ = self.roster.push(target, ReplicaEvent::Reset);
        self.remove_member(target);
        log::info!("{} kicked {}", identity.name, target);
        Ok(())
    }

    pub fn post_message(&self, identity: &Identity, text: &str) -> Result<(), SessionError> {
        self.require_member(identity)?;
        self.roster.broadcast(
            &ReplicaEvent::Chat {
                author: identity.name.clone(),
                text: text.to_owned(),
            },
            None,
        );
        Ok(())
    }

    /// Ends the session: every member is told to reset.
    pub fn close(&mut self) {
        self.closed = true;
        for member in self.roster.drain() {
            let _ = push(&member.identity.name, &member.tx, ReplicaEvent::Reset);
        }
        self.endpoints.clear();
        if let AdminSlot::Held(_) = self.admin {
            self.admin = AdminSlot::Vacated;
        }
    }

    fn remove_member(&mut self, name: &str) {
        if self.roster.remove(name).is_none() {
            return;
        }
        if matches!(&self.admin, AdminSlot::Held(admin) if admin.name == name) {
            log::warn!("admin {} left, the session has no admin from now on", name);
            self.admin = AdminSlot::Vacated;
        }
        self.roster
            .broadcast(&ReplicaEvent::UserLeft(name.to_owned()), None);
        log::info!("{} left, {} members", name, self.roster.len());
    }
}
