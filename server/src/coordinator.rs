use std::time::Duration;

use system::{AdminOperation, AdmissionTicket, DrawCommand, Identity, SessionError};
use tokio::sync::RwLock;

use crate::admission::AdmissionGate;
use crate::roster::ReplicaTx;
use crate::server_state::SessionState;

pub const DEFAULT_ADMISSION_TIMEOUT: Duration = Duration::from_secs(60);

/// One shared whiteboard session: roster, admin slot and canonical log.
pub struct SessionCoordinator {
    state: RwLock<SessionState>,
    admissions: AdmissionGate,
    admission_timeout: Duration,
}

impl SessionCoordinator {
    pub fn new(admission_timeout: Duration) -> Self {
        Self {
            state: RwLock::new(SessionState::new()),
            admissions: AdmissionGate::new(),
            admission_timeout,
        }
    }

    /// Makes `tx` the endpoint that `name` resolves to from now on. False if another
    /// open endpoint already holds the name.
    pub async fn register_endpoint(&self, name: &str, tx: ReplicaTx) -> bool {
        self.state.write().await.bind_endpoint(name, tx)
    }

    pub async fn unregister_endpoint(&self, name: &str, tx: &ReplicaTx) {
        self.state.write().await.unbind_endpoint(name, tx);
    }

    pub async fn become_admin(&self, identity: &Identity) -> Result<(), SessionError> {
        self.state.write().await.become_admin(identity)
    }

    /// Waits for the admin's approval with no lock held, then commits.
    pub async fn join(&self, identity: &Identity) -> Result<(), SessionError> {
        let (admin, admin_tx) = self.state.read().await.check_joinable(identity)?;
        self.admissions
            .request(identity, &admin, &admin_tx, self.admission_timeout)
            .await?;
        self.state.write().await.admit(identity)
    }

    pub async fn draw(&self, identity: &Identity, command: DrawCommand) -> Result<(), SessionError> {
        self.state.write().await.draw(identity, command)
    }

    /// Not atomic: commands drawn before a failure stay in the log.
    pub async fn draw_batch(
        &self,
        identity: &Identity,
        commands: Vec<DrawCommand>,
    ) -> Result<(), SessionError> {
        for command in commands {
            self.draw(identity, command).await?;
        }
        Ok(())
    }

    pub async fn clear(&self, identity: &Identity) -> Result<(), SessionError> {
        self.state.write().await.clear(identity)
    }

    pub async fn leave(&self, identity: &Identity) -> Result<(), SessionError> {
        let mut state = self.state.write().await;
        let had_admin = state.has_admin();
        state.leave(identity)?;
        self.reject_orphaned_joins(had_admin, &state);
        Ok(())
    }

    pub async fn kick(&self, identity: &Identity, target: &str) -> Result<(), SessionError> {
        let mut state = self.state.write().await;
        let had_admin = state.has_admin();
        state.kick(identity, target)?;
        self.reject_orphaned_joins(had_admin, &state);
        Ok(())
    }

    /// Nobody is left to decide waiting joins once the admin slot is vacated.
    fn reject_orphaned_joins(&self, had_admin: bool, state: &SessionState) {
        if had_admin && !state.has_admin() {
            self.admissions.reject_all();
        }
    }

    pub async fn list_members(&self, identity: &Identity) -> Result<Vec<Identity>, SessionError> {
        let state = self.state.read().await;
        state.require_member(identity)?;
        Ok(state.roster.identities())
    }

    pub async fn ensure_member(&self, identity: &Identity) -> Result<(), SessionError> {
        self.state.read().await.require_member(identity)
    }

    pub async fn snapshot(&self, identity: &Identity) -> Result<Vec<DrawCommand>, SessionError> {
        let state = self.state.read().await;
        state.require_member(identity)?;
        Ok(state.log.clone())
    }

    pub async fn export_snapshot(
        &self,
        identity: &Identity,
    ) -> Result<Vec<DrawCommand>, SessionError> {
        self.snapshot(identity).await
    }

    pub async fn import_snapshot(
        &self,
        identity: &Identity,
        commands: Vec<DrawCommand>,
    ) -> Result<(), SessionError> {
        self.restore(identity, AdminOperation::ImportSnapshot, commands)
            .await
    }

    /// Replaces the log on behalf of an admin-only `operation`.
    pub async fn restore(
        &self,
        identity: &Identity,
        operation: AdminOperation,
        commands: Vec<DrawCommand>,
    ) -> Result<(), SessionError> {
        self.state
            .write()
            .await
            .restore(identity, operation, commands)
    }

    pub async fn authorize(
        &self,
        identity: &Identity,
        operation: AdminOperation,
    ) -> Result<(), SessionError> {
        self.state.read().await.require_admin(identity, operation)
    }

    pub async fn post_message(&self, identity: &Identity, text: &str) -> Result<(), SessionError> {
        self.state.read().await.post_message(identity, text)
    }

    pub async fn decide_admission(
        &self,
        identity: &Identity,
        ticket: &AdmissionTicket,
        approve: bool,
    ) -> Result<(), SessionError> {
        self.authorize(identity, AdminOperation::DecideAdmission)
            .await?;
        let candidate = self.admissions.decide(ticket, approve)?;
        log::info!(
            "{} {} {}",
            identity.name,
            if approve { "approved" } else { "rejected" },
            candidate.name
        );
        Ok(())
    }

    /// Ends the session. Every later call fails with `SessionError::Closed`.
    pub async fn shutdown(&self) {
        self.state.write().await.close();
        self.admissions.reject_all();
        log::info!("Session closed");
    }

    pub async fn is_admin(&self, identity: &Identity) -> bool {
        self.state.read().await.is_admin(identity)
    }

    pub async fn member_count(&self) -> usize {
        self.state.read().await.roster.len()
    }
}

impl Default for SessionCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_ADMISSION_TIMEOUT)
    }
}
