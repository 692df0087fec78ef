use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use system::{AdmissionTicket, Identity, MembershipError, ReplicaEvent};
use tokio::sync::oneshot;

use crate::roster::{push, ReplicaTx};

struct PendingAdmission {
    candidate: Identity,
    decision_tx: oneshot::Sender<bool>,
}

/// Approval handshakes waiting on the admin.
pub struct AdmissionGate {
    pending: Mutex<HashMap<AdmissionTicket, PendingAdmission>>,
}

/// Removes the ticket however the waiting join ends, including being dropped.
struct PendingGuard<'a> {
    gate: &'a AdmissionGate,
    ticket: AdmissionTicket,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.gate.pending().remove(&self.ticket);
    }
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<AdmissionTicket, PendingAdmission>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Asks the admin about `candidate` and waits at most `wait` for the answer.
    pub async fn request(
        &self,
        candidate: &Identity,
        admin: &str,
        admin_tx: &ReplicaTx,
        wait: Duration,
    ) -> Result<(), MembershipError> {
        let ticket = system::uuid::Uuid::new_v4();
        let (decision_tx, decision_rx) = oneshot::channel();
        self.pending().insert(
            ticket,
            PendingAdmission {
                candidate: candidate.clone(),
                decision_tx,
            },
        );
        let _guard = PendingGuard { gate: self, ticket };

        let request = ReplicaEvent::ApprovalRequested {
            ticket,
            candidate: candidate.clone(),
        };
        if push(admin, admin_tx, request).is_err() {
            return Err(MembershipError::AdmissionUnreachable);
        }
        log::info!("Asked {} to admit {} ({})", admin, candidate.name, ticket);

        match tokio::time::timeout(wait, decision_rx).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) | Ok(Err(_)) => {
                log::info!("{} was not admitted", candidate.name);
                Err(MembershipError::AdmissionRejected)
            }
            Err(_) => {
                log::warn!("Admission of {} timed out", candidate.name);
                let _ = push(admin, admin_tx, ReplicaEvent::ApprovalWithdrawn(ticket));
                Err(MembershipError::AdmissionTimedOut)
            }
        }
    }

    /// Delivers the admin's answer to the join waiting on `ticket`.
    pub fn decide(&self, ticket: &AdmissionTicket, approve: bool) -> Result<Identity, MembershipError> {
        let pending = self
            .pending()
            .remove(ticket)
            .ok_or(MembershipError::UnknownAdmission)?;
        pending
            .decision_tx
            .send(approve)
            .map_err(|_| MembershipError::UnknownAdmission)?;
        Ok(pending.candidate)
    }

    /// Every waiting join fails as rejected.
    pub fn reject_all(&self) {
        self.pending().clear();
    }
}
