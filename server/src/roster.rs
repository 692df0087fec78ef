use std::collections::HashMap;
use std::fmt;

use system::{Identity, ReplicaEvent};

/// Delivery handle of one member's replica. Unbounded, so a member that reads slowly
/// still receives every event in order; only a closed endpoint loses pushes.
pub type ReplicaTx = tokio::sync::mpsc::UnboundedSender<ReplicaEvent>;

/// A push that could not be delivered because the recipient's endpoint is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub recipient: String,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is unreachable", self.recipient)
    }
}

impl std::error::Error for TransportError {}

/// Enqueues without waiting; the member's own task does the slow delivery.
pub fn push(recipient: &str, tx: &ReplicaTx, event: ReplicaEvent) -> Result<(), TransportError> {
    tx.send(event).map_err(|_| {
        let error = TransportError {
            recipient: recipient.to_owned(),
        };
        log::warn!("Dropped push: {}", error);
        error
    })
}

pub struct Member {
    pub identity: Identity,
    pub tx: ReplicaTx,
    join_order: u64,
}

/// Active members keyed by name, iterated in join order.
pub struct Roster {
    members: HashMap<String, Member>,
    join_order_source: u64,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            members: HashMap::new(),
            join_order_source: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// True only when both the name and the secret match an active member.
    pub fn is_member(&self, identity: &Identity) -> bool {
        self.members
            .get(&identity.name)
            .map_or(false, |m| &m.identity == identity)
    }

    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn insert(&mut self, identity: Identity, tx: ReplicaTx) {
        debug_assert!(!self.members.contains_key(&identity.name));
        self.join_order_source += 1;
        let member = Member {
            identity,
            tx,
            join_order: self.join_order_source,
        };
        self.members.insert(member.identity.name.clone(), member);
    }

    pub fn remove(&mut self, name: &str) -> Option<Member> {
        self.members.remove(name)
    }

    pub fn drain(&mut self) -> Vec<Member> {
        let mut members = self.members.drain().map(|(_, m)| m).collect::<Vec<_>>();
        members.sort_by_key(|m| m.join_order);
        members
    }

    pub fn ordered(&self) -> Vec<&Member> {
        let mut members = self.members.values().collect::<Vec<_>>();
        members.sort_by_key(|m| m.join_order);
        members
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.ordered()
            .into_iter()
            .map(|m| m.identity.clone())
            .collect()
    }

    pub fn push(&self, to: &str, event: ReplicaEvent) -> Result<(), TransportError> {
        match self.members.get(to) {
            Some(member) => push(to, &member.tx, event),
            None => Err(TransportError {
                recipient: to.to_owned(),
            }),
        }
    }

    /// Pushes to every member but `without`. Returns the number of deliveries.
    pub fn broadcast(&self, event: &ReplicaEvent, without: Option<&str>) -> usize {
        self.ordered()
            .into_iter()
            .filter(|m| without.map_or(true, |name| name != m.identity.name))
            .filter(|m| push(&m.identity.name, &m.tx, event.clone()).is_ok())
            .count()
    }
}
