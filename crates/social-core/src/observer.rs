//! Change Notifications
//!
//! Synchronous observer registry and the events the social graph emits.

use serde::Serialize;

/// Identifies an agent or a relationship by its ids
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityId {
    Agent { id: String },
    Relationship { owner: String, target: String },
}

impl EntityId {
    pub fn agent(id: impl Into<String>) -> Self {
        EntityId::Agent { id: id.into() }
    }

    pub fn relationship(owner: impl Into<String>, target: impl Into<String>) -> Self {
        EntityId::Relationship {
            owner: owner.into(),
            target: target.into(),
        }
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityId::Agent { id } => write!(f, "{}", id),
            EntityId::Relationship { owner, target } => write!(f, "{}->{}", owner, target),
        }
    }
}

/// Something that changed in the social graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphEvent {
    AgentAdded { agent: String },
    AgentRemoved { agent: String },
    RelationshipAdded { owner: String, target: String },
    RelationshipRemoved { owner: String, target: String },
    TraitAdded { entity: EntityId, trait_id: String },
    TraitRemoved { entity: EntityId, trait_id: String },
    StatChanged { entity: EntityId, stat: String, value: f64 },
    RuleInstantiated { rule: String, owner: String, other: String },
    RuleRemoved { rule: String, owner: String, other: String },
    Ticked { entity: EntityId },
    EventDispatched { event: String, description: String },
}

/// Returned by `subscribe`; pass it back to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

type Callback<E> = Box<dyn FnMut(&E) + Send>;

/// Callbacks invoked in subscription order
pub struct Observers<E> {
    next_handle: u64,
    callbacks: Vec<(ObserverHandle, Callback<E>)>,
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self {
            next_handle: 0,
            callbacks: Vec::new(),
        }
    }
}

impl<E> std::fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

impl<E> Observers<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&E) + Send + 'static) -> ObserverHandle {
        let handle = ObserverHandle(self.next_handle);
        self.next_handle += 1;
        self.callbacks.push((handle, Box::new(callback)));
        handle
    }

    /// Returns false if the handle was not subscribed.
    pub fn unsubscribe(&mut self, handle: ObserverHandle) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(h, _)| *h != handle);
        self.callbacks.len() != before
    }

    pub fn notify(&mut self, event: &E) {
        for (_, callback) in self.callbacks.iter_mut() {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
