use crate::{Behavior, ObjectId, ObjectStore, Resolved, StoreError, StoreResult};
use std::collections::BTreeMap;
use tracing::debug;

/// In-process object store keyed by behavior identity.
#[derive(Clone, Debug, Default)]
pub struct MemoryObjectStore {
    behaviors: BTreeMap<ObjectId, Behavior>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(mut self, behavior: impl Into<Behavior>) -> StoreResult<Self> {
        self.add(behavior.into())?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    pub fn behaviors(&self) -> impl Iterator<Item = &Behavior> {
        self.behaviors.values()
    }

    /// Finds the stored behavior that owns `reference`, walking up its path.
    fn owning_behavior(&self, reference: &ObjectId) -> Option<&Behavior> {
        let mut cursor = reference.parent();
        while let Some(candidate) = cursor {
            if let Some(behavior) = self.behaviors.get(&candidate) {
                return Some(behavior);
            }
            cursor = candidate.parent();
        }
        None
    }
}

impl ObjectStore for MemoryObjectStore {
    fn resolve(&self, reference: &ObjectId) -> StoreResult<Resolved<'_>> {
        if let Some(behavior) = self.behaviors.get(reference) {
            return Ok(Resolved::Behavior(behavior));
        }
        let activity = self
            .owning_behavior(reference)
            .and_then(Behavior::as_activity)
            .ok_or_else(|| StoreError::DanglingReference(reference.clone()))?;
        if let Some(node) = activity.node(reference) {
            return Ok(Resolved::Node(node));
        }
        if let Some((owner, pin)) = activity.pin(reference) {
            return Ok(Resolved::Pin { owner, pin });
        }
        if let Some(edge) = activity.edge(reference) {
            return Ok(Resolved::Edge(edge));
        }
        Err(StoreError::DanglingReference(reference.clone()))
    }

    fn is_member(&self, container: &ObjectId, object: &ObjectId) -> bool {
        match self.resolve(container) {
            Ok(Resolved::Behavior(Behavior::Activity(activity))) => activity.contains(object),
            Ok(Resolved::Node(node)) => node
                .as_call()
                .is_some_and(|call| call.pins().any(|pin| &pin.id == object)),
            _ => false,
        }
    }

    fn add(&mut self, behavior: Behavior) -> StoreResult<()> {
        let id = behavior.id().clone();
        if let Some(existing) = self.behaviors.get(&id) {
            if same_content(existing, &behavior)? {
                debug!(behavior_id = %id, "behavior already stored");
                return Ok(());
            }
            return Err(StoreError::Conflict(id));
        }
        debug!(behavior_id = %id, kind = behavior_kind(&behavior), "behavior stored");
        self.behaviors.insert(id, behavior);
        Ok(())
    }
}

fn same_content(left: &Behavior, right: &Behavior) -> StoreResult<bool> {
    match (left, right) {
        (Behavior::Activity(left), Behavior::Activity(right)) => {
            let left = left
                .fingerprint()
                .map_err(|error| StoreError::Backend(error.to_string()))?;
            let right = right
                .fingerprint()
                .map_err(|error| StoreError::Backend(error.to_string()))?;
            Ok(left == right)
        }
        (Behavior::Primitive(left), Behavior::Primitive(right)) => Ok(left == right),
        _ => Ok(false),
    }
}

fn behavior_kind(behavior: &Behavior) -> &'static str {
    match behavior {
        Behavior::Activity(_) => "activity",
        Behavior::Primitive(_) => "primitive",
    }
}
