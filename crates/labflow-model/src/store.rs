use crate::{
    Activity, ActivityEdge, ActivityNode, Behavior, ObjectId, Pin, StoreError, StoreResult,
};

/// A live object that a stored reference names.
#[derive(Clone, Copy, Debug)]
pub enum Resolved<'a> {
    Behavior(&'a Behavior),
    Node(&'a ActivityNode),
    Edge(&'a ActivityEdge),
    Pin {
        owner: &'a ActivityNode,
        pin: &'a Pin,
    },
}

impl Resolved<'_> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Behavior(Behavior::Activity(_)) => "Activity",
            Self::Behavior(Behavior::Primitive(_)) => "Primitive",
            Self::Node(node) => node.type_name(),
            Self::Edge(edge) => edge.kind.type_name(),
            Self::Pin { pin, .. } => pin.type_name(),
        }
    }
}

/// Identity store that owns behaviors and resolves references into them.
///
/// Lookups must be read-only and idempotent; runs share one store.
pub trait ObjectStore: Send + Sync {
    fn resolve(&self, reference: &ObjectId) -> StoreResult<Resolved<'_>>;

    fn is_member(&self, container: &ObjectId, object: &ObjectId) -> bool;

    fn add(&mut self, behavior: Behavior) -> StoreResult<()>;

    fn behavior(&self, reference: &ObjectId) -> StoreResult<&Behavior> {
        match self.resolve(reference)? {
            Resolved::Behavior(behavior) => Ok(behavior),
            other => Err(StoreError::WrongKind {
                id: reference.clone(),
                expected: "Behavior",
                actual: other.type_name(),
            }),
        }
    }

    fn activity(&self, reference: &ObjectId) -> StoreResult<&Activity> {
        match self.behavior(reference)? {
            Behavior::Activity(activity) => Ok(activity),
            Behavior::Primitive(_) => Err(StoreError::WrongKind {
                id: reference.clone(),
                expected: "Activity",
                actual: "Primitive",
            }),
        }
    }

    fn node(&self, reference: &ObjectId) -> StoreResult<&ActivityNode> {
        match self.resolve(reference)? {
            Resolved::Node(node) => Ok(node),
            other => Err(StoreError::WrongKind {
                id: reference.clone(),
                expected: "ActivityNode",
                actual: other.type_name(),
            }),
        }
    }

    fn edge(&self, reference: &ObjectId) -> StoreResult<&ActivityEdge> {
        match self.resolve(reference)? {
            Resolved::Edge(edge) => Ok(edge),
            other => Err(StoreError::WrongKind {
                id: reference.clone(),
                expected: "ActivityEdge",
                actual: other.type_name(),
            }),
        }
    }
}
