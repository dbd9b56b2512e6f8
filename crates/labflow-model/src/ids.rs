use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a stored object.
///
/// Identities are path-like: a node id is its activity id followed by a local
/// segment, and a pin id extends its owning node id the same way.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn child(&self, local: impl AsRef<str>) -> Self {
        Self(format!("{}/{}", self.0, local.as_ref()))
    }

    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| Self(parent.to_string()))
    }

    pub fn local_name(&self) -> &str {
        self.0
            .rsplit_once('/')
            .map(|(_, local)| local)
            .unwrap_or(&self.0)
    }

    pub fn is_within(&self, container: &ObjectId) -> bool {
        self.0.len() > container.0.len()
            && self.0.starts_with(container.as_str())
            && self.0.as_bytes()[container.0.len()] == b'/'
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_child_and_parent_expected_round_trip() {
        let activity = ObjectId::new("protocol/mix");
        let node = activity.child("CallBehaviorAction1");
        assert_eq!(node.as_str(), "protocol/mix/CallBehaviorAction1");
        assert_eq!(node.parent(), Some(activity.clone()));
        assert_eq!(node.local_name(), "CallBehaviorAction1");
        assert!(node.is_within(&activity));
    }

    #[test]
    fn object_id_is_within_sibling_prefix_expected_false() {
        let activity = ObjectId::new("protocol/mix");
        let sibling = ObjectId::new("protocol/mixer/InitialNode1");
        assert!(!sibling.is_within(&activity));
        assert!(!activity.is_within(&activity));
    }
}
