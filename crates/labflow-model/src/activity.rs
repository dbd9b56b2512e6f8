use crate::{Direction, ObjectId, Parameter, Signature};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Control,
    Object,
}

impl EdgeKind {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Control => "ControlFlow",
            Self::Object => "ObjectFlow",
        }
    }
}

/// Guard on a decision outflow. `Else` matches only when no other guard does.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Guard {
    Value(Value),
    Else,
}

impl Guard {
    pub fn is_else(&self) -> bool {
        matches!(self, Self::Else)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityEdge {
    pub id: ObjectId,
    pub kind: EdgeKind,
    pub source: ObjectId,
    pub target: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<Guard>,
}

impl ActivityEdge {
    pub fn is_control(&self) -> bool {
        self.kind == EdgeKind::Control
    }

    pub fn is_object(&self) -> bool {
        self.kind == EdgeKind::Object
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PinKind {
    Input,
    /// Input pin carrying a literal; needs no incoming flow.
    Value(Value),
    Output,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: ObjectId,
    pub name: String,
    pub kind: PinKind,
}

impl Pin {
    pub fn direction(&self) -> Direction {
        match self.kind {
            PinKind::Output => Direction::Out,
            PinKind::Input | PinKind::Value(_) => Direction::In,
        }
    }

    pub fn is_output(&self) -> bool {
        self.direction() == Direction::Out
    }

    pub fn literal(&self) -> Option<&Value> {
        match &self.kind {
            PinKind::Value(value) => Some(value),
            PinKind::Input | PinKind::Output => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            PinKind::Input => "InputPin",
            PinKind::Value(_) => "ValuePin",
            PinKind::Output => "OutputPin",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallBehaviorAction {
    pub behavior: ObjectId,
    #[serde(default)]
    pub inputs: Vec<Pin>,
    #[serde(default)]
    pub outputs: Vec<Pin>,
}

impl CallBehaviorAction {
    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    pub fn input_pin(&self, name: &str) -> Option<&Pin> {
        self.inputs.iter().find(|pin| pin.name == name)
    }

    pub fn output_pin(&self, name: &str) -> Option<&Pin> {
        self.outputs.iter().find(|pin| pin.name == name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionNode {
    /// Behavior whose returned value is the decision value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_input: Option<ObjectId>,
    /// Incoming edge that carries the decision value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_input_flow: Option<ObjectId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityParameterNode {
    pub parameter: String,
    pub direction: Direction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Initial,
    Final,
    Fork,
    Join,
    Merge,
    Decision(DecisionNode),
    Parameter(ActivityParameterNode),
    CallBehavior(CallBehaviorAction),
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Initial => "InitialNode",
            Self::Final => "FinalNode",
            Self::Fork => "ForkNode",
            Self::Join => "JoinNode",
            Self::Merge => "MergeNode",
            Self::Decision(_) => "DecisionNode",
            Self::Parameter(_) => "ActivityParameterNode",
            Self::CallBehavior(_) => "CallBehaviorAction",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityNode {
    pub id: ObjectId,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl ActivityNode {
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn as_call(&self) -> Option<&CallBehaviorAction> {
        match &self.kind {
            NodeKind::CallBehavior(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_decision(&self) -> Option<&DecisionNode> {
        match &self.kind {
            NodeKind::Decision(decision) => Some(decision),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&ActivityParameterNode> {
        match &self.kind {
            NodeKind::Parameter(parameter) => Some(parameter),
            _ => None,
        }
    }

    /// Initial nodes and input parameter nodes may start a run.
    pub fn is_initiating(&self) -> bool {
        match &self.kind {
            NodeKind::Initial => true,
            NodeKind::Parameter(parameter) => parameter.direction == Direction::In,
            _ => false,
        }
    }

    /// Fork and decision nodes may have several object outflows.
    pub fn supports_multiple_dispatch(&self) -> bool {
        matches!(self.kind, NodeKind::Fork | NodeKind::Decision(_))
    }
}

/// A behavior that owns an execution graph.
///
/// Nodes are held in an id-ordered arena; edges keep declaration order, which
/// decision guards rely on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(flatten)]
    pub signature: Signature,
    #[serde(default)]
    pub nodes: BTreeMap<ObjectId, ActivityNode>,
    #[serde(default)]
    pub edges: Vec<ActivityEdge>,
    #[serde(default)]
    counters: BTreeMap<String, u32>,
}

impl Activity {
    pub fn new(id: impl Into<ObjectId>, name: impl Into<String>) -> Self {
        Self {
            signature: Signature::new(id, name),
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            counters: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.signature.id
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.signature.parameters
    }

    pub fn node(&self, id: &ObjectId) -> Option<&ActivityNode> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &ObjectId) -> Option<&ActivityEdge> {
        self.edges.iter().find(|edge| &edge.id == id)
    }

    /// Returns the owning action and the pin for a pin id.
    pub fn pin(&self, id: &ObjectId) -> Option<(&ActivityNode, &Pin)> {
        let owner = self.nodes.get(&id.parent()?)?;
        let pin = owner.as_call()?.pins().find(|pin| &pin.id == id)?;
        Some((owner, pin))
    }

    pub fn pin_owner(&self, id: &ObjectId) -> Option<&ActivityNode> {
        self.pin(id).map(|(owner, _)| owner)
    }

    /// Maps a pin id to its owning action id; any other id maps to itself.
    pub fn unpin(&self, id: &ObjectId) -> ObjectId {
        self.pin_owner(id)
            .map(|owner| owner.id.clone())
            .unwrap_or_else(|| id.clone())
    }

    /// True when `id` names a node, pin or edge of this activity.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.nodes.contains_key(id) || self.pin(id).is_some() || self.edge(id).is_some()
    }

    pub fn incoming_edges<'a>(
        &'a self,
        target: &ObjectId,
    ) -> impl Iterator<Item = &'a ActivityEdge> {
        self.edges.iter().filter(move |edge| &edge.target == target)
    }

    pub fn outgoing_edges<'a>(
        &'a self,
        source: &ObjectId,
    ) -> impl Iterator<Item = &'a ActivityEdge> {
        self.edges.iter().filter(move |edge| &edge.source == source)
    }

    /// Edges entering a node directly or through one of its pins.
    pub fn incoming_flows<'a>(
        &'a self,
        node: &ObjectId,
    ) -> impl Iterator<Item = &'a ActivityEdge> {
        self.edges
            .iter()
            .filter(move |edge| &edge.target == node || self.is_pin_of(&edge.target, node))
    }

    /// Edges leaving a node directly or through one of its pins.
    pub fn outgoing_flows<'a>(
        &'a self,
        node: &ObjectId,
    ) -> impl Iterator<Item = &'a ActivityEdge> {
        self.edges
            .iter()
            .filter(move |edge| &edge.source == node || self.is_pin_of(&edge.source, node))
    }

    fn is_pin_of(&self, candidate: &ObjectId, node: &ObjectId) -> bool {
        candidate.parent().as_ref() == Some(node) && self.pin(candidate).is_some()
    }

    pub fn initial_nodes(&self) -> impl Iterator<Item = &ActivityNode> {
        self.nodes
            .values()
            .filter(|node| matches!(node.kind, NodeKind::Initial))
    }

    pub fn final_nodes(&self) -> impl Iterator<Item = &ActivityNode> {
        self.nodes
            .values()
            .filter(|node| matches!(node.kind, NodeKind::Final))
    }

    pub fn initiating_nodes(&self) -> impl Iterator<Item = &ActivityNode> {
        self.nodes.values().filter(|node| node.is_initiating())
    }

    pub fn parameter_node(&self, name: &str, direction: Direction) -> Option<&ActivityNode> {
        self.nodes.values().find(|node| {
            node.as_parameter().is_some_and(|parameter| {
                parameter.parameter == name && parameter.direction == direction
            })
        })
    }

    pub fn input_pin(&self, action: &ObjectId, name: &str) -> Option<&Pin> {
        self.nodes.get(action)?.as_call()?.input_pin(name)
    }

    pub fn output_pin(&self, action: &ObjectId, name: &str) -> Option<&Pin> {
        self.nodes.get(action)?.as_call()?.output_pin(name)
    }

    /// The incoming edge of a decision that carries the token being routed.
    ///
    /// Edges that deliver the decision value (the declared decision input flow,
    /// or a flow returned by the decision input behavior) are never primary.
    pub fn primary_incoming_flow(&self, decision: &ObjectId) -> Option<&ActivityEdge> {
        let settings = self.node(decision)?.as_decision()?;
        self.edges.iter().find(|edge| {
            &edge.target == decision && !self.is_decision_value_flow(settings, edge)
        })
    }

    /// The incoming edge returned by a decision's `decision_input` behavior.
    pub fn decision_return_flow(&self, decision: &ObjectId) -> Option<&ActivityEdge> {
        let settings = self.node(decision)?.as_decision()?;
        let behavior = settings.decision_input.as_ref()?;
        self.edges
            .iter()
            .find(|edge| &edge.target == decision && self.is_returned_by(edge, behavior))
    }

    fn is_decision_value_flow(&self, settings: &DecisionNode, edge: &ActivityEdge) -> bool {
        if settings.decision_input_flow.as_ref() == Some(&edge.id) {
            return true;
        }
        settings
            .decision_input
            .as_ref()
            .is_some_and(|behavior| self.is_returned_by(edge, behavior))
    }

    fn is_returned_by(&self, edge: &ActivityEdge, behavior: &ObjectId) -> bool {
        self.pin(&edge.source)
            .and_then(|(owner, _)| owner.as_call())
            .is_some_and(|call| &call.behavior == behavior)
    }

    /// True for pins and activity parameter nodes.
    pub fn is_object_node(&self, id: &ObjectId) -> bool {
        self.pin(id).is_some() || self.node(id).is_some_and(|node| node.as_parameter().is_some())
    }

    /// Content digest of the activity's canonical JSON form.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    pub fn insert_node(&mut self, kind: NodeKind) -> ObjectId {
        let id = self.allocate_id(kind.type_name());
        self.nodes.insert(
            id.clone(),
            ActivityNode {
                id: id.clone(),
                kind,
            },
        );
        id
    }

    pub fn insert_edge(
        &mut self,
        kind: EdgeKind,
        source: ObjectId,
        target: ObjectId,
        guard: Option<Guard>,
    ) -> ObjectId {
        let id = self.allocate_id(kind.type_name());
        self.edges.push(ActivityEdge {
            id: id.clone(),
            kind,
            source,
            target,
            guard,
        });
        id
    }

    pub fn edge_mut(&mut self, id: &ObjectId) -> Option<&mut ActivityEdge> {
        self.edges.iter_mut().find(|edge| &edge.id == id)
    }

    pub fn node_mut(&mut self, id: &ObjectId) -> Option<&mut ActivityNode> {
        self.nodes.get_mut(id)
    }

    fn allocate_id(&mut self, type_name: &str) -> ObjectId {
        let counter = self.counters.entry(type_name.to_string()).or_insert(0);
        *counter += 1;
        self.signature.id.child(format!("{type_name}{counter}"))
    }
}

/// Allocates the id of the next pin of `kind` on `action`.
pub fn next_pin_id(action_id: &ObjectId, call: &CallBehaviorAction, kind: &PinKind) -> ObjectId {
    let type_name = match kind {
        PinKind::Input => "InputPin",
        PinKind::Value(_) => "ValuePin",
        PinKind::Output => "OutputPin",
    };
    let existing = call
        .pins()
        .filter(|pin| pin.type_name() == type_name)
        .count();
    action_id.child(format!("{type_name}{}", existing + 1))
}
