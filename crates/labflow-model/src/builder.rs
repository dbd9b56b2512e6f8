use crate::{
    Activity, ActivityNode, ActivityParameterNode, BuildError, CallBehaviorAction, DecisionNode,
    Direction, EdgeKind, Guard, NodeKind, ObjectId, ObjectStore, Parameter, Pin, PinKind,
    next_pin_id,
};
use serde_json::{Value, json};
use tracing::{debug, instrument};

/// How a caller supplies one input of an invoked behavior.
#[derive(Clone, Debug, PartialEq)]
pub enum PinBinding {
    /// Literal constant carried by a value pin.
    Literal(Value),
    /// Stored object, resolved once and carried by a value pin.
    Reference(ObjectId),
    /// Node of the same activity whose value flows into an input pin.
    Node(ObjectId),
    /// Several nodes feeding one input pin; each firing takes the first
    /// value available among them.
    Nodes(Vec<ObjectId>),
}

impl PinBinding {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }
}

impl From<Value> for PinBinding {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<ObjectId> for PinBinding {
    fn from(node: ObjectId) -> Self {
        Self::Node(node)
    }
}

impl From<Vec<ObjectId>> for PinBinding {
    fn from(nodes: Vec<ObjectId>) -> Self {
        Self::Nodes(nodes)
    }
}

/// Composes an [`Activity`], resolving invoked behaviors through an object store.
pub struct ActivityBuilder<'s> {
    store: &'s dyn ObjectStore,
    activity: Activity,
}

impl<'s> ActivityBuilder<'s> {
    pub fn new(
        store: &'s dyn ObjectStore,
        id: impl Into<ObjectId>,
        name: impl Into<String>,
    ) -> Self {
        Self::from_activity(store, Activity::new(id, name))
    }

    /// Continues editing an existing activity.
    pub fn from_activity(store: &'s dyn ObjectStore, activity: Activity) -> Self {
        Self { store, activity }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn finish(self) -> Activity {
        self.activity
    }

    pub fn add_input(
        &mut self,
        name: impl Into<String>,
        value_type: impl Into<String>,
        optional: bool,
        default_value: Option<Value>,
    ) -> Result<&Parameter, BuildError> {
        let mut parameter = Parameter::input(name, value_type);
        if optional {
            parameter = parameter.optional();
        }
        parameter.default_value = default_value;
        self.add_parameter(parameter)
    }

    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        value_type: impl Into<String>,
        optional: bool,
    ) -> Result<&Parameter, BuildError> {
        let mut parameter = Parameter::output(name, value_type);
        if optional {
            parameter = parameter.optional();
        }
        self.add_parameter(parameter)
    }

    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<&Parameter, BuildError> {
        let signature = &mut self.activity.signature;
        if signature
            .parameter(&parameter.name, parameter.direction)
            .is_some()
        {
            return Err(BuildError::DuplicateParameter {
                behavior: signature.name.clone(),
                name: parameter.name,
                direction: parameter.direction,
            });
        }
        debug!(
            activity = %signature.id,
            parameter = %parameter.name,
            direction = %parameter.direction,
            "parameter added"
        );
        signature.parameters.push(parameter);
        let index = signature.parameters.len() - 1;
        Ok(&signature.parameters[index])
    }

    /// Returns the node that carries input parameter `name`, creating it once.
    pub fn bind_input_parameter(&mut self, name: &str) -> Result<ObjectId, BuildError> {
        self.bind_parameter(name, Direction::In)
    }

    /// Creates the node for output parameter `name` and feeds it from `source`.
    pub fn bind_output_parameter(
        &mut self,
        name: &str,
        source: &ObjectId,
    ) -> Result<ObjectId, BuildError> {
        self.ensure_member(source, "source")?;
        let node = self.bind_parameter(name, Direction::Out)?;
        self.connect(source, &node)?;
        Ok(node)
    }

    /// Declares an input parameter and binds it to a parameter node.
    pub fn input_value(
        &mut self,
        name: &str,
        value_type: impl Into<String>,
        optional: bool,
        default_value: Option<Value>,
    ) -> Result<ObjectId, BuildError> {
        self.add_input(name, value_type, optional, default_value)?;
        self.bind_input_parameter(name)
    }

    /// Declares an output parameter fed by `source`.
    pub fn designate_output(
        &mut self,
        name: &str,
        value_type: impl Into<String>,
        source: &ObjectId,
    ) -> Result<ObjectId, BuildError> {
        self.add_output(name, value_type, false)?;
        self.bind_output_parameter(name, source)
    }

    fn bind_parameter(&mut self, name: &str, direction: Direction) -> Result<ObjectId, BuildError> {
        if self.activity.signature.parameter(name, direction).is_none() {
            return Err(BuildError::InvalidGraph(format!(
                "activity '{}' has no {direction} parameter named '{name}'",
                self.activity.name()
            )));
        }
        if let Some(existing) = self.activity.parameter_node(name, direction) {
            return Ok(existing.id.clone());
        }
        Ok(self
            .activity
            .insert_node(NodeKind::Parameter(ActivityParameterNode {
                parameter: name.to_string(),
                direction,
            })))
    }

    /// Returns the activity's initial node, creating it on first use.
    pub fn initial(&mut self) -> ObjectId {
        if let Some(node) = self.activity.initial_nodes().next() {
            return node.id.clone();
        }
        self.activity.insert_node(NodeKind::Initial)
    }

    /// Returns the activity's final node, creating it on first use.
    pub fn final_node(&mut self) -> ObjectId {
        if let Some(node) = self.activity.final_nodes().next() {
            return node.id.clone();
        }
        self.activity.insert_node(NodeKind::Final)
    }

    pub fn fork(&mut self) -> ObjectId {
        self.activity.insert_node(NodeKind::Fork)
    }

    pub fn join(&mut self) -> ObjectId {
        self.activity.insert_node(NodeKind::Join)
    }

    pub fn merge(&mut self) -> ObjectId {
        self.activity.insert_node(NodeKind::Merge)
    }

    /// Creates a decision routing tokens from `primary`.
    ///
    /// With a `decision_input` behavior, a call to it is added after
    /// `primary`, fed from `decision_input_source` through its
    /// `decision_input` pin, and its `return` output becomes the decision
    /// value. Without one, `decision_input_source` feeds the decision directly
    /// as its decision input flow. With neither, the primary token itself is
    /// the decision value.
    #[instrument(skip(self), fields(activity = %self.activity.id()))]
    pub fn decision(
        &mut self,
        primary: &ObjectId,
        decision_input: Option<&ObjectId>,
        decision_input_source: Option<&ObjectId>,
    ) -> Result<ObjectId, BuildError> {
        self.ensure_member(primary, "source")?;
        if let Some(source) = decision_input_source {
            self.ensure_member(source, "source")?;
        }
        let returned = match decision_input {
            Some(behavior) => Some(self.decision_input_call(
                primary,
                behavior,
                decision_input_source,
            )?),
            None => None,
        };

        let decision = self.activity.insert_node(NodeKind::Decision(DecisionNode {
            decision_input: decision_input.cloned(),
            decision_input_flow: None,
        }));
        if self.activity.is_object_node(primary) {
            self.connect(primary, &decision)?;
        } else {
            self.add_edge(EdgeKind::Control, primary, &decision)?;
        }

        match (returned, decision_input_source) {
            (Some(returned), _) => {
                self.connect(&returned, &decision)?;
            }
            (None, Some(source)) => {
                let flow = self.connect(source, &decision)?;
                if let Some(ActivityNode {
                    kind: NodeKind::Decision(settings),
                    ..
                }) = self.activity.node_mut(&decision)
                {
                    settings.decision_input_flow = Some(flow);
                }
            }
            (None, None) => {}
        }
        Ok(decision)
    }

    /// Adds the call computing a decision value, ordered after `primary`, and
    /// returns its `return` output pin.
    fn decision_input_call(
        &mut self,
        primary: &ObjectId,
        behavior: &ObjectId,
        source: Option<&ObjectId>,
    ) -> Result<ObjectId, BuildError> {
        let store = self.store;
        let signature = store.behavior(behavior)?.signature();
        let returns = match signature.output("return") {
            Some(parameter) => parameter.name.clone(),
            None => match signature.outputs().collect::<Vec<_>>().as_slice() {
                [only] => only.name.clone(),
                _ => {
                    return Err(BuildError::InvalidGraph(format!(
                        "decision input '{}' has no 'return' output",
                        signature.name
                    )));
                }
            },
        };
        let bindings: Vec<(&str, PinBinding)> = source
            .map(|source| ("decision_input", PinBinding::Node(source.clone())))
            .into_iter()
            .collect();
        let call = self.call_behavior(behavior, bindings)?;
        let predecessor = self.activity.unpin(primary);
        self.order(&predecessor, &call)?;
        self.output_pin(&call, &returns)
    }

    /// Adds a guarded outflow to a decision.
    ///
    /// The edge is an object flow when the decision's primary incoming flow is
    /// one, and a control flow otherwise.
    pub fn add_decision_output(
        &mut self,
        decision: &ObjectId,
        guard: Guard,
        target: &ObjectId,
    ) -> Result<ObjectId, BuildError> {
        self.ensure_member(decision, "source")?;
        self.ensure_member(target, "target")?;
        if self.activity.node(decision).and_then(ActivityNode::as_decision).is_none() {
            return Err(BuildError::InvalidGraph(format!(
                "'{decision}' is not a decision node"
            )));
        }
        if guard.is_else()
            && self
                .activity
                .outgoing_edges(decision)
                .any(|edge| edge.guard.as_ref().is_some_and(Guard::is_else))
        {
            return Err(BuildError::InvalidGraph(format!(
                "decision '{decision}' already has an else outflow"
            )));
        }
        let kind = self
            .activity
            .primary_incoming_flow(decision)
            .map(|edge| edge.kind)
            .unwrap_or(EdgeKind::Control);
        Ok(self.activity.insert_edge(
            kind,
            decision.clone(),
            target.clone(),
            Some(guard),
        ))
    }

    /// Adds an action invoking `behavior`, with one pin per bound or required
    /// input and one output pin per declared output.
    #[instrument(skip(self, bindings), fields(activity = %self.activity.id()))]
    pub fn call_behavior<I, K>(
        &mut self,
        behavior: &ObjectId,
        bindings: I,
    ) -> Result<ObjectId, BuildError>
    where
        I: IntoIterator<Item = (K, PinBinding)>,
        K: Into<String>,
    {
        let signature = self.store.behavior(behavior)?.signature().clone();
        let bindings: Vec<(String, PinBinding)> = bindings
            .into_iter()
            .map(|(name, binding)| (name.into(), binding))
            .collect();

        let unmatched: Vec<String> = bindings
            .iter()
            .filter(|(name, _)| signature.input(name).is_none())
            .map(|(name, _)| name.clone())
            .collect();
        if !unmatched.is_empty() {
            return Err(BuildError::UnmatchedParameter {
                behavior: signature.name.clone(),
                names: unmatched,
            });
        }
        for (name, binding) in &bindings {
            match binding {
                PinBinding::Node(source) => self.ensure_member(source, "source")?,
                PinBinding::Nodes(sources) if sources.is_empty() => {
                    return Err(BuildError::InvalidGraph(format!(
                        "binding for '{name}' of '{}' lists no source nodes",
                        signature.name
                    )));
                }
                PinBinding::Nodes(sources) => {
                    for source in sources {
                        self.ensure_member(source, "source")?;
                    }
                }
                PinBinding::Reference(reference) => {
                    self.store.resolve(reference)?;
                }
                PinBinding::Literal(_) => {}
            }
        }

        let action = self
            .activity
            .insert_node(NodeKind::CallBehavior(CallBehaviorAction {
                behavior: behavior.clone(),
                inputs: Vec::new(),
                outputs: Vec::new(),
            }));
        let mut call = CallBehaviorAction {
            behavior: behavior.clone(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        let mut flows = Vec::new();

        for parameter in signature.inputs() {
            let binding = bindings
                .iter()
                .find(|(name, _)| name == &parameter.name)
                .map(|(_, binding)| binding);
            let kind = match binding {
                Some(PinBinding::Literal(value)) => PinKind::Value(value.clone()),
                Some(PinBinding::Reference(reference)) => {
                    PinKind::Value(json!({ "ref": reference.as_str() }))
                }
                Some(PinBinding::Node(_) | PinBinding::Nodes(_)) => PinKind::Input,
                None if parameter.required() => PinKind::Input,
                None => continue,
            };
            let pin = Pin {
                id: next_pin_id(&action, &call, &kind),
                name: parameter.name.clone(),
                kind,
            };
            match binding {
                Some(PinBinding::Node(source)) => flows.push((source.clone(), pin.id.clone())),
                Some(PinBinding::Nodes(sources)) => flows.extend(
                    sources
                        .iter()
                        .map(|source| (source.clone(), pin.id.clone())),
                ),
                _ => {}
            }
            call.inputs.push(pin);
        }
        for parameter in signature.outputs() {
            let pin = Pin {
                id: next_pin_id(&action, &call, &PinKind::Output),
                name: parameter.name.clone(),
                kind: PinKind::Output,
            };
            call.outputs.push(pin);
        }

        if let Some(node) = self.activity.node_mut(&action) {
            node.kind = NodeKind::CallBehavior(call);
        }
        for (source, pin) in flows {
            self.connect(&source, &pin)?;
        }
        debug!(action = %action, behavior = %signature.name, "behavior call added");
        Ok(action)
    }

    /// Adds a control flow between two member nodes.
    pub fn order(&mut self, source: &ObjectId, target: &ObjectId) -> Result<ObjectId, BuildError> {
        self.add_edge(EdgeKind::Control, source, target)
    }

    /// Adds an object flow, routing extra outflows of a single-dispatch source
    /// through a fork.
    pub fn connect(
        &mut self,
        source: &ObjectId,
        target: &ObjectId,
    ) -> Result<ObjectId, BuildError> {
        self.ensure_member(source, "source")?;
        self.ensure_member(target, "target")?;
        let source = self.deconflict_source(source);
        self.add_edge(EdgeKind::Object, &source, target)
    }

    /// Connects one source to every target.
    pub fn use_value(
        &mut self,
        source: &ObjectId,
        targets: &[ObjectId],
    ) -> Result<Vec<ObjectId>, BuildError> {
        targets
            .iter()
            .map(|target| self.connect(source, target))
            .collect()
    }

    pub fn input_pin(&self, action: &ObjectId, name: &str) -> Result<ObjectId, BuildError> {
        self.activity
            .input_pin(action, name)
            .map(|pin| pin.id.clone())
            .ok_or_else(|| {
                BuildError::InvalidGraph(format!("action '{action}' has no input pin '{name}'"))
            })
    }

    pub fn output_pin(&self, action: &ObjectId, name: &str) -> Result<ObjectId, BuildError> {
        self.activity
            .output_pin(action, name)
            .map(|pin| pin.id.clone())
            .ok_or_else(|| {
                BuildError::InvalidGraph(format!("action '{action}' has no output pin '{name}'"))
            })
    }

    fn add_edge(
        &mut self,
        kind: EdgeKind,
        source: &ObjectId,
        target: &ObjectId,
    ) -> Result<ObjectId, BuildError> {
        self.ensure_member(source, "source")?;
        self.ensure_member(target, "target")?;
        let edge = self
            .activity
            .insert_edge(kind, source.clone(), target.clone(), None);
        debug!(edge = %edge, source = %source, target = %target, "edge added");
        Ok(edge)
    }

    fn deconflict_source(&mut self, source: &ObjectId) -> ObjectId {
        if self
            .activity
            .node(source)
            .is_some_and(ActivityNode::supports_multiple_dispatch)
        {
            return source.clone();
        }

        let existing: Vec<(ObjectId, ObjectId)> = self
            .activity
            .outgoing_edges(source)
            .filter(|edge| edge.is_object())
            .map(|edge| (edge.id.clone(), edge.target.clone()))
            .collect();
        match existing.as_slice() {
            [] => source.clone(),
            [(_, target)]
                if self
                    .activity
                    .node(target)
                    .is_some_and(|node| matches!(node.kind, NodeKind::Fork)) =>
            {
                target.clone()
            }
            _ => {
                let fork = self.activity.insert_node(NodeKind::Fork);
                for (edge_id, _) in &existing {
                    if let Some(edge) = self.activity.edge_mut(edge_id) {
                        edge.source = fork.clone();
                    }
                }
                self.activity
                    .insert_edge(EdgeKind::Object, source.clone(), fork.clone(), None);
                debug!(source = %source, fork = %fork, "fork injected for fan-out");
                fork
            }
        }
    }

    fn ensure_member(&self, id: &ObjectId, role: &'static str) -> Result<(), BuildError> {
        let is_member = self.activity.nodes.contains_key(id) || self.activity.pin(id).is_some();
        if is_member {
            Ok(())
        } else {
            Err(BuildError::NotAMember {
                activity: self.activity.id().clone(),
                object: id.clone(),
                role,
            })
        }
    }
}
