use crate::engine::Execution;
use crate::{ExecutionError, FrameId, ParameterValues, Token};
use labflow_model::{Activity, ActivityEdge, ActivityNode, DecisionNode, Guard};
use serde_json::Value;
use std::sync::Arc;

impl<'a> Execution<'a> {
    /// A decision needs a token on its primary flow and on every flow that
    /// carries a decision value.
    pub(crate) fn decision_enabled(
        &self,
        activity: &Activity,
        frame: FrameId,
        node: &ActivityNode,
    ) -> bool {
        let Some(primary) = activity.primary_incoming_flow(&node.id) else {
            return false;
        };
        self.tokens.has(frame, &primary.id)
            && decision_value_flows(activity, node)
                .iter()
                .all(|flow| self.tokens.has(frame, &flow.id))
    }

    pub(crate) fn fire_decision(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node: &ActivityNode,
        decision: &DecisionNode,
    ) -> Result<(), ExecutionError> {
        let Some(primary) = activity.primary_incoming_flow(&node.id) else {
            return Err(self.malformed(format!("decision '{}' has no primary flow", node.id)));
        };
        let Some(token) = self.consume(frame, &primary.id) else {
            return Err(self.malformed(format!("decision '{}' fired without a token", node.id)));
        };

        let mut decided = None;
        for flow in decision_value_flows(activity, node) {
            let value = self.consume(frame, &flow.id).map(|token| token.shared_value());
            if decided.is_none() {
                decided = Some(value.unwrap_or_else(|| Arc::new(Value::Null)));
            }
        }
        let value = match (decided, &token) {
            (Some(value), _) => value,
            (None, Token::Data(value)) => Arc::clone(value),
            (None, Token::Control) => {
                return Err(self.malformed(format!(
                    "decision '{}' routes a control token but has no decision input{}",
                    node.id,
                    decision
                        .decision_input
                        .as_ref()
                        .map(|behavior| format!(" flow from '{behavior}'"))
                        .unwrap_or_default()
                )));
            }
        };

        let Some(outflow) = select_outflow(activity, node, &value) else {
            return Err(ExecutionError::AmbiguousDecision {
                node: node.id.clone(),
                value: value.as_ref().clone(),
                tokens: self.tokens.snapshot(),
            });
        };
        self.record(
            activity,
            frame,
            node,
            ParameterValues::from([("decision_input".to_string(), value.as_ref().clone())]),
            ParameterValues::new(),
        );
        self.offer(activity, frame, outflow, token)
    }
}

/// Incoming flows carrying a decision value, highest precedence first: the
/// flow returned by `decision_input`, then `decision_input_flow`.
fn decision_value_flows<'g>(
    activity: &'g Activity,
    node: &'g ActivityNode,
) -> Vec<&'g ActivityEdge> {
    let Some(settings) = node.as_decision() else {
        return Vec::new();
    };
    let returned = activity.decision_return_flow(&node.id);
    let declared = settings
        .decision_input_flow
        .as_ref()
        .and_then(|id| activity.edge(id))
        .filter(|flow| returned.is_none_or(|returned| returned.id != flow.id));
    returned.into_iter().chain(declared).collect()
}

/// First outflow in declaration order whose guard matches; else edges are
/// considered only after every other guard failed.
fn select_outflow<'g>(
    activity: &'g Activity,
    node: &'g ActivityNode,
    value: &Value,
) -> Option<&'g ActivityEdge> {
    let mut fallback = None;
    for edge in activity.outgoing_edges(&node.id) {
        match &edge.guard {
            Some(Guard::Else) => {
                fallback.get_or_insert(edge);
            }
            Some(Guard::Value(guard)) if guard_matches(guard, value) => return Some(edge),
            Some(Guard::Value(_)) => {}
            None if value.is_null() => return Some(edge),
            None => {}
        }
    }
    fallback
}

/// Guards match equal values, and scalars whose text forms agree.
pub(crate) fn guard_matches(guard: &Value, value: &Value) -> bool {
    if guard == value {
        return true;
    }
    match (scalar_text(guard), scalar_text(value)) {
        (Some(guard), Some(value)) => guard == value,
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
