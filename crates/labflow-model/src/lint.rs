use crate::{
    Activity, ActivityNode, CallBehaviorAction, Diagnostic, Direction, Guard, NodeKind, ObjectId,
    ObjectStore, PinKind, Severity, ValidationError,
};
use std::collections::BTreeMap;

/// Caller-supplied well-formedness check.
pub trait LintRule {
    fn name(&self) -> &str;
    fn apply(&self, activity: &Activity, store: &dyn ObjectStore) -> Vec<Diagnostic>;
}

/// Checks an activity without mutating it. Findings keep rule order.
pub fn validate(
    activity: &Activity,
    store: &dyn ObjectStore,
    extra_rules: &[&dyn LintRule],
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    diagnostics.extend(rule_parameter_bounds(activity));
    diagnostics.extend(rule_edge_endpoints_exist(activity));
    diagnostics.extend(rule_edge_kinds(activity));
    diagnostics.extend(rule_behavior_resolves(activity, store));
    diagnostics.extend(rule_pins_match_parameters(activity, store));
    diagnostics.extend(rule_input_pin_has_source(activity));
    diagnostics.extend(rule_value_pin_literal(activity));
    diagnostics.extend(rule_initial_no_incoming(activity));
    diagnostics.extend(rule_single_initial(activity));
    diagnostics.extend(rule_reachability(activity));
    diagnostics.extend(rule_deterministic_fan_out(activity));
    diagnostics.extend(rule_decision_single_else(activity));
    diagnostics.extend(rule_output_parameter_bound(activity));

    for rule in extra_rules {
        diagnostics.extend(rule.apply(activity, store));
    }

    diagnostics
}

pub fn validate_or_raise(
    activity: &Activity,
    store: &dyn ObjectStore,
    extra_rules: &[&dyn LintRule],
) -> Result<Vec<Diagnostic>, ValidationError> {
    let diagnostics = validate(activity, store, extra_rules);
    if diagnostics.iter().any(Diagnostic::is_error) {
        return Err(ValidationError::new(diagnostics));
    }
    Ok(diagnostics)
}

fn rule_parameter_bounds(activity: &Activity) -> Vec<Diagnostic> {
    activity
        .parameters()
        .iter()
        .filter(|parameter| parameter.upper.is_some_and(|upper| upper < parameter.lower))
        .map(|parameter| {
            Diagnostic::new(
                "parameter_bounds",
                Severity::Error,
                format!(
                    "parameter '{}' has lower bound {} above its upper bound",
                    parameter.name, parameter.lower
                ),
            )
            .with_object(activity.id(), parameter.name.clone())
        })
        .collect()
}

fn rule_edge_endpoints_exist(activity: &Activity) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for edge in &activity.edges {
        for (role, endpoint) in [("source", &edge.source), ("target", &edge.target)] {
            let exists = activity.nodes.contains_key(endpoint) || activity.pin(endpoint).is_some();
            if !exists {
                diagnostics.push(
                    Diagnostic::new(
                        "edge_endpoints_exist",
                        Severity::Error,
                        format!("edge {role} '{endpoint}' is not a member of the activity"),
                    )
                    .with_object(&edge.id, edge.kind.type_name()),
                );
            }
        }
    }
    diagnostics
}

fn rule_edge_kinds(activity: &Activity) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for edge in &activity.edges {
        let source_pin = activity.pin(&edge.source).map(|(_, pin)| pin);
        let target_pin = activity.pin(&edge.target).map(|(_, pin)| pin);
        let problem = if edge.is_control() && (source_pin.is_some() || target_pin.is_some()) {
            Some("control flow cannot start or end at a pin")
        } else if source_pin.is_some_and(|pin| !pin.is_output()) {
            Some("object flow cannot start at an input pin")
        } else if target_pin.is_some_and(|pin| pin.is_output()) {
            Some("object flow cannot end at an output pin")
        } else {
            None
        };
        if let Some(problem) = problem {
            diagnostics.push(
                Diagnostic::new("edge_kinds", Severity::Error, problem)
                    .with_object(&edge.id, edge.kind.type_name()),
            );
        }
    }
    diagnostics
}

fn rule_behavior_resolves(activity: &Activity, store: &dyn ObjectStore) -> Vec<Diagnostic> {
    calls(activity)
        .filter_map(|(node, call)| {
            store.behavior(&call.behavior).err().map(|error| {
                Diagnostic::new("behavior_resolves", Severity::Error, error.to_string())
                    .with_object(&node.id, node.type_name())
            })
        })
        .collect()
}

fn rule_pins_match_parameters(activity: &Activity, store: &dyn ObjectStore) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (node, call) in calls(activity) {
        let Ok(behavior) = store.behavior(&call.behavior) else {
            continue;
        };
        let signature = behavior.signature();

        let mut pin_counts: BTreeMap<(&str, Direction), usize> = BTreeMap::new();
        for pin in call.pins() {
            *pin_counts
                .entry((pin.name.as_str(), pin.direction()))
                .or_default() += 1;
            if signature.parameter(&pin.name, pin.direction()).is_none() {
                diagnostics.push(
                    Diagnostic::new(
                        "pins_match_parameters",
                        Severity::Error,
                        format!(
                            "{} '{}' matches no {} parameter of behavior '{}'",
                            pin.type_name(),
                            pin.name,
                            pin.direction(),
                            signature.name
                        ),
                    )
                    .with_object(&pin.id, pin.name.clone())
                    .with_fix("remove the pin or declare the parameter"),
                );
            }
        }

        for parameter in &signature.parameters {
            let count = pin_counts
                .get(&(parameter.name.as_str(), parameter.direction))
                .copied()
                .unwrap_or(0);
            if parameter.required() && count == 0 {
                diagnostics.push(
                    Diagnostic::new(
                        "pins_match_parameters",
                        Severity::Error,
                        format!(
                            "action for '{}' is missing a pin for required {} parameter '{}'",
                            signature.name, parameter.direction, parameter.name
                        ),
                    )
                    .with_object(&node.id, signature.name.clone()),
                );
            }
            if count > 1 {
                diagnostics.push(
                    Diagnostic::new(
                        "pins_match_parameters",
                        Severity::Error,
                        format!(
                            "action for '{}' has {count} pins for {} parameter '{}'",
                            signature.name, parameter.direction, parameter.name
                        ),
                    )
                    .with_object(&node.id, signature.name.clone()),
                );
            }
        }
    }
    diagnostics
}

fn rule_input_pin_has_source(activity: &Activity) -> Vec<Diagnostic> {
    calls(activity)
        .flat_map(|(_, call)| call.inputs.iter())
        .filter(|pin| matches!(pin.kind, PinKind::Input))
        .filter(|pin| !activity.incoming_edges(&pin.id).any(|edge| edge.is_object()))
        .map(|pin| {
            Diagnostic::new(
                "input_pin_has_source",
                Severity::Error,
                format!(
                    "input pin '{}' has no incoming object flow and cannot be assigned a value",
                    pin.name
                ),
            )
            .with_object(&pin.id, pin.name.clone())
            .with_fix("connect a value to the pin or bind it to a literal")
        })
        .collect()
}

fn rule_value_pin_literal(activity: &Activity) -> Vec<Diagnostic> {
    calls(activity)
        .flat_map(|(_, call)| call.inputs.iter())
        .filter(|pin| pin.literal().is_some_and(|value| value.is_null()))
        .map(|pin| {
            Diagnostic::new(
                "value_pin_literal",
                Severity::Error,
                format!("value pin '{}' carries no value", pin.name),
            )
            .with_object(&pin.id, pin.name.clone())
        })
        .collect()
}

fn rule_initial_no_incoming(activity: &Activity) -> Vec<Diagnostic> {
    activity
        .initial_nodes()
        .filter(|node| activity.incoming_edges(&node.id).next().is_some())
        .map(|node| {
            Diagnostic::new(
                "initial_no_incoming",
                Severity::Error,
                "initial node must have no incoming edges",
            )
            .with_object(&node.id, node.type_name())
        })
        .collect()
}

fn rule_single_initial(activity: &Activity) -> Vec<Diagnostic> {
    let count = activity.initial_nodes().count();
    if count > 1 {
        vec![
            Diagnostic::new(
                "single_initial",
                Severity::Warning,
                format!("activity has {count} initial nodes"),
            )
            .with_object(activity.id(), activity.name()),
        ]
    } else {
        Vec::new()
    }
}

fn rule_reachability(activity: &Activity) -> Vec<Diagnostic> {
    activity
        .nodes
        .values()
        .filter(|node| !node.is_initiating())
        .filter(|node| activity.incoming_flows(&node.id).next().is_none())
        .map(|node| {
            Diagnostic::new(
                "reachability",
                Severity::Warning,
                format!("{} has no incoming edges and is unreachable", node.type_name()),
            )
            .with_object(&node.id, node.type_name())
        })
        .collect()
}

fn rule_deterministic_fan_out(activity: &Activity) -> Vec<Diagnostic> {
    let mut outflows: BTreeMap<&ObjectId, usize> = BTreeMap::new();
    for edge in activity.edges.iter().filter(|edge| edge.is_object()) {
        *outflows.entry(&edge.source).or_default() += 1;
    }

    outflows
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .filter(|(source, _)| {
            !activity.node(source).is_some_and(|node| {
                node.supports_multiple_dispatch() || node.as_call().is_some()
            })
        })
        .map(|(source, count)| {
            Diagnostic::new(
                "deterministic_fan_out",
                Severity::Warning,
                format!("'{source}' has {count} outgoing object flows"),
            )
            .with_object(source, source.local_name())
            .with_fix("route the flows through a fork node")
        })
        .collect()
}

fn rule_decision_single_else(activity: &Activity) -> Vec<Diagnostic> {
    activity
        .nodes
        .values()
        .filter(|node| matches!(node.kind, NodeKind::Decision(_)))
        .filter(|node| {
            activity
                .outgoing_edges(&node.id)
                .filter(|edge| edge.guard.as_ref().is_some_and(Guard::is_else))
                .count()
                > 1
        })
        .map(|node| {
            Diagnostic::new(
                "decision_single_else",
                Severity::Error,
                "decision has more than one else outflow",
            )
            .with_object(&node.id, node.type_name())
        })
        .collect()
}

fn rule_output_parameter_bound(activity: &Activity) -> Vec<Diagnostic> {
    activity
        .signature
        .outputs()
        .filter(|parameter| {
            activity
                .parameter_node(&parameter.name, Direction::Out)
                .is_none()
        })
        .map(|parameter| {
            Diagnostic::new(
                "output_parameter_bound",
                Severity::Info,
                format!("output parameter '{}' is never produced", parameter.name),
            )
            .with_object(activity.id(), parameter.name.clone())
        })
        .collect()
}

fn calls(activity: &Activity) -> impl Iterator<Item = (&ActivityNode, &CallBehaviorAction)> {
    activity
        .nodes
        .values()
        .filter_map(|node| node.as_call().map(|call| (node, call)))
}
