use labflow_engine::{
    BehaviorError, BehaviorRegistry, ExecutionEngine, ExecutionError, ParameterValues,
    RegistryBehaviorExecutor, RunConfig, RunResult, RunStatus, TraceEntry,
};
use labflow_model::{
    Activity, ActivityBuilder, ActivityNode, Behavior, EdgeKind, Guard, MemoryObjectStore,
    NodeKind, ObjectId, ObjectStore, Parameter, PinBinding, Signature,
};
use serde_json::{Value, json};
use std::sync::Arc;

fn library() -> MemoryObjectStore {
    [
        Signature::new("lib/add", "add")
            .with_parameter(Parameter::input("a", "int"))
            .with_parameter(Parameter::input("b", "int"))
            .with_parameter(Parameter::output("sum", "int")),
        Signature::new("lib/measure", "measure")
            .with_parameter(Parameter::input("sample", "Sample"))
            .with_parameter(Parameter::output("reading", "float")),
        Signature::new("lib/handle", "handle").with_parameter(Parameter::input("x", "str")),
        Signature::new("lib/step_a", "step_a"),
        Signature::new("lib/step_b", "step_b"),
        Signature::new("lib/tick", "tick"),
        Signature::new("lib/check", "check")
            .with_parameter(Parameter::input("decision_input", "int"))
            .with_parameter(Parameter::output("return", "str")),
    ]
    .into_iter()
    .try_fold(MemoryObjectStore::new(), |store, signature| {
        store.with_behavior(Behavior::primitive(signature))
    })
    .expect("library should build")
}

fn add(inputs: &ParameterValues) -> Result<ParameterValues, BehaviorError> {
    let operand = |name: &str| {
        inputs
            .get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| BehaviorError::InvalidInput {
                name: name.to_string(),
                message: "expected an integer".to_string(),
            })
    };
    Ok(ParameterValues::from([(
        "sum".to_string(),
        json!(operand("a")? + operand("b")?),
    )]))
}

fn measure(_inputs: &ParameterValues) -> Result<ParameterValues, BehaviorError> {
    Ok(ParameterValues::from([("reading".to_string(), json!(0.5))]))
}

/// Returns "yes" for values above ten.
fn check(inputs: &ParameterValues) -> Result<ParameterValues, BehaviorError> {
    let above = inputs
        .get("decision_input")
        .and_then(Value::as_i64)
        .is_some_and(|value| value > 10);
    let answer = if above { "yes" } else { "no" };
    Ok(ParameterValues::from([("return".to_string(), json!(answer))]))
}

fn config() -> RunConfig {
    let mut registry = BehaviorRegistry::new();
    registry.register("add", Arc::new(add));
    registry.register("measure", Arc::new(measure));
    registry.register("check", Arc::new(check));
    registry.set_fallback(Arc::new(|_: &ParameterValues| {
        Ok::<_, BehaviorError>(ParameterValues::new())
    }));
    RunConfig::with_executor(Arc::new(RegistryBehaviorExecutor::new(registry)))
}

fn engine_with(mut store: MemoryObjectStore, activity: Activity) -> (ExecutionEngine, ObjectId) {
    let id = activity.id().clone();
    store
        .add(Behavior::from(activity))
        .expect("activity should be stored");
    (ExecutionEngine::new(Arc::new(store)), id)
}

fn no_bindings() -> Vec<(String, PinBinding)> {
    Vec::new()
}

#[tokio::test(flavor = "current_thread")]
async fn run_add_protocol_expected_single_trace_and_sum() {
    let store = library();
    let mut builder = ActivityBuilder::new(&store, "p", "protocol");
    let initial = builder.initial();
    let action = builder
        .call_behavior(
            &ObjectId::new("lib/add"),
            [("a", PinBinding::literal(1)), ("b", PinBinding::literal(2))],
        )
        .expect("call");
    let final_node = builder.final_node();
    builder.order(&initial, &action).expect("start");
    builder.order(&action, &final_node).expect("end");
    let activity = builder.finish();
    let (engine, id) = engine_with(store, activity);

    let result = engine
        .run(&id, ParameterValues::new(), config())
        .await
        .expect("run should succeed");

    assert_eq!(result.labels(), vec!["initial", "add", "final"]);
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.trace[1].outputs.get("sum"), Some(&json!(3)));
    assert_eq!(result.run_id, "p-run");
}

#[tokio::test(flavor = "current_thread")]
async fn run_designated_output_expected_value_in_run_outputs() {
    let store = library();
    let mut builder = ActivityBuilder::new(&store, "p", "protocol");
    let a = builder.input_value("a", "int", false, None).expect("a");
    let action = builder
        .call_behavior(
            &ObjectId::new("lib/add"),
            [("a", PinBinding::Node(a)), ("b", PinBinding::literal(40))],
        )
        .expect("call");
    let sum = builder.output_pin(&action, "sum").expect("sum pin");
    builder.designate_output("total", "int", &sum).expect("output");
    let activity = builder.finish();
    let (engine, id) = engine_with(store, activity);

    let result = engine
        .run(&id, ParameterValues::from([("a".to_string(), json!(2))]), config())
        .await
        .expect("run should succeed");

    assert_eq!(result.outputs.get("total"), Some(&json!(42)));
    assert_eq!(result.labels(), vec!["a", "add", "total"]);
}

#[tokio::test(flavor = "current_thread")]
async fn run_input_default_expected_default_flows_to_output() {
    let store = library();
    let mut builder = ActivityBuilder::new(&store, "p", "protocol");
    let volume = builder
        .input_value("volume", "float", false, Some(json!(5.0)))
        .expect("volume");
    builder
        .designate_output("volume_out", "float", &volume)
        .expect("output");
    let activity = builder.finish();
    let (engine, id) = engine_with(store, activity);

    let result = engine
        .run(&id, ParameterValues::new(), RunConfig::default())
        .await
        .expect("run should succeed");

    assert_eq!(result.outputs.get("volume_out"), Some(&json!(5.0)));
}

#[tokio::test(flavor = "current_thread")]
async fn run_unknown_input_name_expected_malformed_run() {
    let store = library();
    let mut builder = ActivityBuilder::new(&store, "p", "protocol");
    let initial = builder.initial();
    let final_node = builder.final_node();
    builder.order(&initial, &final_node).expect("order");
    let activity = builder.finish();
    let (engine, id) = engine_with(store, activity);

    let error = engine
        .run(
            &id,
            ParameterValues::from([("bogus".to_string(), json!(1))]),
            RunConfig::default(),
        )
        .await
        .expect_err("unknown input should fail");

    assert!(matches!(error, ExecutionError::MalformedRun { .. }));
}

#[tokio::test(flavor = "current_thread")]
async fn run_fork_join_expected_each_branch_once_before_join() {
    let store = library();
    let mut builder = ActivityBuilder::new(&store, "p", "protocol");
    let initial = builder.initial();
    let fork = builder.fork();
    let join = builder.join();
    let final_node = builder.final_node();
    let a = builder
        .call_behavior(&ObjectId::new("lib/step_a"), no_bindings())
        .expect("a");
    let b = builder
        .call_behavior(&ObjectId::new("lib/step_b"), no_bindings())
        .expect("b");
    builder.order(&initial, &fork).expect("start");
    for step in [&a, &b] {
        builder.order(&fork, step).expect("fork out");
        builder.order(step, &join).expect("join in");
    }
    builder.order(&join, &final_node).expect("end");
    let activity = builder.finish();
    let (engine, id) = engine_with(store, activity);

    let result = engine
        .run(&id, ParameterValues::new(), RunConfig::default())
        .await
        .expect("run should succeed");

    assert_eq!(result.fired(&a), 1);
    assert_eq!(result.fired(&b), 1);
    assert_eq!(result.fired(&join), 1);
    let join_at = result.position(&join).expect("join fired");
    assert!(result.position(&a).expect("a fired") < join_at);
    assert!(result.position(&b).expect("b fired") < join_at);
    assert_eq!(result.fired(&final_node), 1);
}

fn uneven_join(store: &MemoryObjectStore, direct_first: bool) -> (Activity, ObjectId) {
    let mut builder = ActivityBuilder::new(store, "p", "protocol");
    let initial = builder.initial();
    let fork = builder.fork();
    let join = builder.join();
    let final_node = builder.final_node();
    let step = builder
        .call_behavior(&ObjectId::new("lib/step_a"), no_bindings())
        .expect("step");
    builder.order(&initial, &fork).expect("start");
    if direct_first {
        builder.order(&fork, &join).expect("direct");
        builder.order(&fork, &step).expect("branch");
    } else {
        builder.order(&fork, &step).expect("branch");
        builder.order(&fork, &join).expect("direct");
    }
    builder.order(&step, &join).expect("branch in");
    builder.order(&join, &final_node).expect("end");
    (builder.finish(), join)
}

#[tokio::test(flavor = "current_thread")]
async fn join_tokens_in_either_order_expected_single_outgoing_token() {
    for direct_first in [true, false] {
        let store = library();
        let (activity, join) = uneven_join(&store, direct_first);
        let final_node = activity
            .final_nodes()
            .next()
            .map(|node| node.id.clone())
            .expect("final node");
        let (engine, id) = engine_with(store, activity);

        let result = engine
            .run(&id, ParameterValues::new(), RunConfig::default())
            .await
            .expect("run should succeed");

        assert_eq!(result.fired(&join), 1, "direct_first={direct_first}");
        assert_eq!(result.fired(&final_node), 1, "direct_first={direct_first}");
    }
}

fn routed(store: &MemoryObjectStore, with_else: bool) -> (Activity, Vec<ObjectId>) {
    let mut builder = ActivityBuilder::new(store, "p", "protocol");
    let choice = builder
        .input_value("choice", "str", false, None)
        .expect("choice");
    let decision = builder.decision(&choice, None, None).expect("decision");
    let mut guards = vec![Guard::Value(json!("A")), Guard::Value(json!("B"))];
    if with_else {
        guards.push(Guard::Else);
    }
    let mut targets = Vec::new();
    for guard in guards {
        let action = builder
            .call_behavior(&ObjectId::new("lib/handle"), no_bindings())
            .expect("handler");
        let pin = builder.input_pin(&action, "x").expect("x pin");
        builder
            .add_decision_output(&decision, guard, &pin)
            .expect("outflow");
        targets.push(action);
    }
    (builder.finish(), targets)
}

async fn route(
    with_else: bool,
    choice: &str,
) -> (Result<RunResult, ExecutionError>, Vec<ObjectId>) {
    let store = library();
    let (activity, targets) = routed(&store, with_else);
    let (engine, id) = engine_with(store, activity);
    let inputs = ParameterValues::from([("choice".to_string(), json!(choice))]);
    (engine.run(&id, inputs, RunConfig::default()).await, targets)
}

#[tokio::test(flavor = "current_thread")]
async fn decision_matching_guard_expected_only_that_edge() {
    let (result, targets) = route(true, "A").await;
    let result = result.expect("run should succeed");

    assert_eq!(result.fired(&targets[0]), 1);
    assert_eq!(result.fired(&targets[1]), 0);
    assert_eq!(result.fired(&targets[2]), 0);
    let handled = result
        .trace
        .iter()
        .find(|entry| entry.node == targets[0])
        .expect("handler entry");
    assert_eq!(handled.inputs.get("x"), Some(&json!("A")));
}

#[tokio::test(flavor = "current_thread")]
async fn decision_unmatched_value_expected_only_else_edge() {
    let (result, targets) = route(true, "C").await;
    let result = result.expect("run should succeed");

    assert_eq!(result.fired(&targets[0]), 0);
    assert_eq!(result.fired(&targets[1]), 0);
    assert_eq!(result.fired(&targets[2]), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn decision_unmatched_value_without_else_expected_ambiguous_decision() {
    let (result, _) = route(false, "C").await;
    let error = result.expect_err("unmatched value should fail");

    match error {
        ExecutionError::AmbiguousDecision { value, tokens, .. } => {
            assert_eq!(value, json!("C"));
            assert!(tokens.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn decision_control_primary_with_input_flow_expected_routes_on_flow_value() {
    let store = library();
    let mut builder = ActivityBuilder::new(&store, "p", "protocol");
    let initial = builder.initial();
    let mode = builder.input_value("mode", "str", false, None).expect("mode");
    let decision = builder
        .decision(&initial, None, Some(&mode))
        .expect("decision");
    let fast = builder
        .call_behavior(&ObjectId::new("lib/step_a"), no_bindings())
        .expect("fast");
    let slow = builder
        .call_behavior(&ObjectId::new("lib/step_b"), no_bindings())
        .expect("slow");
    builder
        .add_decision_output(&decision, Guard::Value(json!("fast")), &fast)
        .expect("fast route");
    builder
        .add_decision_output(&decision, Guard::Else, &slow)
        .expect("slow route");
    let activity = builder.finish();
    let (engine, id) = engine_with(store, activity);

    let result = engine
        .run(
            &id,
            ParameterValues::from([("mode".to_string(), json!("fast"))]),
            RunConfig::default(),
        )
        .await
        .expect("run should succeed");

    assert_eq!(result.fired(&fast), 1);
    assert_eq!(result.fired(&slow), 0);
}

fn measured(store: &MemoryObjectStore) -> (Activity, ObjectId) {
    let mut builder = ActivityBuilder::new(store, "p", "protocol");
    let sample = builder
        .input_value("sample", "Sample", false, None)
        .expect("sample");
    let action = builder
        .call_behavior(
            &ObjectId::new("lib/measure"),
            [("sample", PinBinding::Node(sample))],
        )
        .expect("measure");
    let reading = builder.output_pin(&action, "reading").expect("reading pin");
    builder
        .designate_output("reading", "float", &reading)
        .expect("output");
    (builder.finish(), action)
}

#[tokio::test(flavor = "current_thread")]
async fn run_missing_required_input_expected_missing_required_value() {
    let store = library();
    let (activity, _) = measured(&store);
    let (engine, id) = engine_with(store, activity);

    let error = engine
        .run(&id, ParameterValues::new(), config())
        .await
        .expect_err("missing input should fail");

    match error {
        ExecutionError::MissingRequiredValue { names, .. } => {
            assert_eq!(names, vec!["sample".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn run_missing_required_input_permissive_expected_null_and_partial_success() {
    let store = library();
    let (activity, action) = measured(&store);
    let (engine, id) = engine_with(store, activity);

    let result = engine
        .run(&id, ParameterValues::new(), config().permissive())
        .await
        .expect("permissive run should finish");

    assert_eq!(result.status, RunStatus::PartialSuccess);
    assert!(!result.issues.is_empty());
    let entry = result
        .trace
        .iter()
        .find(|entry| entry.node == action)
        .expect("measure fired");
    assert_eq!(entry.inputs.get("sample"), Some(&Value::Null));
    assert_eq!(result.outputs.get("reading"), Some(&json!(0.5)));
}

fn unwired(store: &MemoryObjectStore) -> (Activity, ObjectId, ObjectId) {
    let mut builder = ActivityBuilder::new(store, "p", "protocol");
    let initial = builder.initial();
    let action = builder
        .call_behavior(&ObjectId::new("lib/measure"), no_bindings())
        .expect("measure");
    let final_node = builder.final_node();
    builder.order(&initial, &action).expect("start");
    builder.order(&action, &final_node).expect("end");
    (builder.finish(), action, final_node)
}

#[tokio::test(flavor = "current_thread")]
async fn run_unwired_required_pin_expected_validation_error() {
    let store = library();
    let (activity, _, _) = unwired(&store);
    let (engine, id) = engine_with(store, activity);

    let error = engine
        .run(&id, ParameterValues::new(), config())
        .await
        .expect_err("preflight should reject the activity");

    assert!(matches!(error, ExecutionError::Validation(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn run_unwired_required_pin_unvalidated_expected_stall_names_pin() {
    let store = library();
    let (activity, action, _) = unwired(&store);
    let (engine, id) = engine_with(store, activity);
    let mut config = config();
    config.settings.validate_before_run = false;

    let error = engine
        .run(&id, ParameterValues::new(), config)
        .await
        .expect_err("stalled action should fail");

    match error {
        ExecutionError::MissingRequiredValue { node, names, tokens } => {
            assert_eq!(node, action);
            assert_eq!(names, vec!["sample".to_string()]);
            assert_eq!(tokens.count(), 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn run_unwired_required_pin_permissive_expected_run_reaches_final() {
    let store = library();
    let (activity, _, final_node) = unwired(&store);
    let (engine, id) = engine_with(store, activity);

    let result = engine
        .run(&id, ParameterValues::new(), config().permissive())
        .await
        .expect("permissive run should finish");

    assert_eq!(result.status, RunStatus::PartialSuccess);
    assert_eq!(result.fired(&final_node), 1);
    assert!(
        result
            .issues
            .iter()
            .any(|issue| issue.message.contains("sample"))
    );
}

#[tokio::test(flavor = "current_thread")]
async fn run_unbounded_loop_expected_step_limit_exceeded() {
    let store = library();
    let mut builder = ActivityBuilder::new(&store, "p", "protocol");
    let initial = builder.initial();
    let merge = builder.merge();
    let tick = builder
        .call_behavior(&ObjectId::new("lib/tick"), no_bindings())
        .expect("tick");
    builder.order(&initial, &merge).expect("start");
    builder.order(&merge, &tick).expect("loop body");
    builder.order(&tick, &merge).expect("loop back");
    let activity = builder.finish();
    let (engine, id) = engine_with(store, activity);
    let mut config = RunConfig::default();
    config.settings.max_steps = 25;

    let error = engine
        .run(&id, ParameterValues::new(), config)
        .await
        .expect_err("loop should hit the step limit");

    assert!(matches!(
        error,
        ExecutionError::StepLimitExceeded { limit: 25, .. }
    ));
}

/// Routes on a call to `lib/check` evaluating `x`: "yes" reaches `step_a`,
/// anything else `step_b`. Returns the decision and both targets.
fn checked(builder: &mut ActivityBuilder<'_>) -> (ObjectId, ObjectId, ObjectId) {
    let initial = builder.initial();
    let x = builder.input_value("x", "int", false, None).expect("x");
    let decision = builder
        .decision(&initial, Some(&ObjectId::new("lib/check")), Some(&x))
        .expect("decision");
    let accepted = builder
        .call_behavior(&ObjectId::new("lib/step_a"), no_bindings())
        .expect("accepted");
    let rejected = builder
        .call_behavior(&ObjectId::new("lib/step_b"), no_bindings())
        .expect("rejected");
    builder
        .add_decision_output(&decision, Guard::Value(json!("yes")), &accepted)
        .expect("yes route");
    builder
        .add_decision_output(&decision, Guard::Else, &rejected)
        .expect("else route");
    (decision, accepted, rejected)
}

fn decision_entry<'r>(result: &'r RunResult, decision: &ObjectId) -> &'r TraceEntry {
    result
        .trace
        .iter()
        .find(|entry| &entry.node == decision)
        .expect("decision fired")
}

#[tokio::test(flavor = "current_thread")]
async fn decision_input_behavior_expected_called_and_routes_on_its_return() {
    for (x, expect_accepted) in [(42, true), (3, false)] {
        let store = library();
        let mut builder = ActivityBuilder::new(&store, "p", "protocol");
        let (decision, accepted, rejected) = checked(&mut builder);
        let activity = builder.finish();
        let (engine, id) = engine_with(store, activity);

        let result = engine
            .run(
                &id,
                ParameterValues::from([("x".to_string(), json!(x))]),
                config(),
            )
            .await
            .expect("run should succeed");

        let check_at = result
            .trace
            .iter()
            .position(|entry| entry.label == "check")
            .expect("check fired");
        assert_eq!(result.trace[check_at].inputs.get("decision_input"), Some(&json!(x)));
        assert!(check_at < result.position(&decision).expect("decision fired"));
        assert_eq!(result.fired(&accepted), usize::from(expect_accepted), "x={x}");
        assert_eq!(result.fired(&rejected), usize::from(!expect_accepted), "x={x}");
    }
}

#[tokio::test(flavor = "current_thread")]
async fn decision_returned_value_expected_precedence_over_declared_input_flow() {
    let store = library();
    let mut builder = ActivityBuilder::new(&store, "p", "protocol");
    let mode = builder.input_value("mode", "str", false, None).expect("mode");
    let (decision, accepted, rejected) = checked(&mut builder);
    let mut activity = builder.finish();
    let declared = activity.insert_edge(EdgeKind::Object, mode, decision.clone(), None);
    if let Some(ActivityNode {
        kind: NodeKind::Decision(settings),
        ..
    }) = activity.node_mut(&decision)
    {
        settings.decision_input_flow = Some(declared.clone());
    }
    let (engine, id) = engine_with(store, activity);

    let result = engine
        .run(
            &id,
            ParameterValues::from([
                ("x".to_string(), json!(42)),
                ("mode".to_string(), json!("no")),
            ]),
            config(),
        )
        .await
        .expect("run should succeed");

    assert_eq!(result.fired(&accepted), 1);
    assert_eq!(result.fired(&rejected), 0);
    let entry = decision_entry(&result, &decision);
    assert_eq!(entry.inputs.get("decision_input"), Some(&json!("yes")));
    assert!(
        entry.consumed.iter().any(|token| token.edge == declared),
        "the declared input flow token is consumed too"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn decision_input_flow_expected_precedence_over_primary_value() {
    let store = library();
    let mut builder = ActivityBuilder::new(&store, "p", "protocol");
    let choice = builder
        .input_value("choice", "str", false, None)
        .expect("choice");
    let mode = builder.input_value("mode", "str", false, None).expect("mode");
    let decision = builder
        .decision(&choice, None, Some(&mode))
        .expect("decision");
    let mut targets = Vec::new();
    for guard in [Guard::Value(json!("A")), Guard::Value(json!("B"))] {
        let action = builder
            .call_behavior(&ObjectId::new("lib/handle"), no_bindings())
            .expect("handler");
        let pin = builder.input_pin(&action, "x").expect("x pin");
        builder
            .add_decision_output(&decision, guard, &pin)
            .expect("outflow");
        targets.push(action);
    }
    let activity = builder.finish();
    let (engine, id) = engine_with(store, activity);

    let result = engine
        .run(
            &id,
            ParameterValues::from([
                ("choice".to_string(), json!("A")),
                ("mode".to_string(), json!("B")),
            ]),
            config(),
        )
        .await
        .expect("run should succeed");

    assert_eq!(result.fired(&targets[0]), 0);
    assert_eq!(result.fired(&targets[1]), 1);
    let handled = result
        .trace
        .iter()
        .find(|entry| entry.node == targets[1])
        .expect("handler entry");
    assert_eq!(
        handled.inputs.get("x"),
        Some(&json!("A")),
        "the routed token is still the primary one"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn trace_consumed_tokens_expected_join_linked_to_both_branches() {
    let store = library();
    let mut builder = ActivityBuilder::new(&store, "p", "protocol");
    let initial = builder.initial();
    let fork = builder.fork();
    let left = builder
        .call_behavior(&ObjectId::new("lib/step_a"), no_bindings())
        .expect("left");
    let right = builder
        .call_behavior(&ObjectId::new("lib/step_b"), no_bindings())
        .expect("right");
    let join = builder.join();
    builder.order(&initial, &fork).expect("start");
    builder.order(&fork, &left).expect("left branch");
    builder.order(&fork, &right).expect("right branch");
    builder.order(&left, &join).expect("left in");
    builder.order(&right, &join).expect("right in");
    let activity = builder.finish();
    let (engine, id) = engine_with(store, activity);

    let result = engine
        .run(&id, ParameterValues::new(), config())
        .await
        .expect("run should succeed");

    let join_step = result.position(&join).expect("join fired");
    let mut predecessors: Vec<&ObjectId> = result
        .predecessors(join_step)
        .into_iter()
        .map(|entry| &entry.node)
        .collect();
    predecessors.sort();
    let mut expected = vec![&left, &right];
    expected.sort();
    assert_eq!(predecessors, expected);

    let initial_entry = &result.trace[0];
    assert!(initial_entry.consumed.is_empty());
    let fork_entry = &result.trace[result.position(&fork).expect("fork fired")];
    assert_eq!(fork_entry.predecessor_steps(), vec![0]);
    for entry in &result.trace {
        assert!(seconds(&entry.started_at) <= seconds(&entry.ended_at));
    }
    assert!(seconds(&result.started_at) <= seconds(&result.ended_at));
    assert!(result.completed_normally);
}

fn seconds(timestamp: &str) -> f64 {
    timestamp
        .trim_end_matches('Z')
        .parse()
        .expect("timestamp should be seconds since the epoch")
}

#[tokio::test(flavor = "current_thread")]
async fn run_required_output_never_produced_expected_not_completed_normally() {
    let store = library();
    let mut builder = ActivityBuilder::new(&store, "p", "protocol");
    builder
        .add_output("reading", "float", false)
        .expect("output");
    let initial = builder.initial();
    let tick = builder
        .call_behavior(&ObjectId::new("lib/tick"), no_bindings())
        .expect("tick");
    builder.order(&initial, &tick).expect("start");
    let activity = builder.finish();
    let (engine, id) = engine_with(store, activity);

    let result = engine
        .run(&id, ParameterValues::new(), config())
        .await
        .expect("run should finish");

    assert!(!result.completed_normally);
    assert_eq!(result.status, RunStatus::PartialSuccess);
    assert!(result.issues[0].message.contains("reading"));
}

#[tokio::test(flavor = "current_thread")]
async fn node_list_binding_expected_action_fires_once_per_arriving_value() {
    let store = library();
    let mut builder = ActivityBuilder::new(&store, "p", "protocol");
    let first = builder.input_value("first", "int", false, None).expect("first");
    let second = builder
        .input_value("second", "int", false, None)
        .expect("second");
    let action = builder
        .call_behavior(
            &ObjectId::new("lib/add"),
            [
                ("a", PinBinding::Nodes(vec![first, second])),
                ("b", PinBinding::literal(100)),
            ],
        )
        .expect("add");
    let activity = builder.finish();
    let (engine, id) = engine_with(store, activity);

    let result = engine
        .run(
            &id,
            ParameterValues::from([
                ("first".to_string(), json!(1)),
                ("second".to_string(), json!(2)),
            ]),
            config(),
        )
        .await
        .expect("run should succeed");

    let sums: Vec<&Value> = result
        .trace
        .iter()
        .filter(|entry| entry.node == action)
        .filter_map(|entry| entry.outputs.get("sum"))
        .collect();
    assert_eq!(sums, vec![&json!(101), &json!(102)]);
}
