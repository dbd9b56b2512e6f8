use crate::engine::{CallSite, Execution};
use crate::{
    CallEvent, ExecutionError, FrameId, InvocationMode, ParameterValues, RuntimeEventKind, Token,
};
use labflow_model::{
    Activity, ActivityNode, Behavior, CallBehaviorAction, ObjectId, Pin, PinKind, Signature,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

impl<'a> Execution<'a> {
    /// Every edge entering the action itself carries a token.
    pub(crate) fn control_ready(
        &self,
        activity: &Activity,
        frame: FrameId,
        node: &ObjectId,
    ) -> bool {
        activity
            .incoming_edges(node)
            .all(|edge| self.tokens.has(frame, &edge.id))
    }

    /// Some token is waiting on the action or one of its pins.
    pub(crate) fn has_arrivals(
        &self,
        activity: &Activity,
        frame: FrameId,
        node: &ObjectId,
    ) -> bool {
        activity
            .incoming_flows(node)
            .any(|edge| self.tokens.has(frame, &edge.id))
    }

    /// Names of required inputs that currently have no value.
    pub(crate) fn missing_inputs(
        &self,
        activity: &Activity,
        frame: FrameId,
        call: &CallBehaviorAction,
    ) -> Result<Vec<String>, ExecutionError> {
        let signature = self.store.behavior(&call.behavior)?.signature();
        Ok(call
            .inputs
            .iter()
            .filter(|pin| input_required(signature, &pin.name))
            .filter(|pin| !self.pin_satisfied(activity, frame, pin))
            .map(|pin| pin.name.clone())
            .collect())
    }

    fn pin_satisfied(&self, activity: &Activity, frame: FrameId, pin: &Pin) -> bool {
        match &pin.kind {
            PinKind::Value(literal) => !literal.is_null(),
            PinKind::Input => activity
                .incoming_edges(&pin.id)
                .any(|edge| self.tokens.has(frame, &edge.id)),
            PinKind::Output => true,
        }
    }

    /// Permissive runs skip the required-input check but still wait for
    /// control tokens.
    pub(crate) fn action_enabled(
        &self,
        activity: &Activity,
        frame: FrameId,
        node: &ActivityNode,
        call: &CallBehaviorAction,
    ) -> Result<bool, ExecutionError> {
        if !self.has_arrivals(activity, frame, &node.id)
            || !self.control_ready(activity, frame, &node.id)
        {
            return Ok(false);
        }
        if self.settings.permissive {
            return Ok(true);
        }
        Ok(self.missing_inputs(activity, frame, call)?.is_empty())
    }

    pub(crate) async fn fire_action(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node: &'a ActivityNode,
        call: &'a CallBehaviorAction,
        supplied: Option<ParameterValues>,
    ) -> Result<(), ExecutionError> {
        for edge in activity.incoming_edges(&node.id) {
            self.consume(frame, &edge.id);
        }
        let store = self.store;
        let behavior = store.behavior(&call.behavior)?;
        let inputs = self.gather_inputs(activity, frame, node, call, behavior.signature())?;
        let plain: ParameterValues = inputs
            .iter()
            .map(|(name, value)| (name.clone(), value.as_ref().clone()))
            .collect();

        if let Some(outputs) = supplied {
            debug!(frame, action = %node.id, "behavior_outputs_supplied");
            return self.complete_action(activity, frame, node, plain, outputs, true);
        }
        match behavior {
            Behavior::Primitive(signature) => {
                let executor = Arc::clone(&self.executor);
                match executor.invoke(signature, &plain).await {
                    Ok(outputs) => {
                        self.complete_action(activity, frame, node, plain, outputs, true)
                    }
                    Err(source) if self.settings.permissive => {
                        self.record_issue(
                            frame,
                            Some(node.id.clone()),
                            format!("behavior '{}' failed: {source}", signature.name),
                        );
                        self.complete_action(
                            activity,
                            frame,
                            node,
                            plain,
                            ParameterValues::new(),
                            true,
                        )
                    }
                    Err(source) => Err(ExecutionError::SubworkflowInvocation {
                        node: node.id.clone(),
                        behavior: signature.name.clone(),
                        source,
                        tokens: self.tokens.snapshot(),
                    }),
                }
            }
            Behavior::Activity(callee) => {
                self.invoke_activity(frame, node, call, callee, inputs, plain)
            }
        }
    }

    fn gather_inputs(
        &mut self,
        activity: &Activity,
        frame: FrameId,
        node: &ActivityNode,
        call: &CallBehaviorAction,
        signature: &Signature,
    ) -> Result<BTreeMap<String, Arc<Value>>, ExecutionError> {
        let mut inputs = BTreeMap::new();
        for pin in &call.inputs {
            let value = match &pin.kind {
                PinKind::Value(literal) if !literal.is_null() => Some(Arc::new(literal.clone())),
                PinKind::Value(_) | PinKind::Output => None,
                PinKind::Input => self
                    .take_first(activity, frame, &pin.id)
                    .map(|token| token.shared_value()),
            };
            match value {
                Some(value) => {
                    inputs.insert(pin.name.clone(), value);
                }
                None if input_required(signature, &pin.name) => {
                    if !self.settings.permissive {
                        return Err(ExecutionError::MissingRequiredValue {
                            node: node.id.clone(),
                            names: vec![pin.name.clone()],
                            tokens: self.tokens.snapshot(),
                        });
                    }
                    self.record_issue(
                        frame,
                        Some(pin.id.clone()),
                        format!(
                            "required input '{}' of '{}' has no value; using null",
                            pin.name, signature.name
                        ),
                    );
                    inputs.insert(pin.name.clone(), Arc::new(Value::Null));
                }
                None => {}
            }
        }
        Ok(inputs)
    }

    /// Starts a callee frame for an activity-valued behavior.
    fn invoke_activity(
        &mut self,
        frame: FrameId,
        node: &ActivityNode,
        call: &CallBehaviorAction,
        callee: &'a Activity,
        inputs: BTreeMap<String, Arc<Value>>,
        plain: ParameterValues,
    ) -> Result<(), ExecutionError> {
        let site = CallSite {
            frame,
            action: node.id.clone(),
            inputs: plain,
            firing: std::mem::take(&mut self.firing),
        };
        let callee_frame = self.start_frame(callee, Some(site), inputs)?;
        let mode = self.invocation_mode();
        self.emit(RuntimeEventKind::Call(CallEvent::Started {
            run_id: self.run_id.clone(),
            frame,
            node_id: node.id.clone(),
            behavior_id: call.behavior.clone(),
            callee_frame,
            mode: mode.as_str().to_string(),
        }));
        debug!(
            frame,
            callee_frame,
            action = %node.id,
            mode = mode.as_str(),
            "activity_invoked"
        );
        match mode {
            InvocationMode::Synchronous => self.sync_stack.push(callee_frame),
            InvocationMode::Asynchronous => {
                self.blocked.insert((frame, node.id.clone()));
                self.emit(RuntimeEventKind::Call(CallEvent::Blocked {
                    run_id: self.run_id.clone(),
                    frame,
                    node_id: node.id.clone(),
                }));
            }
        }
        Ok(())
    }

    /// Records the action as completed and places its results on its
    /// outflows: output pins carry their values, edges leaving the action
    /// itself carry control (or the sole output on an object flow).
    ///
    /// With `require_outputs`, a required output absent from `outputs` fails
    /// the run unless it is permissive.
    pub(crate) fn complete_action(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node: &ActivityNode,
        inputs: ParameterValues,
        mut outputs: ParameterValues,
        require_outputs: bool,
    ) -> Result<(), ExecutionError> {
        let Some(call) = node.as_call() else {
            return Err(self.malformed(format!("'{}' is not a behavior call", node.id)));
        };
        let store = self.store;
        let signature = store.behavior(&call.behavior)?.signature();

        if require_outputs {
            let missing: Vec<String> = call
                .outputs
                .iter()
                .filter(|pin| !outputs.contains_key(&pin.name))
                .filter(|pin| signature.output(&pin.name).is_none_or(|p| p.required()))
                .map(|pin| pin.name.clone())
                .collect();
            if !missing.is_empty() {
                if !self.settings.permissive {
                    return Err(ExecutionError::MissingRequiredValue {
                        node: node.id.clone(),
                        names: missing,
                        tokens: self.tokens.snapshot(),
                    });
                }
                self.record_issue(
                    frame,
                    Some(node.id.clone()),
                    format!(
                        "behavior '{}' produced no value for {}; using null",
                        signature.name,
                        missing.join(", ")
                    ),
                );
                for name in missing {
                    outputs.insert(name, Value::Null);
                }
            }
        }

        self.record(activity, frame, node, inputs, outputs.clone());

        let mut produced = Vec::new();
        for pin in &call.outputs {
            let Some(value) = outputs.remove(&pin.name) else {
                continue;
            };
            let token = Token::data(value);
            self.offer_all(activity, frame, &pin.id, &token)?;
            produced.push(token);
        }
        let sole_output = match produced.as_slice() {
            [token] if call.outputs.len() == 1 => token.clone(),
            _ => Token::Control,
        };
        self.offer_all(activity, frame, &node.id, &sole_output)
    }
}

fn input_required(signature: &Signature, name: &str) -> bool {
    signature.input(name).is_none_or(|parameter| parameter.required())
}
