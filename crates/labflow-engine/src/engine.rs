use crate::events::timestamp_now;
use crate::{
    ActivityRun, CallEvent, ConsumedToken, EngineSettings, ExecutionError, ExecutionIssue,
    FrameId, InvocationMode, NodeEvent, ParameterValues, ROOT_FRAME, ReadyNode, RunConfig,
    RunEvent, RunResult, RunStatus, RuntimeEventKind, RuntimeEventSink, SharedBehaviorExecutor,
    Token, TokenState, TraceEntry,
};
use labflow_model::{
    Activity, ActivityEdge, ActivityNode, Behavior, Direction, NodeKind, ObjectId, ObjectStore,
    Severity, validate,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Interprets stored activities as token-flow graphs.
///
/// The engine only reads the store; each run owns its token state, so runs of
/// the same activity can proceed side by side.
pub struct ExecutionEngine {
    store: Arc<dyn ObjectStore>,
}

impl ExecutionEngine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    #[instrument(
        name = "activity_run",
        skip(self, activity_id, inputs, config),
        fields(activity = %activity_id)
    )]
    pub async fn run(
        &self,
        activity_id: &ObjectId,
        inputs: ParameterValues,
        config: RunConfig,
    ) -> Result<RunResult, ExecutionError> {
        self.start(activity_id, inputs, config)?.finish().await
    }

    /// Starts a run that the caller advances node by node.
    ///
    /// Input parameter and initial nodes are queued but nothing fires until
    /// [`ActivityRun::step`], [`ActivityRun::advance`] or
    /// [`ActivityRun::finish`] is called.
    pub fn start(
        &self,
        activity_id: &ObjectId,
        inputs: ParameterValues,
        config: RunConfig,
    ) -> Result<ActivityRun<'_>, ExecutionError> {
        let store = self.store.as_ref();
        let activity = store.activity(activity_id)?;
        let run_id = config
            .run_id
            .clone()
            .unwrap_or_else(|| format!("{activity_id}-run"));

        let mut execution = Execution::new(store, activity, config, run_id.clone());
        if execution.settings.validate_before_run {
            execution.preflight()?;
        }

        execution.emit(RuntimeEventKind::Run(RunEvent::Started {
            run_id: run_id.clone(),
            activity_id: activity_id.clone(),
        }));
        info!(run_id = %run_id, "run_started");

        if let Err(error) = execution.begin(inputs) {
            return Err(execution.fail(error));
        }
        Ok(ActivityRun::new(execution))
    }
}

/// One invocation of an activity inside a run.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) activity: ObjectId,
    pub(crate) caller: Option<CallSite>,
    pub(crate) inputs: BTreeMap<String, Arc<Value>>,
    pub(crate) outputs: ParameterValues,
}

#[derive(Clone, Debug)]
pub(crate) struct CallSite {
    pub(crate) frame: FrameId,
    pub(crate) action: ObjectId,
    pub(crate) inputs: ParameterValues,
    /// The caller's firing, finished when the callee completes.
    pub(crate) firing: Firing,
}

/// Start time and consumed tokens of the firing in progress.
#[derive(Clone, Debug, Default)]
pub(crate) struct Firing {
    started_at: String,
    consumed: Vec<ConsumedToken>,
}

impl Firing {
    fn begin() -> Self {
        Self {
            started_at: timestamp_now(),
            consumed: Vec::new(),
        }
    }
}

/// Mutable state of a single run.
pub(crate) struct Execution<'a> {
    pub(crate) store: &'a dyn ObjectStore,
    root: &'a Activity,
    pub(crate) executor: SharedBehaviorExecutor,
    pub(crate) settings: EngineSettings,
    events: RuntimeEventSink,
    pub(crate) run_id: String,
    started_at: String,
    pub(crate) tokens: TokenState,
    pub(crate) frames: Vec<Frame>,
    /// Callee frames that have not finished yet.
    active_callees: BTreeSet<FrameId>,
    worklist: VecDeque<(FrameId, ObjectId)>,
    pub(crate) seeded: BTreeSet<(FrameId, ObjectId)>,
    pub(crate) blocked: BTreeSet<(FrameId, ObjectId)>,
    /// Root activity nodes that fired at least once.
    completed: BTreeSet<ObjectId>,
    pub(crate) sync_stack: Vec<FrameId>,
    pub(crate) firing: Firing,
    /// Trace step of the latest recorded firing; tokens offered after it
    /// name it as their source.
    producer: Option<usize>,
    trace: Vec<TraceEntry>,
    issues: Vec<ExecutionIssue>,
    steps: usize,
}

impl<'a> Execution<'a> {
    fn new(
        store: &'a dyn ObjectStore,
        root: &'a Activity,
        config: RunConfig,
        run_id: String,
    ) -> Self {
        Self {
            store,
            root,
            executor: config.executor,
            settings: config.settings,
            events: config.events,
            run_id,
            started_at: timestamp_now(),
            tokens: TokenState::new(),
            frames: Vec::new(),
            active_callees: BTreeSet::new(),
            worklist: VecDeque::new(),
            seeded: BTreeSet::new(),
            blocked: BTreeSet::new(),
            completed: BTreeSet::new(),
            sync_stack: Vec::new(),
            firing: Firing::default(),
            producer: None,
            trace: Vec::new(),
            issues: Vec::new(),
            steps: 0,
        }
    }

    /// Rejects activities with well-formedness errors. Permissive runs record
    /// them as issues instead.
    fn preflight(&mut self) -> Result<(), ExecutionError> {
        let diagnostics = validate(self.root, self.store, &[]);
        for diagnostic in diagnostics.iter().filter(|d| !d.is_error()) {
            debug!(rule = %diagnostic.rule, message = %diagnostic.message, "preflight_finding");
        }
        if !diagnostics.iter().any(|d| d.is_error()) {
            return Ok(());
        }
        if !self.settings.permissive {
            return Err(labflow_model::ValidationError::new(diagnostics).into());
        }
        for diagnostic in diagnostics.into_iter().filter(|d| d.is_error()) {
            self.record_issue(ROOT_FRAME, diagnostic.object_id, diagnostic.message);
        }
        Ok(())
    }

    /// Binds the run's inputs and seeds the root frame.
    fn begin(&mut self, inputs: ParameterValues) -> Result<(), ExecutionError> {
        let activity = self.root;
        if let Some(name) = inputs
            .keys()
            .find(|name| activity.signature.input(name).is_none())
        {
            return Err(self.malformed(format!(
                "activity '{}' has no input parameter named '{name}'",
                activity.name()
            )));
        }
        let inputs = inputs
            .into_iter()
            .map(|(name, value)| (name, Arc::new(value)))
            .collect();
        self.start_frame(activity, None, inputs)?;
        self.settle()
    }

    /// Drives the run to quiescence and reports its result.
    pub(crate) async fn complete(&mut self) -> Result<RunResult, ExecutionError> {
        match self.run_to_end().await {
            Ok(result) => {
                self.emit(RuntimeEventKind::Run(RunEvent::Completed {
                    run_id: self.run_id.clone(),
                    activity_id: result.activity.clone(),
                    steps: self.steps,
                }));
                info!(run_id = %self.run_id, steps = self.steps, "run_completed");
                Ok(result)
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    async fn run_to_end(&mut self) -> Result<RunResult, ExecutionError> {
        self.drive().await?;
        self.check_stalled(ROOT_FRAME)?;

        let activity = self.root;
        let outputs = self
            .frames
            .first()
            .map(|frame| frame.outputs.clone())
            .unwrap_or_default();
        let mut completed_normally = true;
        for parameter in activity.signature.required_outputs() {
            if !outputs.contains_key(&parameter.name) {
                completed_normally = false;
                self.record_issue(
                    ROOT_FRAME,
                    None,
                    format!("output parameter '{}' was never produced", parameter.name),
                );
            }
        }

        let status = if self.issues.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::PartialSuccess
        };
        Ok(RunResult {
            run_id: self.run_id.clone(),
            activity: activity.id().clone(),
            status,
            outputs,
            completed_normally,
            started_at: self.started_at.clone(),
            ended_at: timestamp_now(),
            completed_nodes: self.completed.iter().cloned().collect(),
            trace: std::mem::take(&mut self.trace),
            issues: std::mem::take(&mut self.issues),
        })
    }

    /// Reports a run-ending error and hands it back.
    pub(crate) fn fail(&mut self, error: ExecutionError) -> ExecutionError {
        self.emit(RuntimeEventKind::Run(RunEvent::Failed {
            run_id: self.run_id.clone(),
            activity_id: self.root.id().clone(),
            reason: error.to_string(),
        }));
        warn!(run_id = %self.run_id, error = %error, "run_failed");
        error
    }

    /// Creates a frame for `activity` and seeds its initiating nodes.
    pub(crate) fn start_frame(
        &mut self,
        activity: &'a Activity,
        caller: Option<CallSite>,
        mut inputs: BTreeMap<String, Arc<Value>>,
    ) -> Result<FrameId, ExecutionError> {
        if let Some(initial) = activity
            .initial_nodes()
            .find(|node| activity.incoming_edges(&node.id).next().is_some())
        {
            return Err(self.malformed(format!(
                "initial node '{}' has incoming edges",
                initial.id
            )));
        }

        let frame = self.frames.len() as FrameId;
        let mut seeds = Vec::new();
        for node in activity.initiating_nodes() {
            let Some(parameter_node) = node.as_parameter() else {
                seeds.push(node.id.clone());
                continue;
            };
            let name = parameter_node.parameter.as_str();
            if !inputs.contains_key(name) {
                let parameter = activity.signature.input(name);
                if let Some(default) = parameter.and_then(|p| p.default_value.clone()) {
                    inputs.insert(name.to_string(), Arc::new(default));
                } else if parameter.is_none_or(|p| p.required()) {
                    if !self.settings.permissive {
                        return Err(ExecutionError::MissingRequiredValue {
                            node: node.id.clone(),
                            names: vec![name.to_string()],
                            tokens: self.tokens.snapshot(),
                        });
                    }
                    self.record_issue(
                        frame,
                        Some(node.id.clone()),
                        format!("input parameter '{name}' has no value; using null"),
                    );
                    inputs.insert(name.to_string(), Arc::new(Value::Null));
                } else {
                    continue;
                }
            }
            seeds.push(node.id.clone());
        }

        debug!(
            frame,
            activity = %activity.id(),
            seeds = seeds.len(),
            "frame_started"
        );
        if caller.is_some() {
            self.active_callees.insert(frame);
        }
        self.frames.push(Frame {
            activity: activity.id().clone(),
            caller,
            inputs,
            outputs: ParameterValues::new(),
        });
        for node in seeds {
            if !self.seeded.insert((frame, node.clone())) {
                return Err(self.malformed(format!("node '{node}' received a second start token")));
            }
            self.schedule(activity, frame, &node)?;
        }
        Ok(frame)
    }

    async fn drive(&mut self) -> Result<(), ExecutionError> {
        loop {
            self.settle()?;
            let Some((frame, node_id)) = self.next_ready() else {
                return Ok(());
            };
            self.fire_ready(frame, &node_id, None).await?;
        }
    }

    /// Fires a dequeued node if it is still enabled and queues it again when
    /// it can fire once more.
    async fn fire_ready(
        &mut self,
        frame: FrameId,
        node_id: &ObjectId,
        outputs: Option<ParameterValues>,
    ) -> Result<(), ExecutionError> {
        let activity = self.frame_activity(frame)?;
        let Some(node) = activity.node(node_id) else {
            return Err(self.malformed(format!("scheduled node '{node_id}' does not exist")));
        };
        if self.blocked.contains(&(frame, node_id.clone()))
            || !self.is_enabled(activity, frame, node)?
        {
            return Ok(());
        }

        self.steps += 1;
        if self.settings.max_steps > 0 && self.steps > self.settings.max_steps {
            return Err(ExecutionError::StepLimitExceeded {
                limit: self.settings.max_steps,
                tokens: self.tokens.snapshot(),
            });
        }
        self.firing = Firing::begin();
        self.fire(activity, frame, node, outputs).await?;
        self.schedule(activity, frame, node_id)
    }

    fn next_ready(&mut self) -> Option<(FrameId, ObjectId)> {
        let position = match self.sync_stack.last() {
            Some(top) => self.worklist.iter().position(|(frame, _)| frame == top),
            None if self.worklist.is_empty() => None,
            None => Some(0),
        };
        position.and_then(|index| self.worklist.remove(index))
    }

    /// Queued nodes the scheduler may fire next, in queue order.
    pub(crate) fn ready_nodes(&self) -> Vec<ReadyNode> {
        self.worklist
            .iter()
            .filter(|(frame, node_id)| self.is_ready(*frame, node_id))
            .filter_map(|(frame, node_id)| {
                let node = self.frame_activity(*frame).ok()?.node(node_id)?;
                Some(self.ready_node(*frame, node))
            })
            .collect()
    }

    fn is_ready(&self, frame: FrameId, node_id: &ObjectId) -> bool {
        if self.sync_stack.last().is_some_and(|top| *top != frame)
            || self.blocked.contains(&(frame, node_id.clone()))
            || !self.worklist.contains(&(frame, node_id.clone()))
        {
            return false;
        }
        let Ok(activity) = self.frame_activity(frame) else {
            return false;
        };
        activity
            .node(node_id)
            .is_some_and(|node| matches!(self.is_enabled(activity, frame, node), Ok(true)))
    }

    fn ready_node(&self, frame: FrameId, node: &ActivityNode) -> ReadyNode {
        let behavior = node.as_call().map(|call| call.behavior.clone());
        let expects_outputs = behavior.as_ref().is_some_and(|behavior| {
            matches!(
                self.store.behavior(behavior),
                Ok(Behavior::Primitive(signature)) if signature.outputs().next().is_some()
            )
        });
        ReadyNode {
            frame,
            node: node.id.clone(),
            node_type: node.type_name().to_string(),
            label: self.label(node),
            behavior,
            expects_outputs,
        }
    }

    /// Fires one ready node chosen by the caller. `outputs` stand in for the
    /// behavior result of a call action.
    pub(crate) async fn step_node(
        &mut self,
        frame: FrameId,
        node_id: &ObjectId,
        outputs: Option<ParameterValues>,
    ) -> Result<(), ExecutionError> {
        if !self.is_ready(frame, node_id) {
            return Err(self.malformed(format!(
                "node '{node_id}' is not ready to fire in frame {frame}"
            )));
        }
        let key = (frame, node_id.clone());
        self.worklist.retain(|queued| queued != &key);
        self.fire_ready(frame, node_id, outputs).await?;
        self.settle()
    }

    /// Completes every callee frame that can make no further progress.
    fn settle(&mut self) -> Result<(), ExecutionError> {
        loop {
            let ready = self
                .active_callees
                .iter()
                .rev()
                .copied()
                .find(|frame| self.is_quiescent(*frame));
            let Some(frame) = ready else {
                return Ok(());
            };
            self.finish_frame(frame)?;
        }
    }

    fn is_quiescent(&self, frame: FrameId) -> bool {
        !self.worklist.iter().any(|(queued, _)| *queued == frame)
            && !self.active_callees.iter().any(|child| {
                self.frames
                    .get(*child as usize)
                    .and_then(|state| state.caller.as_ref())
                    .is_some_and(|caller| caller.frame == frame)
            })
    }

    /// Returns a callee's outputs to its caller and unblocks it.
    fn finish_frame(&mut self, frame: FrameId) -> Result<(), ExecutionError> {
        self.check_stalled(frame)?;
        self.active_callees.remove(&frame);
        self.sync_stack.retain(|active| *active != frame);
        self.seeded.retain(|(seeded, _)| *seeded != frame);
        let Some(state) = self.frames.get_mut(frame as usize) else {
            return Err(self.malformed(format!("frame {frame} does not exist")));
        };
        state.inputs.clear();
        let caller = state.caller.take();
        let outputs = std::mem::take(&mut state.outputs);

        let Some(caller) = caller else {
            return Ok(());
        };
        debug!(frame, caller_frame = caller.frame, action = %caller.action, "frame_finished");
        let activity = self.frame_activity(caller.frame)?;
        let Some(action) = activity.node(&caller.action) else {
            return Err(self.malformed(format!("caller '{}' does not exist", caller.action)));
        };
        self.blocked.remove(&(caller.frame, caller.action.clone()));
        self.firing = caller.firing;
        self.complete_action(activity, caller.frame, action, caller.inputs, outputs, false)?;
        if let Some(call) = action.as_call() {
            self.emit(RuntimeEventKind::Call(CallEvent::Completed {
                run_id: self.run_id.clone(),
                frame: caller.frame,
                node_id: caller.action.clone(),
                behavior_id: call.behavior.clone(),
            }));
        }
        self.schedule(activity, caller.frame, &caller.action)
    }

    /// Fails the run when an action holds its control tokens but can never
    /// receive a required input.
    fn check_stalled(&self, frame: FrameId) -> Result<(), ExecutionError> {
        if self.settings.permissive {
            return Ok(());
        }
        let activity = self.frame_activity(frame)?;
        for node in activity.nodes.values() {
            let Some(call) = node.as_call() else {
                continue;
            };
            if self.blocked.contains(&(frame, node.id.clone()))
                || !self.has_arrivals(activity, frame, &node.id)
                || !self.control_ready(activity, frame, &node.id)
            {
                continue;
            }
            let missing = self.missing_inputs(activity, frame, call)?;
            if !missing.is_empty() {
                return Err(ExecutionError::MissingRequiredValue {
                    node: node.id.clone(),
                    names: missing,
                    tokens: self.tokens.snapshot(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn frame_activity(&self, frame: FrameId) -> Result<&'a Activity, ExecutionError> {
        let store = self.store;
        let Some(state) = self.frames.get(frame as usize) else {
            return Err(self.malformed(format!("frame {frame} does not exist")));
        };
        Ok(store.activity(&state.activity)?)
    }

    /// Queues `node` when it is enabled, not blocked and not already queued.
    pub(crate) fn schedule(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node_id: &ObjectId,
    ) -> Result<(), ExecutionError> {
        let key = (frame, node_id.clone());
        if self.blocked.contains(&key) || self.worklist.contains(&key) {
            return Ok(());
        }
        let Some(node) = activity.node(node_id) else {
            return Ok(());
        };
        if self.is_enabled(activity, frame, node)? {
            self.worklist.push_back(key);
        }
        Ok(())
    }

    fn is_enabled(
        &self,
        activity: &Activity,
        frame: FrameId,
        node: &ActivityNode,
    ) -> Result<bool, ExecutionError> {
        let any_arrival = || {
            activity
                .incoming_edges(&node.id)
                .any(|edge| self.tokens.has(frame, &edge.id))
        };
        Ok(match &node.kind {
            NodeKind::Initial => self.seeded.contains(&(frame, node.id.clone())),
            NodeKind::Parameter(parameter) if parameter.direction == Direction::In => {
                self.seeded.contains(&(frame, node.id.clone()))
            }
            NodeKind::Parameter(_) | NodeKind::Final | NodeKind::Fork | NodeKind::Merge => {
                any_arrival()
            }
            NodeKind::Join => self.join_enabled(activity, frame, node),
            NodeKind::Decision(_) => self.decision_enabled(activity, frame, node),
            NodeKind::CallBehavior(call) => self.action_enabled(activity, frame, node, call)?,
        })
    }

    async fn fire(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node: &'a ActivityNode,
        outputs: Option<ParameterValues>,
    ) -> Result<(), ExecutionError> {
        debug!(frame, node = %node.id, node_type = node.type_name(), "node_firing");
        if outputs.is_some() && node.as_call().is_none() {
            debug!(node = %node.id, "supplied_outputs_ignored");
        }
        match &node.kind {
            NodeKind::Initial => self.fire_initial(activity, frame, node),
            NodeKind::Final => self.fire_final(activity, frame, node),
            NodeKind::Fork => self.fire_fork(activity, frame, node),
            NodeKind::Join => self.fire_join(activity, frame, node),
            NodeKind::Merge => self.fire_merge(activity, frame, node),
            NodeKind::Decision(decision) => self.fire_decision(activity, frame, node, decision),
            NodeKind::Parameter(parameter) => {
                self.fire_parameter(activity, frame, node, parameter)
            }
            NodeKind::CallBehavior(call) => {
                self.fire_action(activity, frame, node, call, outputs).await
            }
        }
    }

    /// Places a token on `edge` and re-evaluates the node it enters.
    pub(crate) fn offer(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        edge: &ActivityEdge,
        token: Token,
    ) -> Result<(), ExecutionError> {
        self.tokens
            .push_from(frame, &edge.id, token.for_edge(edge.kind), self.producer);
        let target = activity.unpin(&edge.target);
        self.schedule(activity, frame, &target)
    }

    /// Sends `token` along every outgoing edge of `source`.
    pub(crate) fn offer_all(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        source: &ObjectId,
        token: &Token,
    ) -> Result<(), ExecutionError> {
        for edge in activity.outgoing_edges(source) {
            self.offer(activity, frame, edge, token.clone())?;
        }
        Ok(())
    }

    /// Pops the oldest token on `edge`, noting it as consumed by the current
    /// firing.
    pub(crate) fn consume(&mut self, frame: FrameId, edge: &ObjectId) -> Option<Token> {
        let (token, source) = self.tokens.take(frame, edge)?;
        self.firing.consumed.push(ConsumedToken {
            edge: edge.clone(),
            source,
        });
        Some(token)
    }

    /// Pops one token from the first incoming edge of `target` that has one.
    pub(crate) fn take_first(
        &mut self,
        activity: &Activity,
        frame: FrameId,
        target: &ObjectId,
    ) -> Option<Token> {
        let edge = activity
            .incoming_edges(target)
            .find(|edge| self.tokens.has(frame, &edge.id))?;
        self.consume(frame, &edge.id)
    }

    pub(crate) fn record(
        &mut self,
        activity: &Activity,
        frame: FrameId,
        node: &ActivityNode,
        inputs: ParameterValues,
        outputs: ParameterValues,
    ) {
        let label = self.label(node);
        let firing = std::mem::take(&mut self.firing);
        let ended_at = timestamp_now();
        let started_at = if firing.started_at.is_empty() {
            ended_at.clone()
        } else {
            firing.started_at
        };
        if frame == ROOT_FRAME {
            self.completed.insert(node.id.clone());
        }
        let step = self.trace.len();
        self.producer = Some(step);
        self.trace.push(TraceEntry {
            step,
            frame,
            activity: activity.id().clone(),
            node: node.id.clone(),
            node_type: node.type_name().to_string(),
            label,
            inputs,
            outputs,
            consumed: firing.consumed,
            started_at,
            ended_at,
        });
        self.emit(RuntimeEventKind::Node(NodeEvent::Fired {
            run_id: self.run_id.clone(),
            frame,
            node_id: node.id.clone(),
            node_type: node.type_name().to_string(),
        }));
    }

    pub(crate) fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    fn label(&self, node: &ActivityNode) -> String {
        match &node.kind {
            NodeKind::Initial => "initial".to_string(),
            NodeKind::Final => "final".to_string(),
            NodeKind::Fork => "fork".to_string(),
            NodeKind::Join => "join".to_string(),
            NodeKind::Merge => "merge".to_string(),
            NodeKind::Decision(_) => "decision".to_string(),
            NodeKind::Parameter(parameter) => parameter.parameter.clone(),
            NodeKind::CallBehavior(call) => self
                .store
                .behavior(&call.behavior)
                .map(|behavior| behavior.name().to_string())
                .unwrap_or_else(|_| call.behavior.local_name().to_string()),
        }
    }

    pub(crate) fn record_issue(
        &mut self,
        frame: FrameId,
        node: Option<ObjectId>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        warn!(frame, node = ?node, message = %message, "execution_issue");
        self.emit(RuntimeEventKind::Node(NodeEvent::IssueRecorded {
            run_id: self.run_id.clone(),
            frame,
            node_id: node.clone(),
            message: message.clone(),
        }));
        self.issues.push(ExecutionIssue {
            severity: Severity::Warning,
            frame,
            node,
            message,
        });
    }

    pub(crate) fn malformed(&self, message: impl Into<String>) -> ExecutionError {
        ExecutionError::MalformedRun {
            message: message.into(),
            tokens: self.tokens.snapshot(),
        }
    }

    pub(crate) fn emit(&self, kind: RuntimeEventKind) {
        self.events.publish(kind);
    }

    pub(crate) fn invocation_mode(&self) -> InvocationMode {
        self.settings.invocation_mode
    }
}
