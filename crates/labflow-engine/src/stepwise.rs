use crate::engine::Execution;
use crate::{ExecutionError, FrameId, ParameterValues, RunResult, TraceEntry};
use labflow_model::ObjectId;
use serde::{Deserialize, Serialize};

/// A node that may fire next in a stepwise run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyNode {
    pub frame: FrameId,
    pub node: ObjectId,
    pub node_type: String,
    pub label: String,
    /// Behavior invoked when the node is a call action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<ObjectId>,
    /// A call to a primitive that declares outputs. [`ActivityRun::advance`]
    /// stops at these and leaves them to the caller.
    pub expects_outputs: bool,
}

/// A run advanced by its caller, one firing at a time.
///
/// Created by [`crate::ExecutionEngine::start`]. Errors end the run: a failed
/// step reports a failed run and the handle should be dropped.
pub struct ActivityRun<'e> {
    execution: Execution<'e>,
}

impl<'e> ActivityRun<'e> {
    pub(crate) fn new(execution: Execution<'e>) -> Self {
        Self { execution }
    }

    pub fn run_id(&self) -> &str {
        &self.execution.run_id
    }

    /// Nodes that may fire now, in scheduling order. While a synchronous
    /// call is in progress only the callee's nodes are listed.
    pub fn ready(&self) -> Vec<ReadyNode> {
        self.execution.ready_nodes()
    }

    /// Firings so far.
    pub fn trace(&self) -> &[TraceEntry] {
        self.execution.trace()
    }

    /// Fires one ready node and returns what is ready afterwards.
    ///
    /// For a call action, `outputs` replace the behavior's result: neither
    /// the executor nor a callee activity runs, and the values are placed on
    /// the action's output pins. Other node kinds ignore them.
    pub async fn step(
        &mut self,
        node: &ReadyNode,
        outputs: Option<ParameterValues>,
    ) -> Result<Vec<ReadyNode>, ExecutionError> {
        if let Err(error) = self
            .execution
            .step_node(node.frame, &node.node, outputs)
            .await
        {
            return Err(self.execution.fail(error));
        }
        Ok(self.ready())
    }

    /// Fires ready nodes until only calls that expect outputs from the
    /// caller remain, and returns those.
    pub async fn advance(&mut self) -> Result<Vec<ReadyNode>, ExecutionError> {
        loop {
            let ready = self.ready();
            let Some(next) = ready.iter().find(|node| !node.expects_outputs) else {
                return Ok(ready);
            };
            self.step(next, None).await?;
        }
    }

    /// Fires everything that remains and reports the run's result.
    pub async fn finish(mut self) -> Result<RunResult, ExecutionError> {
        self.execution.complete().await
    }
}
