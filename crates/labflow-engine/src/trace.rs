use crate::{FrameId, ParameterValues};
use labflow_model::{ObjectId, Severity};
use serde::{Deserialize, Serialize};

/// A token a firing consumed: the edge it arrived on and, when it was
/// produced by an earlier firing, that firing's trace step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedToken {
    pub edge: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<usize>,
}

/// One node firing, in the order the run completed it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: usize,
    pub frame: FrameId,
    pub activity: ObjectId,
    pub node: ObjectId,
    pub node_type: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "ParameterValues::is_empty")]
    pub inputs: ParameterValues,
    #[serde(default, skip_serializing_if = "ParameterValues::is_empty")]
    pub outputs: ParameterValues,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed: Vec<ConsumedToken>,
    /// When the node began firing. For calls to activities this is when the
    /// callee started, so it precedes the callee's own entries.
    pub started_at: String,
    pub ended_at: String,
}

impl TraceEntry {
    /// Steps of the firings whose tokens this one consumed, in consumption
    /// order and without repeats.
    pub fn predecessor_steps(&self) -> Vec<usize> {
        let mut steps = Vec::new();
        for step in self.consumed.iter().filter_map(|token| token.source) {
            if !steps.contains(&step) {
                steps.push(step);
            }
        }
        steps
    }
}

/// A non-fatal problem met while running in permissive mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionIssue {
    pub severity: Severity,
    pub frame: FrameId,
    pub node: Option<ObjectId>,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Finished, but only by relaxing at least one requirement.
    PartialSuccess,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub activity: ObjectId,
    pub status: RunStatus,
    pub outputs: ParameterValues,
    /// Every required output parameter of the root activity has a value.
    pub completed_normally: bool,
    pub started_at: String,
    pub ended_at: String,
    /// Distinct nodes of the root activity that fired at least once.
    pub completed_nodes: Vec<ObjectId>,
    pub trace: Vec<TraceEntry>,
    pub issues: Vec<ExecutionIssue>,
}

impl RunResult {
    pub fn labels(&self) -> Vec<&str> {
        self.trace.iter().map(|entry| entry.label.as_str()).collect()
    }

    /// Trace entries of the root invocation only.
    pub fn root_trace(&self) -> impl Iterator<Item = &TraceEntry> {
        self.trace.iter().filter(|entry| entry.frame == crate::ROOT_FRAME)
    }

    pub fn fired(&self, node: &ObjectId) -> usize {
        self.trace.iter().filter(|entry| &entry.node == node).count()
    }

    pub fn position(&self, node: &ObjectId) -> Option<usize> {
        self.trace.iter().position(|entry| &entry.node == node)
    }

    /// Entries whose tokens the firing at `step` consumed.
    pub fn predecessors(&self, step: usize) -> Vec<&TraceEntry> {
        self.trace
            .get(step)
            .map(|entry| {
                entry
                    .predecessor_steps()
                    .into_iter()
                    .filter_map(|source| self.trace.get(source))
                    .collect()
            })
            .unwrap_or_default()
    }
}
