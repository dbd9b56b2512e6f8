use crate::engine::Execution;
use crate::{ExecutionError, FrameId, ParameterValues, Token};
use labflow_model::{Activity, ActivityNode};

impl<'a> Execution<'a> {
    pub(crate) fn fire_initial(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node: &ActivityNode,
    ) -> Result<(), ExecutionError> {
        if !self.seeded.remove(&(frame, node.id.clone())) {
            return Err(self.malformed(format!(
                "initial node '{}' fired without a start token",
                node.id
            )));
        }
        self.record(activity, frame, node, ParameterValues::new(), ParameterValues::new());
        self.offer_all(activity, frame, &node.id, &Token::Control)
    }

    /// Consumes one arriving token and ends that branch.
    pub(crate) fn fire_final(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node: &ActivityNode,
    ) -> Result<(), ExecutionError> {
        self.take_first(activity, frame, &node.id);
        self.record(activity, frame, node, ParameterValues::new(), ParameterValues::new());
        Ok(())
    }

    pub(crate) fn fire_fork(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node: &ActivityNode,
    ) -> Result<(), ExecutionError> {
        let Some(token) = self.take_first(activity, frame, &node.id) else {
            return Err(self.malformed(format!("fork '{}' fired without a token", node.id)));
        };
        self.record(activity, frame, node, ParameterValues::new(), ParameterValues::new());
        self.offer_all(activity, frame, &node.id, &token)
    }

    pub(crate) fn join_enabled(
        &self,
        activity: &Activity,
        frame: FrameId,
        node: &ActivityNode,
    ) -> bool {
        let mut incoming = activity.incoming_edges(&node.id).peekable();
        incoming.peek().is_some() && incoming.all(|edge| self.tokens.has(frame, &edge.id))
    }

    /// Consumes one token per incoming edge and forwards a single token,
    /// carrying the first data value among them.
    pub(crate) fn fire_join(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node: &ActivityNode,
    ) -> Result<(), ExecutionError> {
        let mut forwarded = Token::Control;
        for edge in activity.incoming_edges(&node.id) {
            let token = self.consume(frame, &edge.id);
            if matches!(forwarded, Token::Control) {
                if let Some(data @ Token::Data(_)) = token {
                    forwarded = data;
                }
            }
        }
        self.record(activity, frame, node, ParameterValues::new(), ParameterValues::new());
        self.offer_all(activity, frame, &node.id, &forwarded)
    }

    /// Forwards each arriving token without synchronizing.
    pub(crate) fn fire_merge(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node: &ActivityNode,
    ) -> Result<(), ExecutionError> {
        let Some(token) = self.take_first(activity, frame, &node.id) else {
            return Err(self.malformed(format!("merge '{}' fired without a token", node.id)));
        };
        self.record(activity, frame, node, ParameterValues::new(), ParameterValues::new());
        self.offer_all(activity, frame, &node.id, &token)
    }
}
