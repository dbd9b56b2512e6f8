use crate::engine::Execution;
use crate::{ExecutionError, FrameId, ParameterValues, Token};
use labflow_model::{Activity, ActivityNode, ActivityParameterNode, Direction};
use std::sync::Arc;
use tracing::debug;

impl<'a> Execution<'a> {
    pub(crate) fn fire_parameter(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node: &ActivityNode,
        parameter: &ActivityParameterNode,
    ) -> Result<(), ExecutionError> {
        match parameter.direction {
            Direction::In => self.emit_input(activity, frame, node, parameter),
            Direction::Out => self.capture_output(activity, frame, node, parameter),
        }
    }

    /// Sends the bound value, shared rather than copied, along every outflow.
    fn emit_input(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node: &ActivityNode,
        parameter: &ActivityParameterNode,
    ) -> Result<(), ExecutionError> {
        self.seeded.remove(&(frame, node.id.clone()));
        let Some(value) = self
            .frames
            .get(frame as usize)
            .and_then(|state| state.inputs.get(&parameter.parameter))
            .cloned()
        else {
            return Err(self.malformed(format!(
                "input parameter '{}' fired without a value",
                parameter.parameter
            )));
        };
        self.record(
            activity,
            frame,
            node,
            ParameterValues::new(),
            ParameterValues::from([(parameter.parameter.clone(), value.as_ref().clone())]),
        );
        self.offer_all(activity, frame, &node.id, &Token::Data(Arc::clone(&value)))
    }

    /// Keeps the arriving value as the frame's result for this parameter; a
    /// callee frame hands it back to the caller's matching output pin.
    fn capture_output(
        &mut self,
        activity: &'a Activity,
        frame: FrameId,
        node: &ActivityNode,
        parameter: &ActivityParameterNode,
    ) -> Result<(), ExecutionError> {
        let Some(token) = self.take_first(activity, frame, &node.id) else {
            return Err(self.malformed(format!(
                "output parameter '{}' fired without a token",
                parameter.parameter
            )));
        };
        let value = token.shared_value().as_ref().clone();
        let Some(state) = self.frames.get_mut(frame as usize) else {
            return Err(self.malformed(format!("frame {frame} does not exist")));
        };
        if state
            .outputs
            .insert(parameter.parameter.clone(), value.clone())
            .is_some()
        {
            debug!(frame, parameter = %parameter.parameter, "output_value_replaced");
        }
        if let Some(caller) = state.caller.as_ref() {
            debug!(
                frame,
                caller = %caller.action,
                parameter = %parameter.parameter,
                "return_value_routed"
            );
        }
        self.record(
            activity,
            frame,
            node,
            ParameterValues::from([(parameter.parameter.clone(), value)]),
            ParameterValues::new(),
        );
        Ok(())
    }
}
