use labflow_model::{EdgeKind, ObjectId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Index of one activity invocation within a run. The root invocation is 0.
pub type FrameId = u32;

pub const ROOT_FRAME: FrameId = 0;

/// A unit of control or data in transit on one edge.
///
/// Data tokens share their value; fanning one value out aliases it.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Control,
    Data(Arc<Value>),
}

impl Token {
    pub fn data(value: Value) -> Self {
        Self::Data(Arc::new(value))
    }

    pub fn value(&self) -> Option<&Arc<Value>> {
        match self {
            Self::Data(value) => Some(value),
            Self::Control => None,
        }
    }

    /// The value a consumer reads; control tokens read as null.
    pub fn shared_value(&self) -> Arc<Value> {
        match self {
            Self::Data(value) => Arc::clone(value),
            Self::Control => Arc::new(Value::Null),
        }
    }

    /// The token to place on an edge of `kind`: control flows never carry data.
    pub fn for_edge(&self, kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Control => Self::Control,
            EdgeKind::Object => self.clone(),
        }
    }
}

/// Queued tokens for every (frame, edge) pair of one run, each remembering
/// the trace step of the firing that produced it.
#[derive(Debug, Default)]
pub struct TokenState {
    queues: BTreeMap<(FrameId, ObjectId), VecDeque<(Token, Option<usize>)>>,
}

impl TokenState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: FrameId, edge: &ObjectId, token: Token) {
        self.push_from(frame, edge, token, None);
    }

    pub fn push_from(
        &mut self,
        frame: FrameId,
        edge: &ObjectId,
        token: Token,
        source: Option<usize>,
    ) {
        self.queues
            .entry((frame, edge.clone()))
            .or_default()
            .push_back((token, source));
    }

    pub fn pop(&mut self, frame: FrameId, edge: &ObjectId) -> Option<Token> {
        self.take(frame, edge).map(|(token, _)| token)
    }

    /// Pops the oldest token together with the step that produced it.
    pub fn take(&mut self, frame: FrameId, edge: &ObjectId) -> Option<(Token, Option<usize>)> {
        let key = (frame, edge.clone());
        let queue = self.queues.get_mut(&key)?;
        let queued = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(&key);
        }
        queued
    }

    pub fn has(&self, frame: FrameId, edge: &ObjectId) -> bool {
        self.count(frame, edge) > 0
    }

    pub fn count(&self, frame: FrameId, edge: &ObjectId) -> usize {
        self.queues
            .get(&(frame, edge.clone()))
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        let queued = self
            .queues
            .iter()
            .map(|((frame, edge), tokens)| QueuedTokens {
                frame: *frame,
                edge: edge.clone(),
                values: tokens
                    .iter()
                    .map(|(token, _)| token.value().map(|value| value.as_ref().clone()))
                    .collect(),
            })
            .collect();
        TokenSnapshot { queued }
    }
}

/// Tokens still queued when a run stopped. `None` marks a control token.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub queued: Vec<QueuedTokens>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueuedTokens {
    pub frame: FrameId,
    pub edge: ObjectId,
    pub values: Vec<Option<Value>>,
}

impl TokenSnapshot {
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    pub fn count(&self) -> usize {
        self.queued.iter().map(|queued| queued.values.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_state_queues_are_fifo_per_frame_and_edge() {
        let edge = ObjectId::new("p/ObjectFlow1");
        let mut state = TokenState::new();
        state.push(ROOT_FRAME, &edge, Token::data(json!(1)));
        state.push(ROOT_FRAME, &edge, Token::data(json!(2)));
        state.push(1, &edge, Token::Control);

        assert_eq!(state.count(ROOT_FRAME, &edge), 2);
        assert_eq!(state.pop(ROOT_FRAME, &edge), Some(Token::data(json!(1))));
        assert_eq!(state.snapshot().count(), 2);
        assert_eq!(state.pop(ROOT_FRAME, &edge), Some(Token::data(json!(2))));
        assert!(!state.has(ROOT_FRAME, &edge));
        assert!(state.has(1, &edge));
    }

    #[test]
    fn token_state_take_expected_producing_step_kept_per_token() {
        let edge = ObjectId::new("p/ObjectFlow1");
        let mut state = TokenState::new();
        state.push_from(ROOT_FRAME, &edge, Token::data(json!("a")), Some(4));
        state.push(ROOT_FRAME, &edge, Token::Control);

        assert_eq!(
            state.take(ROOT_FRAME, &edge),
            Some((Token::data(json!("a")), Some(4)))
        );
        assert_eq!(state.take(ROOT_FRAME, &edge), Some((Token::Control, None)));
        assert!(state.is_empty());
    }

    #[test]
    fn token_for_control_edge_expected_value_dropped() {
        let token = Token::data(json!({"plate": "A"}));
        assert_eq!(token.for_edge(EdgeKind::Control), Token::Control);
        let aliased = token.for_edge(EdgeKind::Object);
        let (Some(left), Some(right)) = (token.value(), aliased.value()) else {
            panic!("data tokens expected");
        };
        assert!(Arc::ptr_eq(left, right));
    }
}
