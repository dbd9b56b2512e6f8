use crate::BehaviorError;
use async_trait::async_trait;
use labflow_model::Signature;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Parameter name to value, for one invocation.
pub type ParameterValues = BTreeMap<String, Value>;

/// Executes primitive behaviors on behalf of the engine.
#[async_trait]
pub trait BehaviorExecutor: Send + Sync {
    async fn invoke(
        &self,
        behavior: &Signature,
        inputs: &ParameterValues,
    ) -> Result<ParameterValues, BehaviorError>;
}

pub type SharedBehaviorExecutor = Arc<dyn BehaviorExecutor>;

/// Returns null for every declared output.
#[derive(Debug, Default)]
pub struct NoopBehaviorExecutor;

#[async_trait]
impl BehaviorExecutor for NoopBehaviorExecutor {
    async fn invoke(
        &self,
        behavior: &Signature,
        _inputs: &ParameterValues,
    ) -> Result<ParameterValues, BehaviorError> {
        Ok(behavior
            .outputs()
            .map(|parameter| (parameter.name.clone(), Value::Null))
            .collect())
    }
}

/// A synchronous primitive implementation.
pub trait PrimitiveBehavior: Send + Sync {
    fn compute(&self, inputs: &ParameterValues) -> Result<ParameterValues, BehaviorError>;
}

impl<F> PrimitiveBehavior for F
where
    F: Fn(&ParameterValues) -> Result<ParameterValues, BehaviorError> + Send + Sync,
{
    fn compute(&self, inputs: &ParameterValues) -> Result<ParameterValues, BehaviorError> {
        self(inputs)
    }
}

pub type SharedPrimitiveBehavior = Arc<dyn PrimitiveBehavior>;

/// Primitive implementations keyed by behavior id, falling back to name.
#[derive(Default)]
pub struct BehaviorRegistry {
    behaviors: BTreeMap<String, SharedPrimitiveBehavior>,
    fallback: Option<SharedPrimitiveBehavior>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        key: impl Into<String>,
        behavior: SharedPrimitiveBehavior,
    ) -> Option<SharedPrimitiveBehavior> {
        self.behaviors.insert(key.into(), behavior)
    }

    pub fn set_fallback(&mut self, behavior: SharedPrimitiveBehavior) {
        self.fallback = Some(behavior);
    }

    pub fn resolve(&self, behavior: &Signature) -> Option<SharedPrimitiveBehavior> {
        self.behaviors
            .get(behavior.id.as_str())
            .or_else(|| self.behaviors.get(&behavior.name))
            .or(self.fallback.as_ref())
            .cloned()
    }
}

pub struct RegistryBehaviorExecutor {
    pub registry: BehaviorRegistry,
}

impl RegistryBehaviorExecutor {
    pub fn new(registry: BehaviorRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl BehaviorExecutor for RegistryBehaviorExecutor {
    async fn invoke(
        &self,
        behavior: &Signature,
        inputs: &ParameterValues,
    ) -> Result<ParameterValues, BehaviorError> {
        let implementation = self
            .registry
            .resolve(behavior)
            .ok_or_else(|| BehaviorError::Unregistered(behavior.name.clone()))?;
        implementation.compute(inputs)
    }
}
