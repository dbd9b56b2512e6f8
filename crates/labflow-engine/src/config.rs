use crate::{NoopBehaviorExecutor, RuntimeEventSink, SharedBehaviorExecutor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a call to an activity-valued behavior is resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    /// The callee runs to completion before anything else fires.
    #[default]
    Synchronous,
    /// The caller blocks and the callee's nodes interleave with the rest of
    /// the run until its completion unblocks the caller.
    Asynchronous,
}

impl InvocationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Synchronous => "synchronous",
            Self::Asynchronous => "asynchronous",
        }
    }
}

/// Serializable engine knobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Treat unmet required inputs as null instead of failing the run.
    pub permissive: bool,
    pub invocation_mode: InvocationMode,
    /// Upper bound on node firings per run; 0 disables the limit.
    pub max_steps: usize,
    pub validate_before_run: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            permissive: false,
            invocation_mode: InvocationMode::Synchronous,
            max_steps: 10_000,
            validate_before_run: true,
        }
    }
}

#[derive(Clone)]
pub struct RunConfig {
    pub run_id: Option<String>,
    pub settings: EngineSettings,
    pub events: RuntimeEventSink,
    pub executor: SharedBehaviorExecutor,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: None,
            settings: EngineSettings::default(),
            events: RuntimeEventSink::default(),
            executor: Arc::new(NoopBehaviorExecutor),
        }
    }
}

impl RunConfig {
    pub fn with_executor(executor: SharedBehaviorExecutor) -> Self {
        Self {
            executor,
            ..Self::default()
        }
    }

    pub fn permissive(mut self) -> Self {
        self.settings.permissive = true;
        self
    }

    pub fn invocation_mode(mut self, mode: InvocationMode) -> Self {
        self.settings.invocation_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_settings_defaults_expected_strict_synchronous() {
        let settings = EngineSettings::default();
        assert!(!settings.permissive);
        assert_eq!(settings.invocation_mode, InvocationMode::Synchronous);
        assert_eq!(settings.max_steps, 10_000);
        assert!(settings.validate_before_run);
    }

    #[test]
    fn engine_settings_partial_json_expected_defaults_filled() {
        let settings: EngineSettings = serde_json::from_str(
            r#"{ "permissive": true, "invocation_mode": "asynchronous" }"#,
        )
        .expect("settings should parse");
        assert!(settings.permissive);
        assert_eq!(settings.invocation_mode, InvocationMode::Asynchronous);
        assert_eq!(settings.max_steps, 10_000);
    }
}
