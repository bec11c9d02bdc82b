//! Plugin-based runner registry
//!
//! The registry maps runner type names to factories, so the runner used by
//! the engine is picked from configuration instead of a hardcoded match.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use feedpipe_core::registry::RunnerRegistry;
//! use feedpipe_core::config::RunnerConfig;
//!
//! let registry = RunnerRegistry::with_builtin();
//! registry.register_runner("scripted", Box::new(ScriptedRunnerFactory));
//!
//! let runner = registry.create_runner(&config.runner)?;
//! ```

use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use crate::runner::PassthroughRunnerFactory;
use crate::traits::{TaskRunner, TaskRunnerFactory};
use std::collections::HashMap;
use std::sync::RwLock;

/// Runner registry for configuration-driven runner creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct RunnerRegistry {
    runners: RwLock<HashMap<String, Box<dyn TaskRunnerFactory>>>,
}

impl RunnerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in runners registered
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_runner("passthrough", Box::new(PassthroughRunnerFactory));
        registry
    }

    /// Register a runner factory
    ///
    /// Registering an existing name replaces the earlier factory.
    pub fn register_runner(&self, name: impl Into<String>, factory: Box<dyn TaskRunnerFactory>) {
        let name = name.into();
        let mut runners = self.runners.write().unwrap();
        runners.insert(name, factory);
    }

    /// Create a runner from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn TaskRunner>)`: Created runner instance
    /// - `Err(Error)`: If the runner type is not registered or creation fails
    pub fn create_runner(&self, config: &RunnerConfig) -> Result<Box<dyn TaskRunner>> {
        let runner_type = config.type_name();
        let runners = self.runners.read().unwrap();

        let factory = runners
            .get(runner_type)
            .ok_or_else(|| Error::config(format!("Unknown runner type: {}", runner_type)))?;

        factory.create(config)
    }

    /// List all registered runner types, sorted
    pub fn list_runners(&self) -> Vec<String> {
        let runners = self.runners.read().unwrap();
        let mut names: Vec<String> = runners.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a runner type is registered
    pub fn has_runner(&self, name: &str) -> bool {
        let runners = self.runners.read().unwrap();
        runners.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingFactory;

    impl TaskRunnerFactory for FailingFactory {
        fn create(&self, _config: &RunnerConfig) -> Result<Box<dyn TaskRunner>> {
            Err(Error::runner("failing", "not available"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = RunnerRegistry::new();
        assert!(!registry.has_runner("failing"));

        registry.register_runner("failing", Box::new(FailingFactory));

        assert!(registry.has_runner("failing"));
        assert_eq!(registry.list_runners(), vec!["failing".to_string()]);
    }

    #[test]
    fn test_create_builtin_runner() {
        let registry = RunnerRegistry::with_builtin();
        let runner = registry.create_runner(&RunnerConfig::default()).unwrap();
        assert_eq!(runner.runner_name(), "passthrough");
    }

    #[test]
    fn test_unknown_runner_type() {
        let registry = RunnerRegistry::with_builtin();
        let config = RunnerConfig {
            runner_type: "missing".to_string(),
            options: serde_json::Value::Null,
        };
        let err = registry.create_runner(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown runner type: missing"));
    }

    #[test]
    fn test_factory_error_propagates() {
        let registry = RunnerRegistry::new();
        registry.register_runner("failing", Box::new(FailingFactory));
        let config = RunnerConfig {
            runner_type: "failing".to_string(),
            options: serde_json::Value::Null,
        };
        assert!(matches!(registry.create_runner(&config), Err(Error::Runner { .. })));
    }
}
