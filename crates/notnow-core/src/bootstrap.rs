use std::sync::Arc;

use tracing::info;

use crate::config::NotnowConfig;
use crate::executor::CommandExecutor;
use crate::module::WorkflowModule;
use crate::registry::{CommandRegistry, RegistryError};

/// Registers the built-in modules. Each call builds a fresh registry.
pub fn build_registry(config: &NotnowConfig) -> Result<CommandRegistry, RegistryError> {
    let mut registry = CommandRegistry::new();
    registry.register_module(WorkflowModule::new(config))?;
    info!(
        modules = ?registry.module_names(),
        marker = config.marker(),
        "command registry ready"
    );
    Ok(registry)
}

/// Registry plus an executor scanning for the configured marker.
pub fn build_executor(config: &NotnowConfig) -> Result<CommandExecutor, RegistryError> {
    let registry = Arc::new(build_registry(config)?);
    Ok(CommandExecutor::with_marker(registry, config.marker()))
}
