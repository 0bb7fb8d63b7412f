use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::context::CommandContext;
use crate::handlers::CommandHandler;
use crate::schema::CommandSchema;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Module already registered: {0}")]
    DuplicateModule(String),
}

/// Key of a handler in the registry's handler table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerRef(String);

impl HandlerRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct CommandRegistration {
    pub name: String,
    pub aliases: Vec<String>,
    pub allowed_context: CommandContext,
    pub handler: HandlerRef,
    pub schema: CommandSchema,
    pub description: String,
}

impl CommandRegistration {
    /// A command allowed everywhere whose handler key is its own name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            handler: HandlerRef::new(name.clone()),
            name,
            aliases: Vec::new(),
            allowed_context: CommandContext::BOTH,
            schema: CommandSchema::default(),
            description: String::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn allowed_in(mut self, context: CommandContext) -> Self {
        self.allowed_context = context;
        self
    }

    pub fn handler(mut self, handler: HandlerRef) -> Self {
        self.handler = handler;
        self
    }

    pub fn schema(mut self, schema: CommandSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn usage(&self) -> String {
        self.schema.usage(&self.name)
    }
}

/// A pluggable bundle of commands and the handlers behind them.
pub trait CommandModule: Send + Sync {
    fn name(&self) -> &str;
    fn commands(&self) -> Vec<CommandRegistration>;
    fn handlers(&self) -> Vec<(HandlerRef, Arc<dyn CommandHandler>)>;

    /// Called once, after the module's commands are registered.
    fn initialize(&self, _registry: &CommandRegistry) {}
}

#[derive(Default)]
pub struct CommandRegistry {
    modules: Vec<String>,
    commands: BTreeMap<String, Arc<CommandRegistration>>,
    handlers: HashMap<HandlerRef, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_module<M: CommandModule>(&mut self, module: M) -> Result<(), RegistryError> {
        let name = module.name().to_string();
        if self
            .modules
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(&name))
        {
            return Err(RegistryError::DuplicateModule(name));
        }
        for (handler_ref, handler) in module.handlers() {
            self.register_handler(handler_ref, handler);
        }
        let commands = module.commands();
        debug!(module = %name, commands = commands.len(), "registering command module");
        for registration in commands {
            self.register_command(registration);
        }
        self.modules.push(name);
        module.initialize(self);
        Ok(())
    }

    /// Inserts the name and every alias; an existing key is replaced.
    pub fn register_command(&mut self, registration: CommandRegistration) {
        let registration = Arc::new(registration);
        let keys = std::iter::once(&registration.name).chain(registration.aliases.iter());
        for key in keys {
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            if let Some(previous) = self.commands.insert(key.clone(), registration.clone()) {
                debug!(key = %key, previous = %previous.name, "command key replaced");
            }
        }
    }

    pub fn register_handler(&mut self, handler_ref: HandlerRef, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(handler_ref, handler);
    }

    pub fn get_command(&self, name: &str) -> Option<Arc<CommandRegistration>> {
        self.commands.get(&name.trim().to_lowercase()).cloned()
    }

    pub fn resolve_handler(&self, handler_ref: &HandlerRef) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(handler_ref).cloned()
    }

    /// Distinct registrations whose allowed context contains `context`,
    /// ordered by primary name.
    pub fn get_commands_for_context(&self, context: CommandContext) -> Vec<Arc<CommandRegistration>> {
        let mut distinct: Vec<Arc<CommandRegistration>> = Vec::new();
        for registration in self.commands.values() {
            if !registration.allowed_context.contains(context) {
                continue;
            }
            if distinct.iter().any(|seen| Arc::ptr_eq(seen, registration)) {
                continue;
            }
            distinct.push(registration.clone());
        }
        distinct.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        distinct
    }

    /// Names and aliases visible in `context` that start with `prefix`.
    pub fn get_command_suggestions(&self, prefix: &str, context: CommandContext) -> Vec<String> {
        let prefix = prefix.trim().to_lowercase();
        self.commands
            .iter()
            .filter(|(key, registration)| {
                registration.allowed_context.contains(context) && key.starts_with(&prefix)
            })
            .map(|(key, _)| key.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.clone()
    }
}
