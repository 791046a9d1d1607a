use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::commands::{Command, CommandError, CommandFamily};
use crate::logging::log_registry_operation;

/// Thread-safe registry of commands keyed by command id
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, Arc<dyn Command>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `command` under its id, returning the command it replaced
    pub fn register(&self, command: Arc<dyn Command>) -> Option<Arc<dyn Command>> {
        let command_id = command.id().to_string();
        let replaced = self.commands.write().insert(command_id.clone(), command);

        if replaced.is_some() {
            warn!(command_id = %command_id, "Replacing existing command registration");
        }
        log_registry_operation("register", &command_id, "registered", None);
        replaced
    }

    pub fn register_all<I>(&self, commands: I)
    where
        I: IntoIterator<Item = Arc<dyn Command>>,
    {
        for command in commands {
            self.register(command);
        }
    }

    pub fn unregister(&self, command_id: &str) -> Option<Arc<dyn Command>> {
        let removed = self.commands.write().remove(command_id);
        if removed.is_some() {
            log_registry_operation("unregister", command_id, "removed", None);
        }
        removed
    }

    pub fn find(&self, command_id: &str) -> Option<Arc<dyn Command>> {
        self.commands.read().get(command_id).cloned()
    }

    /// Look up a command, failing with `NotRegistered` when it is unknown
    pub fn get(&self, command_id: &str) -> Result<Arc<dyn Command>, CommandError> {
        self.find(command_id).ok_or_else(|| {
            debug!(command_id = %command_id, "Command lookup failed");
            CommandError::not_registered(command_id)
        })
    }

    pub fn contains(&self, command_id: &str) -> bool {
        self.commands.read().contains_key(command_id)
    }

    /// Registered ids in lexical order
    pub fn command_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.commands.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let commands = self.commands.read();
        let mut by_family: HashMap<CommandFamily, usize> = HashMap::new();
        for command in commands.values() {
            *by_family.entry(command.family()).or_default() += 1;
        }
        let mut command_ids: Vec<String> = commands.keys().cloned().collect();
        command_ids.sort();

        RegistryStats {
            registered_commands: commands.len(),
            command_ids,
            by_family,
        }
    }
}

/// Snapshot of what the registry holds
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub registered_commands: usize,
    pub command_ids: Vec<String>,
    pub by_family: HashMap<CommandFamily, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use async_trait::async_trait;

    struct NamedCommand(&'static str);

    #[async_trait]
    impl Command for NamedCommand {
        fn id(&self) -> &str {
            self.0
        }

        async fn execute_do(&self, _context: &mut ExecutionContext) -> Result<(), CommandError> {
            Ok(())
        }

        async fn execute_undo(&self, _context: &mut ExecutionContext) -> Result<(), CommandError> {
            Ok(())
        }
    }

    #[test]
    fn registration_and_lookup() {
        let registry = CommandRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(NamedCommand("b.command")));
        registry.register(Arc::new(NamedCommand("a.command")));

        assert!(registry.contains("a.command"));
        assert_eq!(registry.command_ids(), vec!["a.command", "b.command"]);
        assert_eq!(registry.get("b.command").unwrap().id(), "b.command");
    }

    #[test]
    fn unknown_command_is_not_registered() {
        let registry = CommandRegistry::new();
        let err = registry.get("missing.command").err().unwrap();
        assert_eq!(err, CommandError::not_registered("missing.command"));
    }

    #[test]
    fn re_registration_replaces() {
        let registry = CommandRegistry::new();
        assert!(registry.register(Arc::new(NamedCommand("x"))).is_none());
        assert!(registry.register(Arc::new(NamedCommand("x"))).is_some());
        assert_eq!(registry.len(), 1);

        let stats = registry.stats();
        assert_eq!(stats.by_family.get(&CommandFamily::Auxiliary), Some(&1));
        assert!(registry.unregister("x").is_some());
        assert!(registry.is_empty());
    }
}
