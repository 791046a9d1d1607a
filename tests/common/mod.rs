#![allow(dead_code)]

pub mod strategies;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use campus_core::commands::{Command, CommandError, MacroExecutionPool};
use campus_core::config::EngineConfig;
use campus_core::context::{ExecutionContext, Input};
use campus_core::execution::{CommandsFacade, ExecutorHandle, MessageActionExecutor};
use campus_core::persistence::{Entity, EntityId, EntityStore, InMemoryEntityStore, PersistenceError};
use campus_core::registry::CommandRegistry;
use campus_core::school::{
    register_school_commands, Course, SchoolCommandsConfig, SchoolStores, Student, StudentsGroup,
};

/// Explicit pools so results do not depend on the machine's core count
pub fn test_config() -> EngineConfig {
    EngineConfig::default()
        .with_worker_pool_size(8)
        .with_macro_pool_size(8)
        .with_watchdog_timeout_ms(2_000)
}

type SaveRule<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// In-memory store that counts calls and can reject selected saves
pub struct CountingStore<E: Entity> {
    inner: InMemoryEntityStore<E>,
    finds: AtomicUsize,
    saves: AtomicUsize,
    deletes: AtomicUsize,
    reject_save: Option<SaveRule<E>>,
}

impl<E: Entity> CountingStore<E> {
    pub fn new() -> Self {
        Self {
            inner: InMemoryEntityStore::new(),
            finds: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            reject_save: None,
        }
    }

    /// Saves matching `rule` fail with a constraint violation
    pub fn rejecting(rule: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        Self {
            reject_save: Some(Box::new(rule)),
            ..Self::new()
        }
    }

    pub fn inner(&self) -> &InMemoryEntityStore<E> {
        &self.inner
    }

    /// Seed a row without touching the counters
    pub fn seed(&self, entity: E) -> E {
        self.inner
            .save(entity)
            .expect("in-memory save")
            .expect("saved row")
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

impl<E: Entity> EntityStore<E> for CountingStore<E> {
    fn find_by_id(&self, id: EntityId) -> Result<Option<E>, PersistenceError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id)
    }

    fn save(&self, entity: E) -> Result<Option<E>, PersistenceError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if let Some(rule) = &self.reject_save {
            if rule(&entity) {
                return Err(PersistenceError::Constraint {
                    entity_type: E::ENTITY_TYPE.to_string(),
                    message: "rejected by store validation".to_string(),
                });
            }
        }
        self.inner.save(entity)
    }

    fn delete_by_id(&self, id: EntityId) -> Result<bool, PersistenceError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_by_id(id)
    }
}

/// School command set running on a started message executor
pub struct SchoolHarness {
    pub registry: Arc<CommandRegistry>,
    pub executor: Arc<MessageActionExecutor>,
    pub facade: CommandsFacade,
    pub stores: SchoolStores,
    pub pool: MacroExecutionPool,
    pub courses: Arc<CountingStore<Course>>,
    pub students: Arc<CountingStore<Student>>,
    pub groups: Arc<CountingStore<StudentsGroup>>,
}

impl SchoolHarness {
    pub async fn start(config: EngineConfig) -> Self {
        Self::start_with_courses(config, CountingStore::new()).await
    }

    pub async fn start_with_courses(config: EngineConfig, courses: CountingStore<Course>) -> Self {
        let courses = Arc::new(courses);
        let students = Arc::new(CountingStore::new());
        let groups = Arc::new(CountingStore::new());
        let stores = SchoolStores {
            courses: courses.clone(),
            students: students.clone(),
            groups: groups.clone(),
        };

        let registry = Arc::new(CommandRegistry::new());
        let executor = Arc::new(MessageActionExecutor::new(registry.clone(), config.clone()));
        let pool = MacroExecutionPool::from_config(&config);
        register_school_commands(
            &registry,
            &stores,
            ExecutorHandle::new(&executor),
            pool.clone(),
            &SchoolCommandsConfig::default(),
        );
        executor.start().await.expect("executor starts");

        let facade = CommandsFacade::new(registry.clone(), executor.clone());
        Self {
            registry,
            executor,
            facade,
            stores,
            pool,
            courses,
            students,
            groups,
        }
    }

    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle::new(&self.executor)
    }

    pub async fn stop(&self) {
        self.executor.stop().await.expect("executor stops");
    }
}

pub fn course_input(name: &str) -> Input {
    Input::of_entity(&Course::new(name, format!("{name} course"))).expect("course input")
}

/// Completes with its own id after an optional delay
pub struct SleepyCommand {
    pub id: String,
    pub delay: Duration,
}

impl SleepyCommand {
    pub fn new(id: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            delay,
        })
    }
}

#[async_trait]
impl Command for SleepyCommand {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute_do(&self, context: &mut ExecutionContext) -> Result<(), CommandError> {
        tokio::time::sleep(self.delay).await;
        context.complete(json!(self.id))?;
        Ok(())
    }

    async fn execute_undo(&self, _context: &mut ExecutionContext) -> Result<(), CommandError> {
        Ok(())
    }
}

pub struct PanickingCommand;

#[async_trait]
impl Command for PanickingCommand {
    fn id(&self) -> &str {
        "stub.panicking"
    }

    async fn execute_do(&self, _context: &mut ExecutionContext) -> Result<(), CommandError> {
        panic!("command exploded");
    }

    async fn execute_undo(&self, _context: &mut ExecutionContext) -> Result<(), CommandError> {
        Ok(())
    }
}

/// Counts forward and compensation calls; can be told to fail either stage
pub struct RecordingCommand {
    pub id: String,
    pub reject_input: bool,
    pub fail_execution: bool,
    pub calls: AtomicUsize,
    pub undo_calls: AtomicUsize,
}

impl RecordingCommand {
    pub fn succeeding(id: &str) -> Arc<Self> {
        Arc::new(Self::build(id, false, false))
    }

    pub fn failing(id: &str) -> Arc<Self> {
        Arc::new(Self::build(id, false, true))
    }

    pub fn rejecting_input(id: &str) -> Arc<Self> {
        Arc::new(Self::build(id, true, false))
    }

    fn build(id: &str, reject_input: bool, fail_execution: bool) -> Self {
        Self {
            id: id.to_string(),
            reject_input,
            fail_execution,
            calls: AtomicUsize::new(0),
            undo_calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn undo_calls(&self) -> usize {
        self.undo_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Command for RecordingCommand {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate_input(&self, _input: &Input) -> Result<(), CommandError> {
        if self.reject_input {
            Err(CommandError::invalid_parameter("input rejected"))
        } else {
            Ok(())
        }
    }

    async fn execute_do(&self, context: &mut ExecutionContext) -> Result<(), CommandError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_execution {
            return Err(CommandError::execution("recording failure"));
        }
        context.complete(json!(self.id))?;
        Ok(())
    }

    async fn execute_undo(&self, _context: &mut ExecutionContext) -> Result<(), CommandError> {
        self.undo_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
