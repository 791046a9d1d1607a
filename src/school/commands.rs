use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use super::classifier::SchoolErrorClassifier;
use super::models::{Course, Student, StudentsGroup};
use crate::commands::{
    Command, CommandError, CommandFamily, CreateOrUpdateCommand, DeleteCommand, DomainViolation,
    EntityRollbackCache, EntityRule, MacroCommand, MacroExecutionPool,
};
use crate::constants::{commands as ids, defaults};
use crate::context::{ExecutionContext, Input};
use crate::execution::error_classifier::ErrorClassifier;
use crate::execution::ExecutorHandle;
use crate::persistence::{EntityId, EntityStore, InMemoryEntityStore, PersistenceError};
use crate::registry::CommandRegistry;

/// Storage for the school entities
#[derive(Clone)]
pub struct SchoolStores {
    pub courses: Arc<dyn EntityStore<Course>>,
    pub students: Arc<dyn EntityStore<Student>>,
    pub groups: Arc<dyn EntityStore<StudentsGroup>>,
}

impl SchoolStores {
    pub fn in_memory() -> Self {
        Self {
            courses: Arc::new(InMemoryEntityStore::<Course>::new()),
            students: Arc::new(InMemoryEntityStore::<Student>::new()),
            groups: Arc::new(InMemoryEntityStore::<StudentsGroup>::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolCommandsConfig {
    pub max_courses_per_student: usize,
    /// Nested commands in `course.create.batch`
    pub course_batch_size: usize,
    /// Nested commands in `group.delete.batch`
    pub group_batch_size: usize,
}

impl Default for SchoolCommandsConfig {
    fn default() -> Self {
        Self {
            max_courses_per_student: defaults::MAX_COURSES_PER_STUDENT,
            course_batch_size: defaults::COURSE_BATCH_SIZE,
            group_batch_size: defaults::GROUP_BATCH_SIZE,
        }
    }
}

fn school_classifier() -> Arc<dyn ErrorClassifier> {
    Arc::new(SchoolErrorClassifier)
}

fn require_text(field: &str, value: &str) -> Result<(), CommandError> {
    if value.trim().is_empty() {
        Err(CommandError::invalid_parameter(format!("{field} must not be blank")))
    } else {
        Ok(())
    }
}

fn course_rule() -> EntityRule<Course> {
    Arc::new(|course: &Course| require_text("course name", &course.name))
}

fn student_rule() -> EntityRule<Student> {
    Arc::new(|student: &Student| {
        require_text("student first name", &student.first_name)?;
        require_text("student last name", &student.last_name)
    })
}

fn group_rule() -> EntityRule<StudentsGroup> {
    Arc::new(|group: &StudentsGroup| require_text("group name", &group.name))
}

/// Groups with students cannot be deleted
fn empty_group_guard() -> EntityRule<StudentsGroup> {
    Arc::new(|group: &StudentsGroup| {
        if group.student_ids.is_empty() {
            Ok(())
        } else {
            Err(DomainViolation::GroupNotEmpty {
                group_id: group.id.unwrap_or_default(),
                students: group.student_ids.len(),
            }
            .into())
        }
    })
}

pub fn course_create_or_update(stores: &SchoolStores) -> Arc<dyn Command> {
    Arc::new(
        CreateOrUpdateCommand::new(ids::COURSE_CREATE_OR_UPDATE, stores.courses.clone())
            .with_validator(course_rule())
            .with_error_classifier(school_classifier()),
    )
}

pub fn course_delete(stores: &SchoolStores) -> Arc<dyn Command> {
    Arc::new(
        DeleteCommand::new(ids::COURSE_DELETE, stores.courses.clone())
            .with_error_classifier(school_classifier()),
    )
}

pub fn student_create_or_update(stores: &SchoolStores) -> Arc<dyn Command> {
    Arc::new(
        CreateOrUpdateCommand::new(ids::STUDENT_CREATE_OR_UPDATE, stores.students.clone())
            .with_validator(student_rule())
            .with_error_classifier(school_classifier()),
    )
}

pub fn student_delete(stores: &SchoolStores) -> Arc<dyn Command> {
    Arc::new(
        DeleteCommand::new(ids::STUDENT_DELETE, stores.students.clone())
            .with_error_classifier(school_classifier()),
    )
}

pub fn group_create_or_update(stores: &SchoolStores) -> Arc<dyn Command> {
    Arc::new(
        CreateOrUpdateCommand::new(ids::GROUP_CREATE_OR_UPDATE, stores.groups.clone())
            .with_validator(group_rule())
            .with_error_classifier(school_classifier()),
    )
}

pub fn group_delete(stores: &SchoolStores) -> Arc<dyn Command> {
    Arc::new(
        DeleteCommand::new(ids::GROUP_DELETE, stores.groups.clone())
            .with_guard(empty_group_guard())
            .with_error_classifier(school_classifier()),
    )
}

/// Adds a course to a student's course list; undo restores the student as it was
pub struct RegisterStudentToCourseCommand {
    students: Arc<dyn EntityStore<Student>>,
    courses: Arc<dyn EntityStore<Course>>,
    cache: EntityRollbackCache<Student>,
    max_courses: usize,
}

impl RegisterStudentToCourseCommand {
    pub fn new(stores: &SchoolStores, max_courses: usize) -> Self {
        Self {
            students: stores.students.clone(),
            courses: stores.courses.clone(),
            cache: EntityRollbackCache::new(),
            max_courses,
        }
    }

    fn check_course_exists(&self, course_id: EntityId) -> Result<(), CommandError> {
        let course = self
            .courses
            .find_by_id(course_id)
            .map_err(|e| CommandError::persistence("find course", e))?;
        match course {
            Some(_) => Ok(()),
            None => Err(CommandError::not_found("course", course_id)),
        }
    }
}

#[async_trait]
impl Command for RegisterStudentToCourseCommand {
    fn id(&self) -> &str {
        ids::STUDENT_REGISTER_TO_COURSE
    }

    fn family(&self) -> CommandFamily {
        CommandFamily::Relation
    }

    fn validate_input(&self, input: &Input) -> Result<(), CommandError> {
        input.as_link().map(|_| ())
    }

    async fn execute_do(&self, context: &mut ExecutionContext) -> Result<(), CommandError> {
        let (student_id, course_id) = context.redo_input().as_link()?;
        let student = self
            .cache
            .retrieve(student_id, |id| self.students.find_by_id(id), Student::clone)?;
        self.check_course_exists(course_id)?;

        if student.attends(course_id) {
            return Err(DomainViolation::StudentAlreadyRegistered {
                student_id,
                course_id,
            }
            .into());
        }
        if student.course_ids.len() >= self.max_courses {
            return Err(DomainViolation::StudentCourseLimitExceeded {
                student_id,
                limit: self.max_courses,
            }
            .into());
        }

        context.set_undo_input(Input::of_entity(&student)?);
        let mut registered = student;
        registered.course_ids.push(course_id);

        let persisted = match self.students.save(registered) {
            Ok(persisted) => persisted,
            Err(e) => {
                context.fail(CommandError::persistence("save student", e))?;
                None
            }
        };

        self.cache
            .after_forward_persistence_check(context, persisted, false, |ctx| {
                if let Err(cause) = self.cache.rollback(
                    ctx,
                    |e| self.students.save(e),
                    None::<fn(EntityId) -> Result<bool, PersistenceError>>,
                ) {
                    error!(error = %cause, "Unable to restore student after failed registration");
                }
            })
    }

    async fn execute_undo(&self, context: &mut ExecutionContext) -> Result<(), CommandError> {
        self.cache.rollback(
            context,
            |e| self.students.save(e),
            None::<fn(EntityId) -> Result<bool, PersistenceError>>,
        )?;
        Ok(())
    }

    fn error_classifier(&self) -> Arc<dyn ErrorClassifier> {
        school_classifier()
    }
}

/// Register every school command, composites included.
///
/// Composites dispatch their nested commands through `executor` and share `pool`
/// for parallel runs.
pub fn register_school_commands(
    registry: &CommandRegistry,
    stores: &SchoolStores,
    executor: ExecutorHandle,
    pool: MacroExecutionPool,
    config: &SchoolCommandsConfig,
) {
    let create_course = course_create_or_update(stores);
    let delete_group = group_delete(stores);

    let course_batch = MacroCommand::parallel(
        ids::COURSE_CREATE_BATCH,
        vec![create_course.clone(); config.course_batch_size],
        executor.clone(),
        pool.clone(),
    )
    .with_positional_input()
    .with_rollback_on_failure()
    .with_error_classifier(school_classifier());

    let group_batch = MacroCommand::sequential(
        ids::GROUP_DELETE_BATCH,
        vec![delete_group.clone(); config.group_batch_size],
        true,
        executor,
        pool,
    )
    .with_positional_input()
    .with_rollback_on_failure()
    .with_error_classifier(school_classifier());

    registry.register_all([
        create_course,
        course_delete(stores),
        student_create_or_update(stores),
        student_delete(stores),
        Arc::new(RegisterStudentToCourseCommand::new(
            stores,
            config.max_courses_per_student,
        )) as Arc<dyn Command>,
        group_create_or_update(stores),
        delete_group,
        Arc::new(course_batch) as Arc<dyn Command>,
        Arc::new(group_batch) as Arc<dyn Command>,
    ]);
}
