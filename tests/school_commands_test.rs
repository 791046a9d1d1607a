//! School commands driven through the facade and the message executor

mod common;

use serde_json::Value;

use campus_core::commands::{CommandError, DomainViolation};
use campus_core::constants::commands as ids;
use campus_core::context::Input;
use campus_core::execution::ExecutionFailure;
use campus_core::persistence::Entity;
use campus_core::school::{Course, Student, StudentsGroup};
use campus_core::ContextState;

use common::{course_input, test_config, CountingStore, SchoolHarness};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn create_course_then_undo_removes_it() {
    let harness = SchoolHarness::start(test_config()).await;

    let context = harness
        .facade
        .execute_context(ids::COURSE_CREATE_OR_UPDATE, course_input("Algebra"))
        .await
        .expect("course created");
    assert_eq!(context.state(), ContextState::Done);

    let course: Course = context.result_as().expect("course result");
    let id = course.id.expect("assigned id");
    assert_eq!(course.name, "Algebra");
    assert_eq!(context.undo_input(), &Input::Id(id));
    assert!(harness.courses.inner().contains(id));

    let undone = harness.facade.undo(context).await.expect("course undone");
    assert_eq!(undone.state(), ContextState::Undone);
    assert!(!harness.courses.inner().contains(id));
    assert!(undone.history().has_visited(ContextState::Done));

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn update_then_undo_restores_previous_row() {
    let harness = SchoolHarness::start(test_config()).await;
    let original = harness.courses.seed(Course::new("Algebra", "numbers"));

    let mut renamed = original.clone();
    renamed.name = "Linear Algebra".to_string();
    let context = harness
        .facade
        .execute_context(
            ids::COURSE_CREATE_OR_UPDATE,
            Input::of_entity(&renamed).expect("input"),
        )
        .await
        .expect("course updated");
    assert_eq!(context.undo_input(), &Input::of_entity(&original).expect("input"));

    let id = original.id.expect("seeded id");
    let stored = harness.courses.inner().snapshot();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Linear Algebra");

    harness.facade.undo(context).await.expect("update undone");
    let restored = harness.courses.inner().snapshot();
    assert_eq!(restored, vec![original]);
    assert_eq!(restored[0].id(), Some(id));

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delete_then_undo_saves_the_row_back() {
    let harness = SchoolHarness::start(test_config()).await;
    let course = harness.courses.seed(Course::new("Chemistry", "labs"));
    let id = course.id.expect("seeded id");

    let context = harness
        .facade
        .execute_context(ids::COURSE_DELETE, Input::Id(id))
        .await
        .expect("course deleted");
    assert_eq!(context.result(), Some(&serde_json::json!({ "deleted": id })));
    assert!(!harness.courses.inner().contains(id));

    harness.facade.undo(context).await.expect("delete undone");
    assert_eq!(harness.courses.inner().snapshot(), vec![course]);

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn group_with_students_is_not_deleted() {
    let harness = SchoolHarness::start(test_config()).await;
    let mut group = StudentsGroup::new("Group A");
    group.student_ids = vec![1, 2, 3];
    let group = harness.groups.seed(group);
    let id = group.id.expect("seeded id");

    let failure = harness
        .facade
        .execute::<Value>(ids::GROUP_DELETE, Input::Id(id))
        .await
        .expect_err("non-empty group refused");

    assert_eq!(
        failure,
        ExecutionFailure::DomainRule {
            command_id: ids::GROUP_DELETE.to_string(),
            violation: DomainViolation::GroupNotEmpty {
                group_id: id,
                students: 3,
            },
        }
    );
    assert_eq!(harness.groups.deletes(), 0);
    assert!(harness.groups.inner().contains(id));

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn group_enrolled_through_commands_is_not_deleted() {
    let harness = SchoolHarness::start(test_config()).await;

    let mut student_ids = Vec::new();
    for (first, last) in [("Ada", "Lovelace"), ("Alan", "Turing"), ("Edsger", "Dijkstra")] {
        let student: Student = harness
            .facade
            .execute(
                ids::STUDENT_CREATE_OR_UPDATE,
                Input::of_entity(&Student::new(first, last)).expect("student input"),
            )
            .await
            .expect("student created");
        student_ids.push(student.id.expect("student id"));
    }

    let group: StudentsGroup = harness
        .facade
        .execute(
            ids::GROUP_CREATE_OR_UPDATE,
            Input::of_entity(&StudentsGroup::new("Group B").with_students(student_ids))
                .expect("group input"),
        )
        .await
        .expect("group created");
    let group_id = group.id.expect("group id");

    let failure = harness
        .facade
        .execute::<Value>(ids::GROUP_DELETE, Input::Id(group_id))
        .await
        .expect_err("enrolled group refused");

    assert!(matches!(
        failure,
        ExecutionFailure::DomainRule {
            violation: DomainViolation::GroupNotEmpty { students: 3, .. },
            ..
        }
    ));
    assert_eq!(harness.groups.deletes(), 0);
    assert!(harness.groups.inner().contains(group_id));

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blank_name_is_rejected_before_any_save() {
    let harness = SchoolHarness::start(test_config()).await;

    let failure = harness
        .facade
        .execute::<Course>(ids::COURSE_CREATE_OR_UPDATE, course_input("   "))
        .await
        .expect_err("blank name refused");

    assert!(matches!(failure, ExecutionFailure::InvalidParameter { .. }));
    assert_eq!(harness.courses.saves(), 0);
    assert_eq!(harness.executor.stats().sent, 0);

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wrong_input_shape_is_an_invalid_parameter() {
    let harness = SchoolHarness::start(test_config()).await;

    let failure = harness
        .facade
        .execute::<Value>(ids::COURSE_DELETE, Input::Empty)
        .await
        .expect_err("delete needs an id");

    assert!(matches!(
        failure,
        ExecutionFailure::InvalidParameter {
            cause: CommandError::TypeMismatch { .. },
            ..
        }
    ));

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn missing_row_is_reported_as_not_found() {
    let harness = SchoolHarness::start(test_config()).await;

    let failure = harness
        .facade
        .execute::<Value>(ids::STUDENT_DELETE, Input::Id(404))
        .await
        .expect_err("nothing to delete");

    assert_eq!(
        failure.cause(),
        Some(&CommandError::not_found(Student::ENTITY_TYPE, 404))
    );
    assert!(matches!(failure, ExecutionFailure::NotFound { .. }));

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_command_is_not_registered() {
    let harness = SchoolHarness::start(test_config()).await;

    let failure = harness
        .facade
        .execute::<Value>("course.archive", Input::Id(1))
        .await
        .expect_err("unknown command");

    assert_eq!(
        failure,
        ExecutionFailure::NotRegistered {
            command_id: "course.archive".to_string()
        }
    );

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn register_student_and_undo() {
    let harness = SchoolHarness::start(test_config()).await;
    let course = harness.courses.seed(Course::new("Biology", "cells"));
    let student = harness.students.seed(Student::new("Ada", "Lovelace"));
    let (student_id, course_id) = (student.id.expect("id"), course.id.expect("id"));

    let context = harness
        .facade
        .execute_context(
            ids::STUDENT_REGISTER_TO_COURSE,
            Input::link(student_id, course_id),
        )
        .await
        .expect("student registered");
    let registered: Student = context.result_as().expect("student result");
    assert_eq!(registered.course_ids, vec![course_id]);

    let again = harness
        .facade
        .execute::<Student>(
            ids::STUDENT_REGISTER_TO_COURSE,
            Input::link(student_id, course_id),
        )
        .await
        .expect_err("already registered");
    assert!(matches!(
        again,
        ExecutionFailure::DomainRule {
            violation: DomainViolation::StudentAlreadyRegistered { .. },
            ..
        }
    ));

    harness.facade.undo(context).await.expect("registration undone");
    let restored = harness
        .students
        .inner()
        .snapshot()
        .into_iter()
        .next()
        .expect("student kept");
    assert!(restored.course_ids.is_empty());

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn student_course_limit_is_enforced() {
    let harness = SchoolHarness::start(test_config()).await;
    let course_ids: Vec<_> = (0..6)
        .map(|n| {
            harness
                .courses
                .seed(Course::new(format!("Course {n}"), "elective"))
                .id
                .expect("id")
        })
        .collect();
    let mut student = Student::new("Grace", "Hopper");
    student.course_ids = course_ids[..5].to_vec();
    let student = harness.students.seed(student);
    let student_id = student.id.expect("id");

    let failure = harness
        .facade
        .execute::<Student>(
            ids::STUDENT_REGISTER_TO_COURSE,
            Input::link(student_id, course_ids[5]),
        )
        .await
        .expect_err("limit reached");

    assert_eq!(
        failure,
        ExecutionFailure::DomainRule {
            command_id: ids::STUDENT_REGISTER_TO_COURSE.to_string(),
            violation: DomainViolation::StudentCourseLimitExceeded {
                student_id,
                limit: 5,
            },
        }
    );
    assert_eq!(harness.students.saves(), 0);

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejected_save_fails_the_context() {
    let courses = CountingStore::rejecting(|course: &Course| course.name == "Forbidden");
    let harness = SchoolHarness::start_with_courses(test_config(), courses).await;

    let failure = harness
        .facade
        .execute::<Course>(ids::COURSE_CREATE_OR_UPDATE, course_input("Forbidden"))
        .await
        .expect_err("store refuses the row");

    assert!(matches!(
        failure,
        ExecutionFailure::UnableToExecute {
            cause: CommandError::Persistence { .. },
            ..
        }
    ));
    assert!(harness.courses.inner().is_empty());

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn encoded_transport_carries_the_same_results() {
    let harness = SchoolHarness::start(test_config().with_encoded_messages(true)).await;

    let course: Course = harness
        .facade
        .execute(ids::COURSE_CREATE_OR_UPDATE, course_input("Physics"))
        .await
        .expect("course created");
    assert_eq!(course.name, "Physics");
    assert!(course.id.is_some());

    let failure = harness
        .facade
        .execute::<Value>(ids::COURSE_DELETE, Input::Id(999))
        .await
        .expect_err("missing course");
    assert!(matches!(failure, ExecutionFailure::NotFound { .. }));

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn undo_requires_a_done_context() {
    let harness = SchoolHarness::start(test_config()).await;
    let command = harness.registry.get(ids::COURSE_DELETE).expect("registered");
    let context = command.create_context(&Input::Id(1));
    assert_eq!(context.state(), ContextState::Ready);

    let failure = harness.facade.undo(context).await.expect_err("not DONE");
    assert!(matches!(failure, ExecutionFailure::UnableToExecute { .. }));

    harness.stop().await;
}
