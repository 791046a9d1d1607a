use serde::{Deserialize, Serialize};

use crate::persistence::{Entity, EntityId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Course {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: Some(description.into()),
        }
    }
}

impl Entity for Course {
    const ENTITY_TYPE: &'static str = "course";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Option<EntityId>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub course_ids: Vec<EntityId>,
}

impl Student {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            course_ids: Vec::new(),
        }
    }

    pub fn attends(&self, course_id: EntityId) -> bool {
        self.course_ids.contains(&course_id)
    }
}

impl Entity for Student {
    const ENTITY_TYPE: &'static str = "student";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }
}

/// A group of students. `student_ids` is the only record of group membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentsGroup {
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default)]
    pub student_ids: Vec<EntityId>,
}

impl StudentsGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            student_ids: Vec::new(),
        }
    }

    pub fn with_students(mut self, student_ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.student_ids.extend(student_ids);
        self
    }
}

impl Entity for StudentsGroup {
    const ENTITY_TYPE: &'static str = "students_group";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }
}
