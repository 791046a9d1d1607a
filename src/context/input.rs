use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::execution_context::ExecutionContext;
use crate::commands::CommandError;
use crate::persistence::{Entity, EntityId};

/// Typed input of a command execution.
///
/// Inputs serialize as `{"type": ..., "value": ...}` so they can cross the message
/// transport as JSON without losing which shape they carry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Input {
    #[default]
    Empty,
    Id(EntityId),
    /// Relation between two entities, e.g. student and course
    Link {
        primary: EntityId,
        secondary: EntityId,
    },
    Entity(EntityPayload),
    /// Positional inputs, one per nested command of a composite
    Values(Vec<Input>),
    Macro(MacroParameter),
}

/// Serialized entity tagged with its entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPayload {
    pub entity_type: String,
    pub body: Value,
}

/// Input of a composite command: the caller's root input and the prepared nested contexts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroParameter {
    pub root: Box<Input>,
    pub nested: Vec<ExecutionContext>,
}

impl MacroParameter {
    pub fn new(root: Input, nested: Vec<ExecutionContext>) -> Self {
        Self {
            root: Box::new(root),
            nested,
        }
    }
}

impl Input {
    pub fn of_entity<E: Entity>(entity: &E) -> Result<Self, CommandError> {
        Ok(Self::Entity(EntityPayload {
            entity_type: E::ENTITY_TYPE.to_string(),
            body: serde_json::to_value(entity)?,
        }))
    }

    pub fn link(primary: EntityId, secondary: EntityId) -> Self {
        Self::Link { primary, secondary }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Shape of the input for diagnostics; entity inputs report their entity type
    pub fn describe(&self) -> String {
        match self {
            Self::Empty => "empty".to_string(),
            Self::Id(_) => "id".to_string(),
            Self::Link { .. } => "link".to_string(),
            Self::Entity(payload) => format!("entity<{}>", payload.entity_type),
            Self::Values(values) => format!("values[{}]", values.len()),
            Self::Macro(_) => "macro".to_string(),
        }
    }

    pub fn as_entity<E: Entity>(&self) -> Result<E, CommandError> {
        match self {
            Self::Entity(payload) if payload.entity_type == E::ENTITY_TYPE => {
                Ok(serde_json::from_value(payload.body.clone())?)
            }
            other => Err(CommandError::type_mismatch(
                format!("entity<{}>", E::ENTITY_TYPE),
                other.describe(),
            )),
        }
    }

    pub fn as_id(&self) -> Result<EntityId, CommandError> {
        match self {
            Self::Id(id) => Ok(*id),
            other => Err(CommandError::type_mismatch("id", other.describe())),
        }
    }

    pub fn as_link(&self) -> Result<(EntityId, EntityId), CommandError> {
        match self {
            Self::Link { primary, secondary } => Ok((*primary, *secondary)),
            other => Err(CommandError::type_mismatch("link", other.describe())),
        }
    }

    pub fn as_macro(&self) -> Result<&MacroParameter, CommandError> {
        match self {
            Self::Macro(parameter) => Ok(parameter),
            other => Err(CommandError::type_mismatch("macro", other.describe())),
        }
    }

    /// Project the input for the nested command at `position`.
    ///
    /// Positional inputs yield their element; any other input is shared by every position.
    pub fn at(&self, position: usize) -> Result<&Input, CommandError> {
        match self {
            Self::Values(values) => values.get(position).ok_or_else(|| {
                CommandError::invalid_parameter(format!(
                    "no input at position {position}, only {} provided",
                    values.len()
                ))
            }),
            other => Ok(other),
        }
    }
}

impl From<EntityId> for Input {
    fn from(id: EntityId) -> Self {
        Self::Id(id)
    }
}

impl From<Vec<Input>> for Input {
    fn from(values: Vec<Input>) -> Self {
        Self::Values(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Room {
        id: Option<EntityId>,
        seats: u32,
    }

    impl Entity for Room {
        const ENTITY_TYPE: &'static str = "room";

        fn id(&self) -> Option<EntityId> {
            self.id
        }

        fn set_id(&mut self, id: Option<EntityId>) {
            self.id = id;
        }
    }

    #[test]
    fn entity_input_decodes_to_its_type() {
        let room = Room { id: None, seats: 30 };
        let input = Input::of_entity(&room).unwrap();
        assert_eq!(input.describe(), "entity<room>");
        assert_eq!(input.as_entity::<Room>().unwrap(), room);
    }

    #[test]
    fn wrong_shape_is_a_type_mismatch() {
        let err = Input::Id(3).as_entity::<Room>().unwrap_err();
        assert_eq!(err, CommandError::type_mismatch("entity<room>", "id"));
        assert!(Input::Empty.as_link().is_err());
    }

    #[test]
    fn positional_projection() {
        let values = Input::Values(vec![Input::Id(1), Input::Id(2)]);
        assert_eq!(values.at(1).unwrap(), &Input::Id(2));
        assert!(matches!(
            values.at(2),
            Err(CommandError::InvalidParameter { .. })
        ));
        assert_eq!(Input::Id(9).at(4).unwrap(), &Input::Id(9));
    }

    #[test]
    fn input_json_is_tagged() {
        let json = serde_json::to_value(Input::link(1, 2)).unwrap();
        assert_eq!(json["type"], "link");
        assert_eq!(json["value"]["secondary"], 2);
    }
}
