// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use crate::{CollectionId, EntityId, Shape, Status};
use std::fmt;

/// Error returned by every fallible tracking operation.
///
/// All errors are reported synchronously at the offending call and leave the tracker state as it
/// was before the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    /// The entity's status does not permit the operation (for example, any mutation of an
    /// [`Status::Invalid`] entity, or a write to a [`Status::Deleted`] one).
    InvalidState {
        status: Status,
        operation: &'static str,
    },

    /// The entity is already an item of a collection.
    DuplicateTracking(EntityId),

    /// An index outside of the collection's bounds.
    OutOfRange { index: usize, len: usize },

    /// A write would change a property between opaque and trackable shapes.
    TypeShapeViolation {
        property: String,
        from: Shape,
        to: Shape,
    },

    /// A nested collection no longer points back at the property that owns it.
    ForeignMutation { property: String },

    /// A structural change was attempted without going through `add`/`delete`.
    IllegalDirectWrite { operation: &'static str },

    /// The entity is not a member of the collection it was looked up in.
    NotTracked(EntityId),

    /// The entity handle was not issued by this unit of work.
    UnknownEntity(EntityId),

    /// The collection handle was not issued by this unit of work.
    UnknownCollection(CollectionId),

    /// Only records and arrays of records can be tracked.
    NotTrackable(Shape),
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::InvalidState { status, operation } => {
                write!(f, "cannot {operation} an entity in state {status}")
            }
            TrackError::DuplicateTracking(id) => {
                write!(f, "entity {id} is already tracked by a collection")
            }
            TrackError::OutOfRange { index, len } => {
                write!(f, "index {index} is out of range for a collection of {len} items")
            }
            TrackError::TypeShapeViolation { property, from, to } => {
                write!(f, "property {property:?} cannot change from {from} to {to}")
            }
            TrackError::ForeignMutation { property } => write!(
                f,
                "nested value of property {property:?} was modified outside of its tracker"
            ),
            TrackError::IllegalDirectWrite { operation } => {
                write!(f, "{operation} is not allowed, use add/delete instead")
            }
            TrackError::NotTracked(id) => write!(f, "entity {id} is not part of the collection"),
            TrackError::UnknownEntity(id) => write!(f, "unknown entity {id}"),
            TrackError::UnknownCollection(id) => write!(f, "unknown collection {id}"),
            TrackError::NotTrackable(shape) => write!(f, "cannot track a value of shape {shape}"),
        }
    }
}

impl std::error::Error for TrackError {}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn messages() {
        let err = TrackError::InvalidState {
            status: Status::Invalid,
            operation: "apply",
        };
        assert_snapshot!(err.to_string(), @"cannot apply an entity in state invalid");

        let err = TrackError::TypeShapeViolation {
            property: "age".into(),
            from: Shape::Opaque,
            to: Shape::Record,
        };
        assert_snapshot!(err.to_string(), @r#"property "age" cannot change from opaque value to record"#);

        let err = TrackError::OutOfRange { index: 5, len: 4 };
        assert_snapshot!(err.to_string(), @"index 5 is out of range for a collection of 4 items");
    }
}
