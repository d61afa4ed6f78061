use crate::{Egid, Group};
use thiserror::Error;

/// Errors reported by [EntitiesDb](crate::EntitiesDb) operations.
///
/// Every error aborts only the operation that raised it; the database stays consistent.
#[derive(Debug, Error)]
pub enum EntitiesDbError {
    #[error("{0} does not exist")]
    UnknownEntity(Egid),

    #[error("{0} is not registered")]
    UnknownGroup(Group),

    #[error("{group} has no array registered for component `{component}`")]
    MissingComponentType {
        group: Group,
        component: &'static str,
    },

    #[error("{group} holds {count} `{component}` records, expected exactly one")]
    NotUnique {
        group: Group,
        component: &'static str,
        count: usize,
    },

    #[error("{group} is already registered with different settings")]
    DuplicateGroup { group: Group },

    #[error("{group} cannot be structurally changed while it is being iterated")]
    InvalidMutationDuringIteration { group: Group },

    #[error("`{component}` array of {group} is already borrowed by a running iteration")]
    ArrayInUse {
        group: Group,
        component: &'static str,
    },

    #[error("component set does not match the layout of {group}")]
    ComponentSetMismatch { group: Group },

    #[error("component `{component}` is listed more than once")]
    DuplicateComponentType { component: &'static str },

    #[error("{0} already exists")]
    DuplicateEntity(Egid),

    #[error("{0} is unique and already holds an entity")]
    UniqueGroupOccupied(Group),

    #[error("{0} ran out of entity identifiers")]
    IdSpaceExhausted(Group),

    #[error("change listener for `{component}` failed")]
    Listener {
        component: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T, E = EntitiesDbError> = std::result::Result<T, E>;
