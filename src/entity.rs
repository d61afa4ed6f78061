use std::fmt;

/// An entity identifier within a group.
pub type LocalId = u32;

/// A group identifier.
///
/// Groups are disjoint partitions of the database: every entity lives in exactly one group
/// and all entities of a group sharing a component type are stored contiguously.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Group(u32);

impl Group {
    /// Constructs a group identifier from an externally chosen number.
    pub const fn new(id: u32) -> Group {
        Group(id)
    }

    /// Returns the raw group number.
    pub const fn id(&self) -> u32 {
        self.0
    }
}

impl From<u32> for Group {
    fn from(id: u32) -> Self {
        Group(id)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group {}", self.0)
    }
}

/// An entity global identifier.
///
/// `id` is only unique inside `group`; entities are globally identified by the pair.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Egid {
    pub group: Group,
    pub id: LocalId,
}

impl Egid {
    /// Constructs a new entity identifier.
    pub const fn new(id: LocalId, group: Group) -> Egid {
        Egid { group, id }
    }
}

impl fmt::Display for Egid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity {} in group {}", self.id, self.group.0)
    }
}
