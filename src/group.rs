use crate::component::ComponentId;
use crate::error::{EntitiesDbError, Result};
use crate::Group;
use smallvec::SmallVec;
use std::collections::btree_map;
use std::collections::BTreeMap;

pub const MAX_LAYOUT_ON_STACK: usize = 16;

/// The role of a group.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroupKind {
    #[default]
    Standard,
    /// The group serves exactly one logical role.
    Exclusive,
    /// The group holds at most one entity (singleton records).
    Unique,
}

/// Registration settings of a group.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct GroupInfo {
    pub kind: GroupKind,
    /// Expected number of entities, used to size new dense arrays.
    pub capacity_hint: usize,
    pub tags: SmallVec<[&'static str; 4]>,
}

impl GroupInfo {
    pub fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_capacity(mut self, capacity_hint: usize) -> Self {
        self.capacity_hint = capacity_hint;
        self
    }

    /// Attaches a tag used by [GroupRegistry::tagged].
    pub fn with_tag(mut self, tag: &'static str) -> Self {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| *t == tag)
    }

    /// Two registrations are compatible if they describe the same purpose.
    fn is_compatible(&self, other: &GroupInfo) -> bool {
        self.kind == other.kind
            && self.tags.len() == other.tags.len()
            && self.tags.iter().all(|t| other.has_tag(t))
    }
}

/// Issues and tracks groups. Groups are never removed.
pub struct GroupRegistry {
    groups: BTreeMap<Group, GroupInfo>,
    /// `None` once `u32::MAX` has been issued.
    next_id: Option<u32>,
}

impl GroupRegistry {
    /// Creates a registry whose [allocate](Self::allocate) starts at `first_id`.
    pub fn new(first_id: u32) -> Self {
        Self {
            groups: BTreeMap::new(),
            next_id: Some(first_id),
        }
    }

    /// Issues a new standard group.
    pub fn allocate(&mut self, capacity_hint: usize) -> Result<Group> {
        self.allocate_with(GroupInfo::default().with_capacity(capacity_hint))
    }

    /// Issues a new group with the given settings, skipping ids registered externally.
    pub fn allocate_with(&mut self, info: GroupInfo) -> Result<Group> {
        loop {
            let id = self
                .next_id
                .ok_or(EntitiesDbError::IdSpaceExhausted(Group::new(u32::MAX)))?;
            let group = Group::new(id);
            self.next_id = id.checked_add(1);

            if let btree_map::Entry::Vacant(e) = self.groups.entry(group) {
                e.insert(info);
                return Ok(group);
            }
        }
    }

    /// Registers an externally chosen group id.
    ///
    /// Registering the same id again with a compatible kind and tag set is a no-op that
    /// returns `false`; an incompatible registration fails with `DuplicateGroup`.
    pub fn register(&mut self, group: Group, info: GroupInfo) -> Result<bool> {
        match self.groups.entry(group) {
            btree_map::Entry::Vacant(e) => {
                e.insert(info);
                Ok(true)
            }
            btree_map::Entry::Occupied(mut e) => {
                if !e.get().is_compatible(&info) {
                    return Err(EntitiesDbError::DuplicateGroup { group });
                }
                let existing = e.get_mut();
                existing.capacity_hint = existing.capacity_hint.max(info.capacity_hint);
                Ok(false)
            }
        }
    }

    pub fn exists(&self, group: Group) -> bool {
        self.groups.contains_key(&group)
    }

    pub fn info(&self, group: Group) -> Option<&GroupInfo> {
        self.groups.get(&group)
    }

    /// Returns all groups in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (Group, &GroupInfo)> + '_ {
        self.groups.iter().map(|(g, info)| (*g, info))
    }

    /// Returns the groups carrying `tag` in ascending id order.
    pub fn tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = Group> + 'a {
        self.groups
            .iter()
            .filter(move |(_, info)| info.has_tag(tag))
            .map(|(g, _)| *g)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new(0)
    }
}

/// The sorted set of component types stored by a group.
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash)]
pub(crate) struct GroupLayout {
    sorted_ids: SmallVec<[ComponentId; MAX_LAYOUT_ON_STACK]>,
}

impl GroupLayout {
    pub fn new(ids: &[ComponentId]) -> GroupLayout {
        let mut sorted_ids: SmallVec<_> = ids.iter().copied().collect();
        sorted_ids.sort_unstable();
        GroupLayout { sorted_ids }
    }

    /// Returns the first component id that occurs more than once.
    pub fn first_duplicate(&self) -> Option<ComponentId> {
        self.sorted_ids
            .windows(2)
            .find(|w| w[0] == w[1])
            .map(|w| w[0])
    }

    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.sorted_ids.binary_search(&id).is_ok()
    }

    pub fn insert(&mut self, id: ComponentId) {
        if let Err(pos) = self.sorted_ids.binary_search(&id) {
            self.sorted_ids.insert(pos, id);
        }
    }

    pub fn ids(&self) -> &[ComponentId] {
        &self.sorted_ids
    }
}
