use crate::entity::LocalId;
use crate::HashMap;

/// Outcome of removing an entity row.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct SwapRemoval {
    /// The vacated row.
    pub index: usize,
    /// The entity that was relocated from the last row into `index`, if any.
    pub moved: Option<LocalId>,
}

/// Identity map of a group: translates local ids to rows of the group's dense arrays.
///
/// Ids are handed out by a monotonic counter and never recycled by the counter itself.
#[derive(Default)]
pub(crate) struct GroupEntities {
    indices: HashMap<LocalId, u32>,
    ids: Vec<LocalId>,
    next_id: LocalId,
}

impl GroupEntities {
    pub const MAX_ID: LocalId = u32::MAX - 1;

    /// Issues a fresh id. Returns `None` if the id space of the group is exhausted.
    pub fn allocate_id(&mut self) -> Option<LocalId> {
        if self.next_id > Self::MAX_ID {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        Some(id)
    }

    /// Reserves a caller-chosen id. Returns `false` if the id is live or out of range.
    pub fn claim_id(&mut self, id: LocalId) -> bool {
        if id > Self::MAX_ID || self.contains(id) {
            return false;
        }
        self.next_id = self.next_id.max(id + 1);
        true
    }

    /// Appends a row for `id` and returns its index.
    pub fn push(&mut self, id: LocalId) -> usize {
        let index = self.ids.len();
        self.ids.push(id);
        self.indices.insert(id, index as u32);
        index
    }

    /// Removes `id`, moving the entity of the last row into the vacated row.
    ///
    /// Mirrors the swap-removal of the dense arrays: after this call every live id
    /// resolves to the row its components will occupy once the arrays are swap-removed
    /// at the returned index.
    pub fn swap_remove(&mut self, id: LocalId) -> Option<SwapRemoval> {
        let index = self.indices.remove(&id)? as usize;
        let last = self.ids.len() - 1;
        self.ids.swap_remove(index);

        let moved = if index != last {
            let moved = self.ids[index];
            self.indices.insert(moved, index as u32);
            Some(moved)
        } else {
            None
        };

        Some(SwapRemoval { index, moved })
    }

    #[inline]
    pub fn index_of(&self, id: LocalId) -> Option<usize> {
        self.indices.get(&id).map(|v| *v as usize)
    }

    #[inline]
    pub fn id_at(&self, index: usize) -> Option<LocalId> {
        self.ids.get(index).copied()
    }

    pub fn contains(&self, id: LocalId) -> bool {
        self.indices.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}
