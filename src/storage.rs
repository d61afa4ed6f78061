pub(crate) mod array;
pub(crate) mod entities;

use crate::component::{ComponentId, ComponentRegistry};
use crate::descriptor::RowWriter;
use crate::entity::LocalId;
use crate::error::{EntitiesDbError, Result};
use crate::group::GroupLayout;
use crate::{Component, Group};
use array::{DenseArray, ErasedArray};
use entities::{GroupEntities, SwapRemoval};
use std::any::{type_name, Any};
use std::mem;

/// A slot of a group's array table, indexed by [ComponentId].
#[derive(Default)]
pub(crate) enum ArraySlot {
    #[default]
    Vacant,
    Present(Box<dyn ErasedArray>),
    /// The array is temporarily owned by a running iteration.
    CheckedOut,
}

impl ArraySlot {
    #[inline]
    fn erased(&self) -> Option<&dyn ErasedArray> {
        match self {
            ArraySlot::Present(array) => Some(array.as_ref()),
            _ => None,
        }
    }

    #[inline]
    fn erased_mut(&mut self) -> Option<&mut dyn ErasedArray> {
        match self {
            ArraySlot::Present(array) => Some(array.as_mut()),
            _ => None,
        }
    }

    #[inline]
    pub fn dense<T: Component>(&self) -> Option<&DenseArray<T>> {
        self.erased()?.as_any().downcast_ref()
    }

    #[inline]
    pub fn dense_mut<T: Component>(&mut self) -> Option<&mut DenseArray<T>> {
        self.erased_mut()?.as_any_mut().downcast_mut()
    }

    /// Returns the typed array or the error explaining why it is not accessible.
    pub fn typed<T: Component>(&self, group: Group) -> Result<&DenseArray<T>> {
        match self {
            ArraySlot::CheckedOut => Err(array_in_use::<T>(group)),
            _ => self.dense().ok_or_else(|| missing_component::<T>(group)),
        }
    }

    pub fn typed_mut<T: Component>(&mut self, group: Group) -> Result<&mut DenseArray<T>> {
        if let ArraySlot::CheckedOut = self {
            return Err(array_in_use::<T>(group));
        }
        self.dense_mut().ok_or_else(|| missing_component::<T>(group))
    }
}

pub(crate) fn missing_component<T>(group: Group) -> EntitiesDbError {
    EntitiesDbError::MissingComponentType {
        group,
        component: type_name::<T>(),
    }
}

fn array_in_use<T>(group: Group) -> EntitiesDbError {
    EntitiesDbError::ArrayInUse {
        group,
        component: type_name::<T>(),
    }
}

/// Storage of one group: an index-aligned dense array per component type of the group's
/// layout, and the identity map translating local ids to rows.
///
/// Row `i` of every array belongs to the entity `entities.id_at(i)`.
pub(crate) struct GroupStorage {
    group: Group,
    capacity_hint: usize,
    layout: GroupLayout,
    arrays: Vec<ArraySlot>,
    pub(crate) entities: GroupEntities,
    checked_out: usize,
}

impl GroupStorage {
    pub fn new(group: Group, capacity_hint: usize) -> Self {
        Self {
            group,
            capacity_hint,
            layout: Default::default(),
            arrays: Vec::new(),
            entities: Default::default(),
            checked_out: 0,
        }
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn layout(&self) -> &GroupLayout {
        &self.layout
    }

    pub fn set_capacity_hint(&mut self, capacity_hint: usize) {
        self.capacity_hint = self.capacity_hint.max(capacity_hint);
    }

    /// Returns the number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` while at least one array of the group is checked out by an iteration.
    pub fn is_iterating(&self) -> bool {
        self.checked_out > 0
    }

    /// Fails if the group may not be structurally changed right now.
    pub fn ensure_mutable(&self) -> Result<()> {
        if self.is_iterating() {
            return Err(EntitiesDbError::InvalidMutationDuringIteration { group: self.group });
        }
        Ok(())
    }

    #[inline]
    pub fn has_array(&self, id: ComponentId) -> bool {
        self.layout.contains(id)
    }

    pub fn typed<T: Component>(&self, id: ComponentId) -> Result<&DenseArray<T>> {
        match self.arrays.get(id as usize) {
            Some(slot) => slot.typed(self.group),
            None => Err(missing_component::<T>(self.group)),
        }
    }

    pub fn typed_mut<T: Component>(&mut self, id: ComponentId) -> Result<&mut DenseArray<T>> {
        match self.arrays.get_mut(id as usize) {
            Some(slot) => slot.typed_mut(self.group),
            None => Err(missing_component::<T>(self.group)),
        }
    }

    /// Borrows several distinct slots at once. Callers check presence and distinctness first.
    pub fn slots_disjoint_mut<const N: usize>(
        &mut self,
        ids: [ComponentId; N],
    ) -> Result<[&mut ArraySlot; N]> {
        let group = self.group;
        self.arrays
            .get_disjoint_mut(ids.map(|id| id as usize))
            .map_err(|_| EntitiesDbError::ComponentSetMismatch { group })
    }

    /// Returns the component `id` of the entity at `index` for type-erased consumers.
    pub fn component_any(&self, id: ComponentId, index: usize) -> Option<&dyn Any> {
        self.arrays.get(id as usize)?.erased()?.get_any(index)
    }

    /// Makes the group store exactly the component set of `layout`.
    ///
    /// An empty group may grow its layout (arrays installed by preallocation are kept);
    /// a group holding entities only accepts its current layout.
    pub fn adopt_layout(
        &mut self,
        layout: &GroupLayout,
        components: &ComponentRegistry,
        default_capacity: usize,
    ) -> Result<()> {
        if &self.layout == layout {
            return Ok(());
        }
        let grows = self.layout.ids().iter().all(|&id| layout.contains(id));
        if !grows || self.len() > 0 {
            return Err(EntitiesDbError::ComponentSetMismatch { group: self.group });
        }

        let capacity = self.capacity_hint.max(default_capacity);
        for &id in layout.ids() {
            if !self.layout.contains(id) {
                self.install_array(id, components, capacity);
            }
        }
        self.layout = layout.clone();
        Ok(())
    }

    /// Splits the group into its identity map and the array of `T`.
    pub fn indices_and_array_mut<T: Component>(
        &mut self,
        id: ComponentId,
    ) -> Result<(&GroupEntities, &mut DenseArray<T>)> {
        let group = self.group;
        let array = match self.arrays.get_mut(id as usize) {
            Some(slot) => slot.typed_mut(group)?,
            None => return Err(missing_component::<T>(group)),
        };
        Ok((&self.entities, array))
    }

    /// Adds a single array to the layout of an empty group.
    pub fn add_array(
        &mut self,
        id: ComponentId,
        components: &ComponentRegistry,
        capacity: usize,
    ) -> Result<()> {
        if self.layout.contains(id) {
            return Ok(());
        }
        if self.len() > 0 {
            return Err(EntitiesDbError::ComponentSetMismatch { group: self.group });
        }
        self.install_array(id, components, capacity);
        self.layout.insert(id);
        Ok(())
    }

    fn install_array(&mut self, id: ComponentId, components: &ComponentRegistry, capacity: usize) {
        let Some(info) = components.info(id) else {
            return;
        };
        let idx = id as usize;
        if self.arrays.len() <= idx {
            self.arrays.resize_with(idx + 1, Default::default);
        }
        self.arrays[idx] = ArraySlot::Present((info.new_array)(capacity));
    }

    /// Reserves room for `capacity` rows in every array of the layout.
    pub fn reserve_all(&mut self, capacity: usize) {
        for &id in self.layout.ids() {
            if let Some(array) = self.arrays[id as usize].erased_mut() {
                array.reserve_total(capacity);
            }
        }
    }

    pub fn reserve(&mut self, id: ComponentId, capacity: usize) {
        if let Some(array) = self.arrays.get_mut(id as usize).and_then(ArraySlot::erased_mut) {
            array.reserve_total(capacity);
        }
    }

    pub fn row_writer<'a>(&'a mut self, components: &'a ComponentRegistry) -> RowWriter<'a> {
        RowWriter::new(components, &mut self.arrays)
    }

    /// Records the row appended through a [RowWriter] under `id`.
    ///
    /// If the writer did not append exactly one element to every array of the layout,
    /// the partial row is rolled back and the group is left unchanged.
    pub fn commit_row(&mut self, id: LocalId) -> Result<usize> {
        let len = self.len();
        let aligned = self.layout.ids().iter().all(|&cid| {
            self.arrays[cid as usize]
                .erased()
                .map_or(false, |array| array.len() == len + 1)
        });

        if !aligned {
            for &cid in self.layout.ids() {
                if let Some(array) = self.arrays[cid as usize].erased_mut() {
                    array.truncate(len);
                }
            }
            return Err(EntitiesDbError::ComponentSetMismatch { group: self.group });
        }

        Ok(self.entities.push(id))
    }

    /// Returns the row of entity `id` if the group stores component `component`.
    #[inline]
    pub fn resolve(&self, id: LocalId, component: ComponentId) -> Option<usize> {
        if !self.layout.contains(component) {
            return None;
        }
        self.entities.index_of(id)
    }

    /// Removes entity `id` from the identity map and from every array of the layout.
    pub fn swap_remove(&mut self, id: LocalId) -> Option<SwapRemoval> {
        debug_assert!(!self.is_iterating());
        let removal = self.entities.swap_remove(id)?;

        for &cid in self.layout.ids() {
            if let Some(array) = self.arrays[cid as usize].erased_mut() {
                array.swap_remove(removal.index);
            }
        }

        Some(removal)
    }

    /// Moves entity `id` into `dst` under `dst_id`. Both groups must share the same layout.
    ///
    /// Returns the source removal and the row of the entity in `dst`.
    pub fn move_row_into(
        &mut self,
        id: LocalId,
        dst: &mut GroupStorage,
        dst_id: LocalId,
    ) -> Option<(SwapRemoval, usize)> {
        debug_assert!(!self.is_iterating() && !dst.is_iterating());
        debug_assert_eq!(self.layout, dst.layout);
        let removal = self.entities.swap_remove(id)?;

        for &cid in self.layout.ids() {
            let src_array = self.arrays[cid as usize].erased_mut();
            let dst_array = dst.arrays.get_mut(cid as usize).and_then(ArraySlot::erased_mut);
            if let (Some(src_array), Some(dst_array)) = (src_array, dst_array) {
                src_array.swap_remove_into(removal.index, dst_array);
            }
        }

        Some((removal, dst.entities.push(dst_id)))
    }

    /// Takes the array of `T` out of its slot for the duration of an iteration.
    pub fn check_out<T: Component>(&mut self, id: ComponentId) -> Result<Box<dyn ErasedArray>> {
        let group = self.group;
        let slot = self
            .arrays
            .get_mut(id as usize)
            .ok_or_else(|| missing_component::<T>(group))?;
        slot.typed::<T>(group)?;

        match mem::replace(slot, ArraySlot::CheckedOut) {
            ArraySlot::Present(array) => {
                self.checked_out += 1;
                Ok(array)
            }
            other => {
                *slot = other;
                Err(missing_component::<T>(group))
            }
        }
    }

    /// Returns an array taken by [check_out](Self::check_out).
    pub fn check_in(&mut self, id: ComponentId, array: Box<dyn ErasedArray>) {
        if let Some(slot @ ArraySlot::CheckedOut) = self.arrays.get_mut(id as usize) {
            *slot = ArraySlot::Present(array);
            self.checked_out -= 1;
        }
    }
}
