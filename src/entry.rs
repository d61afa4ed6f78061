use crate::component::ComponentRegistry;
use crate::storage::GroupStorage;
use crate::{Component, Egid};

/// An immutable entry of a live entity.
/// Provides access to all components of the entity without resolving it again.
pub struct Entry<'a> {
    pub(crate) components: &'a ComponentRegistry,
    pub(crate) storage: &'a GroupStorage,
    pub(crate) egid: Egid,
    pub(crate) index: usize,
}

impl<'a> Entry<'a> {
    /// Returns underlying entity.
    pub fn egid(&self) -> Egid {
        self.egid
    }

    /// Returns the row of the entity in its group's arrays.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns a reference to the component `C` of the entity.
    pub fn get<C: Component>(&self) -> Option<&'a C> {
        let id = self.components.id_of::<C>()?;
        let array = self.storage.typed::<C>(id).ok()?;
        array.as_slice().get(self.index)
    }
}

/// A mutable entry of a live entity.
pub struct EntryMut<'a> {
    pub(crate) components: &'a ComponentRegistry,
    pub(crate) storage: &'a mut GroupStorage,
    pub(crate) egid: Egid,
    pub(crate) index: usize,
}

impl EntryMut<'_> {
    pub fn egid(&self) -> Egid {
        self.egid
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns a reference to the component `C` of the entity.
    pub fn get<C: Component>(&self) -> Option<&C> {
        let id = self.components.id_of::<C>()?;
        let array = self.storage.typed::<C>(id).ok()?;
        array.as_slice().get(self.index)
    }

    /// Returns a mutable reference to the component `C` of the entity.
    pub fn get_mut<C: Component>(&mut self) -> Option<&mut C> {
        let id = self.components.id_of::<C>()?;
        let array = self.storage.typed_mut::<C>(id).ok()?;
        array.as_mut_slice().get_mut(self.index)
    }
}
