use super::EntitiesDb;
use crate::component::ComponentId;
use crate::entity::LocalId;
use crate::error::{EntitiesDbError, Result};
use crate::notify::LifecycleEvent;
use crate::storage::array::{DenseArray, RawArray};
use crate::storage::entities::GroupEntities;
use crate::storage::missing_component;
use crate::{Component, Egid, Group};
use smallvec::SmallVec;
use std::any::type_name;
use std::panic::{self, AssertUnwindSafe};

/// Context passed to iteration actions alongside the component.
pub struct EntityActionData<'a> {
    /// The database, usable for any operation that does not restructure the iterated group.
    pub entities_db: &'a mut EntitiesDb,
    pub egid: Egid,
    /// Row of the entity in its group's arrays.
    pub index: usize,
}

/// Random access to the components of one group by local id.
///
/// Holds the identity map of the group and the array of `T` for its lifetime,
/// so repeated lookups skip group resolution.
pub struct EgidMapper<'a, T> {
    group: Group,
    entities: &'a GroupEntities,
    components: &'a mut [T],
}

impl<'a, T: Component> EgidMapper<'a, T> {
    pub fn group(&self) -> Group {
        self.group
    }

    /// Returns the row of entity `id`.
    #[inline]
    pub fn find_index(&self, id: LocalId) -> Option<usize> {
        self.entities.index_of(id)
    }

    pub fn contains(&self, id: LocalId) -> bool {
        self.entities.contains(id)
    }

    pub fn entity(&self, id: LocalId) -> Result<&T> {
        self.try_entity(id)
            .ok_or(EntitiesDbError::UnknownEntity(Egid::new(id, self.group)))
    }

    pub fn entity_mut(&mut self, id: LocalId) -> Result<&mut T> {
        let group = self.group;
        self.try_entity_mut(id)
            .ok_or(EntitiesDbError::UnknownEntity(Egid::new(id, group)))
    }

    #[inline]
    pub fn try_entity(&self, id: LocalId) -> Option<&T> {
        self.components.get(self.find_index(id)?)
    }

    #[inline]
    pub fn try_entity_mut(&mut self, id: LocalId) -> Option<&mut T> {
        let index = self.find_index(id)?;
        self.components.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl EntitiesDb {
    /// Returns the dense array of `T` in `group`.
    ///
    /// Fails with [MissingComponentType](EntitiesDbError::MissingComponentType) if the group
    /// does not store `T`; a group storing `T` without entities yields an empty slice.
    pub fn query_entities<T: Component>(&self, group: Group) -> Result<&[T]> {
        let id = self.component_id::<T>(group)?;
        Ok(self.storage(group)?.typed::<T>(id)?.as_slice())
    }

    pub fn query_entities_mut<T: Component>(&mut self, group: Group) -> Result<&mut [T]> {
        let id = self.component_id::<T>(group)?;
        Ok(self.storage_mut(group)?.typed_mut::<T>(id)?.as_mut_slice())
    }

    /// Returns an unchecked view of the dense array of `T` in `group`.
    ///
    /// The view does not borrow the database. It must not be dereferenced after the next
    /// structural change of `group` (build, remove or group swap); see [RawArray].
    pub fn query_entities_raw<T: Component>(&mut self, group: Group) -> Result<RawArray<T>> {
        let id = self.component_id::<T>(group)?;
        Ok(self.storage_mut(group)?.typed_mut::<T>(id)?.raw())
    }

    /// Returns the index-aligned arrays of `A` and `B` in `group`.
    pub fn query_entities2<A: Component, B: Component>(&self, group: Group) -> Result<(&[A], &[B])> {
        let storage = self.storage(group)?;
        let a = storage.typed::<A>(self.component_id::<A>(group)?)?;
        let b = storage.typed::<B>(self.component_id::<B>(group)?)?;
        Ok((a.as_slice(), b.as_slice()))
    }

    pub fn query_entities3<A: Component, B: Component, C: Component>(
        &self,
        group: Group,
    ) -> Result<(&[A], &[B], &[C])> {
        let storage = self.storage(group)?;
        let a = storage.typed::<A>(self.component_id::<A>(group)?)?;
        let b = storage.typed::<B>(self.component_id::<B>(group)?)?;
        let c = storage.typed::<C>(self.component_id::<C>(group)?)?;
        Ok((a.as_slice(), b.as_slice(), c.as_slice()))
    }

    pub fn query_entities2_mut<A: Component, B: Component>(
        &mut self,
        group: Group,
    ) -> Result<(&mut [A], &mut [B])> {
        let ids = [self.component_id::<A>(group)?, self.component_id::<B>(group)?];
        self.check_joined_ids(group, &ids, &[type_name::<A>(), type_name::<B>()])?;

        let [a, b] = self.storage_mut(group)?.slots_disjoint_mut(ids)?;
        Ok((
            a.typed_mut::<A>(group)?.as_mut_slice(),
            b.typed_mut::<B>(group)?.as_mut_slice(),
        ))
    }

    pub fn query_entities3_mut<A: Component, B: Component, C: Component>(
        &mut self,
        group: Group,
    ) -> Result<(&mut [A], &mut [B], &mut [C])> {
        let ids = [
            self.component_id::<A>(group)?,
            self.component_id::<B>(group)?,
            self.component_id::<C>(group)?,
        ];
        let names = [type_name::<A>(), type_name::<B>(), type_name::<C>()];
        self.check_joined_ids(group, &ids, &names)?;

        let [a, b, c] = self.storage_mut(group)?.slots_disjoint_mut(ids)?;
        Ok((
            a.typed_mut::<A>(group)?.as_mut_slice(),
            b.typed_mut::<B>(group)?.as_mut_slice(),
            c.typed_mut::<C>(group)?.as_mut_slice(),
        ))
    }

    /// Joined mutable queries need every type present and listed once.
    fn check_joined_ids(&self, group: Group, ids: &[ComponentId], names: &[&'static str]) -> Result<()> {
        let storage = self.storage(group)?;
        for (i, (&id, &name)) in ids.iter().zip(names).enumerate() {
            if ids[..i].contains(&id) {
                return Err(EntitiesDbError::DuplicateComponentType { component: name });
            }
            if !storage.has_array(id) {
                return Err(EntitiesDbError::MissingComponentType { group, component: name });
            }
        }
        Ok(())
    }

    /// Resolves the row of `egid` and returns it with the dense array of `T` of its group.
    pub fn query_entities_and_index<T: Component>(&self, egid: Egid) -> Result<(usize, &[T])> {
        let (index, id) = self.resolve::<T>(egid)?;
        let array = self.storage(egid.group)?.typed::<T>(id)?;
        Ok((index, array.as_slice()))
    }

    pub fn query_entities_and_index_mut<T: Component>(
        &mut self,
        egid: Egid,
    ) -> Result<(usize, &mut [T])> {
        let (index, id) = self.resolve::<T>(egid)?;
        let array = self.storage_mut(egid.group)?.typed_mut::<T>(id)?;
        Ok((index, array.as_mut_slice()))
    }

    /// Like [query_entities_and_index](Self::query_entities_and_index), but reports any
    /// failure as `None`.
    pub fn try_query_entities_and_index<T: Component>(&self, egid: Egid) -> Option<(usize, &[T])> {
        self.query_entities_and_index(egid).ok()
    }

    pub fn try_query_entities_and_index_mut<T: Component>(
        &mut self,
        egid: Egid,
    ) -> Option<(usize, &mut [T])> {
        self.query_entities_and_index_mut(egid).ok()
    }

    /// Returns the component `T` of entity `egid`.
    pub fn query_entity<T: Component>(&self, egid: Egid) -> Result<&T> {
        let (index, array) = self.query_entities_and_index::<T>(egid)?;
        array.get(index).ok_or(EntitiesDbError::UnknownEntity(egid))
    }

    pub fn query_entity_mut<T: Component>(&mut self, egid: Egid) -> Result<&mut T> {
        let (index, array) = self.query_entities_and_index_mut::<T>(egid)?;
        array.get_mut(index).ok_or(EntitiesDbError::UnknownEntity(egid))
    }

    /// Returns the only `T` record of `group`.
    ///
    /// Fails with [NotUnique](EntitiesDbError::NotUnique) unless the group holds exactly one.
    pub fn query_unique<T: Component>(&self, group: Group) -> Result<&T> {
        match self.query_entities::<T>(group)? {
            [value] => Ok(value),
            array => Err(not_unique::<T>(group, array.len())),
        }
    }

    pub fn query_unique_mut<T: Component>(&mut self, group: Group) -> Result<&mut T> {
        match self.query_entities_mut::<T>(group)? {
            [value] => Ok(value),
            array => Err(not_unique::<T>(group, array.len())),
        }
    }

    /// Returns a mapper for repeated local-id lookups of `T` in `group`.
    pub fn query_mapped<T: Component>(&mut self, group: Group) -> Result<EgidMapper<'_, T>> {
        let id = self.component_id::<T>(group)?;
        let (entities, array) = self.storage_mut(group)?.indices_and_array_mut::<T>(id)?;
        Ok(EgidMapper {
            group,
            entities,
            components: array.as_mut_slice(),
        })
    }

    /// Invokes `action` for every `T` of `group` in storage order.
    ///
    /// The action receives the database through [EntityActionData]. While it runs, the
    /// group rejects builds, removals and swaps with
    /// [InvalidMutationDuringIteration](EntitiesDbError::InvalidMutationDuringIteration),
    /// and the array of `T` rejects further borrows with
    /// [ArrayInUse](EntitiesDbError::ArrayInUse). The first error returned by the action
    /// stops the iteration. A panicking action releases the array before unwinding.
    pub fn execute_on_entities<T, F>(&mut self, group: Group, mut action: F) -> Result<()>
    where
        T: Component,
        F: FnMut(&mut T, EntityActionData<'_>) -> Result<()>,
    {
        self.with_checked_out::<T, _>(group, |db, slot, array| {
            db.drive_rows::<T, F>(slot, group, array, &mut action)
        })
    }

    /// Checks the array of `T` out of `group` for the duration of `f`.
    ///
    /// The array is checked back in whether `f` returns or unwinds.
    fn with_checked_out<T, R>(
        &mut self,
        group: Group,
        f: impl FnOnce(&mut Self, usize, &mut DenseArray<T>) -> Result<R>,
    ) -> Result<R>
    where
        T: Component,
    {
        let id = self.component_id::<T>(group)?;
        let slot = self.slot_of(group)?;
        let mut array = self.storages[slot].check_out::<T>(id)?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            match array.as_any_mut().downcast_mut::<DenseArray<T>>() {
                Some(array) => f(self, slot, array),
                None => Err(missing_component::<T>(group)),
            }
        }));

        self.storages[slot].check_in(id, array);
        outcome.unwrap_or_else(|payload| panic::resume_unwind(payload))
    }

    fn drive_rows<T, F>(
        &mut self,
        slot: usize,
        group: Group,
        array: &mut DenseArray<T>,
        action: &mut F,
    ) -> Result<()>
    where
        T: Component,
        F: FnMut(&mut T, EntityActionData<'_>) -> Result<()>,
    {
        for (index, component) in array.as_mut_slice().iter_mut().enumerate() {
            let Some(id) = self.storages[slot].entities.id_at(index) else {
                break;
            };
            action(
                component,
                EntityActionData {
                    entities_db: &mut *self,
                    egid: Egid::new(id, group),
                    index,
                },
            )?;
        }
        Ok(())
    }

    /// Runs [execute_on_entities](Self::execute_on_entities) on each of `groups` in the
    /// given order, skipping groups that do not store `T`.
    pub fn execute_on_groups<T, F>(&mut self, groups: &[Group], mut action: F) -> Result<()>
    where
        T: Component,
        F: FnMut(&mut T, EntityActionData<'_>) -> Result<()>,
    {
        let Some(id) = self.components.id_of::<T>() else {
            return Ok(());
        };
        for &group in groups {
            if self.storage(group)?.has_array(id) {
                self.execute_on_entities::<T, _>(group, &mut action)?;
            }
        }
        Ok(())
    }

    /// Runs [execute_on_entities](Self::execute_on_entities) on every group storing `T`,
    /// in ascending group id order.
    pub fn execute_on_all_entities<T, F>(&mut self, action: F) -> Result<()>
    where
        T: Component,
        F: FnMut(&mut T, EntityActionData<'_>) -> Result<()>,
    {
        let groups: SmallVec<[Group; 16]> = self.groups_with::<T>().collect();
        self.execute_on_groups::<T, F>(&groups, action)
    }

    /// Passes the whole dense array of `T` of every group storing it to `action`, in
    /// ascending group id order.
    ///
    /// Each array is checked out while its callback runs, with the same restrictions on
    /// its group as [execute_on_entities](Self::execute_on_entities).
    pub fn execute_on_all_arrays<T, F>(&mut self, mut action: F) -> Result<()>
    where
        T: Component,
        F: FnMut(&mut [T], Group, &mut EntitiesDb) -> Result<()>,
    {
        let groups: SmallVec<[Group; 16]> = self.groups_with::<T>().collect();
        for group in groups {
            self.with_checked_out::<T, _>(group, |db, _, array| {
                action(array.as_mut_slice(), group, db)
            })?;
        }
        Ok(())
    }

    /// Returns the groups storing `T` in ascending id order.
    pub fn groups_with<T: Component>(&self) -> impl Iterator<Item = Group> + '_ {
        let id = self.components.id_of::<T>();
        self.groups.iter().map(|(g, _)| g).filter(move |&g| {
            id.zip(self.storage(g).ok())
                .is_some_and(|(id, storage)| storage.has_array(id))
        })
    }

    /// Checks whether entity `egid` exists and has a `T`.
    pub fn exists<T: Component>(&self, egid: Egid) -> bool {
        match (self.components.id_of::<T>(), self.storage(egid.group)) {
            (Some(id), Ok(storage)) => storage.resolve(egid.id, id).is_some(),
            _ => false,
        }
    }

    /// Checks whether `group` holds at least one `T`.
    pub fn has_any<T: Component>(&self, group: Group) -> bool {
        self.count::<T>(group) > 0
    }

    /// Returns the number of `T` records in `group`; zero if the group does not store `T`.
    pub fn count<T: Component>(&self, group: Group) -> usize {
        match (self.components.id_of::<T>(), self.storage(group)) {
            (Some(id), Ok(storage)) if storage.has_array(id) => storage.len(),
            _ => 0,
        }
    }

    /// Delivers the current `T` of `egid` to every change listener of `T`.
    ///
    /// Listeners run synchronously in subscription order; the first listener error is
    /// returned as [Listener](EntitiesDbError::Listener).
    pub fn publish_entity_change<T: Component>(&mut self, egid: Egid) -> Result<()> {
        let value = *self.query_entity::<T>(egid)?;
        let id = self.components.register::<T>();
        self.notifier.publish(id, egid, &value)
    }

    /// Subscribes `listener` to changes of `T` published with
    /// [publish_entity_change](Self::publish_entity_change).
    pub fn subscribe_changes<T, F>(&mut self, listener: F)
    where
        T: Component,
        F: FnMut(Egid, &T) -> anyhow::Result<()> + Send + 'static,
    {
        let id = self.components.register::<T>();
        self.notifier.subscribe::<T, F>(id, listener);
    }

    /// Subscribes `listener` to additions and removals of entities carrying `T`.
    ///
    /// `Added` is delivered after a build or an incoming group swap; `Removed` before a
    /// removal or an outgoing group swap.
    pub fn subscribe_lifecycle<T, F>(&mut self, listener: F)
    where
        T: Component,
        F: FnMut(Egid, &T, LifecycleEvent) + Send + 'static,
    {
        let id = self.components.register::<T>();
        self.notifier.subscribe_lifecycle::<T, F>(id, listener);
    }

    /// Applies `f` to every `T` of `group` on the rayon thread pool.
    #[cfg(feature = "rayon")]
    pub fn par_for_each_mut<T, F>(&mut self, group: Group, f: F) -> Result<()>
    where
        T: Component,
        F: Fn(&mut T) + Send + Sync,
    {
        use rayon::prelude::*;

        self.query_entities_mut::<T>(group)?.par_iter_mut().for_each(f);
        Ok(())
    }

    /// Resolves the row of `egid` for component `T`.
    fn resolve<T: Component>(&self, egid: Egid) -> Result<(usize, ComponentId)> {
        let storage = self.storage(egid.group)?;
        let index = storage
            .entities
            .index_of(egid.id)
            .ok_or(EntitiesDbError::UnknownEntity(egid))?;
        let id = self.component_id::<T>(egid.group)?;
        if !storage.has_array(id) {
            return Err(missing_component::<T>(egid.group));
        }
        Ok((index, id))
    }
}

fn not_unique<T>(group: Group, count: usize) -> EntitiesDbError {
    EntitiesDbError::NotUnique {
        group,
        component: type_name::<T>(),
        count,
    }
}
