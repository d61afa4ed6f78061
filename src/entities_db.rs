mod query;

pub use query::{EgidMapper, EntityActionData};

use crate::component::{ComponentId, ComponentRegistry};
use crate::config::EntitiesDbConfig;
use crate::descriptor::EntityDescriptor;
use crate::entity::LocalId;
use crate::entry::{Entry, EntryMut};
use crate::error::{EntitiesDbError, Result};
use crate::group::{GroupInfo, GroupKind, GroupLayout, GroupRegistry};
use crate::notify::{ChangeNotifier, LifecycleEvent};
use crate::storage::entities::GroupEntities;
use crate::storage::{missing_component, GroupStorage};
use crate::{Component, Egid, Group, HashMap};
use tracing::{debug, trace, warn};

/// An in-memory entity/component database.
///
/// Entities live in disjoint groups. Inside a group every component type is stored in a
/// dense array and all arrays are index-aligned: row `i` of each array belongs to the
/// same entity. Removal is a swap-removal, so rows are compacted and the identity map
/// is repointed for the entity that moved.
pub struct EntitiesDb {
    config: EntitiesDbConfig,
    components: ComponentRegistry,
    groups: GroupRegistry,
    storages: Vec<GroupStorage>,
    storages_by_groups: HashMap<Group, usize>,
    notifier: ChangeNotifier,
}

impl EntitiesDb {
    /// Creates an empty database with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EntitiesDbConfig::default())
    }

    pub fn with_config(config: EntitiesDbConfig) -> Self {
        Self {
            groups: GroupRegistry::new(config.first_group_id),
            config,
            components: ComponentRegistry::new(),
            storages: Vec::new(),
            storages_by_groups: HashMap::default(),
            notifier: ChangeNotifier::default(),
        }
    }

    pub fn config(&self) -> &EntitiesDbConfig {
        &self.config
    }

    /// Returns the registry of component types seen by this database.
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// Issues a new standard group.
    pub fn allocate_group(&mut self, capacity_hint: usize) -> Result<Group> {
        self.allocate_group_with(GroupInfo::default().with_capacity(capacity_hint))
    }

    /// Issues a new group with the given settings.
    pub fn allocate_group_with(&mut self, info: GroupInfo) -> Result<Group> {
        let capacity_hint = info.capacity_hint;
        let group = self.groups.allocate_with(info)?;
        self.add_storage(group, capacity_hint);
        debug!(group = %group, capacity_hint, "allocated group");
        Ok(group)
    }

    /// Registers an externally chosen group id.
    ///
    /// Registering the same group again with the same kind and tags is allowed.
    pub fn register_group(&mut self, group: Group, info: GroupInfo) -> Result<()> {
        let capacity_hint = info.capacity_hint;
        if self.groups.register(group, info)? {
            self.add_storage(group, capacity_hint);
            debug!(group = %group, capacity_hint, "registered group");
        } else {
            let slot = self.slot_of(group)?;
            self.storages[slot].set_capacity_hint(capacity_hint);
        }
        Ok(())
    }

    fn add_storage(&mut self, group: Group, capacity_hint: usize) {
        self.storages_by_groups.insert(group, self.storages.len());
        self.storages.push(GroupStorage::new(group, capacity_hint));
    }

    /// Checks whether `group` has been allocated or registered.
    pub fn exists_group(&self, group: Group) -> bool {
        self.groups.exists(group)
    }

    /// Returns the groups carrying `tag` in ascending id order.
    pub fn groups_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = Group> + 'a {
        self.groups.tagged(tag)
    }

    /// Returns the number of live entities in `group`.
    pub fn group_len(&self, group: Group) -> Result<usize> {
        Ok(self.storage(group)?.len())
    }

    /// Returns the total number of live entities.
    pub fn len(&self) -> usize {
        self.storages.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a new entity in `group` and returns its identifier.
    ///
    /// The first build into an empty group fixes the group's component set; subsequent
    /// builds must supply exactly the same component types.
    pub fn build_entity<D: EntityDescriptor>(&mut self, group: Group, descriptor: D) -> Result<Egid> {
        self.build(group, None, descriptor)
    }

    /// Builds a new entity under a caller-chosen identifier.
    ///
    /// Fails with [DuplicateEntity](EntitiesDbError::DuplicateEntity) if the identifier is live.
    /// Automatically issued identifiers of the group continue past `egid.id`.
    pub fn build_entity_with_id<D: EntityDescriptor>(
        &mut self,
        egid: Egid,
        descriptor: D,
    ) -> Result<Egid> {
        self.build(egid.group, Some(egid.id), descriptor)
    }

    fn build<D: EntityDescriptor>(
        &mut self,
        group: Group,
        explicit_id: Option<LocalId>,
        descriptor: D,
    ) -> Result<Egid> {
        let slot = self.slot_of(group)?;
        let layout = self.descriptor_layout::<D>()?;
        let kind = self.group_kind(group);
        let max_entities = self.config.max_entities_per_group as usize;

        let storage = &mut self.storages[slot];
        storage.ensure_mutable()?;
        if kind == GroupKind::Unique && storage.len() > 0 {
            return Err(EntitiesDbError::UniqueGroupOccupied(group));
        }
        if storage.len() >= max_entities {
            return Err(EntitiesDbError::IdSpaceExhausted(group));
        }
        storage.adopt_layout(&layout, &self.components, self.config.default_array_capacity)?;

        let id = match explicit_id {
            Some(id) if id > GroupEntities::MAX_ID => {
                return Err(EntitiesDbError::IdSpaceExhausted(group))
            }
            Some(id) => {
                if !storage.entities.claim_id(id) {
                    return Err(EntitiesDbError::DuplicateEntity(Egid::new(id, group)));
                }
                id
            }
            None => storage
                .entities
                .allocate_id()
                .ok_or(EntitiesDbError::IdSpaceExhausted(group))?,
        };

        let mut row = storage.row_writer(&self.components);
        descriptor.write_row(&mut row);
        let index = storage.commit_row(id)?;

        let egid = Egid::new(id, group);
        trace!(entity = %egid, index, "built entity");

        self.notify_lifecycle(slot, egid, index, LifecycleEvent::Added { previous_group: None });
        Ok(egid)
    }

    /// Removes an entity, compacting every array of its group by swap-removal.
    pub fn remove_entity(&mut self, egid: Egid) -> Result<()> {
        let slot = self.slot_of(egid.group)?;
        let storage = &self.storages[slot];
        storage.ensure_mutable()?;
        let index = storage
            .entities
            .index_of(egid.id)
            .ok_or(EntitiesDbError::UnknownEntity(egid))?;

        self.notify_lifecycle(slot, egid, index, LifecycleEvent::Removed { swapped_to: None });

        let removal = self.storages[slot]
            .swap_remove(egid.id)
            .ok_or(EntitiesDbError::UnknownEntity(egid))?;
        trace!(entity = %egid, index, moved = ?removal.moved, "removed entity");
        Ok(())
    }

    /// Moves an entity into group `to`, preserving its component values.
    ///
    /// The entity receives a new identifier valid only in `to`. Both groups must store the
    /// same component set (an empty destination adopts the set of the source).
    /// Moving an entity into its own group returns it unchanged.
    pub fn swap_entity_group(&mut self, egid: Egid, to: Group) -> Result<Egid> {
        let from_slot = self.slot_of(egid.group)?;
        let to_slot = self.slot_of(to)?;

        let index = {
            let storage = &self.storages[from_slot];
            storage.ensure_mutable()?;
            storage
                .entities
                .index_of(egid.id)
                .ok_or(EntitiesDbError::UnknownEntity(egid))?
        };
        if from_slot == to_slot {
            return Ok(egid);
        }

        let kind = self.group_kind(to);
        let max_entities = self.config.max_entities_per_group as usize;
        let new_id = {
            let [src, dst] = storage_pair_mut(&mut self.storages, from_slot, to_slot)?;
            dst.ensure_mutable()?;
            if kind == GroupKind::Unique && dst.len() > 0 {
                return Err(EntitiesDbError::UniqueGroupOccupied(to));
            }
            if dst.len() >= max_entities {
                return Err(EntitiesDbError::IdSpaceExhausted(to));
            }
            let layout = src.layout().clone();
            dst.adopt_layout(&layout, &self.components, self.config.default_array_capacity)?;
            dst.entities
                .allocate_id()
                .ok_or(EntitiesDbError::IdSpaceExhausted(to))?
        };
        let new_egid = Egid::new(new_id, to);

        self.notify_lifecycle(
            from_slot,
            egid,
            index,
            LifecycleEvent::Removed {
                swapped_to: Some(new_egid),
            },
        );

        let [src, dst] = storage_pair_mut(&mut self.storages, from_slot, to_slot)?;
        let (_, new_index) = src
            .move_row_into(egid.id, dst, new_id)
            .ok_or(EntitiesDbError::UnknownEntity(egid))?;
        debug!(from = %egid, to = %new_egid, "swapped entity group");

        self.notify_lifecycle(
            to_slot,
            new_egid,
            new_index,
            LifecycleEvent::Added {
                previous_group: Some(egid.group),
            },
        );
        Ok(new_egid)
    }

    /// Reserves room for `capacity` components of type `T` in `group` without changing
    /// the number of entities.
    ///
    /// If the group does not store `T` yet, the type is added to its component set; this
    /// is only possible while the group is empty.
    pub fn preallocate<T: Component>(&mut self, group: Group, capacity: usize) -> Result<()> {
        let id = self.components.register::<T>();
        let slot = self.slot_of(group)?;
        let storage = &mut self.storages[slot];

        if storage.has_array(id) {
            storage.reserve(id, capacity);
            return Ok(());
        }

        storage.ensure_mutable()?;
        if let Err(err) = storage.add_array(id, &self.components, capacity) {
            warn!(
                group = %group,
                component = self.components.name_of(id),
                "cannot extend the component set of a non-empty group"
            );
            return Err(err);
        }
        debug!(group = %group, component = self.components.name_of(id), capacity, "preallocated array");
        Ok(())
    }

    /// Reserves room for `n` entities described by `D` in `group`.
    pub fn preallocate_entity_space<D: EntityDescriptor>(&mut self, group: Group, n: usize) -> Result<()> {
        let slot = self.slot_of(group)?;
        let layout = self.descriptor_layout::<D>()?;
        let storage = &mut self.storages[slot];

        if storage.layout() != &layout {
            storage.ensure_mutable()?;
        }
        if let Err(err) = storage.adopt_layout(&layout, &self.components, n) {
            warn!(group = %group, "descriptor does not match the component set of the group");
            return Err(err);
        }
        storage.reserve_all(n);
        debug!(group = %group, entities = n, "preallocated entity space");
        Ok(())
    }

    /// Returns an entry giving access to all components of `egid`.
    pub fn entry(&self, egid: Egid) -> Result<Entry<'_>> {
        let storage = self.storage(egid.group)?;
        let index = storage
            .entities
            .index_of(egid.id)
            .ok_or(EntitiesDbError::UnknownEntity(egid))?;
        Ok(Entry {
            components: &self.components,
            storage,
            egid,
            index,
        })
    }

    pub fn entry_mut(&mut self, egid: Egid) -> Result<EntryMut<'_>> {
        let slot = self.slot_of(egid.group)?;
        let storage = &mut self.storages[slot];
        let index = storage
            .entities
            .index_of(egid.id)
            .ok_or(EntitiesDbError::UnknownEntity(egid))?;
        Ok(EntryMut {
            components: &self.components,
            storage,
            egid,
            index,
        })
    }

    fn descriptor_layout<D: EntityDescriptor>(&mut self) -> Result<GroupLayout> {
        let ids = D::component_ids(&mut self.components);
        let layout = GroupLayout::new(&ids);
        if let Some(id) = layout.first_duplicate() {
            return Err(EntitiesDbError::DuplicateComponentType {
                component: self.components.name_of(id),
            });
        }
        Ok(layout)
    }

    fn group_kind(&self, group: Group) -> GroupKind {
        self.groups.info(group).map_or(GroupKind::Standard, |info| info.kind)
    }

    fn notify_lifecycle(&mut self, slot: usize, egid: Egid, index: usize, event: LifecycleEvent) {
        if !self.notifier.has_lifecycle_listeners() {
            return;
        }
        let storage = &self.storages[slot];
        for &id in storage.layout().ids() {
            if let Some(value) = storage.component_any(id, index) {
                self.notifier.notify_lifecycle(id, egid, value, event);
            }
        }
    }

    fn slot_of(&self, group: Group) -> Result<usize> {
        self.storages_by_groups
            .get(&group)
            .copied()
            .ok_or(EntitiesDbError::UnknownGroup(group))
    }

    pub(crate) fn storage(&self, group: Group) -> Result<&GroupStorage> {
        Ok(&self.storages[self.slot_of(group)?])
    }

    pub(crate) fn storage_mut(&mut self, group: Group) -> Result<&mut GroupStorage> {
        let slot = self.slot_of(group)?;
        Ok(&mut self.storages[slot])
    }

    /// Returns the id of `T`, failing if the type has never been stored anywhere.
    pub(crate) fn component_id<T: Component>(&self, group: Group) -> Result<ComponentId> {
        self.components
            .id_of::<T>()
            .ok_or_else(|| missing_component::<T>(group))
    }
}

fn storage_pair_mut(
    storages: &mut [GroupStorage],
    a: usize,
    b: usize,
) -> Result<[&mut GroupStorage; 2]> {
    let group = storages[b].group();
    storages
        .get_disjoint_mut([a, b])
        .map_err(|_| EntitiesDbError::UnknownGroup(group))
}

impl Default for EntitiesDb {
    fn default() -> Self {
        Self::new()
    }
}
