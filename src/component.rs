use crate::storage::array::{DenseArray, ErasedArray};
use crate::HashMap;
use std::any::{type_name, TypeId};

/// A fixed-size value record that can be attached to entities.
///
/// Every `Copy + Send + Sync + 'static` type is a component.
pub trait Component: Copy + Send + Sync + 'static {}

impl<T> Component for T where T: Copy + Send + Sync + 'static {}

/// A dense slot index assigned to a component type by a [ComponentRegistry].
pub type ComponentId = u32;

#[derive(Copy, Clone)]
pub struct ComponentInfo {
    pub type_id: TypeId,
    pub name: &'static str,
    pub(crate) new_array: fn(usize) -> Box<dyn ErasedArray>,
}

/// Maps component types to the slot indices used by per-group array tables.
///
/// Types are registered lazily the first time they are built, preallocated or subscribed to.
#[derive(Default)]
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    ids_by_types: HashMap<TypeId, ComponentId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the slot of `C`, registering the type if it is seen for the first time.
    pub fn register<C: Component>(&mut self) -> ComponentId {
        let type_id = TypeId::of::<C>();
        if let Some(id) = self.ids_by_types.get(&type_id) {
            return *id;
        }

        let id = self.infos.len() as ComponentId;
        self.infos.push(ComponentInfo {
            type_id,
            name: type_name::<C>(),
            new_array: DenseArray::<C>::new_erased,
        });
        self.ids_by_types.insert(type_id, id);
        id
    }

    /// Returns the slot of `C` if the type has been registered.
    #[inline]
    pub fn id_of<C: Component>(&self) -> Option<ComponentId> {
        self.ids_by_types.get(&TypeId::of::<C>()).copied()
    }

    pub fn info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(id as usize)
    }

    /// Returns the type name registered under `id`.
    pub fn name_of(&self, id: ComponentId) -> &'static str {
        self.info(id).map_or("<unregistered>", |info| info.name)
    }

    /// Returns the number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}
