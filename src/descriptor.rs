use crate::component::{ComponentId, ComponentRegistry};
use crate::storage::ArraySlot;
use crate::Component;
use smallvec::SmallVec;

/// Component ids named by a descriptor, in declaration order.
pub type ComponentIds = SmallVec<[ComponentId; crate::group::MAX_LAYOUT_ON_STACK]>;

/// Describes the set of components a built entity receives.
///
/// Implemented for tuples of up to eight components and derivable for structs
/// whose fields are all components:
///
/// ```
/// use entity_db::{EntitiesDb, EntityDescriptor};
///
/// #[derive(Copy, Clone)]
/// struct Position(f32, f32);
/// #[derive(Copy, Clone)]
/// struct Health(u32);
///
/// #[derive(EntityDescriptor)]
/// struct Ship {
///     position: Position,
///     health: Health,
/// }
///
/// let mut db = EntitiesDb::new();
/// let fleet = db.allocate_group(8).unwrap();
/// let ship = db
///     .build_entity(fleet, Ship { position: Position(1.0, 2.0), health: Health(100) })
///     .unwrap();
///
/// assert_eq!(db.query_entity::<Health>(ship).unwrap().0, 100);
/// ```
pub trait EntityDescriptor: Sized + 'static {
    /// Registers the component types of the descriptor and returns their ids.
    fn component_ids(registry: &mut ComponentRegistry) -> ComponentIds;

    /// Appends one value per component type to the group's arrays.
    fn write_row(self, row: &mut RowWriter<'_>);
}

/// Appends a single entity row to the arrays of a group.
pub struct RowWriter<'a> {
    components: &'a ComponentRegistry,
    arrays: &'a mut [ArraySlot],
}

impl<'a> RowWriter<'a> {
    pub(crate) fn new(components: &'a ComponentRegistry, arrays: &'a mut [ArraySlot]) -> Self {
        Self { components, arrays }
    }

    /// Appends `value` to the array of `C`.
    ///
    /// Values of types the group does not store are dropped; the build then fails with
    /// `ComponentSetMismatch` and the row is rolled back.
    pub fn push<C: Component>(&mut self, value: C) {
        let Some(id) = self.components.id_of::<C>() else {
            return;
        };
        if let Some(array) = self
            .arrays
            .get_mut(id as usize)
            .and_then(ArraySlot::dense_mut::<C>)
        {
            array.push(value);
        }
    }
}

macro_rules! impl_descriptor_for_tuple {
    ($($ty:ident $var:ident),+) => {
        impl<$($ty: Component),+> EntityDescriptor for ($($ty,)+) {
            fn component_ids(registry: &mut ComponentRegistry) -> ComponentIds {
                smallvec::smallvec![$(registry.register::<$ty>()),+]
            }

            fn write_row(self, row: &mut RowWriter<'_>) {
                let ($($var,)+) = self;
                $(row.push($var);)+
            }
        }
    };
}

impl_descriptor_for_tuple!(A a);
impl_descriptor_for_tuple!(A a, B b);
impl_descriptor_for_tuple!(A a, B b, C c);
impl_descriptor_for_tuple!(A a, B b, C c, D d);
impl_descriptor_for_tuple!(A a, B b, C c, D d, E e);
impl_descriptor_for_tuple!(A a, B b, C c, D d, E e, F f);
impl_descriptor_for_tuple!(A a, B b, C c, D d, E e, F f, G g);
impl_descriptor_for_tuple!(A a, B b, C c, D d, E e, F f, G g, H h);
