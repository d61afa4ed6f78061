//! An in-memory entity/component database.
//!
//! Entities are identified by an [Egid]: a local id paired with the [Group] the entity
//! lives in. Groups are disjoint partitions; inside a group every component type is
//! stored in its own dense, gap-free array and all arrays are index-aligned, so row `i`
//! of each array belongs to the same entity. Removal uses swap-removal to keep the
//! arrays packed, and an identity map per group keeps identifiers stable.
//!
//! Components are plain `Copy` value records; any `Copy + Send + Sync + 'static` type
//! qualifies.
//!
//! # Examples
//!
//! ```
//! use entity_db::{EntitiesDb, EntitiesDbError, EntityDescriptor};
//!
//! #[derive(Debug, Copy, Clone, PartialEq)]
//! struct Position {
//!     x: f32,
//!     y: f32,
//! }
//!
//! #[derive(Debug, Copy, Clone, PartialEq)]
//! struct Velocity {
//!     x: f32,
//!     y: f32,
//! }
//!
//! #[derive(EntityDescriptor)]
//! struct Body {
//!     position: Position,
//!     velocity: Velocity,
//! }
//!
//! fn main() -> Result<(), EntitiesDbError> {
//!     let mut db = EntitiesDb::new();
//!     let bodies = db.allocate_group(16)?;
//!
//!     let body = db.build_entity(
//!         bodies,
//!         Body {
//!             position: Position { x: 0.0, y: 0.0 },
//!             velocity: Velocity { x: 1.0, y: 2.0 },
//!         },
//!     )?;
//!
//!     let (positions, velocities) = db.query_entities2_mut::<Position, Velocity>(bodies)?;
//!     for (p, v) in positions.iter_mut().zip(velocities.iter()) {
//!         p.x += v.x;
//!         p.y += v.y;
//!     }
//!
//!     assert_eq!(db.query_entity::<Position>(body)?, &Position { x: 1.0, y: 2.0 });
//!
//!     db.remove_entity(body)?;
//!     assert!(matches!(
//!         db.query_entity::<Position>(body),
//!         Err(EntitiesDbError::UnknownEntity(_))
//!     ));
//!     Ok(())
//! }
//! ```

extern crate self as entity_db;

#[cfg(test)]
mod tests;

mod component;
mod config;
mod descriptor;
mod entities_db;
mod entity;
mod entry;
mod error;
mod group;
mod notify;
mod step;
mod storage;

#[doc(hidden)]
pub mod private;

pub use component::{Component, ComponentId, ComponentInfo, ComponentRegistry};
pub use config::EntitiesDbConfig;
pub use descriptor::{ComponentIds, EntityDescriptor, RowWriter};
pub use entities_db::{EgidMapper, EntitiesDb, EntityActionData};
pub use entity::{Egid, Group, LocalId};
pub use entry::{Entry, EntryMut};
pub use error::{EntitiesDbError, Result};
pub use group::{GroupInfo, GroupKind, GroupRegistry};
pub use macros::EntityDescriptor;
pub use notify::LifecycleEvent;
pub use step::{StagedSpawner, StepDriver, StepEngine};
pub use storage::array::RawArray;

pub(crate) type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
