use crate::component::ComponentId;
use crate::error::{EntitiesDbError, Result};
use crate::{Component, Egid, Group, HashMap};
use std::any::{type_name, Any};

/// A structural change delivered to lifecycle listeners.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LifecycleEvent {
    /// The entity was built, or moved here from `previous_group`.
    Added { previous_group: Option<Group> },
    /// The entity is about to be removed, or moved to `swapped_to`.
    Removed { swapped_to: Option<Egid> },
}

type ChangeListener = Box<dyn FnMut(Egid, &dyn Any) -> anyhow::Result<()> + Send>;
type LifecycleListener = Box<dyn FnMut(Egid, &dyn Any, LifecycleEvent) + Send>;

struct Listeners {
    component: &'static str,
    changes: Vec<ChangeListener>,
    lifecycle: Vec<LifecycleListener>,
}

/// Synchronous dispatcher of component notifications, keyed by component id.
#[derive(Default)]
pub(crate) struct ChangeNotifier {
    listeners: HashMap<ComponentId, Listeners>,
}

impl ChangeNotifier {
    fn listeners_mut<C: Component>(&mut self, id: ComponentId) -> &mut Listeners {
        self.listeners.entry(id).or_insert_with(|| Listeners {
            component: type_name::<C>(),
            changes: Vec::new(),
            lifecycle: Vec::new(),
        })
    }

    pub fn subscribe<C, F>(&mut self, id: ComponentId, mut listener: F)
    where
        C: Component,
        F: FnMut(Egid, &C) -> anyhow::Result<()> + Send + 'static,
    {
        self.listeners_mut::<C>(id)
            .changes
            .push(Box::new(move |egid, value| match value.downcast_ref::<C>() {
                Some(value) => listener(egid, value),
                None => Ok(()),
            }));
    }

    pub fn subscribe_lifecycle<C, F>(&mut self, id: ComponentId, mut listener: F)
    where
        C: Component,
        F: FnMut(Egid, &C, LifecycleEvent) + Send + 'static,
    {
        self.listeners_mut::<C>(id)
            .lifecycle
            .push(Box::new(move |egid, value, event| {
                if let Some(value) = value.downcast_ref::<C>() {
                    listener(egid, value, event);
                }
            }));
    }

    /// Delivers a change of `value` to every listener of `id` in subscription order.
    ///
    /// The first failing listener aborts the dispatch and its error is returned.
    pub fn publish(&mut self, id: ComponentId, egid: Egid, value: &dyn Any) -> Result<()> {
        let Some(listeners) = self.listeners.get_mut(&id) else {
            return Ok(());
        };
        for listener in &mut listeners.changes {
            listener(egid, value).map_err(|source| EntitiesDbError::Listener {
                component: listeners.component,
                source,
            })?;
        }
        Ok(())
    }

    pub fn has_lifecycle_listeners(&self) -> bool {
        self.listeners.values().any(|l| !l.lifecycle.is_empty())
    }

    pub fn notify_lifecycle(
        &mut self,
        id: ComponentId,
        egid: Egid,
        value: &dyn Any,
        event: LifecycleEvent,
    ) {
        if let Some(listeners) = self.listeners.get_mut(&id) {
            for listener in &mut listeners.lifecycle {
                listener(egid, value, event);
            }
        }
    }
}
