use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::aggregation::aggregate::{AggregateChange, AggregateEvent, AggregateId, AggregateInner, ListenerId};
use crate::aggregation::component::{Component, ComponentId, ComponentInner};
use crate::aggregation::error::AggregationError;

/// Observer callback registered on an aggregate
pub type Listener = Arc<dyn Fn(&AggregateEvent) + Send + Sync>;

struct AggregateEntry {
    handle: Weak<AggregateInner>,
    members: Vec<(ComponentId, Weak<ComponentInner>)>,
    listeners: Vec<(ListenerId, Listener)>,
}

impl AggregateEntry {
    fn listener_snapshot(&self) -> Vec<Listener> {
        self.listeners.iter().map(|(_, l)| l.clone()).collect()
    }
}

#[derive(Default)]
struct RegistryState {
    owners: HashMap<ComponentId, AggregateId>,
    aggregates: HashMap<AggregateId, AggregateEntry>,
}

/// Process-wide bookkeeping behind every [`Aggregate`](super::Aggregate).
///
/// Maps each component to the aggregate owning it and keeps every aggregate's
/// ordered member list and observers. All of it sits behind one reader-writer
/// lock shared by all aggregates: queries take the read side, structural
/// changes the write side.
///
/// Members and aggregate handles are stored as `Weak` references and are only
/// upgraded after the lock is released. Dropping the last strong handle of a
/// component or aggregate re-enters the registry, so no strong handle may be
/// released while a guard is alive. Observers are invoked with no lock held.
pub struct AggregateRegistry {
    state: RwLock<RegistryState>,
}

static REGISTRY: OnceLock<AggregateRegistry> = OnceLock::new();

impl AggregateRegistry {
    /// The process-wide registry, created on first use
    pub fn global() -> &'static AggregateRegistry {
        REGISTRY.get_or_init(|| AggregateRegistry {
            state: RwLock::new(RegistryState::default()),
        })
    }

    // The state stays consistent across a panicking observer because observers
    // never run under the lock, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live aggregates
    pub fn aggregate_count(&self) -> usize {
        self.read().aggregates.len()
    }

    /// Number of components currently owned by some aggregate
    pub fn owned_component_count(&self) -> usize {
        self.read().owners.len()
    }

    /// The aggregate owning `component`, if any
    pub fn owner_of(&self, component: ComponentId) -> Option<AggregateId> {
        self.read().owners.get(&component).copied()
    }

    pub(crate) fn register_aggregate(&self, id: AggregateId, handle: Weak<AggregateInner>) {
        self.write().aggregates.insert(
            id,
            AggregateEntry {
                handle,
                members: Vec::new(),
                listeners: Vec::new(),
            },
        );
    }

    pub(crate) fn add_member(&self, aggregate: AggregateId, component: &Component) -> Result<(), AggregationError> {
        let id = component.id();
        let listeners = {
            let mut state = self.write();
            match state.owners.get(&id) {
                Some(owner) if *owner == aggregate => return Ok(()),
                Some(owner) => {
                    let owner = *owner;
                    log::warn!(
                        "Cannot add component '{}' ({}) to aggregate {}: it already belongs to aggregate {}",
                        component.name(),
                        id,
                        aggregate,
                        owner
                    );
                    return Err(AggregationError::AlreadyOwned {
                        component: component.name().to_string(),
                        id,
                        owner,
                    });
                }
                None => {}
            }
            let entry = state
                .aggregates
                .get_mut(&aggregate)
                .ok_or(AggregationError::UnknownAggregate(aggregate))?;
            entry.members.push((id, component.downgrade()));
            let listeners = entry.listener_snapshot();
            state.owners.insert(id, aggregate);
            listeners
        };
        notify(&listeners, &AggregateEvent::new(aggregate, AggregateChange::ComponentAdded(id)));
        Ok(())
    }

    /// Returns whether the component was a member.
    pub(crate) fn remove_member(&self, aggregate: AggregateId, component: ComponentId) -> bool {
        let listeners = {
            let mut state = self.write();
            if state.owners.get(&component) != Some(&aggregate) {
                return false;
            }
            state.owners.remove(&component);
            match state.aggregates.get_mut(&aggregate) {
                Some(entry) => {
                    entry.members.retain(|(id, _)| *id != component);
                    entry.listener_snapshot()
                }
                None => Vec::new(),
            }
        };
        notify(&listeners, &AggregateEvent::new(aggregate, AggregateChange::ComponentRemoved(component)));
        true
    }

    /// Weak member handles of `aggregate`, in insertion order
    pub(crate) fn members_of(&self, aggregate: AggregateId) -> Vec<Weak<ComponentInner>> {
        self.read()
            .aggregates
            .get(&aggregate)
            .map(|entry| entry.members.iter().map(|(_, m)| m.clone()).collect())
            .unwrap_or_default()
    }

    /// Live members of `aggregate`; members being dropped no longer count
    pub(crate) fn member_count(&self, aggregate: AggregateId) -> usize {
        self.read()
            .aggregates
            .get(&aggregate)
            .map(|entry| entry.members.iter().filter(|(_, m)| m.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Weak member handles of the aggregate owning `component`, looked up under a single read lock
    pub(crate) fn siblings_of(&self, component: ComponentId) -> Option<Vec<Weak<ComponentInner>>> {
        let state = self.read();
        let owner = state.owners.get(&component)?;
        state
            .aggregates
            .get(owner)
            .map(|entry| entry.members.iter().map(|(_, m)| m.clone()).collect())
    }

    pub(crate) fn owner_handle(&self, component: ComponentId) -> Option<Weak<AggregateInner>> {
        let state = self.read();
        let owner = state.owners.get(&component)?;
        state.aggregates.get(owner).map(|entry| entry.handle.clone())
    }

    pub(crate) fn add_listener(&self, aggregate: AggregateId, listener: Listener) -> ListenerId {
        let id = ListenerId::next();
        let mut state = self.write();
        if let Some(entry) = state.aggregates.get_mut(&aggregate) {
            entry.listeners.push((id, listener));
        }
        id
    }

    pub(crate) fn remove_listener(&self, aggregate: AggregateId, listener: ListenerId) -> bool {
        let removed = {
            let mut state = self.write();
            state.aggregates.get_mut(&aggregate).and_then(|entry| {
                let position = entry.listeners.iter().position(|(id, _)| *id == listener)?;
                Some(entry.listeners.remove(position))
            })
        };
        // Dropped here, outside the lock: the listener may hold the last handle of a component.
        removed.is_some()
    }

    /// Called when the last handle of a component goes away.
    pub(crate) fn component_dropped(&self, component: ComponentId) {
        let notification = {
            let mut state = self.write();
            let Some(owner) = state.owners.remove(&component) else {
                return;
            };
            state.aggregates.get_mut(&owner).map(|entry| {
                entry.members.retain(|(id, _)| *id != component);
                (owner, entry.listener_snapshot())
            })
        };
        if let Some((owner, listeners)) = notification {
            log::debug!("Component {} dropped, removed from aggregate {}", component, owner);
            notify(&listeners, &AggregateEvent::new(owner, AggregateChange::ComponentRemoved(component)));
        }
    }

    /// Called when the last handle of an aggregate goes away. Observers hear about it
    /// while the members are still registered; afterwards every member is orphaned.
    pub(crate) fn destroy_aggregate(&self, aggregate: AggregateId) {
        let listeners = self
            .read()
            .aggregates
            .get(&aggregate)
            .map(AggregateEntry::listener_snapshot)
            .unwrap_or_default();
        notify(&listeners, &AggregateEvent::new(aggregate, AggregateChange::Destroying));
        drop(listeners);

        let removed = {
            let mut state = self.write();
            let removed = state.aggregates.remove(&aggregate);
            if let Some(entry) = &removed {
                for (id, _) in &entry.members {
                    state.owners.remove(id);
                }
            }
            removed
        };
        if let Some(entry) = &removed {
            log::debug!("Aggregate {} destroyed, {} component(s) orphaned", aggregate, entry.members.len());
        }
    }
}

impl fmt::Debug for AggregateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("AggregateRegistry")
            .field("aggregates", &state.aggregates.len())
            .field("owned_components", &state.owners.len())
            .finish()
    }
}

fn notify(listeners: &[Listener], event: &AggregateEvent) {
    for listener in listeners {
        listener(event);
    }
}
