use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::aggregation::component::{Component, ComponentId, ComponentInner};
use crate::aggregation::error::AggregationError;
use crate::aggregation::registry::AggregateRegistry;

static NEXT_AGGREGATE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an [`Aggregate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateId(u64);

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aggregate#{}", self.0)
    }
}

/// Handle returned by [`Aggregate::on_changed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// What changed in an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateChange {
    ComponentAdded(ComponentId),
    /// Removed explicitly, or because the component was dropped
    ComponentRemoved(ComponentId),
    /// The last handle was dropped; members are orphaned right after this event
    Destroying,
}

/// Change notification delivered to aggregate observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateEvent {
    pub aggregate: AggregateId,
    pub change: AggregateChange,
}

impl AggregateEvent {
    pub(crate) fn new(aggregate: AggregateId, change: AggregateChange) -> Self {
        Self { aggregate, change }
    }
}

pub(crate) struct AggregateInner {
    id: AggregateId,
}

impl Drop for AggregateInner {
    fn drop(&mut self) {
        AggregateRegistry::global().destroy_aggregate(self.id);
    }
}

/// Groups otherwise unrelated [`Component`]s so that each of them answers
/// capability queries on behalf of the whole group.
///
/// Members keep insertion order, which decides which member answers
/// [`component`](Aggregate::component) when several provide the same
/// capability. A component belongs to at most one aggregate at a time.
///
/// The aggregate does not keep its members alive; a member whose last handle
/// is dropped leaves the aggregate. Cloning an `Aggregate` clones the handle.
#[derive(Clone)]
pub struct Aggregate {
    inner: Arc<AggregateInner>,
}

impl Aggregate {
    pub fn new() -> Self {
        let id = AggregateId(NEXT_AGGREGATE_ID.fetch_add(1, Ordering::Relaxed));
        let inner = Arc::new(AggregateInner { id });
        AggregateRegistry::global().register_aggregate(id, Arc::downgrade(&inner));
        Self { inner }
    }

    pub fn id(&self) -> AggregateId {
        self.inner.id
    }

    /// Adds `component` as the last member.
    ///
    /// Adding a current member again changes nothing and emits no event.
    /// Fails if the component already belongs to another aggregate.
    pub fn add(&self, component: &Component) -> Result<(), AggregationError> {
        AggregateRegistry::global().add_member(self.id(), component)
    }

    /// Removes `component`; a no-op if it is not a member.
    pub fn remove(&self, component: &Component) {
        AggregateRegistry::global().remove_member(self.id(), component.id());
    }

    /// First member, in insertion order, that provides `T`
    pub fn component<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        first_capability(&AggregateRegistry::global().members_of(self.id()))
    }

    /// Every member's `T`, in insertion order
    pub fn components<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        all_capabilities(&AggregateRegistry::global().members_of(self.id()))
    }

    /// Live members in insertion order
    pub fn members(&self) -> Vec<Component> {
        AggregateRegistry::global()
            .members_of(self.id())
            .iter()
            .filter_map(Weak::upgrade)
            .map(Component::from_inner)
            .collect()
    }

    pub fn contains(&self, component: &Component) -> bool {
        AggregateRegistry::global().owner_of(component.id()) == Some(self.id())
    }

    pub fn len(&self) -> usize {
        AggregateRegistry::global().member_count(self.id())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The aggregate `component` belongs to, if any
    pub fn parent_aggregate(component: &Component) -> Option<Aggregate> {
        AggregateRegistry::global()
            .owner_handle(component.id())
            .and_then(|weak| weak.upgrade())
            .map(|inner| Aggregate { inner })
    }

    /// Registers an observer, called synchronously once per structural change.
    pub fn on_changed<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&AggregateEvent) + Send + Sync + 'static,
    {
        AggregateRegistry::global().add_listener(self.id(), Arc::new(listener))
    }

    pub fn remove_listener(&self, listener: ListenerId) -> bool {
        AggregateRegistry::global().remove_listener(self.id(), listener)
    }
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Aggregate {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Aggregate {}

impl fmt::Debug for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregate")
            .field("id", &self.inner.id)
            .field("members", &self.members())
            .finish()
    }
}

pub(crate) fn first_capability<T: ?Sized + Send + Sync + 'static>(members: &[Weak<ComponentInner>]) -> Option<Arc<T>> {
    members
        .iter()
        .filter_map(Weak::upgrade)
        .find_map(|member| member.capability::<T>())
}

pub(crate) fn all_capabilities<T: ?Sized + Send + Sync + 'static>(members: &[Weak<ComponentInner>]) -> Vec<Arc<T>> {
    members
        .iter()
        .filter_map(Weak::upgrade)
        .filter_map(|member| member.capability::<T>())
        .collect()
}
