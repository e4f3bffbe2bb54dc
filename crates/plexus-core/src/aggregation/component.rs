use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::aggregation::registry::AggregateRegistry;

static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Component`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    fn next() -> Self {
        ComponentId(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

struct Capability {
    type_id: TypeId,
    type_name: &'static str,
    // Always holds an `Arc<T>` for the `T` behind `type_id`.
    value: Box<dyn Any + Send + Sync>,
}

pub(crate) struct ComponentInner {
    id: ComponentId,
    name: String,
    capabilities: Vec<Capability>,
}

impl ComponentInner {
    pub(crate) fn id(&self) -> ComponentId {
        self.id
    }

    pub(crate) fn capability<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let wanted = TypeId::of::<T>();
        self.capabilities
            .iter()
            .find(|c| c.type_id == wanted)
            .and_then(|c| c.value.downcast_ref::<Arc<T>>())
            .cloned()
    }
}

impl Drop for ComponentInner {
    fn drop(&mut self) {
        // A destroyed component leaves its aggregate.
        AggregateRegistry::global().component_dropped(self.id);
    }
}

/// An object that can join an [`Aggregate`](crate::aggregation::Aggregate).
///
/// A component is a named, immutable table of capabilities. Each capability is
/// an `Arc<T>` registered under the type `T` callers will ask for, usually a
/// trait object type:
///
/// ```
/// use std::sync::Arc;
/// use plexus_core::aggregation::Component;
///
/// trait Drawable: Send + Sync {
///     fn draw(&self) -> String;
/// }
///
/// struct Circle;
/// impl Drawable for Circle {
///     fn draw(&self) -> String { "circle".into() }
/// }
///
/// let circle = Arc::new(Circle);
/// let component = Component::builder("circle")
///     .provide::<dyn Drawable>(circle.clone())
///     .provide::<Circle>(circle)
///     .build();
///
/// assert_eq!(component.capability::<dyn Drawable>().unwrap().draw(), "circle");
/// ```
///
/// Cloning a `Component` clones the handle, not the table. When the last
/// handle is dropped the component is removed from its aggregate.
#[derive(Clone)]
pub struct Component {
    inner: Arc<ComponentInner>,
}

impl Component {
    /// Start building a component with the given display name
    pub fn builder(name: impl Into<String>) -> ComponentBuilder {
        ComponentBuilder {
            name: name.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Direct capability check on this component only, ignoring its aggregate.
    pub fn capability<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner.capability::<T>()
    }

    /// Whether this component itself provides `T`
    pub fn provides<T: ?Sized + 'static>(&self) -> bool {
        let wanted = TypeId::of::<T>();
        self.inner.capabilities.iter().any(|c| c.type_id == wanted)
    }

    /// Type names of the declared capabilities, in declaration order
    pub fn capability_names(&self) -> Vec<&'static str> {
        self.inner.capabilities.iter().map(|c| c.type_name).collect()
    }

    pub(crate) fn downgrade(&self) -> Weak<ComponentInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<ComponentInner>) -> Self {
        Self { inner }
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Component {}

impl Hash for Component {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("capabilities", &self.capability_names())
            .finish()
    }
}

/// Builder for [`Component`]
pub struct ComponentBuilder {
    name: String,
    capabilities: Vec<Capability>,
}

impl ComponentBuilder {
    /// Declare capability `T`. Declaring the same `T` twice keeps the last value.
    pub fn provide<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        let type_id = TypeId::of::<T>();
        self.capabilities.retain(|c| c.type_id != type_id);
        self.capabilities.push(Capability {
            type_id,
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        });
        self
    }

    pub fn build(self) -> Component {
        Component {
            inner: Arc::new(ComponentInner {
                id: ComponentId::next(),
                name: self.name,
                capabilities: self.capabilities,
            }),
        }
    }
}
