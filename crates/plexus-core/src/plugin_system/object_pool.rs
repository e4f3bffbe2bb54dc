use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::aggregation::{query, Component};

/// Components published by plugins for other plugins to find.
///
/// Lookups go through [`query`], so a pooled component also answers for the
/// capabilities of its aggregate.
#[derive(Debug, Default)]
pub struct ObjectPool {
    objects: RwLock<Vec<Component>>,
}

impl ObjectPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Component>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Component>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `object` at the end of the pool; adding it twice is a no-op.
    pub fn add_object(&self, object: Component) -> bool {
        let mut objects = self.write();
        if objects.contains(&object) {
            log::warn!("Object '{}' ({}) is already in the pool", object.name(), object.id());
            return false;
        }
        log::debug!("Adding object '{}' ({}) to the pool", object.name(), object.id());
        objects.push(object);
        true
    }

    pub fn remove_object(&self, object: &Component) -> bool {
        let removed = {
            let mut objects = self.write();
            let position = objects.iter().position(|o| o == object);
            position.map(|i| objects.remove(i))
        };
        match removed {
            Some(removed) => {
                log::debug!("Removed object '{}' ({}) from the pool", removed.name(), removed.id());
                true
            }
            None => {
                log::warn!("Object '{}' ({}) is not in the pool", object.name(), object.id());
                false
            }
        }
    }

    /// Every pooled object, in insertion order
    pub fn all_objects(&self) -> Vec<Component> {
        self.read().clone()
    }

    /// First pooled object that answers `query::<T>`
    pub fn get_object<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.all_objects().iter().find_map(query::<T>)
    }

    /// One answer per pooled object that answers `query::<T>`
    pub fn get_objects<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.all_objects().iter().filter_map(query::<T>).collect()
    }

    pub fn get_object_by_name(&self, name: &str) -> Option<Component> {
        self.read().iter().find(|o| o.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
