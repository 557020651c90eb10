use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use classorder_core::ClassId;

use crate::descriptor::ClassDescriptor;
use crate::error::CollaboratorError;

/// Read-only class lookup.
pub trait ClassCatalog: Send + Sync {
    /// `Ok(None)` when the class does not exist.
    fn get(&self, class_id: &ClassId) -> Result<Option<ClassDescriptor>, CollaboratorError>;
}

impl<C> ClassCatalog for Arc<C>
where
    C: ClassCatalog + ?Sized,
{
    fn get(&self, class_id: &ClassId) -> Result<Option<ClassDescriptor>, CollaboratorError> {
        (**self).get(class_id)
    }
}

/// In-memory catalog for tests/dev.
///
/// `set_available(false)` makes every lookup fail with `Unavailable`, which is
/// how tests exercise outage handling.
#[derive(Debug)]
pub struct InMemoryClassCatalog {
    classes: RwLock<HashMap<ClassId, ClassDescriptor>>,
    available: AtomicBool,
}

impl InMemoryClassCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classes(classes: impl IntoIterator<Item = ClassDescriptor>) -> Self {
        let catalog = Self::new();
        for class in classes {
            catalog.upsert(class);
        }
        catalog
    }

    pub fn upsert(&self, class: ClassDescriptor) {
        if let Ok(mut map) = self.classes.write() {
            map.insert(class.class_id.clone(), class);
        }
    }

    pub fn remove(&self, class_id: &ClassId) {
        if let Ok(mut map) = self.classes.write() {
            map.remove(class_id);
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl Default for InMemoryClassCatalog {
    fn default() -> Self {
        Self {
            classes: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl ClassCatalog for InMemoryClassCatalog {
    fn get(&self, class_id: &ClassId) -> Result<Option<ClassDescriptor>, CollaboratorError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable("class catalog offline"));
        }
        let map = self
            .classes
            .read()
            .map_err(|_| CollaboratorError::unavailable("class catalog lock poisoned"))?;
        Ok(map.get(class_id).cloned())
    }
}
