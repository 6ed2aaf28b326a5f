use std::sync::Arc;

use dashmap::DashMap;

use crate::core::descriptor::FunctionDescriptor;

/// Holds callable descriptors keyed by identifier.
///
/// Registration is atomic at the granularity of one descriptor and last write
/// wins: re-registering an id silently replaces the prior descriptor. The map
/// supports concurrent reads during concurrent writes without caller locking.
#[derive(Default)]
pub struct DescriptorStore {
    descriptors: DashMap<String, Arc<FunctionDescriptor>>,
}

impl DescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or overwrites by identifier, returning the shared handle.
    pub fn register(&self, descriptor: FunctionDescriptor) -> Arc<FunctionDescriptor> {
        let descriptor = Arc::new(descriptor);
        if let Some(previous) = self
            .descriptors
            .insert(descriptor.id.clone(), Arc::clone(&descriptor))
        {
            log::warn!(
                "Function '{}' was already registered, replacing the prior descriptor.",
                previous.id
            );
        } else {
            log::info!("Registered function '{}'", descriptor.id);
        }
        descriptor
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<FunctionDescriptor>> {
        self.descriptors.get(id).map(|entry| Arc::clone(&entry))
    }

    /// Snapshot of all descriptors, stable at call time, not live.
    pub fn list(&self) -> Vec<Arc<FunctionDescriptor>> {
        self.descriptors
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FlowValue;

    fn noop(id: &str) -> FunctionDescriptor {
        FunctionDescriptor::new(id, |_| Ok(FlowValue::Null))
    }

    #[test]
    fn test_lookup_returns_the_registered_descriptor() {
        let store = DescriptorStore::new();
        let registered = store.register(noop("math.add"));
        let found = store.lookup("math.add").expect("descriptor should exist");
        assert!(Arc::ptr_eq(&registered, &found));
    }

    #[test]
    fn test_lookup_unknown_id_is_none() {
        let store = DescriptorStore::new();
        assert!(store.lookup("missing").is_none());
    }

    #[test]
    fn test_reregistration_replaces_last_write_wins() {
        let store = DescriptorStore::new();
        let first = store.register(noop("math.add"));
        let second = store.register(noop("math.add"));
        let found = store.lookup("math.add").unwrap();
        assert!(!Arc::ptr_eq(&first, &found));
        assert!(Arc::ptr_eq(&second, &found));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_list_is_a_snapshot() {
        let store = DescriptorStore::new();
        store.register(noop("a"));
        store.register(noop("b"));
        let snapshot = store.list();
        store.register(noop("c"));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(store.len(), 3);
    }
}
