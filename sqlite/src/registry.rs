//! Per-type cache of table mappings.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use tablekit_core::{CreateFlags, Table, TableMapping};

use crate::error::Result;

type CachedMapping = Arc<dyn Any + Send + Sync>;

/// Thread-safe cache of [`TableMapping`]s keyed by type identity.
///
/// Owned by a [`Connection`](crate::Connection) and dropped with it. The
/// lock is held for the whole lookup-or-build sequence and never across
/// SQL execution.
#[derive(Default)]
pub struct MappingRegistry {
    mappings: Mutex<HashMap<TypeId, CachedMapping>>,
}

impl MappingRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mapping of `T`, building it on first use.
    ///
    /// A cached mapping is reused when `create_flags` is
    /// [`CreateFlags::NONE`] or equal to the flags it was built with;
    /// otherwise it is rebuilt and replaced.
    pub fn get_or_build<T: Table>(&self, create_flags: CreateFlags) -> Result<Arc<TableMapping<T>>> {
        let key = TypeId::of::<T>();
        let mut mappings = self.mappings.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = mappings.get(&key) {
            if let Ok(existing) = Arc::clone(entry).downcast::<TableMapping<T>>() {
                if create_flags.is_none() || create_flags == existing.create_flags() {
                    return Ok(existing);
                }
                debug!(
                    table = existing.table_name(),
                    old = ?existing.create_flags(),
                    new = ?create_flags,
                    "create flags changed, rebuilding mapping"
                );
            }
        }

        let mapping = Arc::new(TableMapping::<T>::build(create_flags)?);
        debug!(
            table = mapping.table_name(),
            columns = mapping.columns().len(),
            "built table mapping"
        );
        mappings.insert(key, Arc::clone(&mapping) as CachedMapping);
        Ok(mapping)
    }

    /// Returns the cached mapping of `T` without building it.
    pub fn cached<T: Table>(&self) -> Option<Arc<TableMapping<T>>> {
        let mappings = self.mappings.lock().unwrap_or_else(PoisonError::into_inner);
        mappings
            .get(&TypeId::of::<T>())
            .and_then(|entry| Arc::clone(entry).downcast::<TableMapping<T>>().ok())
    }

    /// Number of cached mappings.
    pub fn len(&self) -> usize {
        self.mappings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no mapping is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached mapping.
    pub fn clear(&self) {
        self.mappings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl std::fmt::Debug for MappingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tablekit_core::{Field, FieldType};

    #[derive(Deserialize)]
    struct Item {
        id: i64,
        label: String,
    }

    impl Table for Item {
        fn fields() -> Vec<Field<Self>> {
            vec![
                Field::new("id", FieldType::Int, |i: &Item| i.id.into())
                    .with_setter(|i, v| i.id = v.as_i64().unwrap_or_default()),
                Field::new("label", FieldType::String, |i: &Item| i.label.as_str().into()),
            ]
        }
    }

    #[test]
    fn test_mapping_is_cached() {
        let registry = MappingRegistry::new();
        let first = registry.get_or_build::<Item>(CreateFlags::NONE).unwrap();
        let second = registry.get_or_build::<Item>(CreateFlags::NONE).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_changed_flags_rebuild_entry() {
        let registry = MappingRegistry::new();
        let plain = registry.get_or_build::<Item>(CreateFlags::NONE).unwrap();
        assert!(plain.pk().is_none());

        let implicit = registry
            .get_or_build::<Item>(CreateFlags::IMPLICIT_PK)
            .unwrap();
        assert!(!Arc::ptr_eq(&plain, &implicit));
        assert_eq!(implicit.pk().unwrap().name, "id");

        // Default flags keep whatever is cached.
        let again = registry.get_or_build::<Item>(CreateFlags::NONE).unwrap();
        assert!(Arc::ptr_eq(&implicit, &again));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_lookups_share_one_mapping() {
        let registry = MappingRegistry::new();
        let mappings: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| registry.get_or_build::<Item>(CreateFlags::NONE).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(mappings.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert!(registry.cached::<Item>().is_some());
    }

    #[test]
    fn test_clear() {
        let registry = MappingRegistry::new();
        registry.get_or_build::<Item>(CreateFlags::NONE).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.cached::<Item>().is_none());
    }
}
