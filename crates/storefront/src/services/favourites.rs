//! Favourites store.
//!
//! A locally persisted set of product snapshots. Nothing here talks to the
//! server: entries are copied from the product on display when favourited
//! and never refreshed afterwards, so a later price change on the server does
//! not show up in the favourites list.

use std::sync::{Arc, PoisonError, RwLock};

use bazaar_core::{CategoryId, Price, ProductId};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::api::Product;
use crate::storage::KeyValueStore;

/// Storage key of the favourites document.
pub const FAVOURITES_KEY: &str = "favourites";

/// A product summary frozen at the moment it was favourited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavouriteItem {
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl From<&Product> for FavouriteItem {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            image: product.main_image.clone(),
            category_id: product.category_id,
        }
    }
}

/// The favourites set, seeded from and written back to storage.
///
/// Insertion order is kept for display. At most one entry exists per id.
pub struct FavouritesStore {
    storage: Arc<dyn KeyValueStore>,
    items: RwLock<Vec<FavouriteItem>>,
}

impl std::fmt::Debug for FavouritesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FavouritesStore")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl FavouritesStore {
    /// Load the persisted set. Absent or malformed data yields an empty set.
    #[must_use]
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let items = read_items(storage.as_ref());
        debug!(count = items.len(), "Loaded favourites");
        Self {
            storage,
            items: RwLock::new(items),
        }
    }

    /// Add an item unless one with the same id is already present.
    ///
    /// Returns whether the set changed.
    #[instrument(skip(self, item), fields(product_id = %item.id))]
    pub fn add(&self, item: FavouriteItem) -> bool {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        if items.iter().any(|existing| existing.id == item.id) {
            return false;
        }
        items.push(item);
        self.persist(&items);
        true
    }

    /// Remove the item with `id` if present.
    ///
    /// Returns whether the set changed.
    #[instrument(skip(self))]
    pub fn remove(&self, id: ProductId) -> bool {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return false;
        }
        self.persist(&items);
        true
    }

    /// Whether an item with `id` is in the set.
    #[must_use]
    pub fn is_favourite(&self, id: ProductId) -> bool {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|item| item.id == id)
    }

    /// Snapshot of the set in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<FavouriteItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the full set. Failures are logged; the in-memory set stays authoritative.
    fn persist(&self, items: &[FavouriteItem]) {
        let json = match serde_json::to_string(items) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize favourites");
                return;
            }
        };
        if let Err(e) = self.storage.set(FAVOURITES_KEY, &json) {
            warn!(error = %e, "Failed to persist favourites");
        }
    }
}

fn read_items(storage: &dyn KeyValueStore) -> Vec<FavouriteItem> {
    let raw = match storage.get(FAVOURITES_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read favourites, starting empty");
            return Vec::new();
        }
    };

    let mut items: Vec<FavouriteItem> = match serde_json::from_str::<Option<Vec<_>>>(&raw) {
        Ok(items) => items.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed favourites");
            return Vec::new();
        }
    };

    // Documents written elsewhere may repeat an id; the first entry wins.
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.id));
    items
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use rust_decimal::Decimal;

    use super::*;
    use crate::storage::{MemoryStore, StorageError};

    fn widget(id: i64) -> FavouriteItem {
        FavouriteItem {
            id: ProductId::new(id),
            name: format!("Widget {id}"),
            price: Price::new(Decimal::new(10, 0)),
            image: None,
            category_id: None,
        }
    }

    fn empty_store() -> (Arc<MemoryStore>, FavouritesStore) {
        let storage = Arc::new(MemoryStore::new());
        let store = FavouritesStore::load(storage.clone());
        (storage, store)
    }

    #[test]
    fn test_add_twice_then_remove() {
        let (_, store) = empty_store();
        assert!(store.is_empty());

        assert!(store.add(widget(5)));
        assert_eq!(store.len(), 1);

        assert!(!store.add(widget(5)));
        assert_eq!(store.len(), 1);

        assert!(store.remove(ProductId::new(5)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let (storage, store) = empty_store();
        assert!(!store.remove(ProductId::new(99)));
        // No-op mutations do not write
        assert!(storage.get(FAVOURITES_KEY).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_add_keeps_first_snapshot() {
        let (_, store) = empty_store();
        store.add(widget(1));
        let mut renamed = widget(1);
        renamed.name = "Renamed".to_string();
        store.add(renamed);
        assert_eq!(store.items()[0].name, "Widget 1");
    }

    #[test]
    fn test_every_mutation_persists() {
        let (storage, store) = empty_store();
        store.add(widget(1));
        store.add(widget(2));
        let saved: Vec<FavouriteItem> =
            serde_json::from_str(&storage.get(FAVOURITES_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(saved, vec![widget(1), widget(2)]);

        store.remove(ProductId::new(1));
        let saved: Vec<FavouriteItem> =
            serde_json::from_str(&storage.get(FAVOURITES_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(saved, vec![widget(2)]);
    }

    #[test]
    fn test_reload_reproduces_set() {
        let (storage, store) = empty_store();
        for id in [3, 1, 2] {
            store.add(widget(id));
        }

        let reloaded = FavouritesStore::load(storage);
        assert_eq!(reloaded.items(), store.items());
    }

    #[test]
    fn test_loads_web_client_document() {
        let storage = Arc::new(MemoryStore::with_entries([(
            FAVOURITES_KEY,
            r#"[{"id": 5, "name": "Widget", "price": 10, "image": "/w.png", "category_id": 2, "extra": true}]"#,
        )]));
        let store = FavouritesStore::load(storage);
        assert!(store.is_favourite(ProductId::new(5)));
        let item = &store.items()[0];
        assert_eq!(item.price, Price::new(Decimal::new(10, 0)));
        assert_eq!(item.image.as_deref(), Some("/w.png"));
    }

    #[test]
    fn test_malformed_or_null_document_is_empty() {
        for raw in ["not json", "{\"id\": 1}", "null", "[{\"name\": \"no id\"}]"] {
            let storage = Arc::new(MemoryStore::with_entries([(FAVOURITES_KEY, raw)]));
            assert!(FavouritesStore::load(storage).is_empty(), "{raw}");
        }
    }

    #[test]
    fn test_duplicate_ids_in_document_collapse() {
        let storage = Arc::new(MemoryStore::with_entries([(
            FAVOURITES_KEY,
            r#"[{"id": 1, "name": "a"}, {"id": 1, "name": "b"}]"#,
        )]));
        let store = FavouritesStore::load(storage);
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].name, "a");
    }

    #[test]
    fn test_membership_matches_model_over_mixed_sequence() {
        let (_, store) = empty_store();
        let mut model = BTreeSet::new();
        // Deterministic pseudo-random walk over a small id space
        let mut state: u64 = 0x9E37_79B9;
        for _ in 0..500 {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let id = i64::try_from((state >> 33) % 8).unwrap();
            if (state >> 20) % 2 == 0 {
                assert_eq!(store.add(widget(id)), model.insert(id));
            } else {
                assert_eq!(store.remove(ProductId::new(id)), model.remove(&id));
            }
            for probe in 0..8 {
                assert_eq!(store.is_favourite(ProductId::new(probe)), model.contains(&probe));
            }
        }
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::InvalidKey(key.to_string()))
        }
        fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey(key.to_string()))
        }
        fn remove(&self, key: &str) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey(key.to_string()))
        }
    }

    #[test]
    fn test_storage_failures_are_not_surfaced() {
        let store = FavouritesStore::load(Arc::new(FailingStore));
        assert!(store.is_empty());
        assert!(store.add(widget(1)));
        assert!(store.is_favourite(ProductId::new(1)));
    }

    #[test]
    fn test_snapshot_from_product() {
        let product: Product = serde_json::from_str(
            r#"{"id": 8, "name": "Kettle", "price": 2490.0, "main_image": "/k.jpg", "category_id": 4}"#,
        )
        .unwrap();
        let item = FavouriteItem::from(&product);
        assert_eq!(item.id, ProductId::new(8));
        assert_eq!(item.name, "Kettle");
        assert_eq!(item.image.as_deref(), Some("/k.jpg"));
        assert_eq!(item.category_id, Some(CategoryId::new(4)));
    }
}
