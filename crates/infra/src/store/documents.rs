use serde_json::Value as JsonValue;

use kardex_core::{Document, DocumentId, ExpectedVersion};

use super::query::{Page, Pagination, Query, lookup};
use super::r#trait::{DocumentStore, RawDocument, StoreError, UniqueKey, WriteOp};

/// Typed view over a [`DocumentStore`].
///
/// Maps [`Document`] types to and from their JSON bodies, derives unique keys
/// from `Document::UNIQUE_KEYS`, and keeps the in-memory `version` in step with
/// the store so the next `save` is version-checked.
#[derive(Debug, Clone)]
pub struct Documents<S> {
    store: S,
}

impl<S: DocumentStore> Documents<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn get<D: Document>(&self, id: DocumentId) -> Result<Option<D>, StoreError> {
        self.store
            .get(D::COLLECTION, id)
            .await?
            .map(decode::<D>)
            .transpose()
    }

    pub async fn find<D: Document>(&self, query: &Query) -> Result<Page<D>, StoreError> {
        self.store.find(D::COLLECTION, query).await?.try_map(decode::<D>)
    }

    /// Every match, ignoring any pagination on `query`.
    pub async fn find_all<D: Document>(&self, query: Query) -> Result<Vec<D>, StoreError> {
        let query = Query {
            pagination: None,
            ..query
        };
        Ok(self.find(&query).await?.items)
    }

    /// The document whose `field` equals `value`, typically a business key.
    pub async fn find_by<D: Document>(
        &self,
        field: &str,
        value: impl Into<JsonValue>,
    ) -> Result<Option<D>, StoreError> {
        let query = Query::new()
            .eq(field, value)
            .paginate(Pagination::new(Some(1), None));
        Ok(self.find::<D>(&query).await?.items.into_iter().next())
    }

    pub async fn insert<D: Document>(&self, doc: &mut D) -> Result<(), StoreError> {
        let body = serde_json::to_value(&*doc)?;
        let keys = unique_keys::<D>(&body);
        let version = self.store.insert(D::COLLECTION, doc.id(), body, &keys).await?;
        doc.set_version(version);
        Ok(())
    }

    /// Save against the version the document was read at.
    pub async fn save<D: Document>(&self, doc: &mut D) -> Result<(), StoreError> {
        let expected = ExpectedVersion::Exact(doc.version());
        self.save_with(doc, expected).await
    }

    pub async fn save_with<D: Document>(
        &self,
        doc: &mut D,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_value(&*doc)?;
        let keys = unique_keys::<D>(&body);
        let version = self
            .store
            .save(D::COLLECTION, doc.id(), body, expected, &keys)
            .await?;
        doc.set_version(version);
        Ok(())
    }

    /// Save `saved` against its read version and insert `inserted`, both or
    /// neither.
    pub async fn save_and_insert<A: Document, B: Document>(
        &self,
        saved: &mut A,
        inserted: &mut B,
    ) -> Result<(), StoreError> {
        let saved_body = serde_json::to_value(&*saved)?;
        let inserted_body = serde_json::to_value(&*inserted)?;
        let ops = vec![
            WriteOp::Save {
                collection: A::COLLECTION.to_string(),
                id: saved.id(),
                unique_keys: unique_keys::<A>(&saved_body),
                body: saved_body,
                expected: ExpectedVersion::Exact(saved.version()),
            },
            WriteOp::Insert {
                collection: B::COLLECTION.to_string(),
                id: inserted.id(),
                unique_keys: unique_keys::<B>(&inserted_body),
                body: inserted_body,
            },
        ];
        let versions = self.store.write_all(ops).await?;
        match versions[..] {
            [saved_version, inserted_version] => {
                saved.set_version(saved_version);
                inserted.set_version(inserted_version);
                Ok(())
            }
            ref other => Err(StoreError::Backend(format!(
                "batch of 2 writes returned {} versions",
                other.len()
            ))),
        }
    }

    pub async fn delete<D: Document>(&self, doc: &D) -> Result<bool, StoreError> {
        self.store.delete(D::COLLECTION, doc.id()).await
    }

    pub async fn increment(&self, collection: &str, key: &str, field: &str) -> Result<i64, StoreError> {
        self.store.atomic_increment(collection, key, field).await
    }
}

fn decode<D: Document>(raw: RawDocument) -> Result<D, StoreError> {
    let mut doc: D = serde_json::from_value(raw.body)?;
    doc.set_version(raw.version);
    Ok(doc)
}

/// Unique key values present in `body`. Absent or null keys are not claimed.
fn unique_keys<D: Document>(body: &JsonValue) -> Vec<UniqueKey> {
    D::UNIQUE_KEYS
        .iter()
        .filter_map(|field| {
            let value = match lookup(body, field)? {
                JsonValue::Null => return None,
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(UniqueKey {
                field: (*field).to_string(),
                value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;
    use kardex_core::Amount;
    use kardex_products::{NewProduct, Product};
    use std::sync::Arc;

    fn product(sku: &str) -> Product {
        Product::create(
            NewProduct {
                sku: sku.to_string(),
                name: "Taladro".to_string(),
                brand: None,
                description: None,
                price: Amount::from(100),
                cost: Amount::from(60),
                measurements: Vec::new(),
                category: None,
            },
            chrono::Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn typed_round_trip_tracks_versions() {
        let docs = Documents::new(Arc::new(InMemoryDocumentStore::new()));
        let mut p = product("T-1");
        docs.insert(&mut p).await.unwrap();
        assert_eq!(p.version, 1);

        let mut loaded: Product = docs.find_by("sku", "T-1").await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        loaded.name = "Taladro percutor".to_string();
        docs.save(&mut loaded).await.unwrap();
        assert_eq!(loaded.version, 2);

        // The stale copy lost the race.
        p.name = "Otro".to_string();
        let err = docs.save(&mut p).await.unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
    }

    #[tokio::test]
    async fn duplicate_business_key_is_rejected() {
        let docs = Documents::new(Arc::new(InMemoryDocumentStore::new()));
        docs.insert(&mut product("T-1")).await.unwrap();
        let err = docs.insert(&mut product("T-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { ref value, .. } if value == "T-1"));
    }
}
