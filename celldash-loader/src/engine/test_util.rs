//! An in-memory `Store` for engine tests. Strict on purpose: creating an
//! index twice and writing to an absent index are errors, so tests catch
//! ordering bugs the real store would let slide.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use crate::store::{BulkOutcome, Role, Store, error};

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    indices: BTreeMap<String, FakeIndex>,
    roles: BTreeMap<String, Role>,
    bulk_calls: usize,
}

#[derive(Default)]
struct FakeIndex {
    docs: Vec<serde_json::Value>,
    keyed: BTreeMap<String, serde_json::Value>,
}

impl FakeIndex {
    fn all_docs(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.docs.iter().chain(self.keyed.values())
    }
}

fn missing_index(index: &str) -> error::Error {
    error::Error::Request {
        status: 404,
        message: format!("no such index [{index}]"),
    }
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.lock().indices.contains_key(index)
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.lock()
            .indices
            .get(index)
            .map_or(0, |idx| idx.all_docs().count())
    }

    pub fn docs(&self, index: &str) -> Vec<serde_json::Value> {
        self.lock()
            .indices
            .get(index)
            .map(|idx| idx.docs.clone())
            .unwrap_or_default()
    }

    pub fn keyed_doc(&self, index: &str, id: &str) -> Option<serde_json::Value> {
        self.lock()
            .indices
            .get(index)
            .and_then(|idx| idx.keyed.get(id).cloned())
    }

    pub fn role(&self, name: &str) -> Option<Role> {
        self.lock().roles.get(name).cloned()
    }

    pub fn bulk_calls(&self) -> usize {
        self.lock().bulk_calls
    }
}

fn term_matches(doc: &serde_json::Value, field: &str, value: &str) -> bool {
    doc.get(field).and_then(serde_json::Value::as_str) == Some(value)
}

impl Store for FakeStore {
    async fn index_exists(&self, index: &str) -> error::Result<bool> {
        Ok(self.lock().indices.contains_key(index))
    }

    async fn create_index(&self, index: &str, _mapping: &serde_json::Value) -> error::Result<()> {
        let mut state = self.lock();
        if state.indices.contains_key(index) {
            return Err(error::Error::Request {
                status: 400,
                message: format!("resource_already_exists_exception: [{index}]"),
            });
        }

        state.indices.insert(index.to_string(), FakeIndex::default());
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> error::Result<()> {
        self.lock().indices.remove(index);
        Ok(())
    }

    async fn write_docs(
        &self,
        index: &str,
        docs: Vec<serde_json::Value>,
    ) -> error::Result<BulkOutcome> {
        let mut state = self.lock();
        state.bulk_calls += 1;

        let submitted = docs.len();
        let target = state
            .indices
            .get_mut(index)
            .ok_or_else(|| missing_index(index))?;
        target.docs.extend(docs);

        Ok(BulkOutcome {
            submitted,
            failures: Vec::new(),
        })
    }

    async fn write_doc(
        &self,
        index: &str,
        id: &str,
        doc: &serde_json::Value,
    ) -> error::Result<()> {
        let mut state = self.lock();
        let target = state
            .indices
            .get_mut(index)
            .ok_or_else(|| missing_index(index))?;
        target.keyed.insert(id.to_string(), doc.clone());

        Ok(())
    }

    async fn count_term(&self, index: &str, field: &str, value: &str) -> error::Result<u64> {
        Ok(self.lock().indices.get(index).map_or(0, |idx| {
            idx.all_docs()
                .filter(|doc| term_matches(doc, field, value))
                .count() as u64
        }))
    }

    async fn delete_by_term(&self, index: &str, field: &str, value: &str) -> error::Result<()> {
        let mut state = self.lock();
        if let Some(idx) = state.indices.get_mut(index) {
            idx.docs.retain(|doc| !term_matches(doc, field, value));
            idx.keyed.retain(|_, doc| !term_matches(doc, field, value));
        }

        Ok(())
    }

    async fn fetch_role(&self, name: &str) -> error::Result<Option<Role>> {
        Ok(self.lock().roles.get(name).cloned())
    }

    async fn fetch_roles(&self) -> error::Result<BTreeMap<String, Role>> {
        Ok(self.lock().roles.clone())
    }

    async fn put_role(&self, name: &str, role: &Role) -> error::Result<()> {
        self.lock().roles.insert(name.to_string(), role.clone());
        Ok(())
    }
}
