//! Shared test utilities: concept fixtures and in-memory stand-ins for OCL.

use crate::{
    client::OclRepository,
    error::SyncError,
    model::{parse_timestamp, Concept, ConceptId, Mapping, Reference, SourceVersion},
    projection::ReferenceSet,
    traversal::ConceptFetcher,
};
use http::StatusCode;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

pub const SOURCE: &str = "/orgs/CIEL/sources/CIEL/";

/// A concept in [`SOURCE`] with one same-source mapping per entry of `related`.
pub fn concept(id: &str, related: &[&str]) -> Concept {
    Concept {
        id: ConceptId::from(id),
        display_name: format!("Concept {id}"),
        version_url: format!("{SOURCE}concepts/{id}/1/"),
        mappings: related
            .iter()
            .map(|to| Mapping {
                url: format!("{SOURCE}mappings/{id}-{to}/"),
                map_type: "Q-AND-A".to_string(),
                from_concept_url: Some(format!("{SOURCE}concepts/{id}/")),
                to_source_url: Some(SOURCE.to_string()),
                to_concept_code: Some(to.to_string()),
                to_concept_url: Some(format!("{SOURCE}concepts/{to}/")),
            })
            .collect(),
    }
}

pub fn version(id: &str, created_on: &str) -> SourceVersion {
    SourceVersion {
        id: id.to_string(),
        version_url: if id == "HEAD" {
            SOURCE.to_string()
        } else {
            format!("{SOURCE}{id}/")
        },
        created_on: parse_timestamp(created_on).expect("valid test timestamp"),
    }
}

/// Serves concepts from memory, counting calls and tracking how many are in flight.
#[derive(Default)]
pub struct FakeFetcher {
    concepts: HashMap<ConceptId, Concept>,
    aliases: HashMap<ConceptId, ConceptId>,
    calls: Mutex<HashMap<ConceptId, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub fn new(concepts: Vec<Concept>) -> Self {
        Self {
            concepts: concepts.into_iter().map(|c| (c.id.clone(), c)).collect(),
            ..Default::default()
        }
    }

    /// Answer requests for `requested` with the concept stored as `actual`.
    pub fn with_alias(mut self, requested: &str, actual: &str) -> Self {
        self.aliases
            .insert(ConceptId::from(requested), ConceptId::from(actual));
        self
    }

    pub fn calls_for(&self, id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&ConceptId::from(id))
            .copied()
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ConceptFetcher for FakeFetcher {
    async fn fetch(&self, id: &ConceptId) -> Result<Concept, SyncError> {
        *self.calls.lock().unwrap().entry(id.clone()).or_insert(0) += 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Let every other fetch in the batch start before this one finishes
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let key = self.aliases.get(id).unwrap_or(id);
        self.concepts.get(key).cloned().ok_or_else(|| {
            SyncError::status(
                format!("fetch concept {id}"),
                format!("fake://concepts/{id}"),
                StatusCode::NOT_FOUND,
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Add(Vec<Reference>),
    Delete(Vec<Reference>),
}

/// An in-memory OCL: a source with versions and concepts, and one collection.
pub struct FakeRepository {
    fetcher: FakeFetcher,
    versions: Vec<SourceVersion>,
    collection: Mutex<ReferenceSet>,
    ops: Mutex<Vec<WriteOp>>,
    fetched_versions: Mutex<Vec<String>>,
    fail_adds: bool,
}

impl FakeRepository {
    pub fn new<I, T>(concepts: Vec<Concept>, versions: Vec<SourceVersion>, collection: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Reference>,
    {
        Self {
            fetcher: FakeFetcher::new(concepts),
            versions,
            collection: Mutex::new(collection.into_iter().map(Into::into).collect()),
            ops: Mutex::new(Vec::new()),
            fetched_versions: Mutex::new(Vec::new()),
            fail_adds: false,
        }
    }

    pub fn failing_adds(mut self) -> Self {
        self.fail_adds = true;
        self
    }

    pub fn write_ops(&self) -> Vec<WriteOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn collection(&self) -> ReferenceSet {
        self.collection.lock().unwrap().clone()
    }

    pub fn fetched_versions(&self) -> Vec<String> {
        self.fetched_versions.lock().unwrap().clone()
    }
}

impl OclRepository for FakeRepository {
    async fn current_references(&self) -> Result<Vec<Reference>, SyncError> {
        Ok(self.collection().into_iter().collect())
    }

    async fn source_versions(&self) -> Result<Vec<SourceVersion>, SyncError> {
        Ok(self.versions.clone())
    }

    async fn fetch_concept(&self, version_url: &str, id: &ConceptId) -> Result<Concept, SyncError> {
        self.fetched_versions
            .lock()
            .unwrap()
            .push(version_url.to_string());
        self.fetcher.fetch(id).await
    }

    async fn add_references(&self, references: &[Reference]) -> Result<Value, SyncError> {
        if references.is_empty() {
            return Ok(json!([]));
        }
        if self.fail_adds {
            return Err(SyncError::status(
                "add references",
                "fake://references",
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
        self.ops
            .lock()
            .unwrap()
            .push(WriteOp::Add(references.to_vec()));
        self.collection
            .lock()
            .unwrap()
            .extend(references.iter().cloned());
        Ok(json!([{ "added": true }]))
    }

    async fn delete_references(&self, references: &[Reference]) -> Result<Value, SyncError> {
        if references.is_empty() {
            return Ok(json!([]));
        }
        self.ops
            .lock()
            .unwrap()
            .push(WriteOp::Delete(references.to_vec()));
        let mut collection = self.collection.lock().unwrap();
        for reference in references {
            collection.remove(reference);
        }
        Ok(json!([]))
    }
}
