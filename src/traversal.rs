use crate::{
    error::SyncError,
    model::{Concept, ConceptId},
};
use futures::future::join_all;
use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    future::Future,
};

/// Number of concept fetches allowed in flight at once unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 15;

/// Concepts resolved during a traversal, keyed by their own id.
pub type ResolvedConcepts = BTreeMap<ConceptId, Concept>;

/// Retrieves a single concept (with its mappings) from a fixed, version-scoped source.
pub trait ConceptFetcher: Sync {
    fn fetch(&self, id: &ConceptId) -> impl Future<Output = Result<Concept, SyncError>> + Send;
}

/// Walks the mapping closure of a set of seed concepts with bounded concurrency.
///
/// ## Worklist and cache
///
/// The traversal owns a FIFO worklist of concept ids and the cache of resolved concepts.
/// The cache is the only record of "already fetched": an id that is a cache key is never
/// fetched again, no matter how many times it is enqueued. Ids may sit in the worklist
/// more than once; duplicates are dropped when a batch is assembled.
///
/// ## Batches
///
/// Work is processed in synchronous batches:
///
/// 1. Pop ids off the worklist until `concurrency` uncached, unrequested ids are
///    collected (cached ids are skipped without using a slot)
/// 2. Fetch the whole batch concurrently and wait for every fetch to settle
/// 3. Fold the results into the cache one at a time, enqueuing the same-source mapping
///    targets of each new concept
///
/// Nothing touches the worklist or cache while a batch is in flight, so the next batch
/// always sees every expansion of the previous one and no locking is needed. Since only
/// one batch is ever in flight, `concurrency` bounds the outstanding requests for the
/// whole traversal.
///
/// ## Failure
///
/// Any fetch failure is fatal. The failing batch still settles, then the first error (in
/// batch order) is returned and the traversal should be discarded.
///
/// ## Termination
///
/// Each id is requested at most once, and only ids discovered from newly cached concepts
/// are enqueued, so a finite graph always drains the worklist.
pub struct ConceptTraversal {
    source_path: String,
    concurrency: usize,
    worklist: VecDeque<ConceptId>,
    resolved: ResolvedConcepts,
    /// Every id a fetch was issued for, which may differ from the id the server answered with
    requested: HashSet<ConceptId>,
    /// Requested id -> id of the concept the server returned instead
    answered_as: HashMap<ConceptId, ConceptId>,
    stats: TraversalStats,
}

/// Statistics about a traversal (useful for logging and tests)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub fetches: usize,
    pub cache_hits: usize,
    pub batches: usize,
    pub largest_batch: usize,
}

impl ConceptTraversal {
    /// Create a traversal that follows mappings into `source_path`, with at most
    /// `concurrency` fetches in flight.
    pub fn new(source_path: impl Into<String>, concurrency: usize) -> Result<Self, SyncError> {
        if concurrency == 0 {
            return Err(SyncError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            source_path: source_path.into(),
            concurrency,
            worklist: VecDeque::new(),
            resolved: BTreeMap::new(),
            requested: HashSet::new(),
            answered_as: HashMap::new(),
            stats: TraversalStats::default(),
        })
    }

    /// Enqueue an id unless it is already resolved.
    pub fn enqueue(&mut self, id: impl Into<ConceptId>) {
        let id = id.into();
        if !self.resolved.contains_key(&id) {
            self.worklist.push_back(id);
        }
    }

    pub fn enqueue_all<I, T>(&mut self, ids: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<ConceptId>,
    {
        for id in ids {
            self.enqueue(id);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.worklist.is_empty()
    }

    pub fn worklist_len(&self) -> usize {
        self.worklist.len()
    }

    pub fn concept(&self, id: &ConceptId) -> Option<&Concept> {
        self.resolved.get(id)
    }

    pub fn resolved(&self) -> &ResolvedConcepts {
        &self.resolved
    }

    pub fn into_resolved(self) -> ResolvedConcepts {
        self.resolved
    }

    pub fn stats(&self) -> TraversalStats {
        self.stats
    }

    /// Fetch and fold one batch.
    ///
    /// # Returns
    /// * `Ok(Some(n))` - A batch of `n` concepts was fetched and folded in
    /// * `Ok(None)` - Worklist drained, nothing left to fetch
    /// * `Err(_)` - A fetch in the batch failed
    pub async fn run_batch<F: ConceptFetcher>(
        &mut self,
        fetcher: &F,
    ) -> Result<Option<usize>, SyncError> {
        let batch = self.next_batch();
        if batch.is_empty() {
            return Ok(None);
        }

        tracing::info!(
            "Fetching batch of {} ({} left to handle)",
            batch.len(),
            self.worklist.len()
        );
        self.stats.batches += 1;
        self.stats.fetches += batch.len();
        self.stats.largest_batch = self.stats.largest_batch.max(batch.len());

        let results = join_all(batch.iter().map(|id| fetcher.fetch(id))).await;
        let concepts = results.into_iter().collect::<Result<Vec<Concept>, SyncError>>()?;

        let count = concepts.len();
        for (requested, concept) in batch.into_iter().zip(concepts) {
            self.absorb(requested, concept);
        }
        Ok(Some(count))
    }

    /// Run batches until the worklist is drained.
    pub async fn run<F: ConceptFetcher>(&mut self, fetcher: &F) -> Result<(), SyncError> {
        while self.run_batch(fetcher).await?.is_some() {}
        tracing::info!(
            "Traversal complete: {} concepts in {} batches ({} fetches, {} cache hits)",
            self.resolved.len(),
            self.stats.batches,
            self.stats.fetches,
            self.stats.cache_hits
        );
        Ok(())
    }

    /// Return the concept for `id`, fetching it only if it is not already resolved.
    /// An id the server previously answered with a different concept returns that concept.
    ///
    /// A newly fetched concept is expanded like any other, so its related ids land in the
    /// worklist for the next [`run`](Self::run).
    pub async fn resolve<F: ConceptFetcher>(
        &mut self,
        id: &ConceptId,
        fetcher: &F,
    ) -> Result<&Concept, SyncError> {
        let cached = if self.resolved.contains_key(id) {
            Some(id.clone())
        } else {
            self.answered_as.get(id).cloned()
        };
        let key = if let Some(key) = cached {
            self.stats.cache_hits += 1;
            key
        } else {
            let concept = fetcher.fetch(id).await?;
            self.stats.fetches += 1;
            self.requested.insert(id.clone());
            let key = concept.id.clone();
            self.absorb(id.clone(), concept);
            key
        };
        self.resolved.get(&key).ok_or_else(|| {
            SyncError::malformed(
                format!("fetch concept {id}"),
                "concept missing from cache after fetch",
            )
        })
    }

    /// Pop up to `concurrency` ids that still need fetching.
    fn next_batch(&mut self) -> Vec<ConceptId> {
        let mut batch = Vec::with_capacity(self.concurrency);
        while batch.len() < self.concurrency {
            let Some(id) = self.worklist.pop_front() else {
                break;
            };
            if self.resolved.contains_key(&id) || self.requested.contains(&id) {
                tracing::debug!("using already-fetched {}", id);
                self.stats.cache_hits += 1;
                continue;
            }
            self.requested.insert(id.clone());
            batch.push(id);
        }
        batch
    }

    /// Store a fetched concept and enqueue its unresolved same-source neighbours.
    fn absorb(&mut self, requested: ConceptId, concept: Concept) {
        if concept.id != requested {
            tracing::warn!(
                "Requested concept {} but OCL answered with {}",
                requested,
                concept.id
            );
            self.answered_as.insert(requested, concept.id.clone());
        }
        if self.resolved.contains_key(&concept.id) {
            tracing::debug!("{} already resolved, keeping first copy", concept.id);
            return;
        }

        let related: Vec<ConceptId> = concept.related_ids(&self.source_path).collect();
        tracing::debug!(
            "got back {} which has {} related concepts",
            concept.id,
            related.len()
        );
        self.resolved.insert(concept.id.clone(), concept);
        for id in related {
            self.enqueue(id);
        }
    }
}

/// Resolve the mapping closure of `seeds` within `source_path`.
pub async fn traverse<F, I, T>(
    seeds: I,
    fetcher: &F,
    source_path: &str,
    concurrency: usize,
) -> Result<(ResolvedConcepts, TraversalStats), SyncError>
where
    F: ConceptFetcher,
    I: IntoIterator<Item = T>,
    T: Into<ConceptId>,
{
    let mut traversal = ConceptTraversal::new(source_path, concurrency)?;
    traversal.enqueue_all(seeds);
    traversal.run(fetcher).await?;
    let stats = traversal.stats();
    Ok((traversal.into_resolved(), stats))
}
