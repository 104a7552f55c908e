//! One end-to-end synchronization pass.
//!
//! ```text
//! seeds ──► traverse (version-scoped fetches) ──► project ──► desired ─┐
//!                                                                      ├─► reconcile ──► add, then delete
//! collection ──────────────────────────────────────────────► observed ─┘
//! ```
//!
//! The pass stops at the first upstream failure. Additions are always fully applied
//! before any deletion is attempted, so an interrupted run leaves stale references
//! behind rather than removing wanted ones.

use crate::{
    client::{OclClient, OclRepository, VersionScopedFetcher},
    config::SyncConfig,
    error::SyncError,
    model::ConceptId,
    projection::{describe, project_references, ReferenceSet},
    reconcile::{reconcile, ReconciliationPlan},
    seed::read_seed_file,
    traversal::{traverse, TraversalStats},
    version::{resolve_version, VersionChoice},
};

/// The parts of [`SyncConfig`] a pass needs once the seeds and repository are in hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub source_path: String,
    pub concurrency: usize,
    pub commit: bool,
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        SyncOptions {
            source_path: config.source_path.clone(),
            concurrency: config.concurrency,
            commit: config.commit,
        }
    }
}

/// What a pass found and did.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub version_url: String,
    pub version_choice: VersionChoice,
    pub concept_count: usize,
    pub desired: ReferenceSet,
    pub observed_count: usize,
    pub plan: ReconciliationPlan,
    /// False for dry runs
    pub committed: bool,
    pub traversal: TraversalStats,
}

#[tracing::instrument(skip_all, fields(source = %options.source_path))]
pub async fn run_sync<R: OclRepository>(
    repository: &R,
    seeds: &[ConceptId],
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let (observed, versions) =
        tokio::try_join!(repository.current_references(), repository.source_versions())?;
    let observed: ReferenceSet = observed.into_iter().collect();
    let (version, version_choice) = resolve_version(&options.source_path, &versions)?;
    tracing::info!(
        "Collection has {} references (before). Ready to start fetching concepts",
        observed.len()
    );

    let fetcher = VersionScopedFetcher::new(repository, version.version_url.clone());
    let (resolved, traversal) = traverse(
        seeds.iter().cloned(),
        &fetcher,
        &options.source_path,
        options.concurrency,
    )
    .await?;

    for line in describe(&resolved) {
        tracing::debug!("{}", line);
    }
    let desired = project_references(&resolved);
    let plan = reconcile(&desired, &observed);
    tracing::info!("Adding {}", plan.to_add.len());
    tracing::info!("Deleting {}", plan.to_delete.len());

    if options.commit {
        repository.add_references(&plan.to_add).await?;
        repository.delete_references(&plan.to_delete).await?;
    } else {
        tracing::info!("Dry run, not committing changes");
    }

    Ok(SyncReport {
        version_url: version.version_url.clone(),
        version_choice,
        concept_count: resolved.len(),
        desired,
        observed_count: observed.len(),
        plan,
        committed: options.commit,
        traversal,
    })
}

/// Validate `config`, read its seed file and run a pass against the configured server.
pub async fn run_from_config(config: &SyncConfig) -> Result<SyncReport, SyncError> {
    config.validate()?;
    let seeds = read_seed_file(&config.concept_file)?;
    if seeds.is_empty() {
        tracing::warn!(
            "{} contains no usable concept ids; the collection will be emptied",
            config.concept_file.display()
        );
    }
    let client = OclClient::new(config)?;
    let seed_ids: Vec<ConceptId> = seeds.concept_ids().collect();
    run_sync(&client, &seed_ids, &SyncOptions::from(config)).await
}
