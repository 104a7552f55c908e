//! # ocl-sync
//!
//! Keeps an OCL (Open Concept Lab) collection in sync with the mapping closure of a seed list
//! of concepts.
//!
//! ## Overview
//!
//! The owner of a collection supplies a list of concept ids. ocl-sync discovers every concept
//! reachable from those seeds through mappings that stay inside the same source, works out
//! which collection references represent that closure, and then adds and deletes references
//! until the collection holds exactly that set.
//!
//! A pass runs in four stages:
//!
//! 1. **Version resolution**: pick the newest released source version, or HEAD when there
//!    is none ([`version`])
//! 2. **Traversal**: batched, bounded-concurrency worklist walk of the concept graph, fetching
//!    every concept at most once ([`traversal`])
//! 3. **Projection**: one reference per concept version and one per mapping ([`projection`])
//! 4. **Reconciliation**: set difference of desired against observed, applied as additions
//!    followed by deletions ([`reconcile`], [`sync`])
//!
//! ## Architecture
//!
//! - **[`model`]**: Wire records (`Concept`, `Mapping`, `SourceVersion`) and the `ConceptId` /
//!   `Reference` newtypes
//! - **[`traversal`]**: `ConceptTraversal` and the `ConceptFetcher` trait it is driven by
//! - **[`client`]**: `OclRepository` trait and the reqwest-backed `OclClient`
//! - **[`config`]**: Layered TOML configuration (`default.toml` + `local.toml`)
//! - **[`seed`]**: Seed file parsing
//! - **[`sync`]**: The end-to-end pass and its `SyncReport`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocl_sync::{config::TomlConfigProvider, sync::run_from_config};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TomlConfigProvider::new("./config").with_env_token().load()?;
//!     let report = run_from_config(&config).await?;
//!     println!("{} concepts, {}", report.concept_count, report.plan);
//!     Ok(())
//! }
//! ```
//!
//! ### Traversing with a custom fetcher
//!
//! The traversal only needs something that implements [`traversal::ConceptFetcher`], which
//! makes it easy to drive from a cache, a fixture, or a different transport:
//!
//! ```rust,no_run
//! # use ocl_sync::{model::{Concept, ConceptId}, traversal::{traverse, ConceptFetcher}, SyncError};
//! struct Fixture(Vec<Concept>);
//!
//! impl ConceptFetcher for Fixture {
//!     async fn fetch(&self, id: &ConceptId) -> Result<Concept, SyncError> {
//!         self.0
//!             .iter()
//!             .find(|c| &c.id == id)
//!             .cloned()
//!             .ok_or_else(|| SyncError::malformed("fetch concept", format!("unknown id {id}")))
//!     }
//! }
//!
//! # async fn example(fixture: Fixture) -> Result<(), SyncError> {
//! let (resolved, stats) = traverse([100u64], &fixture, "/orgs/CIEL/sources/CIEL/", 15).await?;
//! println!("{} concepts after {} fetches", resolved.len(), stats.fetches);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **default**: The library
//! - **bin**: The `ocl-sync` command line tool

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod projection;
pub mod reconcile;
pub mod seed;
pub mod sync;
pub mod traversal;
pub mod version;

pub use error::*;
