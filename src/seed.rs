//! Reading the seed list of concept ids.

use crate::{config, error::SyncError, model::ConceptId};
use std::path::Path;

/// Seed ids in file order, plus the lines that could not be used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedList {
    pub ids: Vec<u64>,
    /// `SyncError::Parse` for every non-blank line that is not an integer
    pub rejected: Vec<SyncError>,
}

impl SeedList {
    pub fn concept_ids(&self) -> impl Iterator<Item = ConceptId> + '_ {
        self.ids.iter().map(|id| ConceptId::from(*id))
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Parse newline-delimited seed ids. Blank lines are ignored; other unparseable lines are
/// logged and skipped.
pub fn parse_seed_ids(content: &str) -> SeedList {
    let mut seeds = SeedList::default();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed.parse::<u64>() {
            Ok(id) => seeds.ids.push(id),
            Err(e) => {
                tracing::warn!("Could not parse line {}: {:?} ({})", idx + 1, trimmed, e);
                seeds
                    .rejected
                    .push(SyncError::Parse(format!("line {}: {trimmed:?}", idx + 1)));
            }
        }
    }
    seeds
}

/// Read and parse a seed file. A missing or unreadable file is a configuration error.
pub fn read_seed_file(path: impl AsRef<Path>) -> Result<SeedList, SyncError> {
    let path = path.as_ref();
    let content = config::get_content(path).map_err(|e| {
        SyncError::Configuration(format!("Cannot read file: {} ({e})", path.display()))
    })?;
    let seeds = parse_seed_ids(&content);
    tracing::info!(
        "{} refers to {} concept(s): {:?}",
        path.display(),
        seeds.len(),
        seeds.ids
    );
    Ok(seeds)
}
