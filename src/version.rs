//! Picks the source version a run traverses against.
//!
//! The repository API has no direct "latest released" query, so the released version is
//! taken to be the most recently created non-HEAD version. Sources without any released
//! snapshot fall back to HEAD.

use crate::{error::SyncError, model::SourceVersion};
use chrono::{DateTime, Utc};

/// Which kind of version [`resolve_version`] settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChoice {
    Released,
    HeadFallback,
}

/// Returns the newest non-HEAD version, or HEAD when there is no released one.
///
/// Ties on `created_on` keep the first version encountered.
pub fn resolve_version<'a>(
    source_path: &str,
    versions: &'a [SourceVersion],
) -> Result<(&'a SourceVersion, VersionChoice), SyncError> {
    let latest = versions
        .iter()
        .filter(|v| !v.is_head())
        .fold(None::<&SourceVersion>, |best, v| match best {
            Some(b) if b.created_on >= v.created_on => Some(b),
            _ => Some(v),
        });

    if let Some(version) = latest {
        tracing::info!(
            "Using version: {} created {}",
            version.version_url,
            describe_age(version.created_on, Utc::now())
        );
        return Ok((version, VersionChoice::Released));
    }

    match versions.iter().find(|v| v.is_head()) {
        Some(head) => {
            tracing::warn!(
                "Cannot find latest released version of {}. Using HEAD instead",
                source_path
            );
            Ok((head, VersionChoice::HeadFallback))
        }
        None => Err(SyncError::NoVersionsAvailable(source_path.to_string())),
    }
}

/// Coarse human description of how long ago `then` was, e.g. "3 days ago".
pub fn describe_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    if elapsed.num_seconds() < 0 {
        return "in the future".to_string();
    }
    let (amount, unit) = if elapsed.num_days() >= 365 {
        (elapsed.num_days() / 365, "year")
    } else if elapsed.num_days() >= 30 {
        (elapsed.num_days() / 30, "month")
    } else if elapsed.num_days() >= 1 {
        (elapsed.num_days(), "day")
    } else if elapsed.num_hours() >= 1 {
        (elapsed.num_hours(), "hour")
    } else if elapsed.num_minutes() >= 1 {
        (elapsed.num_minutes(), "minute")
    } else {
        return "just now".to_string();
    };
    if amount == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{amount} {unit}s ago")
    }
}
