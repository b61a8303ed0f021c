//! Result filter, resorter, and deduplicator.
//!
//! The only ordering and partial-failure policy the application owns itself.
//! Within one search the stages always run in this order:
//!
//! 1. [`filter_available`] / [`filter_with_transcripts`]: keep the first
//!    `limit` items that pass an availability check.
//! 2. [`resort`]: stable re-sort by a key the provider could not sort by.
//! 3. [`dedupe`]: drop repeated identities, first occurrence wins.

use std::collections::HashSet;
use std::hash::Hash;

use crate::models::CandidateItem;
use crate::traits::TranscriptSource;

/// Outcome of probing one item.
#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    Available(String),
    Unavailable(String),
}

/// An item the availability filter dropped, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub id: String,
    pub reason: String,
}

/// Keep items satisfying `predicate`, in input order, stopping after `limit`.
///
/// The predicate is not called again once `limit` matches are found.
pub fn filter_available<T, F>(items: Vec<T>, mut predicate: F, limit: usize) -> Vec<T>
where
    F: FnMut(&T) -> bool,
{
    let mut kept = Vec::with_capacity(limit.min(items.len()));
    if limit == 0 {
        return kept;
    }
    for item in items {
        if predicate(&item) {
            kept.push(item);
            if kept.len() == limit {
                break;
            }
        }
    }
    kept
}

/// Sequentially probe transcripts and keep the first `limit` videos that have one.
///
/// Provider errors count as "unavailable". Accepted items carry the fetched
/// transcript so later stages don't fetch it again.
pub async fn filter_with_transcripts(
    items: Vec<CandidateItem>,
    source: &dyn TranscriptSource,
    languages: &[String],
    limit: usize,
) -> (Vec<CandidateItem>, Vec<Rejection>) {
    let mut kept = Vec::new();
    let mut rejected = Vec::new();
    if limit == 0 {
        return (kept, rejected);
    }

    for mut item in items {
        match probe_transcript(source, &item.id, languages).await {
            Availability::Available(text) => {
                item.transcript = Some(text);
                kept.push(item);
                if kept.len() == limit {
                    break;
                }
            }
            Availability::Unavailable(reason) => {
                tracing::debug!(video_id = %item.id, %reason, "excluding video without transcript");
                rejected.push(Rejection {
                    id: item.id,
                    reason,
                });
            }
        }
    }
    (kept, rejected)
}

pub async fn probe_transcript(
    source: &dyn TranscriptSource,
    video_id: &str,
    languages: &[String],
) -> Availability {
    match source.transcript(video_id, languages).await {
        Ok(Some(text)) if !text.trim().is_empty() => Availability::Available(text),
        Ok(_) => Availability::Unavailable(format!(
            "no transcript in {}",
            languages.join(", ")
        )),
        Err(e) => Availability::Unavailable(format!("transcript provider error: {}", e)),
    }
}

/// Stable sort by `key_fn`, then truncate to `limit`.
///
/// Equal keys keep their input order in both directions.
pub fn resort<T, K, F>(mut items: Vec<T>, key_fn: F, descending: bool, limit: usize) -> Vec<T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    if descending {
        items.sort_by(|a, b| key_fn(b).cmp(&key_fn(a)));
    } else {
        items.sort_by_key(|a| key_fn(a));
    }
    items.truncate(limit);
    items
}

/// Remove repeated identities, keeping first occurrences in order.
///
/// With `limit`, scanning stops once that many unique items are kept.
pub fn dedupe<T, K, F>(items: Vec<T>, identity_fn: F, limit: Option<usize>) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for item in items {
        if limit.is_some_and(|l| kept.len() >= l) {
            break;
        }
        if seen.insert(identity_fn(&item)) {
            kept.push(item);
        }
    }
    kept
}

/// Secondary ordering applied after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResortKey {
    Newest,
    Oldest,
    /// Keep the provider's order.
    None,
}

impl ResortKey {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "newest" => Some(Self::Newest),
            "oldest" => Some(Self::Oldest),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    /// Apply to candidate items. Items without a timestamp sort as the oldest.
    pub fn apply(&self, items: Vec<CandidateItem>, limit: usize) -> Vec<CandidateItem> {
        match self {
            Self::Newest => resort(items, |i| i.published_at, true, limit),
            Self::Oldest => resort(items, |i| i.published_at, false, limit),
            Self::None => {
                let mut items = items;
                items.truncate(limit);
                items
            }
        }
    }
}
