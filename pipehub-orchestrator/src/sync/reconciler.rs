//! Pipeline reconciliation
//!
//! Diffs the stored mirror against what the providers reported in one pass.
//! Identity across passes is the composite key `"{name}-{application_id}"`;
//! the provider-native id is only carried along for new rows.

use pipehub_core::domain::pipeline::Pipeline;
use pipehub_core::dto::pipeline::{CreatePipeline, FetchedPipeline};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Identity of a pipeline across sync passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey<'a> {
    pub name: &'a str,
    pub application_id: i64,
}

impl<'a> PipelineKey<'a> {
    pub fn of_stored(pipeline: &'a Pipeline) -> Self {
        Self {
            name: &pipeline.name,
            application_id: pipeline.application_id,
        }
    }

    pub fn of_fetched(pipeline: &'a FetchedPipeline) -> Self {
        Self {
            name: &pipeline.name,
            application_id: pipeline.application_id,
        }
    }
}

impl fmt::Display for PipelineKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.application_id)
    }
}

/// Writes needed to bring the mirror in line with upstream
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_create: Vec<CreatePipeline>,
    /// Ids of stored pipelines to remove
    pub to_delete: Vec<i64>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

/// Compute the plan for one pass.
///
/// `existing` must only hold pipelines of applications that were fetched
/// successfully in this pass. `patterns` maps an application id to its
/// name filter; applications without one are absent.
pub fn reconcile(
    existing: &[Pipeline],
    fetched: &[FetchedPipeline],
    patterns: &HashMap<i64, Regex>,
) -> ReconcilePlan {
    let allowed = |name: &str, application_id: i64| {
        patterns
            .get(&application_id)
            .is_none_or(|pattern| pattern.is_match(name))
    };

    let fetched_keys: HashSet<PipelineKey> = fetched
        .iter()
        .filter(|p| allowed(&p.name, p.application_id))
        .map(PipelineKey::of_fetched)
        .collect();

    let to_delete = existing
        .iter()
        .filter(|p| {
            !fetched_keys.contains(&PipelineKey::of_stored(p)) || !allowed(&p.name, p.application_id)
        })
        .map(|p| p.id)
        .collect();

    let existing_keys: HashSet<PipelineKey> = existing.iter().map(PipelineKey::of_stored).collect();
    let mut emitted: HashSet<PipelineKey> = HashSet::new();

    let to_create = fetched
        .iter()
        .filter(|p| allowed(&p.name, p.application_id))
        .filter(|p| {
            let key = PipelineKey::of_fetched(*p);
            !existing_keys.contains(&key) && emitted.insert(key)
        })
        .map(FetchedPipeline::to_create)
        .collect();

    ReconcilePlan {
        to_create,
        to_delete,
    }
}

/// Ids of stored pipelines whose application filter no longer admits them.
///
/// Used for applications whose fetch failed: their rows are otherwise left
/// alone, but a name filter can still be applied without upstream data.
pub fn prune_by_pattern(existing: &[Pipeline], patterns: &HashMap<i64, Regex>) -> Vec<i64> {
    existing
        .iter()
        .filter(|p| {
            patterns
                .get(&p.application_id)
                .is_some_and(|pattern| !pattern.is_match(&p.name))
        })
        .map(|p| p.id)
        .collect()
}
