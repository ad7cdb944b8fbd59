use std::collections::{HashMap, VecDeque};
use tracing::warn;

use crate::error::ServiceError;
use crate::extraction::ExtractionTarget;

/// Results that can be matched back to the target they were produced for.
pub trait Identified {
    fn target_url(&self) -> &str;
}

/// Input targets sharing a grouping key (e.g. a country).
#[derive(Debug, Clone)]
pub struct TargetGroup {
    pub key: String,
    pub targets: Vec<ExtractionTarget>,
}

#[derive(Debug, Clone)]
pub struct ResultGroup<R> {
    pub key: String,
    pub results: Vec<R>,
}

/// Results grouped and ordered exactly like the request's targets.
#[derive(Debug, Clone)]
pub struct ResultSet<R> {
    pub groups: Vec<ResultGroup<R>>,
}

impl<R> ResultSet<R> {
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.results.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_flat(self) -> Vec<R> {
        self.groups.into_iter().flat_map(|g| g.results).collect()
    }
}

/// Match every input target to exactly one result by URL.
///
/// Results for a URL that appears more than once are consumed in the order
/// they were supplied. A target without a result is an internal error.
pub fn aggregate<R: Identified>(
    inputs: &[TargetGroup],
    results: Vec<R>,
) -> Result<ResultSet<R>, ServiceError> {
    let mut by_url: HashMap<String, VecDeque<R>> = HashMap::new();
    for result in results {
        by_url.entry(result.target_url().to_string()).or_default().push_back(result);
    }

    let mut groups = Vec::with_capacity(inputs.len());
    for group in inputs {
        let mut matched = Vec::with_capacity(group.targets.len());
        for target in &group.targets {
            let result = by_url
                .get_mut(&target.url)
                .and_then(VecDeque::pop_front)
                .ok_or_else(|| ServiceError::MissingResult { url: target.url.clone() })?;
            matched.push(result);
        }
        groups.push(ResultGroup { key: group.key.clone(), results: matched });
    }

    let leftover: usize = by_url.values().map(VecDeque::len).sum();
    if leftover > 0 {
        warn!(leftover, "aggregate: results without a matching target were dropped");
    }

    Ok(ResultSet { groups })
}
