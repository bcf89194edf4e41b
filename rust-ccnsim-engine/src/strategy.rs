//! Forwarding strategies and the policies they share.

use crate::dynamic_fib::DynamicFib;
use crate::fib::StaticFib;
use rust_ccnsim_common::ndn::{DataType, Name, MIN_ROUTABLE_COMPONENTS};
use rust_ccnsim_common::types::{FaceId, DEFAULT_CACHE_THRESHOLD, DEFAULT_GOLDEN_RATIO};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// How routers choose next hops and cache returning Data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Cache-aware forwarding over static and dynamic FIBs with weighted
    /// caching-router designation.
    DoMyBest,
    /// Shortest-path forwarding with probabilistic on-path caching.
    StaticOnly { cache_probability: f64 },
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::DoMyBest
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::DoMyBest => write!(f, "do-my-best"),
            Strategy::StaticOnly { cache_probability } => {
                write!(f, "static-only(p={})", cache_probability)
            }
        }
    }
}

/// Decides whether a cache hit should be re-cached further downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Minimum `current - caching` gap for a further copy.
    pub cache_threshold: i32,
    /// `caching / current` must stay below this.
    pub golden_ratio: f64,
}

impl CachePolicy {
    /// Type of a Data answered from a content store.
    pub fn classify_hit(&self, current: i32, caching: i32) -> DataType {
        let far_enough = current - caching > self.cache_threshold;
        let ratio_ok = current != 0 && (caching as f64 / current as f64) < self.golden_ratio;
        if far_enough && ratio_ok {
            DataType::Normal
        } else {
            DataType::NoCache
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            cache_threshold: DEFAULT_CACHE_THRESHOLD,
            golden_ratio: DEFAULT_GOLDEN_RATIO,
        }
    }
}

/// A next-hop candidate with its estimated round-trip cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCost {
    pub face: FaceId,
    pub cost: f32,
}

/// Candidate next hops for `name`, cheapest first. The static route comes
/// first among equal costs, then dynamic faces in face order.
pub fn rank_faces(name: &Name, static_fib: &StaticFib, dynamic_fib: &DynamicFib) -> Vec<FaceCost> {
    if name.len() < MIN_ROUTABLE_COMPONENTS {
        return Vec::new();
    }
    let Some(route) = static_fib.query_name(name) else {
        return Vec::new();
    };

    let static_metric = route.metric;
    let chunks = name.chunk_count().filter(|&c| c > 0);

    let mut costs = vec![FaceCost {
        face: route.face,
        cost: 2.0 * static_metric,
    }];
    for info in dynamic_fib.query(&name.trim_last()) {
        let uncovered = match chunks {
            Some(total) => (total as f32 - info.num as f32) / total as f32,
            None => 1.0,
        };
        costs.push(FaceCost {
            face: info.face,
            cost: 2.0 * info.metric + 2.0 * static_metric * uncovered,
        });
    }

    // stable sort keeps the static route ahead of equally priced caches
    costs.sort_by(|a, b| a.cost.total_cmp(&b.cost));
    costs
}

/// The cheapest face not yet tried, unless it costs more than the origin round trip.
pub fn select_face(
    name: &Name,
    unavailable: &BTreeSet<FaceId>,
    static_fib: &StaticFib,
    dynamic_fib: &DynamicFib,
) -> Option<FaceId> {
    let ceiling = 2.0 * static_fib.query_name(name)?.metric;
    rank_faces(name, static_fib, dynamic_fib)
        .into_iter()
        .find(|candidate| !unavailable.contains(&candidate.face))
        .filter(|candidate| candidate.cost <= ceiling)
        .map(|candidate| candidate.face)
}
